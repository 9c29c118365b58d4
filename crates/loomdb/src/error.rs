use loomdb_core::{
    error::{ErrorClass, ErrorOrigin, InternalError},
    transport::TransportError,
};
use thiserror::Error as ThisError;

///
/// Error
///
/// Public error of the facade crate. Carries the engine's classification so
/// callers can branch on class/origin without string matching.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct Error {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound)
    }

    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self.origin, ErrorOrigin::Transport)
    }

    /// Lower back into the engine error type; needed where facade code runs
    /// inside engine callbacks (timers, triggers).
    #[must_use]
    pub(crate) fn into_internal(self) -> InternalError {
        InternalError::new(self.class, self.origin, self.message)
    }
}

impl From<InternalError> for Error {
    fn from(err: InternalError) -> Self {
        Self {
            class: err.class,
            origin: err.origin,
            message: err.message,
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        Self {
            class: ErrorClass::Internal,
            origin: ErrorOrigin::Transport,
            message: err.to_string(),
        }
    }
}
