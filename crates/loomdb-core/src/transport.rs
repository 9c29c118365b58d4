use std::{cell::RefCell, collections::VecDeque, rc::Rc};
use thiserror::Error as ThisError;

///
/// TransportRequest
///
/// One outbound server call: remote model, method, positional args and
/// keyword args as JSON. Mirrors the wire shape of the original RPC layer
/// without binding the store to any particular client.
///

#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub model: String,
    pub method: String,
    pub args: serde_json::Value,
    pub kwargs: serde_json::Value,
}

impl TransportRequest {
    #[must_use]
    pub fn new(model: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            method: method.into(),
            args: serde_json::Value::Array(Vec::new()),
            kwargs: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    #[must_use]
    pub fn args(mut self, args: serde_json::Value) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn kwargs(mut self, kwargs: serde_json::Value) -> Self {
        self.kwargs = kwargs;
        self
    }
}

///
/// TransportError
///

#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("server rejected {method}: {message}")]
    Server { method: String, message: String },
}

///
/// Transport
///
/// The seam between local actions and the server. Actions that talk to the
/// network go through this trait only, so tests script responses and assert
/// on the request log instead of standing up a server.
///

pub trait Transport {
    fn request(&self, request: TransportRequest) -> Result<serde_json::Value, TransportError>;
}

///
/// NullTransport
/// Rejects every call; for stores that never reach the network.
///

pub struct NullTransport;

impl Transport for NullTransport {
    fn request(&self, request: TransportRequest) -> Result<serde_json::Value, TransportError> {
        Err(TransportError::Unavailable(format!(
            "no transport configured for {}/{}",
            request.model, request.method
        )))
    }
}

#[derive(Default)]
struct ScriptedInner {
    responses: RefCell<VecDeque<Result<serde_json::Value, TransportError>>>,
    requests: RefCell<Vec<TransportRequest>>,
}

///
/// ScriptedTransport
///
/// Test double: queued responses plus a request log. Clones share state, so
/// keep a clone outside the environment to script and inspect. An empty
/// queue answers `null`, which suits the many calls whose response body is
/// ignored.
///

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    inner: Rc<ScriptedInner>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: serde_json::Value) {
        self.inner.responses.borrow_mut().push_back(Ok(response));
    }

    pub fn push_error(&self, error: TransportError) {
        self.inner.responses.borrow_mut().push_back(Err(error));
    }

    #[must_use]
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.inner.requests.borrow().clone()
    }

    #[must_use]
    pub fn calls_to(&self, method: &str) -> usize {
        self.inner
            .requests
            .borrow()
            .iter()
            .filter(|r| r.method == method)
            .count()
    }
}

impl Transport for ScriptedTransport {
    fn request(&self, request: TransportRequest) -> Result<serde_json::Value, TransportError> {
        self.inner.requests.borrow_mut().push(request);
        self.inner
            .responses
            .borrow_mut()
            .pop_front()
            .unwrap_or(Ok(serde_json::Value::Null))
    }
}
