use serde::{Deserialize, Serialize};

///
/// Value
///
/// Dynamic attribute payload. Attribute fields hold exactly one `Value`;
/// change detection is plain equality. Relation fields never store a
/// `Value` — they hold record handles (see `store::RelationSlot`).
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl Value {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Truthiness used by computed-field guards: null, false, 0, and empty
    /// text read as false.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Text(s) => !s.is_empty(),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

///
/// IdentityValue
///
/// Restriction of `Value` to the shapes allowed in identity keys. Identity
/// keys must be totally ordered for the registry index; booleans and nulls
/// make degenerate keys and are rejected.
///

#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum IdentityValue {
    Int(i64),
    Text(String),
}

impl TryFrom<&Value> for IdentityValue {
    type Error = ();

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Int(i) => Ok(Self::Int(*i)),
            Value::Text(s) => Ok(Self::Text(s.clone())),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_matches_attribute_guards() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::text("").is_truthy());
        assert!(Value::Int(-3).is_truthy());
        assert!(Value::text("chat").is_truthy());
    }

    #[test]
    fn identity_values_reject_degenerate_keys() {
        assert!(IdentityValue::try_from(&Value::Int(7)).is_ok());
        assert!(IdentityValue::try_from(&Value::text("mail.channel")).is_ok());
        assert!(IdentityValue::try_from(&Value::Bool(true)).is_err());
        assert!(IdentityValue::try_from(&Value::Null).is_err());
    }
}
