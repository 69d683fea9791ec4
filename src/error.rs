use serde::de::Error as SerdeError;
use std::fmt;
use thiserror::Error;

use crate::options::OptionsBuilderError;

///
/// Error raised while converting a single literal into its target type.
///
/// These never reach the caller of a decode unless the literal is the
/// top-level target, see [`Error::Value`](Error::Value).
///
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LiteralError {
    #[error("invalid syntax")]
    Syntax,
    #[error("value out of range")]
    Range,
    #[error("no value set")]
    Absent,
    #[error("unsupported type {0}")]
    Unsupported(&'static str),
    #[error("{0}")]
    Custom(String),
}

impl SerdeError for LiteralError {
    #[inline]
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::Custom(msg.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The target (or one of its fields) has a type the decoder can't fill.
    #[error("unsupported type {kind} for `{key}`")]
    Unsupported { key: String, kind: &'static str },
    /// A value could not be converted into its field type.
    #[error("invalid value for `{key}`: {reason}")]
    Value { key: String, reason: LiteralError },
    /// Strict mode found a prefixed variable nothing consumed.
    #[error("unrecognized environment variable `{0}`")]
    Unrecognized(String),
    #[error("invalid options: {0}")]
    Options(String),
    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// Attach a qualified key to a literal error. Unsupported literal kinds
    /// stay structural, everything else is a value error.
    pub(crate) fn literal(key: String, error: LiteralError) -> Self {
        match error {
            LiteralError::Unsupported(kind) => Error::Unsupported { key, kind },
            reason => Error::Value { key, reason },
        }
    }

    #[inline]
    pub(crate) fn unsupported(key: String, kind: &'static str) -> Self {
        Error::Unsupported { key, kind }
    }
}

impl SerdeError for Error {
    #[inline]
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

impl From<OptionsBuilderError> for Error {
    #[inline]
    fn from(e: OptionsBuilderError) -> Self {
        Error::Options(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::{Error, LiteralError};

    #[test]
    fn test_literal_unsupported_stays_structural() {
        assert_eq!(
            Error::literal("server_any".into(), LiteralError::Unsupported("any")),
            Error::Unsupported {
                key: "server_any".into(),
                kind: "any"
            }
        );

        assert_eq!(
            Error::literal("server_id".into(), LiteralError::Syntax),
            Error::Value {
                key: "server_id".into(),
                reason: LiteralError::Syntax
            }
        );
    }

    #[test]
    fn test_error_display() {
        let e = Error::Unrecognized(String::from("server_unknown"));
        assert_eq!(
            e.to_string(),
            "unrecognized environment variable `server_unknown`"
        );

        let e = Error::Value {
            key: String::from("server_id"),
            reason: LiteralError::Range,
        };
        assert_eq!(e.to_string(), "invalid value for `server_id`: value out of range");
    }
}
