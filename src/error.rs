//! Error types for pledge
//!
//! Errors raised while settling a deferred value never escape to the caller:
//! they are converted into rejection reasons with [`Error::into_reason`]. Only
//! synchronous argument validation (a combinator handed something that is not a
//! sequence) and configuration loading surface as `Err` to the caller.

use crate::value::Value;
use std::fmt;
use thiserror::Error;

/// Main error type for pledge
#[derive(Error, Debug)]
pub enum Error {
    /// An arbitrary value raised by user code (a handler, an initializer,
    /// a property accessor or a foreign `then`)
    #[error("Uncaught {0}")]
    Thrown(Value),

    /// A typed runtime error, e.g. the TypeError produced by a chaining cycle
    #[error("{kind}: {message}")]
    Runtime { kind: ErrorKind, message: String },

    /// A combinator was given something that is not a sequence
    #[error("TypeError: {operation} expects a sequence, received {received}")]
    NotIterable {
        operation: &'static str,
        received: String,
    },

    /// Invalid configuration value
    #[error("ConfigError: {0}")]
    Config(String),

    /// IO error
    #[error("IOError: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// Error kinds carried by error values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub enum ErrorKind {
    /// TypeError - wrong type for operation, chaining cycles
    TypeError,
    /// RangeError - value out of range
    RangeError,
    /// Generic Error - user-created error values
    GenericError,
    /// InternalError - failures outside the settlement machinery
    InternalError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::TypeError => write!(f, "TypeError"),
            ErrorKind::RangeError => write!(f, "RangeError"),
            ErrorKind::GenericError => write!(f, "Error"),
            ErrorKind::InternalError => write!(f, "InternalError"),
        }
    }
}

impl Error {
    /// Raise an arbitrary value
    pub fn thrown(value: impl Into<Value>) -> Self {
        Error::Thrown(value.into())
    }

    /// Create a TypeError
    pub fn type_error(message: impl Into<String>) -> Self {
        Error::Runtime {
            kind: ErrorKind::TypeError,
            message: message.into(),
        }
    }

    /// Create a RangeError
    pub fn range_error(message: impl Into<String>) -> Self {
        Error::Runtime {
            kind: ErrorKind::RangeError,
            message: message.into(),
        }
    }

    /// The error used when a deferred value would be settled with itself
    pub fn chaining_cycle() -> Self {
        Error::type_error(messages::CHAINING_CYCLE)
    }

    /// Create a CompositionError for a non-sequence argument
    pub fn not_iterable(operation: &'static str, received: &Value) -> Self {
        Error::NotIterable {
            operation,
            received: received.type_name().to_string(),
        }
    }

    /// Whether this is the chaining cycle TypeError
    pub fn is_chaining_cycle(&self) -> bool {
        matches!(
            self,
            Error::Runtime { kind: ErrorKind::TypeError, message } if message == messages::CHAINING_CYCLE
        )
    }

    /// Convert this error into the value a deferred value is rejected with.
    ///
    /// Thrown values pass through untouched; everything else becomes an
    /// error value carrying its kind and message.
    pub fn into_reason(self) -> Value {
        match self {
            Error::Thrown(value) => value,
            Error::Runtime { kind, message } => Value::error(kind, message),
            Error::NotIterable { operation, received } => Value::error(
                ErrorKind::TypeError,
                format!("{} expects a sequence, received {}", operation, received),
            ),
            Error::Config(message) => Value::error(ErrorKind::InternalError, message),
            Error::Io { source } => Value::error(ErrorKind::InternalError, source.to_string()),
        }
    }
}

/// Result type for pledge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error messages
pub mod messages {
    /// Message of the TypeError raised by self-settlement
    pub const CHAINING_CYCLE: &str = "Chaining cycle detected for deferred value";

    pub fn not_a_function(name: &str) -> String {
        format!("{} is not a function", name)
    }

    pub fn receiver_not_deferred(method: &str) -> String {
        format!("{} called on a value that is not a deferred value", method)
    }
}
