#[cfg(feature = "serde")]
#[macro_use]
extern crate serde;

use std::fmt;

/// Result type with custom Error
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error information
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct Error {
    /// Type of error and additional information
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub error_type: ErrorType,

    /// Where this error occurred
    pub location: String,
}

/// Possible error types
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorType {
    /// This error was not labeled :(
    LabelMe,

    // ? Authentication related errors
    MissingCredentials {
        variable: String,
    },
    InvalidCredentials,
    Unauthorized,

    // ? Duplicate resource errors
    DuplicateUser {
        user: String,
    },
    DuplicateCollection {
        collection: String,
    },
    IndexConflict {
        collection: String,
        index: String,
    },
    DuplicateKey {
        collection: String,
        index: String,
    },

    // ? Connectivity errors
    ConnectionFailed {
        error: String,
    },

    // ? General errors
    DatabaseError {
        operation: String,
        collection: String,
    },
    Engine {
        code: i32,
        message: String,
    },
    InvalidConfiguration {
        error: String,
    },
    VerificationFailed {
        missing: Vec<String>,
    },
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorType::LabelMe => write!(f, "unlabeled error"),
            ErrorType::MissingCredentials { variable } => {
                write!(f, "missing credentials: `{variable}` is not set")
            }
            ErrorType::InvalidCredentials => write!(f, "authentication failed"),
            ErrorType::Unauthorized => write!(f, "command requires authentication"),
            ErrorType::DuplicateUser { user } => write!(f, "user `{user}` already exists"),
            ErrorType::DuplicateCollection { collection } => {
                write!(f, "collection `{collection}` already exists")
            }
            ErrorType::IndexConflict { collection, index } => write!(
                f,
                "index `{index}` on `{collection}` conflicts with an existing index"
            ),
            ErrorType::DuplicateKey { collection, index } => {
                write!(f, "duplicate key in `{collection}` for index `{index}`")
            }
            ErrorType::ConnectionFailed { error } => write!(f, "connection failed: {error}"),
            ErrorType::DatabaseError {
                operation,
                collection,
            } => write!(f, "database error during `{operation}` on `{collection}`"),
            ErrorType::Engine { code, message } => write!(f, "engine error {code}: {message}"),
            ErrorType::InvalidConfiguration { error } => {
                write!(f, "invalid configuration: {error}")
            }
            ErrorType::VerificationFailed { missing } => {
                write!(f, "database is missing: {}", missing.join(", "))
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {})", self.error_type, self.location)
    }
}

impl std::error::Error for Error {}

#[macro_export]
macro_rules! create_error {
    ( $error: ident $( $tt:tt )? ) => {
        $crate::Error {
            error_type: $crate::ErrorType::$error $( $tt )?,
            location: format!("{}:{}:{}", file!(), line!(), column!()),
        }
    };
}

#[macro_export]
macro_rules! create_database_error {
    ( $operation: expr, $collection: expr ) => {
        create_error!(DatabaseError {
            operation: $operation.to_string(),
            collection: $collection.to_string()
        })
    };
}
