/// QuickDB Error Module
///
/// This module defines the error type returned by every fallible operation
/// of the connection wrapper, together with the three-level classification
/// (fatal, notice, other) used by the debug sink.
use thiserror::Error;

/// Severity classification of a [`DbError`].
///
/// The classification is advisory: all kinds travel through the same
/// `Result` channel. It only decides how the debug sink reports an error
/// and whether strict mode terminates the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unusable parameters or a connection that could not be opened
    Fatal,
    /// A statement failed or an operation was a no-op
    Notice,
    /// Everything else
    Other,
}

impl ErrorKind {
    /// Label used when the debug sink prints the error.
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Fatal => "error",
            ErrorKind::Notice => "notice",
            ErrorKind::Other => "other",
        }
    }
}

/// Error type for the QuickDB connection wrapper.
#[derive(Error, Debug)]
pub enum DbError {
    /// Username or database name missing from the credentials
    #[error("Wrong connection parameters.")]
    InvalidParameters,

    /// The driver refused to open a connection
    #[error("Could not connect to database {database}@{hostname}: {reason}")]
    Connection {
        database: String,
        hostname: String,
        reason: String,
    },

    /// Helper called with an empty table name
    #[error("Invalid {0} data.")]
    InvalidData(&'static str),

    /// `connect` called on an open connection
    #[error("Already connected")]
    AlreadyConnected,

    /// `close` called without an open connection
    #[error("Not connected to any database.")]
    NotConnected,

    /// The driver failed to release the connection handle
    #[error("Initial connection successful but connection gone before closing: {0}")]
    Close(String),

    /// A statement was rejected by the driver
    #[error("Error sending query ({sql}). Driver said: {reason}")]
    Query { sql: String, reason: String },

    /// Insert/update helper left without any usable field
    #[error("Malformed {0}.")]
    Malformed(&'static str),

    /// A collector was saved a second time
    #[error("Record already saved")]
    AlreadySaved,

    /// Settings file could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Row serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    /// Returns the taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::InvalidParameters | DbError::Connection { .. } | DbError::InvalidData(_) => {
                ErrorKind::Fatal
            }
            DbError::AlreadyConnected
            | DbError::NotConnected
            | DbError::Close(_)
            | DbError::Query { .. }
            | DbError::Malformed(_) => ErrorKind::Notice,
            DbError::AlreadySaved | DbError::Config(_) | DbError::Io(_) | DbError::Json(_) => {
                ErrorKind::Other
            }
        }
    }
}

/// Type alias for Result to use DbError as the error type.
pub type Result<T> = std::result::Result<T, DbError>;
