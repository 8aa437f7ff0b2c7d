use std::error::Error;
use std::fmt::Display;

/// Error type for DataSphere operations
#[derive(Debug)]
pub enum DataSphereError {
    /// Input rejected by validation (message is user-facing)
    ValidationError(String),
    /// Requested entity does not exist
    NotFound(String),
    /// Credentials rejected
    Unauthorized(String),
    /// Error raised by the relational user store
    DatabaseError(String),
    /// Error reading or writing session storage
    StorageError(String),
    /// Error (de)serializing JSON payloads
    SerializationError(String),
    /// Error raised by the SQL sandbox engine
    SandboxError(String),
    /// Invalid configuration
    ConfigError(String),
    /// Blocking task failed or was cancelled
    TaskError(String),
}

impl DataSphereError {
    /// Stable machine-readable code used in JSON error responses
    pub fn code(&self) -> &'static str {
        match self {
            DataSphereError::ValidationError(_) => "VALIDATION_FAILED",
            DataSphereError::NotFound(_) => "NOT_FOUND",
            DataSphereError::Unauthorized(_) => "UNAUTHORIZED",
            DataSphereError::DatabaseError(_) => "DATABASE_ERROR",
            DataSphereError::StorageError(_) => "STORAGE_ERROR",
            DataSphereError::SerializationError(_) => "SERIALIZATION_ERROR",
            DataSphereError::SandboxError(_) => "SANDBOX_ERROR",
            DataSphereError::ConfigError(_) => "CONFIG_ERROR",
            DataSphereError::TaskError(_) => "TASK_FAILED",
        }
    }

    /// The bare message without the category prefix
    pub fn message(&self) -> &str {
        match self {
            DataSphereError::ValidationError(msg)
            | DataSphereError::NotFound(msg)
            | DataSphereError::Unauthorized(msg)
            | DataSphereError::DatabaseError(msg)
            | DataSphereError::StorageError(msg)
            | DataSphereError::SerializationError(msg)
            | DataSphereError::SandboxError(msg)
            | DataSphereError::ConfigError(msg)
            | DataSphereError::TaskError(msg) => msg,
        }
    }
}

impl Display for DataSphereError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSphereError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            DataSphereError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DataSphereError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            DataSphereError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            DataSphereError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            DataSphereError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            DataSphereError::SandboxError(msg) => write!(f, "Sandbox error: {}", msg),
            DataSphereError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            DataSphereError::TaskError(msg) => write!(f, "Task error: {}", msg),
        }
    }
}

impl Error for DataSphereError {}

impl From<rusqlite::Error> for DataSphereError {
    fn from(err: rusqlite::Error) -> Self {
        DataSphereError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DataSphereError {
    fn from(err: serde_json::Error) -> Self {
        DataSphereError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for DataSphereError {
    fn from(err: std::io::Error) -> Self {
        DataSphereError::StorageError(err.to_string())
    }
}

impl From<actix_web::error::BlockingError> for DataSphereError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        DataSphereError::TaskError(err.to_string())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, DataSphereError>;
