//! Error types for Folio.

use thiserror::Error;

/// Common error type for Folio.
#[derive(Error, Debug)]
pub enum FolioError {
    /// A folder, document or tag id does not resolve.
    #[error("{0} not found")]
    NotFound(String),

    /// An id is not a well-formed identifier.
    #[error("invalid identifier: '{0}'")]
    InvalidIdentifier(String),

    /// Validation error for caller input or tree state.
    #[error("validation error: {0}")]
    Validation(String),

    /// Payload read/write failed while creating a document.
    #[error("upload of '{name}' failed: {reason}")]
    UploadFailure {
        /// Original file name of the upload.
        name: String,
        /// Underlying cause.
        reason: String,
    },

    /// The document's media type has no PDF conversion.
    #[error("unsupported media type: {0}")]
    ConversionUnsupported(String),

    /// The conversion collaborator failed.
    #[error("conversion failed: {0}")]
    ConversionFailed(String),

    /// Object store transport failure.
    #[error("storage I/O error: {0}")]
    StorageIo(String),

    /// Metadata store transport failure.
    ///
    /// Database errors from sqlx are automatically converted.
    #[error("database error: {0}")]
    Database(String),

    /// A uniqueness constraint rejected a write.
    #[error("duplicate entry: {0}")]
    Duplicate(String),

    /// The requested value already exists (e.g. a tag name).
    #[error("conflict: {0}")]
    Conflict(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl FolioError {
    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            FolioError::NotFound(_) => "NOT_FOUND",
            FolioError::InvalidIdentifier(_) => "VAL_INVALID_UUID",
            FolioError::Validation(_) => "VAL_INVALID_INPUT",
            FolioError::UploadFailure { .. } => "DOC_UPLOAD_FAILED",
            FolioError::ConversionUnsupported(_) => "DOC_INVALID_TYPE",
            FolioError::ConversionFailed(_) => "DOC_CONVERSION_FAILED",
            FolioError::StorageIo(_) => "SYS_STORAGE_ERROR",
            FolioError::Database(_) => "SYS_DATABASE_ERROR",
            FolioError::Duplicate(_) => "SYS_DUPLICATE_KEY",
            FolioError::Conflict(_) => "CONFLICT",
            FolioError::Io(_) | FolioError::Config(_) => "SYS_INTERNAL_ERROR",
        }
    }

    /// Whether this error came from a uniqueness constraint.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, FolioError::Duplicate(_))
    }
}

// Conversion from sqlx errors
impl From<sqlx::Error> for FolioError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return FolioError::Duplicate(db_err.message().to_string());
            }
        }
        FolioError::Database(e.to_string())
    }
}

/// Result type alias for Folio operations.
pub type Result<T> = std::result::Result<T, FolioError>;
