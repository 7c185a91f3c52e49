use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("business not found: {0}")]
    BusinessNotFound(String),

    #[error("source binding not found for source={source}, external_id={external_id}")]
    SourceBindingNotFound { source: String, external_id: String },

    #[error("photo not found: {0}")]
    PhotoNotFound(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("monthly budget exceeded, retry after {retry_after_secs}s")]
    BudgetExceeded { retry_after_secs: u64 },

    #[error("upstream provider error ({provider}): {message}")]
    Upstream { provider: String, message: String },

    #[error("upstream request timed out")]
    UpstreamTimeout,

    #[error("photo exceeds the {limit_bytes} byte size cap")]
    PhotoTooLarge { limit_bytes: u64 },

    #[error("unsupported image format: {0}")]
    UnsupportedImageFormat(String),

    #[error("object store error: {0}")]
    ObjectStore(String),

    #[error("job exhausted its retry budget after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl IngestError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        IngestError::Config(msg.into())
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        IngestError::Validation(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        IngestError::Internal(msg.into())
    }

    /// Whether retrying the operation that produced this error could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IngestError::Upstream { .. }
                | IngestError::UpstreamTimeout
                | IngestError::Database(_)
                | IngestError::Io(_)
                | IngestError::ObjectStore(_)
        )
    }
}
