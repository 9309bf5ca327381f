use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShopRagError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Configuration loading error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("{service} returned {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Rate limit exceeded for {0}")]
    RateLimited(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Custom(String),
}

impl ShopRagError {
    /// Whether retrying the same call could succeed (429 and 5xx upstream answers).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Upstream { status, .. } => matches!(*status, 429 | 500 | 502 | 503 | 504),
            Self::HttpError(_) => true,
            _ => false,
        }
    }

    /// Validation failures are rejected without retry or side effects.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidSignature | Self::InvalidInput(_))
    }
}

impl From<reqwest::Error> for ShopRagError {
    fn from(e: reqwest::Error) -> Self {
        Self::HttpError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ShopRagError>;
