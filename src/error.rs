pub type MuralResult<T> = Result<T, MuralError>;

#[derive(thiserror::Error, Debug)]
pub enum MuralError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("evaluation error: {0}")]
    Evaluation(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("transient service error: {0}")]
    Transient(String),

    #[error("operation rejected: {0}")]
    Rejected(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MuralError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Whether a failed external call may be re-attempted.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
