use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Event store unavailable: {0}")]
    Unavailable(String),
    #[error("Event store rejected request: {0}")]
    Rejected(String),
    #[error("Event not found: {0}")]
    NotFound(String),
}

impl InfraError {
    /// Transient failures worth another attempt before a commit is rolled back.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
