use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("io error: {0}")]
    Io(String),
    #[error("recording parse error: {0}")]
    RecordingParse(String),
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("cli error: {0}")]
    Cli(String),
    #[error("prompt error: {0}")]
    Prompt(String),
    #[error("serialize error: {0}")]
    Serialize(String),
    #[error("internal error: {0}")]
    Internal(String),
    /// Operator or signal initiated shutdown. Never reported as a failure.
    #[error("operation cancelled by user")]
    Cancelled,
}

impl BuilderError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
