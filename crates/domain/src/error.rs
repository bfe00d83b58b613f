use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid target level {input:?}, expected a number such as -3dB")]
    InvalidLevel { input: String },
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
}

impl DomainError {
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation(message.into())
    }
}
