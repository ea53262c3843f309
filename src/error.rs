use std::fmt;

/// Bad or missing input. `field` names the offending input when there is one,
/// so callers can show the message next to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: Option<&'static str>,
    pub message: String,
}

impl ValidationError {
    pub fn new<M: Into<String>>(message: M) -> Self {
        ValidationError {
            field: None,
            message: message.into(),
        }
    }

    pub fn field<M: Into<String>>(field: &'static str, message: M) -> Self {
        ValidationError {
            field: Some(field),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            Some(field) => write!(f, "`{}`: {}", field, self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation failed: {0}")]
    Validation(ValidationError),
    #[error("Source document could not be decoded: {0}")]
    SourceDecode(String),
    #[error("Signature image could not be decoded: {0}")]
    ImageDecode(String),
    #[error("Composition failed: {0}")]
    Composition(String),
    #[error("Transport failed: {0}")]
    Transport(String),
    #[error("Illegal transition: {0}")]
    StateTransition(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Transport failures are the only ones worth retrying as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

// Errors raised by lopdf while the output is being written. Decoding of the
// source is mapped explicitly in `source_document`.
impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::Composition(err.to_string())
    }
}

impl From<png::DecodingError> for Error {
    fn from(err: png::DecodingError) -> Self {
        Error::ImageDecode(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_names_field() {
        let err = Error::from(ValidationError::field("email", "Email is required."));
        assert_eq!(
            err.to_string(),
            "Validation failed: `email`: Email is required."
        );
    }

    #[test]
    fn only_transport_is_retryable() {
        assert!(Error::Transport("timeout".to_owned()).is_retryable());
        assert!(!Error::Composition("oom".to_owned()).is_retryable());
        assert!(!Error::StateTransition("sign".to_owned()).is_retryable());
    }
}
