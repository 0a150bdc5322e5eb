use shared::error::ValidationError;
use thiserror::Error;

/// Failure of a single backend round trip. No state change happened on the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe(.status, .message))]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: String,
}

fn describe(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("HTTP error! status: {status}: {message}"),
        None => message.to_string(),
    }
}

impl TransportError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(value: reqwest::Error) -> Self {
        let status = value.status().map(|status| status.as_u16());
        let message = if value.is_timeout() {
            format!("request timed out: {value}")
        } else if value.is_decode() {
            format!("malformed response body: {value}")
        } else {
            value.to_string()
        };
        Self { status, message }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ClientError {
    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }
}
