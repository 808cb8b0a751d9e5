use thiserror::Error;

use crate::types::ErrorEnvelope;

pub type Result<T> = std::result::Result<T, GraphError>;

/// The Graph API signals an expired or revoked credential with this error
/// code regardless of HTTP status. Callers treat it as "re-authorize".
pub const AUTH_ERROR_CODE: i64 = 190;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("network error: {0}")]
    Network(String),

    #[error("access token expired or revoked")]
    AuthExpired,

    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    #[error("parse error: {0}")]
    Parse(String),
}

impl GraphError {
    /// Build an error from a non-success response body. Error bodies are
    /// structured as `{"error": {"message", "type", "code", "error_subcode"}}`.
    pub(crate) fn from_response(status: u16, body: String) -> Self {
        if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
            let err = envelope.error;
            if err.code == Some(AUTH_ERROR_CODE) {
                return GraphError::AuthExpired;
            }
            return GraphError::Api {
                status,
                code: err.code,
                message: err.message.unwrap_or(body),
            };
        }
        GraphError::Api {
            status,
            code: None,
            message: body,
        }
    }

    /// Network failures and 5xx responses. Everything else is a rejection
    /// the caller should surface rather than swallow.
    pub fn is_transient(&self) -> bool {
        match self {
            GraphError::Network(_) => true,
            GraphError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for GraphError {
    fn from(err: reqwest::Error) -> Self {
        GraphError::Network(err.to_string())
    }
}
