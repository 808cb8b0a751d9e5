use graph_client::GraphError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LimelightError>;

/// Error taxonomy shared across the linking, insights, and engagement
/// crates. Remote failures split into transient (network/timeout/5xx) and
/// rejected (other 4xx); an expired credential is its own condition the
/// caller resolves by redoing OAuth, never by retrying.
#[derive(Error, Debug)]
pub enum LimelightError {
    /// Forged or corrupt callback state. The authorization attempt is
    /// aborted with nothing persisted.
    #[error("invalid link state: {0}")]
    StateInvalid(String),

    /// No token resolvable for the scope, or the remote API reported the
    /// credential expired. The user must redo OAuth.
    #[error("re-authorization required for this persona")]
    AuthRequired,

    /// A link attempt arrived without a persona reference. Tokens are
    /// always persona-scoped.
    #[error("a persona reference is required to link an account")]
    PersonaRequired,

    /// The persona has no account mapping. Distinct from AuthRequired:
    /// the fix is picking an account, not re-authorizing.
    #[error("persona has no linked external account")]
    LinkageMissing,

    #[error("transient remote failure: {0}")]
    RemoteTransient(String),

    #[error("remote rejected the request (status {status}): {body}")]
    RemoteRejected { status: u16, body: String },

    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<GraphError> for LimelightError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::AuthExpired => LimelightError::AuthRequired,
            GraphError::Network(msg) => LimelightError::RemoteTransient(msg),
            GraphError::Api {
                status, message, ..
            } => {
                if status >= 500 {
                    LimelightError::RemoteTransient(format!("status {status}: {message}"))
                } else {
                    LimelightError::RemoteRejected {
                        status,
                        body: message,
                    }
                }
            }
            // A success status with an undecodable body; keep it for
            // diagnostics rather than pretending the network failed.
            GraphError::Parse(msg) => LimelightError::RemoteRejected {
                status: 200,
                body: msg,
            },
        }
    }
}

impl From<sqlx::Error> for LimelightError {
    fn from(err: sqlx::Error) -> Self {
        LimelightError::Database(err.to_string())
    }
}
