use thiserror::Error;

#[derive(Debug, Error)]
pub enum StripeApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST request: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Invalid object id: {0}")]
    InvalidObjectId(String),
    #[error("Webhook signature verification failed: {0}")]
    InvalidSignature(String),
    #[error("Invalid webhook event: {0}")]
    InvalidEvent(String),
}

impl StripeApiError {
    /// True if retrying the same request later might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RestRequestError(_) | Self::RestResponseError(_) => true,
            Self::QueryError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
