use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use gamestore_engine::{AccountApiError, FulfillmentError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("The game is already owned. {0}")]
    AlreadyOwned(String),
    #[error("The order cannot change state. {0}")]
    InvalidTransition(String),
    #[error("The payment provider is unavailable. Try again later. {0}")]
    GatewayUnavailable(String),
    #[error("Invalid payment notification. {0}")]
    InvalidNotification(String),
    #[error("The account is not active. {0}")]
    AccountNotActive(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::BAD_REQUEST,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::AlreadyOwned(_) => StatusCode::CONFLICT,
            Self::InvalidTransition(_) => StatusCode::CONFLICT,
            Self::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidNotification(_) => StatusCode::BAD_REQUEST,
            Self::AccountNotActive(_) => StatusCode::FORBIDDEN,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No access token was provided.")]
    MissingToken,
    #[error("Access token is invalid. {0}")]
    ValidationError(String),
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
}

impl From<FulfillmentError> for ServerError {
    fn from(e: FulfillmentError) -> Self {
        match e {
            FulfillmentError::AlreadyOwned { .. } => Self::AlreadyOwned(e.to_string()),
            FulfillmentError::GatewayUnavailable(_) => Self::GatewayUnavailable(e.to_string()),
            FulfillmentError::InvalidNotification(_) => Self::InvalidNotification(e.to_string()),
            FulfillmentError::InvalidTransition { .. } => Self::InvalidTransition(e.to_string()),
            FulfillmentError::BuyerNotFound(_) | FulfillmentError::GameNotFound(_) | FulfillmentError::OrderNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            FulfillmentError::BuyerNotActive(_) => Self::AccountNotActive(e.to_string()),
            FulfillmentError::DatabaseError(_) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<AccountApiError> for ServerError {
    fn from(e: AccountApiError) -> Self {
        match e {
            AccountApiError::QueryError(s) => Self::InvalidRequestBody(s),
            AccountApiError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
        }
    }
}
