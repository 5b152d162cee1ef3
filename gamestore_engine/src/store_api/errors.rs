use thiserror::Error;

use crate::{
    db_types::{OrderId, OrderStatusType},
    traits::{AccountApiError, GatewayError, PaymentOutcome, StoreError},
};

#[derive(Debug, Clone, Error)]
pub enum FulfillmentError {
    #[error("Buyer #{buyer_id} already owns game #{game_id}")]
    AlreadyOwned { buyer_id: i64, game_id: i64 },
    #[error("The payment gateway is unavailable: {0}")]
    GatewayUnavailable(String),
    #[error("Invalid payment notification: {0}")]
    InvalidNotification(String),
    #[error("Order {order_id} is {status} and cannot accept a {outcome:?} outcome")]
    InvalidTransition { order_id: OrderId, status: OrderStatusType, outcome: PaymentOutcome },
    #[error("Buyer #{0} does not exist")]
    BuyerNotFound(i64),
    #[error("Buyer #{0} is not active")]
    BuyerNotActive(i64),
    #[error("Game #{0} does not exist")]
    GameNotFound(i64),
    #[error("Order {0} does not exist")]
    OrderNotFound(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl FulfillmentError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FulfillmentError::BuyerNotFound(_) | FulfillmentError::GameNotFound(_) | FulfillmentError::OrderNotFound(_)
        )
    }

    /// True for failures that may succeed if the same request is tried again later.
    pub fn is_transient(&self) -> bool {
        matches!(self, FulfillmentError::GatewayUnavailable(_) | FulfillmentError::DatabaseError(_))
    }
}

impl From<StoreError> for FulfillmentError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::OrderNotFound(id) => FulfillmentError::OrderNotFound(id.to_string()),
            e => FulfillmentError::DatabaseError(e.to_string()),
        }
    }
}

impl From<AccountApiError> for FulfillmentError {
    fn from(e: AccountApiError) -> Self {
        FulfillmentError::DatabaseError(e.to_string())
    }
}

impl From<GatewayError> for FulfillmentError {
    fn from(e: GatewayError) -> Self {
        FulfillmentError::GatewayUnavailable(e.to_string())
    }
}
