use thiserror::Error;

use crate::{
    db_types::{Entitlement, Order, OrderId, OrderStatusChange},
    order_objects::OrderQueryFilter,
};

#[derive(Debug, Clone, Error)]
pub enum AccountApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
}

impl From<sqlx::Error> for AccountApiError {
    fn from(e: sqlx::Error) -> Self {
        AccountApiError::DatabaseError(e.to_string())
    }
}

/// The `AccountManagement` trait provides read-only views over a buyer's orders and owned games.
///
/// The [`crate::traits::FulfillmentDatabase`] trait handles the actual machinery of moving orders through their
/// lifecycle.
#[allow(async_fn_in_trait)]
pub trait AccountManagement {
    /// Fetches all orders placed by the buyer, newest first.
    async fn fetch_orders_for_buyer(&self, buyer_id: i64) -> Result<Vec<Order>, AccountApiError>;

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, AccountApiError>;

    /// Fetches orders matching the filter, ordered by `created_at` ascending.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, AccountApiError>;

    async fn fetch_entitlements_for_buyer(&self, buyer_id: i64) -> Result<Vec<Entitlement>, AccountApiError>;

    /// Fetches the status audit trail for an order, oldest first.
    async fn fetch_order_history(&self, order_id: &OrderId) -> Result<Vec<OrderStatusChange>, AccountApiError>;
}
