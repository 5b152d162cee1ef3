use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{Buyer, Game, NewOrder, Order, OrderId},
    traits::{
        data_objects::{ConfirmationDetails, TransitionResult},
        AccountApiError,
        AccountManagement,
    },
};

/// This trait defines the order lifecycle behaviour for backends supporting the storefront engine.
///
/// This behaviour includes:
/// * Looking up the buyer and game for a new purchase
/// * Recording new orders once the gateway has accepted a checkout session
/// * Guarded `pending -> confirmed` and `pending -> cancelled` transitions
/// * Entitlement grants
///
/// Implementations must make every transition conditional on the order still being `pending`, and must perform the
/// status change, the audit log entry and (for confirmations) the entitlement grant in a single atomic unit.
#[allow(async_fn_in_trait)]
pub trait FulfillmentDatabase: Clone + AccountManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    async fn fetch_buyer(&self, buyer_id: i64) -> Result<Option<Buyer>, StoreError>;

    async fn fetch_game(&self, game_id: i64) -> Result<Option<Game>, StoreError>;

    /// Returns true if the buyer already holds an entitlement for the game.
    async fn owns_game(&self, buyer_id: i64, game_id: i64) -> Result<bool, StoreError>;

    /// Stores a brand-new order with status `pending`. The `payment_ref` is initialised to the session id.
    ///
    /// Returns [`StoreError::OrderAlreadyExists`] if the order id or session id is already in use.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    async fn fetch_order_by_session_id(&self, session_id: &str) -> Result<Option<Order>, StoreError>;

    /// Moves the order from `pending` to `confirmed` and grants the entitlement, in a single atomic transaction.
    ///
    /// If the order is not pending, nothing changes and [`TransitionResult::Unchanged`] is returned with the current
    /// order. If the order does not exist, [`StoreError::OrderNotFound`] is returned.
    async fn confirm_order(
        &self,
        order_id: &OrderId,
        details: ConfirmationDetails,
    ) -> Result<TransitionResult, StoreError>;

    /// Moves the order from `pending` to `cancelled`. No entitlement is touched.
    ///
    /// Same result semantics as [`Self::confirm_order`].
    async fn cancel_order(&self, order_id: &OrderId, reason: &str) -> Result<TransitionResult, StoreError>;

    /// Fetches pending orders that were created before `cutoff`.
    async fn fetch_pending_orders_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, StoreError>;

    /// Fetches confirmed orders for which the buyer does not hold an entitlement for the ordered game.
    async fn fetch_confirmed_orders_without_entitlement(&self) -> Result<Vec<Order>, StoreError>;

    /// Idempotently grants the entitlement for a confirmed order. Returns true if a new entitlement was created.
    async fn grant_entitlement(&self, order: &Order) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Cannot insert order, since it already exists: {0}")]
    OrderAlreadyExists(OrderId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The order {0} is not in a state that allows this operation")]
    OrderNotConfirmed(OrderId),
    #[error("{0}")]
    AccountError(#[from] AccountApiError),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}
