//! Unifies API for accessing a buyer's orders and entitlements.

use std::fmt::Debug;

use log::trace;

use crate::{
    db_types::{Entitlement, Order, OrderId, OrderStatusChange},
    order_objects::OrderQueryFilter,
    traits::{AccountApiError, AccountManagement},
};

/// The `AccountApi` provides read-only access to orders and entitlements.
pub struct AccountApi<B> {
    db: B,
}

impl<B: Debug> Debug for AccountApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountApi ({:?})", self.db)
    }
}

impl<B> AccountApi<B>
where B: AccountManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// All orders placed by the buyer, newest first.
    pub async fn orders_for_buyer(&self, buyer_id: i64) -> Result<Vec<Order>, AccountApiError> {
        self.db.fetch_orders_for_buyer(buyer_id).await
    }

    pub async fn order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, AccountApiError> {
        self.db.fetch_order_by_order_id(order_id).await
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, AccountApiError> {
        trace!("🧑️ Searching orders. {query}");
        self.db.search_orders(query).await
    }

    pub async fn entitlements_for_buyer(&self, buyer_id: i64) -> Result<Vec<Entitlement>, AccountApiError> {
        self.db.fetch_entitlements_for_buyer(buyer_id).await
    }

    pub async fn order_history(&self, order_id: &OrderId) -> Result<Vec<OrderStatusChange>, AccountApiError> {
        self.db.fetch_order_history(order_id).await
    }
}
