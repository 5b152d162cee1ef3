use gamestore_engine::{
    db_types::{Entitlement, Order, OrderId, OrderStatusChange},
    order_objects::OrderQueryFilter,
    traits::{AccountApiError, AccountManagement},
};
use mockall::mock;

mock! {
    pub AccountManager {}
    impl AccountManagement for AccountManager {
        async fn fetch_orders_for_buyer(&self, buyer_id: i64) -> Result<Vec<Order>, AccountApiError>;
        async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, AccountApiError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, AccountApiError>;
        async fn fetch_entitlements_for_buyer(&self, buyer_id: i64) -> Result<Vec<Entitlement>, AccountApiError>;
        async fn fetch_order_history(&self, order_id: &OrderId) -> Result<Vec<OrderStatusChange>, AccountApiError>;
    }
}
