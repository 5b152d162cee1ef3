//! `SqliteDatabase` is a concrete implementation of a storefront engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{buyers, db_url, entitlements, games, new_pool, orders};
use crate::{
    db_types::{
        Buyer,
        BuyerStatus,
        Cents,
        Entitlement,
        Game,
        NewBuyer,
        NewGame,
        NewOrder,
        Order,
        OrderId,
        OrderStatusChange,
        OrderStatusType,
    },
    order_objects::OrderQueryFilter,
    traits::{
        AccountApiError,
        AccountManagement,
        ConfirmationDetails,
        FulfillmentDatabase,
        StoreError,
        TransitionResult,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl FulfillmentDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_buyer(&self, buyer_id: i64) -> Result<Option<Buyer>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let buyer = buyers::fetch_buyer(buyer_id, &mut conn).await?;
        Ok(buyer)
    }

    async fn fetch_game(&self, game_id: i64) -> Result<Option<Game>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let game = games::fetch_game(game_id, &mut conn).await?;
        Ok(game)
    }

    async fn owns_game(&self, buyer_id: i64, game_id: i64) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let owned = entitlements::owns_game(buyer_id, game_id, &mut conn).await?;
        Ok(owned)
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        orders::log_status_change(&order.order_id, None, OrderStatusType::Pending, "checkout session created", &mut tx)
            .await?;
        tx.commit().await?;
        debug!("🗃️ Order {} has been saved in the DB with id {}", order.order_id, order.id);
        Ok(order)
    }

    async fn fetch_order_by_session_id(&self, session_id: &str) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_session_id(session_id, &mut conn).await?;
        Ok(order)
    }

    /// The guarded update is the first statement of the transaction, so SQLite's writer lock decides which of two
    /// racing callers performs the transition. The loser sees zero affected rows and reads the terminal order.
    async fn confirm_order(
        &self,
        order_id: &OrderId,
        details: ConfirmationDetails,
    ) -> Result<TransitionResult, StoreError> {
        let mut tx = self.pool.begin().await?;
        let transitioned = orders::mark_confirmed(order_id, &details, &mut tx).await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| StoreError::OrderNotFound(order_id.clone()))?;
        if !transitioned {
            tx.rollback().await?;
            trace!("🗃️ Order {order_id} was already {}. Nothing to confirm.", order.status);
            return Ok(TransitionResult::Unchanged(order));
        }
        orders::log_status_change(
            order_id,
            Some(OrderStatusType::Pending),
            OrderStatusType::Confirmed,
            "payment confirmed",
            &mut tx,
        )
        .await?;
        entitlements::grant_for_order(&order, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {order_id} confirmed and entitlement granted");
        Ok(TransitionResult::Transitioned(order))
    }

    async fn cancel_order(&self, order_id: &OrderId, reason: &str) -> Result<TransitionResult, StoreError> {
        let mut tx = self.pool.begin().await?;
        let transitioned = orders::mark_cancelled(order_id, &mut tx).await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| StoreError::OrderNotFound(order_id.clone()))?;
        if !transitioned {
            tx.rollback().await?;
            trace!("🗃️ Order {order_id} was already {}. Nothing to cancel.", order.status);
            return Ok(TransitionResult::Unchanged(order));
        }
        orders::log_status_change(
            order_id,
            Some(OrderStatusType::Pending),
            OrderStatusType::Cancelled,
            reason,
            &mut tx,
        )
        .await?;
        tx.commit().await?;
        debug!("🗃️ Order {order_id} cancelled: {reason}");
        Ok(TransitionResult::Transitioned(order))
    }

    async fn fetch_pending_orders_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_pending_orders_created_before(cutoff, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_confirmed_orders_without_entitlement(&self) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_confirmed_orders_without_entitlement(&mut conn).await?;
        Ok(orders)
    }

    async fn grant_entitlement(&self, order: &Order) -> Result<bool, StoreError> {
        if order.status != OrderStatusType::Confirmed {
            return Err(StoreError::OrderNotConfirmed(order.order_id.clone()));
        }
        let mut conn = self.pool.acquire().await?;
        let granted = entitlements::grant_for_order(order, &mut conn).await?;
        Ok(granted)
    }
}

impl AccountManagement for SqliteDatabase {
    async fn fetch_orders_for_buyer(&self, buyer_id: i64) -> Result<Vec<Order>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_buyer(buyer_id, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_entitlements_for_buyer(&self, buyer_id: i64) -> Result<Vec<Entitlement>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let entitlements = entitlements::fetch_for_buyer(buyer_id, &mut conn).await?;
        Ok(entitlements)
    }

    async fn fetch_order_history(&self, order_id: &OrderId) -> Result<Vec<OrderStatusChange>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let history = orders::fetch_status_history(order_id, &mut conn).await?;
        Ok(history)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the `GS_DATABASE_URL` environment variable (or the default URL).
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        trace!("🗃️ Created new SQLite pool for {url}");
        Ok(Self { url: url.to_string(), pool })
    }

    /// Returns a reference to the database connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Applies the embedded schema migrations.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    // Catalog and account records are owned by other subsystems. These methods exist for seeding and tooling.

    pub async fn create_buyer(&self, buyer: NewBuyer) -> Result<Buyer, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let buyer = buyers::insert_buyer(buyer, &mut conn).await?;
        Ok(buyer)
    }

    pub async fn fetch_buyer_by_email(&self, email: &str) -> Result<Option<Buyer>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let buyer = buyers::fetch_buyer_by_email(email, &mut conn).await?;
        Ok(buyer)
    }

    pub async fn set_buyer_status(&self, buyer_id: i64, status: BuyerStatus) -> Result<Option<Buyer>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let buyer = buyers::update_buyer_status(buyer_id, status, &mut conn).await?;
        Ok(buyer)
    }

    pub async fn create_game(&self, game: NewGame) -> Result<Game, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let game = games::insert_game(game, &mut conn).await?;
        Ok(game)
    }

    pub async fn fetch_game_by_sku(&self, sku: &str) -> Result<Option<Game>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let game = games::fetch_game_by_sku(sku, &mut conn).await?;
        Ok(game)
    }

    pub async fn update_game_price(&self, game_id: i64, price: Cents) -> Result<Option<Game>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let game = games::update_game_price(game_id, price, &mut conn).await?;
        Ok(game)
    }
}
