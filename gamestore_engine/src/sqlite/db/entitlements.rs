use chrono::Utc;
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::db_types::{Entitlement, Order};

/// Grants the buyer ownership of the ordered game. Existing entitlements are left untouched.
///
/// Returns true if a new entitlement row was written.
pub async fn grant_for_order(order: &Order, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            INSERT OR IGNORE INTO entitlements (buyer_id, game_id, order_id, created_at)
            VALUES ($1, $2, $3, $4);
        "#,
    )
    .bind(order.buyer_id)
    .bind(order.game_id)
    .bind(order.order_id.as_str())
    .bind(Utc::now())
    .execute(conn)
    .await?;
    let granted = result.rows_affected() == 1;
    if granted {
        debug!("🎁️ Buyer #{} now owns game #{} via order {}", order.buyer_id, order.game_id, order.order_id);
    } else {
        trace!("🎁️ Buyer #{} already owned game #{}", order.buyer_id, order.game_id);
    }
    Ok(granted)
}

pub async fn owns_game(buyer_id: i64, game_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entitlements WHERE buyer_id = $1 AND game_id = $2")
        .bind(buyer_id)
        .bind(game_id)
        .fetch_one(conn)
        .await?;
    Ok(count > 0)
}

pub async fn fetch_for_buyer(buyer_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Entitlement>, sqlx::Error> {
    let entitlements = sqlx::query_as("SELECT * FROM entitlements WHERE buyer_id = $1 ORDER BY created_at, game_id")
        .bind(buyer_id)
        .fetch_all(conn)
        .await?;
    Ok(entitlements)
}
