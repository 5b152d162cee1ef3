use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{Buyer, BuyerStatus, NewBuyer};

pub async fn fetch_buyer(buyer_id: i64, conn: &mut SqliteConnection) -> Result<Option<Buyer>, sqlx::Error> {
    let buyer = sqlx::query_as("SELECT * FROM buyers WHERE id = $1").bind(buyer_id).fetch_optional(conn).await?;
    Ok(buyer)
}

pub async fn fetch_buyer_by_email(email: &str, conn: &mut SqliteConnection) -> Result<Option<Buyer>, sqlx::Error> {
    let buyer = sqlx::query_as("SELECT * FROM buyers WHERE email = $1").bind(email).fetch_optional(conn).await?;
    Ok(buyer)
}

/// Buyer records belong to the account subsystem. This is used for seeding and administration tooling.
pub async fn insert_buyer(buyer: NewBuyer, conn: &mut SqliteConnection) -> Result<Buyer, sqlx::Error> {
    let buyer: Buyer = sqlx::query_as(
        r#"
            INSERT INTO buyers (name, email, status, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(buyer.name)
    .bind(buyer.email)
    .bind(buyer.status)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    debug!("🧑️ Buyer #{} ({}) created", buyer.id, buyer.email);
    Ok(buyer)
}

pub async fn update_buyer_status(
    buyer_id: i64,
    status: BuyerStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Buyer>, sqlx::Error> {
    let buyer = sqlx::query_as("UPDATE buyers SET status = $1 WHERE id = $2 RETURNING *")
        .bind(status)
        .bind(buyer_id)
        .fetch_optional(conn)
        .await?;
    Ok(buyer)
}
