use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{Cents, Game, NewGame};

pub async fn fetch_game(game_id: i64, conn: &mut SqliteConnection) -> Result<Option<Game>, sqlx::Error> {
    let game = sqlx::query_as("SELECT * FROM games WHERE id = $1").bind(game_id).fetch_optional(conn).await?;
    Ok(game)
}

pub async fn fetch_game_by_sku(sku: &str, conn: &mut SqliteConnection) -> Result<Option<Game>, sqlx::Error> {
    let game = sqlx::query_as("SELECT * FROM games WHERE sku = $1").bind(sku).fetch_optional(conn).await?;
    Ok(game)
}

/// Games belong to the catalog subsystem. This is used for seeding and administration tooling.
pub async fn insert_game(game: NewGame, conn: &mut SqliteConnection) -> Result<Game, sqlx::Error> {
    let now = Utc::now();
    let game: Game = sqlx::query_as(
        r#"
            INSERT INTO games (sku, name, author, thumbnail, price, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(game.sku)
    .bind(game.name)
    .bind(game.author)
    .bind(game.thumbnail)
    .bind(game.price)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🎮️ Game #{} ({}) added to the catalog at {}", game.id, game.sku, game.price);
    Ok(game)
}

pub async fn update_game_price(
    game_id: i64,
    price: Cents,
    conn: &mut SqliteConnection,
) -> Result<Option<Game>, sqlx::Error> {
    let game = sqlx::query_as("UPDATE games SET price = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(price)
        .bind(Utc::now())
        .bind(game_id)
        .fetch_optional(conn)
        .await?;
    Ok(game)
}
