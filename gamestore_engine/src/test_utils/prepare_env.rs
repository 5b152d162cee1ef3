use std::path::Path;

use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::{
    db_types::{Buyer, Cents, Game, NewBuyer, NewGame},
    SqliteDatabase,
};

pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await;
}

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/gamestore_test_{}.db", dir.display(), rand::random::<u64>())
}

pub async fn run_migrations(url: &str) {
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.run_migrations().await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete");
}

pub async fn create_database<P: AsRef<Path>>(path: P) {
    let p = path.as_ref().as_os_str().to_str().expect("Database path is not valid UTF-8");
    if Sqlite::database_exists(p).await.unwrap_or(false) {
        if let Err(e) = Sqlite::drop_database(p).await {
            warn!("Error dropping database {p}: {e:?}");
        }
    }
    Sqlite::create_database(p).await.expect("Error creating database");
    info!("Created Sqlite database {p}");
}

/// Creates an active buyer and a game priced at `price`, with unique email and sku.
pub async fn seed_buyer_and_game(db: &SqliteDatabase, price: Cents) -> (Buyer, Game) {
    let tag = rand::random::<u32>();
    let buyer = db
        .create_buyer(NewBuyer::new(format!("Buyer {tag}"), format!("buyer{tag}@example.com")))
        .await
        .expect("Error creating buyer");
    let game = db
        .create_game(NewGame::new(format!("SKU-{tag}"), format!("Counting Castle {tag}"), "Mo Willems".to_string(), price))
        .await
        .expect("Error creating game");
    (buyer, game)
}
