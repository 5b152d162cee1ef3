//! Helpers for tests in this crate and in downstream crates (enable the `test_utils` feature).
mod fake_gateway;
mod prepare_env;

pub use fake_gateway::{notification_for, FakeGateway};
pub use prepare_env::{create_database, prepare_test_env, random_db_path, run_migrations, seed_buyer_and_game};
