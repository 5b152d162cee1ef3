//! # Storefront engine public API
//!
//! The `store_api` module exposes the programmatic API of the storefront engine. The API is modular, so clients can
//! pick and choose the functionality they want.
//!
//! * [`fulfillment_api`] drives orders from purchase request to a terminal state, and grants entitlements.
//! * [`accounts_api`] provides read-only views over a buyer's orders and owned games.
//!
//! The other submodules in this module are support types.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the backend traits required by the
//! API (and, for fulfillment, a payment gateway).
//!
//! ```rust,ignore
//! use gamestore_engine::{AccountApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements AccountManagement
//! let api = AccountApi::new(db);
//! let orders = api.orders_for_buyer(42).await?;
//! ```

pub mod accounts_api;
pub mod errors;
pub mod fulfillment_api;
pub mod order_objects;
