//! Game Storefront Engine
//!
//! The storefront engine sells games to buyers through a hosted-checkout payment processor. This library contains the
//! order lifecycle and payment fulfillment logic. It is provider-agnostic.
//!
//! The library is divided into these main sections:
//! 1. Database management and control ([`mod@sqlite`] and [`mod@traits`]). You should never need to access the
//!    database directly. Instead, use the public API provided by the engine. The exception is the data types used in
//!    the database. These are defined in the `db_types` module and are public.
//! 2. The payment gateway contract ([`traits::PaymentGateway`]). Concrete processors live outside this crate.
//! 3. The engine public API ([`mod@store_api`]). [`FulfillmentApi`] takes an order from purchase request to a
//!    terminal state and grants entitlements exactly once. [`AccountApi`] provides read-only views.
//!
//! The engine also emits events when orders are confirmed or annulled. A simple actor framework in [`mod@events`]
//! lets you hook into these events, e.g. to send a receipt e-mail.
#[cfg(feature = "sqlite")]
mod sqlite;

pub mod db_types;
pub mod events;
pub mod helpers;
mod store_api;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use store_api::{
    accounts_api::AccountApi,
    errors::FulfillmentError,
    fulfillment_api::FulfillmentApi,
    order_objects,
};
pub use traits::{AccountApiError, AccountManagement, FulfillmentDatabase, PaymentGateway, StoreError};
