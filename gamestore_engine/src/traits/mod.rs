//! # Storage and gateway contracts
//!
//! This module defines the interfaces that backends and payment processors must implement in order to drive the
//! storefront fulfillment engine.
//!
//! ## Orders and entitlements
//! An order is a single purchase attempt of one game by one buyer. An entitlement records that a buyer owns a game.
//! Entitlements are only ever granted as a side effect of an order being confirmed.
//!
//! ## Traits
//! * [`FulfillmentDatabase`] defines the order lifecycle transitions and the lookups needed to start a purchase. All
//!   transitions are guarded by the current order status so that concurrent writers cannot both succeed.
//! * [`AccountManagement`] provides read-only queries over orders and entitlements.
//! * [`PaymentGateway`] is the seam to the third-party payment processor.
mod account_management;
mod data_objects;
mod fulfillment_database;
mod payment_gateway;

pub use account_management::{AccountApiError, AccountManagement};
pub use data_objects::{ConfirmationDetails, TransitionResult};
pub use fulfillment_database::{FulfillmentDatabase, StoreError};
pub use payment_gateway::{
    CheckoutRequest,
    CheckoutSession,
    Correlation,
    GatewayError,
    GatewayNotification,
    PaymentGateway,
    PaymentOutcome,
    PaymentStatus,
    SessionState,
    SessionStatus,
};
