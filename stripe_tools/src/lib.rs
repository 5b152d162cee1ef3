mod api;
mod config;
mod error;
mod helpers;

mod data_objects;
pub mod webhook;

pub use api::StripeApi;
pub use config::StripeConfig;
pub use data_objects::{
    CheckoutPaymentStatus,
    CheckoutSession,
    CheckoutSessionStatus,
    EventData,
    Invoice,
    NewCheckoutSession,
    StripeEvent,
};
pub use error::StripeApiError;
pub use helpers::{expandable_id, is_valid_object_id};
pub use webhook::{CheckoutOutcome, SIGNATURE_HEADER};
