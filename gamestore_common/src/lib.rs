mod cents;
mod helpers;

pub mod op;
mod secret;

pub use cents::{Cents, CentsConversionError, DEFAULT_CURRENCY_CODE};
pub use helpers::{parse_boolean_flag, truncate_for_log};
pub use secret::Secret;
