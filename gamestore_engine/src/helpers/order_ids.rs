use rand::{distributions::Alphanumeric, Rng};

use crate::db_types::OrderId;

pub const ORDER_ID_PREFIX: &str = "gs_";
const ORDER_ID_RANDOM_LEN: usize = 20;

/// Generates a fresh, unguessable order id, e.g. `gs_4fQ0xk2LmN8aPz1cYb7E`.
pub fn new_order_id() -> OrderId {
    let suffix: String =
        rand::thread_rng().sample_iter(&Alphanumeric).take(ORDER_ID_RANDOM_LEN).map(char::from).collect();
    OrderId(format!("{ORDER_ID_PREFIX}{suffix}"))
}

/// Cheap sanity check applied to order ids that arrive from outside (URL paths, gateway metadata).
pub fn is_valid_order_id(id: &str) -> bool {
    match id.strip_prefix(ORDER_ID_PREFIX) {
        Some(rest) => rest.len() == ORDER_ID_RANDOM_LEN && rest.chars().all(|c| c.is_ascii_alphanumeric()),
        None => false,
    }
}
