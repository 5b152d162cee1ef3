mod order_ids;

pub use order_ids::{is_valid_order_id, new_order_id, ORDER_ID_PREFIX};
