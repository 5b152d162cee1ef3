use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusChange, OrderStatusType},
    order_objects::OrderQueryFilter,
    traits::{ConfirmationDetails, StoreError},
};

/// Inserts a new `pending` order using the given connection. This is not atomic. You can embed this call inside a
/// transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
///
/// The `payment_ref` starts out as the checkout session id.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, StoreError> {
    let order_id = order.order_id.clone();
    let result = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                buyer_id,
                game_id,
                amount,
                currency,
                session_id,
                payment_ref,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $6, 'pending', $7, $7)
            RETURNING *;
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(order.buyer_id)
    .bind(order.game_id)
    .bind(order.amount)
    .bind(order.currency)
    .bind(order.session_id)
    .bind(order.created_at)
    .fetch_one(conn)
    .await;
    match result {
        Ok(order) => Ok(order),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(StoreError::OrderAlreadyExists(order_id)),
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_session_id(
    session_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE session_id = $1").bind(session_id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_orders_for_buyer(buyer_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE buyer_id = $1 ORDER BY julianday(created_at) DESC, id DESC")
        .bind(buyer_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Sets the status of a `pending` order to `confirmed`, recording the payment reference and invoice URL if given.
///
/// The update is conditional on the current status, so it must be the first write in the enclosing transaction.
/// Returns `true` if this call performed the transition.
pub async fn mark_confirmed(
    order_id: &OrderId,
    details: &ConfirmationDetails,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                status = 'confirmed',
                payment_ref = COALESCE($1, payment_ref),
                invoice_url = COALESCE($2, invoice_url),
                updated_at = $3
            WHERE order_id = $4 AND status = 'pending';
        "#,
    )
    .bind(details.payment_ref.as_deref())
    .bind(details.invoice_url.as_deref())
    .bind(Utc::now())
    .bind(order_id.as_str())
    .execute(conn)
    .await?;
    trace!("📝️ Confirm of order {order_id} affected {} rows", result.rows_affected());
    Ok(result.rows_affected() == 1)
}

/// Sets the status of a `pending` order to `cancelled`. Returns `true` if this call performed the transition.
pub async fn mark_cancelled(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET status = 'cancelled', updated_at = $1
            WHERE order_id = $2 AND status = 'pending';
        "#,
    )
    .bind(Utc::now())
    .bind(order_id.as_str())
    .execute(conn)
    .await?;
    trace!("📝️ Cancel of order {order_id} affected {} rows", result.rows_affected());
    Ok(result.rows_affected() == 1)
}

/// Appends an entry to the order status audit log.
pub async fn log_status_change(
    order_id: &OrderId,
    old_status: Option<OrderStatusType>,
    new_status: OrderStatusType,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO order_status_log (order_id, old_status, new_status, reason, created_at)
            VALUES ($1, $2, $3, $4, $5);
        "#,
    )
    .bind(order_id.as_str())
    .bind(old_status)
    .bind(new_status)
    .bind(reason)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    debug!("📝️ Order {order_id} status log: {} -> {new_status} ({reason})", display_status(old_status));
    Ok(())
}

fn display_status(status: Option<OrderStatusType>) -> String {
    status.map(|s| s.to_string()).unwrap_or_else(|| "∅".to_string())
}

pub async fn fetch_status_history(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderStatusChange>, sqlx::Error> {
    let history = sqlx::query_as("SELECT * FROM order_status_log WHERE order_id = $1 ORDER BY id")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(history)
}

pub async fn fetch_pending_orders_created_before(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE status = 'pending' AND julianday(created_at) < julianday($1)
            ORDER BY julianday(created_at), id;
        "#,
    )
    .bind(cutoff)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

pub async fn fetch_confirmed_orders_without_entitlement(conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
            SELECT o.* FROM orders o
            LEFT JOIN entitlements e ON e.buyer_id = o.buyer_id AND e.game_id = o.game_id
            WHERE o.status = 'confirmed' AND e.buyer_id IS NULL
            ORDER BY o.id;
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in ascending order
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id.0);
    }
    if let Some(buyer_id) = query.buyer_id {
        where_clause.push("buyer_id = ");
        where_clause.push_bind_unseparated(buyer_id);
    }
    if let Some(game_id) = query.game_id {
        where_clause.push("game_id = ");
        where_clause.push_bind_unseparated(game_id);
    }
    if let Some(session_id) = query.session_id {
        where_clause.push("session_id = ");
        where_clause.push_bind_unseparated(session_id);
    }
    if let Some(currency) = query.currency {
        where_clause.push("currency = ");
        where_clause.push_bind_unseparated(currency);
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        where_clause.push("status IN (");
        for (i, status) in statuses.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status);
        }
        where_clause.push_unseparated(")");
    }
    if let Some(since) = query.since {
        where_clause.push("julianday(created_at) >= julianday(");
        where_clause.push_bind_unseparated(since);
        where_clause.push_unseparated(")");
    }
    if let Some(until) = query.until {
        where_clause.push("julianday(created_at) <= julianday(");
        where_clause.push_bind_unseparated(until);
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY julianday(created_at) ASC, id ASC");
    trace!("📝️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("📝️ Result of search_orders: {:?}", orders.len());
    Ok(orders)
}
