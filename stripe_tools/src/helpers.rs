use serde_json::Value;

/// Stripe object ids are ASCII alphanumerics and underscores. Anything else is rejected before it reaches a URL path.
pub fn is_valid_object_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 255 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Expandable fields are either the bare id or the full object.
pub fn expandable_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(o) => o.get("id").and_then(|v| v.as_str()).map(String::from),
        _ => None,
    }
}
