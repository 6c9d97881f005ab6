use serde_json::Value;

/// The literal the telemetry publisher writes for an active flag.
///
/// The trailing colon is part of the value.
pub const ACTIVE_SENTINEL: &str = "true:";

/// Decode a raw `tampering` / `OUTAGE` value into a boolean.
///
/// Only a string that equals [`ACTIVE_SENTINEL`] after trimming counts as
/// active. JSON `true`, the string `"true"`, numbers and absence are all
/// inactive.
pub fn is_sentinel_active(raw: Option<&Value>) -> bool {
    match raw {
        Some(Value::String(s)) => s.trim() == ACTIVE_SENTINEL,
        _ => false,
    }
}

/// Encode a flag for the store. Inactive flags are omitted entirely.
pub fn encode_sentinel(active: bool) -> Option<Value> {
    active.then(|| Value::String(ACTIVE_SENTINEL.to_string()))
}
