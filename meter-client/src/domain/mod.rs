pub mod company_profile;
pub mod device;
pub mod flags;

pub use company_profile::CompanyProfile;
pub use device::Device;

use serde_json::{Map, Value};

/// Read a display string. Numbers and booleans are stringified; anything else is absent.
pub(crate) fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Read a numeric field, tolerating numbers that arrive as strings.
pub(crate) fn number_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}
