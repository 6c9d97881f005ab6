use serde::Serialize;
use serde_json::{Map, Value};

use super::flags::{encode_sentinel, is_sentinel_active};
use super::{number_field, string_field};

/// Field names as they appear under `devices/<id>` in the store.
pub mod fields {
    pub const NAME: &str = "Name";
    pub const ADDRESS: &str = "Address";
    pub const EMAIL: &str = "Email";
    pub const CONTACT_NUMBER: &str = "Contact Number";
    pub const SERIAL: &str = "Serial";
    pub const KWH: &str = "kwh";
    pub const PRICE: &str = "Price";
    pub const TAMPERING: &str = "tampering";
    pub const OUTAGE: &str = "OUTAGE";
    pub const PAID_STATUS: &str = "Paid Status";
    pub const STATUS: &str = "status";
    pub const ROLE: &str = "role";
}

/// One meter/customer record from the `devices/` collection.
///
/// `id` is the collection key. Flags are already decoded from their sentinel
/// strings; nothing past [`Device::from_store`] sees the raw encoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Device {
    pub id: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub contact_number: Option<String>,
    pub serial: Option<String>,
    pub kwh: Option<f64>,
    pub price: Option<f64>,
    pub tampering: bool,
    pub outage: bool,
    pub paid: bool,
    pub status: Option<String>,
    pub role: Option<String>,
}

impl Device {
    /// Build a record from the key and the raw value stored under it.
    ///
    /// A value that is not a JSON object yields a record carrying only its id.
    pub fn from_store(id: impl Into<String>, value: &Value) -> Self {
        let id = id.into();
        let Some(obj) = value.as_object() else {
            tracing::debug!(%id, "device value is not an object; keeping id only");
            return Self {
                id,
                ..Self::default()
            };
        };

        Self {
            id,
            name: string_field(obj, fields::NAME),
            address: string_field(obj, fields::ADDRESS),
            email: string_field(obj, fields::EMAIL),
            contact_number: string_field(obj, fields::CONTACT_NUMBER),
            serial: string_field(obj, fields::SERIAL),
            kwh: number_field(obj, fields::KWH),
            price: number_field(obj, fields::PRICE),
            tampering: is_sentinel_active(obj.get(fields::TAMPERING)),
            outage: is_sentinel_active(obj.get(fields::OUTAGE)),
            paid: matches!(obj.get(fields::PAID_STATUS), Some(Value::Bool(true))),
            status: string_field(obj, fields::STATUS),
            role: string_field(obj, fields::ROLE),
        }
    }

    /// Encode back into the store's field layout (without the id, which is the key).
    pub fn to_store_value(&self) -> Value {
        let mut obj = Map::new();

        let strings = [
            (fields::NAME, &self.name),
            (fields::ADDRESS, &self.address),
            (fields::EMAIL, &self.email),
            (fields::CONTACT_NUMBER, &self.contact_number),
            (fields::SERIAL, &self.serial),
            (fields::STATUS, &self.status),
            (fields::ROLE, &self.role),
        ];
        for (key, value) in strings {
            if let Some(v) = value {
                obj.insert(key.to_string(), Value::String(v.clone()));
            }
        }

        for (key, value) in [(fields::KWH, self.kwh), (fields::PRICE, self.price)] {
            if let Some(n) = value.and_then(serde_json::Number::from_f64) {
                obj.insert(key.to_string(), Value::Number(n));
            }
        }

        if let Some(v) = encode_sentinel(self.tampering) {
            obj.insert(fields::TAMPERING.to_string(), v);
        }
        if let Some(v) = encode_sentinel(self.outage) {
            obj.insert(fields::OUTAGE.to_string(), v);
        }
        if self.paid {
            obj.insert(fields::PAID_STATUS.to_string(), Value::Bool(true));
        }

        Value::Object(obj)
    }
}
