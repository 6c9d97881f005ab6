use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::string_field;

/// Admin id shown when the stored profile has none.
pub const DEFAULT_ADMIN_ID: &str = "110A";

/// Singleton record stored at `companyProfile/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    #[serde(default = "default_admin_id")]
    pub admin_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub email: String,
}

fn default_admin_id() -> String {
    DEFAULT_ADMIN_ID.to_string()
}

impl Default for CompanyProfile {
    fn default() -> Self {
        Self {
            admin_id: default_admin_id(),
            name: String::new(),
            address: String::new(),
            email: String::new(),
        }
    }
}

impl CompanyProfile {
    /// Decode the value at `companyProfile/`. Missing or empty fields fall back
    /// to the defaults, so an absent profile reads as [`CompanyProfile::default`].
    pub fn from_store(value: Option<&Value>) -> Self {
        let Some(obj) = value.and_then(Value::as_object) else {
            return Self::default();
        };

        let non_empty = |key: &str| string_field(obj, key).filter(|s| !s.is_empty());

        Self {
            admin_id: non_empty("adminId").unwrap_or_else(default_admin_id),
            name: non_empty("name").unwrap_or_default(),
            address: non_empty("address").unwrap_or_default(),
            email: non_empty("email").unwrap_or_default(),
        }
    }

    pub fn to_store_value(&self) -> Value {
        json!({
            "adminId": self.admin_id,
            "name": self.name,
            "address": self.address,
            "email": self.email,
        })
    }
}
