use meter_client::Device;
use serde::Serialize;

/// A device record as the user-management table shows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub contact_number: String,
    pub address: String,
    pub serial: String,
    pub role: String,
    pub status: String,
}

fn or_default(v: &Option<String>, default: &str) -> String {
    v.as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}

impl From<&Device> for UserRow {
    fn from(d: &Device) -> Self {
        Self {
            id: d.id.clone(),
            name: or_default(&d.name, "N/A"),
            email: or_default(&d.email, "N/A"),
            contact_number: or_default(&d.contact_number, "N/A"),
            address: or_default(&d.address, "N/A"),
            serial: or_default(&d.serial, "N/A"),
            role: "User".to_string(),
            status: or_default(&d.status, "Inactive"),
        }
    }
}

pub fn user_rows(devices: &[Device]) -> Vec<UserRow> {
    devices.iter().map(UserRow::from).collect()
}
