use meter_client::Device;
use serde::Serialize;

/// Alerts shown per kind on the dashboard.
pub const DEFAULT_ALERT_LIMIT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertKind {
    #[serde(rename = "Tampering Detected")]
    Tampering,
    #[serde(rename = "Outage Detected")]
    Outage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertEntry {
    pub kind: AlertKind,
    pub meter_id: String,
    pub location: String,
}

impl AlertEntry {
    fn new(kind: AlertKind, device: &Device) -> Self {
        let or_default = |v: &Option<String>, default: &str| {
            v.as_deref()
                .filter(|s| !s.is_empty())
                .unwrap_or(default)
                .to_string()
        };
        Self {
            kind,
            meter_id: if device.id.is_empty() {
                "Unknown".to_string()
            } else {
                device.id.clone()
            },
            location: or_default(&device.address, "Unknown Location"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Notifications {
    pub tampering: Vec<AlertEntry>,
    pub outages: Vec<AlertEntry>,
    /// Whether any alert is active, counted before truncation.
    pub has_active_alerts: bool,
}

pub fn tampering_alerts(devices: &[Device]) -> impl Iterator<Item = &Device> {
    devices.iter().filter(|d| d.tampering)
}

pub fn outage_alerts(devices: &[Device]) -> impl Iterator<Item = &Device> {
    devices.iter().filter(|d| d.outage)
}

/// First `limit` alerts of each kind. The lists are truncated independently,
/// so one record can appear in both.
pub fn notifications(devices: &[Device], limit: usize) -> Notifications {
    let has_active_alerts =
        tampering_alerts(devices).next().is_some() || outage_alerts(devices).next().is_some();

    Notifications {
        tampering: tampering_alerts(devices)
            .take(limit)
            .map(|d| AlertEntry::new(AlertKind::Tampering, d))
            .collect(),
        outages: outage_alerts(devices)
            .take(limit)
            .map(|d| AlertEntry::new(AlertKind::Outage, d))
            .collect(),
        has_active_alerts,
    }
}
