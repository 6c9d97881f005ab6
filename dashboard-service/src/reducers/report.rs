use std::{fmt, str::FromStr};

use meter_client::Device;
use serde::Serialize;
use time::{macros::format_description, Date};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TamperStatus {
    Normal,
    #[serde(rename = "Tampering Detected")]
    TamperingDetected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutageStatus {
    #[serde(rename = "No Outage")]
    NoOutage,
    #[serde(rename = "Outage Detected")]
    OutageDetected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BillStatus {
    Paid,
    Pending,
}

pub fn tamper_status(d: &Device) -> TamperStatus {
    if d.tampering {
        TamperStatus::TamperingDetected
    } else {
        TamperStatus::Normal
    }
}

pub fn outage_status(d: &Device) -> OutageStatus {
    if d.outage {
        OutageStatus::OutageDetected
    } else {
        OutageStatus::NoOutage
    }
}

pub fn bill_status(d: &Device) -> BillStatus {
    if d.paid {
        BillStatus::Paid
    } else {
        BillStatus::Pending
    }
}

/// Single-choice status filter of the meter report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Normal,
    TamperingDetected,
    NoOutage,
    OutageDetected,
    Paid,
    Pending,
}

impl StatusFilter {
    pub const ALL: [StatusFilter; 7] = [
        Self::All,
        Self::Normal,
        Self::TamperingDetected,
        Self::NoOutage,
        Self::OutageDetected,
        Self::Paid,
        Self::Pending,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::All => "All Status",
            Self::Normal => "Normal",
            Self::TamperingDetected => "Tampering Detected",
            Self::NoOutage => "No Outage",
            Self::OutageDetected => "Outage Detected",
            Self::Paid => "Paid",
            Self::Pending => "Pending",
        }
    }

    pub fn matches(self, d: &Device) -> bool {
        match self {
            Self::All => true,
            Self::Normal => tamper_status(d) == TamperStatus::Normal,
            Self::TamperingDetected => tamper_status(d) == TamperStatus::TamperingDetected,
            Self::NoOutage => outage_status(d) == OutageStatus::NoOutage,
            Self::OutageDetected => outage_status(d) == OutageStatus::OutageDetected,
            Self::Paid => bill_status(d) == BillStatus::Paid,
            Self::Pending => bill_status(d) == BillStatus::Pending,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown status filter '{0}'")]
pub struct UnknownStatusFilter(pub String);

impl FromStr for StatusFilter {
    type Err = UnknownStatusFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.label() == s)
            .ok_or_else(|| UnknownStatusFilter(s.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportQuery {
    pub search: String,
    pub status: StatusFilter,
}

/// Case-insensitive substring match on meter id or address. An empty term matches everything.
pub fn matches_search(d: &Device, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    let term = term.to_lowercase();
    d.id.to_lowercase().contains(&term)
        || d
            .address
            .as_deref()
            .is_some_and(|a| a.to_lowercase().contains(&term))
}

pub fn filter_devices<'a>(devices: &'a [Device], query: &ReportQuery) -> Vec<&'a Device> {
    devices
        .iter()
        .filter(|d| matches_search(d, &query.search) && query.status.matches(d))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub meter_number: String,
    pub location: String,
    pub date: String,
    pub reading: String,
    pub tampering: TamperStatus,
    pub power_outage: OutageStatus,
    pub status: BillStatus,
}

impl ReportRow {
    pub fn new(d: &Device, date: &str) -> Self {
        let or_na = |v: Option<&str>| v.filter(|s| !s.is_empty()).unwrap_or("N/A").to_string();
        Self {
            meter_number: or_na(Some(d.id.as_str())),
            location: or_na(d.address.as_deref()),
            date: date.to_string(),
            reading: format_reading(d.kwh),
            tampering: tamper_status(d),
            power_outage: outage_status(d),
            status: bill_status(d),
        }
    }
}

/// `"<kwh> kWh"`, with a missing or zero reading shown as `0`.
pub fn format_reading(kwh: Option<f64>) -> String {
    match kwh {
        Some(v) if v != 0.0 && v.is_finite() => format!("{v} kWh"),
        _ => "0 kWh".to_string(),
    }
}

/// Report date in `DD Mon YYYY` form, e.g. `05 Mar 2025`.
pub fn format_report_date(date: Date) -> String {
    let fmt = format_description!("[day] [month repr:short] [year]");
    date.format(&fmt).unwrap_or_else(|_| date.to_string())
}

pub fn report_rows(devices: &[Device], query: &ReportQuery, date: Date) -> Vec<ReportRow> {
    let date = format_report_date(date);
    filter_devices(devices, query)
        .into_iter()
        .map(|d| ReportRow::new(d, &date))
        .collect()
}
