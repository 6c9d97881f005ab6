use std::{fs::File, path::PathBuf, pin::Pin};

use csv::StringRecord;
use futures::Stream;
use meter_client::{domain::flags::is_sentinel_active, store::Envelope, Device};
use serde_json::Value;

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("source error: {0}")]
    Io(String),
    #[error("row {row}: {message}")]
    Row { row: usize, message: String },
}

/// CSV import of device records.
///
/// Expected header columns (by name):
/// - name, email
/// - contact_number, address, serial (optional)
/// - kwh, price (optional, numeric)
/// - tampering, outage, paid (optional, `true`/`false`/`1`/`0`/`yes`/`no`,
///   or the store's own `true:` marker)
/// - status (optional)
///
/// Records carry no id; one is allocated when they are written.
pub struct DeviceCsvFileSource {
    path: PathBuf,
}

impl DeviceCsvFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn stream(&self) -> Pin<Box<dyn Stream<Item = Result<Envelope<Device>, SourceError>> + Send>> {
        let path = self.path.clone();
        let s = async_stream::try_stream! {
            let file = File::open(&path)
                .map_err(|e| SourceError::Io(format!("failed to open CSV file {}: {e}", path.display())))?;
            let mut rdr = csv::Reader::from_reader(file);
            let headers = rdr
                .headers()
                .map_err(|e| SourceError::Io(format!("failed to read CSV headers: {e}")))?
                .clone();

            for (idx, result) in rdr.records().enumerate() {
                // Header is line 1.
                let row = idx + 2;
                let record = result.map_err(|e| SourceError::Io(format!("failed to read CSV record: {e}")))?;
                let device = record_to_device(&record, &headers)
                    .map_err(|message| SourceError::Row { row, message })?;
                yield Envelope::now(device);
            }
        };

        Box::pin(s)
    }
}

fn optional_string(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn optional_f64(name: &str, s: &str) -> Result<Option<f64>, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| format!("invalid {name} '{trimmed}'"))
}

fn flag(name: &str, s: &str) -> Result<bool, String> {
    if is_sentinel_active(Some(&Value::String(s.to_string()))) {
        return Ok(true);
    }
    match s.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "no" => Ok(false),
        "true" | "1" | "yes" => Ok(true),
        other => Err(format!("invalid {name} flag '{other}'")),
    }
}

fn record_to_device(record: &StringRecord, headers: &StringRecord) -> Result<Device, String> {
    let get = |name: &str| -> &str {
        headers
            .iter()
            .position(|h| h == name)
            .and_then(|idx| record.get(idx))
            .unwrap_or("")
    };

    let name = optional_string(get("name")).ok_or("missing name")?;
    let email = optional_string(get("email")).ok_or("missing email")?;

    Ok(Device {
        id: String::new(),
        name: Some(name),
        address: optional_string(get("address")),
        email: Some(email),
        contact_number: optional_string(get("contact_number")),
        serial: optional_string(get("serial")),
        kwh: optional_f64("kwh", get("kwh"))?,
        price: optional_f64("price", get("price"))?,
        tampering: flag("tampering", get("tampering"))?,
        outage: flag("outage", get("outage"))?,
        paid: flag("paid", get("paid"))?,
        status: optional_string(get("status")),
        role: None,
    })
}
