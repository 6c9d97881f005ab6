//! Snapshot normalizers: raw store value in, typed view data out.

use meter_client::{domain::CompanyProfile, Device};
use serde_json::{Map, Value};

/// Turns the raw value at a subscribed path into the data a view consumes.
///
/// Must be pure: the same snapshot always yields the same output.
pub trait Normalizer: Send + Sync + 'static {
    type Output: Clone + Default + Send + Sync + 'static;

    fn normalize(&self, snapshot: Option<&Value>) -> Self::Output;
}

/// `devices/` mapping -> ordered device list, one record per key in
/// snapshot order.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceNormalizer;

impl Normalizer for DeviceNormalizer {
    type Output = Vec<Device>;

    fn normalize(&self, snapshot: Option<&Value>) -> Vec<Device> {
        let Some(map) = snapshot.and_then(Value::as_object) else {
            return Vec::new();
        };

        let devices: Vec<Device> = map
            .iter()
            .map(|(key, value)| Device::from_store(key.clone(), value))
            .collect();

        metrics::counter!("device_records_normalized_total").increment(devices.len() as u64);
        devices
    }
}

/// Inverse of [`DeviceNormalizer`]: the `devices/` mapping that would
/// normalize back to `devices`.
pub fn denormalize_devices(devices: &[Device]) -> Value {
    let map: Map<String, Value> = devices
        .iter()
        .map(|d| (d.id.clone(), d.to_store_value()))
        .collect();
    Value::Object(map)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileNormalizer;

impl Normalizer for ProfileNormalizer {
    type Output = CompanyProfile;

    fn normalize(&self, snapshot: Option<&Value>) -> CompanyProfile {
        CompanyProfile::from_store(snapshot)
    }
}
