//! Write paths for user/meter records and the company profile.
//!
//! Every write replaces the whole value at its key. Nothing is mutated
//! locally; the change comes back through the store subscription.

use meter_client::{
    domain::{device::fields, CompanyProfile},
    store::{child_path, key_of, LiveStore, StoreError, COMPANY_PROFILE_PATH, DEVICES_PATH},
    Device,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(thiserror::Error, Debug)]
pub enum MutationError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Write(#[from] StoreError),
}

/// Edit buffer for a user/meter record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserDraft {
    pub name: String,
    pub email: String,
    pub contact_number: String,
    pub address: String,
    pub serial: String,
    pub status: String,
}

impl Default for UserDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            email: String::new(),
            contact_number: String::new(),
            address: String::new(),
            serial: String::new(),
            status: "Active".to_string(),
        }
    }
}

impl UserDraft {
    /// Buffer pre-filled from the current record, so an edit that only
    /// touches some fields writes the others back unchanged.
    pub fn from_device(d: &Device) -> Self {
        let defaults = Self::default();
        Self {
            name: d.name.clone().unwrap_or_default(),
            email: d.email.clone().unwrap_or_default(),
            contact_number: d.contact_number.clone().unwrap_or_default(),
            address: d.address.clone().unwrap_or_default(),
            serial: d.serial.clone().unwrap_or_default(),
            status: d.status.clone().unwrap_or(defaults.status),
        }
    }

    fn validate(&self) -> Result<(), MutationError> {
        if self.name.is_empty() || self.email.is_empty() {
            return Err(MutationError::Validation("name and email are required".to_string()));
        }
        Ok(())
    }

    fn create_payload(&self) -> Value {
        json!({
            (fields::NAME): self.name,
            (fields::EMAIL): self.email,
            (fields::CONTACT_NUMBER): self.contact_number,
            (fields::STATUS): self.status,
            (fields::ADDRESS): self.address,
            (fields::SERIAL): self.serial,
        })
    }

    fn update_payload(&self) -> Value {
        json!({
            (fields::NAME): self.name,
            (fields::EMAIL): self.email,
            (fields::CONTACT_NUMBER): self.contact_number,
            (fields::ADDRESS): self.address,
            (fields::SERIAL): self.serial,
            (fields::ROLE): "User",
            (fields::STATUS): "Active",
        })
    }
}

async fn write(store: &dyn LiveStore, path: &str, value: Option<Value>) -> Result<(), MutationError> {
    metrics::counter!("store_writes_total").increment(1);
    store.write_full(path, value).await.map_err(|e| {
        metrics::counter!("store_write_failures_total").increment(1);
        tracing::error!(error = %e, path, "store write failed");
        MutationError::Write(e)
    })
}

fn record_path(id: &str) -> Result<String, MutationError> {
    if id.is_empty() {
        return Err(MutationError::Validation("an existing record id is required".to_string()));
    }
    Ok(child_path(DEVICES_PATH, id))
}

fn new_record_path(store: &dyn LiveStore) -> Result<(String, String), MutationError> {
    let path = store.append(DEVICES_PATH)?;
    let id = key_of(&path)
        .map(str::to_string)
        .ok_or_else(|| StoreError::InvalidPath(path.clone()))?;
    Ok((path, id))
}

/// Validate and write a new record under a freshly allocated key. Returns the key.
pub async fn create_user(store: &dyn LiveStore, draft: &UserDraft) -> Result<String, MutationError> {
    if let Err(e) = draft.validate() {
        metrics::counter!("mutation_validation_rejected_total").increment(1);
        return Err(e);
    }

    let (path, id) = new_record_path(store)?;
    write(store, &path, Some(draft.create_payload())).await?;
    tracing::info!(%id, "user created");
    Ok(id)
}

/// Overwrite record `id` with the draft.
///
/// This is a full replacement: any stored field the draft does not carry
/// (telemetry included) is dropped, and address/serial/contact fall back to
/// whatever the draft holds. Build the draft with [`UserDraft::from_device`]
/// to keep existing values.
pub async fn update_user(store: &dyn LiveStore, id: &str, draft: &UserDraft) -> Result<(), MutationError> {
    let path = record_path(id)?;
    write(store, &path, Some(draft.update_payload())).await?;
    tracing::info!(%id, "user updated");
    Ok(())
}

pub async fn delete_user(store: &dyn LiveStore, id: &str) -> Result<(), MutationError> {
    let path = record_path(id)?;
    write(store, &path, None).await?;
    tracing::info!(%id, "user deleted");
    Ok(())
}

/// Write a complete device record (telemetry included) under a new key.
pub async fn insert_device(store: &dyn LiveStore, device: &Device) -> Result<String, MutationError> {
    let (path, id) = new_record_path(store)?;
    write(store, &path, Some(device.to_store_value())).await?;
    Ok(id)
}

pub async fn save_profile(store: &dyn LiveStore, profile: &CompanyProfile) -> Result<(), MutationError> {
    write(store, COMPANY_PROFILE_PATH, Some(profile.to_store_value())).await?;
    tracing::info!(admin_id = %profile.admin_id, "company profile saved");
    Ok(())
}
