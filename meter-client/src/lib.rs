pub mod domain;
pub mod store;

pub use domain::{CompanyProfile, Device};
pub use store::{LiveStore, MemoryStore, StoreError};
