pub mod device_csv_file;

pub use device_csv_file::{DeviceCsvFileSource, SourceError};
