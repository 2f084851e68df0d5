use once_cell::sync::Lazy;
use std::path::PathBuf;

pub mod raw;
pub mod test_data;

mod error;

pub use error::{DataError, Result};

// Re-export main types
pub use raw::{
    LoadedSource, RawTable, SourceId, SourceMetadata, load_csv, load_csv_bytes, normalize_header,
    read_csv_bytes,
};
pub use test_data::{FixtureHospital, HeaderStyle, TestDataConfig, create_test_data};

pub const DATA_FILE_DEFAULT: &str = "./hospital_data.csv";

/// Default dataset location: `MEDIMAP_DATA_FILE` if set, else [`DATA_FILE_DEFAULT`].
pub static DATA_FILE: Lazy<PathBuf> = Lazy::new(|| {
    let file =
        std::env::var("MEDIMAP_DATA_FILE").unwrap_or_else(|_| DATA_FILE_DEFAULT.to_string());
    PathBuf::from(file)
});
