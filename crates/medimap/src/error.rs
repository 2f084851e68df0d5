use thiserror::Error;

#[derive(Error, Debug)]
pub enum MedimapError {
    #[error("Schema error: {0}")]
    Schema(#[from] crate::schema::SchemaError),
    #[error("Data processing error: {0}")]
    DataProcessing(#[from] medimap_data_processing::DataError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Alias table error: {0}")]
    AliasTable(#[from] serde_json::Error),
    #[error("Invalid emergency keyword pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),
    #[error("Init Logging error: {0}")]
    InitLoggingSubscriber(String),

    /// Failures reported by external collaborators such as a [`Geocoder`](crate::Geocoder)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MedimapError>;
