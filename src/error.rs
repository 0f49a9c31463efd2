use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Failed to parse YAML configuration: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Capacity exceeded on link '{link}': requested {requested}, available {available}")]
    CapacityExceeded { link: String, requested: f64, available: f64 },

    #[error("Connection '{0}' is not active")]
    NotActive(String),

    #[error("Boundary call failed: {0}")]
    BoundaryError(String),

    #[error("Failed to write history: {0}")]
    HistoryError(#[from] csv::Error),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Error::NotFound { kind, id: id.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
