use thiserror::Error;

/// Error type for invalid operations.
#[derive(Error, Debug)]
pub enum ImpactError {
    #[error("{0}")]
    Error(String),
    /// A plugged-in computation broke the yearly stream contract
    #[error("Protocol violation for region {region}: {message}")]
    ProtocolViolation { region: String, message: String },
    #[error("No weight for region {0} and no \"mean\" fallback")]
    MissingWeight(String),
    #[error("Invalid day index: {0}")]
    InvalidDayIndex(String),
    #[error("Unknown weather variable: {0}")]
    UnknownVariable(String),
    #[error("Shape mismatch: expected {expected} values, got {found}")]
    ShapeMismatch { expected: usize, found: usize },
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Could not parse {context}: {message}")]
    Parse { context: String, message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Config(#[from] toml::de::Error),
}

impl ImpactError {
    pub fn protocol(region: impl ToString, message: impl Into<String>) -> Self {
        ImpactError::ProtocolViolation {
            region: region.to_string(),
            message: message.into(),
        }
    }
}

/// Convenience type for `Result<T, ImpactError>`.
pub type ImpactResult<T> = Result<T, ImpactError>;
