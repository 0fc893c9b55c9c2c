use thiserror::Error;
use xopt_core::XoptError;

/// A result type for Bayesian optimization errors
pub type Result<T> = std::result::Result<T, BoError>;

/// An error for Bayesian optimization generators
#[derive(Error, Debug)]
pub enum BoError {
    /// When a gaussian process cannot be trained or used
    #[error("GP error")]
    GpError(#[from] egobox_gp::GpError),
    /// When the core toolbox reports an error
    #[error(transparent)]
    XoptError(#[from] XoptError),
    /// When configuration is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfigError(String),
    /// When an invalid value is encountered
    #[error("Value error: {0}")]
    InvalidValue(String),
    /// When json (de)serialization fails
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}

impl From<BoError> for XoptError {
    fn from(err: BoError) -> Self {
        match err {
            BoError::XoptError(err) => err,
            BoError::InvalidConfigError(msg) => XoptError::GeneratorError(msg),
            BoError::InvalidValue(msg) => XoptError::InvalidValue(msg),
            BoError::GpError(err) => XoptError::ModelError(err.to_string()),
            BoError::JsonError(err) => XoptError::JsonError(err),
        }
    }
}
