use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid configuration for dataset `{dataset}`: {message}")]
    InvalidConfig { dataset: String, message: String },
}

impl ModelError {
    pub(crate) fn invalid(dataset: &str, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            dataset: dataset.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
