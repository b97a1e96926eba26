//! Error types shared across the crate

use thiserror::Error;

/// Errors raised by networks, training and the persistence backends
#[derive(Debug, Error)]
pub enum GanError {
    /// Tensor rank or size inconsistent with the configured networks
    #[error("shape mismatch in {context}: expected {expected}, got {actual:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        actual: Vec<i64>,
    },

    /// A loss became NaN or infinite
    #[error("non-finite loss at generator iteration {step}: D_loss={d_loss}, G_loss={g_loss}")]
    NumericInstability { step: u64, d_loss: f64, g_loss: f64 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("torch error: {0}")]
    Torch(#[from] tch::TchError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for GanError {
    fn from(e: serde_json::Error) -> Self {
        GanError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for GanError {
    fn from(e: toml::de::Error) -> Self {
        GanError::Serialization(e.to_string())
    }
}

impl From<toml::ser::Error> for GanError {
    fn from(e: toml::ser::Error) -> Self {
        GanError::Serialization(e.to_string())
    }
}

impl From<csv::Error> for GanError {
    fn from(e: csv::Error) -> Self {
        GanError::Serialization(e.to_string())
    }
}

impl GanError {
    pub(crate) fn shape(context: &'static str, expected: impl Into<String>, actual: Vec<i64>) -> Self {
        GanError::ShapeMismatch {
            context,
            expected: expected.into(),
            actual,
        }
    }
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, GanError>;
