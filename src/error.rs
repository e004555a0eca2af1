//! Error taxonomy for the retrieval and assembly core.
//!
//! Three families: input errors (rejected before any retrieval), contract
//! violations (caller bugs such as mismatched vector dimensions), and storage
//! errors propagated unchanged from the repository layer. Degraded-mode
//! conditions (unsafe regex, bad dates, embedding outages) are never errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("unsupported query strategy: {0}")]
    UnsupportedStrategy(String),

    #[error("scope id is required for {0} scope")]
    MissingScopeId(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("vector dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("length mismatch: {values} values vs {weights} weights")]
    LengthMismatch { values: usize, weights: usize },

    #[error("{}", model_not_found_message(.model_type, .version.as_deref()))]
    ModelNotFound {
        model_type: String,
        version: Option<String>,
    },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn model_not_found_message(model_type: &str, version: Option<&str>) -> String {
    match version {
        Some(v) => format!("model not found: {model_type}@{v}"),
        None => format!("model not found: {model_type}"),
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;
