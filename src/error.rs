//! Configuration errors
//!
//! The tick path never fails; only loading settings can.

use thiserror::Error;

/// Errors raised while loading or checking movement settings
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Settings JSON could not be parsed
    #[error("failed to parse movement settings: {0}")]
    Json(#[from] serde_json::Error),

    /// A field is negative or not finite
    #[error("invalid movement setting `{field}`: {value}")]
    Invalid { field: &'static str, value: f32 },
}

/// Result type for settings operations
pub type Result<T> = std::result::Result<T, SettingsError>;
