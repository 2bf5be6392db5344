//! Error types for the platform secret layer.

use serde::{Deserialize, Serialize};

/// Result type alias for platform operations.
pub type Result<T> = std::result::Result<T, PlatformError>;

/// Errors raised by keystores, key-value stores and biometric probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "type", content = "message")]
pub enum PlatformError {
    /// Secure storage or biometric hardware is not available on this device.
    #[error("Platform facility not available: {0}")]
    NotAvailable(String),

    /// Access to the keystore was denied by the OS.
    #[error("Access denied to secure storage")]
    AccessDenied,

    /// Biometric enrollment changed since the entry was written; the
    /// hardware-bound key is gone and the entry can never be read again.
    #[error("Biometric enrollment changed - stored secrets are now inaccessible")]
    EnrollmentChanged,

    /// Stored bytes could not be decoded.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// I/O error while reading or writing persisted state.
    #[error("I/O error: {0}")]
    Io(String),

    /// The host bridge failed in a way the code tables do not cover.
    #[error("Native bridge error (code {code}): {message}")]
    Bridge { code: i32, message: String },

    /// Platform-specific internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for PlatformError {
    fn from(err: std::io::Error) -> Self {
        PlatformError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PlatformError {
    fn from(err: serde_json::Error) -> Self {
        PlatformError::Encoding(err.to_string())
    }
}
