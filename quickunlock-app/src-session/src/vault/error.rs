//! Credential vault error types.

use quickunlock_secret::PlatformError;
use thiserror::Error;

/// Errors that can occur while reading or writing the credential vault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// The secure keystore cannot be reached on this device.
    #[error("Secure keystore unavailable: {0}")]
    Unavailable(String),

    /// The OS refused access to the keystore entry.
    #[error("Access to the secure keystore was denied")]
    AccessDenied,

    /// Biometric enrollment changed and the hardware-bound key was invalidated.
    #[error("Biometric enrollment changed; the stored credential is unrecoverable")]
    EnrollmentChanged,

    /// The stored envelope could not be decoded.
    #[error("Vault entry is corrupted: {0}")]
    Corrupted(String),

    /// Any other keystore I/O failure.
    #[error("Keystore I/O failure: {0}")]
    Io(String),
}

/// Result type alias for vault operations.
pub type VaultResult<T> = std::result::Result<T, VaultError>;

impl From<PlatformError> for VaultError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::NotAvailable(msg) => VaultError::Unavailable(msg),
            PlatformError::AccessDenied => VaultError::AccessDenied,
            PlatformError::EnrollmentChanged => VaultError::EnrollmentChanged,
            PlatformError::Encoding(msg) => VaultError::Corrupted(msg),
            other => VaultError::Io(other.to_string()),
        }
    }
}

impl VaultError {
    /// Stable code for UI-side handling.
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::Unavailable(_) => "VAULT_UNAVAILABLE",
            VaultError::AccessDenied => "VAULT_ACCESS_DENIED",
            VaultError::EnrollmentChanged => "VAULT_ENROLLMENT_CHANGED",
            VaultError::Corrupted(_) => "VAULT_CORRUPTED",
            VaultError::Io(_) => "VAULT_IO_ERROR",
        }
    }
}

impl serde::Serialize for VaultError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("VaultError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_errors_map_to_vault_errors() {
        assert_eq!(
            VaultError::from(PlatformError::AccessDenied),
            VaultError::AccessDenied
        );
        assert_eq!(
            VaultError::from(PlatformError::EnrollmentChanged),
            VaultError::EnrollmentChanged
        );
        assert!(matches!(
            VaultError::from(PlatformError::Io("disk".into())),
            VaultError::Io(_)
        ));
    }

    #[test]
    fn vault_error_serialization() {
        let json = serde_json::to_string(&VaultError::AccessDenied).unwrap();
        assert!(json.contains("VAULT_ACCESS_DENIED"));
        assert!(json.contains("denied"));
    }
}
