use quickunlock_secret::{PlatformError, PromptOutcome};
use thiserror::Error;

use crate::session::UnavailableReason;
use crate::vault::VaultError;

/// Failures of the plaintext state layer (preferences, lease mirror, config).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Io(String),

    #[error("Stored state is corrupted: {0}")]
    Corrupted(String),

    #[error("Configuration error: {0}")]
    InvalidConfig(String),
}

impl From<PlatformError> for StoreError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Encoding(msg) => StoreError::Corrupted(msg),
            other => StoreError::Io(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupted(err.to_string())
    }
}

/// Why `authenticate()` did not return a secret.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Biometric hardware is unavailable")]
    HardwareUnavailable,

    #[error("No biometrics are enrolled on this device")]
    NotEnrolled,

    #[error("Biometric prompt was cancelled")]
    UserCancelled,

    #[error("Biometric prompt was dismissed by the system")]
    SystemCancelled,

    #[error("Biometrics are locked out after too many attempts")]
    LockedOut,

    #[error("Biometric permission denied")]
    PermissionDenied,

    #[error("Another unlock attempt is in progress")]
    SessionLocked,

    #[error("Unlock attempted too soon after the previous one")]
    RateLimited,

    #[error("Biometric unlock state was inconsistent and has been reset")]
    CorruptState,

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("No user identifier is available")]
    IdentifierMissing,

    #[error("Biometric unlock is not ready: {0}")]
    NotReady(UnavailableReason),

    #[error("Biometric prompt failed with code {0}")]
    Unknown(i32),
}

impl AuthError {
    /// Transient rejections the caller may retry shortly.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::SessionLocked | AuthError::RateLimited)
    }

    /// Map a non-success prompt outcome. `Success` has no error and yields `None`.
    pub fn from_outcome(outcome: PromptOutcome) -> Option<Self> {
        match outcome {
            PromptOutcome::Success => None,
            PromptOutcome::UserCancel => Some(AuthError::UserCancelled),
            PromptOutcome::SystemCancel => Some(AuthError::SystemCancelled),
            PromptOutcome::NotEnrolled => Some(AuthError::NotEnrolled),
            PromptOutcome::LockedOut => Some(AuthError::LockedOut),
            PromptOutcome::PermissionDenied => Some(AuthError::PermissionDenied),
            PromptOutcome::Unavailable => Some(AuthError::HardwareUnavailable),
            PromptOutcome::Error(code) => Some(AuthError::Unknown(code)),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::HardwareUnavailable => "HARDWARE_UNAVAILABLE",
            AuthError::NotEnrolled => "NOT_ENROLLED",
            AuthError::UserCancelled => "USER_CANCELLED",
            AuthError::SystemCancelled => "SYSTEM_CANCELLED",
            AuthError::LockedOut => "LOCKED_OUT",
            AuthError::PermissionDenied => "PERMISSION_DENIED",
            AuthError::SessionLocked => "SESSION_LOCKED",
            AuthError::RateLimited => "RATE_LIMITED",
            AuthError::CorruptState => "CORRUPT_STATE",
            AuthError::Vault(inner) => inner.code(),
            AuthError::IdentifierMissing => "IDENTIFIER_MISSING",
            AuthError::NotReady(_) => "NOT_READY",
            AuthError::Unknown(_) => "UNKNOWN",
        }
    }
}

impl serde::Serialize for AuthError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("AuthError", 3)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("retryable", &self.is_retryable())?;
        state.end()
    }
}

/// Failures of `setup()` and `update_secret()`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("Biometric unlock cannot be set up: {0}")]
    NotReady(UnavailableReason),

    #[error("No user identifier is available")]
    IdentifierMissing,

    #[error("Biometric unlock is already set up; use update_secret to change the PIN")]
    AlreadyConfigured,

    #[error("Secret must not be empty")]
    EmptySecret,

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SetupError {
    pub fn code(&self) -> &'static str {
        match self {
            SetupError::NotReady(_) => "NOT_READY",
            SetupError::IdentifierMissing => "IDENTIFIER_MISSING",
            SetupError::AlreadyConfigured => "ALREADY_CONFIGURED",
            SetupError::EmptySecret => "EMPTY_SECRET",
            SetupError::Vault(inner) => inner.code(),
            SetupError::Store(_) => "STORE_ERROR",
        }
    }
}

impl serde::Serialize for SetupError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("SetupError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Failures of `disable()`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DisableError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_lease_rejections_are_retryable() {
        assert!(AuthError::SessionLocked.is_retryable());
        assert!(AuthError::RateLimited.is_retryable());
        assert!(!AuthError::UserCancelled.is_retryable());
        assert!(!AuthError::CorruptState.is_retryable());
    }

    #[test]
    fn prompt_outcomes_map_to_closed_errors() {
        assert_eq!(AuthError::from_outcome(PromptOutcome::Success), None);
        assert_eq!(
            AuthError::from_outcome(PromptOutcome::UserCancel),
            Some(AuthError::UserCancelled)
        );
        assert_eq!(
            AuthError::from_outcome(PromptOutcome::Unavailable),
            Some(AuthError::HardwareUnavailable)
        );
        assert_eq!(
            AuthError::from_outcome(PromptOutcome::Error(-7)),
            Some(AuthError::Unknown(-7))
        );
    }

    #[test]
    fn auth_error_serializes_code_and_message() {
        let value = serde_json::to_value(AuthError::SessionLocked).unwrap();
        assert_eq!(value["code"], "SESSION_LOCKED");
        assert_eq!(value["retryable"], true);

        let value = serde_json::to_value(AuthError::Vault(VaultError::AccessDenied)).unwrap();
        assert_eq!(value["code"], "VAULT_ACCESS_DENIED");
    }

    #[test]
    fn platform_encoding_errors_are_corruption() {
        assert!(matches!(
            StoreError::from(PlatformError::Encoding("bad".into())),
            StoreError::Corrupted(_)
        ));
        assert!(matches!(
            StoreError::from(PlatformError::Io("disk".into())),
            StoreError::Io(_)
        ));
    }
}
