//! What the UI may offer the user right now.

use serde::{Deserialize, Serialize};

/// Why biometric unlock cannot be offered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnavailableReason {
    HardwareUnavailable,
    NotEnrolled,
    /// Hardware is enrolled but reports no usable biometric factor.
    NoSupportedFactor,
    /// Strongest authenticator is below the configured minimum.
    InsufficientSecurity,
    /// The capability probe itself errored.
    ProbeFailed(String),
    IdentifierMissing,
    /// Capable device, but biometric unlock was never set up for this user.
    NotConfigured,
    PreferenceUnreadable(String),
    VaultUnreadable(String),
    /// Flags claim a configured unlock but the vault has no secret.
    CorruptState,
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HardwareUnavailable => write!(f, "biometric hardware unavailable"),
            Self::NotEnrolled => write!(f, "no biometrics enrolled"),
            Self::NoSupportedFactor => write!(f, "no supported biometric factor"),
            Self::InsufficientSecurity => write!(f, "biometric security level too low"),
            Self::ProbeFailed(cause) => write!(f, "capability probe failed: {}", cause),
            Self::IdentifierMissing => write!(f, "no user identifier available"),
            Self::NotConfigured => write!(f, "biometric unlock is not set up"),
            Self::PreferenceUnreadable(cause) => write!(f, "preferences unreadable: {}", cause),
            Self::VaultUnreadable(cause) => write!(f, "vault unreadable: {}", cause),
            Self::CorruptState => write!(f, "preferences and vault disagree"),
        }
    }
}

/// Result of `check_availability()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "camelCase")]
pub enum AvailabilityState {
    Unavailable(UnavailableReason),
    /// Capable device, no active configuration: offer "enable biometric unlock".
    ReadyForSetup,
    /// Fully configured: offer the biometric unlock button.
    ReadyForUnlock,
}

impl AvailabilityState {
    pub fn is_ready_for_unlock(&self) -> bool {
        matches!(self, Self::ReadyForUnlock)
    }

    pub fn unavailable_reason(&self) -> Option<&UnavailableReason> {
        match self {
            Self::Unavailable(reason) => Some(reason),
            _ => None,
        }
    }
}

impl std::fmt::Display for AvailabilityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "Unavailable ({})", reason),
            Self::ReadyForSetup => write!(f, "ReadyForSetup"),
            Self::ReadyForUnlock => write!(f, "ReadyForUnlock"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_serializes_for_the_ui() {
        let json = serde_json::to_string(&AvailabilityState::Unavailable(
            UnavailableReason::NotEnrolled,
        ))
        .unwrap();
        assert_eq!(json, r#"{"state":"unavailable","reason":{"reason":"NOT_ENROLLED"}}"#);

        let json = serde_json::to_string(&AvailabilityState::ReadyForUnlock).unwrap();
        assert_eq!(json, r#"{"state":"readyForUnlock"}"#);
    }
}
