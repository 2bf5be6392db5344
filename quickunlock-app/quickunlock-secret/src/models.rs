//! Data types shared between the platform adapters and the session core.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A biometric modality the device can verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FactorKind {
    Fingerprint,
    Face,
    Iris,
}

/// Strength of the strongest authenticator the device offers.
///
/// Ordered from weakest to strongest so callers can compare against a
/// configured minimum.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum SecurityLevel {
    /// Nothing enrolled.
    #[default]
    None,
    /// Only a device PIN/pattern/passcode.
    DeviceCredential,
    /// Class 2 biometric (Android) or equivalent.
    BiometricWeak,
    /// Class 3 biometric, Face ID or Touch ID.
    BiometricStrong,
}

/// The operating system family the session runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Platform {
    Android,
    Ios,
    Desktop,
}

impl Platform {
    /// Platform of the current compilation target.
    pub fn current() -> Self {
        #[cfg(target_os = "android")]
        {
            Platform::Android
        }
        #[cfg(target_os = "ios")]
        {
            Platform::Ios
        }
        #[cfg(not(any(target_os = "android", target_os = "ios")))]
        {
            Platform::Desktop
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Android => write!(f, "android"),
            Self::Ios => write!(f, "ios"),
            Self::Desktop => write!(f, "desktop"),
        }
    }
}

/// Raw hardware report returned by a [`crate::BiometricPrimitive`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareReport {
    pub has_hardware: bool,
    pub is_enrolled: bool,
    pub supported_factors: BTreeSet<FactorKind>,
    pub security_level: SecurityLevel,
}

/// Text shown by the native biometric sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRequest {
    pub title: String,
    pub subtitle: Option<String>,
    pub cancel_label: String,
}

impl Default for PromptRequest {
    fn default() -> Self {
        Self {
            title: "Unlock with biometrics".into(),
            subtitle: None,
            cancel_label: "Use PIN".into(),
        }
    }
}

/// Closed set of outcomes a biometric prompt can end in.
///
/// Platform adapters translate native error codes into this enum so the
/// session core never inspects platform strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "code", rename_all = "camelCase")]
pub enum PromptOutcome {
    Success,
    /// The user dismissed the sheet or chose the fallback button.
    UserCancel,
    /// The OS tore the sheet down (app backgrounded, another prompt, timeout).
    SystemCancel,
    NotEnrolled,
    /// Too many failed matches; the sensor is temporarily or permanently locked.
    LockedOut,
    /// The app lacks the entitlement or usage description for biometrics.
    PermissionDenied,
    /// Hardware missing or busy.
    Unavailable,
    /// Anything the code tables do not recognise.
    Error(i32),
}

impl PromptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// The backend a [`crate::SecureKeystore`] persists into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeystoreMethod {
    /// AndroidKeyStore (TEE/StrongBox) wrapped entry.
    AndroidKeystore,
    /// iOS Keychain, this-device-only accessibility.
    IOSKeychain,
    /// macOS Keychain.
    MacOSKeychain,
    /// Windows Credential Manager.
    WindowsCredentialManager,
    /// Linux Secret Service API (GNOME Keyring, KWallet, etc.)
    LinuxSecretService,
}

/// Availability of the secure keystore.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeystoreStatus {
    pub available: bool,
    pub method: Option<KeystoreMethod>,
    pub unavailable_reason: Option<String>,
}

impl KeystoreStatus {
    pub fn available(method: KeystoreMethod) -> Self {
        Self {
            available: true,
            method: Some(method),
            unavailable_reason: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            method: None,
            unavailable_reason: Some(reason.into()),
        }
    }
}
