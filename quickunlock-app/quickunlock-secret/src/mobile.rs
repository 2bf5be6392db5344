//! Mobile adapters bridging to native Android/iOS code.
//!
//! The host application implements [`NativeBridge`] on top of:
//! - **Android**: `BiometricManager`/`BiometricPrompt` + AndroidKeyStore
//! - **iOS**: `LAContext` + Keychain (this-device-only)
//!
//! The bridge hands back raw numeric codes. Everything here turns those codes
//! into the closed enums in [`crate::models`] through per-platform tables, so
//! no caller ever matches on native error strings.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PlatformError, Result};
use crate::models::{FactorKind, HardwareReport, PromptOutcome, PromptRequest, SecurityLevel};
use crate::traits::{BiometricPrimitive, SecureKeystore};

/// Host-detected missing biometric permission or usage description.
pub const BRIDGE_PERMISSION_DENIED: i32 = -1001;
/// The hardware-bound key was invalidated by an enrollment change.
pub const BRIDGE_KEY_INVALIDATED: i32 = -1002;
/// The keystore service could not be reached.
pub const BRIDGE_KEYSTORE_UNAVAILABLE: i32 = -1003;
/// The keystore refused access (device locked, interaction not allowed).
pub const BRIDGE_ACCESS_DENIED: i32 = -1004;

/// iOS `errSecAuthFailed`.
const IOS_ERR_SEC_AUTH_FAILED: i32 = -25293;
/// iOS `errSecInteractionNotAllowed`.
const IOS_ERR_SEC_INTERACTION_NOT_ALLOWED: i32 = -25308;

/// Which native code table applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlatformTarget {
    Android,
    Ios,
}

/// Capabilities as reported by the host.
///
/// `authentication_types`: 1 = fingerprint, 2 = face, 3 = iris.
/// `security_level`: 0 = none, 1 = device credential, 2 = weak biometric,
/// 3 = strong biometric.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeCapabilities {
    pub has_hardware: bool,
    pub is_enrolled: bool,
    #[serde(default)]
    pub authentication_types: Vec<i32>,
    #[serde(default)]
    pub security_level: i32,
}

/// Result of a native prompt as reported by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeAuthResult {
    pub success: bool,
    #[serde(default)]
    pub error_code: Option<i32>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A failed bridge call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeFailure {
    pub code: i32,
    pub message: String,
}

/// Implemented by the host's FFI layer.
#[async_trait]
pub trait NativeBridge: Send + Sync {
    async fn capabilities(&self) -> std::result::Result<NativeCapabilities, NativeFailure>;

    async fn authenticate(&self, request: &PromptRequest) -> NativeAuthResult;

    fn keystore_put(
        &self,
        namespace: &str,
        key: &str,
        bytes: &[u8],
    ) -> std::result::Result<(), NativeFailure>;

    fn keystore_get(
        &self,
        namespace: &str,
        key: &str,
    ) -> std::result::Result<Option<Vec<u8>>, NativeFailure>;

    fn keystore_delete(&self, namespace: &str, key: &str) -> std::result::Result<(), NativeFailure>;
}

/// [`BiometricPrimitive`] over a [`NativeBridge`].
pub struct NativeBiometric<B: NativeBridge> {
    bridge: Arc<B>,
    target: PlatformTarget,
}

impl<B: NativeBridge> NativeBiometric<B> {
    pub fn new(bridge: Arc<B>, target: PlatformTarget) -> Self {
        Self { bridge, target }
    }
}

#[async_trait]
impl<B: NativeBridge> BiometricPrimitive for NativeBiometric<B> {
    async fn probe_hardware(&self) -> Result<HardwareReport> {
        let caps = self.bridge.capabilities().await.map_err(|failure| {
            warn!(
                "Native capability query failed ({}): {}",
                failure.code, failure.message
            );
            map_bridge_failure(self.target, failure)
        })?;
        Ok(hardware_report(&caps))
    }

    async fn prompt(&self, request: &PromptRequest) -> PromptOutcome {
        let result = self.bridge.authenticate(request).await;
        if result.success {
            return PromptOutcome::Success;
        }
        let code = result.error_code.unwrap_or(0);
        let outcome = prompt_outcome(self.target, code);
        debug!(
            "Native prompt ended with code {} on {:?} -> {:?}",
            code, self.target, outcome
        );
        outcome
    }
}

/// [`SecureKeystore`] over a [`NativeBridge`].
pub struct NativeKeystore<B: NativeBridge> {
    bridge: Arc<B>,
    target: PlatformTarget,
}

impl<B: NativeBridge> NativeKeystore<B> {
    pub fn new(bridge: Arc<B>, target: PlatformTarget) -> Self {
        Self { bridge, target }
    }
}

impl<B: NativeBridge> SecureKeystore for NativeKeystore<B> {
    fn put(&self, namespace: &str, key: &str, bytes: &[u8]) -> Result<()> {
        self.bridge
            .keystore_put(namespace, key, bytes)
            .map_err(|f| map_bridge_failure(self.target, f))
    }

    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        self.bridge
            .keystore_get(namespace, key)
            .map_err(|f| map_bridge_failure(self.target, f))
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        self.bridge
            .keystore_delete(namespace, key)
            .map_err(|f| map_bridge_failure(self.target, f))
    }
}

/// Translate host capability codes into a [`HardwareReport`].
pub fn hardware_report(caps: &NativeCapabilities) -> HardwareReport {
    let supported_factors: BTreeSet<FactorKind> = caps
        .authentication_types
        .iter()
        .filter_map(|code| match code {
            1 => Some(FactorKind::Fingerprint),
            2 => Some(FactorKind::Face),
            3 => Some(FactorKind::Iris),
            other => {
                debug!("Ignoring unknown authentication type {}", other);
                None
            }
        })
        .collect();

    let security_level = match caps.security_level {
        1 => SecurityLevel::DeviceCredential,
        2 => SecurityLevel::BiometricWeak,
        3 => SecurityLevel::BiometricStrong,
        _ => SecurityLevel::None,
    };

    HardwareReport {
        has_hardware: caps.has_hardware,
        is_enrolled: caps.is_enrolled,
        supported_factors,
        security_level,
    }
}

/// Map a native prompt error code to a [`PromptOutcome`].
pub fn prompt_outcome(target: PlatformTarget, code: i32) -> PromptOutcome {
    if code == BRIDGE_PERMISSION_DENIED {
        return PromptOutcome::PermissionDenied;
    }
    match target {
        PlatformTarget::Android => android_prompt_outcome(code),
        PlatformTarget::Ios => ios_prompt_outcome(code),
    }
}

/// `BiometricPrompt.ERROR_*` constants.
fn android_prompt_outcome(code: i32) -> PromptOutcome {
    match code {
        // USER_CANCELED, NEGATIVE_BUTTON
        10 | 13 => PromptOutcome::UserCancel,
        // CANCELED, TIMEOUT
        5 | 3 => PromptOutcome::SystemCancel,
        // LOCKOUT, LOCKOUT_PERMANENT
        7 | 9 => PromptOutcome::LockedOut,
        // NO_BIOMETRICS, NO_DEVICE_CREDENTIAL
        11 | 14 => PromptOutcome::NotEnrolled,
        // HW_UNAVAILABLE, HW_NOT_PRESENT
        1 | 12 => PromptOutcome::Unavailable,
        other => PromptOutcome::Error(other),
    }
}

/// `LAError.Code` raw values.
fn ios_prompt_outcome(code: i32) -> PromptOutcome {
    match code {
        // userCancel, userFallback
        -2 | -3 => PromptOutcome::UserCancel,
        // systemCancel, appCancel
        -4 | -9 => PromptOutcome::SystemCancel,
        -8 => PromptOutcome::LockedOut,
        // passcodeNotSet, biometryNotEnrolled
        -5 | -7 => PromptOutcome::NotEnrolled,
        // biometryNotAvailable, biometryNotPaired, biometryDisconnected
        -6 | -11 | -12 => PromptOutcome::Unavailable,
        other => PromptOutcome::Error(other),
    }
}

fn map_bridge_failure(target: PlatformTarget, failure: NativeFailure) -> PlatformError {
    match (target, failure.code) {
        (_, BRIDGE_KEY_INVALIDATED) => PlatformError::EnrollmentChanged,
        (_, BRIDGE_KEYSTORE_UNAVAILABLE) => PlatformError::NotAvailable(failure.message),
        (_, BRIDGE_ACCESS_DENIED) | (_, BRIDGE_PERMISSION_DENIED) => PlatformError::AccessDenied,
        (PlatformTarget::Ios, IOS_ERR_SEC_AUTH_FAILED)
        | (PlatformTarget::Ios, IOS_ERR_SEC_INTERACTION_NOT_ALLOWED) => {
            PlatformError::AccessDenied
        }
        (_, code) => PlatformError::Bridge {
            code,
            message: failure.message,
        },
    }
}
