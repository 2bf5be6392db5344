//! Device capability probing.

use std::collections::BTreeSet;
use std::sync::Arc;

use quickunlock_secret::{BiometricPrimitive, FactorKind, HardwareReport, SecurityLevel};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::session::UnavailableReason;

/// Snapshot of what the device can verify. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityDescriptor {
    pub has_hardware: bool,
    pub is_enrolled: bool,
    pub supported_factors: BTreeSet<FactorKind>,
    pub security_level: SecurityLevel,
    /// Set only when the probe itself failed.
    pub diagnostic: Option<String>,
}

impl CapabilityDescriptor {
    /// The all-false descriptor carrying the probe failure.
    pub fn probe_failed(cause: impl Into<String>) -> Self {
        Self {
            diagnostic: Some(cause.into()),
            ..Self::default()
        }
    }

    pub fn is_usable(&self, minimum: SecurityLevel) -> bool {
        self.unavailable_reason(minimum).is_none()
    }

    /// The first check that rules biometric unlock out, if any.
    pub fn unavailable_reason(&self, minimum: SecurityLevel) -> Option<UnavailableReason> {
        if let Some(cause) = &self.diagnostic {
            return Some(UnavailableReason::ProbeFailed(cause.clone()));
        }
        if !self.has_hardware {
            return Some(UnavailableReason::HardwareUnavailable);
        }
        if !self.is_enrolled {
            return Some(UnavailableReason::NotEnrolled);
        }
        if self.supported_factors.is_empty() {
            return Some(UnavailableReason::NoSupportedFactor);
        }
        if self.security_level < minimum {
            return Some(UnavailableReason::InsufficientSecurity);
        }
        None
    }
}

impl From<HardwareReport> for CapabilityDescriptor {
    fn from(report: HardwareReport) -> Self {
        Self {
            has_hardware: report.has_hardware,
            is_enrolled: report.is_enrolled,
            supported_factors: report.supported_factors,
            security_level: report.security_level,
            diagnostic: None,
        }
    }
}

pub struct CapabilityProber {
    primitive: Arc<dyn BiometricPrimitive>,
}

impl CapabilityProber {
    pub fn new(primitive: Arc<dyn BiometricPrimitive>) -> Self {
        Self { primitive }
    }

    /// Query the device. Never fails; a query error comes back as
    /// [`CapabilityDescriptor::probe_failed`].
    pub async fn probe(&self) -> CapabilityDescriptor {
        match self.primitive.probe_hardware().await {
            Ok(report) => {
                debug!(
                    "Biometric probe: hardware={}, enrolled={}, factors={:?}, level={:?}",
                    report.has_hardware,
                    report.is_enrolled,
                    report.supported_factors,
                    report.security_level
                );
                report.into()
            }
            Err(e) => {
                warn!("Biometric capability probe failed: {}", e);
                CapabilityDescriptor::probe_failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBiometric;
    use quickunlock_secret::PlatformError;

    #[tokio::test]
    async fn probe_passes_report_through() {
        let bio = Arc::new(ScriptedBiometric::capable());
        let descriptor = CapabilityProber::new(bio).probe().await;
        assert!(descriptor.has_hardware && descriptor.is_enrolled);
        assert!(descriptor.supported_factors.contains(&FactorKind::Fingerprint));
        assert!(descriptor.is_usable(SecurityLevel::BiometricStrong));
        assert_eq!(descriptor.diagnostic, None);
    }

    #[tokio::test]
    async fn probe_errors_become_diagnostics() {
        let bio = Arc::new(ScriptedBiometric::capable());
        bio.fail_probe(PlatformError::Internal("binder died".into()));

        let descriptor = CapabilityProber::new(bio).probe().await;
        assert!(!descriptor.has_hardware);
        assert!(!descriptor.is_enrolled);
        assert!(descriptor.diagnostic.unwrap().contains("binder died"));
    }

    #[test]
    fn reasons_follow_check_order() {
        let mut descriptor = CapabilityDescriptor::default();
        assert_eq!(
            descriptor.unavailable_reason(SecurityLevel::None),
            Some(UnavailableReason::HardwareUnavailable)
        );

        descriptor.has_hardware = true;
        assert_eq!(
            descriptor.unavailable_reason(SecurityLevel::None),
            Some(UnavailableReason::NotEnrolled)
        );

        descriptor.is_enrolled = true;
        assert_eq!(
            descriptor.unavailable_reason(SecurityLevel::None),
            Some(UnavailableReason::NoSupportedFactor)
        );

        descriptor.supported_factors.insert(FactorKind::Face);
        descriptor.security_level = SecurityLevel::BiometricWeak;
        assert_eq!(
            descriptor.unavailable_reason(SecurityLevel::BiometricStrong),
            Some(UnavailableReason::InsufficientSecurity)
        );
        assert!(descriptor.is_usable(SecurityLevel::BiometricWeak));
    }
}
