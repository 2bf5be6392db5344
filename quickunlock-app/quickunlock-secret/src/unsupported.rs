//! Biometric primitive for hosts without biometric hardware.

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::models::{HardwareReport, PromptOutcome, PromptRequest};
use crate::traits::BiometricPrimitive;

/// Reports no hardware and refuses every prompt.
///
/// Used on desktop, where the keyring is unlocked with the login session and
/// no biometric sheet exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedBiometric;

#[async_trait]
impl BiometricPrimitive for UnsupportedBiometric {
    async fn probe_hardware(&self) -> Result<HardwareReport> {
        Ok(HardwareReport::default())
    }

    async fn prompt(&self, _request: &PromptRequest) -> PromptOutcome {
        debug!("Biometric prompt requested on a host without biometric hardware");
        PromptOutcome::Unavailable
    }
}
