//! Biometric quick-unlock session manager.
//!
//! Decides whether a returning user may unlock with a biometric factor
//! instead of re-entering their PIN, keeps that PIN in the platform secure
//! keystore, and lets at most one unlock attempt run at a time, across
//! process restarts.
//!
//! The host app builds one [`SessionOrchestrator`] from platform
//! [`Collaborators`] and calls [`SessionOrchestrator::check_availability`],
//! [`SessionOrchestrator::setup`], [`SessionOrchestrator::authenticate`] and
//! [`SessionOrchestrator::disable`].

pub mod capability;
pub mod clock;
pub mod error;
pub mod identity;
pub mod session;
pub mod storage;
pub mod vault;

#[cfg(test)]
mod testing;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use capability::{CapabilityDescriptor, CapabilityProber};
pub use clock::{Clock, SystemClock};
pub use error::{AuthError, DisableError, SetupError, StoreError};
pub use identity::{
    IdentifierResolver, IdentitySource, Resolution, SessionMaterial, UserIdentifier,
};
pub use session::{
    AvailabilityState, Collaborators, SessionLease, SessionOrchestrator, SessionPhase,
    UnavailableReason,
};
pub use storage::{load_config, save_config, PreferenceRecord, PreferenceStore, SessionConfig};
pub use vault::{CredentialVault, RecoveredSecret, Secret, VaultEntry, VaultError};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_filter`. Calling this more than once is
/// harmless; later calls leave the first subscriber in place.
pub fn init_logging(default_filter: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
