//! The public contract of the session manager.
//!
//! `authenticate()` runs Idle → Locked → Prompting → done. The lease guard
//! taken in the Locked step is held until the attempt returns (or its future
//! is dropped), so at most one native prompt is ever open.

use std::sync::Arc;

use quickunlock_secret::{BiometricPrimitive, KeyValueStore, SecureKeystore};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::capability::{CapabilityDescriptor, CapabilityProber};
use crate::clock::{Clock, SystemClock};
use crate::error::{AuthError, DisableError, SetupError, StoreError};
use crate::identity::{IdentifierResolver, IdentitySource, Resolution, UserIdentifier};
use crate::session::availability::{AvailabilityState, UnavailableReason};
use crate::session::lease::SessionLease;
use crate::storage::{PreferenceRecord, PreferenceStore, SessionConfig};
use crate::vault::{CredentialVault, Secret, VaultError};

/// Where the unlock state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    Idle,
    /// Lease held, availability being re-checked.
    Locked,
    /// The native prompt is showing.
    Prompting,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Locked => write!(f, "locked"),
            Self::Prompting => write!(f, "prompting"),
        }
    }
}

/// Platform services the orchestrator is built on.
pub struct Collaborators {
    pub biometric: Arc<dyn BiometricPrimitive>,
    pub keystore: Arc<dyn SecureKeystore>,
    pub store: Arc<dyn KeyValueStore>,
    pub identity: Arc<dyn IdentitySource>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    pub fn new(
        biometric: Arc<dyn BiometricPrimitive>,
        keystore: Arc<dyn SecureKeystore>,
        store: Arc<dyn KeyValueStore>,
        identity: Arc<dyn IdentitySource>,
    ) -> Self {
        Self {
            biometric,
            keystore,
            store,
            identity,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

enum Assessment {
    State(AvailabilityState),
    /// Flags promise a secret the vault cannot produce.
    Corrupt,
}

pub struct SessionOrchestrator {
    config: SessionConfig,
    biometric: Arc<dyn BiometricPrimitive>,
    prober: CapabilityProber,
    vault: Arc<CredentialVault>,
    preferences: Arc<PreferenceStore>,
    resolver: IdentifierResolver,
    lease: SessionLease,
}

impl SessionOrchestrator {
    pub fn new(config: SessionConfig, deps: Collaborators) -> Result<Self, StoreError> {
        config.validate()?;

        let vault = Arc::new(CredentialVault::new(
            deps.keystore,
            config.keystore_namespace.clone(),
            deps.clock.clone(),
        ));
        let preferences = Arc::new(PreferenceStore::new(
            deps.store.clone(),
            deps.clock.clone(),
            config.platform,
        ));
        let resolver = IdentifierResolver::new(
            deps.identity,
            deps.store.clone(),
            vault.clone(),
            preferences.clone(),
            deps.clock.clone(),
        );
        let lease = SessionLease::new(
            deps.store,
            deps.clock,
            config.lease_expiry(),
            config.cooldown(),
        );

        info!(
            "Session manager ready (platform: {}, namespace: {})",
            config.platform, config.keystore_namespace
        );

        Ok(Self {
            prober: CapabilityProber::new(deps.biometric.clone()),
            biometric: deps.biometric,
            config,
            vault,
            preferences,
            resolver,
            lease,
        })
    }

    /// What the UI may offer right now. Every read failure degrades to
    /// `Unavailable`; a corrupt configuration is reset and reported as
    /// `ReadyForSetup`.
    pub async fn check_availability(&self) -> AvailabilityState {
        let Some(id) = self.current_identifier() else {
            debug!("Availability: no identifier");
            return AvailabilityState::Unavailable(UnavailableReason::IdentifierMissing);
        };
        let state = self.availability_for(&id).await;
        debug!("Availability for {}: {}", id, state);
        state
    }

    /// Store `secret` and switch biometric unlock on for the current user.
    pub async fn setup(&self, secret: &Secret) -> Result<(), SetupError> {
        if secret.is_empty() {
            return Err(SetupError::EmptySecret);
        }
        let id = self
            .current_identifier()
            .ok_or(SetupError::IdentifierMissing)?;

        match self.availability_for(&id).await {
            AvailabilityState::ReadyForSetup => {}
            AvailabilityState::ReadyForUnlock => return Err(SetupError::AlreadyConfigured),
            AvailabilityState::Unavailable(reason) => return Err(SetupError::NotReady(reason)),
        }

        self.vault.store(&id, secret)?;
        if let Err(e) = self.preferences.mark_configured(&id) {
            warn!("Failed to save preferences for {}, rolling back: {}", id, e);
            if let Err(rollback) = self.vault.delete(&id) {
                error!("Failed to roll back credential for {}: {}", id, rollback);
            }
            return Err(e.into());
        }

        info!("Biometric unlock set up for {}", id);
        Ok(())
    }

    /// Replace the stored secret of an already configured user.
    pub async fn update_secret(&self, secret: &Secret) -> Result<(), SetupError> {
        if secret.is_empty() {
            return Err(SetupError::EmptySecret);
        }
        let id = self
            .current_identifier()
            .ok_or(SetupError::IdentifierMissing)?;

        match self.availability_for(&id).await {
            AvailabilityState::ReadyForUnlock => {}
            AvailabilityState::ReadyForSetup => {
                return Err(SetupError::NotReady(UnavailableReason::NotConfigured))
            }
            AvailabilityState::Unavailable(reason) => return Err(SetupError::NotReady(reason)),
        }

        self.vault.store(&id, secret)?;
        info!("Rotated biometric unlock credential for {}", id);
        Ok(())
    }

    /// Run one biometric unlock attempt and return the stored secret.
    pub async fn authenticate(&self) -> Result<Secret, AuthError> {
        let guard = self.lease.try_acquire().map_err(|denied| {
            info!("Unlock attempt rejected: {:?}", denied);
            AuthError::from(denied)
        })?;

        let Some(id) = self.current_identifier() else {
            return Err(AuthError::IdentifierMissing);
        };

        match self.assess(&id).await {
            Assessment::State(AvailabilityState::ReadyForUnlock) => {}
            Assessment::State(AvailabilityState::ReadyForSetup) => {
                return Err(AuthError::NotReady(UnavailableReason::NotConfigured));
            }
            Assessment::State(AvailabilityState::Unavailable(reason)) => {
                info!("Unlock for {} not possible: {}", id, reason);
                return Err(AuthError::NotReady(reason));
            }
            Assessment::Corrupt => {
                self.reset_corrupt(&id);
                return Err(AuthError::CorruptState);
            }
        }

        guard.enter_prompting();
        debug!("Showing biometric prompt for {}", id);
        let outcome = self.biometric.prompt(&self.config.prompt_request()).await;
        if let Some(err) = AuthError::from_outcome(outcome) {
            info!("Biometric prompt for {} ended without success: {}", id, err);
            return Err(err);
        }

        match self.vault.retrieve(&id) {
            Ok(Some(secret)) if !secret.is_empty() => {
                info!("Biometric unlock succeeded for {}", id);
                Ok(secret)
            }
            Ok(_) => {
                warn!("Prompt succeeded but no credential is stored for {}", id);
                self.reset_corrupt(&id);
                Err(AuthError::CorruptState)
            }
            Err(e) => {
                warn!("Prompt succeeded but credential for {} is unreadable: {}", id, e);
                self.reset_corrupt(&id);
                Err(AuthError::CorruptState)
            }
        }
    }

    /// Remove the stored secret and flags of the current user. Idempotent.
    pub fn disable(&self) -> Result<(), DisableError> {
        match self.current_identifier() {
            Some(id) => self.disable_identifier(&id),
            None => {
                debug!("Disable requested without an identifier; nothing to do");
                Ok(())
            }
        }
    }

    pub fn phase(&self) -> SessionPhase {
        if self.lease.is_prompting() {
            SessionPhase::Prompting
        } else if self.lease.is_held() {
            SessionPhase::Locked
        } else {
            SessionPhase::Idle
        }
    }

    pub async fn capabilities(&self) -> CapabilityDescriptor {
        self.prober.probe().await
    }

    pub fn resolve_identifier(&self) -> Resolution {
        self.resolver.resolve()
    }

    pub fn preference_record(
        &self,
        id: &UserIdentifier,
    ) -> Result<Option<PreferenceRecord>, StoreError> {
        self.preferences.load(id)
    }

    pub fn lease(&self) -> &SessionLease {
        &self.lease
    }

    pub fn resolver(&self) -> &IdentifierResolver {
        &self.resolver
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn current_identifier(&self) -> Option<UserIdentifier> {
        self.resolver.resolve().into_identifier()
    }

    async fn availability_for(&self, id: &UserIdentifier) -> AvailabilityState {
        match self.assess(id).await {
            Assessment::State(state) => state,
            Assessment::Corrupt => {
                if self.reset_corrupt(id) {
                    AvailabilityState::ReadyForSetup
                } else {
                    AvailabilityState::Unavailable(UnavailableReason::CorruptState)
                }
            }
        }
    }

    async fn assess(&self, id: &UserIdentifier) -> Assessment {
        let capability = self.prober.probe().await;
        if let Some(reason) = capability.unavailable_reason(self.config.minimum_security_level) {
            return Assessment::State(AvailabilityState::Unavailable(reason));
        }

        let record = match self.preferences.load(id) {
            Ok(record) => record,
            Err(e) => {
                warn!("Preferences for {} unreadable: {}", id, e);
                return Assessment::State(AvailabilityState::Unavailable(
                    UnavailableReason::PreferenceUnreadable(e.to_string()),
                ));
            }
        };
        if !record.as_ref().is_some_and(PreferenceRecord::is_configured) {
            return Assessment::State(AvailabilityState::ReadyForSetup);
        }

        match self.vault.retrieve(id) {
            Ok(Some(secret)) if !secret.is_empty() => {
                Assessment::State(AvailabilityState::ReadyForUnlock)
            }
            Ok(_) => {
                warn!("{} is marked configured but has no stored credential", id);
                Assessment::Corrupt
            }
            Err(e @ (VaultError::Corrupted(_) | VaultError::EnrollmentChanged)) => {
                warn!("Stored credential for {} is unrecoverable: {}", id, e);
                Assessment::Corrupt
            }
            Err(e) => {
                warn!("Vault for {} unreadable: {}", id, e);
                Assessment::State(AvailabilityState::Unavailable(
                    UnavailableReason::VaultUnreadable(e.to_string()),
                ))
            }
        }
    }

    /// Disable after detecting corrupt state. Returns whether the reset worked.
    fn reset_corrupt(&self, id: &UserIdentifier) -> bool {
        match self.disable_identifier(id) {
            Ok(()) => {
                warn!("Reset inconsistent biometric unlock state for {}", id);
                true
            }
            Err(e) => {
                error!("Failed to reset corrupt state for {}: {}", id, e);
                false
            }
        }
    }

    fn disable_identifier(&self, id: &UserIdentifier) -> Result<(), DisableError> {
        let cleared = self.preferences.clear(id);
        let deleted = self.vault.delete(id);
        cleared?;
        deleted?;
        info!("Biometric unlock disabled for {}", id);
        Ok(())
    }
}
