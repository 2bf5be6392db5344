//! Deriving the current user's identifier from session data.
//!
//! Profile data wins. When only the long-lived auth token is available the
//! identifier falls back to a digest of that token, and the binding recorded
//! on earlier profile-based sessions tells us whether the user's unlock state
//! has to be carried over to the token-based identifier.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use quickunlock_secret::KeyValueStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::clock::Clock;
use crate::error::StoreError;
use crate::identity::migration::{plan_migration, EntryPair, MigrationDecision};
use crate::identity::{TokenDigest, UserIdentifier};
use crate::storage::{PreferenceRecord, PreferenceStore};
use crate::vault::CredentialVault;

const BINDING_KEY: &str = "quickunlock.identity.binding";

/// Session data supplied by the host app.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SessionMaterial {
    pub profile_id: Option<String>,
    pub auth_token: Option<String>,
}

impl SessionMaterial {
    pub fn new(profile_id: Option<String>, auth_token: Option<String>) -> Self {
        Self {
            profile_id,
            auth_token,
        }
    }
}

impl std::fmt::Debug for SessionMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMaterial")
            .field("profile_id", &self.profile_id)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Host hook returning the current session data.
pub trait IdentitySource: Send + Sync {
    fn current(&self) -> SessionMaterial;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    FromProfile(UserIdentifier),
    FromTokenDigest(UserIdentifier),
    None,
}

impl Resolution {
    pub fn identifier(&self) -> Option<&UserIdentifier> {
        match self {
            Resolution::FromProfile(id) | Resolution::FromTokenDigest(id) => Some(id),
            Resolution::None => None,
        }
    }

    pub fn into_identifier(self) -> Option<UserIdentifier> {
        match self {
            Resolution::FromProfile(id) | Resolution::FromTokenDigest(id) => Some(id),
            Resolution::None => None,
        }
    }
}

/// Which identifier the current auth token last resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityBinding {
    /// Hex SHA-256 of the token.
    pub token_digest: String,
    pub identifier: UserIdentifier,
    /// Set once the unlock state was carried over to this identifier.
    pub migrated_to: Option<UserIdentifier>,
    pub updated_at: DateTime<Utc>,
}

impl IdentityBinding {
    fn is_for(&self, digest: &TokenDigest) -> bool {
        TokenDigest::from_hex(&self.token_digest).is_some_and(|stored| stored.matches(digest))
    }
}

pub struct IdentifierResolver {
    source: Arc<dyn IdentitySource>,
    store: Arc<dyn KeyValueStore>,
    vault: Arc<CredentialVault>,
    preferences: Arc<PreferenceStore>,
    clock: Arc<dyn Clock>,
}

impl IdentifierResolver {
    pub fn new(
        source: Arc<dyn IdentitySource>,
        store: Arc<dyn KeyValueStore>,
        vault: Arc<CredentialVault>,
        preferences: Arc<PreferenceStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            store,
            vault,
            preferences,
            clock,
        }
    }

    /// Resolve the identifier for the current session. Total: problems with
    /// the binding or the migration are logged, never returned.
    pub fn resolve(&self) -> Resolution {
        let material = self.source.current();
        let digest = material
            .auth_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .map(TokenDigest::of);

        if let Some(profile_id) = material.profile_id.as_deref() {
            match UserIdentifier::from_profile(profile_id) {
                Ok(id) => {
                    if let Some(digest) = &digest {
                        if let Err(e) = self.record_binding(digest, &id) {
                            warn!("Failed to record identity binding: {}", e);
                        }
                    }
                    return Resolution::FromProfile(id);
                }
                Err(_) => debug!("Profile id is blank; falling back to the auth token"),
            }
        }

        match digest {
            Some(digest) => {
                let id = UserIdentifier::from_token_digest(&digest);
                self.migrate_if_needed(&digest, &id);
                Resolution::FromTokenDigest(id)
            }
            None => {
                debug!("No profile id or auth token; no identifier");
                Resolution::None
            }
        }
    }

    pub fn binding(&self) -> Result<Option<IdentityBinding>, StoreError> {
        match self.store.get(BINDING_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save_binding(&self, binding: &IdentityBinding) -> Result<(), StoreError> {
        let content = serde_json::to_string(binding)?;
        self.store.set(BINDING_KEY, &content)?;
        Ok(())
    }

    fn record_binding(&self, digest: &TokenDigest, id: &UserIdentifier) -> Result<(), StoreError> {
        let existing = match self.binding() {
            Ok(existing) => existing,
            Err(e) => {
                warn!("Replacing unreadable identity binding: {}", e);
                None
            }
        };
        if existing
            .as_ref()
            .is_some_and(|b| b.is_for(digest) && &b.identifier == id)
        {
            return Ok(());
        }

        self.save_binding(&IdentityBinding {
            token_digest: digest.to_hex(),
            identifier: id.clone(),
            migrated_to: None,
            updated_at: self.clock.now(),
        })?;
        debug!("Bound current auth token to {}", id);
        Ok(())
    }

    fn migrate_if_needed(&self, digest: &TokenDigest, target: &UserIdentifier) {
        let mut binding = match self.binding() {
            Ok(Some(binding)) => binding,
            Ok(None) => return,
            Err(e) => {
                warn!("Identity binding unreadable, skipping migration: {}", e);
                return;
            }
        };
        if !binding.is_for(digest) || &binding.identifier == target {
            return;
        }
        if binding.migrated_to.as_ref() == Some(target) {
            debug!("Unlock state already migrated to {}", target);
            return;
        }

        let (source, target_pair) = match (
            self.load_pair(&binding.identifier),
            self.load_pair(target),
        ) {
            (Ok(source), Ok(target_pair)) => (source, target_pair),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Cannot read unlock state for migration: {}", e);
                return;
            }
        };

        let decision = plan_migration(&source, &target_pair);
        debug!(
            "Migration {} -> {}: {:?}",
            binding.identifier, target, decision
        );
        if decision == MigrationDecision::Migrate {
            if let Err(e) = self.apply(&source, target) {
                warn!(
                    "Migration from {} to {} failed, will retry: {}",
                    binding.identifier, target, e
                );
                return;
            }
            info!("Migrated biometric unlock from {} to {}", binding.identifier, target);
        }

        binding.migrated_to = Some(target.clone());
        binding.updated_at = self.clock.now();
        if let Err(e) = self.save_binding(&binding) {
            warn!("Failed to mark migration complete: {}", e);
        }
    }

    fn load_pair(&self, id: &UserIdentifier) -> Result<EntryPair, String> {
        let preference = self.preferences.load(id).map_err(|e| e.to_string())?;
        let vault = self.vault.entry(id).map_err(|e| e.to_string())?;
        Ok(EntryPair::new(id.clone(), preference, vault))
    }

    /// Move the source pair under `target`. The source is removed only once
    /// both target writes have landed.
    fn apply(&self, source: &EntryPair, target: &UserIdentifier) -> Result<(), String> {
        let (Some(preference), Some(entry)) = (&source.preference, &source.vault) else {
            return Err("source pair incomplete".into());
        };

        self.vault
            .store(target, &entry.secret)
            .map_err(|e| e.to_string())?;

        let record = PreferenceRecord {
            identifier: target.clone(),
            updated_at: self.clock.now(),
            ..preference.clone()
        };
        if let Err(e) = self.preferences.put(&record) {
            if let Err(rollback) = self.vault.delete(target) {
                warn!("Failed to roll back migrated credential: {}", rollback);
            }
            return Err(e.to_string());
        }

        // Preferences first: a source without them can no longer unlock.
        if let Err(e) = self.preferences.clear(&source.identifier) {
            warn!("Failed to clear migrated preferences of {}: {}", source.identifier, e);
        }
        if let Err(e) = self.vault.delete(&source.identifier) {
            warn!("Failed to delete migrated credential of {}: {}", source.identifier, e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixedIdentity, ManualClock, MemoryKeystore, MemoryStore};
    use crate::vault::{Secret, DEFAULT_NAMESPACE};
    use quickunlock_secret::Platform;

    struct Harness {
        identity: Arc<FixedIdentity>,
        vault: Arc<CredentialVault>,
        preferences: Arc<PreferenceStore>,
        store: Arc<MemoryStore>,
        resolver: IdentifierResolver,
    }

    fn harness() -> Harness {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::starting_at_millis(1_000));
        let store = Arc::new(MemoryStore::default());
        let identity = Arc::new(FixedIdentity::default());
        let vault = Arc::new(CredentialVault::new(
            Arc::new(MemoryKeystore::default()),
            DEFAULT_NAMESPACE,
            clock.clone(),
        ));
        let preferences = Arc::new(PreferenceStore::new(
            store.clone(),
            clock.clone(),
            Platform::Android,
        ));
        let resolver = IdentifierResolver::new(
            identity.clone(),
            store.clone(),
            vault.clone(),
            preferences.clone(),
            clock,
        );
        Harness {
            identity,
            vault,
            preferences,
            store,
            resolver,
        }
    }

    fn configure(h: &Harness, id: &UserIdentifier, secret: &[u8]) {
        h.vault.store(id, &Secret::from_slice(secret)).unwrap();
        h.preferences.set_enabled(id, true).unwrap();
        h.preferences.mark_setup_completed(id).unwrap();
    }

    #[test]
    fn profile_wins_over_token() {
        let h = harness();
        h.identity.set(Some("42"), Some("tok"));
        assert_eq!(
            h.resolver.resolve(),
            Resolution::FromProfile(UserIdentifier::new("profile:42").unwrap())
        );

        let binding = h.resolver.binding().unwrap().unwrap();
        assert_eq!(binding.identifier.as_str(), "profile:42");
        assert!(binding.is_for(&TokenDigest::of("tok")));
        assert!(!h.store.get(BINDING_KEY).unwrap().unwrap().contains("tok\""));
    }

    #[test]
    fn falls_back_to_token_digest_then_none() {
        let h = harness();
        h.identity.set(None, Some("tok"));
        let resolution = h.resolver.resolve();
        assert!(matches!(resolution, Resolution::FromTokenDigest(_)));
        assert_eq!(
            resolution.identifier(),
            Some(&UserIdentifier::from_token_digest(&TokenDigest::of("tok")))
        );

        h.identity.set(None, None);
        assert_eq!(h.resolver.resolve(), Resolution::None);

        h.identity.set(Some("  "), Some(""));
        assert_eq!(h.resolver.resolve(), Resolution::None);
    }

    #[test]
    fn phone_number_profile_ids_resolve_from_profile() {
        let h = harness();
        h.identity.set(Some("+919876543210"), None);
        let resolution = h.resolver.resolve();
        assert_eq!(
            resolution,
            Resolution::FromProfile(UserIdentifier::from_profile("+919876543210").unwrap())
        );

        // Same user with a token stays on the profile key.
        h.identity.set(Some("+919876543210"), Some("tok"));
        assert_eq!(h.resolver.resolve(), resolution);

        h.identity.set(Some("José Díaz"), Some("tok"));
        assert!(matches!(h.resolver.resolve(), Resolution::FromProfile(_)));
    }

    #[test]
    fn migration_moves_state_once() {
        let h = harness();
        let profile = UserIdentifier::new("profile:42").unwrap();
        let token_id = UserIdentifier::from_token_digest(&TokenDigest::of("tok"));

        h.identity.set(Some("42"), Some("tok"));
        h.resolver.resolve();
        configure(&h, &profile, b"1234");

        h.identity.set(None, Some("tok"));
        assert_eq!(h.resolver.resolve(), Resolution::FromTokenDigest(token_id.clone()));

        assert_eq!(
            h.vault.retrieve(&token_id).unwrap().unwrap().expose(),
            b"1234"
        );
        assert!(h.preferences.load(&token_id).unwrap().unwrap().is_configured());
        assert_eq!(h.vault.retrieve(&profile).unwrap(), None);
        assert_eq!(h.preferences.load(&profile).unwrap(), None);
        assert_eq!(
            h.resolver.binding().unwrap().unwrap().migrated_to,
            Some(token_id.clone())
        );

        // A later change under the target must survive another resolve.
        h.vault.store(&token_id, &Secret::from_slice(b"5678")).unwrap();
        h.resolver.resolve();
        assert_eq!(
            h.vault.retrieve(&token_id).unwrap().unwrap().expose(),
            b"5678"
        );
    }

    #[test]
    fn migration_never_clobbers_a_configured_target() {
        let h = harness();
        let profile = UserIdentifier::new("profile:42").unwrap();
        let token_id = UserIdentifier::from_token_digest(&TokenDigest::of("tok"));

        h.identity.set(Some("42"), Some("tok"));
        h.resolver.resolve();
        configure(&h, &profile, b"1234");
        configure(&h, &token_id, b"9999");

        h.identity.set(None, Some("tok"));
        h.resolver.resolve();
        assert_eq!(
            h.vault.retrieve(&token_id).unwrap().unwrap().expose(),
            b"9999"
        );
        assert_eq!(
            h.vault.retrieve(&profile).unwrap().unwrap().expose(),
            b"1234"
        );
        assert!(h.preferences.load(&profile).unwrap().unwrap().is_configured());
    }

    #[test]
    fn disabled_state_does_not_return_under_the_old_identifier() {
        let h = harness();
        let profile = UserIdentifier::new("profile:42").unwrap();
        let token_id = UserIdentifier::from_token_digest(&TokenDigest::of("tok"));

        h.identity.set(Some("42"), Some("tok"));
        h.resolver.resolve();
        configure(&h, &profile, b"1234");

        h.identity.set(None, Some("tok"));
        h.resolver.resolve();
        h.preferences.clear(&token_id).unwrap();
        h.vault.delete(&token_id).unwrap();

        h.identity.set(Some("42"), Some("tok"));
        assert_eq!(h.resolver.resolve(), Resolution::FromProfile(profile.clone()));
        assert_eq!(h.vault.retrieve(&profile).unwrap(), None);
        assert_eq!(h.preferences.load(&profile).unwrap(), None);
    }

    #[test]
    fn different_token_does_not_migrate() {
        let h = harness();
        let profile = UserIdentifier::new("profile:42").unwrap();

        h.identity.set(Some("42"), Some("tok"));
        h.resolver.resolve();
        configure(&h, &profile, b"1234");

        h.identity.set(None, Some("other-token"));
        let resolution = h.resolver.resolve();
        let id = resolution.identifier().unwrap();
        assert_eq!(h.vault.retrieve(id).unwrap(), None);
        assert_eq!(h.resolver.binding().unwrap().unwrap().migrated_to, None);
    }

    #[test]
    fn session_material_debug_hides_token() {
        let material = SessionMaterial::new(Some("42".into()), Some("secret-token".into()));
        let printed = format!("{:?}", material);
        assert!(printed.contains("42"));
        assert!(!printed.contains("secret-token"));
    }
}
