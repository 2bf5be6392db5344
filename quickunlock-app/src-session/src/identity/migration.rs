//! Planning the one-time move of a user's unlock state to a new identifier.
//!
//! Planning is pure: it looks at what is stored under the old and the new
//! identifier and decides whether a move is safe. Applying the plan lives in
//! the resolver, which owns the stores.

use crate::identity::UserIdentifier;
use crate::storage::PreferenceRecord;
use crate::vault::VaultEntry;

/// Everything stored for one identifier.
#[derive(Debug, Clone)]
pub struct EntryPair {
    pub identifier: UserIdentifier,
    pub preference: Option<PreferenceRecord>,
    pub vault: Option<VaultEntry>,
}

impl EntryPair {
    pub fn new(
        identifier: UserIdentifier,
        preference: Option<PreferenceRecord>,
        vault: Option<VaultEntry>,
    ) -> Self {
        Self {
            identifier,
            preference,
            vault,
        }
    }

    /// Flags say configured and the vault holds a non-empty secret.
    pub fn is_fully_configured(&self) -> bool {
        let flags = self
            .preference
            .as_ref()
            .is_some_and(PreferenceRecord::is_configured);
        let secret = self
            .vault
            .as_ref()
            .is_some_and(|entry| !entry.secret.is_empty());
        flags && secret
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDecision {
    /// Move the source pair to the target identifier.
    Migrate,
    /// The source has nothing consistent worth carrying over.
    SkipSourceIncomplete,
    /// The target already has a working configuration; leave it alone.
    SkipTargetConfigured,
    SkipSameIdentifier,
}

impl MigrationDecision {
    pub fn should_migrate(self) -> bool {
        matches!(self, MigrationDecision::Migrate)
    }
}

pub fn plan_migration(source: &EntryPair, target: &EntryPair) -> MigrationDecision {
    if source.identifier == target.identifier {
        return MigrationDecision::SkipSameIdentifier;
    }
    if target.is_fully_configured() {
        return MigrationDecision::SkipTargetConfigured;
    }
    if !source.is_fully_configured() {
        return MigrationDecision::SkipSourceIncomplete;
    }
    MigrationDecision::Migrate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::Secret;
    use chrono::{TimeZone, Utc};
    use quickunlock_secret::Platform;

    fn id(raw: &str) -> UserIdentifier {
        UserIdentifier::new(raw).unwrap()
    }

    fn configured(raw: &str, secret: &[u8]) -> EntryPair {
        let at = Utc.timestamp_millis_opt(0).unwrap();
        EntryPair::new(
            id(raw),
            Some(PreferenceRecord {
                identifier: id(raw),
                enabled: true,
                setup_completed: true,
                platform: Platform::Ios,
                updated_at: at,
            }),
            Some(VaultEntry {
                identifier: id(raw),
                secret: Secret::from_slice(secret),
                created_at: at,
            }),
        )
    }

    fn empty(raw: &str) -> EntryPair {
        EntryPair::new(id(raw), None, None)
    }

    #[test]
    fn consistent_source_moves_to_empty_target() {
        assert_eq!(
            plan_migration(&configured("profile:1", b"1234"), &empty("token:ab")),
            MigrationDecision::Migrate
        );
    }

    #[test]
    fn configured_target_is_never_overwritten() {
        assert_eq!(
            plan_migration(
                &configured("profile:1", b"1234"),
                &configured("token:ab", b"9999")
            ),
            MigrationDecision::SkipTargetConfigured
        );
    }

    #[test]
    fn inconsistent_sources_are_skipped() {
        let mut no_secret = configured("profile:1", b"1234");
        no_secret.vault = None;
        assert_eq!(
            plan_migration(&no_secret, &empty("token:ab")),
            MigrationDecision::SkipSourceIncomplete
        );

        let mut empty_secret = configured("profile:1", b"");
        empty_secret.vault.as_mut().unwrap().secret = Secret::from_slice(b"");
        assert_eq!(
            plan_migration(&empty_secret, &empty("token:ab")),
            MigrationDecision::SkipSourceIncomplete
        );

        let mut disabled = configured("profile:1", b"1234");
        disabled.preference.as_mut().unwrap().enabled = false;
        assert_eq!(
            plan_migration(&disabled, &empty("token:ab")),
            MigrationDecision::SkipSourceIncomplete
        );
    }

    #[test]
    fn partially_configured_target_can_be_replaced() {
        let mut target = configured("token:ab", b"9999");
        target.vault = None;
        assert!(plan_migration(&configured("profile:1", b"1234"), &target).should_migrate());
    }

    #[test]
    fn same_identifier_is_a_no_op() {
        assert_eq!(
            plan_migration(&configured("profile:1", b"1"), &empty("profile:1")),
            MigrationDecision::SkipSameIdentifier
        );
    }
}
