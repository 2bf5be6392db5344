//! Per-user biometric preference flags.
//!
//! Stored as JSON in the plaintext key-value store. This state is not
//! sensitive; it only records whether biometric unlock was set up and is
//! switched on. Every read that fails is treated as "not enabled".

use std::sync::Arc;

use chrono::{DateTime, Utc};
use quickunlock_secret::{KeyValueStore, Platform};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::StoreError;
use crate::identity::UserIdentifier;

const KEY_PREFIX: &str = "quickunlock.prefs.";

/// Persisted biometric flags for one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceRecord {
    pub identifier: UserIdentifier,
    pub enabled: bool,
    pub setup_completed: bool,
    pub platform: Platform,
    pub updated_at: DateTime<Utc>,
}

impl PreferenceRecord {
    /// `enabled && setup_completed`: the pair that promises a live vault entry.
    pub fn is_configured(&self) -> bool {
        self.enabled && self.setup_completed
    }
}

pub struct PreferenceStore {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    platform: Platform,
}

impl PreferenceStore {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, platform: Platform) -> Self {
        Self {
            store,
            clock,
            platform,
        }
    }

    /// Load the record for `id`, distinguishing "absent" from "unreadable".
    pub fn load(&self, id: &UserIdentifier) -> Result<Option<PreferenceRecord>, StoreError> {
        let Some(raw) = self.store.get(&storage_key(id))? else {
            return Ok(None);
        };
        let record: PreferenceRecord = serde_json::from_str(&raw)?;
        if &record.identifier != id {
            return Err(StoreError::Corrupted(format!(
                "record under {} names {}",
                id, record.identifier
            )));
        }
        Ok(Some(record))
    }

    /// Write `record` under its own identifier.
    pub fn put(&self, record: &PreferenceRecord) -> Result<(), StoreError> {
        let content = serde_json::to_string(record)?;
        self.store.set(&storage_key(&record.identifier), &content)?;
        debug!(
            "Saved preferences for {} (enabled: {}, setup: {})",
            record.identifier, record.enabled, record.setup_completed
        );
        Ok(())
    }

    pub fn set_enabled(&self, id: &UserIdentifier, enabled: bool) -> Result<(), StoreError> {
        self.update(id, |record| record.enabled = enabled)
    }

    pub fn mark_setup_completed(&self, id: &UserIdentifier) -> Result<(), StoreError> {
        self.update(id, |record| record.setup_completed = true)
    }

    /// Set both flags in one write.
    pub fn mark_configured(&self, id: &UserIdentifier) -> Result<(), StoreError> {
        self.update(id, |record| {
            record.enabled = true;
            record.setup_completed = true;
        })
    }

    /// Whether biometric unlock is switched on. Absent or unreadable ⇒ `false`.
    pub fn is_enabled(&self, id: &UserIdentifier) -> bool {
        self.read_flag(id, |record| record.enabled)
    }

    /// Whether setup finished. Absent or unreadable ⇒ `false`.
    pub fn is_setup_completed(&self, id: &UserIdentifier) -> bool {
        self.read_flag(id, |record| record.setup_completed)
    }

    /// Remove the record for `id`. Clearing a missing record succeeds.
    pub fn clear(&self, id: &UserIdentifier) -> Result<(), StoreError> {
        self.store.remove(&storage_key(id))?;
        debug!("Cleared preferences for {}", id);
        Ok(())
    }

    fn read_flag(&self, id: &UserIdentifier, flag: impl Fn(&PreferenceRecord) -> bool) -> bool {
        match self.load(id) {
            Ok(Some(record)) => flag(&record),
            Ok(None) => false,
            Err(e) => {
                warn!("Failed to read preferences for {}, treating as disabled: {}", id, e);
                false
            }
        }
    }

    fn update(
        &self,
        id: &UserIdentifier,
        apply: impl FnOnce(&mut PreferenceRecord),
    ) -> Result<(), StoreError> {
        let mut record = match self.load(id) {
            Ok(Some(record)) => record,
            Ok(None) => self.blank(id),
            Err(e) => {
                warn!("Replacing unreadable preferences for {}: {}", id, e);
                self.blank(id)
            }
        };
        apply(&mut record);
        record.platform = self.platform;
        record.updated_at = self.clock.now();
        self.put(&record)
    }

    fn blank(&self, id: &UserIdentifier) -> PreferenceRecord {
        PreferenceRecord {
            identifier: id.clone(),
            enabled: false,
            setup_completed: false,
            platform: self.platform,
            updated_at: self.clock.now(),
        }
    }
}

fn storage_key(id: &UserIdentifier) -> String {
    format!("{KEY_PREFIX}{id}")
}
