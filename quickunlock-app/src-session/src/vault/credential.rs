//! Per-user credential vault on top of the OS secure keystore.
//!
//! Each identifier owns exactly one keystore entry holding a versioned
//! envelope:
//!
//! ```text
//! [1 byte version = 1][8 byte created_at, unix millis, big endian][secret bytes]
//! ```
//!
//! The whole envelope is written with a single keystore `put`, so a
//! concurrent reader sees either the old entry or the new one.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use quickunlock_secret::SecureKeystore;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::clock::Clock;
use crate::identity::UserIdentifier;
use crate::vault::error::{VaultError, VaultResult};
use crate::vault::secret::Secret;

/// Keystore namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "quickunlock.pin";

const ENVELOPE_VERSION: u8 = 1;
const HEADER_LEN: usize = 1 + 8;

/// A decoded vault entry.
#[derive(Debug, Clone)]
pub struct VaultEntry {
    pub identifier: UserIdentifier,
    pub secret: Secret,
    pub created_at: DateTime<Utc>,
}

/// Opaque store/retrieve/delete of one secret per identifier.
pub struct CredentialVault {
    keystore: Arc<dyn SecureKeystore>,
    namespace: String,
    clock: Arc<dyn Clock>,
}

impl CredentialVault {
    pub fn new(
        keystore: Arc<dyn SecureKeystore>,
        namespace: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            keystore,
            namespace: namespace.into(),
            clock,
        }
    }

    /// Store `secret` for `id`, replacing any existing entry atomically.
    pub fn store(&self, id: &UserIdentifier, secret: &Secret) -> VaultResult<()> {
        let envelope = encode_envelope(self.clock.now(), secret);
        self.keystore
            .put(&self.namespace, id.as_str(), &envelope)
            .map_err(|e| {
                warn!("Failed to store credential for {}: {}", id, e);
                VaultError::from(e)
            })?;
        info!("Stored {} byte credential for {}", secret.len(), id);
        Ok(())
    }

    /// Fetch the secret for `id`, if one is stored.
    pub fn retrieve(&self, id: &UserIdentifier) -> VaultResult<Option<Secret>> {
        Ok(self.entry(id)?.map(|entry| entry.secret))
    }

    /// Fetch the full entry (secret and creation time) for `id`.
    pub fn entry(&self, id: &UserIdentifier) -> VaultResult<Option<VaultEntry>> {
        let raw = match self.keystore.get(&self.namespace, id.as_str()) {
            Ok(Some(bytes)) => Zeroizing::new(bytes),
            Ok(None) => {
                debug!("No credential stored for {}", id);
                return Ok(None);
            }
            Err(e) => {
                warn!("Failed to read credential for {}: {}", id, e);
                return Err(e.into());
            }
        };

        let (created_at, secret) = decode_envelope(&raw)?;
        Ok(Some(VaultEntry {
            identifier: id.clone(),
            secret,
            created_at,
        }))
    }

    /// Remove the entry for `id`. Deleting a missing entry succeeds.
    pub fn delete(&self, id: &UserIdentifier) -> VaultResult<()> {
        self.keystore
            .delete(&self.namespace, id.as_str())
            .map_err(|e| {
                warn!("Failed to delete credential for {}: {}", id, e);
                VaultError::from(e)
            })?;
        info!("Deleted credential for {}", id);
        Ok(())
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

fn encode_envelope(created_at: DateTime<Utc>, secret: &Secret) -> Zeroizing<Vec<u8>> {
    let mut out = Zeroizing::new(Vec::with_capacity(HEADER_LEN + secret.len()));
    out.push(ENVELOPE_VERSION);
    out.extend_from_slice(&created_at.timestamp_millis().to_be_bytes());
    out.extend_from_slice(secret.expose());
    out
}

fn decode_envelope(raw: &[u8]) -> VaultResult<(DateTime<Utc>, Secret)> {
    if raw.len() < HEADER_LEN {
        return Err(VaultError::Corrupted(format!(
            "entry too short ({} bytes)",
            raw.len()
        )));
    }
    if raw[0] != ENVELOPE_VERSION {
        return Err(VaultError::Corrupted(format!(
            "unsupported envelope version {}",
            raw[0]
        )));
    }

    let mut millis = [0u8; 8];
    millis.copy_from_slice(&raw[1..HEADER_LEN]);
    let created_at = Utc
        .timestamp_millis_opt(i64::from_be_bytes(millis))
        .single()
        .ok_or_else(|| VaultError::Corrupted("invalid creation timestamp".into()))?;

    Ok((created_at, Secret::from_slice(&raw[HEADER_LEN..])))
}
