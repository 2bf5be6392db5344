//! Single-slot reservation serializing unlock attempts.
//!
//! Two layers back one lease:
//! - an in-process flag taken with compare-and-swap
//! - a persisted mirror `{holder, held_since}` that survives a restart
//!
//! A mirror left behind by a crashed process is reclaimed once it is older
//! than the expiry window. The in-process flag is never reclaimed: while it is
//! set the holder is alive and its prompt is still open.
//!
//! [`LeaseGuard`] releases both layers in `Drop`, so every exit path of an
//! unlock attempt (including a dropped future) frees the lease and stamps the
//! completion time used by the cooldown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use quickunlock_secret::KeyValueStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{AuthError, StoreError};

pub const LEASE_KEY: &str = "quickunlock.session.lease";
pub const LAST_COMPLETED_KEY: &str = "quickunlock.session.last_completed";

/// Persisted mirror of a held lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseRecord {
    pub holder: Uuid,
    pub held_since: DateTime<Utc>,
}

impl LeaseRecord {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.held_since
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseDenied {
    /// Another attempt holds the lease.
    Held,
    /// The previous attempt finished less than the cooldown ago.
    CoolingDown { remaining_ms: i64 },
}

impl From<LeaseDenied> for AuthError {
    fn from(denied: LeaseDenied) -> Self {
        match denied {
            LeaseDenied::Held => AuthError::SessionLocked,
            LeaseDenied::CoolingDown { .. } => AuthError::RateLimited,
        }
    }
}

pub struct SessionLease {
    held: AtomicBool,
    prompting: AtomicBool,
    last_completed: Mutex<Option<DateTime<Utc>>>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    expiry: Duration,
    cooldown: Duration,
}

impl SessionLease {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        expiry: Duration,
        cooldown: Duration,
    ) -> Self {
        Self {
            held: AtomicBool::new(false),
            prompting: AtomicBool::new(false),
            last_completed: Mutex::new(None),
            store,
            clock,
            expiry,
            cooldown,
        }
    }

    /// Reserve the lease for one unlock attempt.
    pub fn try_acquire(&self) -> Result<LeaseGuard<'_>, LeaseDenied> {
        if self
            .held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Lease held in process, rejecting attempt");
            return Err(LeaseDenied::Held);
        }

        let now = self.clock.now();
        if let Err(denied) = self.check_mirror(now).and_then(|()| self.check_cooldown(now)) {
            self.held.store(false, Ordering::Release);
            return Err(denied);
        }

        let record = LeaseRecord {
            holder: Uuid::new_v4(),
            held_since: now,
        };
        match serde_json::to_string(&record) {
            Ok(content) => {
                if let Err(e) = self.store.set(LEASE_KEY, &content) {
                    warn!("Failed to persist lease mirror, continuing in-process only: {}", e);
                }
            }
            Err(e) => warn!("Failed to encode lease mirror: {}", e),
        }
        debug!("Lease acquired by {}", record.holder);

        Ok(LeaseGuard {
            lease: self,
            record,
        })
    }

    /// The persisted mirror, if any.
    pub fn inspect(&self) -> Result<Option<LeaseRecord>, StoreError> {
        match self.store.get(LEASE_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Force-remove the persisted mirror. The in-process flag is untouched.
    pub fn clear_mirror(&self) -> Result<(), StoreError> {
        self.store.remove(LEASE_KEY)?;
        info!("Cleared persisted lease mirror");
        Ok(())
    }

    /// When the last attempt finished, from memory or the persisted stamp.
    pub fn last_completed(&self) -> Option<DateTime<Utc>> {
        let in_memory = self.last_completed.lock().ok().and_then(|guard| *guard);
        let persisted = match self.store.get(LAST_COMPLETED_KEY) {
            Ok(Some(raw)) => DateTime::parse_from_rfc3339(&raw)
                .map(|at| at.with_timezone(&Utc))
                .map_err(|e| warn!("Ignoring unreadable completion stamp: {}", e))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read completion stamp: {}", e);
                None
            }
        };
        in_memory.max(persisted)
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    pub fn is_prompting(&self) -> bool {
        self.prompting.load(Ordering::Acquire)
    }

    fn check_mirror(&self, now: DateTime<Utc>) -> Result<(), LeaseDenied> {
        let record = match self.inspect() {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(()),
            Err(e) => {
                warn!("Lease mirror unreadable, treating as stale: {}", e);
                return Ok(());
            }
        };

        let age = record.age(now);
        if age >= Duration::zero() && age < self.expiry {
            debug!(
                "Lease mirror held by {} for {}ms, rejecting attempt",
                record.holder,
                age.num_milliseconds()
            );
            return Err(LeaseDenied::Held);
        }

        info!(
            "Reclaiming stale lease held by {} since {}",
            record.holder, record.held_since
        );
        Ok(())
    }

    fn check_cooldown(&self, now: DateTime<Utc>) -> Result<(), LeaseDenied> {
        let Some(last) = self.last_completed() else {
            return Ok(());
        };
        let since = now - last;
        if since >= Duration::zero() && since < self.cooldown {
            let remaining_ms = (self.cooldown - since).num_milliseconds();
            debug!("Unlock attempt rate limited, {}ms remaining", remaining_ms);
            return Err(LeaseDenied::CoolingDown { remaining_ms });
        }
        Ok(())
    }

    fn release(&self, record: &LeaseRecord) {
        match self.inspect() {
            Ok(Some(current)) if current.holder == record.holder => {
                if let Err(e) = self.store.remove(LEASE_KEY) {
                    warn!("Failed to remove lease mirror: {}", e);
                }
            }
            Ok(Some(current)) => {
                warn!(
                    "Lease mirror now belongs to {}, leaving it in place",
                    current.holder
                );
            }
            Ok(None) => {}
            Err(e) => warn!("Lease mirror unreadable on release: {}", e),
        }

        let finished = self.clock.now();
        if let Ok(mut last) = self.last_completed.lock() {
            *last = Some(finished);
        }
        if let Err(e) = self.store.set(LAST_COMPLETED_KEY, &finished.to_rfc3339()) {
            warn!("Failed to persist completion stamp: {}", e);
        }

        self.prompting.store(false, Ordering::Release);
        self.held.store(false, Ordering::Release);
        debug!("Lease released by {}", record.holder);
    }
}

/// Proof of holding the lease. Dropping it releases the lease.
pub struct LeaseGuard<'a> {
    lease: &'a SessionLease,
    record: LeaseRecord,
}

impl LeaseGuard<'_> {
    pub fn holder(&self) -> Uuid {
        self.record.holder
    }

    /// Record that the native prompt is now showing.
    pub fn enter_prompting(&self) {
        self.lease.prompting.store(true, Ordering::Release);
    }
}

impl Drop for LeaseGuard<'_> {
    fn drop(&mut self) {
        self.lease.release(&self.record);
    }
}
