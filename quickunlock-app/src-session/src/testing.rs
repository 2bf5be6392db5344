//! In-memory fakes for the platform collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use quickunlock_secret::{
    BiometricPrimitive, FactorKind, HardwareReport, KeyValueStore, PlatformError, PromptOutcome,
    PromptRequest, SecureKeystore, SecurityLevel,
};
use tokio::sync::Notify;

use crate::clock::Clock;
use crate::identity::{IdentitySource, SessionMaterial};

type PlatformResult<T> = quickunlock_secret::Result<T>;

#[derive(Default)]
pub struct MemoryKeystore {
    entries: Mutex<HashMap<(String, String), Vec<u8>>>,
    failure: Mutex<Option<PlatformError>>,
}

impl MemoryKeystore {
    pub fn fail_with(&self, err: PlatformError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    fn check(&self) -> PlatformResult<()> {
        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl SecureKeystore for MemoryKeystore {
    fn put(&self, namespace: &str, key: &str, bytes: &[u8]) -> PlatformResult<()> {
        self.check()?;
        self.entries
            .lock()
            .unwrap()
            .insert((namespace.to_string(), key.to_string()), bytes.to_vec());
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> PlatformResult<Option<Vec<u8>>> {
        self.check()?;
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    fn delete(&self, namespace: &str, key: &str) -> PlatformResult<()> {
        self.check()?;
        self.entries
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    read_failure: Mutex<Option<PlatformError>>,
    write_failure: Mutex<Option<PlatformError>>,
}

impl MemoryStore {
    /// Fail every read and write.
    pub fn fail_with(&self, err: PlatformError) {
        *self.read_failure.lock().unwrap() = Some(err.clone());
        *self.write_failure.lock().unwrap() = Some(err);
    }

    pub fn fail_writes_with(&self, err: PlatformError) {
        *self.write_failure.lock().unwrap() = Some(err);
    }

    fn check(slot: &Mutex<Option<PlatformError>>) -> PlatformResult<()> {
        match slot.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> PlatformResult<Option<String>> {
        Self::check(&self.read_failure)?;
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> PlatformResult<()> {
        Self::check(&self.write_failure)?;
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> PlatformResult<()> {
        Self::check(&self.write_failure)?;
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Biometric primitive with a scripted report and queued prompt outcomes.
///
/// Prompts succeed unless an outcome was queued. After [`Self::gate`] every
/// prompt waits for a `notify_one` on the returned handle.
pub struct ScriptedBiometric {
    report: HardwareReport,
    probe_failure: Mutex<Option<PlatformError>>,
    outcomes: Mutex<VecDeque<PromptOutcome>>,
    gate: Mutex<Option<Arc<Notify>>>,
    prompts: AtomicUsize,
}

impl ScriptedBiometric {
    pub fn with_report(report: HardwareReport) -> Self {
        Self {
            report,
            probe_failure: Mutex::new(None),
            outcomes: Mutex::new(VecDeque::new()),
            gate: Mutex::new(None),
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn capable() -> Self {
        Self::with_report(HardwareReport {
            has_hardware: true,
            is_enrolled: true,
            supported_factors: [FactorKind::Fingerprint].into_iter().collect(),
            security_level: SecurityLevel::BiometricStrong,
        })
    }

    pub fn absent() -> Self {
        Self::with_report(HardwareReport::default())
    }

    pub fn fail_probe(&self, err: PlatformError) {
        *self.probe_failure.lock().unwrap() = Some(err);
    }

    pub fn push_outcome(&self, outcome: PromptOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn gate(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(notify.clone());
        notify
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BiometricPrimitive for ScriptedBiometric {
    async fn probe_hardware(&self) -> PlatformResult<HardwareReport> {
        match self.probe_failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(self.report.clone()),
        }
    }

    async fn prompt(&self, _request: &PromptRequest) -> PromptOutcome {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PromptOutcome::Success)
    }
}

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn starting_at_millis(millis: i64) -> Self {
        Self {
            now: Mutex::new(Utc.timestamp_millis_opt(millis).unwrap()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Default)]
pub struct FixedIdentity {
    material: Mutex<SessionMaterial>,
}

impl FixedIdentity {
    pub fn with_profile(profile_id: &str) -> Self {
        let identity = Self::default();
        identity.set(Some(profile_id), None);
        identity
    }

    pub fn set(&self, profile_id: Option<&str>, auth_token: Option<&str>) {
        *self.material.lock().unwrap() = SessionMaterial::new(
            profile_id.map(str::to_string),
            auth_token.map(str::to_string),
        );
    }
}

impl IdentitySource for FixedIdentity {
    fn current(&self) -> SessionMaterial {
        self.material.lock().unwrap().clone()
    }
}
