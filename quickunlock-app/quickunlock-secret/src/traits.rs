//! Collaborator interfaces consumed by the session core.
//!
//! Each platform supplies one implementation per trait:
//! - **Android/iOS**: [`crate::NativeBiometric`] and [`crate::NativeKeystore`] over the host bridge
//! - **Desktop**: `KeyringKeystore` and [`crate::UnsupportedBiometric`]
//! - **Everywhere**: [`crate::JsonFileStore`] for plaintext state

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{HardwareReport, PromptOutcome, PromptRequest};

/// The native biometric capability and prompt.
#[async_trait]
pub trait BiometricPrimitive: Send + Sync {
    /// Report hardware presence, enrollment and supported factors.
    ///
    /// # Errors
    /// Returns an error if the platform query itself failed.
    async fn probe_hardware(&self) -> Result<HardwareReport>;

    /// Show the native prompt and wait for it to finish.
    ///
    /// There is no programmatic cancel; the future resolves when the user or
    /// the OS ends the prompt.
    async fn prompt(&self, request: &PromptRequest) -> PromptOutcome;
}

/// OS-protected secret storage, encrypted at rest by the platform.
///
/// A plaintext file is never an acceptable implementation.
pub trait SecureKeystore: Send + Sync {
    /// Store `bytes` under `(namespace, key)`, replacing any previous value
    /// in a single write.
    ///
    /// # Errors
    /// Returns an error if the keystore rejects the write.
    fn put(&self, namespace: &str, key: &str, bytes: &[u8]) -> Result<()>;

    /// Read the value under `(namespace, key)`; `None` if absent.
    ///
    /// # Errors
    /// Returns an error if the keystore cannot be read.
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete the value under `(namespace, key)`. Missing entries are not an error.
    ///
    /// # Errors
    /// Returns an error if the keystore rejects the delete.
    fn delete(&self, namespace: &str, key: &str) -> Result<()>;
}

/// Plaintext persisted key-value store for non-secret state.
pub trait KeyValueStore: Send + Sync {
    /// # Errors
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// # Errors
    /// Returns an error if the value cannot be persisted.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Missing keys are not an error.
    ///
    /// # Errors
    /// Returns an error if the change cannot be persisted.
    fn remove(&self, key: &str) -> Result<()>;
}
