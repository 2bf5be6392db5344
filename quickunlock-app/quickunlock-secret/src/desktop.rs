//! Desktop keystore using the OS keyring.
//!
//! - **macOS**: Keychain Access
//! - **Windows**: Credential Manager
//! - **Linux**: Secret Service API (GNOME Keyring, KWallet)

use keyring::Entry;
use tracing::{debug, error, info, warn};

use crate::error::{PlatformError, Result};
use crate::models::{KeystoreMethod, KeystoreStatus};
use crate::traits::SecureKeystore;

/// Service name used for keyring entries.
pub const DEFAULT_SERVICE_NAME: &str = "com.quickunlock.vault";

/// Account probed by [`KeyringKeystore::check_availability`].
const PROBE_ACCOUNT: &str = "availability-probe";

/// [`SecureKeystore`] backed by the platform keyring.
///
/// Each `(namespace, key)` pair maps to one keyring account
/// `"<namespace>/<key>"` under a fixed service name.
#[derive(Debug, Clone)]
pub struct KeyringKeystore {
    service: String,
}

impl KeyringKeystore {
    pub fn new() -> Self {
        Self::with_service(DEFAULT_SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Check whether the keyring can be reached at all.
    pub fn check_availability(&self) -> KeystoreStatus {
        debug!("Checking keyring availability for service: {}", self.service);

        let entry = match Entry::new(&self.service, PROBE_ACCOUNT) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Keyring not available: {}", e);
                return KeystoreStatus::unavailable(format!("OS keyring not available: {}", e));
            }
        };
        let method = Self::platform_method();
        match entry.get_password() {
            Ok(_) | Err(keyring::Error::NoEntry) => {
                debug!("Keyring available, method: {:?}", method);
                KeystoreStatus::available(method)
            }
            Err(e) => {
                warn!("Keyring not accessible: {:?}", e);
                KeystoreStatus::unavailable(format!("OS keyring not accessible: {}", e))
            }
        }
    }

    fn entry(&self, namespace: &str, key: &str) -> Result<Entry> {
        Entry::new(&self.service, &account_name(namespace, key)).map_err(|e| {
            error!("Failed to create keyring entry: {}", e);
            map_keyring_error(e)
        })
    }

    fn platform_method() -> KeystoreMethod {
        #[cfg(target_os = "macos")]
        {
            KeystoreMethod::MacOSKeychain
        }
        #[cfg(target_os = "windows")]
        {
            KeystoreMethod::WindowsCredentialManager
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            KeystoreMethod::LinuxSecretService
        }
    }
}

impl Default for KeyringKeystore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureKeystore for KeyringKeystore {
    fn put(&self, namespace: &str, key: &str, bytes: &[u8]) -> Result<()> {
        debug!(
            "Storing {} byte entry in keyring (service: {}, namespace: {})",
            bytes.len(),
            self.service,
            namespace
        );

        // Keyring APIs expect strings
        let encoded = base64_encode(bytes);
        self.entry(namespace, key)?
            .set_password(&encoded)
            .map_err(|e| {
                error!("Failed to store entry in keyring: {:?}", e);
                map_keyring_error(e)
            })?;

        // Read back through a fresh Entry so a cached value cannot mask a failed write
        match self.entry(namespace, key)?.get_password() {
            Ok(readback) if readback == encoded => {
                info!("Keyring entry written and verified");
                Ok(())
            }
            Ok(_) => {
                error!("Keyring verification failed - stored data doesn't match");
                Err(PlatformError::Internal(
                    "Keyring verification failed: data mismatch".into(),
                ))
            }
            Err(e) => {
                error!("Keyring verification failed - cannot read back: {:?}", e);
                Err(PlatformError::Internal(format!(
                    "Keyring verification failed: write succeeded but read-back failed: {}",
                    e
                )))
            }
        }
    }

    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let encoded = match self.entry(namespace, key)?.get_password() {
            Ok(password) => password,
            Err(keyring::Error::NoEntry) => {
                debug!("No keyring entry for namespace {}", namespace);
                return Ok(None);
            }
            Err(e) => {
                error!("Failed to read keyring entry: {:?}", e);
                return Err(map_keyring_error(e));
            }
        };

        let bytes = base64_decode(&encoded).map_err(|e| {
            error!("Failed to decode keyring entry: {}", e);
            PlatformError::Encoding(format!("Failed to decode keyring entry: {}", e))
        })?;
        debug!("Read {} byte entry from keyring", bytes.len());
        Ok(Some(bytes))
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        match self.entry(namespace, key)?.delete_credential() {
            Ok(()) => {
                info!("Keyring entry deleted");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => {
                debug!("No keyring entry to delete (already gone)");
                Ok(())
            }
            Err(e) => {
                error!("Failed to delete keyring entry: {:?}", e);
                Err(map_keyring_error(e))
            }
        }
    }
}

fn account_name(namespace: &str, key: &str) -> String {
    format!("{}/{}", namespace, key)
}

fn map_keyring_error(err: keyring::Error) -> PlatformError {
    match err {
        keyring::Error::NoEntry => PlatformError::Internal("Keyring entry vanished".into()),
        keyring::Error::Ambiguous(_) => {
            PlatformError::Internal("Multiple keyring entries found".into())
        }
        keyring::Error::NoStorageAccess(e) => {
            warn!("Keyring access denied: {:?}", e);
            PlatformError::AccessDenied
        }
        keyring::Error::PlatformFailure(e) => {
            PlatformError::NotAvailable(format!("Keyring platform failure: {}", e))
        }
        keyring::Error::BadEncoding(_) => {
            PlatformError::Encoding("Keyring entry is not valid UTF-8".into())
        }
        keyring::Error::TooLong(attr, limit) => PlatformError::Internal(format!(
            "Keyring attribute {} exceeds {} bytes",
            attr, limit
        )),
        other => PlatformError::Internal(format!("Keyring error: {}", other)),
    }
}

fn base64_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(data)
}

fn base64_decode(encoded: &str) -> std::result::Result<Vec<u8>, String> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_names_are_namespaced() {
        assert_eq!(
            account_name("quickunlock.pin", "profile:42"),
            "quickunlock.pin/profile:42"
        );
    }

    #[test]
    fn base64_handles_binary_payloads() {
        let payload = [0u8, 255, 10, 13, 0x80];
        let encoded = base64_encode(&payload);
        assert_eq!(base64_decode(&encoded).unwrap(), payload);
        assert!(base64_decode("not base64!").is_err());
    }

    #[test]
    fn storage_access_maps_to_access_denied() {
        let err = map_keyring_error(keyring::Error::NoStorageAccess("locked".into()));
        assert_eq!(err, PlatformError::AccessDenied);
    }
}
