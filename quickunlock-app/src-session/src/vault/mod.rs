//! Credential vault: the PIN surrogate used for biometric unlock.
//!
//! Secrets live only in the platform secure keystore (AndroidKeyStore,
//! iOS Keychain, or the desktop OS keyring). Nothing in this module writes
//! them to plaintext state or logs them.

pub mod credential;
pub mod error;
pub mod secret;

pub use credential::{CredentialVault, VaultEntry, DEFAULT_NAMESPACE};
pub use error::{VaultError, VaultResult};
pub use secret::{RecoveredSecret, Secret};
