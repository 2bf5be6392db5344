//! Platform primitives for QuickUnlock: the biometric prompt, the OS secure
//! keystore and a plaintext state store, plus the adapters that implement
//! them on each target.

pub use models::*;

#[cfg(any(target_os = "macos", target_os = "windows", target_os = "linux"))]
mod desktop;
mod kv;
mod mobile;
mod unsupported;

mod error;
mod models;
mod traits;

pub use error::{PlatformError, Result};
pub use kv::{JsonFileStore, STATE_FILE_NAME};
pub use mobile::{
    hardware_report, prompt_outcome, NativeAuthResult, NativeBiometric, NativeBridge,
    NativeCapabilities, NativeFailure, NativeKeystore, PlatformTarget, BRIDGE_ACCESS_DENIED,
    BRIDGE_KEYSTORE_UNAVAILABLE, BRIDGE_KEY_INVALIDATED, BRIDGE_PERMISSION_DENIED,
};
pub use traits::{BiometricPrimitive, KeyValueStore, SecureKeystore};
pub use unsupported::UnsupportedBiometric;

#[cfg(any(target_os = "macos", target_os = "windows", target_os = "linux"))]
pub use desktop::{KeyringKeystore, DEFAULT_SERVICE_NAME};
