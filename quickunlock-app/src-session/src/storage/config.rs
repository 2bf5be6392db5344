use std::path::Path;

use quickunlock_secret::{Platform, PromptRequest, SecurityLevel};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::vault::DEFAULT_NAMESPACE;

/// Tunables for the session manager, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Age after which an orphaned persisted lease is considered stale.
    pub lease_expiry_ms: u64,
    /// Minimum gap between the end of one unlock attempt and the next.
    pub cooldown_ms: u64,
    pub prompt_title: String,
    pub prompt_subtitle: Option<String>,
    pub cancel_label: String,
    /// Devices below this level are reported as unavailable.
    pub minimum_security_level: SecurityLevel,
    pub keystore_namespace: String,
    pub platform: Platform,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let prompt = PromptRequest::default();
        Self {
            lease_expiry_ms: 5_000,
            cooldown_ms: 1_000,
            prompt_title: prompt.title,
            prompt_subtitle: prompt.subtitle,
            cancel_label: prompt.cancel_label,
            minimum_security_level: SecurityLevel::BiometricWeak,
            keystore_namespace: DEFAULT_NAMESPACE.to_string(),
            platform: Platform::current(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.lease_expiry_ms == 0 {
            return Err(StoreError::InvalidConfig(
                "lease_expiry_ms must be greater than zero".into(),
            ));
        }
        if self.keystore_namespace.trim().is_empty() {
            return Err(StoreError::InvalidConfig(
                "keystore_namespace must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn lease_expiry(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(clamp_millis(self.lease_expiry_ms))
    }

    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(clamp_millis(self.cooldown_ms))
    }

    pub fn prompt_request(&self) -> PromptRequest {
        PromptRequest {
            title: self.prompt_title.clone(),
            subtitle: self.prompt_subtitle.clone(),
            cancel_label: self.cancel_label.clone(),
        }
    }
}

fn clamp_millis(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX / 2)
}

/// Load the config at `path`; a missing file yields defaults.
pub fn load_config(path: &Path) -> Result<SessionConfig, StoreError> {
    if !path.exists() {
        return Ok(SessionConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| StoreError::Io(format!("Failed to read config file: {}", e)))?;
    let config: SessionConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

pub fn save_config(path: &Path, config: &SessionConfig) -> Result<(), StoreError> {
    config.validate()?;
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)
        .map_err(|e| StoreError::Io(format!("Failed to write config file: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.lease_expiry(), chrono::Duration::seconds(5));
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "cooldown_ms": 250, "prompt_title": "Unlock QuickPay" }"#).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.cooldown_ms, 250);
        assert_eq!(config.prompt_request().title, "Unlock QuickPay");
        assert_eq!(config.lease_expiry_ms, 5_000);
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = SessionConfig {
            minimum_security_level: SecurityLevel::BiometricStrong,
            ..SessionConfig::default()
        };
        save_config(&path, &config).unwrap();
        assert_eq!(load_config(&path).unwrap(), config);
    }

    #[test]
    fn zero_expiry_is_rejected() {
        let config = SessionConfig {
            lease_expiry_ms: 0,
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(StoreError::InvalidConfig(_))));
    }
}
