mod config;
mod preferences;

pub use config::{load_config, save_config, SessionConfig};
pub use preferences::{PreferenceRecord, PreferenceStore};
