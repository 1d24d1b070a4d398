//! Cached bearer credential and CSRF token.
//!
//! Both values are opt-in: nothing is attached to a request unless one was cached
//! explicitly. They are loaded from the settings store once and written back on change.

use std::sync::{Arc, RwLock};

use log::{info, warn};

use crate::error_handling::types::StorageError;
use crate::storage::settings_store::{SettingsStore, KEY_AUTH_TOKEN, KEY_CSRF_TOKEN};

pub struct SessionCredentials {
    settings: Arc<dyn SettingsStore>,
    token: RwLock<Option<String>>,
    csrf: RwLock<Option<String>>,
}

impl SessionCredentials {
    pub fn load(settings: Arc<dyn SettingsStore>) -> Self {
        let token = settings.get(KEY_AUTH_TOKEN).filter(|t| !t.is_empty());
        let csrf = settings.get(KEY_CSRF_TOKEN).filter(|t| !t.is_empty());
        Self {
            settings,
            token: RwLock::new(token),
            csrf: RwLock::new(csrf),
        }
    }

    pub fn bearer(&self) -> Option<String> {
        self.token.read().ok()?.clone()
    }

    pub fn csrf(&self) -> Option<String> {
        self.csrf.read().ok()?.clone()
    }

    pub fn set_token(&self, token: &str) -> Result<(), StorageError> {
        if let Ok(mut slot) = self.token.write() {
            *slot = Some(token.to_string());
        }
        self.settings.set(KEY_AUTH_TOKEN, token)
    }

    pub fn set_csrf(&self, token: &str) -> Result<(), StorageError> {
        if let Ok(mut slot) = self.csrf.write() {
            *slot = Some(token.to_string());
        }
        self.settings.set(KEY_CSRF_TOKEN, token)
    }

    /// Drops the cached bearer credential, in memory and on disk.
    pub fn clear_token(&self) {
        if let Ok(mut slot) = self.token.write() {
            *slot = None;
        }
        if let Err(e) = self.settings.remove(KEY_AUTH_TOKEN) {
            warn!("Failed to remove persisted credential: {}", e);
        }
        info!("Cached credential cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::settings_store::MemorySettings;

    #[test]
    fn loads_and_clears_persisted_token() {
        let settings = Arc::new(MemorySettings::new());
        settings.set(KEY_AUTH_TOKEN, "abc").unwrap();
        settings.set(KEY_CSRF_TOKEN, "").unwrap();

        let creds = SessionCredentials::load(settings.clone());
        assert_eq!(creds.bearer().as_deref(), Some("abc"));
        assert_eq!(creds.csrf(), None);

        creds.clear_token();
        assert_eq!(creds.bearer(), None);
        assert_eq!(settings.get(KEY_AUTH_TOKEN), None);
    }
}
