//! Text-generation API key handling
//!
//! The key is resolved lazily (explicit override, then the configured
//! environment variable, then the stored slot) and cached for the life of the
//! [`CredentialStore`]. A missing or unreadable key is never an error here;
//! callers decide whether they can fall back.

use crate::storage::CredentialSlot;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Mutex;

/// The external service API key. Never printed.
pub struct Credential(SecretString);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(SecretString::from(secret.into()))
    }

    /// Only call this when building an authenticated request
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Display form: first 8 and last 4 characters, the rest starred
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.expose().chars().collect();
        if chars.len() > 12 {
            let head: String = chars[..8].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{}{}{}", head, "*".repeat(chars.len() - 12), tail)
        } else {
            "***".to_string()
        }
    }
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        Self::new(self.expose().to_string())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Lazily resolved, cached credential
pub struct CredentialStore {
    env_var: String,
    override_key: Option<String>,
    cache: Mutex<Option<Option<Credential>>>,
}

impl CredentialStore {
    /// `env_var` is consulted when no explicit key was supplied
    pub fn new(env_var: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
            override_key: None,
            cache: Mutex::new(None),
        }
    }

    /// Use this key ahead of the environment and the stored slot
    pub fn with_override(mut self, key: Option<String>) -> Self {
        self.override_key = key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
        self
    }

    /// A store that never yields a key
    pub fn disabled() -> Self {
        let store = Self::new(String::new());
        *store.cache.lock().unwrap_or_else(|e| e.into_inner()) = Some(None);
        store
    }

    /// Environment variable name shown in missing-credential errors
    pub fn env_var(&self) -> &str {
        &self.env_var
    }

    /// Resolve the credential, reading the slot at most once
    pub fn get(&self, slot: &dyn CredentialSlot) -> Option<Credential> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = cache.as_ref() {
            return cached.clone();
        }

        let resolved = self.resolve(slot);
        tracing::debug!(found = resolved.is_some(), "Resolved API key");
        *cache = Some(resolved.clone());
        resolved
    }

    /// Persist a new key and refresh the cache
    pub fn set(&self, slot: &dyn CredentialSlot, secret: &str) -> crate::Result<()> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(crate::DocsiftError::EmptyInput {
                what: "API key".to_string(),
            });
        }
        slot.store_credential(secret)?;
        *self.cache.lock().unwrap_or_else(|e| e.into_inner()) = Some(Some(Credential::new(secret)));
        Ok(())
    }

    fn resolve(&self, slot: &dyn CredentialSlot) -> Option<Credential> {
        if let Some(key) = &self.override_key {
            return Some(Credential::new(key.clone()));
        }

        if !self.env_var.is_empty() {
            if let Ok(key) = std::env::var(&self.env_var) {
                let key = key.trim();
                if !key.is_empty() {
                    return Some(Credential::new(key));
                }
            }
        }

        match slot.load_credential() {
            Ok(key) => key.map(Credential::new),
            Err(e) => {
                tracing::warn!("Failed to load stored API key: {}", e);
                None
            }
        }
    }
}
