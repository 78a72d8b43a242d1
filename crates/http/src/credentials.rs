//! Per-provider credential storage with strict copy-in/copy-out semantics
//!
//! Credentials move into the store by value and leave it only as clones, so
//! no live reference to a stored secret ever escapes: mutating what a
//! caller got back can never change what the store holds, and providers
//! never alias each other's material.
//!
//! Fields are opaque name/value pairs. By convention the name is the header
//! the client should send the value under (`x-api-key`, `authorization`),
//! which lets the request path apply credentials without knowing provider
//! specifics.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use ledgerlens_resilience::error::{ServiceError, ServiceResult};

/// Opaque credential material for one provider.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Credentials {
    fields: BTreeMap<String, String>,
}

impl Credentials {
    /// Create empty credential material.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field addition.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Set or replace a field.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Read a field's value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Whether no fields are present.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Iterate over field name/value pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Keyed credential store: provider name → [`Credentials`].
#[derive(Debug, Default)]
pub struct CredentialStore {
    providers: RwLock<HashMap<String, Credentials>>,
}

impl CredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store credentials for a provider, replacing any existing material.
    ///
    /// An empty provider name or empty credential material is a validation
    /// failure.
    pub fn set(&self, provider: &str, credentials: Credentials) -> ServiceResult<()> {
        if provider.trim().is_empty() {
            return Err(ServiceError::validation("provider", "provider name must not be empty"));
        }
        if credentials.is_empty() {
            return Err(ServiceError::validation(
                "credentials",
                "credential material must not be empty",
            ));
        }
        self.providers.write().insert(provider.to_string(), credentials);
        Ok(())
    }

    /// Get a copy of a provider's credentials.
    ///
    /// An unknown provider is an error, not a null — callers assume
    /// credentials exist once they ask for them.
    pub fn get(&self, provider: &str) -> ServiceResult<Credentials> {
        self.providers.read().get(provider).cloned().ok_or_else(|| {
            ServiceError::validation("provider", format!("no credentials stored for '{provider}'"))
        })
    }

    /// Whether credentials are stored for a provider.
    pub fn has(&self, provider: &str) -> bool {
        self.providers.read().contains_key(provider)
    }

    /// Remove a provider's credentials, reporting whether any existed.
    pub fn remove(&self, provider: &str) -> bool {
        self.providers.write().remove(provider).is_some()
    }

    /// Drop all stored credentials.
    pub fn clear(&self) {
        self.providers.write().clear();
    }

    /// Number of providers with stored credentials.
    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }
}
