//! Runtime map from backend key to constructor.

use crate::config::{BackendKind, TranslationConfig};
use crate::error::{BackendError, Result, SubtransError};
use crate::translate::{
    BackendResult, DeepLBackend, GeminiBackend, HostedInferenceBackend, LocalServerBackend,
    TranslationBackend,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub type BackendFactory = Arc<
    dyn Fn(&TranslationConfig) -> std::result::Result<Arc<dyn TranslationBackend>, BackendError>
        + Send
        + Sync,
>;

/// Backends available by name. Seeded with every [`BackendKind`]; further
/// providers can be registered under their own keys.
#[derive(Clone)]
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl BackendRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for kind in BackendKind::ALL {
            registry.register(kind.key(), default_factory(kind));
        }
        registry
    }

    /// Register (or replace) the factory for `key`.
    pub fn register(&mut self, key: impl Into<String>, factory: BackendFactory) {
        let key = key.into();
        debug!("Registering translation backend '{}'", key);
        self.factories.insert(key, factory);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn available(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn create(
        &self,
        key: &str,
        config: &TranslationConfig,
    ) -> Result<Arc<dyn TranslationBackend>> {
        let factory = self.factories.get(key).ok_or_else(|| {
            SubtransError::UnknownBackend(format!(
                "'{}' (available: {})",
                key,
                self.available().join(", ")
            ))
        })?;
        Ok(factory(config)?)
    }

    /// Build the backend named by `config.backend`.
    pub fn create_for(&self, config: &TranslationConfig) -> Result<Arc<dyn TranslationBackend>> {
        self.create(config.backend.key(), config)
    }
}

fn default_factory(kind: BackendKind) -> BackendFactory {
    match kind {
        BackendKind::LocalServer => {
            Arc::new(|config: &TranslationConfig| shared(LocalServerBackend::from_config(config)))
        }
        BackendKind::HostedInference => {
            Arc::new(|config: &TranslationConfig| shared(HostedInferenceBackend::from_config(config)))
        }
        BackendKind::Generative => {
            Arc::new(|config: &TranslationConfig| shared(GeminiBackend::from_config(config)))
        }
        BackendKind::CommercialMt => {
            Arc::new(|config: &TranslationConfig| shared(DeepLBackend::from_config(config)))
        }
    }
}

fn shared<B: TranslationBackend + 'static>(
    backend: BackendResult<B>,
) -> BackendResult<Arc<dyn TranslationBackend>> {
    Ok(Arc::new(backend?))
}
