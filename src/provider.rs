//! Provider registry: immutable model → provider resolution plus one
//! admission controller per provider.
//!
//! Built once from an [`EngineConfig`] and passed by handle to every task
//! runner; there is no process-wide registry singleton.

use std::collections::HashMap;

use crate::admission::AdmissionController;
use crate::config::EngineConfig;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no provider mapping for model {0}")]
    UnknownModel(String),
}

#[derive(Debug)]
pub struct ProviderRegistry {
    models: HashMap<String, String>,
    controllers: HashMap<String, AdmissionController>,
}

impl ProviderRegistry {
    /// Build controllers for every provider the configuration names, whether
    /// in its own settings block or only as a mapping target. Providers with
    /// no resolved budget get unthrottled controllers.
    pub fn new(config: &EngineConfig) -> Self {
        let mut controllers: HashMap<String, AdmissionController> = HashMap::new();
        let named = config
            .providers
            .keys()
            .chain(config.models.values());
        for provider in named {
            if !controllers.contains_key(provider) {
                controllers.insert(
                    provider.clone(),
                    AdmissionController::new(provider.clone(), config.limit_for(provider)),
                );
            }
        }
        Self {
            models: config.models.clone(),
            controllers,
        }
    }

    /// Provider name for a model. Stable: the same model always resolves to
    /// the same provider for the lifetime of the registry.
    pub fn resolve(&self, model: &str) -> Result<&str, RegistryError> {
        self.models
            .get(model)
            .map(String::as_str)
            .ok_or_else(|| RegistryError::UnknownModel(model.to_string()))
    }

    pub fn controller(&self, provider: &str) -> Option<&AdmissionController> {
        self.controllers.get(provider)
    }

    /// Resolve a model straight to its provider's admission controller.
    pub fn resolve_controller(
        &self,
        model: &str,
    ) -> Result<(&str, &AdmissionController), RegistryError> {
        let provider = self.resolve(model)?;
        let controller = self
            .controllers
            .get(provider)
            .ok_or_else(|| RegistryError::UnknownModel(model.to_string()))?;
        Ok((provider, controller))
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }
}
