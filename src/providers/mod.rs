//! Language-model providers: config records, trait seams, client registry
//!
//! The registry maps each provider entry's `driver` field through a closed
//! factory table (`ollama`, `openai`) and caches one client per provider id.

pub mod config;
pub mod embedding;
pub mod llm;
pub mod ollama;
pub mod openai;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

pub use config::{ProviderEntry, ProvidersFile, ResolvedProvider};
pub use embedding::EmbeddingProvider;
pub use llm::LlmClient;
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaLlm};
pub use openai::OpenAiClient;

use crate::error::{Error, Result};

/// Registry of configured LLM providers with cached client instances
pub struct ProviderRegistry {
    file: ProvidersFile,
    cache: Mutex<HashMap<String, Arc<dyn LlmClient>>>,
}

impl ProviderRegistry {
    /// Load the registry from a providers TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(ProvidersFile::load(path)?))
    }

    /// Build a registry from an already parsed providers file
    pub fn new(file: ProvidersFile) -> Self {
        Self {
            file,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Registry with no providers; chat fails with `NoActiveProvider`
    pub fn empty() -> Self {
        Self::new(ProvidersFile::default())
    }

    /// Id of the provider chat requests use, if any
    pub fn active_id(&self) -> Option<&str> {
        self.file.active.as_deref()
    }

    /// Resolve an entry's `ENV:` placeholders without instantiating a client
    pub fn resolve(&self, id: &str) -> Result<ResolvedProvider> {
        self.file.resolve(id)
    }

    /// Get or create the client for a provider id.
    ///
    /// The first call resolves the entry and builds the client; later calls
    /// return the same instance until `invalidate`.
    pub fn instantiate(&self, id: &str) -> Result<Arc<dyn LlmClient>> {
        let mut cache = self.cache.lock();
        if let Some(client) = cache.get(id) {
            return Ok(Arc::clone(client));
        }

        let resolved = self.file.resolve(id)?;
        let client = build_client(&resolved)?;
        cache.insert(id.to_string(), Arc::clone(&client));
        tracing::info!(
            provider = id,
            driver = %resolved.driver,
            model = client.model(),
            "Provider instantiated"
        );
        Ok(client)
    }

    /// The client for the active provider
    pub fn active_client(&self) -> Result<Arc<dyn LlmClient>> {
        let id = self.file.active.as_deref().ok_or(Error::NoActiveProvider)?;
        self.instantiate(id)
    }

    /// Registry whose active client is pre-seeded, bypassing the factory
    #[cfg(test)]
    pub(crate) fn with_cached_client(id: &str, client: Arc<dyn LlmClient>) -> Self {
        let registry = Self::new(ProvidersFile {
            active: Some(id.to_string()),
            providers: Default::default(),
        });
        registry.cache.lock().insert(id.to_string(), client);
        registry
    }

    /// Drop every cached client so the next call rebuilds from config
    pub fn invalidate(&self) {
        self.cache.lock().clear();
    }

    /// Eagerly instantiate every autoload-flagged provider.
    ///
    /// Individual failures are logged and skipped so one bad entry cannot
    /// prevent startup.
    pub fn autoload(&self) {
        for id in self.file.autoload_ids() {
            match self.instantiate(&id) {
                Ok(client) => {
                    tracing::info!(provider = %id, model = client.model(), "Autoloaded provider")
                }
                Err(e) => {
                    tracing::warn!(provider = %id, error = %e, "Failed to autoload provider")
                }
            }
        }
    }
}

/// Closed factory table keyed by the entry's `driver` field
fn build_client(provider: &ResolvedProvider) -> Result<Arc<dyn LlmClient>> {
    match provider.driver.as_str() {
        "ollama" => Ok(Arc::new(OllamaLlm::from_provider(provider)?)),
        "openai" => Ok(Arc::new(OpenAiClient::from_provider(provider)?)),
        other => Err(Error::ProviderLoad(
            provider.id.clone(),
            format!("unknown driver '{}' (expected 'ollama' or 'openai')", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn registry_with(driver: &str, params: &[(&str, &str)]) -> ProviderRegistry {
        let mut parameters = BTreeMap::new();
        for (k, v) in params {
            parameters.insert(k.to_string(), v.to_string());
        }
        let entry = ProviderEntry {
            display_name: "Test".to_string(),
            driver: driver.to_string(),
            autoload: false,
            max_input_chars: 8000,
            parameters,
        };
        let mut providers = BTreeMap::new();
        providers.insert("p1".to_string(), entry);
        ProviderRegistry::new(ProvidersFile {
            active: Some("p1".to_string()),
            providers,
        })
    }

    #[test]
    fn unknown_driver_fails_with_provider_load() {
        let registry = registry_with("mystery", &[("model", "m")]);
        let err = registry.instantiate("p1").unwrap_err();
        assert!(matches!(err, Error::ProviderLoad(_, _)), "{}", err);
    }

    #[test]
    fn instantiate_caches_the_client() {
        let registry = registry_with("ollama", &[("model", "phi3")]);
        let first = registry.instantiate("p1").unwrap();
        let second = registry.instantiate("p1").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        registry.invalidate();
        let third = registry.instantiate("p1").unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn empty_registry_has_no_active_provider() {
        let registry = ProviderRegistry::empty();
        let err = registry.active_client().unwrap_err();
        assert!(matches!(err, Error::NoActiveProvider));
    }

    #[test]
    fn active_client_uses_the_active_id() {
        let registry = registry_with("ollama", &[("model", "phi3")]);
        let client = registry.active_client().unwrap();
        assert_eq!(client.model(), "phi3");
        assert_eq!(client.max_input_chars(), 8000);
    }

    #[test]
    fn missing_required_parameter_fails() {
        // ollama driver requires a model parameter
        let registry = registry_with("ollama", &[]);
        assert!(registry.instantiate("p1").is_err());
    }
}
