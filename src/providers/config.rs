//! Provider configuration file: entries, `ENV:` placeholder resolution

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Prefix marking a parameter value as an environment-variable reference
const ENV_PREFIX: &str = "ENV:";

/// The providers TOML file: one active id plus a table of entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersFile {
    /// Id of the provider used for chat
    #[serde(default)]
    pub active: Option<String>,
    /// Provider entries keyed by id
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderEntry>,
}

/// One provider record as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    /// Human-readable name shown in status output
    pub display_name: String,
    /// Registry key selecting the client implementation (`ollama`, `openai`)
    pub driver: String,
    /// Instantiate eagerly at startup
    #[serde(default)]
    pub autoload: bool,
    /// Prompt budget in characters
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    /// Driver-specific parameters; values of the form `ENV:NAME` are
    /// substituted from the environment at resolution time
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

fn default_max_input_chars() -> usize {
    16_000
}

/// A provider entry with every `ENV:` placeholder substituted
#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub id: String,
    pub display_name: String,
    pub driver: String,
    pub autoload: bool,
    pub max_input_chars: usize,
    pub parameters: BTreeMap<String, String>,
}

impl ResolvedProvider {
    /// Fetch a parameter, failing with a config error naming it when absent
    pub fn require(&self, key: &str) -> Result<&str> {
        self.parameters.get(key).map(String::as_str).ok_or_else(|| {
            Error::Config(format!(
                "provider '{}' is missing required parameter '{}'",
                self.id, key
            ))
        })
    }

    /// Fetch a parameter or fall back to a default
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.parameters.get(key).map(String::as_str).unwrap_or(default)
    }
}

impl ProvidersFile {
    /// Load the providers file from a TOML path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "cannot read providers file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let file: Self = toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("invalid providers file '{}': {}", path.display(), e))
        })?;
        file.check_active()?;
        Ok(file)
    }

    fn check_active(&self) -> Result<()> {
        if let Some(active) = &self.active {
            if !self.providers.contains_key(active) {
                return Err(Error::Config(format!(
                    "active provider '{}' is not defined in the providers table",
                    active
                )));
            }
        }
        Ok(())
    }

    /// Resolve an entry's `ENV:` placeholders against the process environment.
    ///
    /// Every missing variable is reported in a single error, not just the
    /// first one encountered.
    pub fn resolve(&self, id: &str) -> Result<ResolvedProvider> {
        let entry = self
            .providers
            .get(id)
            .ok_or_else(|| Error::Config(format!("unknown provider id '{}'", id)))?;

        let mut parameters = BTreeMap::new();
        let mut missing = Vec::new();

        for (key, value) in &entry.parameters {
            match value.strip_prefix(ENV_PREFIX) {
                Some(var_name) => match std::env::var(var_name) {
                    Ok(resolved) => {
                        parameters.insert(key.clone(), resolved);
                    }
                    Err(_) => missing.push(var_name.to_string()),
                },
                None => {
                    parameters.insert(key.clone(), value.clone());
                }
            }
        }

        if !missing.is_empty() {
            missing.sort();
            return Err(Error::Config(format!(
                "provider '{}' references unset environment variables: {}",
                id,
                missing.join(", ")
            )));
        }

        Ok(ResolvedProvider {
            id: id.to_string(),
            display_name: entry.display_name.clone(),
            driver: entry.driver.clone(),
            autoload: entry.autoload,
            max_input_chars: entry.max_input_chars,
            parameters,
        })
    }

    /// Ids of entries flagged for eager instantiation
    pub fn autoload_ids(&self) -> Vec<String> {
        self.providers
            .iter()
            .filter(|(_, entry)| entry.autoload)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file(params: &[(&str, &str)]) -> ProvidersFile {
        let mut parameters = BTreeMap::new();
        for (k, v) in params {
            parameters.insert(k.to_string(), v.to_string());
        }
        let entry = ProviderEntry {
            display_name: "Test Provider".to_string(),
            driver: "ollama".to_string(),
            autoload: false,
            max_input_chars: 8000,
            parameters,
        };
        let mut providers = BTreeMap::new();
        providers.insert("test".to_string(), entry);
        ProvidersFile {
            active: Some("test".to_string()),
            providers,
        }
    }

    #[test]
    fn plain_values_pass_through() {
        let file = sample_file(&[("base_url", "http://localhost:11434"), ("model", "phi3")]);
        let resolved = file.resolve("test").unwrap();
        assert_eq!(resolved.parameters["base_url"], "http://localhost:11434");
        assert_eq!(resolved.parameters["model"], "phi3");
        assert_eq!(resolved.max_input_chars, 8000);
    }

    #[test]
    fn env_placeholder_is_substituted() {
        std::env::set_var("DOCQA_TEST_RESOLVE_KEY", "sk-resolved");
        let file = sample_file(&[("api_key", "ENV:DOCQA_TEST_RESOLVE_KEY")]);
        let resolved = file.resolve("test").unwrap();
        assert_eq!(resolved.parameters["api_key"], "sk-resolved");
        std::env::remove_var("DOCQA_TEST_RESOLVE_KEY");
    }

    #[test]
    fn all_missing_variables_are_reported_together() {
        let file = sample_file(&[
            ("api_key", "ENV:DOCQA_TEST_UNSET_ALPHA"),
            ("org", "ENV:DOCQA_TEST_UNSET_BETA"),
        ]);
        let err = file.resolve("test").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("DOCQA_TEST_UNSET_ALPHA"), "{}", message);
        assert!(message.contains("DOCQA_TEST_UNSET_BETA"), "{}", message);
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn unknown_id_fails() {
        let file = sample_file(&[]);
        assert!(file.resolve("nope").is_err());
    }

    #[test]
    fn active_must_exist_in_table() {
        let toml_text = r#"
            active = "missing"

            [providers.present]
            display_name = "Present"
            driver = "ollama"
        "#;
        let file: ProvidersFile = toml::from_str(toml_text).unwrap();
        assert!(file.check_active().is_err());
    }

    #[test]
    fn parses_full_toml_shape() {
        let toml_text = r#"
            active = "local"

            [providers.local]
            display_name = "Local Ollama"
            driver = "ollama"
            autoload = true
            max_input_chars = 12000

            [providers.local.parameters]
            base_url = "http://localhost:11434"
            model = "phi3"
        "#;
        let file: ProvidersFile = toml::from_str(toml_text).unwrap();
        assert_eq!(file.active.as_deref(), Some("local"));
        assert_eq!(file.autoload_ids(), vec!["local".to_string()]);
        let resolved = file.resolve("local").unwrap();
        assert_eq!(resolved.driver, "ollama");
        assert_eq!(resolved.max_input_chars, 12000);
    }
}
