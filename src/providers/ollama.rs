//! Ollama API client and its trait adapters, with retry logic

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::providers::config::ResolvedProvider;
use crate::providers::embedding::EmbeddingProvider;
use crate::providers::llm::LlmClient;

/// Ollama API client with automatic retry
#[derive(Debug)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    embed_model: String,
    generate_model: String,
    temperature: f32,
    max_retries: u32,
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    prompt: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl OllamaClient {
    fn build_http_client(timeout_secs: u64) -> Client {
        Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .expect("Failed to create HTTP client")
    }

    /// Create a client for the embedding service
    pub fn for_embeddings(config: &EmbeddingConfig) -> Self {
        Self {
            client: Self::build_http_client(config.timeout_secs),
            base_url: config.base_url.clone(),
            embed_model: config.model.clone(),
            generate_model: String::new(),
            temperature: 0.0,
            max_retries: config.max_retries,
        }
    }

    /// Create a generation client from a resolved provider entry
    pub fn from_provider(provider: &ResolvedProvider) -> Result<Self> {
        let base_url = provider
            .get_or("base_url", "http://localhost:11434")
            .to_string();
        let model = provider.require("model")?.to_string();
        let temperature = provider
            .get_or("temperature", "0.3")
            .parse::<f32>()
            .map_err(|e| {
                Error::Config(format!(
                    "provider '{}' has a non-numeric temperature: {}",
                    provider.id, e
                ))
            })?;
        let timeout_secs = provider
            .get_or("timeout_secs", "120")
            .parse::<u64>()
            .map_err(|e| {
                Error::Config(format!(
                    "provider '{}' has a non-numeric timeout_secs: {}",
                    provider.id, e
                ))
            })?;

        Ok(Self {
            client: Self::build_http_client(timeout_secs),
            base_url,
            embed_model: String::new(),
            generate_model: model,
            temperature,
            max_retries: 2,
        })
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        let delay = Duration::from_secs(2u64.pow(attempt));
                        tracing::warn!(
                            "Request failed (attempt {}/{}), retrying in {:?}",
                            attempt + 1,
                            self.max_retries + 1,
                            delay
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::internal("Unknown error")))
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Generate an embedding with retry
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let text = text.to_string();
        let model = self.embed_model.clone();
        let client = self.client.clone();

        self.retry_request(|| {
            let url = url.clone();
            let text = text.clone();
            let model = model.clone();
            let client = client.clone();

            async move {
                let request = EmbedRequest {
                    model,
                    prompt: text,
                };

                let response = client
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| Error::embedding(format!("Embedding request failed: {}", e)))?;

                if !response.status().is_success() {
                    return Err(Error::embedding(format!(
                        "Embedding failed: HTTP {}",
                        response.status()
                    )));
                }

                let embed_response: EmbedResponse = response.json().await.map_err(|e| {
                    Error::embedding(format!("Failed to parse embedding response: {}", e))
                })?;

                Ok(embed_response.embedding)
            }
        })
        .await
    }

    /// Generate a completion with retry
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let prompt = prompt.to_string();
        let model = self.generate_model.clone();
        let temperature = self.temperature;
        let client = self.client.clone();

        tracing::debug!("Generating answer with model: {}", model);

        self.retry_request(|| {
            let url = url.clone();
            let prompt = prompt.clone();
            let model = model.clone();
            let client = client.clone();

            async move {
                let request = GenerateRequest {
                    model,
                    prompt,
                    stream: false,
                    options: GenerateOptions { temperature },
                };

                let response = client
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| Error::generation(format!("Generation request failed: {}", e)))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::generation(format!(
                        "Generation failed: HTTP {} - {}",
                        status, body
                    )));
                }

                let generate_response: GenerateResponse = response.json().await.map_err(|e| {
                    Error::generation(format!("Failed to parse generation response: {}", e))
                })?;

                Ok(generate_response.response)
            }
        })
        .await
    }
}

/// Ollama embedding provider using nomic-embed-text or similar models
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            client: Arc::new(OllamaClient::for_embeddings(config)),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama LLM provider for answer generation
#[derive(Debug)]
pub struct OllamaLlm {
    client: Arc<OllamaClient>,
    model: String,
    max_input_chars: usize,
}

impl OllamaLlm {
    pub fn from_provider(provider: &ResolvedProvider) -> Result<Self> {
        let model = provider.require("model")?.to_string();
        Ok(Self {
            client: Arc::new(OllamaClient::from_provider(provider)?),
            model,
            max_input_chars: provider.max_input_chars,
        })
    }
}

#[async_trait]
impl LlmClient for OllamaLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.client.generate(prompt).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn max_input_chars(&self) -> usize {
        self.max_input_chars
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
