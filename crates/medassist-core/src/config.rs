//! Service configuration, built once at startup and handed to each client.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Search REST API version the index schema is written against.
pub const DEFAULT_SEARCH_API_VERSION: &str = "2023-07-01-Preview";
/// Embedding dimension requested from the embedding deployment.
pub const DEFAULT_EMBEDDING_DIM: usize = 1536;
pub const DEFAULT_INDEX_NAME: &str = "medassist-documents";
pub const DEFAULT_PORT: u16 = 8501;

/// An Azure OpenAI deployment (used for both embeddings and chat).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureOpenAiConfig {
    pub endpoint: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub api_version: String,
    pub deployment_name: String,
}

impl AzureOpenAiConfig {
    /// Full URL of an operation under this deployment, e.g. `embeddings`.
    pub fn operation_url(&self, operation: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment_name,
            operation,
            self.api_version
        )
    }
}

/// Azure AI Search service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchServiceConfig {
    pub service_name: String,
    #[serde(skip_serializing)]
    pub admin_key: String,
    pub api_version: String,
    /// Overrides the `https://{service}.search.windows.net` base URL.
    #[serde(default)]
    pub endpoint_override: Option<String>,
}

impl SearchServiceConfig {
    pub fn endpoint(&self) -> String {
        match &self.endpoint_override {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.search.windows.net", self.service_name),
        }
    }
}

/// Timeout and retry settings shared by every outbound call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HttpPolicy {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for HttpPolicy {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 1,
            retry_backoff_ms: 500,
        }
    }
}

impl HttpPolicy {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

/// Top-level MedAssist configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedAssistConfig {
    /// HTTP server port.
    pub port: u16,
    pub embedding: AzureOpenAiConfig,
    pub chat: AzureOpenAiConfig,
    pub search: SearchServiceConfig,
    pub http: HttpPolicy,
    /// Index used when a session does not name one.
    pub index_name: String,
    pub embedding_dim: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Passages retrieved per question.
    pub top_k: usize,
    /// Concurrent embedding requests while indexing.
    pub indexing_concurrency: usize,
    pub temperature: f64,
    pub max_tokens: usize,
}

impl MedAssistConfig {
    /// Create configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("missing environment variable {}", key)))
        };

        let embedding = AzureOpenAiConfig {
            endpoint: required("AZURE_OPENAI_EMBEDDING_ENDPOINT")?,
            api_key: required("AZURE_OPENAI_EMBEDDING_API_KEY")?,
            api_version: required("AZURE_OPENAI_EMBEDDING_API_VERSION")?,
            deployment_name: required("AZURE_OPENAI_EMBEDDING_DEPLOYMENT_NAME")?,
        };

        let chat = AzureOpenAiConfig {
            endpoint: required("AZURE_OPENAI_ENDPOINT")?,
            api_key: required("AZURE_OPENAI_API_KEY")?,
            api_version: required("AZURE_OPENAI_API_VERSION")?,
            deployment_name: required("AZURE_OPENAI_DEPLOYMENT_NAME")?,
        };

        let search = SearchServiceConfig {
            service_name: required("AZURE_SEARCH_SERVICE_NAME")?,
            admin_key: required("AZURE_SEARCH_ADMIN_KEY")?,
            api_version: lookup("AZURE_SEARCH_API_VERSION")
                .unwrap_or_else(|| DEFAULT_SEARCH_API_VERSION.into()),
            endpoint_override: lookup("AZURE_SEARCH_ENDPOINT"),
        };

        let defaults = HttpPolicy::default();
        let http = HttpPolicy {
            timeout_secs: parsed_or(&lookup, "MEDASSIST_HTTP_TIMEOUT_SECS", defaults.timeout_secs)?,
            max_retries: parsed_or(&lookup, "MEDASSIST_HTTP_MAX_RETRIES", defaults.max_retries)?,
            retry_backoff_ms: parsed_or(
                &lookup,
                "MEDASSIST_HTTP_RETRY_BACKOFF_MS",
                defaults.retry_backoff_ms,
            )?,
        };

        let top_k: usize = parsed_or(&lookup, "MEDASSIST_TOP_K", 3)?;
        if top_k == 0 {
            return Err(Error::Config("MEDASSIST_TOP_K must be at least 1".into()));
        }

        Ok(Self {
            port: parsed_or(&lookup, "PORT", DEFAULT_PORT)?,
            embedding,
            chat,
            search,
            http,
            index_name: lookup("MEDASSIST_INDEX_NAME").unwrap_or_else(|| DEFAULT_INDEX_NAME.into()),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            chunk_size: parsed_or(&lookup, "MEDASSIST_CHUNK_SIZE", 1000)?,
            chunk_overlap: parsed_or(&lookup, "MEDASSIST_CHUNK_OVERLAP", 200)?,
            top_k,
            indexing_concurrency: parsed_or(&lookup, "MEDASSIST_INDEXING_CONCURRENCY", 4)?,
            temperature: 0.7,
            max_tokens: 800,
        })
    }
}

fn parsed_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(default),
    }
}
