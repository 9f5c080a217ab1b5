//! Azure AI Search REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::index::SearchIndex;
use crate::types::{index_definition, IndexDocument};
use medassist_core::{Error, Result, RetryPolicy, SearchServiceConfig, ServiceFailure};

/// Pause after creating an index before documents are accepted.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

#[derive(Deserialize)]
struct IndexList {
    #[serde(default)]
    value: Vec<IndexName>,
}

#[derive(Deserialize)]
struct IndexName {
    name: String,
}

#[derive(Deserialize)]
struct IndexingResults {
    value: Vec<IndexingResult>,
}

#[derive(Deserialize)]
struct IndexingResult {
    key: String,
    status: bool,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct SearchResults {
    #[serde(default)]
    value: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    content: Option<String>,
}

fn transport(e: reqwest::Error) -> Error {
    Error::IndexService(ServiceFailure::transport(e.to_string()))
}

fn malformed(e: serde_json::Error) -> Error {
    Error::IndexService(ServiceFailure::malformed(e.to_string()))
}

/// Vector index hosted on an Azure AI Search service.
pub struct AzureSearchIndex {
    client: Client,
    config: SearchServiceConfig,
    dimensions: usize,
    retry: RetryPolicy,
    settle_delay: Duration,
}

impl AzureSearchIndex {
    pub fn new(config: SearchServiceConfig, dimensions: usize, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(retry.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config,
            dimensions,
            retry,
            settle_delay: DEFAULT_SETTLE_DELAY,
        })
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}?api-version={}",
            self.config.endpoint(),
            path,
            self.config.api_version
        )
    }

    /// Send one request under the retry policy.
    ///
    /// 429 and 5xx count as failed attempts; any other status is returned
    /// to the caller together with the response body.
    async fn call(
        &self,
        operation: &str,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<(u16, String)> {
        self.retry
            .run(operation, || {
                let mut request = self
                    .client
                    .request(method.clone(), url)
                    .header("api-key", self.config.admin_key.as_str());
                if let Some(body) = body {
                    request = request.json(body);
                }
                async move {
                    let response = request.send().await.map_err(transport)?;
                    let status = response.status().as_u16();
                    let text = response.text().await.map_err(transport)?;
                    if status == 429 || status >= 500 {
                        return Err(Error::IndexService(ServiceFailure::http(status, text)));
                    }
                    Ok((status, text))
                }
            })
            .await
    }

    async fn index_exists(&self, name: &str) -> Result<bool> {
        let (status, body) = self
            .call("list indexes", Method::GET, &self.url("indexes"), None)
            .await?;
        if status != 200 {
            warn!("Listing indexes returned HTTP {}, attempting creation of {}", status, name);
            return Ok(false);
        }
        let listing: IndexList = serde_json::from_str(&body).map_err(malformed)?;
        Ok(listing.value.iter().any(|index| index.name == name))
    }
}

#[async_trait]
impl SearchIndex for AzureSearchIndex {
    async fn ensure_index(&self, name: &str) -> Result<bool> {
        if self.index_exists(name).await? {
            debug!("Index {} already exists", name);
            return Ok(false);
        }

        let definition = index_definition(name, self.dimensions);
        let url = self.url(&format!("indexes/{}", name));
        let (status, body) = self
            .call("create index", Method::PUT, &url, Some(&definition))
            .await?;

        match status {
            201 | 204 => {
                info!("Created index {} ({} dims)", name, self.dimensions);
                tokio::time::sleep(self.settle_delay).await;
                Ok(true)
            }
            _ => Err(Error::IndexService(ServiceFailure::http(status, body))),
        }
    }

    async fn upsert(&self, name: &str, documents: &[IndexDocument]) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let payload = json!({ "value": documents });
        let url = self.url(&format!("indexes/{}/docs/index", name));
        let (status, body) = self
            .call("upsert documents", Method::POST, &url, Some(&payload))
            .await?;

        match status {
            200 | 201 | 204 | 207 => {
                let accepted = match serde_json::from_str::<IndexingResults>(&body) {
                    Ok(results) => {
                        for failed in results.value.iter().filter(|r| !r.status) {
                            warn!(
                                "Index {} rejected document {}: {}",
                                name,
                                failed.key,
                                failed.error_message.as_deref().unwrap_or("no reason given")
                            );
                        }
                        results.value.iter().filter(|r| r.status).count()
                    }
                    Err(e) => {
                        if !body.trim().is_empty() {
                            warn!(
                                "Unreadable indexing results from {} ({}), counting all {} documents as accepted",
                                name,
                                e,
                                documents.len()
                            );
                        }
                        documents.len()
                    }
                };
                info!("Upserted {}/{} documents into {}", accepted, documents.len(), name);
                Ok(accepted)
            }
            _ => Err(Error::IndexService(ServiceFailure::http(status, body))),
        }
    }

    async fn vector_search(
        &self,
        name: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<String>> {
        let payload = json!({
            "select": "content",
            "top": top_k,
            "vectors": [
                {
                    "value": vector,
                    "fields": "embedding",
                    "k": top_k
                }
            ]
        });
        let url = self.url(&format!("indexes/{}/docs/search", name));
        let (status, body) = self
            .call("vector search", Method::POST, &url, Some(&payload))
            .await?;

        if status != 200 {
            return Err(Error::IndexService(ServiceFailure::http(status, body)));
        }
        let results: SearchResults = serde_json::from_str(&body).map_err(malformed)?;
        let contents: Vec<String> = results.value.into_iter().filter_map(|r| r.content).collect();
        debug!("Vector search on {} returned {} passages", name, contents.len());
        Ok(contents)
    }
}
