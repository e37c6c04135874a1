//! REST clients for the supported vector stores.

use super::{VectorStoreConnection, VectorStoreConnector};
use crate::config::{Backend, VectorStoreConfig};
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const CHROMA_DEFAULT_TENANT: &str = "default_tenant";
const CHROMA_DEFAULT_DATABASE: &str = "default_database";

/// Connects to a backend over its REST API.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

#[async_trait]
impl VectorStoreConnector for HttpConnector {
    async fn connect(&self, config: &VectorStoreConfig) -> Result<Box<dyn VectorStoreConnection>> {
        config.validate()?;
        Ok(Box::new(HttpConnection::open(config)?))
    }
}

/// One REST session; the client is dropped on close.
pub(crate) struct HttpConnection {
    client: Option<Client>,
    config: VectorStoreConfig,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct QdrantExists {
    result: QdrantExistsResult,
}

#[derive(Debug, Deserialize)]
struct QdrantExistsResult {
    exists: bool,
}

#[derive(Debug, Deserialize)]
struct MilvusResponse {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<MilvusHas>,
}

#[derive(Debug, Deserialize)]
struct MilvusHas {
    #[serde(default)]
    has: bool,
}

impl HttpConnection {
    fn open(config: &VectorStoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(auth_headers(config)?)
            .build()?;

        debug!(backend = %config.backend, url = %config.base_url(), "Opened vector store connection");

        Ok(Self {
            client: Some(client),
            config: config.clone(),
            base_url: config.base_url(),
        })
    }

    fn client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| EvalError::ExternalService("connection already closed".to_string()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn chroma_collection_path(&self, name: &str) -> String {
        format!(
            "/api/v2/tenants/{}/databases/{}/collections/{}",
            self.config.tenant.as_deref().unwrap_or(CHROMA_DEFAULT_TENANT),
            self.config
                .database
                .as_deref()
                .unwrap_or(CHROMA_DEFAULT_DATABASE),
            name
        )
    }

    fn milvus_body(&self, name: &str) -> serde_json::Value {
        match &self.config.database {
            Some(db) => json!({ "collectionName": name, "dbName": db }),
            None => json!({ "collectionName": name }),
        }
    }

    /// Send a request where 200 means present and 404 means absent.
    async fn check_exists(&self, request: RequestBuilder) -> Result<bool> {
        let response = request.send().await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            status if status == StatusCode::NOT_FOUND => Ok(false),
            status => Err(unexpected_status(status, response.text().await.unwrap_or_default())),
        }
    }

    /// Send a request that must succeed (404 is tolerated for deletes).
    async fn expect_success(&self, request: RequestBuilder) -> Result<()> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(unexpected_status(status, response.text().await.unwrap_or_default()))
        }
    }

    async fn milvus_call(&self, path: &str, name: &str) -> Result<MilvusResponse> {
        let response = self
            .client()?
            .post(self.url(path))
            .json(&self.milvus_body(name))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(unexpected_status(status, body));
        }

        let parsed: MilvusResponse = serde_json::from_str(&body)
            .map_err(|e| EvalError::ExternalService(format!("invalid Milvus response: {}", e)))?;
        if parsed.code != 0 {
            return Err(EvalError::ExternalService(format!(
                "Milvus error {}: {}",
                parsed.code,
                parsed.message.as_deref().unwrap_or("no message")
            )));
        }
        Ok(parsed)
    }
}

#[async_trait]
impl VectorStoreConnection for HttpConnection {
    fn backend(&self) -> Backend {
        self.config.backend
    }

    async fn collection_exists(&mut self, name: &str) -> Result<bool> {
        match self.config.backend {
            Backend::Qdrant => {
                let response = self
                    .client()?
                    .get(self.url(&format!("/collections/{}/exists", name)))
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(unexpected_status(status, response.text().await.unwrap_or_default()));
                }
                let body: QdrantExists = response.json().await?;
                Ok(body.result.exists)
            }
            Backend::Chroma => {
                let request = self.client()?.get(self.url(&self.chroma_collection_path(name)));
                self.check_exists(request).await
            }
            Backend::Weaviate => {
                let request = self.client()?.get(self.url(&format!("/v1/schema/{}", name)));
                self.check_exists(request).await
            }
            Backend::Milvus => {
                let response = self.milvus_call("/v2/vectordb/collections/has", name).await?;
                Ok(response.data.is_some_and(|d| d.has))
            }
        }
    }

    async fn delete_collection(&mut self, name: &str) -> Result<()> {
        match self.config.backend {
            Backend::Qdrant => {
                let request = self.client()?.delete(self.url(&format!("/collections/{}", name)));
                self.expect_success(request).await
            }
            Backend::Chroma => {
                let request = self
                    .client()?
                    .delete(self.url(&self.chroma_collection_path(name)));
                self.expect_success(request).await
            }
            Backend::Weaviate => {
                let request = self.client()?.delete(self.url(&format!("/v1/schema/{}", name)));
                self.expect_success(request).await
            }
            Backend::Milvus => {
                self.milvus_call("/v2/vectordb/collections/drop", name).await?;
                Ok(())
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.client.take().is_some() {
            debug!(backend = %self.config.backend, "Closed vector store connection");
        }
        Ok(())
    }
}

fn auth_headers(config: &VectorStoreConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) else {
        return Ok(headers);
    };

    let invalid = |_| {
        EvalError::InvalidConfig("vector store API key is not a valid header value".to_string())
    };
    match config.backend {
        Backend::Qdrant => {
            headers.insert("api-key", HeaderValue::from_str(key).map_err(invalid)?);
        }
        Backend::Chroma | Backend::Weaviate | Backend::Milvus => {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", key)).map_err(invalid)?,
            );
        }
    }
    Ok(headers)
}

fn unexpected_status(status: StatusCode, body: String) -> EvalError {
    EvalError::ExternalService(format!("unexpected status {}: {}", status, body.trim()))
}
