//! Azure Cosmos DB backend over the SQL API REST surface.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use models::counter::CounterDocument;
use reqwest::{
    header::{AUTHORIZATION, CONTENT_TYPE, IF_MATCH},
    Method, Response, StatusCode,
};
use sha2::Sha256;
use tracing::{debug, instrument};

use super::DocumentStore;
use crate::errors::StoreError;

type HmacSha256 = Hmac<Sha256>;

const API_VERSION: &str = "2018-12-31";
const RESOURCE_DOCS: &str = "docs";

/// Cosmos DB container client. Cheap to share: `reqwest::Client` pools
/// connections internally.
#[derive(Clone)]
pub struct CosmosStore {
    client: reqwest::Client,
    endpoint: String,
    key: Vec<u8>,
    database: String,
    container: String,
}

impl std::fmt::Debug for CosmosStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CosmosStore")
            .field("endpoint", &self.endpoint)
            .field("database", &self.database)
            .field("container", &self.container)
            .finish_non_exhaustive()
    }
}

impl CosmosStore {
    pub fn new(
        endpoint: &str,
        key: &str,
        database: &str,
        container: &str,
        request_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let endpoint = endpoint.trim().trim_end_matches('/').to_string();
        let lower = endpoint.to_lowercase();
        if !(lower.starts_with("https://") || lower.starts_with("http://")) {
            return Err(StoreError::Unavailable(format!(
                "store endpoint must start with https:// or http://, got `{endpoint}`"
            )));
        }
        let key = STANDARD
            .decode(key.trim())
            .map_err(|e| StoreError::Unavailable(format!("store key is not valid base64: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("cannot build http client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            key,
            database: database.to_string(),
            container: container.to_string(),
        })
    }

    /// Build from configuration; a missing endpoint or key is reported as
    /// [`StoreError::Unavailable`].
    pub fn from_config(cfg: &configs::StoreConfig) -> Result<Self, StoreError> {
        let endpoint = cfg
            .endpoint
            .as_deref()
            .ok_or_else(|| StoreError::Unavailable("COSMOS_DB_URL is not set".into()))?;
        let key = cfg
            .key
            .as_deref()
            .ok_or_else(|| StoreError::Unavailable("COSMOS_DB_KEY is not set".into()))?;
        Self::new(endpoint, key, &cfg.database, &cfg.container, cfg.request_timeout())
    }

    fn doc_link(&self, id: &str) -> String {
        format!("dbs/{}/colls/{}/docs/{}", self.database, self.container, id)
    }

    fn doc_url(&self, id: &str) -> String {
        format!(
            "{}/dbs/{}/colls/{}/docs/{}",
            self.endpoint,
            urlencoding::encode(&self.database),
            urlencoding::encode(&self.container),
            urlencoding::encode(id)
        )
    }

    /// Master-key authorization token for one request.
    pub fn auth_token(
        &self,
        verb: &Method,
        resource_type: &str,
        resource_link: &str,
        date: &str,
    ) -> Result<String, StoreError> {
        let payload = format!(
            "{}\n{}\n{}\n{}\n\n",
            verb.as_str().to_lowercase(),
            resource_type.to_lowercase(),
            resource_link,
            date.to_lowercase()
        );
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| StoreError::Unavailable(format!("invalid signing key: {e}")))?;
        mac.update(payload.as_bytes());
        let sig = STANDARD.encode(mac.finalize().into_bytes());
        Ok(urlencoding::encode(&format!("type=master&ver=1.0&sig={sig}")).into_owned())
    }

    async fn send(
        &self,
        method: Method,
        id: &str,
        partition_key: &str,
        body: Option<&CounterDocument>,
        if_match: Option<&str>,
    ) -> Result<Response, StoreError> {
        let date = http_date_now();
        let token = self.auth_token(&method, RESOURCE_DOCS, &self.doc_link(id), &date)?;
        let pk_header = serde_json::to_string(&[partition_key])
            .map_err(|e| StoreError::Other(format!("encode partition key: {e}")))?;

        let mut req = self
            .client
            .request(method, self.doc_url(id))
            .header(AUTHORIZATION, token)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION)
            .header("x-ms-documentdb-partitionkey", pk_header);
        if let Some(etag) = if_match {
            req = req.header(IF_MATCH, etag);
        }
        if let Some(doc) = body {
            req = req.header(CONTENT_TYPE, "application/json").json(doc);
        }
        req.send().await.map_err(map_transport_error)
    }
}

fn http_date_now() -> String {
    chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn map_transport_error(e: reqwest::Error) -> StoreError {
    if e.is_connect() || e.is_timeout() {
        StoreError::Unavailable(e.to_string())
    } else {
        StoreError::Other(e.to_string())
    }
}

async fn into_document(id: &str, resp: Response) -> Result<CounterDocument, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return resp
            .json::<CounterDocument>()
            .await
            .map_err(|e| StoreError::Other(format!("decode document: {e}")));
    }
    match status {
        StatusCode::NOT_FOUND => Err(StoreError::NotFound(id.to_string())),
        StatusCode::PRECONDITION_FAILED => Err(StoreError::Conflict(id.to_string())),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::SERVICE_UNAVAILABLE => {
            Err(StoreError::Unavailable(format!("store responded {status}")))
        }
        _ => {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            Err(StoreError::Other(format!("store responded {status}: {snippet}")))
        }
    }
}

#[async_trait]
impl DocumentStore for CosmosStore {
    #[instrument(skip(self), level = "debug")]
    async fn read_item(&self, id: &str, partition_key: &str) -> Result<CounterDocument, StoreError> {
        let resp = self.send(Method::GET, id, partition_key, None, None).await?;
        debug!(status = %resp.status(), "cosmos read");
        into_document(id, resp).await
    }

    #[instrument(skip(self, document), level = "debug")]
    async fn replace_item(
        &self,
        id: &str,
        partition_key: &str,
        document: &CounterDocument,
        if_match: Option<&str>,
    ) -> Result<CounterDocument, StoreError> {
        let resp = self.send(Method::PUT, id, partition_key, Some(document), if_match).await?;
        debug!(status = %resp.status(), "cosmos replace");
        into_document(id, resp).await
    }
}
