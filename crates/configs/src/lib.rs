use anyhow::anyhow;
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4) }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Cosmos,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosmos" => Ok(Self::Cosmos),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow!("unknown store backend `{other}` (expected cosmos or memory)")),
        }
    }
}

/// Document store connection settings.
///
/// `endpoint` and `key` stay optional: their absence is reported per request
/// as a store-unavailable failure, not at config load.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_container")]
    pub container: String,
    #[serde(default = "default_counter_id")]
    pub counter_id: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            endpoint: None,
            key: None,
            database: default_database(),
            container: default_container(),
            counter_id: default_counter_id(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base(),
            backoff_max_ms: default_backoff_max(),
        }
    }
}

fn default_database() -> String { "cloudresume".into() }
fn default_container() -> String { "visitors".into() }
fn default_counter_id() -> String { "resume-visitor-counter".into() }
fn default_request_timeout() -> u64 { 30 }
fn default_max_attempts() -> u32 { 5 }
fn default_backoff_base() -> u64 { 10 }
fn default_backoff_max() -> u64 { 200 }

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `CONFIG_PATH` (default `config.toml`) if it exists, overlay the
    /// process environment, then normalize and validate.
    pub fn load_and_validate() -> Result<Self> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        let mut cfg = if std::path::Path::new(&path).exists() {
            load_from_file(&path)?
        } else {
            AppConfig::default()
        };
        cfg.apply_env_with(|key| std::env::var(key).ok())?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Overlay values from an environment lookup. Blank values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(host) = get("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("SERVER_PORT") {
            self.server.port = port.parse().map_err(|e| anyhow!("SERVER_PORT `{port}`: {e}"))?;
        }
        if let Some(threads) = get("TOKIO_WORKER_THREADS") {
            self.server.worker_threads =
                Some(threads.parse().map_err(|e| anyhow!("TOKIO_WORKER_THREADS `{threads}`: {e}"))?);
        }

        if let Some(backend) = get("STORE_BACKEND") {
            self.store.backend = backend.parse()?;
        }
        if let Some(endpoint) = get("COSMOS_DB_URL") {
            self.store.endpoint = Some(endpoint);
        }
        if let Some(key) = get("COSMOS_DB_KEY") {
            self.store.key = Some(key);
        }
        if let Some(database) = get("COSMOS_DB_DATABASE") {
            self.store.database = database;
        }
        if let Some(container) = get("COSMOS_DB_CONTAINER") {
            self.store.container = container;
        }
        if let Some(id) = get("COUNTER_DOCUMENT_ID") {
            self.store.counter_id = id;
        }
        if let Some(secs) = get("STORE_REQUEST_TIMEOUT_SECS") {
            self.store.request_timeout_secs =
                secs.parse().map_err(|e| anyhow!("STORE_REQUEST_TIMEOUT_SECS `{secs}`: {e}"))?;
        }

        if let Some(n) = get("COUNTER_RETRY_MAX_ATTEMPTS") {
            self.retry.max_attempts = n.parse().map_err(|e| anyhow!("COUNTER_RETRY_MAX_ATTEMPTS `{n}`: {e}"))?;
        }
        if let Some(ms) = get("COUNTER_RETRY_BACKOFF_BASE_MS") {
            self.retry.backoff_base_ms =
                ms.parse().map_err(|e| anyhow!("COUNTER_RETRY_BACKOFF_BASE_MS `{ms}`: {e}"))?;
        }
        if let Some(ms) = get("COUNTER_RETRY_BACKOFF_MAX_MS") {
            self.retry.backoff_max_ms =
                ms.parse().map_err(|e| anyhow!("COUNTER_RETRY_BACKOFF_MAX_MS `{ms}`: {e}"))?;
        }
        Ok(())
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.store.normalize_and_validate()?;
        self.retry.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        Ok(())
    }
}

impl StoreConfig {
    fn normalize_and_validate(&mut self) -> Result<()> {
        // blank credentials behave exactly like missing ones
        self.endpoint = self.endpoint.take().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        self.key = self.key.take().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        self.counter_id = self.counter_id.trim().to_string();

        if self.counter_id.is_empty() {
            return Err(anyhow!("store.counter_id must not be empty"));
        }
        if self.database.trim().is_empty() || self.container.trim().is_empty() {
            return Err(anyhow!("store.database and store.container must not be empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("store.request_timeout_secs must be a positive number of seconds"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

impl RetryConfig {
    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be >= 1"));
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(anyhow!("retry.backoff_max_ms must be >= retry.backoff_base_ms"));
        }
        Ok(())
    }
}
