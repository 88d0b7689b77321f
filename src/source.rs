use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::config::Config;
use crate::formats::WorkRecord;
use crate::normalize::{NormalizeOptions, normalize_works};

/// A provider of raw work records.
#[async_trait]
pub trait ContentSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self) -> anyhow::Result<Value>;
}

/// The live content query.
#[derive(Debug, Clone)]
pub struct QuerySource {
    client: reqwest::Client,
    url: Url,
}

impl QuerySource {
    pub fn new(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }

    pub fn from_config(client: reqwest::Client, config: &Config) -> anyhow::Result<Self> {
        let url = crate::sanity::query_url(config, crate::sanity::WORKS_QUERY, &[])
            .context("build works query url")?;
        Ok(Self::new(client, url))
    }
}

#[async_trait]
impl ContentSource for QuerySource {
    fn name(&self) -> &str {
        "content-query"
    }

    async fn fetch(&self) -> anyhow::Result<Value> {
        let result = crate::sanity::fetch_result(&self.client, &self.url).await?;
        if result.is_array() {
            return Ok(result);
        }
        tracing::warn!(
            kind = crate::normalize::value_kind(&result),
            "unexpected query result; treating as empty"
        );
        Ok(Value::Array(Vec::new()))
    }
}

/// The static fallback file, read from disk or fetched over http(s).
#[derive(Debug, Clone)]
pub struct FallbackFileSource {
    client: reqwest::Client,
    location: String,
}

impl FallbackFileSource {
    pub fn new(client: reqwest::Client, location: impl Into<String>) -> Self {
        Self {
            client,
            location: location.into(),
        }
    }
}

#[async_trait]
impl ContentSource for FallbackFileSource {
    fn name(&self) -> &str {
        "fallback-file"
    }

    async fn fetch(&self) -> anyhow::Result<Value> {
        let bytes = read_location(&self.client, &self.location)
            .await
            .context("read fallback data")?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("parse fallback data: {}", self.location))
    }
}

/// Reads raw bytes from an http(s) URL or a local path.
pub async fn read_location(client: &reqwest::Client, location: &str) -> anyhow::Result<Vec<u8>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        let response = client
            .get(location)
            .send()
            .await
            .with_context(|| format!("GET {location}"))?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("GET {location} failed ({status})");
        }
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("read body: {location}"))?;
        return Ok(bytes.to_vec());
    }

    tokio::fs::read(location)
        .await
        .with_context(|| format!("read: {location}"))
}

struct ChainLink {
    source: Arc<dyn ContentSource>,
    attempts: u32,
}

/// Ordered providers tried one after another. Each attempt is isolated; the
/// first success is normalized and returned. When every provider fails the
/// catalog is empty.
#[derive(Default)]
pub struct FallbackChain {
    links: Vec<ChainLink>,
}

impl FallbackChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a provider tried up to `attempts` times (at least once).
    pub fn then(mut self, source: Arc<dyn ContentSource>, attempts: u32) -> Self {
        self.links.push(ChainLink {
            source,
            attempts: attempts.max(1),
        });
        self
    }

    /// Live query (`1 + retries` attempts), then the static fallback once.
    pub fn from_config(client: &reqwest::Client, config: &Config) -> anyhow::Result<Self> {
        let query = QuerySource::from_config(client.clone(), config)?;
        let fallback = FallbackFileSource::new(client.clone(), config.fallback.clone());
        Ok(Self::new()
            .then(Arc::new(query), config.retries.saturating_add(1))
            .then(Arc::new(fallback), 1))
    }

    pub async fn load_works(&self, options: &NormalizeOptions) -> Vec<WorkRecord> {
        for link in &self.links {
            let source = link.source.name();
            for attempt in 1..=link.attempts {
                match link.source.fetch().await {
                    Ok(value) => {
                        let works = normalize_works(&value, options);
                        tracing::info!(source, attempt, works = works.len(), "loaded catalog");
                        return works;
                    }
                    Err(err) => {
                        tracing::warn!(
                            source,
                            attempt,
                            retries_left = link.attempts - attempt,
                            error = %format!("{err:#}"),
                            "content fetch failed"
                        );
                    }
                }
            }
        }

        tracing::error!("all content sources failed; catalog is empty");
        Vec::new()
    }
}

pub fn http_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("acervo/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("build http client")
}
