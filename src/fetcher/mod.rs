use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::query::QuerySpec;
use crate::runner::CatalogError;

pub type RequestLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct RawBookRecord {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub grade_level: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub lexile: Option<String>,
    #[serde(default)]
    pub literature_type: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Vec<serde_json::Value>>,
}

pub fn decode_envelope(status: u16, body: &[u8]) -> Result<Vec<RawBookRecord>, CatalogError> {
    if !(200..300).contains(&status) {
        return Err(CatalogError::Http { status });
    }
    let envelope: Envelope =
        serde_json::from_slice(body).map_err(|e| CatalogError::Decode { source: e })?;
    if !envelope.success {
        return Ok(Vec::new());
    }
    let records = envelope
        .data
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .filter_map(|(idx, entry)| match serde_json::from_value::<RawBookRecord>(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(index = idx, error = %e, "skipping undecodable book record");
                None
            }
        })
        .collect();
    Ok(records)
}

#[async_trait]
pub trait BookSource: Send + Sync {
    async fn fetch(&self, query: &QuerySpec) -> Result<Vec<RawBookRecord>, CatalogError>;
}

#[derive(Clone, Debug)]
pub struct HttpSettings {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub proxy: Option<String>,
}

#[derive(Clone, Debug)]
pub struct HttpBookSource {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl HttpBookSource {
    pub fn new(settings: &HttpSettings) -> Result<Self, CatalogError> {
        let base_url = parse_base_url(&settings.base_url)?;
        let client = build_client(settings.proxy.as_deref(), settings.timeout_seconds)?;
        Ok(Self { client, base_url })
    }
}

pub fn parse_base_url(raw: &str) -> Result<reqwest::Url, CatalogError> {
    let url = reqwest::Url::parse(raw.trim()).map_err(|_| CatalogError::InvalidBaseUrl {
        url: raw.to_string(),
    })?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(CatalogError::InvalidBaseUrl {
            url: raw.to_string(),
        });
    }
    Ok(url)
}

fn build_client(proxy: Option<&str>, timeout_seconds: u64) -> Result<reqwest::Client, CatalogError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static(concat!(
            "litshelf/",
            env!("CARGO_PKG_VERSION")
        )),
    );
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );

    let timeout = Duration::from_secs(if timeout_seconds == 0 { 10 } else { timeout_seconds });
    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .timeout(timeout);

    if let Some(proxy) = proxy.filter(|p| !p.trim().is_empty()) {
        let proxy = reqwest::Proxy::all(proxy).map_err(|e| CatalogError::ProxySetup {
            proxy: proxy.to_string(),
            source: e,
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| CatalogError::HttpClientBuild { source: e })
}

#[async_trait]
impl BookSource for HttpBookSource {
    async fn fetch(&self, query: &QuerySpec) -> Result<Vec<RawBookRecord>, CatalogError> {
        let url = query.to_url(&self.base_url)?;
        debug!(%url, "requesting books");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CatalogError::Transport { source: e })?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            return Err(CatalogError::Http { status });
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| CatalogError::Transport { source: e })?;
        decode_envelope(status, &body)
    }
}

pub fn request_limiter(rate: u32) -> Option<RequestLimiter> {
    NonZeroU32::new(rate).map(|rate| RateLimiter::direct(Quota::per_second(rate)))
}

pub async fn fetch_all<S>(
    source: &S,
    queries: &[QuerySpec],
    limiter: Option<&RequestLimiter>,
) -> Result<Vec<RawBookRecord>, CatalogError>
where
    S: BookSource + ?Sized,
{
    debug!(queries = queries.len(), "fanning out book queries");
    let requests = queries.iter().map(|query| async move {
        if let Some(lim) = limiter {
            lim.until_ready().await;
        }
        source.fetch(query).await
    });
    let slices = try_join_all(requests).await?;
    Ok(slices.into_iter().flatten().collect())
}
