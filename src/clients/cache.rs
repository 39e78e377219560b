/// Conditional-request caching for ESI endpoints
use crate::errors::{EsiError, EsiResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Description of a single HTTP call
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    pub body: Option<serde_json::Value>,
}

impl RequestDescriptor {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            body: Some(body),
        }
    }
}

/// What the transport hands back: status, caching headers and the raw body
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub etag: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub body: String,
}

/// Sends requests on behalf of the cache. `etag` is attached as `If-None-Match`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &RequestDescriptor, etag: Option<&str>)
        -> EsiResult<RawResponse>;
}

/// Parse an RFC 1123 `Expires` header value
pub fn parse_expires(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Last good result for one query key
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: Option<T>,
    pub expiration_time: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

impl<T> Default for CacheEntry<T> {
    fn default() -> Self {
        Self {
            data: None,
            expiration_time: None,
            etag: None,
        }
    }
}

impl<T> CacheEntry<T> {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiration_time {
            Some(expires) => now > expires,
            None => true,
        }
    }
}

/// Result of a cached call together with the time the data goes stale
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub data: T,
    pub expires: Option<DateTime<Utc>>,
}

/// Typed cache for one endpoint. Each key has its own lock, held across the
/// network call, so concurrent callers never race on the same entry.
pub struct CachedFetcher<K, T> {
    transport: Arc<dyn Transport>,
    entries: Mutex<HashMap<K, Arc<tokio::sync::Mutex<CacheEntry<T>>>>>,
}

impl<K, T> CachedFetcher<K, T>
where
    K: Eq + Hash + Clone + Send,
    T: DeserializeOwned + Clone + Send,
{
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, key: &K) -> Arc<tokio::sync::Mutex<CacheEntry<T>>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.entry(key.clone()).or_default().clone()
    }

    pub async fn fetch(&self, request: &RequestDescriptor, key: K) -> EsiResult<Fetched<T>> {
        let entry = self.entry(&key);
        let mut cache = entry.lock().await;

        if !cache.is_expired(Utc::now()) {
            if let Some(data) = &cache.data {
                return Ok(Fetched {
                    data: data.clone(),
                    expires: cache.expiration_time,
                });
            }
        }

        let resp = self
            .transport
            .send(request, cache.etag.as_deref())
            .await?;

        match resp.status {
            StatusCode::OK => {
                let data: T = serde_json::from_str(&resp.body)?;
                cache.data = Some(data.clone());
                cache.expiration_time = resp.expires;
                cache.etag = resp.etag;
                Ok(Fetched {
                    data,
                    expires: cache.expiration_time,
                })
            }
            StatusCode::NOT_MODIFIED => {
                let data = cache.data.clone().ok_or(EsiError::EmptyCache)?;
                cache.expiration_time = resp.expires;
                debug!("{} not modified, reusing cached data", request.url);
                Ok(Fetched {
                    data,
                    expires: cache.expiration_time,
                })
            }
            StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => {
                warn!(
                    "ESI is having problems (status {}), returning cached data instead",
                    resp.status.as_u16()
                );
                match &cache.data {
                    Some(data) => Ok(Fetched {
                        data: data.clone(),
                        expires: cache.expiration_time,
                    }),
                    None => Err(EsiError::ServerUnavailable {
                        status: resp.status.as_u16(),
                    }),
                }
            }
            other => Err(EsiError::UnexpectedStatus {
                status: other.as_u16(),
                body: resp.body,
            }),
        }
    }

    #[cfg(test)]
    pub async fn expire(&self, key: &K) {
        let entry = self.entry(key);
        entry.lock().await.expiration_time = None;
    }

    #[cfg(test)]
    pub async fn snapshot(&self, key: &K) -> CacheEntry<T> {
        let entry = self.entry(key);
        let cache = entry.lock().await;
        cache.clone()
    }
}
