//! Object storage gateway: deterministic key scheme, CDN vs. signed URL
//! resolution with a local TTL cache, and swappable backends (local
//! filesystem for tests/dev, S3 behind the `s3` feature for production).

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::error::Result;

pub use local::LocalObjectStore;
#[cfg(feature = "s3")]
pub use s3::S3ObjectStore;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
    /// A URL a client can use to fetch `key` directly: a signed URL for a
    /// private bucket, or a path under the CDN base when one is configured.
    async fn url_for(&self, key: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct CdnConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
}

struct CachedUrl {
    url: String,
    expires_at: Instant,
}

/// Wraps any `ObjectStore` to serve CDN URLs when configured, falling back
/// to the inner store's signed URL otherwise, with a short local cache so a
/// hot photo doesn't re-sign on every request.
pub struct CdnResolver<S: ObjectStore> {
    inner: S,
    cdn: CdnConfig,
    cache: RwLock<std::collections::HashMap<String, CachedUrl>>,
    signed_url_ttl: Duration,
}

impl<S: ObjectStore> CdnResolver<S> {
    pub fn new(inner: S, cdn: CdnConfig, signed_url_ttl: Duration) -> Self {
        Self {
            inner,
            cdn,
            cache: RwLock::new(std::collections::HashMap::new()),
            signed_url_ttl,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub async fn resolve(&self, key: &str) -> Result<String> {
        if self.cdn.enabled {
            if let Some(base) = &self.cdn.base_url {
                return Ok(format!("{}/{}", base.trim_end_matches('/'), key));
            }
        }

        if let Some(cached) = self.cache.read().await.get(key) {
            if cached.expires_at > Instant::now() {
                return Ok(cached.url.clone());
            }
        }

        let url = self.inner.url_for(key).await?;
        self.cache.write().await.insert(
            key.to_string(),
            CachedUrl {
                url: url.clone(),
                expires_at: Instant::now() + self.signed_url_ttl,
            },
        );
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cdn_enabled_bypasses_signed_url() {
        let store = LocalObjectStore::new(std::env::temp_dir().join("venue-ingest-test-cdn"));
        let resolver = CdnResolver::new(
            store,
            CdnConfig { enabled: true, base_url: Some("https://cdn.example.com".into()) },
            Duration::from_secs(60),
        );

        let url = resolver.resolve("businesses/abc/photos/def.jpg").await.unwrap();
        assert_eq!(url, "https://cdn.example.com/businesses/abc/photos/def.jpg");
    }
}
