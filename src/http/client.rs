use governor::{
    RateLimiter,
    Quota,
    DefaultDirectRateLimiter,
    Jitter
};
use moka::future::Cache;
use reqwest::{Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::backend::retry::RetryPolicy;
use crate::backend::BackendError;
use crate::config::BackendConfig;
use crate::observability::backend_metrics;

/// Rate-limited HTTP client for the collaboration backend.
///
/// Reads go through a short-lived response cache and are retried on transient
/// failures; writes are sent once and invalidate cached reads they affect.
#[derive(Debug)]
pub struct RateLimitedHttpClient {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
    request_timeout: Option<Duration>,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    cache: Cache<String, serde_json::Value>,
    retry: RetryPolicy,
}

impl RateLimitedHttpClient {
    /// Create a new rate-limited HTTP client
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(BackendError::ConfigNotFound(
                "backend.base_url is empty".to_string(),
            ));
        }

        let per_second = NonZeroU32::new(config.rate_limit.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.rate_limit.burst_capacity).unwrap_or(per_second);
        let quota = Quota::per_second(per_second).allow_burst(burst);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        let mut builder = reqwest::Client::builder().user_agent(concat!(
            "workflow-runner/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.cache_ttl().max(Duration::from_millis(1)))
            .build();

        Ok(Self {
            client,
            base_url,
            api_token: config.api_token.clone(),
            request_timeout: config.request_timeout(),
            rate_limiter,
            cache,
            retry: RetryPolicy::from(&config.retry),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Execute a request with rate limiting and caching
    pub async fn execute_with_rate_limit<F, Fut, T>(&self, cache_key: Option<String>, request: F) -> Result<T, BackendError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
        T: Serialize + DeserializeOwned,
    {
        // Check cache first if cache_key is provided
        if let Some(ref key) = cache_key {
            if let Some(cached) = self.cache.get(key).await {
                debug!("Cache hit for key: {}", key);
                if let Ok(value) = serde_json::from_value(cached) {
                    backend_metrics().record_cache_hit();
                    return Ok(value);
                }
            }
            backend_metrics().record_cache_miss();
        }

        // Wait for rate limit permission
        if self.rate_limiter.check().is_err() {
            backend_metrics().record_rate_limit_wait();
            self.rate_limiter.until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100))).await;
        }

        backend_metrics().record_request();
        let result = request().await.inspect_err(|_| backend_metrics().record_error())?;

        // Cache the result if cache_key is provided
        if let Some(key) = cache_key {
            if let Ok(serialized) = serde_json::to_value(&result) {
                self.cache.insert(key, serialized).await;
                debug!("Cached response for future requests");
            }
        }

        Ok(result)
    }

    /// GET a JSON resource, cached and retried on transient failures
    pub async fn get_json<T>(&self, path: &str) -> Result<T, BackendError>
    where
        T: Serialize + DeserializeOwned,
    {
        let cache_key = format!("GET {path}");
        self.execute_with_rate_limit(Some(cache_key), || {
            self.retry
                .execute(path, || self.send_json(Method::GET, path, None::<&()>))
        })
        .await
    }

    /// GET a JSON resource, bypassing and refreshing the cache
    pub async fn get_json_fresh<T>(&self, path: &str) -> Result<T, BackendError>
    where
        T: Serialize + DeserializeOwned,
    {
        self.cache.invalidate(&format!("GET {path}")).await;
        self.get_json(path).await
    }

    /// POST a JSON body (or none) exactly once
    pub async fn post_json<B, T>(&self, path: &str, body: Option<&B>) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
    {
        self.execute_with_rate_limit(None, || self.send_json(Method::POST, path, body))
            .await
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let operation = format!("{method} {path}");
        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| self.map_send_error(&operation, err))?;
        let status = response.status();
        let text = response.text().await.map_err(|err| self.map_send_error(&operation, err))?;

        if !status.is_success() {
            return Err(BackendError::from_response_body(status, &text));
        }

        serde_json::from_str(&text).map_err(|source| BackendError::Decode {
            endpoint: operation,
            source,
        })
    }

    fn map_send_error(&self, operation: &str, err: reqwest::Error) -> BackendError {
        match (err.is_timeout(), self.request_timeout) {
            (true, Some(timeout)) => BackendError::Timeout {
                operation: operation.to_string(),
                duration_ms: timeout.as_millis() as u64,
            },
            _ => BackendError::Request(err),
        }
    }

    /// Clear cache (useful for testing or after write operations)
    pub async fn clear_cache(&self) {
        self.cache.invalidate_all();
        info!("HTTP client cache cleared");
    }

    /// Invalidate cache entries whose key contains `pattern`
    pub async fn invalidate_cache_pattern(&self, pattern: &str) {
        let keys_to_remove: Vec<String> = self.cache.iter()
            .filter(|(key, _)| key.contains(pattern))
            .map(|(key, _)| key.as_ref().clone())
            .collect();

        for key in keys_to_remove {
            self.cache.invalidate(&key).await;
        }

        debug!("Invalidated cache entries matching pattern: {}", pattern);
    }
}
