//! Folio HTTP client
//!
//! # Creating new api client
//!
//! - [new](FolioClient::new) - create new client with default configuration
//! - [with_config](FolioClient::with_config) - create client with custom configuration
//! - [with_client](FolioClient::with_client) - create client with configuration and custom reqwest client
//!
//! # Configuration
//!
//! - [get_config](FolioClient::get_config) - returns configuration
//! - [set_token](FolioClient::set_token) - sets the admin bearer token
//!
//! [`FolioClient`] implements [`ContentApi`] and [`ScreenshotApi`], so it can be
//! handed directly to a [`ContentStore`](crate::store::ContentStore) or a
//! [`PreviewResolver`](crate::preview::PreviewResolver).

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::de::IgnoredAny;
use serde_json::{Value, json};
use tracing::debug;
use zeroize::Zeroize;

use crate::{
    DEFAULT_PREVIEW_FRESHNESS, FOLIO_DEFAULT_URL, Result,
    api::{CachedScreenshot, CaptureEndpoint, ContentApi, ResourceKind, ScreenshotApi},
    config::{
        FOLIO_TOKEN_ENV, FOLIO_URL_ENV, RATE_LIMIT_MAX_RETRIES_DEFAULT, RATE_LIMIT_MAX_RETRIES_ENV,
    },
    http_client::{HttpClient, HttpMetricsSnapshot},
    model::{About, ContentBundle, SiteConfig},
    overrides::SkillOverride,
    skills::SourceKey,
    validation::ValidationLimits,
};

const SKILL_OVERRIDES_PATH: &str = "/api/skills/overrides";

/// Bearer token for admin requests. Cleared from memory on drop.
#[derive(Clone)]
pub struct SecretToken(String);

impl SecretToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub(crate) fn set_auth_header(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(&self.0)
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretToken(****)")
    }
}

impl Zeroize for SecretToken {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl Drop for SecretToken {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// Configuration for the folio client. Defines endpoint url, token, validation limits, and other settings.
///
/// ```rust,no_run
/// use folio::prelude::*;
/// # fn create_client() -> Result<FolioClient, FolioError> {
/// let config = ClientConfig::default()
///     .base_url("https://portfolio.example.com")
///     .token(SecretToken::new("admin-token"));
/// let client = FolioClient::with_config(config)?;
/// # Ok(client)
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base url for all content api requests.
    /// If not provided in config, url is determined by:
    /// * The environment variable FOLIO_URL, if defined, or
    /// * "http://127.0.0.1:3000" `folio::FOLIO_DEFAULT_URL`
    pub base_url: String,

    /// Bearer token for admin requests. Defaults to the FOLIO_TOKEN environment variable.
    /// Reads work without a token; mutations without one fail with `Unauthorized`.
    pub token: Option<SecretToken>,

    /// Limits for sanity checking.
    pub limits: ValidationLimits,

    /// Maximum consecutive 429 retries before failing (0 disables the cap).
    ///
    /// Defaults to RATE_LIMIT_MAX_RETRIES_DEFAULT, or the env override if set:
    /// FOLIO_RATE_LIMIT_MAX_RETRIES.
    pub rate_limit_max_retries: u32,

    /// Cached screenshots younger than this are reused. Defaults to 12 hours.
    pub preview_freshness: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: std::env::var(FOLIO_URL_ENV).unwrap_or(FOLIO_DEFAULT_URL.to_string()),
            token: std::env::var(FOLIO_TOKEN_ENV)
                .ok()
                .filter(|token| !token.trim().is_empty())
                .map(SecretToken::new),
            limits: ValidationLimits::default(),
            rate_limit_max_retries: std::env::var(RATE_LIMIT_MAX_RETRIES_ENV)
                .ok()
                .and_then(|value| value.parse::<u32>().ok())
                .unwrap_or(RATE_LIMIT_MAX_RETRIES_DEFAULT),
            preview_freshness: DEFAULT_PREVIEW_FRESHNESS,
        }
    }
}

impl ClientConfig {
    pub fn base_url(self, base_url: &str) -> Self {
        ClientConfig {
            base_url: base_url.to_string(),
            ..self
        }
    }

    pub fn token(self, token: SecretToken) -> Self {
        ClientConfig {
            token: Some(token),
            ..self
        }
    }

    pub fn limits(self, limits: ValidationLimits) -> Self {
        ClientConfig { limits, ..self }
    }

    pub fn rate_limit_max_retries(self, rate_limit_max_retries: u32) -> Self {
        ClientConfig {
            rate_limit_max_retries,
            ..self
        }
    }

    pub fn preview_freshness(self, preview_freshness: Duration) -> Self {
        ClientConfig {
            preview_freshness,
            ..self
        }
    }

    pub fn get_limits(&self) -> &ValidationLimits {
        &self.limits
    }
}

/// Content api client over HTTP
pub struct FolioClient {
    pub(crate) client: Arc<HttpClient>,
    pub(crate) config: ClientConfig,
}

impl fmt::Debug for FolioClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FolioClient")
            .field("config", &self.config)
            .field("has_token", &self.client.has_token())
            .finish()
    }
}

impl FolioClient {
    /// Creates a new client with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a new client with the provided configuration.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(30));
        Self::with_client(client, config)
    }

    /// Creates a client from a `reqwest::ClientBuilder` and configuration.
    /// ClientBuilder can be customized with timeouts, proxies, dns servers, user_agent, etc.
    ///
    /// # Example
    /// ```rust,no_run
    /// use folio::prelude::*;
    /// # fn create_client() -> Result<FolioClient, FolioError> {
    /// let builder = reqwest::Client::builder().timeout(std::time::Duration::from_secs(10));
    /// let client = FolioClient::with_client(builder, ClientConfig::default())?;
    /// # Ok(client)
    /// # }
    /// ```
    pub fn with_client(client: reqwest::ClientBuilder, config: ClientConfig) -> Result<Self> {
        debug!(url=?config.base_url, "new client");
        let client = HttpClient::new(
            client,
            config.base_url.clone(),
            config.limits.clone(),
            config.rate_limit_max_retries,
        )?;
        if let Some(token) = &config.token {
            client.set_token(token);
        }
        Ok(Self {
            client: Arc::new(client),
            config,
        })
    }

    /// Returns the configuration.
    pub fn get_config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sets the bearer token for subsequent requests
    pub fn set_token(&self, token: &SecretToken) {
        self.client.set_token(token);
    }

    pub fn clear_token(&self) {
        self.client.clear_token();
    }

    pub fn has_token(&self) -> bool {
        self.client.has_token()
    }

    /// Returns a snapshot of current HTTP metrics.
    ///
    /// These metrics track HTTP requests made to the API server:
    /// - `total_requests`: Number of HTTP requests sent
    /// - `successful_responses`: Number of successful (2xx) responses
    /// - `errors`: Number of error responses (excluding rate limit errors)
    /// - `retries`: Number of retry attempts
    /// - `bytes_sent`, `bytes_received`: request and response body totals
    /// - `rate_limit_errors`, `rate_limit_delay_secs`: 429 responses and time spent waiting
    pub fn http_metrics(&self) -> HttpMetricsSnapshot {
        self.client.metrics_snapshot()
    }

    /// Capture url builder for this server
    pub fn capture(&self) -> CaptureEndpoint {
        CaptureEndpoint::new(self.client.base_url.clone())
    }

    fn record_path(&self, kind: ResourceKind, id: &str) -> Result<String> {
        self.config.limits.validate_id(id, kind.singular())?;
        Ok(format!("{}/{id}", kind.path()))
    }
}

#[async_trait]
impl ContentApi for FolioClient {
    async fn fetch_content(&self) -> Result<ContentBundle> {
        self.client.get_request("/api/content", Vec::new()).await
    }

    async fn create(&self, kind: ResourceKind, data: Value) -> Result<Value> {
        self.client.post_request(kind.path(), &data).await
    }

    async fn update(&self, kind: ResourceKind, id: &str, data: Value) -> Result<Value> {
        let path = self.record_path(kind, id)?;
        self.client.put_request(&path, &data).await
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<()> {
        let path = self.record_path(kind, id)?;
        let _: IgnoredAny = self.client.delete_request::<_, ()>(&path, None).await?;
        Ok(())
    }

    async fn set_visibility(&self, kind: ResourceKind, id: &str, visible: bool) -> Result<Value> {
        let path = format!("{}/visibility", self.record_path(kind, id)?);
        self.client
            .patch_request(&path, &json!({ "visible": visible }))
            .await
    }

    async fn update_about(&self, about: &About) -> Result<About> {
        self.client.put_request("/api/about", about).await
    }

    async fn update_configuration(&self, config: &SiteConfig) -> Result<SiteConfig> {
        self.client.put_request("/api/configuration", config).await
    }

    async fn set_skill_override(&self, entry: &SkillOverride) -> Result<()> {
        let _: IgnoredAny = self.client.post_request(SKILL_OVERRIDES_PATH, entry).await?;
        Ok(())
    }

    async fn clear_skill_override(&self, key: &SourceKey) -> Result<()> {
        let _: IgnoredAny = self
            .client
            .delete_request(SKILL_OVERRIDES_PATH, Some(key))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ScreenshotApi for FolioClient {
    async fn lookup_screenshots(&self, live_url: &str) -> Result<Vec<CachedScreenshot>> {
        self.client
            .get_request(
                "/api/screenshots",
                vec![("url".to_string(), live_url.to_string())],
            )
            .await
    }

    fn capture(&self) -> CaptureEndpoint {
        FolioClient::capture(self)
    }
}
