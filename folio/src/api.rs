//! # Collaborator contracts
//!
//! The content core never talks to the network directly. [`ContentApi`] covers
//! content fetch and mutation, [`ScreenshotApi`] covers screenshot cache lookups.
//! [`FolioClient`](crate::client::FolioClient) implements both over HTTP, and
//! [`MockContentApi`](crate::test_util::MockContentApi) implements both in memory.
//!
//! Record payloads cross this boundary as json values, so one set of endpoints
//! serves every collection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    Result,
    model::{About, ContentBundle, SiteConfig},
    overrides::SkillOverride,
    skills::SourceKey,
};

/// Mutable record collections
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResourceKind {
    Projects,
    Certificates,
    Skills,
}

impl ResourceKind {
    /// Collection path, relative to the api root
    pub fn path(self) -> &'static str {
        match self {
            ResourceKind::Projects => "/api/projects",
            ResourceKind::Certificates => "/api/certificates",
            ResourceKind::Skills => "/api/skills",
        }
    }

    /// Singular name for messages
    pub fn singular(self) -> &'static str {
        match self {
            ResourceKind::Projects => "Project",
            ResourceKind::Certificates => "Certificate",
            ResourceKind::Skills => "Skill",
        }
    }
}

/// Content api operations used by the store
#[async_trait]
pub trait ContentApi: Send + Sync {
    /// Fetches all content in one request
    async fn fetch_content(&self) -> Result<ContentBundle>;

    /// Creates a record. Returns the stored record, including its server-issued id.
    async fn create(&self, kind: ResourceKind, data: Value) -> Result<Value>;

    /// Replaces the record with `id`. Returns the stored record.
    async fn update(&self, kind: ResourceKind, id: &str, data: Value) -> Result<Value>;

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<()>;

    /// Dedicated visibility toggle. Returns the stored record.
    async fn set_visibility(&self, kind: ResourceKind, id: &str, visible: bool) -> Result<Value>;

    async fn update_about(&self, about: &About) -> Result<About>;

    async fn update_configuration(&self, config: &SiteConfig) -> Result<SiteConfig>;

    /// Sets a hide/show directive on a derived skill at its origin
    async fn set_skill_override(&self, entry: &SkillOverride) -> Result<()>;

    /// Removes a source override, restoring the derived skill
    async fn clear_skill_override(&self, key: &SourceKey) -> Result<()>;
}

/// A previously captured screenshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedScreenshot {
    pub url: String,
    pub captured_at: DateTime<Utc>,
}

/// Screenshot service operations used by the preview resolver
#[async_trait]
pub trait ScreenshotApi: Send + Sync {
    /// Returns prior captures of `live_url`, in any order
    async fn lookup_screenshots(&self, live_url: &str) -> Result<Vec<CachedScreenshot>>;

    /// Endpoint used to build capture urls
    fn capture(&self) -> CaptureEndpoint;
}

/// Builds screenshot capture urls.
///
/// The url is embedded directly as an image source; the capture happens when
/// the image is first fetched, so nothing here waits for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEndpoint {
    base_url: String,
}

impl CaptureEndpoint {
    /// Capture path, relative to the api root
    pub const PATH: &'static str = "/api/screenshots/capture";

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Query parameters are form-encoded (space as `+`) whether or not the base is absolute.
    pub fn capture_url(&self, live_url: &str, entity_id: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("url", live_url)
            .append_pair("id", entity_id)
            .finish();
        format!("{}{}?{query}", self.base_url, Self::PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_url_encodes_params() {
        let endpoint = CaptureEndpoint::new("http://localhost:3000/");
        assert_eq!(
            endpoint.capture_url("https://example.com/a?b=c", "p 1"),
            "http://localhost:3000/api/screenshots/capture?url=https%3A%2F%2Fexample.com%2Fa%3Fb%3Dc&id=p+1"
        );
    }

    #[test]
    fn capture_url_with_relative_base() {
        let endpoint = CaptureEndpoint::new("");
        assert_eq!(
            endpoint.capture_url("https://example.com", "p1"),
            "/api/screenshots/capture?url=https%3A%2F%2Fexample.com&id=p1"
        );
    }

    #[test]
    fn relative_and_absolute_bases_encode_alike() {
        let absolute = CaptureEndpoint::new("https://folio.test").capture_url("https://a.test/x y", "p 1");
        let relative = CaptureEndpoint::new("").capture_url("https://a.test/x y", "p 1");
        assert_eq!(
            relative,
            "/api/screenshots/capture?url=https%3A%2F%2Fa.test%2Fx+y&id=p+1"
        );
        assert_eq!(absolute, format!("https://folio.test{relative}"));
    }

    #[test]
    fn resource_paths() {
        assert_eq!(ResourceKind::Certificates.path(), "/api/certificates");
        assert_eq!(ResourceKind::Skills.to_string(), "skills");
    }
}
