//! Test utilities
//!
//! In-memory collaborators used to test the `folio` library without a server.
//! These are not part of the supported api and are subject to change.
//!
#![doc(hidden)]

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use snafu::prelude::*;
use tokio::sync::watch;

use crate::{
    Result,
    api::{CachedScreenshot, CaptureEndpoint, ContentApi, ResourceKind, ScreenshotApi},
    error::{DeserializationSnafu, FolioError, SerializationSnafu},
    model::{About, Certificate, ContentBundle, Project, SiteConfig},
    overrides::SkillOverride,
    skills::{Skill, SourceKey},
    store::{ContentSnapshot, Record},
};

/// Base url used by the mock capture endpoint
pub const MOCK_BASE_URL: &str = "http://mock.folio.test";

// =============================================================================
// TestError
// =============================================================================

#[doc(hidden)]
pub type TestResult<T> = std::result::Result<T, TestError>;

#[doc(hidden)]
#[derive(Debug, Snafu)]
pub enum TestError {
    #[snafu(display("API error: {source}"))]
    Api { source: FolioError },

    #[snafu(display("Test assertion failed: {message}"))]
    Assertion { message: String },
}

impl From<FolioError> for TestError {
    fn from(source: FolioError) -> Self {
        TestError::Api { source }
    }
}

// =============================================================================
// MockContentApi
// =============================================================================

/// One request received by [`MockContentApi`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    FetchContent,
    Create { kind: ResourceKind },
    Update { kind: ResourceKind, id: String },
    Delete { kind: ResourceKind, id: String },
    SetVisibility { kind: ResourceKind, id: String, visible: bool },
    UpdateAbout,
    UpdateConfiguration,
    SetSkillOverride(SkillOverride),
    ClearSkillOverride(SourceKey),
    LookupScreenshots(String),
}

#[derive(Debug, Default)]
struct MockServer {
    content: ContentSnapshot,
    skill_overrides: Vec<SkillOverride>,
    screenshots: HashMap<String, Vec<CachedScreenshot>>,
    next_id: u64,
    failures: VecDeque<FolioError>,
    fail_lookups: bool,
    calls: Vec<ApiCall>,
}

/// In-memory content api and screenshot service.
///
/// - `fail_next` queues errors returned by the next calls, in order
/// - `hold` makes every call wait, after it is logged, until `release`
/// - `calls` returns the request log
#[derive(Debug)]
pub struct MockContentApi {
    server: Mutex<MockServer>,
    gate: watch::Sender<bool>,
    call_count: watch::Sender<usize>,
}

impl Default for MockContentApi {
    fn default() -> Self {
        Self::new(ContentBundle::default())
    }
}

impl MockContentApi {
    pub fn new(bundle: ContentBundle) -> Self {
        let skill_overrides = bundle.skill_overrides.clone();
        let (gate, _) = watch::channel(true);
        let (call_count, _) = watch::channel(0);
        Self {
            server: Mutex::new(MockServer {
                content: ContentSnapshot::from(bundle),
                skill_overrides,
                next_id: 1,
                ..Default::default()
            }),
            gate,
            call_count,
        }
    }

    /// The next call fails with `err`. Queued errors are used in order.
    pub fn fail_next(&self, err: FolioError) {
        self.server.lock().failures.push_back(err);
    }

    /// The next call fails with a 500 response
    pub fn fail_next_with_status(&self, code: u16) {
        self.fail_next(FolioError::ApiError {
            code,
            method: "mock".into(),
            url: "mock".into(),
            message: format!("mock failure {code}"),
        });
    }

    /// Screenshot lookups fail while set
    pub fn fail_lookups(&self, fail: bool) {
        self.server.lock().fail_lookups = fail;
    }

    pub fn add_screenshot(&self, live_url: &str, url: &str, captured_at: DateTime<Utc>) {
        self.server
            .lock()
            .screenshots
            .entry(live_url.to_string())
            .or_default()
            .push(CachedScreenshot {
                url: url.to_string(),
                captured_at,
            });
    }

    /// Calls wait until [`release`](Self::release)
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Request log, oldest first
    pub fn calls(&self) -> Vec<ApiCall> {
        self.server.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.server.lock().calls.clear();
    }

    /// Waits until at least `n` calls have been received
    pub async fn wait_for_calls(&self, n: usize) {
        let mut rx = self.call_count.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    /// Content as currently stored by the mock server
    pub fn server_content(&self) -> ContentSnapshot {
        self.server.lock().content.clone()
    }

    pub fn server_skill_overrides(&self) -> Vec<SkillOverride> {
        self.server.lock().skill_overrides.clone()
    }

    // logs the call, waits for the gate, then takes a queued failure if any
    async fn enter(&self, call: ApiCall) -> Result<()> {
        let count = {
            let mut server = self.server.lock();
            server.calls.push(call);
            server.calls.len()
        };
        self.call_count.send_replace(count);
        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
        match self.server.lock().failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn with_server<T>(&self, f: impl FnOnce(&mut MockServer) -> Result<T>) -> Result<T> {
        f(&mut self.server.lock())
    }
}

fn not_found(kind: ResourceKind, id: &str) -> FolioError {
    FolioError::NotFound {
        obj_type: kind.singular().to_string(),
        key: id.to_string(),
    }
}

fn create_record<R: Record>(content: &mut ContentSnapshot, mut data: Value, id: String) -> Result<Value> {
    if let Value::Object(fields) = &mut data {
        fields.insert("id".into(), Value::String(id));
    }
    let record: R = serde_json::from_value(data).context(DeserializationSnafu)?;
    let value = serde_json::to_value(&record).context(SerializationSnafu)?;
    R::records_mut(content).push(record);
    Ok(value)
}

fn update_record<R: Record>(content: &mut ContentSnapshot, id: &str, mut data: Value) -> Result<Value> {
    if let Value::Object(fields) = &mut data {
        fields.insert("id".into(), Value::String(id.to_string()));
    }
    let record: R = serde_json::from_value(data).context(DeserializationSnafu)?;
    let slot = R::records_mut(content)
        .iter_mut()
        .find(|r| r.id() == id)
        .ok_or_else(|| not_found(R::KIND, id))?;
    *slot = record;
    serde_json::to_value(&*slot).context(SerializationSnafu)
}

fn set_visible<R: Record>(content: &mut ContentSnapshot, id: &str, visible: bool) -> Result<Value> {
    let current = R::records(content)
        .iter()
        .find(|r| r.id() == id)
        .ok_or_else(|| not_found(R::KIND, id))?;
    let mut value = serde_json::to_value(current).context(SerializationSnafu)?;
    if let Value::Object(fields) = &mut value {
        fields.insert("visible".into(), Value::Bool(visible));
    }
    update_record::<R>(content, id, value)
}

fn delete_record<R: Record>(content: &mut ContentSnapshot, id: &str) -> Result<()> {
    let records = R::records_mut(content);
    let pos = records
        .iter()
        .position(|r| r.id() == id)
        .ok_or_else(|| not_found(R::KIND, id))?;
    records.remove(pos);
    Ok(())
}

#[async_trait]
impl ContentApi for MockContentApi {
    async fn fetch_content(&self) -> Result<ContentBundle> {
        self.enter(ApiCall::FetchContent).await?;
        self.with_server(|server| {
            let content = server.content.clone();
            Ok(ContentBundle {
                about: content.about,
                projects: content.projects,
                certificates: content.certificates,
                skills: content.skills,
                configuration: content.configuration,
                skill_overrides: server.skill_overrides.clone(),
                repositories: content.repositories,
            })
        })
    }

    async fn create(&self, kind: ResourceKind, data: Value) -> Result<Value> {
        self.enter(ApiCall::Create { kind }).await?;
        self.with_server(|server| {
            let id = format!("srv-{}", server.next_id);
            server.next_id += 1;
            match kind {
                ResourceKind::Projects => create_record::<Project>(&mut server.content, data, id),
                ResourceKind::Certificates => {
                    create_record::<Certificate>(&mut server.content, data, id)
                }
                ResourceKind::Skills => create_record::<Skill>(&mut server.content, data, id),
            }
        })
    }

    async fn update(&self, kind: ResourceKind, id: &str, data: Value) -> Result<Value> {
        self.enter(ApiCall::Update {
            kind,
            id: id.to_string(),
        })
        .await?;
        self.with_server(|server| match kind {
            ResourceKind::Projects => update_record::<Project>(&mut server.content, id, data),
            ResourceKind::Certificates => update_record::<Certificate>(&mut server.content, id, data),
            ResourceKind::Skills => update_record::<Skill>(&mut server.content, id, data),
        })
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<()> {
        self.enter(ApiCall::Delete {
            kind,
            id: id.to_string(),
        })
        .await?;
        self.with_server(|server| match kind {
            ResourceKind::Projects => delete_record::<Project>(&mut server.content, id),
            ResourceKind::Certificates => delete_record::<Certificate>(&mut server.content, id),
            ResourceKind::Skills => delete_record::<Skill>(&mut server.content, id),
        })
    }

    async fn set_visibility(&self, kind: ResourceKind, id: &str, visible: bool) -> Result<Value> {
        self.enter(ApiCall::SetVisibility {
            kind,
            id: id.to_string(),
            visible,
        })
        .await?;
        self.with_server(|server| match kind {
            ResourceKind::Projects => set_visible::<Project>(&mut server.content, id, visible),
            ResourceKind::Certificates => set_visible::<Certificate>(&mut server.content, id, visible),
            ResourceKind::Skills => set_visible::<Skill>(&mut server.content, id, visible),
        })
    }

    async fn update_about(&self, about: &About) -> Result<About> {
        self.enter(ApiCall::UpdateAbout).await?;
        self.with_server(|server| {
            server.content.about = about.clone();
            Ok(about.clone())
        })
    }

    async fn update_configuration(&self, config: &SiteConfig) -> Result<SiteConfig> {
        self.enter(ApiCall::UpdateConfiguration).await?;
        self.with_server(|server| {
            server.content.configuration = config.clone();
            Ok(config.clone())
        })
    }

    async fn set_skill_override(&self, entry: &SkillOverride) -> Result<()> {
        self.enter(ApiCall::SetSkillOverride(entry.clone())).await?;
        self.with_server(|server| {
            server.skill_overrides.retain(|o| o.key != entry.key);
            server.skill_overrides.push(entry.clone());
            Ok(())
        })
    }

    async fn clear_skill_override(&self, key: &SourceKey) -> Result<()> {
        self.enter(ApiCall::ClearSkillOverride(key.clone())).await?;
        self.with_server(|server| {
            server.skill_overrides.retain(|o| &o.key != key);
            Ok(())
        })
    }
}

#[async_trait]
impl ScreenshotApi for MockContentApi {
    async fn lookup_screenshots(&self, live_url: &str) -> Result<Vec<CachedScreenshot>> {
        self.enter(ApiCall::LookupScreenshots(live_url.to_string()))
            .await?;
        self.with_server(|server| {
            if server.fail_lookups {
                return Err(FolioError::ApiError {
                    code: 503,
                    method: "GET".into(),
                    url: "/api/screenshots".into(),
                    message: "screenshot cache unavailable".into(),
                });
            }
            Ok(server.screenshots.get(live_url).cloned().unwrap_or_default())
        })
    }

    fn capture(&self) -> CaptureEndpoint {
        CaptureEndpoint::new(MOCK_BASE_URL)
    }
}
