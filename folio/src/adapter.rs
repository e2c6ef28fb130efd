//! # Entity adapters
//!
//! An [`EntityAdapter`] knows how to read display data out of one kind of
//! [`Entity`]: preview image, status badge, technologies, linked items, and
//! external links. The render layer only talks to adapters, and picks one per
//! entity through the [`AdapterRegistry`] lookup table. Supporting a new entity
//! kind means registering one more adapter.
//!
//! Adapters are pure functions of their inputs.
//!
//! ## Preview priority
//!
//! Projects and repositories:
//! 1. custom (uploaded) images
//! 2. a resolved [`PreviewEntry`](crate::preview::PreviewEntry) for the entity id
//! 3. a freshly built screenshot capture url, if the entity has a live url
//! 4. fallback
//!
//! Certificates:
//! 1. extracted preview image
//! 2. primary file, if it is an image
//! 3. primary file, if it is a pdf
//! 4. generic image field
//! 5. fallback

use std::{collections::HashMap, fmt, sync::Arc};

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::debug;

use crate::{
    api::CaptureEndpoint,
    model::{Certificate, Entity, EntityKind, FileRef, Project, ProjectStatus, RepoSummary},
    preview::PreviewMap,
};

/// How to render an entity's image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PreviewDescriptor {
    Custom { url: String, alt: String },
    Screenshot { url: String, alt: String },
    Image { url: String, alt: String },
    Pdf { file: FileRef, alt: String },
    Fallback { alt: String },
}

impl PreviewDescriptor {
    pub fn kind(&self) -> &'static str {
        match self {
            PreviewDescriptor::Custom { .. } => "custom",
            PreviewDescriptor::Screenshot { .. } => "screenshot",
            PreviewDescriptor::Image { .. } => "image",
            PreviewDescriptor::Pdf { .. } => "pdf",
            PreviewDescriptor::Fallback { .. } => "fallback",
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            PreviewDescriptor::Custom { url, .. }
            | PreviewDescriptor::Screenshot { url, .. }
            | PreviewDescriptor::Image { url, .. } => Some(url),
            PreviewDescriptor::Pdf { file, .. } => Some(&file.url),
            PreviewDescriptor::Fallback { .. } => None,
        }
    }

    pub fn alt(&self) -> &str {
        match self {
            PreviewDescriptor::Custom { alt, .. }
            | PreviewDescriptor::Screenshot { alt, .. }
            | PreviewDescriptor::Image { alt, .. }
            | PreviewDescriptor::Pdf { alt, .. }
            | PreviewDescriptor::Fallback { alt } => alt,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, PreviewDescriptor::Fallback { .. })
    }
}

/// Inputs for preview descriptors: resolved preview state and the capture endpoint
#[derive(Debug, Clone)]
pub struct PreviewContext {
    previews: Arc<PreviewMap>,
    capture: CaptureEndpoint,
}

impl PreviewContext {
    pub fn new(previews: Arc<PreviewMap>, capture: CaptureEndpoint) -> Self {
        Self { previews, capture }
    }

    /// Context with no resolved previews
    pub fn empty(capture: CaptureEndpoint) -> Self {
        Self::new(Arc::default(), capture)
    }

    /// Resolved preview url for an entity, if any
    pub fn resolved_url(&self, entity_id: &str) -> Option<&str> {
        self.previews
            .get(entity_id)
            .filter(|entry| !entry.loading)
            .and_then(|entry| entry.url.as_deref())
    }

    /// True if preview resolution gave up on this entity
    pub fn is_exhausted(&self, entity_id: &str) -> bool {
        self.previews
            .get(entity_id)
            .is_some_and(|entry| entry.is_exhausted())
    }

    pub fn capture(&self) -> &CaptureEndpoint {
        &self.capture
    }
}

/// Small label shown on a card
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBadge {
    pub text: String,
    pub style_class: String,
}

impl StatusBadge {
    fn new(text: impl Into<String>, style_class: &str) -> Self {
        Self {
            text: text.into(),
            style_class: style_class.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LinkType {
    Live,
    Source,
    Credential,
    Document,
}

/// Link to something outside the portfolio
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalLink {
    #[serde(rename = "type")]
    pub link_type: LinkType,
    pub url: String,
    pub label: String,
}

impl ExternalLink {
    fn new(link_type: LinkType, url: &str, label: &str) -> Self {
        Self {
            link_type,
            url: url.to_string(),
            label: label.to_string(),
        }
    }
}

/// Reads display data from one kind of entity.
///
/// Methods called with an entity of a different kind return empty results.
pub trait EntityAdapter: Send + Sync {
    fn kind(&self) -> EntityKind;

    fn preview_descriptor(&self, entity: &Entity, ctx: &PreviewContext) -> PreviewDescriptor;

    fn status_badge(&self, entity: &Entity) -> Option<StatusBadge>;

    fn technologies(&self, entity: &Entity) -> Vec<String>;

    /// Entities from `pool` referenced by `entity`. Ids missing from the pool are skipped.
    fn linked_items(&self, entity: &Entity, pool: &[Entity]) -> Vec<Entity>;

    fn external_links(&self, entity: &Entity) -> Vec<ExternalLink>;

    /// Url of the deployed site, used for screenshots
    fn live_url<'a>(&self, entity: &'a Entity) -> Option<&'a str>;

    /// True if the entity carries its own image, so no screenshot is needed
    fn has_custom_image(&self, entity: &Entity) -> bool;
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

// shared by entities whose preview is a screenshot of a live site
fn screenshot_descriptor(
    id: &str,
    live_url: Option<&str>,
    alt: String,
    ctx: &PreviewContext,
) -> PreviewDescriptor {
    if let Some(url) = ctx.resolved_url(id) {
        return PreviewDescriptor::Screenshot {
            url: url.to_string(),
            alt,
        };
    }
    if let Some(live_url) = live_url.filter(|_| !ctx.is_exhausted(id)) {
        return PreviewDescriptor::Screenshot {
            url: ctx.capture().capture_url(live_url, id),
            alt,
        };
    }
    PreviewDescriptor::Fallback { alt }
}

fn pick_linked(ids: &[String], pool: &[Entity], kind: EntityKind, owner: &str) -> Vec<Entity> {
    ids.iter()
        .filter_map(|id| {
            let found = pool
                .iter()
                .find(|candidate| candidate.kind() == kind && candidate.id() == id.as_str());
            if found.is_none() {
                debug!(owner, linked = id.as_str(), %kind, "skipping orphaned link");
            }
            found.cloned()
        })
        .collect()
}

/// Adapter for [`Project`]
#[derive(Debug, Default, Clone, Copy)]
pub struct ProjectAdapter;

impl ProjectAdapter {
    fn project(entity: &Entity) -> Option<&Project> {
        match entity {
            Entity::Project(project) => Some(project),
            _ => None,
        }
    }
}

impl EntityAdapter for ProjectAdapter {
    fn kind(&self) -> EntityKind {
        EntityKind::Project
    }

    fn preview_descriptor(&self, entity: &Entity, ctx: &PreviewContext) -> PreviewDescriptor {
        let Some(project) = Self::project(entity) else {
            return PreviewDescriptor::Fallback {
                alt: entity.title().to_string(),
            };
        };
        let alt = format!("{} preview", project.title);
        if let Some(url) = project.images.iter().map(|s| s.trim()).find(|s| !s.is_empty()) {
            return PreviewDescriptor::Custom {
                url: url.to_string(),
                alt,
            };
        }
        screenshot_descriptor(&project.id, self.live_url(entity), alt, ctx)
    }

    fn status_badge(&self, entity: &Entity) -> Option<StatusBadge> {
        let project = Self::project(entity)?;
        Some(match project.status {
            ProjectStatus::Completed => StatusBadge::new("Completed", "badge-success"),
            ProjectStatus::InProgress => StatusBadge::new("In Progress", "badge-warning"),
            ProjectStatus::Planned => StatusBadge::new("Planned", "badge-info"),
            ProjectStatus::Archived => StatusBadge::new("Archived", "badge-muted"),
        })
    }

    fn technologies(&self, entity: &Entity) -> Vec<String> {
        Self::project(entity)
            .map(|project| project.technologies.clone())
            .unwrap_or_default()
    }

    fn linked_items(&self, entity: &Entity, pool: &[Entity]) -> Vec<Entity> {
        Self::project(entity)
            .map(|project| {
                pick_linked(
                    &project.linked_certificates,
                    pool,
                    EntityKind::Certificate,
                    &project.id,
                )
            })
            .unwrap_or_default()
    }

    fn external_links(&self, entity: &Entity) -> Vec<ExternalLink> {
        let Some(project) = Self::project(entity) else {
            return Vec::new();
        };
        let mut links = Vec::new();
        if let Some(url) = non_empty(project.live_url.as_ref()) {
            links.push(ExternalLink::new(LinkType::Live, url, "Live Demo"));
        }
        if let Some(url) = non_empty(project.repo_url.as_ref()) {
            links.push(ExternalLink::new(LinkType::Source, url, "Source Code"));
        }
        links
    }

    fn live_url<'a>(&self, entity: &'a Entity) -> Option<&'a str> {
        Self::project(entity).and_then(|project| non_empty(project.live_url.as_ref()))
    }

    fn has_custom_image(&self, entity: &Entity) -> bool {
        Self::project(entity)
            .is_some_and(|project| project.images.iter().any(|s| !s.trim().is_empty()))
    }
}

/// Adapter for [`Certificate`]
#[derive(Debug, Default, Clone, Copy)]
pub struct CertificateAdapter {
    /// Date used for expiry badges. `None` uses today's date.
    as_of: Option<NaiveDate>,
}

impl CertificateAdapter {
    /// Adapter that evaluates expiry as of a fixed date
    pub fn as_of(date: NaiveDate) -> Self {
        Self { as_of: Some(date) }
    }

    fn certificate(entity: &Entity) -> Option<&Certificate> {
        match entity {
            Entity::Certificate(certificate) => Some(certificate),
            _ => None,
        }
    }
}

impl EntityAdapter for CertificateAdapter {
    fn kind(&self) -> EntityKind {
        EntityKind::Certificate
    }

    fn preview_descriptor(&self, entity: &Entity, _ctx: &PreviewContext) -> PreviewDescriptor {
        let Some(cert) = Self::certificate(entity) else {
            return PreviewDescriptor::Fallback {
                alt: entity.title().to_string(),
            };
        };
        let alt = format!("{} certificate", cert.title);
        if let Some(url) = non_empty(cert.preview_image.as_ref()) {
            return PreviewDescriptor::Image {
                url: url.to_string(),
                alt,
            };
        }
        if let Some(file) = cert.file.as_ref().filter(|file| !file.url.is_empty()) {
            if file.is_image() {
                return PreviewDescriptor::Image {
                    url: file.url.clone(),
                    alt,
                };
            }
            if file.is_pdf() {
                return PreviewDescriptor::Pdf {
                    file: file.clone(),
                    alt,
                };
            }
        }
        if let Some(url) = non_empty(cert.image.as_ref()) {
            return PreviewDescriptor::Image {
                url: url.to_string(),
                alt,
            };
        }
        PreviewDescriptor::Fallback { alt }
    }

    fn status_badge(&self, entity: &Entity) -> Option<StatusBadge> {
        let cert = Self::certificate(entity)?;
        let expiry = cert.expiry_date?;
        let today = self.as_of.unwrap_or_else(|| Utc::now().date_naive());
        Some(if expiry < today {
            StatusBadge::new("Expired", "badge-danger")
        } else {
            StatusBadge::new("Valid", "badge-success")
        })
    }

    fn technologies(&self, entity: &Entity) -> Vec<String> {
        Self::certificate(entity)
            .map(|cert| cert.skills.clone())
            .unwrap_or_default()
    }

    fn linked_items(&self, entity: &Entity, pool: &[Entity]) -> Vec<Entity> {
        Self::certificate(entity)
            .map(|cert| pick_linked(&cert.linked_projects, pool, EntityKind::Project, &cert.id))
            .unwrap_or_default()
    }

    fn external_links(&self, entity: &Entity) -> Vec<ExternalLink> {
        let Some(cert) = Self::certificate(entity) else {
            return Vec::new();
        };
        let mut links = Vec::new();
        if let Some(url) = non_empty(cert.credential_url.as_ref()) {
            links.push(ExternalLink::new(
                LinkType::Credential,
                url,
                "Verify Credential",
            ));
        }
        if let Some(file) = cert.file.as_ref().filter(|file| !file.url.is_empty()) {
            links.push(ExternalLink::new(
                LinkType::Document,
                &file.url,
                "View Certificate",
            ));
        }
        links
    }

    fn live_url<'a>(&self, _entity: &'a Entity) -> Option<&'a str> {
        None
    }

    fn has_custom_image(&self, entity: &Entity) -> bool {
        !self
            .preview_descriptor(entity, &PreviewContext::empty(CaptureEndpoint::new("")))
            .is_fallback()
    }
}

/// Adapter for [`RepoSummary`]
#[derive(Debug, Default, Clone, Copy)]
pub struct RepoAdapter;

impl RepoAdapter {
    fn repo(entity: &Entity) -> Option<&RepoSummary> {
        match entity {
            Entity::Repository(repo) => Some(repo),
            _ => None,
        }
    }
}

impl EntityAdapter for RepoAdapter {
    fn kind(&self) -> EntityKind {
        EntityKind::Repository
    }

    fn preview_descriptor(&self, entity: &Entity, ctx: &PreviewContext) -> PreviewDescriptor {
        let Some(repo) = Self::repo(entity) else {
            return PreviewDescriptor::Fallback {
                alt: entity.title().to_string(),
            };
        };
        screenshot_descriptor(
            &repo.id,
            self.live_url(entity),
            format!("{} preview", repo.name),
            ctx,
        )
    }

    fn status_badge(&self, entity: &Entity) -> Option<StatusBadge> {
        let repo = Self::repo(entity)?;
        (repo.stars > 0).then(|| StatusBadge::new(format!("{} stars", repo.stars), "badge-info"))
    }

    fn technologies(&self, entity: &Entity) -> Vec<String> {
        let Some(repo) = Self::repo(entity) else {
            return Vec::new();
        };
        repo.language
            .iter()
            .chain(repo.topics.iter())
            .cloned()
            .collect()
    }

    fn linked_items(&self, entity: &Entity, pool: &[Entity]) -> Vec<Entity> {
        let Some(repo) = Self::repo(entity) else {
            return Vec::new();
        };
        pool.iter()
            .filter(|candidate| match candidate {
                Entity::Project(project) => {
                    !repo.html_url.is_empty()
                        && project.repo_url.as_deref() == Some(repo.html_url.as_str())
                }
                _ => false,
            })
            .cloned()
            .collect()
    }

    fn external_links(&self, entity: &Entity) -> Vec<ExternalLink> {
        let Some(repo) = Self::repo(entity) else {
            return Vec::new();
        };
        let mut links = Vec::new();
        if !repo.html_url.is_empty() {
            links.push(ExternalLink::new(LinkType::Source, &repo.html_url, "Repository"));
        }
        if let Some(url) = non_empty(repo.homepage.as_ref()) {
            links.push(ExternalLink::new(LinkType::Live, url, "Homepage"));
        }
        links
    }

    fn live_url<'a>(&self, entity: &'a Entity) -> Option<&'a str> {
        Self::repo(entity).and_then(|repo| non_empty(repo.homepage.as_ref()))
    }

    fn has_custom_image(&self, _entity: &Entity) -> bool {
        false
    }
}

/// Lookup table from entity kind to adapter
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<EntityKind, Arc<dyn EntityAdapter>>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::empty()
            .with(ProjectAdapter)
            .with(CertificateAdapter::default())
            .with(RepoAdapter)
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.adapters.keys().collect();
        kinds.sort();
        f.debug_struct("AdapterRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

impl AdapterRegistry {
    /// Registry with no adapters
    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registers (or replaces) the adapter for its kind
    pub fn with(mut self, adapter: impl EntityAdapter + 'static) -> Self {
        self.register(Arc::new(adapter));
        self
    }

    pub fn register(&mut self, adapter: Arc<dyn EntityAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    pub fn get(&self, kind: EntityKind) -> Option<&Arc<dyn EntityAdapter>> {
        self.adapters.get(&kind)
    }

    pub fn for_entity(&self, entity: &Entity) -> Option<&Arc<dyn EntityAdapter>> {
        self.get(entity.kind())
    }
}
