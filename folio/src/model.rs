//! # Content model
//!
//! Records served by the content api. Projects, certificates, and repository
//! summaries are the displayable entities; [`Entity`] wraps them so the
//! adapter and render layers can treat them uniformly.
//!
//! `About` and `SiteConfig` are single documents.
//!
//! All records serialize with camelCase field names.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Kind of displayable entity
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Project,
    Certificate,
    Repository,
}

/// Project lifecycle status
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ProjectStatus {
    #[default]
    Completed,
    InProgress,
    Planned,
    Archived,
}

/// A portfolio project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub subcategories: Vec<String>,
    pub status: ProjectStatus,
    /// Technology mentions. Each one is projected as a derived skill.
    pub technologies: Vec<String>,
    /// Ids of related certificates
    pub linked_certificates: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    /// Uploaded images. When present, these take precedence over screenshots.
    pub images: Vec<String>,
    pub featured: bool,
    pub order: i64,
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Reference to an uploaded file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileRef {
    pub url: String,
    pub mimetype: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl FileRef {
    pub fn is_image(&self) -> bool {
        self.mimetype.to_ascii_lowercase().starts_with("image/")
    }

    pub fn is_pdf(&self) -> bool {
        self.mimetype.eq_ignore_ascii_case("application/pdf")
    }
}

/// A certificate or credential
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Certificate {
    pub id: String,
    pub title: String,
    pub issuer: String,
    pub category: String,
    pub subcategories: Vec<String>,
    /// Skill mentions. Each one is projected as a derived skill.
    pub skills: Vec<String>,
    /// Ids of related projects
    pub linked_projects: Vec<String>,
    /// Preview image extracted from the uploaded file (first page of a pdf, for example)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_image: Option<String>,
    /// Primary uploaded file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileRef>,
    /// Generic image url
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
    pub visible: bool,
}

/// Summary of a source repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepoSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub topics: Vec<String>,
    pub html_url: String,
    /// Deployed site, if any. Used as the live url for screenshots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    pub stars: u32,
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Any displayable content record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Project(Project),
    Certificate(Certificate),
    Repository(RepoSummary),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Project(_) => EntityKind::Project,
            Entity::Certificate(_) => EntityKind::Certificate,
            Entity::Repository(_) => EntityKind::Repository,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::Project(p) => &p.id,
            Entity::Certificate(c) => &c.id,
            Entity::Repository(r) => &r.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Entity::Project(p) => &p.title,
            Entity::Certificate(c) => &c.title,
            Entity::Repository(r) => &r.name,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Entity::Project(p) => &p.description,
            Entity::Certificate(c) => &c.issuer,
            Entity::Repository(r) => &r.description,
        }
    }

    /// Category used for facet filtering and category overrides.
    /// Repositories are categorized by primary language.
    pub fn category(&self) -> Option<&str> {
        let category = match self {
            Entity::Project(p) => p.category.as_str(),
            Entity::Certificate(c) => c.category.as_str(),
            Entity::Repository(r) => r.language.as_deref().unwrap_or_default(),
        };
        (!category.is_empty()).then_some(category)
    }

    pub fn subcategories(&self) -> &[String] {
        match self {
            Entity::Project(p) => &p.subcategories,
            Entity::Certificate(c) => &c.subcategories,
            Entity::Repository(r) => &r.topics,
        }
    }

    /// Stored baseline visibility
    pub fn visible(&self) -> bool {
        match self {
            Entity::Project(p) => p.visible,
            Entity::Certificate(c) => c.visible,
            Entity::Repository(r) => r.visible,
        }
    }

    /// Sort key for "newest first"
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Entity::Project(p) => p.updated_at,
            Entity::Certificate(c) => c
                .issue_date
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc()),
            Entity::Repository(r) => r.updated_at,
        }
    }

    /// Explicit display order. Lower values sort first.
    pub fn order(&self) -> i64 {
        match self {
            Entity::Project(p) => p.order,
            Entity::Certificate(_) | Entity::Repository(_) => 0,
        }
    }
}

impl From<Project> for Entity {
    fn from(value: Project) -> Self {
        Entity::Project(value)
    }
}

impl From<Certificate> for Entity {
    fn from(value: Certificate) -> Self {
        Entity::Certificate(value)
    }
}

impl From<RepoSummary> for Entity {
    fn from(value: RepoSummary) -> Self {
        Entity::Repository(value)
    }
}

/// Link to a social profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SocialLink {
    pub platform: String,
    pub url: String,
}

/// The "About" section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct About {
    pub name: String,
    pub headline: String,
    pub bio: String,
    pub location: String,
    pub email: String,
    pub socials: Vec<SocialLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Site-wide configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteConfig {
    pub site_title: String,
    /// Section name (about, projects, skills, certificates, contact) to enabled flag
    pub sections_enabled: BTreeMap<String, bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    /// Unrecognized settings are kept so they round-trip through updates.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SiteConfig {
    /// Returns whether a section is enabled. Sections not listed are enabled.
    pub fn section_enabled(&self, section: &str) -> bool {
        self.sections_enabled.get(section).copied().unwrap_or(true)
    }
}

/// Everything returned by the content fetch endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentBundle {
    pub about: About,
    pub projects: Vec<Project>,
    pub certificates: Vec<Certificate>,
    /// Manually managed skills. Derived skills are not stored server-side.
    pub skills: Vec<crate::skills::Skill>,
    pub configuration: SiteConfig,
    /// Source-provenance overrides for derived skills
    pub skill_overrides: Vec<crate::overrides::SkillOverride>,
    pub repositories: Vec<RepoSummary>,
}
