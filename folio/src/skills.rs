//! # Skills
//!
//! Manual skills are stored records. Derived skills are a read-time projection of
//! the `technologies` of projects and the `skills` of certificates; they have no
//! server-side record and are rebuilt whenever their origin collections change.
//!
//! A derived skill is identified by its [`SourceKey`] (name, source, source id),
//! never by a database key. Deleting one means editing the origin entity.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{Certificate, EntityKind, Project};

/// Category given to derived skills with no matching manual skill.
pub const DEFAULT_SKILL_CATEGORY: &str = "Other";

/// Where a skill came from
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
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
pub enum SkillSource {
    #[default]
    Manual,
    Project,
    Certificate,
}

impl SkillSource {
    pub fn is_derived(self) -> bool {
        !matches!(self, SkillSource::Manual)
    }

    /// Entity kind that owns skills from this source
    pub fn origin_kind(self) -> Option<EntityKind> {
        match self {
            SkillSource::Manual => None,
            SkillSource::Project => Some(EntityKind::Project),
            SkillSource::Certificate => Some(EntityKind::Certificate),
        }
    }
}

/// Identity of a derived skill: the mention `name` inside entity `source_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceKey {
    #[serde(rename = "skillName")]
    pub name: String,
    pub source: SkillSource,
    pub source_id: String,
}

impl SourceKey {
    pub fn new(name: impl Into<String>, source: SkillSource, source_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source,
            source_id: source_id.into(),
        }
    }

    /// Stable string form, used as the id of the derived skill.
    pub fn derived_id(&self) -> String {
        format!("{}:{}:{}", self.source, self.source_id, self.name)
    }
}

/// A skill, either manual or derived
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub category: String,
    /// Stored baseline visibility
    pub visible: bool,
    pub source: SkillSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
}

impl Skill {
    pub fn is_derived(&self) -> bool {
        self.source.is_derived()
    }

    /// Provenance key, for derived skills only.
    pub fn source_key(&self) -> Option<SourceKey> {
        if !self.is_derived() {
            return None;
        }
        self.source_id
            .as_ref()
            .map(|source_id| SourceKey::new(&self.name, self.source, source_id))
    }
}

/// Projects technology and skill mentions into derived skill records.
///
/// Mentions are trimmed; empty mentions and repeats within the same entity are skipped.
/// Each derived skill takes the category of the manual skill with the same
/// case-insensitive name, or [`DEFAULT_SKILL_CATEGORY`].
pub fn derive_skills(manual: &[Skill], projects: &[Project], certificates: &[Certificate]) -> Vec<Skill> {
    let categories: HashMap<String, &str> = manual
        .iter()
        .map(|skill| (skill.name.trim().to_lowercase(), skill.category.as_str()))
        .collect();

    let mut derived = Vec::new();
    let mut push_all = |source: SkillSource, id: &str, title: &str, mentions: &[String]| {
        let mut seen = Vec::<String>::new();
        for mention in mentions {
            let name = mention.trim();
            let folded = name.to_lowercase();
            if name.is_empty() || seen.contains(&folded) {
                continue;
            }
            let category = categories
                .get(&folded)
                .copied()
                .filter(|category| !category.is_empty())
                .unwrap_or(DEFAULT_SKILL_CATEGORY);
            let key = SourceKey::new(name, source, id);
            derived.push(Skill {
                id: key.derived_id(),
                name: name.to_string(),
                category: category.to_string(),
                visible: true,
                source,
                source_id: Some(id.to_string()),
                source_name: Some(title.to_string()),
            });
            seen.push(folded);
        }
    };

    for project in projects {
        push_all(
            SkillSource::Project,
            &project.id,
            &project.title,
            &project.technologies,
        );
    }
    for certificate in certificates {
        push_all(
            SkillSource::Certificate,
            &certificate.id,
            &certificate.title,
            &certificate.skills,
        );
    }
    derived
}

/// Returns all skills: manual records followed by the derived projection.
pub fn all_skills(manual: &[Skill], projects: &[Project], certificates: &[Certificate]) -> Vec<Skill> {
    let mut skills = manual.to_vec();
    skills.extend(derive_skills(manual, projects, certificates));
    skills
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(id: &str, techs: &[&str]) -> Project {
        Project {
            id: id.to_string(),
            title: format!("project {id}"),
            technologies: techs.iter().map(ToString::to_string).collect(),
            visible: true,
            ..Default::default()
        }
    }

    fn manual(name: &str, category: &str) -> Skill {
        Skill {
            id: format!("s-{name}"),
            name: name.to_string(),
            category: category.to_string(),
            visible: true,
            ..Default::default()
        }
    }

    #[test]
    fn derived_skills_borrow_manual_category() {
        let skills = derive_skills(
            &[manual("Rust", "languages")],
            &[project("p1", &["rust", "Docker"])],
            &[],
        );
        assert_eq!(skills.len(), 2);
        assert_eq!(skills[0].name, "rust");
        assert_eq!(skills[0].category, "languages");
        assert_eq!(skills[1].category, DEFAULT_SKILL_CATEGORY);
        assert_eq!(skills[0].source, SkillSource::Project);
        assert_eq!(skills[0].source_id.as_deref(), Some("p1"));
        assert_eq!(skills[0].source_name.as_deref(), Some("project p1"));
    }

    #[test]
    fn derived_skill_identity_is_source_key() {
        let skills = derive_skills(&[], &[project("p1", &["Rust"]), project("p2", &["Rust"])], &[]);
        assert_eq!(skills.len(), 2);
        assert_ne!(skills[0].id, skills[1].id);
        assert_eq!(
            skills[0].source_key(),
            Some(SourceKey::new("Rust", SkillSource::Project, "p1"))
        );
    }

    #[test]
    fn skips_blank_and_repeated_mentions() {
        let skills = derive_skills(&[], &[project("p1", &["Rust", " ", "rust ", "Go"])], &[]);
        let names: Vec<_> = skills.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Rust", "Go"]);
    }

    #[test]
    fn certificates_project_their_skills() {
        let cert = Certificate {
            id: "c1".into(),
            title: "Cloud".into(),
            skills: vec!["AWS".into()],
            ..Default::default()
        };
        let skills = all_skills(&[manual("AWS", "cloud")], &[], &[cert]);
        assert_eq!(skills.len(), 2);
        assert_eq!(skills[1].source, SkillSource::Certificate);
        assert_eq!(skills[1].category, "cloud");
        assert!(skills[0].source_key().is_none());
    }
}
