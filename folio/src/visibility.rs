//! # Effective visibility
//!
//! [`VisibilityResolver`] composes the override channels of an
//! [`OverrideMaps`] snapshot with the stored `visible` flag. Evaluation stops at
//! the first rule that applies:
//!
//! 1. derived skill whose origin entity is gone: hidden
//! 2. derived skill with a `hide` or `delete` source override: hidden
//! 3. category override for the record's category
//! 4. item override for the record's id
//! 5. stored baseline
//!
//! Bulk category operations write item overrides for each matching record and
//! never touch the category channel; the two channels stay independent.

use std::{collections::HashSet, sync::Arc};

use tracing::debug;

use crate::{
    Result,
    model::{Entity, EntityKind},
    overrides::{OverrideMaps, VisibilityOverrideStore},
    skills::{Skill, SourceKey},
};

/// Fields of a skill or entity that visibility depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilitySubject<'a> {
    pub id: &'a str,
    pub category: Option<&'a str>,
    pub visible: bool,
    /// Provenance, for derived skills only
    pub source_key: Option<SourceKey>,
}

impl<'a> From<&'a Skill> for VisibilitySubject<'a> {
    fn from(skill: &'a Skill) -> Self {
        Self {
            id: &skill.id,
            category: Some(skill.category.as_str()).filter(|c| !c.is_empty()),
            visible: skill.visible,
            source_key: skill.source_key(),
        }
    }
}

impl<'a> From<&'a Entity> for VisibilitySubject<'a> {
    fn from(entity: &'a Entity) -> Self {
        Self {
            id: entity.id(),
            category: entity.category(),
            visible: entity.visible(),
            source_key: None,
        }
    }
}

/// Resolves effective visibility against one override snapshot.
#[derive(Debug, Clone, Default)]
pub struct VisibilityResolver {
    maps: Arc<OverrideMaps>,
    // (kind, id) of entities that derived skills may point at; None skips the orphan check
    origins: Option<HashSet<(EntityKind, String)>>,
}

impl VisibilityResolver {
    pub fn new(maps: Arc<OverrideMaps>) -> Self {
        Self {
            maps,
            origins: None,
        }
    }

    /// Enables the orphan check: derived skills whose origin is not in `pool` resolve hidden.
    pub fn with_origins<'a>(mut self, pool: impl IntoIterator<Item = &'a Entity>) -> Self {
        self.origins = Some(
            pool.into_iter()
                .map(|entity| (entity.kind(), entity.id().to_string()))
                .collect(),
        );
        self
    }

    pub fn maps(&self) -> &OverrideMaps {
        &self.maps
    }

    /// True if `key` points at an entity missing from the origin pool
    pub fn is_orphaned(&self, key: &SourceKey) -> bool {
        let Some(origins) = &self.origins else {
            return false;
        };
        let Some(kind) = key.source.origin_kind() else {
            return false;
        };
        !origins.contains(&(kind, key.source_id.clone()))
    }

    pub fn effective_visible<'a>(&self, subject: impl Into<VisibilitySubject<'a>>) -> bool {
        let subject = subject.into();
        if let Some(key) = &subject.source_key {
            if self.is_orphaned(key) {
                debug!(skill = %key.name, source_id = %key.source_id, "dropping orphaned derived skill");
                return false;
            }
            if self.maps.source(key).is_some_and(|action| action.hides()) {
                return false;
            }
        }
        if let Some(visible) = subject.category.and_then(|c| self.maps.category(c)) {
            return visible;
        }
        if let Some(visible) = self.maps.item(subject.id) {
            return visible;
        }
        subject.visible
    }

    pub fn skill_visible(&self, skill: &Skill) -> bool {
        self.effective_visible(skill)
    }

    pub fn entity_visible(&self, entity: &Entity) -> bool {
        self.effective_visible(entity)
    }

    /// Skills that resolve visible, in their original order
    pub fn visible_skills<'s>(&self, skills: &'s [Skill]) -> Vec<&'s Skill> {
        skills
            .iter()
            .filter(|skill| self.skill_visible(skill))
            .collect()
    }
}

fn set_items_in_category<'a>(
    store: &dyn VisibilityOverrideStore,
    category: &str,
    subjects: impl IntoIterator<Item = VisibilitySubject<'a>>,
    visible: bool,
) -> Result<usize> {
    let ids: Vec<String> = subjects
        .into_iter()
        .filter(|subject| subject.category == Some(category))
        .map(|subject| subject.id.to_string())
        .collect();
    store.modify(&mut |maps| {
        for id in &ids {
            maps.set_item(id.clone(), visible);
        }
    })?;
    debug!(category, visible, count = ids.len(), "set item overrides for category");
    Ok(ids.len())
}

/// Hides every record currently in `category` with item overrides.
/// Returns the number of records changed.
pub fn hide_all_in_category<'a>(
    store: &dyn VisibilityOverrideStore,
    category: &str,
    subjects: impl IntoIterator<Item = VisibilitySubject<'a>>,
) -> Result<usize> {
    set_items_in_category(store, category, subjects, false)
}

/// Shows every record currently in `category` with item overrides.
/// Returns the number of records changed.
pub fn show_all_in_category<'a>(
    store: &dyn VisibilityOverrideStore,
    category: &str,
    subjects: impl IntoIterator<Item = VisibilitySubject<'a>>,
) -> Result<usize> {
    set_items_in_category(store, category, subjects, true)
}

pub fn set_category_override(
    store: &dyn VisibilityOverrideStore,
    category: &str,
    visible: bool,
) -> Result<()> {
    store.modify(&mut |maps| maps.set_category(category, visible))?;
    Ok(())
}

pub fn clear_category_override(store: &dyn VisibilityOverrideStore, category: &str) -> Result<()> {
    store.modify(&mut |maps| maps.clear_category(category))?;
    Ok(())
}

pub fn set_item_override(store: &dyn VisibilityOverrideStore, id: &str, visible: bool) -> Result<()> {
    store.modify(&mut |maps| maps.set_item(id, visible))?;
    Ok(())
}

pub fn clear_item_override(store: &dyn VisibilityOverrideStore, id: &str) -> Result<()> {
    store.modify(&mut |maps| maps.clear_item(id))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::Project,
        overrides::{InMemoryOverrideStore, SourceAction},
        skills::SkillSource,
    };

    fn rust(source: SkillSource) -> Skill {
        Skill {
            id: "s-rust".into(),
            name: "Rust".into(),
            category: "languages".into(),
            visible: true,
            source,
            source_id: source.is_derived().then(|| "p1".to_string()),
            source_name: None,
        }
    }

    #[test]
    fn baseline_without_overrides() {
        let resolver = VisibilityResolver::default();
        let mut skill = rust(SkillSource::Manual);
        assert!(resolver.skill_visible(&skill));
        skill.visible = false;
        skill.category.clear();
        assert!(!resolver.skill_visible(&skill));
    }

    #[test]
    fn item_override_beats_baseline() {
        let mut maps = OverrideMaps::default();
        maps.set_item("s-rust", false);
        let resolver = VisibilityResolver::new(Arc::new(maps));
        assert!(!resolver.skill_visible(&rust(SkillSource::Manual)));
    }

    #[test]
    fn source_delete_hides_even_when_shown_elsewhere() {
        let skill = rust(SkillSource::Project);
        let mut maps = OverrideMaps::default();
        maps.set_category("languages", true);
        maps.set_item("s-rust", true);
        maps.set_source(skill.source_key().expect("derived"), SourceAction::Delete);
        let resolver = VisibilityResolver::new(Arc::new(maps));
        assert!(!resolver.skill_visible(&skill));
    }

    #[test]
    fn source_show_falls_through() {
        let skill = rust(SkillSource::Project);
        let mut maps = OverrideMaps::default();
        maps.set_source(skill.source_key().expect("derived"), SourceAction::Show);
        maps.set_item("s-rust", false);
        let resolver = VisibilityResolver::new(Arc::new(maps));
        assert!(!resolver.skill_visible(&skill));
    }

    #[test]
    fn orphaned_derived_skill_is_hidden() {
        let skill = rust(SkillSource::Project);
        let pool = vec![Entity::from(Project {
            id: "p2".into(),
            ..Default::default()
        })];
        let resolver = VisibilityResolver::default().with_origins(&pool);
        assert!(resolver.is_orphaned(&skill.source_key().expect("derived")));
        assert!(!resolver.skill_visible(&skill));
        // manual skills have no origin
        assert!(resolver.skill_visible(&rust(SkillSource::Manual)));
    }

    #[test]
    fn bulk_hide_only_touches_matching_items() {
        let store = InMemoryOverrideStore::default();
        let skills = vec![
            rust(SkillSource::Manual),
            Skill {
                id: "s-docker".into(),
                name: "Docker".into(),
                category: "tools".into(),
                visible: true,
                ..Default::default()
            },
        ];
        let count =
            hide_all_in_category(&store, "languages", skills.iter().map(VisibilitySubject::from))
                .expect("bulk hide");
        assert_eq!(count, 1);
        let maps = store.get();
        assert_eq!(maps.item("s-rust"), Some(false));
        assert_eq!(maps.item("s-docker"), None);
        assert_eq!(maps.category("languages"), None);

        show_all_in_category(&store, "languages", skills.iter().map(VisibilitySubject::from))
            .expect("bulk show");
        assert_eq!(store.get().item("s-rust"), Some(true));
    }
}
