//! # Cards, modals, and lists
//!
//! One rendering pipeline for every entity kind. Entity-specific data comes
//! from the [`EntityAdapter`](crate::adapter::EntityAdapter) chosen by the
//! registry; this module only decides what a mode shows.
//!
//! - [`Mode::Home`] drops records that resolve hidden, exposes external links
//!   and the live-site badge, and offers no actions.
//! - [`Mode::Admin`] keeps everything, marks hidden records, and offers
//!   edit, delete, toggle-visibility, and link actions.
//!
//! [`ListView::cards`] runs mode filter, then facet filter, then sort. A list has
//! at most one expanded item. Actions are handed to an [`ItemActions`]
//! implementation unchanged; nothing here mutates content.

use std::{cmp::Ordering, collections::BTreeSet, str::FromStr};

use serde::Serialize;
use tracing::debug;

use crate::{
    adapter::{AdapterRegistry, ExternalLink, PreviewContext, PreviewDescriptor, StatusBadge},
    model::{Entity, EntityKind},
    visibility::VisibilityResolver,
};

/// Public site or admin panel
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    #[default]
    Home,
    Admin,
}

/// Category filter. `all` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Facet {
    #[default]
    All,
    Category(String),
}

impl Facet {
    pub const ALL: &'static str = "all";

    /// Exact match on the category or any subcategory
    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            Facet::All => true,
            Facet::Category(name) => {
                entity.category() == Some(name.as_str())
                    || entity.subcategories().iter().any(|sub| sub == name)
            }
        }
    }
}

impl FromStr for Facet {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(if s.is_empty() || s.eq_ignore_ascii_case(Facet::ALL) {
            Facet::All
        } else {
            Facet::Category(s.to_string())
        })
    }
}

impl std::fmt::Display for Facet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Facet::All => f.write_str(Facet::ALL),
            Facet::Category(name) => f.write_str(name),
        }
    }
}

/// List ordering
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortKey {
    /// Explicit `order`, then title
    #[default]
    Order,
    /// Case-insensitive title
    Title,
    /// Most recent first; undated records last
    Newest,
}

impl SortKey {
    pub fn compare(self, a: &Entity, b: &Entity) -> Ordering {
        let by_title = || a.title().to_lowercase().cmp(&b.title().to_lowercase());
        match self {
            SortKey::Order => a.order().cmp(&b.order()).then_with(by_title),
            SortKey::Title => by_title(),
            SortKey::Newest => match (a.timestamp(), b.timestamp()) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
            .then_with(by_title),
        }
    }
}

/// Action offered on an admin card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CardAction {
    Edit,
    Delete,
    ToggleVisibility,
    Link,
}

impl CardAction {
    pub const ADMIN: [CardAction; 4] = [
        CardAction::Edit,
        CardAction::Delete,
        CardAction::ToggleVisibility,
        CardAction::Link,
    ];
}

/// Caller-supplied handlers for card actions
pub trait ItemActions {
    fn on_edit(&mut self, entity: &Entity);
    fn on_delete(&mut self, entity: &Entity);
    /// `visible` is the requested new visibility
    fn on_toggle_visibility(&mut self, entity: &Entity, visible: bool);
    fn on_link(&mut self, entity: &Entity);
}

/// Summary card for one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub kind: EntityKind,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub preview: PreviewDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<StatusBadge>,
    pub technologies: Vec<String>,
    /// External links (home mode)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<ExternalLink>,
    /// Live site badge (home mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_url: Option<String>,
    /// Mutation actions (admin mode)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<CardAction>,
    /// Effective visibility
    pub visible: bool,
    /// Admin annotation for records the public site would hide
    pub hidden: bool,
}

/// Linked item shown in a modal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedItem {
    pub id: String,
    pub kind: EntityKind,
    pub title: String,
}

/// Expanded detail view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Modal {
    pub card: Card,
    pub linked: Vec<LinkedItem>,
}

/// Shared inputs for rendering: visibility, the entity pool for links, and preview state
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    pub visibility: &'a VisibilityResolver,
    pub pool: &'a [Entity],
    pub previews: PreviewContext,
}

impl<'a> RenderContext<'a> {
    pub fn new(visibility: &'a VisibilityResolver, pool: &'a [Entity], previews: PreviewContext) -> Self {
        Self {
            visibility,
            pool,
            previews,
        }
    }
}

/// Distinct categories and subcategories across `entities`, sorted
pub fn facets(entities: &[Entity]) -> Vec<String> {
    entities
        .iter()
        .flat_map(|entity| {
            entity
                .category()
                .map(str::to_string)
                .into_iter()
                .chain(entity.subcategories().iter().cloned())
        })
        .filter(|name| !name.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// A filtered, sorted list of cards with one optional expanded item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListView {
    mode: Mode,
    facet: Facet,
    sort: SortKey,
    expanded: Option<String>,
}

impl ListView {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn facet(self, facet: Facet) -> Self {
        ListView { facet, ..self }
    }

    pub fn sort(self, sort: SortKey) -> Self {
        ListView { sort, ..self }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_facet(&mut self, facet: Facet) {
        self.facet = facet;
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.sort = sort;
    }

    /// Renders one card. Returns `None` if no adapter handles the entity.
    pub fn render(&self, entity: &Entity, registry: &AdapterRegistry, ctx: &RenderContext<'_>) -> Option<Card> {
        let Some(adapter) = registry.for_entity(entity) else {
            debug!(id = entity.id(), kind = %entity.kind(), "no adapter registered");
            return None;
        };
        let visible = ctx.visibility.entity_visible(entity);
        let home = self.mode == Mode::Home;
        Some(Card {
            id: entity.id().to_string(),
            kind: entity.kind(),
            title: entity.title().to_string(),
            description: entity.description().to_string(),
            category: entity.category().map(str::to_string),
            preview: adapter.preview_descriptor(entity, &ctx.previews),
            badge: adapter.status_badge(entity),
            technologies: adapter.technologies(entity),
            links: if home {
                adapter.external_links(entity)
            } else {
                Vec::new()
            },
            live_url: adapter
                .live_url(entity)
                .filter(|_| home)
                .map(str::to_string),
            actions: if home {
                Vec::new()
            } else {
                CardAction::ADMIN.to_vec()
            },
            visible,
            hidden: !home && !visible,
        })
    }

    fn passes(&self, entity: &Entity, ctx: &RenderContext<'_>) -> bool {
        (self.mode == Mode::Admin || ctx.visibility.entity_visible(entity)) && self.facet.matches(entity)
    }

    /// Entities that pass the mode and facet filters, sorted
    pub fn select<'e>(&self, entities: &'e [Entity], ctx: &RenderContext<'_>) -> Vec<&'e Entity> {
        let mut selected: Vec<&Entity> = entities
            .iter()
            .filter(|entity| self.passes(entity, ctx))
            .collect();
        selected.sort_by(|a, b| self.sort.compare(a, b));
        selected
    }

    /// Cards for `entities`: mode filter, facet filter, then sort
    pub fn cards(&self, entities: &[Entity], registry: &AdapterRegistry, ctx: &RenderContext<'_>) -> Vec<Card> {
        self.select(entities, ctx)
            .into_iter()
            .filter_map(|entity| self.render(entity, registry, ctx))
            .collect()
    }

    pub fn expanded(&self) -> Option<&str> {
        self.expanded.as_deref()
    }

    /// Expands `id`, collapsing any other item
    pub fn open(&mut self, id: impl Into<String>) {
        self.expanded = Some(id.into());
    }

    pub fn close(&mut self) {
        self.expanded = None;
    }

    /// Detail view for the expanded item, if it is still present and passes the filters
    pub fn modal(&self, entities: &[Entity], registry: &AdapterRegistry, ctx: &RenderContext<'_>) -> Option<Modal> {
        let id = self.expanded.as_deref()?;
        let entity = entities
            .iter()
            .find(|entity| entity.id() == id && self.passes(entity, ctx))?;
        let card = self.render(entity, registry, ctx)?;
        let linked = registry
            .for_entity(entity)
            .map(|adapter| adapter.linked_items(entity, ctx.pool))
            .unwrap_or_default()
            .into_iter()
            .filter(|item| self.mode == Mode::Admin || ctx.visibility.entity_visible(item))
            .map(|item| LinkedItem {
                id: item.id().to_string(),
                kind: item.kind(),
                title: item.title().to_string(),
            })
            .collect();
        Some(Modal { card, linked })
    }

    /// Forwards `action` on `entity` to `handler`.
    /// Returns false, without calling anything, in home mode.
    pub fn dispatch(
        &self,
        action: CardAction,
        entity: &Entity,
        ctx: &RenderContext<'_>,
        handler: &mut dyn ItemActions,
    ) -> bool {
        if self.mode != Mode::Admin {
            return false;
        }
        match action {
            CardAction::Edit => handler.on_edit(entity),
            CardAction::Delete => handler.on_delete(entity),
            CardAction::ToggleVisibility => {
                handler.on_toggle_visibility(entity, !ctx.visibility.entity_visible(entity))
            }
            CardAction::Link => handler.on_link(entity),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{api::CaptureEndpoint, model::Project, overrides::OverrideMaps};

    fn project(id: &str, title: &str, category: &str, order: i64, visible: bool) -> Entity {
        Project {
            id: id.into(),
            title: title.into(),
            category: category.into(),
            subcategories: vec!["web".into()],
            order,
            visible,
            live_url: Some(format!("https://{id}.test")),
            ..Default::default()
        }
        .into()
    }

    fn pool() -> Vec<Entity> {
        vec![
            project("p1", "Beta", "tools", 2, true),
            project("p2", "alpha", "apps", 1, false),
            project("p3", "Gamma", "apps", 1, true),
        ]
    }

    #[test]
    fn home_mode_drops_hidden_and_sorts() {
        let entities = pool();
        let resolver = VisibilityResolver::default();
        let ctx = RenderContext::new(&resolver, &entities, PreviewContext::empty(CaptureEndpoint::new("")));
        let cards = ListView::new(Mode::Home).cards(&entities, &AdapterRegistry::default(), &ctx);
        let ids: Vec<_> = cards.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["p3", "p1"]);
        assert!(cards.iter().all(|c| c.actions.is_empty() && c.live_url.is_some()));
    }

    #[test]
    fn admin_mode_keeps_and_annotates() {
        let entities = pool();
        let mut maps = OverrideMaps::default();
        maps.set_item("p1", false);
        let resolver = VisibilityResolver::new(Arc::new(maps));
        let ctx = RenderContext::new(&resolver, &entities, PreviewContext::empty(CaptureEndpoint::new("")));
        let list = ListView::new(Mode::Admin).sort(SortKey::Title);
        let cards = list.cards(&entities, &AdapterRegistry::default(), &ctx);
        let ids: Vec<_> = cards.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p1", "p3"]);
        assert!(cards[0].hidden && cards[1].hidden && !cards[2].hidden);
        assert!(cards.iter().all(|c| c.links.is_empty() && c.live_url.is_none()));
        assert_eq!(cards[0].actions, CardAction::ADMIN.to_vec());
    }

    #[test]
    fn facet_matches_category_or_subcategory() {
        let entities = pool();
        let resolver = VisibilityResolver::default();
        let ctx = RenderContext::new(&resolver, &entities, PreviewContext::empty(CaptureEndpoint::new("")));
        let registry = AdapterRegistry::default();
        let apps = ListView::new(Mode::Admin).facet("apps".parse().expect("facet"));
        assert_eq!(apps.cards(&entities, &registry, &ctx).len(), 2);
        let web = ListView::new(Mode::Admin).facet("web".parse().expect("facet"));
        assert_eq!(web.cards(&entities, &registry, &ctx).len(), 3);
        let none = ListView::new(Mode::Admin).facet("App".parse().expect("facet"));
        assert!(none.cards(&entities, &registry, &ctx).is_empty());
        assert_eq!("ALL".parse::<Facet>().expect("facet"), Facet::All);
        assert_eq!(facets(&entities), vec!["apps", "tools", "web"]);
    }

    #[test]
    fn opening_second_item_closes_first() {
        let mut list = ListView::new(Mode::Home);
        list.open("p1");
        list.open("p3");
        assert_eq!(list.expanded(), Some("p3"));
        list.close();
        assert_eq!(list.expanded(), None);
    }

    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl ItemActions for Recorder {
        fn on_edit(&mut self, entity: &Entity) {
            self.0.push(format!("edit {}", entity.id()));
        }
        fn on_delete(&mut self, entity: &Entity) {
            self.0.push(format!("delete {}", entity.id()));
        }
        fn on_toggle_visibility(&mut self, entity: &Entity, visible: bool) {
            self.0.push(format!("toggle {} {visible}", entity.id()));
        }
        fn on_link(&mut self, entity: &Entity) {
            self.0.push(format!("link {}", entity.id()));
        }
    }

    #[test]
    fn actions_forward_in_admin_only() {
        let entities = pool();
        let resolver = VisibilityResolver::default();
        let ctx = RenderContext::new(&resolver, &entities, PreviewContext::empty(CaptureEndpoint::new("")));
        let mut recorder = Recorder::default();
        assert!(!ListView::new(Mode::Home).dispatch(CardAction::Delete, &entities[0], &ctx, &mut recorder));
        let admin = ListView::new(Mode::Admin);
        assert!(admin.dispatch(CardAction::ToggleVisibility, &entities[1], &ctx, &mut recorder));
        assert!(admin.dispatch(CardAction::Edit, &entities[0], &ctx, &mut recorder));
        assert_eq!(recorder.0, vec!["toggle p2 true", "edit p1"]);
    }
}
