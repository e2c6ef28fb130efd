//! # Visibility overrides
//!
//! Three independent override channels are layered on top of the stored
//! `visible` flag of skills and content items:
//!
//! - category overrides: category name to bool, affects every record in the category
//! - item overrides: record id to bool
//! - source overrides: [`SourceKey`] to hide/show/delete, for derived skills only
//!
//! The maps live behind the [`VisibilityOverrideStore`] trait so resolvers never
//! depend on a global. [`InMemoryOverrideStore`] is used by tests and transient
//! sessions, [`FileOverrideStore`] persists to a json file.
//!
//! Writers always publish a complete replacement [`OverrideMaps`]; readers hold
//! an `Arc` snapshot and never observe a partially updated map.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use tokio::sync::watch;
use tracing::debug;

use crate::{
    Result,
    error::{OverrideFileSnafu, OverrideFormatSnafu},
    skills::SourceKey,
};

/// Directive attached to a derived skill at its origin
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SourceAction {
    Hide,
    Show,
    /// Hidden, and eligible for removal from the origin entity
    Delete,
}

impl SourceAction {
    /// Hide and Delete both remove the skill from the visible set
    pub fn hides(self) -> bool {
        matches!(self, SourceAction::Hide | SourceAction::Delete)
    }
}

/// One source override, as exchanged with the skill override endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillOverride {
    #[serde(flatten)]
    pub key: SourceKey,
    pub action: SourceAction,
}

/// Complete set of override maps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverrideMaps {
    pub categories: BTreeMap<String, bool>,
    pub items: BTreeMap<String, bool>,
    #[serde(with = "source_list")]
    pub sources: BTreeMap<SourceKey, SourceAction>,
}

impl OverrideMaps {
    pub fn category(&self, category: &str) -> Option<bool> {
        self.categories.get(category).copied()
    }

    pub fn item(&self, id: &str) -> Option<bool> {
        self.items.get(id).copied()
    }

    pub fn source(&self, key: &SourceKey) -> Option<SourceAction> {
        self.sources.get(key).copied()
    }

    pub fn set_category(&mut self, category: impl Into<String>, visible: bool) {
        self.categories.insert(category.into(), visible);
    }

    pub fn clear_category(&mut self, category: &str) {
        self.categories.remove(category);
    }

    pub fn set_item(&mut self, id: impl Into<String>, visible: bool) {
        self.items.insert(id.into(), visible);
    }

    pub fn clear_item(&mut self, id: &str) {
        self.items.remove(id);
    }

    pub fn set_source(&mut self, key: SourceKey, action: SourceAction) {
        self.sources.insert(key, action);
    }

    pub fn clear_source(&mut self, key: &SourceKey) {
        self.sources.remove(key);
    }

    /// Replaces the source channel, leaving category and item overrides alone.
    pub fn replace_sources(&mut self, overrides: impl IntoIterator<Item = SkillOverride>) {
        self.sources = overrides
            .into_iter()
            .map(|entry| (entry.key, entry.action))
            .collect();
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.items.is_empty() && self.sources.is_empty()
    }
}

// json object keys must be strings, so the source channel is stored as a list
mod source_list {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{SkillOverride, SourceAction};
    use crate::skills::SourceKey;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<SourceKey, SourceAction>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let list: Vec<SkillOverride> = map
            .iter()
            .map(|(key, action)| SkillOverride {
                key: key.clone(),
                action: *action,
            })
            .collect();
        list.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<SourceKey, SourceAction>, D::Error> {
        let list = Vec::<SkillOverride>::deserialize(deserializer)?;
        Ok(list
            .into_iter()
            .map(|entry| (entry.key, entry.action))
            .collect())
    }
}

/// Injectable storage for override maps.
pub trait VisibilityOverrideStore: Send + Sync + fmt::Debug {
    /// Returns the current snapshot
    fn get(&self) -> Arc<OverrideMaps>;

    /// Replaces all maps and notifies subscribers
    fn set(&self, maps: OverrideMaps) -> Result<()>;

    /// Receiver that observes every published snapshot
    fn subscribe(&self) -> watch::Receiver<Arc<OverrideMaps>>;

    /// Copies the current snapshot, applies `f`, and publishes the result.
    /// Concurrent calls are serialized, so no change is lost.
    fn modify(&self, f: &mut dyn FnMut(&mut OverrideMaps)) -> Result<Arc<OverrideMaps>>;
}

/// Override store held in memory only
pub struct InMemoryOverrideStore {
    tx: watch::Sender<Arc<OverrideMaps>>,
    // held across read, change, commit, and publish
    write: Mutex<()>,
}

impl Default for InMemoryOverrideStore {
    fn default() -> Self {
        Self::new(OverrideMaps::default())
    }
}

impl InMemoryOverrideStore {
    pub fn new(maps: OverrideMaps) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(maps));
        Self {
            tx,
            write: Mutex::new(()),
        }
    }

    // One writer at a time. `commit` sees the new maps before they are published;
    // if it fails, nothing is published.
    fn update(
        &self,
        f: &mut dyn FnMut(&mut OverrideMaps),
        commit: &dyn Fn(&OverrideMaps) -> Result<()>,
    ) -> Result<Arc<OverrideMaps>> {
        let _guard = self.write.lock();
        let mut maps = (*self.get()).clone();
        f(&mut maps);
        commit(&maps)?;
        let maps = Arc::new(maps);
        self.tx.send_replace(maps.clone());
        Ok(maps)
    }
}

fn replace_with(maps: OverrideMaps) -> impl FnMut(&mut OverrideMaps) {
    let mut next = Some(maps);
    move |current| {
        if let Some(next) = next.take() {
            *current = next;
        }
    }
}

impl fmt::Debug for InMemoryOverrideStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let maps = self.get();
        f.debug_struct("InMemoryOverrideStore")
            .field("categories", &maps.categories.len())
            .field("items", &maps.items.len())
            .field("sources", &maps.sources.len())
            .finish()
    }
}

impl VisibilityOverrideStore for InMemoryOverrideStore {
    fn get(&self) -> Arc<OverrideMaps> {
        self.tx.borrow().clone()
    }

    fn set(&self, maps: OverrideMaps) -> Result<()> {
        self.update(&mut replace_with(maps), &|_| Ok(()))?;
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Arc<OverrideMaps>> {
        self.tx.subscribe()
    }

    fn modify(&self, f: &mut dyn FnMut(&mut OverrideMaps)) -> Result<Arc<OverrideMaps>> {
        self.update(f, &|_| Ok(()))
    }
}

/// Override store persisted as a json file.
///
/// The file is rewritten on every change (write to a sibling temp file, then rename),
/// so a crash leaves either the old or the new contents. The file is written
/// before the new maps are published; a failed write publishes nothing.
#[derive(Debug)]
pub struct FileOverrideStore {
    path: PathBuf,
    inner: InMemoryOverrideStore,
}

impl FileOverrideStore {
    /// Opens the store, loading existing overrides. A missing file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let maps = match std::fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data).context(OverrideFormatSnafu { path: &path })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => OverrideMaps::default(),
            Err(source) => return Err(source).context(OverrideFileSnafu { path: &path }),
        };
        debug!(path=?path, "loaded visibility overrides");
        Ok(Self {
            path,
            inner: InMemoryOverrideStore::new(maps),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, maps: &OverrideMaps) -> Result<()> {
        let data = serde_json::to_vec_pretty(maps).context(OverrideFormatSnafu { path: &self.path })?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, data).context(OverrideFileSnafu { path: &tmp })?;
        std::fs::rename(&tmp, &self.path).context(OverrideFileSnafu { path: &self.path })?;
        Ok(())
    }
}

impl VisibilityOverrideStore for FileOverrideStore {
    fn get(&self) -> Arc<OverrideMaps> {
        self.inner.get()
    }

    fn set(&self, maps: OverrideMaps) -> Result<()> {
        self.inner
            .update(&mut replace_with(maps), &|maps| self.persist(maps))?;
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Arc<OverrideMaps>> {
        self.inner.subscribe()
    }

    fn modify(&self, f: &mut dyn FnMut(&mut OverrideMaps)) -> Result<Arc<OverrideMaps>> {
        self.inner.update(f, &|maps| self.persist(maps))
    }
}
