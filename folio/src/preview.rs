//! # Preview resolver
//!
//! Resolves a displayable screenshot url for entities that have a live site
//! and no custom image. Each entity id moves through
//!
//! ```text
//! absent -> loading -> resolved(url)
//!                   -> error (with a best-effort capture url)
//! ```
//!
//! A cached screenshot younger than the freshness window is reused. Otherwise a
//! capture url is built right away; the capture itself happens when the image
//! is first fetched, so it is never awaited here.
//!
//! Requests for an id that already has an entry (loading, resolved, failed, or
//! exhausted) are coalesced. A broken image may trigger one re-resolution from
//! the live url; a second failure leaves the entity on its fallback until
//! [`PreviewResolver::clear`].
//!
//! The preview map is transient and never persisted. Every change publishes a
//! new map; entries are replaced, never merged.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{
    adapter::AdapterRegistry,
    api::{CachedScreenshot, ScreenshotApi},
    model::Entity,
};

/// Preview state of one entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreviewEntry {
    pub url: Option<String>,
    pub loading: bool,
    pub error: bool,
}

impl PreviewEntry {
    pub fn loading() -> Self {
        Self {
            url: None,
            loading: true,
            error: false,
        }
    }

    pub fn resolved(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            loading: false,
            error: false,
        }
    }

    /// Failed entry, optionally carrying a best-effort url
    pub fn failed(url: Option<String>) -> Self {
        Self {
            url,
            loading: false,
            error: true,
        }
    }

    /// Entry that gave up: errored with nothing left to show
    pub fn is_exhausted(&self) -> bool {
        self.error && self.url.is_none() && !self.loading
    }
}

/// Entity id to preview state
pub type PreviewMap = HashMap<String, PreviewEntry>;

/// True if a capture taken at `captured_at` is still within `window` at `now`.
/// Timestamps in the future count as fresh.
pub fn is_fresh(captured_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    now.signed_duration_since(captured_at)
        .to_std()
        .map_or(true, |age| age < window)
}

/// Newest capture within the freshness window
pub fn freshest(
    shots: &[CachedScreenshot],
    now: DateTime<Utc>,
    window: Duration,
) -> Option<&CachedScreenshot> {
    shots
        .iter()
        .filter(|shot| !shot.url.is_empty() && is_fresh(shot.captured_at, now, window))
        .max_by_key(|shot| shot.captured_at)
}

/// Per-entity screenshot resolution
pub struct PreviewResolver {
    api: Arc<dyn ScreenshotApi>,
    freshness: Duration,
    tx: watch::Sender<Arc<PreviewMap>>,
    retried: Mutex<HashSet<String>>,
    closed: AtomicBool,
}

impl fmt::Debug for PreviewResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewResolver")
            .field("freshness", &self.freshness)
            .field("entries", &self.tx.borrow().len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl PreviewResolver {
    pub fn new(api: Arc<dyn ScreenshotApi>, freshness: Duration) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(PreviewMap::new()));
        Self {
            api,
            freshness,
            tx,
            retried: Mutex::new(HashSet::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Current preview map
    pub fn snapshot(&self) -> Arc<PreviewMap> {
        self.tx.borrow().clone()
    }

    pub fn entry(&self, entity_id: &str) -> Option<PreviewEntry> {
        self.tx.borrow().get(entity_id).cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<PreviewMap>> {
        self.tx.subscribe()
    }

    /// Stops publishing results. Requests still in flight complete silently.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Forgets all previews, so the next request for any id resolves again.
    pub fn clear(&self) {
        self.retried.lock().clear();
        self.tx.send_replace(Arc::new(PreviewMap::new()));
    }

    // copy-on-write update; `f` returns false to leave the published map alone
    fn publish(&self, f: impl FnOnce(&mut PreviewMap) -> bool) -> bool {
        self.tx.send_if_modified(|current| {
            let mut next = (**current).clone();
            if f(&mut next) {
                *current = Arc::new(next);
                true
            } else {
                false
            }
        })
    }

    fn set_entry(&self, entity_id: &str, entry: PreviewEntry) {
        if self.is_closed() {
            debug!(entity_id, "preview resolver closed, dropping result");
            return;
        }
        self.publish(|map| {
            map.insert(entity_id.to_string(), entry);
            true
        });
    }

    /// Requests a preview for `entity_id`, whose site is at `live_url`.
    ///
    /// Returns the resulting entry. If the id already has an entry, including an
    /// exhausted one, returns it without issuing another lookup.
    pub async fn request(&self, entity_id: &str, live_url: &str) -> PreviewEntry {
        let claimed = self.publish(|map| {
            if map.contains_key(entity_id) {
                return false;
            }
            map.insert(entity_id.to_string(), PreviewEntry::loading());
            true
        });
        if !claimed {
            debug!(entity_id, "preview request coalesced");
            return self.entry(entity_id).unwrap_or_default();
        }

        let entry = self.resolve(entity_id, live_url).await;
        self.set_entry(entity_id, entry.clone());
        entry
    }

    async fn resolve(&self, entity_id: &str, live_url: &str) -> PreviewEntry {
        let capture_url = self.api.capture().capture_url(live_url, entity_id);
        match self.api.lookup_screenshots(live_url).await {
            Ok(shots) => {
                if let Some(shot) = freshest(&shots, Utc::now(), self.freshness) {
                    debug!(entity_id, captured_at = %shot.captured_at, "reusing cached screenshot");
                    PreviewEntry::resolved(shot.url.clone())
                } else {
                    debug!(entity_id, "no fresh screenshot, requesting capture");
                    PreviewEntry::resolved(capture_url)
                }
            }
            Err(err) => {
                warn!(entity_id, error = %err, "screenshot lookup failed, using direct capture");
                PreviewEntry::failed(Some(capture_url))
            }
        }
    }

    /// Requests a preview for an entity if it needs one: it has a live url and no custom image.
    /// Returns `None` when no preview is needed or no adapter handles the entity.
    pub async fn request_for(
        &self,
        entity: &Entity,
        registry: &AdapterRegistry,
    ) -> Option<PreviewEntry> {
        let adapter = registry.for_entity(entity)?;
        if adapter.has_custom_image(entity) {
            return None;
        }
        let live_url = adapter.live_url(entity)?;
        Some(self.request(entity.id(), live_url).await)
    }

    /// Requests previews for many entities concurrently.
    pub async fn request_all(&self, entities: &[Entity], registry: &AdapterRegistry) {
        join_all(
            entities
                .iter()
                .map(|entity| self.request_for(entity, registry)),
        )
        .await;
    }

    /// Reports that the image for `entity_id` failed to load.
    ///
    /// The first report re-resolves once from `live_url`, skipping the screenshot
    /// cache. Later reports, or a first report with no live url, leave the entity
    /// exhausted (error, no url) so it renders its fallback.
    pub fn report_image_error(&self, entity_id: &str, live_url: Option<&str>) -> PreviewEntry {
        let first_failure = self.retried.lock().insert(entity_id.to_string());
        let entry = match live_url.filter(|_| first_failure) {
            Some(live_url) => {
                debug!(entity_id, "image failed, retrying from live url");
                PreviewEntry::resolved(self.api.capture().capture_url(live_url, entity_id))
            }
            None => {
                warn!(entity_id, "image failed, giving up");
                PreviewEntry::failed(None)
            }
        };
        self.set_entry(entity_id, entry.clone());
        entry
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn hours_minutes(h: i64, m: i64) -> TimeDelta {
        TimeDelta::hours(h) + TimeDelta::minutes(m)
    }

    #[test]
    fn freshness_window_edges() {
        let window = crate::DEFAULT_PREVIEW_FRESHNESS;
        let now = Utc::now();
        assert!(is_fresh(now - hours_minutes(11, 59), now, window));
        assert!(!is_fresh(now - hours_minutes(12, 1), now, window));
        assert!(is_fresh(now + TimeDelta::minutes(5), now, window));
    }

    #[test]
    fn freshest_picks_newest_fresh_capture() {
        let now = Utc::now();
        let shots = vec![
            CachedScreenshot {
                url: "old".into(),
                captured_at: now - TimeDelta::hours(20),
            },
            CachedScreenshot {
                url: "mid".into(),
                captured_at: now - TimeDelta::hours(3),
            },
            CachedScreenshot {
                url: "new".into(),
                captured_at: now - TimeDelta::hours(1),
            },
        ];
        let found = freshest(&shots, now, crate::DEFAULT_PREVIEW_FRESHNESS).expect("fresh shot");
        assert_eq!(found.url, "new");
        assert!(freshest(&shots[..1], now, crate::DEFAULT_PREVIEW_FRESHNESS).is_none());
    }

    #[test]
    fn entry_states() {
        assert!(!PreviewEntry::loading().is_exhausted());
        assert!(!PreviewEntry::resolved("u").is_exhausted());
        assert!(!PreviewEntry::failed(Some("u".into())).is_exhausted());
        assert!(PreviewEntry::failed(None).is_exhausted());
    }
}
