//! # Optimistic content store
//!
//! [`ContentStore`] owns the about, projects, certificates, skills, and
//! configuration content, and is the only component that calls the
//! [`ContentApi`]. Every mutation follows the same three phases:
//!
//! 1. apply the change locally and publish the new snapshot. This step is
//!    synchronous and completes before the first `.await`.
//! 2. send the request.
//! 3. on success, replace the local copy with the server's record (swapping a
//!    temporary id for the real one after a create). On failure, put back the
//!    record exactly as it was before the mutation and return a failed
//!    [`MutationResult`].
//!
//! Local validation failures return a failed result before phase 1.
//!
//! Overlapping mutations of the same record are not queued. Each reconciles
//! on its own and the last one to finish wins.
//!
//! ## Locking
//!
//! The current snapshot lives in a `parking_lot::Mutex<Arc<ContentSnapshot>>`.
//! Each change clones the snapshot, edits the clone, and swaps it in while the
//! lock is held, so readers holding an older `Arc` never see a partial update.
//! The lock is never held across an `.await`.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use parking_lot::Mutex;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use snafu::prelude::*;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{
    Result,
    api::{ContentApi, ResourceKind},
    config::TEMP_ID_PREFIX,
    error::{
        DeserializationSnafu, MutationResult, NotFoundSnafu, OtherSnafu, SerializationSnafu,
        ValidationSnafu,
    },
    model::{About, Certificate, ContentBundle, Entity, Project, RepoSummary, SiteConfig},
    overrides::{SkillOverride, SourceAction, VisibilityOverrideStore},
    skills::{self, Skill, SkillSource, SourceKey},
    validation::ValidationLimits,
    visibility::VisibilityResolver,
};

/// Partial update: a json object whose fields replace the record's fields
pub type Patch = serde_json::Map<String, Value>;

/// True for ids assigned locally to records the server has not confirmed yet
pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

/// Immutable view of all content
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSnapshot {
    pub about: About,
    pub projects: Vec<Project>,
    pub certificates: Vec<Certificate>,
    /// Manual skills only. See [`ContentSnapshot::all_skills`].
    pub skills: Vec<Skill>,
    pub configuration: SiteConfig,
    pub repositories: Vec<RepoSummary>,
}

impl From<ContentBundle> for ContentSnapshot {
    fn from(bundle: ContentBundle) -> Self {
        Self {
            about: bundle.about,
            projects: bundle.projects,
            certificates: bundle.certificates,
            skills: bundle.skills,
            configuration: bundle.configuration,
            repositories: bundle.repositories,
        }
    }
}

impl ContentSnapshot {
    /// Projects, certificates, and repositories, in that order
    pub fn entities(&self) -> Vec<Entity> {
        self.projects
            .iter()
            .cloned()
            .map(Entity::from)
            .chain(self.certificates.iter().cloned().map(Entity::from))
            .chain(self.repositories.iter().cloned().map(Entity::from))
            .collect()
    }

    pub fn project_entities(&self) -> Vec<Entity> {
        self.projects.iter().cloned().map(Entity::from).collect()
    }

    pub fn certificate_entities(&self) -> Vec<Entity> {
        self.certificates.iter().cloned().map(Entity::from).collect()
    }

    pub fn repository_entities(&self) -> Vec<Entity> {
        self.repositories.iter().cloned().map(Entity::from).collect()
    }

    /// Skills projected from project technologies and certificate skills
    pub fn derived_skills(&self) -> Vec<Skill> {
        skills::derive_skills(&self.skills, &self.projects, &self.certificates)
    }

    /// Manual skills followed by derived skills
    pub fn all_skills(&self) -> Vec<Skill> {
        skills::all_skills(&self.skills, &self.projects, &self.certificates)
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn certificate(&self, id: &str) -> Option<&Certificate> {
        self.certificates.iter().find(|c| c.id == id)
    }

    pub fn skill(&self, id: &str) -> Option<&Skill> {
        self.skills.iter().find(|s| s.id == id)
    }
}

/// A record in one of the mutable collections
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: ResourceKind;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// Checks field contents
    fn validate(&self, limits: &ValidationLimits) -> Result<()>;

    /// Checks a change from `before` to `after`
    fn validate_edit(_before: &Self, _after: &Self, _limits: &ValidationLimits) -> Result<()> {
        Ok(())
    }

    fn records(snapshot: &ContentSnapshot) -> &Vec<Self>;

    fn records_mut(snapshot: &mut ContentSnapshot) -> &mut Vec<Self>;
}

impl Record for Project {
    const KIND: ResourceKind = ResourceKind::Projects;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self, limits: &ValidationLimits) -> Result<()> {
        limits.validate_title(&self.title, "project title")?;
        limits.validate_text(&self.description, "project description")?;
        limits.validate_list(&self.technologies, "project technologies")?;
        limits.validate_list(&self.linked_certificates, "linked certificates")?;
        limits.validate_list(&self.subcategories, "project subcategories")?;
        limits.validate_list(&self.images, "project images")
    }

    fn validate_edit(before: &Self, after: &Self, limits: &ValidationLimits) -> Result<()> {
        limits.validate_required_list(&before.technologies, &after.technologies, "project technologies")
    }

    fn records(snapshot: &ContentSnapshot) -> &Vec<Self> {
        &snapshot.projects
    }

    fn records_mut(snapshot: &mut ContentSnapshot) -> &mut Vec<Self> {
        &mut snapshot.projects
    }
}

impl Record for Certificate {
    const KIND: ResourceKind = ResourceKind::Certificates;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self, limits: &ValidationLimits) -> Result<()> {
        limits.validate_title(&self.title, "certificate title")?;
        limits.validate_text(&self.issuer, "certificate issuer")?;
        limits.validate_list(&self.skills, "certificate skills")?;
        limits.validate_list(&self.linked_projects, "linked projects")?;
        limits.validate_list(&self.subcategories, "certificate subcategories")
    }

    fn records(snapshot: &ContentSnapshot) -> &Vec<Self> {
        &snapshot.certificates
    }

    fn records_mut(snapshot: &mut ContentSnapshot) -> &mut Vec<Self> {
        &mut snapshot.certificates
    }
}

impl Record for Skill {
    const KIND: ResourceKind = ResourceKind::Skills;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self, limits: &ValidationLimits) -> Result<()> {
        ensure!(
            !self.is_derived(),
            ValidationSnafu {
                message: format!(
                    "skill '{}' is derived from a {}; edit the {} instead",
                    self.name, self.source, self.source
                ),
            }
        );
        limits.validate_title(&self.name, "skill name")?;
        limits.validate_text(&self.category, "skill category")
    }

    fn records(snapshot: &ContentSnapshot) -> &Vec<Self> {
        &snapshot.skills
    }

    fn records_mut(snapshot: &mut ContentSnapshot) -> &mut Vec<Self> {
        &mut snapshot.skills
    }
}

/// Shallow merge: top-level fields in `patch` replace those of `current`.
/// The id field cannot be patched.
pub fn merge_patch<T: Serialize + DeserializeOwned>(current: &T, patch: &Patch) -> Result<T> {
    let mut value = serde_json::to_value(current).context(SerializationSnafu)?;
    if let Value::Object(fields) = &mut value {
        for (key, field) in patch.iter().filter(|(key, _)| key.as_str() != "id") {
            fields.insert(key.clone(), field.clone());
        }
    }
    serde_json::from_value(value).map_err(|err| {
        ValidationSnafu {
            message: format!("invalid patch: {err}"),
        }
        .build()
    })
}

// patch is exactly {"visible": bool}
fn visibility_patch(patch: &Patch) -> Option<bool> {
    if patch.len() != 1 {
        return None;
    }
    patch.get("visible").and_then(Value::as_bool)
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).context(DeserializationSnafu)
}

// body for create: the record without its temporary id
fn create_payload<R: Record>(record: &R) -> Result<Value> {
    let mut value = serde_json::to_value(record).context(SerializationSnafu)?;
    if let Value::Object(fields) = &mut value {
        fields.remove("id");
    }
    Ok(value)
}

fn replace_by_id<R: Record>(records: &mut [R], id: &str, record: R) -> bool {
    match records.iter_mut().find(|r| r.id() == id) {
        Some(slot) => {
            *slot = record;
            true
        }
        None => false,
    }
}

/// Client-side content state with optimistic mutations
pub struct ContentStore {
    api: Arc<dyn ContentApi>,
    overrides: Arc<dyn VisibilityOverrideStore>,
    limits: ValidationLimits,
    state: Mutex<Arc<ContentSnapshot>>,
    tx: watch::Sender<Arc<ContentSnapshot>>,
    next_temp: AtomicU64,
    closed: AtomicBool,
}

impl std::fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("ContentStore")
            .field("projects", &snapshot.projects.len())
            .field("certificates", &snapshot.certificates.len())
            .field("skills", &snapshot.skills.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl ContentStore {
    pub fn new(api: Arc<dyn ContentApi>, overrides: Arc<dyn VisibilityOverrideStore>) -> Self {
        let initial = Arc::new(ContentSnapshot::default());
        let (tx, _rx) = watch::channel(initial.clone());
        Self {
            api,
            overrides,
            limits: ValidationLimits::default(),
            state: Mutex::new(initial),
            tx,
            next_temp: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_limits(self, limits: ValidationLimits) -> Self {
        Self { limits, ..self }
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    pub fn overrides(&self) -> &Arc<dyn VisibilityOverrideStore> {
        &self.overrides
    }

    /// Current content
    pub fn snapshot(&self) -> Arc<ContentSnapshot> {
        self.state.lock().clone()
    }

    /// Current copy of one record
    pub fn record<R: Record>(&self, id: &str) -> Option<R> {
        R::records(&self.snapshot()).iter().find(|r| r.id() == id).cloned()
    }

    /// Receiver that observes every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<ContentSnapshot>> {
        self.tx.subscribe()
    }

    /// Visibility resolver for the current overrides, with orphan detection
    /// against the current projects and certificates.
    pub fn visibility_resolver(&self) -> VisibilityResolver {
        VisibilityResolver::new(self.overrides.get()).with_origins(&self.snapshot().entities())
    }

    /// After `close`, results of requests still in flight are not applied.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn next_temp_id(&self) -> String {
        format!(
            "{TEMP_ID_PREFIX}{}",
            self.next_temp.fetch_add(1, Ordering::Relaxed)
        )
    }

    // Runs `f` against a copy of the snapshot. On Ok the copy is published,
    // on Err nothing changes.
    fn apply<T>(&self, f: impl FnOnce(&mut ContentSnapshot) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock();
        let mut next = (**state).clone();
        let out = f(&mut next)?;
        let next = Arc::new(next);
        *state = next.clone();
        self.tx.send_replace(next);
        Ok(out)
    }

    // phase 3: skipped once the store is closed
    fn reconcile(&self, what: &str, f: impl FnOnce(&mut ContentSnapshot)) {
        if self.is_closed() {
            debug!(what, "store closed, dropping late reconciliation");
            return;
        }
        let _ = self.apply(|snapshot| {
            f(snapshot);
            Ok(())
        });
    }

    /// Fetches all content and replaces the local snapshot.
    /// Source overrides from the server replace the source channel of the override store.
    pub async fn refresh(&self) -> Result<Arc<ContentSnapshot>> {
        let mut bundle = self.api.fetch_content().await?;
        if self.is_closed() {
            return Ok(self.snapshot());
        }
        let sources = std::mem::take(&mut bundle.skill_overrides);
        self.overrides
            .modify(&mut |maps| maps.replace_sources(sources.iter().cloned()))?;
        let snapshot = ContentSnapshot::from(bundle);
        debug!(
            projects = snapshot.projects.len(),
            certificates = snapshot.certificates.len(),
            skills = snapshot.skills.len(),
            repositories = snapshot.repositories.len(),
            sources = sources.len(),
            "refreshed content"
        );
        self.apply(move |current| {
            *current = snapshot;
            Ok(())
        })?;
        Ok(self.snapshot())
    }

    /// Adds a record. It appears immediately under a temporary id, which is
    /// replaced by the server-issued id when the request succeeds.
    pub async fn create<R: Record>(&self, mut record: R) -> MutationResult<R> {
        let temp_id = self.next_temp_id();
        let payload = match record.validate(&self.limits).and_then(|()| {
            record.set_id(temp_id.clone());
            create_payload(&record)
        }) {
            Ok(payload) => payload,
            Err(err) => return err.into(),
        };
        let local = record.clone();
        if let Err(err) = self.apply(|snapshot| {
            R::records_mut(snapshot).push(local);
            Ok(())
        }) {
            return err.into();
        }
        debug!(kind = %R::KIND, %temp_id, "created locally");

        let outcome = match self.api.create(R::KIND, payload).await {
            Ok(value) => decode::<R>(value).and_then(|saved| {
                ensure!(
                    !saved.id().is_empty(),
                    OtherSnafu {
                        message: format!("server returned {} without an id", R::KIND.singular()),
                    }
                );
                Ok(saved)
            }),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(saved) => {
                let swapped = saved.clone();
                self.reconcile("create", |snapshot| {
                    let records = R::records_mut(snapshot);
                    let temp_pos = records.iter().position(|r| r.id() == temp_id);
                    if let Some(existing) = records.iter().position(|r| r.id() == swapped.id()) {
                        records[existing] = swapped;
                        if let Some(pos) = temp_pos {
                            records.remove(pos);
                        }
                    } else if let Some(pos) = temp_pos {
                        records[pos] = swapped;
                    } else {
                        records.push(swapped);
                    }
                });
                debug!(kind = %R::KIND, %temp_id, id = saved.id(), "create confirmed");
                MutationResult::ok(saved)
            }
            Err(err) => {
                warn!(kind = %R::KIND, %temp_id, error = %err, "create failed, rolling back");
                self.reconcile("create rollback", |snapshot| {
                    R::records_mut(snapshot).retain(|r| r.id() != temp_id);
                });
                err.into()
            }
        }
    }

    /// Shallow-merges `patch` into the record with `id`.
    ///
    /// A patch of exactly `{"visible": bool}` uses the visibility endpoint.
    pub async fn update<R: Record>(&self, id: &str, patch: Patch) -> MutationResult<R> {
        let limits = &self.limits;
        let prepared = self.apply(|snapshot| {
            ensure!(
                !is_temp_id(id),
                ValidationSnafu {
                    message: format!("{} {id} is still being created", R::KIND.singular()),
                }
            );
            let records = R::records_mut(snapshot);
            let slot = records
                .iter_mut()
                .find(|r| r.id() == id)
                .context(NotFoundSnafu {
                    obj_type: R::KIND.singular(),
                    key: id,
                })?;
            let before = slot.clone();
            let after = merge_patch(&before, &patch)?;
            after.validate(limits)?;
            R::validate_edit(&before, &after, limits)?;
            *slot = after.clone();
            Ok((before, after))
        });
        let (before, after) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => return err.into(),
        };
        debug!(kind = %R::KIND, id, "updated locally");

        let sent = match visibility_patch(&patch) {
            Some(visible) => self.api.set_visibility(R::KIND, id, visible).await,
            None => match serde_json::to_value(&after).context(SerializationSnafu) {
                Ok(body) => self.api.update(R::KIND, id, body).await,
                Err(err) => Err(err),
            },
        };

        match sent.and_then(decode::<R>) {
            Ok(saved) => {
                let stored = saved.clone();
                self.reconcile("update", |snapshot| {
                    replace_by_id(R::records_mut(snapshot), id, stored);
                });
                MutationResult::ok(saved)
            }
            Err(err) => {
                warn!(kind = %R::KIND, id, error = %err, "update failed, rolling back");
                self.reconcile("update rollback", |snapshot| {
                    replace_by_id(R::records_mut(snapshot), id, before);
                });
                err.into()
            }
        }
    }

    /// Removes the record with `id`. It disappears immediately and comes back
    /// in its original position if the request fails.
    pub async fn delete<R: Record>(&self, id: &str) -> MutationResult<()> {
        let removed = self.apply(|snapshot| {
            ensure!(
                !is_temp_id(id),
                ValidationSnafu {
                    message: format!("{} {id} is still being created", R::KIND.singular()),
                }
            );
            let records = R::records_mut(snapshot);
            let pos = records
                .iter()
                .position(|r| r.id() == id)
                .context(NotFoundSnafu {
                    obj_type: R::KIND.singular(),
                    key: id,
                })?;
            Ok((pos, records.remove(pos)))
        });
        let (pos, record) = match removed {
            Ok(removed) => removed,
            Err(err) => return err.into(),
        };
        debug!(kind = %R::KIND, id, "deleted locally");

        match self.api.delete(R::KIND, id).await {
            Ok(()) => MutationResult::ok(()),
            Err(err) => {
                warn!(kind = %R::KIND, id, error = %err, "delete failed, rolling back");
                self.reconcile("delete rollback", |snapshot| {
                    let records = R::records_mut(snapshot);
                    if !records.iter().any(|r| r.id() == id) {
                        records.insert(pos.min(records.len()), record);
                    }
                });
                err.into()
            }
        }
    }

    pub async fn create_project(&self, project: Project) -> MutationResult<Project> {
        self.create(project).await
    }

    pub async fn update_project(&self, id: &str, patch: Patch) -> MutationResult<Project> {
        self.update(id, patch).await
    }

    pub async fn delete_project(&self, id: &str) -> MutationResult<()> {
        self.delete::<Project>(id).await
    }

    pub async fn create_certificate(&self, certificate: Certificate) -> MutationResult<Certificate> {
        self.create(certificate).await
    }

    pub async fn update_certificate(&self, id: &str, patch: Patch) -> MutationResult<Certificate> {
        self.update(id, patch).await
    }

    pub async fn delete_certificate(&self, id: &str) -> MutationResult<()> {
        self.delete::<Certificate>(id).await
    }

    pub async fn create_skill(&self, skill: Skill) -> MutationResult<Skill> {
        self.create(skill).await
    }

    pub async fn update_skill(&self, id: &str, patch: Patch) -> MutationResult<Skill> {
        self.update(id, patch).await
    }

    pub async fn delete_skill(&self, id: &str) -> MutationResult<()> {
        self.delete::<Skill>(id).await
    }

    /// Shallow-merges `patch` into the about document
    pub async fn update_about(&self, patch: Patch) -> MutationResult<About> {
        let limits = &self.limits;
        let prepared = self.apply(|snapshot| {
            let before = snapshot.about.clone();
            let after: About = merge_patch(&before, &patch)?;
            limits.validate_text(&after.name, "about name")?;
            limits.validate_text(&after.headline, "about headline")?;
            limits.validate_text(&after.bio, "about bio")?;
            snapshot.about = after.clone();
            Ok((before, after))
        });
        let (before, after) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => return err.into(),
        };
        match self.api.update_about(&after).await {
            Ok(saved) => {
                let stored = saved.clone();
                self.reconcile("about", |snapshot| snapshot.about = stored);
                MutationResult::ok(saved)
            }
            Err(err) => {
                warn!(error = %err, "about update failed, rolling back");
                self.reconcile("about rollback", |snapshot| snapshot.about = before);
                err.into()
            }
        }
    }

    /// Shallow-merges `patch` into the site configuration
    pub async fn update_configuration(&self, patch: Patch) -> MutationResult<SiteConfig> {
        let limits = &self.limits;
        let prepared = self.apply(|snapshot| {
            let before = snapshot.configuration.clone();
            let after: SiteConfig = merge_patch(&before, &patch)?;
            limits.validate_text(&after.site_title, "site title")?;
            snapshot.configuration = after.clone();
            Ok((before, after))
        });
        let (before, after) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => return err.into(),
        };
        match self.api.update_configuration(&after).await {
            Ok(saved) => {
                let stored = saved.clone();
                self.reconcile("configuration", |snapshot| snapshot.configuration = stored);
                MutationResult::ok(saved)
            }
            Err(err) => {
                warn!(error = %err, "configuration update failed, rolling back");
                self.reconcile("configuration rollback", |snapshot| {
                    snapshot.configuration = before;
                });
                err.into()
            }
        }
    }

    fn check_derived(&self, key: &SourceKey) -> Result<()> {
        ensure!(
            key.source.is_derived(),
            ValidationSnafu {
                message: format!("skill '{}' is not derived", key.name),
            }
        );
        self.limits.validate_title(&key.name, "skill name")?;
        self.limits.validate_id(&key.source_id, "skill source")
    }

    fn restore_source(&self, key: &SourceKey, previous: Option<SourceAction>) {
        let restored = self.overrides.modify(&mut |maps| match previous {
            Some(action) => maps.set_source(key.clone(), action),
            None => maps.clear_source(key),
        });
        if let Err(err) = restored {
            warn!(skill = %key.name, error = %err, "could not restore source override");
        }
    }

    async fn set_source_action(&self, key: SourceKey, action: SourceAction) -> MutationResult<()> {
        if let Err(err) = self.check_derived(&key) {
            return err.into();
        }
        let previous = self.overrides.get().source(&key);
        if let Err(err) = self
            .overrides
            .modify(&mut |maps| maps.set_source(key.clone(), action))
        {
            return err.into();
        }
        debug!(skill = %key.name, source_id = %key.source_id, %action, "source override set locally");

        let entry = SkillOverride {
            key: key.clone(),
            action,
        };
        match self.api.set_skill_override(&entry).await {
            Ok(()) => MutationResult::ok(()),
            Err(err) => {
                warn!(skill = %key.name, error = %err, "skill override failed, rolling back");
                self.restore_source(&key, previous);
                err.into()
            }
        }
    }

    /// Hides a derived skill at its origin
    pub async fn hide_derived_skill(&self, key: SourceKey) -> MutationResult<()> {
        self.set_source_action(key, SourceAction::Hide).await
    }

    /// Explicitly shows a derived skill at its origin
    pub async fn show_derived_skill(&self, key: SourceKey) -> MutationResult<()> {
        self.set_source_action(key, SourceAction::Show).await
    }

    /// Removes the source override of a derived skill
    pub async fn restore_derived_skill(&self, key: SourceKey) -> MutationResult<()> {
        if let Err(err) = self.check_derived(&key) {
            return err.into();
        }
        let previous = self.overrides.get().source(&key);
        if let Err(err) = self.overrides.modify(&mut |maps| maps.clear_source(&key)) {
            return err.into();
        }
        match self.api.clear_skill_override(&key).await {
            Ok(()) => MutationResult::ok(()),
            Err(err) => {
                warn!(skill = %key.name, error = %err, "skill override restore failed, rolling back");
                self.restore_source(&key, previous);
                err.into()
            }
        }
    }

    /// Deletes a derived skill by removing its mention from the origin entity.
    ///
    /// The skill is marked `delete` in the source channel while the origin
    /// update is in flight. On success the marker is cleared, since the skill no
    /// longer exists; on failure the previous source override comes back.
    pub async fn delete_derived_skill(&self, key: SourceKey) -> MutationResult<()> {
        if let Err(err) = self.check_derived(&key) {
            return err.into();
        }
        let snapshot = self.snapshot();
        let (field, mentions) = match key.source {
            SkillSource::Project => (
                "technologies",
                snapshot.project(&key.source_id).map(|p| &p.technologies),
            ),
            SkillSource::Certificate => (
                "skills",
                snapshot.certificate(&key.source_id).map(|c| &c.skills),
            ),
            SkillSource::Manual => ("", None),
        };
        let Some(mentions) = mentions else {
            return NotFoundSnafu {
                obj_type: key.source.to_string(),
                key: key.source_id.clone(),
            }
            .build()
            .into();
        };
        let name = key.name.trim();
        let remaining: Vec<String> = mentions
            .iter()
            .filter(|mention| !mention.trim().eq_ignore_ascii_case(name))
            .cloned()
            .collect();
        if remaining.len() == mentions.len() {
            return NotFoundSnafu {
                obj_type: "skill",
                key: name,
            }
            .build()
            .into();
        }
        if key.source == SkillSource::Project
            && let Err(err) =
                self.limits
                    .validate_required_list(mentions, &remaining, "project technologies")
        {
            return err.into();
        }

        let previous = self.overrides.get().source(&key);
        if let Err(err) = self
            .overrides
            .modify(&mut |maps| maps.set_source(key.clone(), SourceAction::Delete))
        {
            return err.into();
        }

        let mut patch = Patch::new();
        patch.insert(field.to_string(), Value::from(remaining));
        let result = match key.source {
            SkillSource::Project => {
                let MutationResult { success, message, data, kind } =
                    self.update::<Project>(&key.source_id, patch).await;
                MutationResult { success, message, data: data.map(drop), kind }
            }
            _ => {
                let MutationResult { success, message, data, kind } =
                    self.update::<Certificate>(&key.source_id, patch).await;
                MutationResult { success, message, data: data.map(drop), kind }
            }
        };

        if result.success {
            self.restore_source(&key, None);
        } else {
            self.restore_source(&key, previous);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn merge_patch_is_shallow_and_keeps_id() {
        let project = Project {
            id: "p1".into(),
            title: "Folio".into(),
            technologies: vec!["Rust".into()],
            ..Default::default()
        };
        let patch = crate::patch! { "id": "other", "title": "Folio 2", "featured": true };
        let merged = merge_patch(&project, &patch).expect("merge");
        assert_eq!(merged.id, "p1");
        assert_eq!(merged.title, "Folio 2");
        assert!(merged.featured);
        assert_eq!(merged.technologies, vec!["Rust".to_string()]);
    }

    #[test]
    fn merge_patch_rejects_wrong_types() {
        let patch = crate::patch! { "order": "first" };
        let err = merge_patch(&Project::default(), &patch).expect_err("bad type");
        assert!(matches!(err, crate::error::FolioError::Validation { .. }));
    }

    #[test]
    fn only_lone_visible_field_is_a_visibility_patch() {
        assert_eq!(visibility_patch(&crate::patch! { "visible": false }), Some(false));
        assert_eq!(
            visibility_patch(&crate::patch! { "visible": true, "title": "x" }),
            None
        );
        assert_eq!(visibility_patch(&crate::patch! { "visible": "yes" }), None);
    }

    #[test]
    fn create_payload_drops_temp_id() {
        let project = Project {
            id: "temp-1".into(),
            title: "New".into(),
            ..Default::default()
        };
        let payload = create_payload(&project).expect("payload");
        assert!(payload.get("id").is_none());
        assert_eq!(payload["title"], json!("New"));
    }

    #[test]
    fn derived_skills_cannot_be_stored() {
        let skill = Skill {
            name: "Rust".into(),
            source: SkillSource::Project,
            ..Default::default()
        };
        assert!(skill.validate(&ValidationLimits::default()).is_err());
    }
}
