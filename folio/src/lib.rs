/*
 * folio - portfolio content core
 * github.com/stevelr/folio
 *
 * SPDX-FileCopyrightText: 2025-2026 Steve Schoettler
 * SPDX-License-Identifier: Apache-2.0
 */
//! # Folio
//!
//! The content core behind a personal portfolio site and its admin panel.
//!
//! ## Features
//!
//! - one adapter-driven pipeline for projects, certificates, and repository summaries
//! - card, modal, and list views in `home` (public) and `admin` modes
//! - effective visibility from stacked overrides: source, category, item, baseline
//! - skills derived from project technologies and certificate skills
//! - screenshot previews with a freshness window and request coalescing
//! - optimistic create/update/delete with snapshot rollback
//! - http middleware with retry logic and rate limit handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use folio::prelude::*;
//! # async fn example() -> Result<(), FolioError> {
//!
//! let client = Arc::new(FolioClient::with_config(ClientConfig::default())?);
//! let store = ContentStore::new(client.clone(), Arc::new(InMemoryOverrideStore::default()));
//! store.refresh().await?;
//!
//! // Hide a project. The local collection changes before the request is sent,
//! // and is restored if the server rejects it.
//! let result = store.update_project("p1", patch! { "visible": false }).await;
//! if !result.success {
//!     eprintln!("update failed: {}", result.message.unwrap_or_default());
//! }
//!
//! // Render the public project list.
//! let registry = AdapterRegistry::default();
//! let content = store.snapshot();
//! let resolver = store.visibility_resolver();
//! let pool = content.entities();
//! let list = ListView::new(Mode::Home);
//! let ctx = RenderContext::new(&resolver, &pool, PreviewContext::empty(client.capture()));
//! for card in list.cards(&content.project_entities(), &registry, &ctx) {
//!     println!("{} {}", card.id, card.title);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Structure
//!
//! - [`store::ContentStore`] owns the collections and is the only place that talks to
//!   the [`api::ContentApi`]. Mutations return [`error::MutationResult`] rather than errors.
//! - [`visibility::VisibilityResolver`] reads an immutable snapshot of the
//!   [`overrides::VisibilityOverrideStore`].
//! - [`render::ListView`] turns entities into cards using the [`adapter::AdapterRegistry`],
//!   and forwards user actions to an [`render::ItemActions`] implementation.
//! - [`preview::PreviewResolver`] lazily resolves screenshot urls per entity id.
//!
#![allow(clippy::missing_errors_doc)] // pedantic
#![allow(clippy::missing_const_for_fn)] //  nursery function
#![allow(clippy::must_use_candidate)] // pedantic
#![warn(clippy::default_trait_access)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::implicit_clone)]
#![warn(clippy::match_same_arms)]
#![warn(clippy::needless_raw_strings)]
#![warn(clippy::redundant_clone)]
#![warn(clippy::ref_option)]
#![warn(clippy::redundant_closure)]
#![warn(clippy::uninlined_format_args)]
#![warn(clippy::unused_async)]

pub mod adapter;
pub mod api;
pub mod client;
pub mod error;
mod http_client;
pub mod model;
pub mod overrides;
pub mod preview;
pub mod render;
pub mod skills;
pub mod store;
pub mod validation;
pub mod visibility;

pub mod test_util;

/// Result type alias using `FolioError` as the default error.
pub type Result<T, E = crate::error::FolioError> = std::result::Result<T, E>;

/// Prelude module - import the commonly used types with `use folio::prelude::*;`
pub mod prelude {
    pub use super::{DEFAULT_PREVIEW_FRESHNESS, FOLIO_DEFAULT_URL};
    pub use crate::error::*;
    pub use crate::{
        // Entity adapters
        adapter::{
            AdapterRegistry, CertificateAdapter, EntityAdapter, ExternalLink, LinkType,
            PreviewContext, PreviewDescriptor, ProjectAdapter, RepoAdapter, StatusBadge,
        },
        // Collaborator contracts
        api::{CachedScreenshot, CaptureEndpoint, ContentApi, ResourceKind, ScreenshotApi},
        client::{ClientConfig, FolioClient, SecretToken},
        http_client::HttpMetricsSnapshot,
        // Content model
        model::{
            About, Certificate, ContentBundle, Entity, EntityKind, FileRef, Project,
            ProjectStatus, RepoSummary, SiteConfig, SocialLink,
        },
        // Visibility overrides
        overrides::{
            FileOverrideStore, InMemoryOverrideStore, OverrideMaps, SourceAction, SkillOverride,
            VisibilityOverrideStore,
        },
        // Previews
        preview::{PreviewEntry, PreviewMap, PreviewResolver},
        // Rendering
        render::{
            Card, CardAction, Facet, ItemActions, LinkedItem, ListView, Modal, Mode, RenderContext,
            SortKey,
        },
        // Skills
        skills::{Skill, SkillSource, SourceKey, derive_skills},
        // Optimistic store
        store::{ContentSnapshot, ContentStore, Patch, Record},
        validation::ValidationLimits,
        visibility::{VisibilityResolver, VisibilitySubject},
    };
    pub use crate::patch;
}

// ============================================================================
// CONSTANTS
// ============================================================================

/// Default content api endpoint (local dev server)
pub const FOLIO_DEFAULT_URL: &str = "http://127.0.0.1:3000";

/// Screenshots captured more recently than this are reused instead of recaptured.
pub const DEFAULT_PREVIEW_FRESHNESS: std::time::Duration = std::time::Duration::from_secs(12 * 60 * 60);

pub(crate) mod config {
    /// Environment variable for default endpoint URL
    pub const FOLIO_URL_ENV: &str = "FOLIO_URL";

    /// Environment variable holding the admin bearer token
    pub const FOLIO_TOKEN_ENV: &str = "FOLIO_TOKEN";

    /// Warn when the rate-limit wait exceeds this duration (seconds).
    pub const RATE_LIMIT_WAIT_WARN_SECS: u64 = 5;

    /// Fail when the rate-limit wait exceeds this duration (seconds).
    pub const RATE_LIMIT_WAIT_MAX_SECS: u64 = 30;

    /// Environment variable to override rate-limit retry cap (0 disables the cap).
    pub const RATE_LIMIT_MAX_RETRIES_ENV: &str = "FOLIO_RATE_LIMIT_MAX_RETRIES";

    /// Maximum consecutive 429 retries before failing.
    pub const RATE_LIMIT_MAX_RETRIES_DEFAULT: u32 = 5;

    /// Max retries for HTTP client
    pub const MAX_RETRIES: u32 = 3;

    /// Prefix for locally assigned ids of records that have not been confirmed by the server
    pub const TEMP_ID_PREFIX: &str = "temp-";

    // Validation limits
    pub const VALIDATION_BODY_MAX_LEN: u64 = 4 * 1024 * 1024;
    pub const VALIDATION_TITLE_MAX_LEN: u64 = 512;
    pub const VALIDATION_TEXT_MAX_LEN: u64 = 64 * 1024;
    pub const VALIDATION_LIST_MAX_COUNT: u64 = 512;
    pub const VALIDATION_ID_MAX_LEN: u64 = 200;
}

#[doc(hidden)]
pub mod __private {
    pub use serde_json::json;
}

// =============================================================================
// Macros
// =============================================================================

/// Builds a [`store::Patch`] (a json object) from `key: value` pairs.
///
/// ```rust
/// use folio::patch;
/// let patch = patch! { "title": "New title", "featured": true };
/// assert_eq!(patch.len(), 2);
/// ```
#[macro_export]
macro_rules! patch {
    ($($key:literal : $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut map = $crate::store::Patch::new();
        $( map.insert($key.to_string(), $crate::__private::json!($value)); )*
        map
    }};
}
