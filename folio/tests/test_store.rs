//! Integration tests for the optimistic content store
//!
//! Covers the three mutation phases (local apply, request, reconcile),
//! rollback to the exact prior state, temporary id replacement, the
//! visibility route, and late results after `close`.
//!
//! ```bash
//! cargo test -p folio --test test_store
//! ```

mod common;

use folio::prelude::*;
use folio::test_util::MockContentApi;

use common::{ApiCall, TestResult, loaded_store, project, project_ids, sample_bundle};

// =============================================================================
// Refresh
// =============================================================================

#[tokio::test]
#[test_log::test]
async fn test_refresh_loads_content_and_source_overrides() -> TestResult<()> {
    let key = SourceKey::new("Docker", SkillSource::Project, "A");
    let mut bundle = sample_bundle();
    bundle.skill_overrides = vec![SkillOverride {
        key: key.clone(),
        action: SourceAction::Hide,
    }];
    let (_api, store) = loaded_store(bundle).await?;

    let snapshot = store.snapshot();
    assert_eq!(project_ids(&store), vec!["A", "B"]);
    assert_eq!(snapshot.certificates.len(), 1);
    assert_eq!(snapshot.about.name, "Sam Doe");
    assert_eq!(store.overrides().get().source(&key), Some(SourceAction::Hide));

    // Rust, Docker, Go, AWS
    let derived = snapshot.derived_skills();
    assert_eq!(derived.len(), 4);
    let resolver = store.visibility_resolver();
    let visible: Vec<_> = resolver
        .visible_skills(&derived)
        .iter()
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(visible, vec!["Rust", "Go", "AWS"]);
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_refresh_error_keeps_previous_snapshot() -> TestResult<()> {
    let (api, store) = loaded_store(sample_bundle()).await?;
    api.fail_next_with_status(503);
    assert!(store.refresh().await.is_err());
    assert_eq!(project_ids(&store), vec!["A", "B"]);
    Ok(())
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
#[test_log::test]
async fn test_failed_delete_restores_exact_order() -> TestResult<()> {
    let (api, store) = loaded_store(sample_bundle()).await?;
    api.fail_next_with_status(500);
    api.hold();

    let (result, ()) = tokio::join!(store.delete_project("A"), async {
        api.wait_for_calls(1).await;
        // removed locally before the server answers
        assert_eq!(project_ids(&store), vec!["B"]);
        api.release();
    });

    assert!(!result.success);
    assert!(
        result
            .message
            .as_deref()
            .is_some_and(|m| m.contains("mock failure 500"))
    );
    assert_eq!(project_ids(&store), vec!["A", "B"]);
    assert_eq!(
        api.calls(),
        vec![ApiCall::Delete {
            kind: ResourceKind::Projects,
            id: "A".into()
        }]
    );
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_delete_success() -> TestResult<()> {
    let (api, store) = loaded_store(sample_bundle()).await?;
    let result = store.delete_certificate("C").await;
    assert!(result.success, "{:?}", result.message);
    assert!(store.snapshot().certificates.is_empty());
    assert!(api.server_content().certificates.is_empty());
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_delete_unknown_id_sends_nothing() -> TestResult<()> {
    let (api, store) = loaded_store(sample_bundle()).await?;
    let result = store.delete_project("missing").await;
    assert!(!result.success);
    assert_eq!(result.message.as_deref(), Some("Project missing not found"));
    assert!(api.calls().is_empty());
    Ok(())
}

// =============================================================================
// Create
// =============================================================================

#[tokio::test]
#[test_log::test]
async fn test_create_swaps_temp_id_without_duplicates() -> TestResult<()> {
    let (api, store) = loaded_store(sample_bundle()).await?;
    api.hold();

    let (result, ()) = tokio::join!(store.create_project(project("", "Gamma", &["Zig"])), async {
        api.wait_for_calls(1).await;
        let ids = project_ids(&store);
        assert_eq!(ids.len(), 3);
        assert!(folio::store::is_temp_id(&ids[2]), "expected temp id, got {}", ids[2]);
        // temp records cannot be edited until confirmed
        let early = store.update_project(&ids[2], patch! { "title": "Early" }).await;
        assert!(!early.success);
        api.release();
    });

    assert!(result.success, "{:?}", result.message);
    let created = result.data.expect("created project");
    assert_eq!(created.id, "srv-1");
    assert_eq!(created.title, "Gamma");
    assert_eq!(project_ids(&store), vec!["A", "B", "srv-1"]);
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_failed_create_removes_temp_record() -> TestResult<()> {
    let (api, store) = loaded_store(sample_bundle()).await?;
    api.fail_next_with_status(500);
    let result = store
        .create_skill(common::manual_skill("", "Terraform", "tools"))
        .await;
    assert!(!result.success);
    let names: Vec<_> = store.snapshot().skills.iter().map(|s| s.name.clone()).collect();
    assert_eq!(names, vec!["Rust", "Kubernetes"]);
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_create_rejects_invalid_record_locally() -> TestResult<()> {
    let (api, store) = loaded_store(sample_bundle()).await?;
    let result = store.create_project(project("", "   ", &[])).await;
    assert!(!result.success);
    assert_eq!(
        result.message.as_deref(),
        Some("Validation error: project title cannot be empty")
    );
    assert!(api.calls().is_empty());
    assert_eq!(project_ids(&store), vec!["A", "B"]);
    Ok(())
}

// =============================================================================
// Update
// =============================================================================

#[tokio::test]
#[test_log::test]
async fn test_update_is_visible_before_response() -> TestResult<()> {
    let (api, store) = loaded_store(sample_bundle()).await?;
    let mut rx = store.subscribe();
    let _ = rx.borrow_and_update();
    api.hold();

    let (result, ()) = tokio::join!(
        store.update_project("B", patch! { "title": "Beta 2", "featured": true }),
        async {
            api.wait_for_calls(1).await;
            assert!(rx.has_changed().unwrap_or(false));
            let current = store.record::<Project>("B").expect("project B");
            assert_eq!(current.title, "Beta 2");
            api.release();
        }
    );

    assert!(result.success, "{:?}", result.message);
    assert_eq!(
        api.calls(),
        vec![ApiCall::Update {
            kind: ResourceKind::Projects,
            id: "B".into()
        }]
    );
    let stored = api.server_content();
    assert_eq!(stored.project("B").map(|p| p.title.as_str()), Some("Beta 2"));
    assert!(stored.project("B").is_some_and(|p| p.featured));
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_visible_only_patch_uses_visibility_route() -> TestResult<()> {
    let (api, store) = loaded_store(sample_bundle()).await?;
    let result = store.update_project("A", patch! { "visible": false }).await;
    assert!(result.success, "{:?}", result.message);
    assert_eq!(
        api.calls(),
        vec![ApiCall::SetVisibility {
            kind: ResourceKind::Projects,
            id: "A".into(),
            visible: false
        }]
    );
    assert!(store.record::<Project>("A").is_some_and(|p| !p.visible));

    api.clear_calls();
    let result = store
        .update_project("A", patch! { "visible": true, "order": 3 })
        .await;
    assert!(result.success);
    assert!(matches!(api.calls()[0], ApiCall::Update { .. }));
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_failed_update_rolls_back_record() -> TestResult<()> {
    let (api, store) = loaded_store(sample_bundle()).await?;
    let before = store.record::<Certificate>("C").expect("certificate");
    api.fail_next_with_status(422);
    let result = store
        .update_certificate("C", patch! { "title": "Renamed" })
        .await;
    assert!(!result.success);
    assert_eq!(store.record::<Certificate>("C"), Some(before));
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_update_cannot_empty_technologies() -> TestResult<()> {
    let (api, store) = loaded_store(sample_bundle()).await?;
    let result = store
        .update_project("B", patch! { "technologies": Vec::<String>::new() })
        .await;
    assert!(!result.success);
    assert_eq!(
        result.message.as_deref(),
        Some("Validation error: cannot remove the last of the project technologies")
    );
    assert!(api.calls().is_empty());
    assert_eq!(
        store.record::<Project>("B").map(|p| p.technologies),
        Some(vec!["Go".to_string()])
    );
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_update_rejects_wrong_field_type() -> TestResult<()> {
    let (api, store) = loaded_store(sample_bundle()).await?;
    let result = store.update_project("A", patch! { "order": "first" }).await;
    assert!(!result.success);
    assert!(api.calls().is_empty());
    Ok(())
}

// =============================================================================
// Singletons
// =============================================================================

#[tokio::test]
#[test_log::test]
async fn test_update_about_and_rollback() -> TestResult<()> {
    let (api, store) = loaded_store(sample_bundle()).await?;
    let result = store.update_about(patch! { "headline": "Staff Engineer" }).await;
    assert!(result.success);
    assert_eq!(store.snapshot().about.headline, "Staff Engineer");
    assert_eq!(store.snapshot().about.name, "Sam Doe");

    api.fail_next_with_status(500);
    let result = store.update_about(patch! { "headline": "Lost" }).await;
    assert!(!result.success);
    assert_eq!(store.snapshot().about.headline, "Staff Engineer");
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_update_configuration_keeps_unknown_settings() -> TestResult<()> {
    let mut bundle = sample_bundle();
    bundle
        .configuration
        .extra
        .insert("accent".into(), serde_json::json!("teal"));
    let (api, store) = loaded_store(bundle).await?;
    let result = store
        .update_configuration(patch! { "sectionsEnabled": serde_json::json!({ "certificates": false }) })
        .await;
    assert!(result.success, "{:?}", result.message);
    let config = store.snapshot().configuration.clone();
    assert!(!config.section_enabled("certificates"));
    assert_eq!(config.extra.get("accent"), Some(&serde_json::json!("teal")));
    assert_eq!(api.calls(), vec![ApiCall::UpdateConfiguration]);
    Ok(())
}

// =============================================================================
// Derived skills
// =============================================================================

#[tokio::test]
#[test_log::test]
async fn test_delete_derived_skill_edits_origin() -> TestResult<()> {
    let (api, store) = loaded_store(sample_bundle()).await?;
    let key = SourceKey::new("Docker", SkillSource::Project, "A");
    api.hold();

    let (result, ()) = tokio::join!(store.delete_derived_skill(key.clone()), async {
        api.wait_for_calls(1).await;
        // marked for deletion while the origin edit is in flight
        assert_eq!(store.overrides().get().source(&key), Some(SourceAction::Delete));
        api.release();
    });

    assert!(result.success, "{:?}", result.message);
    assert_eq!(
        store.record::<Project>("A").map(|p| p.technologies),
        Some(vec!["Rust".to_string()])
    );
    assert_eq!(store.overrides().get().source(&key), None);
    assert_eq!(
        api.calls(),
        vec![ApiCall::Update {
            kind: ResourceKind::Projects,
            id: "A".into()
        }]
    );
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_failed_derived_delete_restores_origin_and_override() -> TestResult<()> {
    let key = SourceKey::new("AWS", SkillSource::Certificate, "C");
    let mut bundle = sample_bundle();
    bundle.certificates[0].skills.push("S3".into());
    bundle.skill_overrides = vec![SkillOverride {
        key: key.clone(),
        action: SourceAction::Show,
    }];
    let (api, store) = loaded_store(bundle).await?;

    api.fail_next_with_status(500);
    let result = store.delete_derived_skill(key.clone()).await;
    assert!(!result.success);
    assert_eq!(
        store.record::<Certificate>("C").map(|c| c.skills),
        Some(vec!["AWS".to_string(), "S3".to_string()])
    );
    assert_eq!(store.overrides().get().source(&key), Some(SourceAction::Show));
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_last_technology_cannot_be_deleted() -> TestResult<()> {
    let (api, store) = loaded_store(sample_bundle()).await?;
    let result = store
        .delete_derived_skill(SourceKey::new("Go", SkillSource::Project, "B"))
        .await;
    assert!(!result.success);
    assert!(api.calls().is_empty());
    assert!(store.overrides().get().sources.is_empty());
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_hide_derived_skill_rolls_back_on_failure() -> TestResult<()> {
    let (api, store) = loaded_store(sample_bundle()).await?;
    let key = SourceKey::new("Rust", SkillSource::Project, "A");

    let result = store.hide_derived_skill(key.clone()).await;
    assert!(result.success);
    assert_eq!(store.overrides().get().source(&key), Some(SourceAction::Hide));
    assert_eq!(
        api.server_skill_overrides(),
        vec![SkillOverride {
            key: key.clone(),
            action: SourceAction::Hide
        }]
    );

    api.fail_next_with_status(500);
    let result = store.show_derived_skill(key.clone()).await;
    assert!(!result.success);
    assert_eq!(store.overrides().get().source(&key), Some(SourceAction::Hide));

    let result = store.restore_derived_skill(key.clone()).await;
    assert!(result.success);
    assert_eq!(store.overrides().get().source(&key), None);
    assert!(api.server_skill_overrides().is_empty());
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_manual_skill_is_not_a_derived_key() -> TestResult<()> {
    let (api, store) = loaded_store(sample_bundle()).await?;
    let result = store
        .hide_derived_skill(SourceKey::new("Rust", SkillSource::Manual, "s1"))
        .await;
    assert!(!result.success);
    assert!(api.calls().is_empty());
    Ok(())
}

// =============================================================================
// Close
// =============================================================================

#[tokio::test]
#[test_log::test]
async fn test_results_after_close_are_dropped() -> TestResult<()> {
    let (api, store) = loaded_store(sample_bundle()).await?;
    api.fail_next_with_status(500);
    api.hold();

    let (result, ()) = tokio::join!(store.update_project("A", patch! { "title": "Draft" }), async {
        api.wait_for_calls(1).await;
        store.close();
        api.release();
    });

    // the request failed, but the rollback was not applied to a closed store
    assert!(!result.success);
    assert!(store.is_closed());
    assert_eq!(
        store.record::<Project>("A").map(|p| p.title),
        Some("Draft".to_string())
    );
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_store_from_empty_mock() -> TestResult<()> {
    let api = std::sync::Arc::new(MockContentApi::default());
    let store = ContentStore::new(api.clone(), std::sync::Arc::new(InMemoryOverrideStore::default()));
    let snapshot = store.refresh().await?;
    assert!(snapshot.entities().is_empty());
    assert_eq!(api.calls(), vec![ApiCall::FetchContent]);
    Ok(())
}
