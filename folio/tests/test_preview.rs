//! Integration tests for screenshot preview resolution
//!
//! ```bash
//! cargo test -p folio --test test_preview
//! ```

mod common;

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use folio::prelude::*;
use folio::test_util::MockContentApi;

use common::{ApiCall, MOCK_BASE_URL, TestResult, project};

const LIVE: &str = "https://alpha.test";

fn resolver(api: &Arc<MockContentApi>) -> PreviewResolver {
    PreviewResolver::new(api.clone(), DEFAULT_PREVIEW_FRESHNESS)
}

fn capture_url(live_url: &str, id: &str) -> String {
    CaptureEndpoint::new(MOCK_BASE_URL).capture_url(live_url, id)
}

fn lookups(api: &MockContentApi) -> usize {
    api.calls()
        .iter()
        .filter(|call| matches!(call, ApiCall::LookupScreenshots(_)))
        .count()
}

fn live_project(id: &str, live_url: &str) -> Entity {
    let mut p = project(id, id, &["Rust"]);
    p.live_url = Some(live_url.to_string());
    p.into()
}

#[tokio::test]
#[test_log::test]
async fn test_fresh_cached_capture_is_reused() -> TestResult<()> {
    let api = Arc::new(MockContentApi::default());
    api.add_screenshot(LIVE, "https://cdn.test/stale.png", Utc::now() - TimeDelta::hours(30));
    api.add_screenshot(LIVE, "https://cdn.test/fresh.png", Utc::now() - TimeDelta::hours(2));
    let previews = resolver(&api);

    let entry = previews.request("A", LIVE).await;
    assert_eq!(entry, PreviewEntry::resolved("https://cdn.test/fresh.png"));
    assert_eq!(previews.entry("A"), Some(entry));
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_stale_capture_builds_capture_url() -> TestResult<()> {
    let api = Arc::new(MockContentApi::default());
    api.add_screenshot(
        LIVE,
        "https://cdn.test/old.png",
        Utc::now() - TimeDelta::hours(12) - TimeDelta::minutes(1),
    );
    let previews = resolver(&api);

    let entry = previews.request("A", LIVE).await;
    assert_eq!(entry.url.as_deref(), Some(capture_url(LIVE, "A").as_str()));
    assert_eq!(
        entry.url.as_deref(),
        Some("http://mock.folio.test/api/screenshots/capture?url=https%3A%2F%2Falpha.test&id=A")
    );
    assert!(!entry.error && !entry.loading);
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_concurrent_requests_are_coalesced() -> TestResult<()> {
    let api = Arc::new(MockContentApi::default());
    let previews = resolver(&api);
    api.hold();

    let (first, second, ()) = tokio::join!(
        previews.request("A", LIVE),
        previews.request("A", LIVE),
        async {
            api.wait_for_calls(1).await;
            assert_eq!(previews.entry("A"), Some(PreviewEntry::loading()));
            api.release();
        }
    );

    assert_eq!(first.url.as_deref(), Some(capture_url(LIVE, "A").as_str()));
    assert!(second.loading);
    assert_eq!(lookups(&api), 1);

    // resolved ids are not looked up again
    let again = previews.request("A", LIVE).await;
    assert_eq!(again, first);
    assert_eq!(lookups(&api), 1);
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_lookup_failure_keeps_capture_url() -> TestResult<()> {
    let api = Arc::new(MockContentApi::default());
    api.fail_lookups(true);
    let previews = resolver(&api);

    let entry = previews.request("A", LIVE).await;
    assert!(entry.error);
    assert_eq!(entry.url.as_deref(), Some(capture_url(LIVE, "A").as_str()));
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_image_error_retries_once() -> TestResult<()> {
    let api = Arc::new(MockContentApi::default());
    api.add_screenshot(LIVE, "https://cdn.test/broken.png", Utc::now());
    let previews = resolver(&api);
    previews.request("A", LIVE).await;

    let retry = previews.report_image_error("A", Some(LIVE));
    assert_eq!(retry, PreviewEntry::resolved(capture_url(LIVE, "A")));

    let gave_up = previews.report_image_error("A", Some(LIVE));
    assert!(gave_up.is_exhausted());

    // exhausted entities render their fallback
    let entity = live_project("A", LIVE);
    let ctx = PreviewContext::new(previews.snapshot(), CaptureEndpoint::new(MOCK_BASE_URL));
    let descriptor = ProjectAdapter.preview_descriptor(&entity, &ctx);
    assert!(descriptor.is_fallback());

    // the retry did not go through the screenshot cache
    assert_eq!(lookups(&api), 1);
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_exhausted_preview_is_not_requested_again() -> TestResult<()> {
    let api = Arc::new(MockContentApi::default());
    api.add_screenshot(LIVE, "https://cdn.test/broken.png", Utc::now());
    let previews = resolver(&api);
    previews.request("A", LIVE).await;
    previews.report_image_error("A", Some(LIVE));
    previews.report_image_error("A", Some(LIVE));

    // a re-render must not bring back the broken cached screenshot
    let again = previews.request("A", LIVE).await;
    assert!(again.is_exhausted());
    previews
        .request_all(&[live_project("A", LIVE)], &AdapterRegistry::default())
        .await;
    assert!(previews.entry("A").is_some_and(|entry| entry.is_exhausted()));
    assert_eq!(lookups(&api), 1);

    previews.clear();
    let fresh = previews.request("A", LIVE).await;
    assert_eq!(fresh.url.as_deref(), Some("https://cdn.test/broken.png"));
    assert_eq!(lookups(&api), 2);
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_custom_images_skip_previews() -> TestResult<()> {
    let api = Arc::new(MockContentApi::default());
    let previews = resolver(&api);
    let registry = AdapterRegistry::default();

    let mut with_image = project("A", "Alpha", &["Rust"]);
    with_image.live_url = Some(LIVE.to_string());
    with_image.images = vec!["/uploads/alpha.png".to_string()];
    let entities = vec![
        Entity::from(with_image),
        live_project("B", "https://beta.test"),
        Entity::from(project("C", "No site", &["Go"])),
        live_project("D", "https://delta.test"),
    ];

    previews.request_all(&entities, &registry).await;
    assert_eq!(lookups(&api), 2);
    let map = previews.snapshot();
    assert!(map.contains_key("B") && map.contains_key("D"));
    assert!(!map.contains_key("A") && !map.contains_key("C"));

    let ctx = PreviewContext::new(map, CaptureEndpoint::new(MOCK_BASE_URL));
    let descriptor = ProjectAdapter.preview_descriptor(&entities[0], &ctx);
    assert_eq!(descriptor.kind(), "custom");
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_results_after_close_are_dropped() -> TestResult<()> {
    let api = Arc::new(MockContentApi::default());
    let previews = resolver(&api);
    api.hold();

    let (entry, ()) = tokio::join!(previews.request("A", LIVE), async {
        api.wait_for_calls(1).await;
        previews.close();
        api.release();
    });

    assert!(!entry.loading);
    assert!(previews.is_closed());
    assert_eq!(previews.entry("A"), Some(PreviewEntry::loading()));
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_clear_allows_new_resolution() -> TestResult<()> {
    let api = Arc::new(MockContentApi::default());
    let previews = resolver(&api);
    previews.request("A", LIVE).await;
    previews.clear();
    assert!(previews.snapshot().is_empty());
    previews.request("A", LIVE).await;
    assert_eq!(lookups(&api), 2);
    Ok(())
}
