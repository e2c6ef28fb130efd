//! Shared fixtures for folio integration tests
//!
//! Every test runs against [`MockContentApi`], so no server is needed.
#![cfg(test)]
#![allow(dead_code)]

use std::sync::Arc;

use folio::prelude::*;
use folio::test_util::MockContentApi;

pub use folio::test_util::{ApiCall, MOCK_BASE_URL, TestResult};

pub fn project(id: &str, title: &str, technologies: &[&str]) -> Project {
    Project {
        id: id.to_string(),
        title: title.to_string(),
        description: format!("{title} description"),
        category: "apps".to_string(),
        technologies: technologies.iter().map(ToString::to_string).collect(),
        visible: true,
        ..Default::default()
    }
}

pub fn certificate(id: &str, title: &str, skills: &[&str]) -> Certificate {
    Certificate {
        id: id.to_string(),
        title: title.to_string(),
        issuer: "Example Academy".to_string(),
        category: "cloud".to_string(),
        skills: skills.iter().map(ToString::to_string).collect(),
        visible: true,
        ..Default::default()
    }
}

pub fn manual_skill(id: &str, name: &str, category: &str) -> Skill {
    Skill {
        id: id.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        visible: true,
        ..Default::default()
    }
}

/// Two projects, one certificate, and two manual skills
pub fn sample_bundle() -> ContentBundle {
    ContentBundle {
        about: About {
            name: "Sam Doe".to_string(),
            headline: "Engineer".to_string(),
            ..Default::default()
        },
        projects: vec![
            project("A", "Alpha", &["Rust", "Docker"]),
            project("B", "Beta", &["Go"]),
        ],
        certificates: vec![certificate("C", "Cloud Practitioner", &["AWS"])],
        skills: vec![
            manual_skill("s1", "Rust", "languages"),
            manual_skill("s2", "Kubernetes", "tools"),
        ],
        configuration: SiteConfig {
            site_title: "Portfolio".to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Store loaded from `bundle`, with its mock api and in-memory overrides
pub async fn loaded_store(bundle: ContentBundle) -> TestResult<(Arc<MockContentApi>, ContentStore)> {
    let api = Arc::new(MockContentApi::new(bundle));
    let store = ContentStore::new(api.clone(), Arc::new(InMemoryOverrideStore::default()));
    store.refresh().await?;
    api.clear_calls();
    Ok((api, store))
}

pub fn project_ids(store: &ContentStore) -> Vec<String> {
    store.snapshot().projects.iter().map(|p| p.id.clone()).collect()
}
