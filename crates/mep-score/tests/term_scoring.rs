//! End-to-end scenarios driven through the public service and HTTP router:
//! legacy directory layouts, concurrent cold requests, configurable role
//! tables and expiring cache entries.

mod common {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use mep_score::data::{CacheConfig, TermDataResolver};
    use mep_score::scoring::ScoringConfig;
    use mep_score::service::ScoringService;
    use mep_score::terms::TermCalendar;
    use serde_json::{json, Value};

    pub(super) fn cache_config() -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(300),
            max_entries: 3,
            load_timeout: Duration::from_secs(10),
        }
    }

    pub(super) fn service(dir: &Path, scoring: ScoringConfig, cache: CacheConfig) -> Arc<ScoringService> {
        Arc::new(ScoringService::new(
            TermCalendar::european_parliament(),
            Arc::new(TermDataResolver::standard(dir)),
            cache,
            scoring,
        ))
    }

    /// Twelve members whose speech counts climb from 0 to 55, plus one chairing a committee.
    pub(super) fn members() -> Value {
        let mut rows: Vec<Value> = (0..12)
            .map(|index| {
                json!({
                    "activities": {"speeches": index * 5, "motions": index % 3},
                    "attendance": {"attended": 80, "total": 100}
                })
            })
            .collect();
        rows[3]["roles"] = json!({"committee_chair": true});
        let keyed: serde_json::Map<String, Value> = rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| (format!("{}", 1000 + index), row))
            .collect();
        Value::Object(keyed)
    }

    pub(super) fn write(dir: &Path, relative: &str, value: &Value) {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create directory");
        }
        fs::write(path, serde_json::to_vec(value).expect("serialize")).expect("write dataset");
    }
}

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use mep_score::data::MepId;
use mep_score::scoring::{RoleTablePreset, ScoringConfig};
use mep_score::service::scoring_router;
use mep_score::terms::TermId;
use tower::ServiceExt;

use common::*;

#[tokio::test]
async fn legacy_term_directories_serve_keyed_records() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "8th term/mep_activities.json", &members());
    let service = service(dir.path(), ScoringConfig::default(), cache_config());

    let ranking = service
        .get_term_scores(TermId(8))
        .await
        .expect("term 8 ranks");
    assert_eq!(ranking.members, 12);
    assert_eq!(ranking.scores[0].breakdown.mep_id, MepId::from("1011"));

    let quiet = service
        .get_score(&MepId::from("1000"), TermId(8))
        .await
        .expect("quietest member scores");
    assert_eq!(quiet.base_score, 0.0);
    assert_eq!(quiet.final_score, 0.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cold_requests_share_one_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "mep_activities_term9.json", &members());
    let service = service(dir.path(), ScoringConfig::default(), cache_config());

    let mut tasks = Vec::new();
    for index in 0..12 {
        let service = service.clone();
        tasks.push(tokio::spawn(async move {
            service
                .get_score(&MepId(format!("{}", 1000 + index)), TermId(9))
                .await
        }));
    }
    for task in tasks {
        task.await.expect("task joins").expect("member scores");
    }

    let stats = service.cache_stats().activities;
    assert_eq!(stats.loads, 1);
    assert_eq!(stats.hits + stats.misses, 12);
    assert_eq!(service.statistics_runs(), 1);
}

#[tokio::test]
async fn alternate_role_table_lowers_committee_chair_bonus() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "mep_activities_term9.json", &members());
    let chair = MepId::from("1003");

    let primary = service(dir.path(), ScoringConfig::default(), cache_config())
        .get_score(&chair, TermId(9))
        .await
        .expect("primary score");
    let alternate = service(
        dir.path(),
        ScoringConfig::with_preset(RoleTablePreset::Alternate),
        cache_config(),
    )
    .get_score(&chair, TermId(9))
    .await
    .expect("alternate score");

    assert_eq!(primary.base_score, alternate.base_score);
    assert!((primary.roles.multiplier - 1.6).abs() < 1e-12);
    assert!((alternate.roles.multiplier - 1.15).abs() < 1e-12);
    assert!(primary.final_score > alternate.final_score);
}

#[tokio::test]
async fn expired_entries_are_reloaded_through_the_router() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "mep_activities_term9.json", &members());
    let mut cache = cache_config();
    cache.ttl = Duration::from_millis(40);
    let service = service(dir.path(), ScoringConfig::default(), cache);
    let router = scoring_router(service.clone());

    for _ in 0..2 {
        let response = router
            .clone()
            .oneshot(
                Request::get("/api/v1/terms/9/meps/1005/score")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
        tokio::time::sleep(Duration::from_millis(120)).await;
    }

    assert_eq!(service.cache_stats().activities.loads, 2);
}
