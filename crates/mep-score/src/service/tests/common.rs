use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::http::StatusCode;
use axum::response::Response;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::data::cache::CacheConfig;
use crate::data::resolver::TermDataResolver;
use crate::scoring::ScoringConfig;
use crate::service::{scoring_router, ScoringService};
use crate::terms::TermCalendar;

pub(super) struct Fixture {
    pub(super) dir: TempDir,
    pub(super) service: Arc<ScoringService>,
}

impl Fixture {
    pub(super) fn router(&self) -> axum::Router {
        scoring_router(Arc::clone(&self.service))
    }

    pub(super) fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }
}

pub(super) fn cache_config() -> CacheConfig {
    CacheConfig {
        ttl: Duration::from_secs(60),
        sweep_interval: Duration::from_secs(60),
        max_entries: 8,
        load_timeout: Duration::from_secs(10),
    }
}

pub(super) fn service_for(dir: &Path) -> Arc<ScoringService> {
    Arc::new(ScoringService::new(
        TermCalendar::european_parliament(),
        Arc::new(TermDataResolver::standard(dir)),
        cache_config(),
        ScoringConfig::default(),
    ))
}

fn row(id: &str, name: &str, amendments: u32, attended: u32) -> Value {
    json!({
        "mep_id": id,
        "name": name,
        "country": "BE",
        "group": "EPP",
        "activities": {"amendments": amendments},
        "attendance": {"attended": attended, "total": 100}
    })
}

/// Eight members with amendments 0, 0, 5, 10, 10, 15, 20 and 200.
pub(super) fn activity_rows() -> Value {
    let mut rows = vec![
        row("1", "Ada", 0, 90),
        row("2", "Bram", 0, 90),
        row("3", "Chloe", 5, 50),
        row("4", "Dario", 10, 90),
        row("5", "Elin", 10, 10),
        row("6", "Femke", 15, 90),
        row("7", "Goran", 20, 90),
        row("8", "Hanna", 200, 90),
    ];
    rows[4]["roles"] = json!({"ep_vice_president": true});
    rows[7]["roles"] = json!({"committee_chair": 1, "delegation_vice_chair": 1});
    Value::Array(rows)
}

pub(super) fn write_json(dir: &Path, name: &str, value: &Value) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create dataset directory");
    }
    fs::write(&path, serde_json::to_vec(value).expect("serialize fixture")).expect("write fixture");
}

pub(super) fn set_mtime(path: &Path, offset_secs: u64) {
    let file = fs::OpenOptions::new()
        .write(true)
        .open(path)
        .expect("open for mtime");
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_650_000_000 + offset_secs))
        .expect("set mtime");
}

/// Term 9 activity summary plus item files for member 2.
pub(super) fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    write_json(dir.path(), "mep_activities_term9.json", &activity_rows());
    write_json(
        dir.path(),
        "speeches_term9.json",
        &json!([
            {"mep_id": 2, "date": "2020-05-01", "title": "Budget debate"},
            {"mep_id": 2, "date": "2022-11-15", "title": "Energy debate"},
            {"mep_id": 2, "title": "Undated intervention"},
            {"mep_id": 4, "date": "2021-01-01", "title": "Someone else"}
        ]),
    );
    write_json(
        dir.path(),
        "written_questions_term9.json",
        &json!({"2": [{"date": "2021-03-03", "title": "Question on rail", "reference": "E-001234/2021"}]}),
    );
    write_json(dir.path(), "oral_questions_term9.json", &json!([]));
    write_json(dir.path(), "explanations_term9.json", &json!([]));

    let service = service_for(dir.path());
    Fixture { dir, service }
}

pub(super) async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub(super) async fn assert_error(response: Response, status: StatusCode, kind: &str) {
    assert_eq!(response.status(), status);
    let body = body_json(response).await;
    assert_eq!(body["kind"], kind, "{body}");
    assert!(body["error"].as_str().is_some_and(|message| !message.is_empty()));
}
