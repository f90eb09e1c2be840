use super::common::*;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use std::sync::Arc;
use tower::ServiceExt;

use crate::service::router::{category_detail_handler, RankingQuery};
use crate::service::PageRequest;

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request builds")
}

#[tokio::test]
async fn score_route_returns_breakdown() {
    let fixture = fixture();
    let response = fixture
        .router()
        .oneshot(get("/api/v1/terms/9/meps/8/score"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["mep_id"], "8");
    assert_eq!(body["term"], 9);
    assert_eq!(body["name"], "Hanna");
    assert_eq!(body["roles"]["role"], "committee_chair");
    assert_eq!(body["activities"].as_array().map(Vec::len), Some(10));
    let amendments = body["activities"]
        .as_array()
        .and_then(|lines| lines.iter().find(|line| line["activity"] == "amendments"))
        .expect("amendments line");
    assert_eq!(amendments["method"], "outlier");
    assert_eq!(amendments["placement"]["range"], "above_range");
}

#[tokio::test]
async fn unknown_member_is_not_found() {
    let fixture = fixture();
    let response = fixture
        .router()
        .oneshot(get("/api/v1/terms/9/meps/999/score"))
        .await
        .expect("router responds");
    assert_error(response, StatusCode::NOT_FOUND, "mep_not_found").await;
}

#[tokio::test]
async fn unknown_term_is_not_found() {
    let fixture = fixture();
    let response = fixture
        .router()
        .oneshot(get("/api/v1/terms/2/scores"))
        .await
        .expect("router responds");
    assert_error(response, StatusCode::NOT_FOUND, "unknown_term").await;
}

#[tokio::test]
async fn missing_dataset_is_service_unavailable() {
    let fixture = fixture();
    let response = fixture
        .router()
        .oneshot(get("/api/v1/terms/10/scores"))
        .await
        .expect("router responds");
    assert_error(response, StatusCode::SERVICE_UNAVAILABLE, "dataset_unavailable").await;
}

#[tokio::test]
async fn malformed_dataset_is_internal_error() {
    let fixture = fixture();
    std::fs::write(fixture.path("mep_activities_term9.json"), "{\"1\": [").expect("corrupt");

    let response = fixture
        .router()
        .oneshot(get("/api/v1/terms/9/scores"))
        .await
        .expect("router responds");
    assert_error(response, StatusCode::INTERNAL_SERVER_ERROR, "parse_failure").await;
}

#[tokio::test]
async fn scores_route_honours_top() {
    let fixture = fixture();
    let response = fixture
        .router()
        .oneshot(get("/api/v1/terms/9/scores?top=3"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["members"], 8);
    let scores = body["scores"].as_array().expect("scores array");
    assert_eq!(scores.len(), 3);
    assert_eq!(scores[0]["rank"], 1);
    assert_eq!(scores[0]["mep_id"], "8");
}

#[tokio::test]
async fn statistics_route_exposes_fences() {
    let fixture = fixture();
    let response = fixture
        .router()
        .oneshot(get("/api/v1/terms/9/statistics"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let amendments = &body["activities"]["amendments"];
    assert_eq!(amendments["q1"], 3.75);
    assert_eq!(amendments["q3"], 16.25);
    assert_eq!(amendments["upper_bound"], 35.0);
    assert!(amendments.get("degeneracy").is_none());
    assert_eq!(body["activities"]["speeches"]["degeneracy"], "zero_clean_range");
}

#[tokio::test]
async fn activities_route_pages_items() {
    let fixture = fixture();
    let response = fixture
        .router()
        .oneshot(get(
            "/api/v1/terms/9/meps/2/activities/speeches?offset=1&limit=1",
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["offset"], 1);
    assert_eq!(body["limit"], 1);
    assert_eq!(body["items"][0]["title"], "Budget debate");
    assert_eq!(body["items"][0]["activity"], "speeches");
}

#[tokio::test]
async fn activities_route_rejects_unknown_categories() {
    let fixture = fixture();
    let response = fixture
        .router()
        .oneshot(get("/api/v1/terms/9/meps/2/activities/votes"))
        .await
        .expect("router responds");
    assert_error(response, StatusCode::BAD_REQUEST, "unknown_category").await;
}

#[tokio::test]
async fn oversized_pages_are_rejected() {
    let fixture = fixture();
    let response = category_detail_handler(
        State(Arc::clone(&fixture.service)),
        Ok(Path((9, "2".to_string(), "speeches".to_string()))),
        Ok(Query(PageRequest::new(0, 1_000))),
    )
    .await
    .into_response();
    assert_error(response, StatusCode::BAD_REQUEST, "invalid_page").await;
}

#[tokio::test]
async fn malformed_path_and_query_values_get_structured_errors() {
    let fixture = fixture();

    let response = fixture
        .router()
        .oneshot(get("/api/v1/terms/ninth/meps/2/score"))
        .await
        .expect("router responds");
    assert_error(response, StatusCode::BAD_REQUEST, "invalid_request").await;

    let response = fixture
        .router()
        .oneshot(get("/api/v1/terms/9/scores?top=all"))
        .await
        .expect("router responds");
    assert_error(response, StatusCode::BAD_REQUEST, "invalid_request").await;

    let response = fixture
        .router()
        .oneshot(get("/api/v1/terms/9/meps/2/activities/speeches?limit=-1"))
        .await
        .expect("router responds");
    assert_error(response, StatusCode::BAD_REQUEST, "invalid_request").await;
}

#[tokio::test]
async fn terms_route_lists_the_calendar() {
    let fixture = fixture();
    let response = fixture
        .router()
        .oneshot(get("/api/v1/terms"))
        .await
        .expect("router responds");

    let body = body_json(response).await;
    assert_eq!(body["latest"], 10);
    let terms = body["terms"].as_array().expect("terms array");
    assert_eq!(terms.len(), 3);
    assert_eq!(terms[0]["label"], "8th term");
    assert_eq!(terms[2]["end"], serde_json::Value::Null);
}

#[tokio::test]
async fn cache_route_reports_counters() {
    let fixture = fixture();
    let router = fixture.router();
    router
        .clone()
        .oneshot(get("/api/v1/terms/9/meps/1/score"))
        .await
        .expect("warm cache");

    let response = router
        .oneshot(get("/api/v1/cache"))
        .await
        .expect("router responds");
    let body = body_json(response).await;
    assert_eq!(body["activities"]["loads"], 1);
    assert_eq!(body["activities"]["resident"], 1);
    assert_eq!(body["items"]["loads"], 0);
}

#[test]
fn ranking_query_defaults_to_everything() {
    assert_eq!(RankingQuery::default().top, None);
}
