use std::sync::Arc;

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::aggregator::{CacheOverview, ScoringService, TermScores};
use super::detail::{DetailItem, DetailSelector, Page, PageRequest};
use crate::data::records::MepId;
use crate::error::AppError;
use crate::scoring::{ScoreBreakdown, TermStatistics};
use crate::terms::TermId;

/// Router builder exposing the scoring endpoints.
pub fn scoring_router(service: Arc<ScoringService>) -> Router {
    Router::new()
        .route("/api/v1/terms", get(terms_handler))
        .route("/api/v1/terms/{term}/scores", get(term_scores_handler))
        .route(
            "/api/v1/terms/{term}/statistics",
            get(term_statistics_handler),
        )
        .route(
            "/api/v1/terms/{term}/meps/{mep_id}/score",
            get(score_handler),
        )
        .route(
            "/api/v1/terms/{term}/meps/{mep_id}/activities/{category}",
            get(category_detail_handler),
        )
        .route("/api/v1/cache", get(cache_handler))
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RankingQuery {
    #[serde(default)]
    pub(crate) top: Option<usize>,
}

pub(crate) async fn terms_handler(
    State(service): State<Arc<ScoringService>>,
) -> Json<serde_json::Value> {
    let calendar = service.calendar();
    let terms: Vec<_> = calendar
        .terms()
        .iter()
        .map(|term| {
            json!({
                "id": term.id,
                "label": term.id.ordinal_label(),
                "start": term.start,
                "end": term.end,
            })
        })
        .collect();

    Json(json!({
        "terms": terms,
        "latest": calendar.latest().map(|term| term.id),
    }))
}

pub(crate) async fn term_scores_handler(
    State(service): State<Arc<ScoringService>>,
    path: Result<Path<u32>, PathRejection>,
    query: Result<Query<RankingQuery>, QueryRejection>,
) -> Result<Json<TermScores>, AppError> {
    let Path(term) = path?;
    let Query(query) = query?;
    let mut scores = service.get_term_scores(TermId(term)).await?;
    if let Some(top) = query.top {
        scores.scores.truncate(top);
    }
    Ok(Json(scores))
}

pub(crate) async fn term_statistics_handler(
    State(service): State<Arc<ScoringService>>,
    path: Result<Path<u32>, PathRejection>,
) -> Result<Json<TermStatistics>, AppError> {
    let Path(term) = path?;
    let statistics = service.get_term_statistics(TermId(term)).await?;
    Ok(Json(TermStatistics::clone(&statistics)))
}

pub(crate) async fn score_handler(
    State(service): State<Arc<ScoringService>>,
    path: Result<Path<(u32, String)>, PathRejection>,
) -> Result<Json<ScoreBreakdown>, AppError> {
    let Path((term, mep_id)) = path?;
    let breakdown = service
        .get_score(&MepId::from(mep_id.as_str()), TermId(term))
        .await?;
    Ok(Json(breakdown))
}

pub(crate) async fn category_detail_handler(
    State(service): State<Arc<ScoringService>>,
    path: Result<Path<(u32, String, String)>, PathRejection>,
    page: Result<Query<PageRequest>, QueryRejection>,
) -> Result<Json<Page<DetailItem>>, AppError> {
    let Path((term, mep_id, category)) = path?;
    let Query(page) = page?;
    let selector: DetailSelector = category.parse()?;
    let page = service
        .get_category_detail(&MepId::from(mep_id.as_str()), TermId(term), selector, page)
        .await?;
    Ok(Json(page))
}

pub(crate) async fn cache_handler(State(service): State<Arc<ScoringService>>) -> Json<CacheOverview> {
    Json(service.cache_stats())
}
