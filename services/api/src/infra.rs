use metrics_exporter_prometheus::PrometheusHandle;
use mep_score::config::AppConfig;
use mep_score::data::TermDataResolver;
use mep_score::error::AppError;
use mep_score::service::ScoringService;
use mep_score::terms::TermCalendar;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Wire the resolver, caches and calculator from configuration.
pub(crate) fn build_service(config: &AppConfig) -> Result<Arc<ScoringService>, AppError> {
    let scoring = config.scoring.build()?;
    if !config.data.data_dir.is_dir() {
        tracing::warn!(
            data_dir = %config.data.data_dir.display(),
            "data directory does not exist yet; requests will report datasets as unavailable"
        );
    }

    let resolver = Arc::new(TermDataResolver::standard(&config.data.data_dir));
    Ok(Arc::new(ScoringService::new(
        TermCalendar::european_parliament(),
        resolver,
        config.data.cache.clone(),
        scoring,
    )))
}
