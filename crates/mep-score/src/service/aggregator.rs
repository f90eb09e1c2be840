use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;

use super::detail::{newest_first, DetailItem, DetailSelector, Page, PageRequest};
use crate::data::cache::{CacheConfig, CacheError, CacheStats, SweeperHandle, TermDataCache};
use crate::data::records::{ActivityDataset, ActivityItem, ActivityItemsDataset, MepId};
use crate::data::resolver::TermDataResolver;
use crate::data::ACTIVITY_DATASET;
use crate::scoring::{
    ActivityKind, DegenerateStatistics, ScoreBreakdown, ScoreCalculator, ScoreCategory,
    ScoringConfig, TermStatistics,
};
use crate::terms::{Term, TermCalendar, TermId};

/// One member's position in a term ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedScore {
    pub rank: usize,
    #[serde(flatten)]
    pub breakdown: ScoreBreakdown,
}

/// Every member of a term, best first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermScores {
    pub term: TermId,
    pub members: usize,
    pub notices: Vec<DegenerateStatistics>,
    pub scores: Vec<RankedScore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheOverview {
    pub activities: CacheStats,
    pub items: CacheStats,
}

struct MemoizedStatistics {
    source: Weak<ActivityDataset>,
    statistics: Arc<TermStatistics>,
}

/// Loads term data through the caches, computes term statistics once per
/// dataset version, and scores members against them.
pub struct ScoringService {
    calendar: TermCalendar,
    activities: TermDataCache<ActivityDataset>,
    items: TermDataCache<ActivityItemsDataset>,
    calculator: ScoreCalculator,
    statistics: Mutex<HashMap<TermId, MemoizedStatistics>>,
    statistics_runs: AtomicU64,
}

impl ScoringService {
    pub fn new(
        calendar: TermCalendar,
        resolver: Arc<TermDataResolver>,
        cache: CacheConfig,
        scoring: ScoringConfig,
    ) -> Self {
        // A category request must be able to keep every one of its item datasets resident.
        let items = CacheConfig {
            max_entries: cache.max_entries.max(widest_category()),
            ..cache.clone()
        };
        Self {
            calendar,
            activities: TermDataCache::new("activities", Arc::clone(&resolver), cache),
            items: TermDataCache::new("activity_items", resolver, items),
            calculator: ScoreCalculator::new(scoring),
            statistics: Mutex::new(HashMap::new()),
            statistics_runs: AtomicU64::new(0),
        }
    }

    pub fn calendar(&self) -> &TermCalendar {
        &self.calendar
    }

    pub fn calculator(&self) -> &ScoreCalculator {
        &self.calculator
    }

    pub fn term(&self, id: TermId) -> Result<&Term, ScoringError> {
        self.calendar.get(id).ok_or(ScoringError::UnknownTerm(id))
    }

    fn default_timeout(&self) -> Duration {
        self.activities.config().load_timeout
    }

    async fn load_activities(
        &self,
        term: &Term,
        timeout: Duration,
    ) -> Result<Arc<ActivityDataset>, ScoringError> {
        Ok(self
            .activities
            .get_with_timeout(ACTIVITY_DATASET, term, timeout)
            .await?)
    }

    /// Score a single member.
    pub async fn get_score(
        &self,
        mep_id: &MepId,
        term: TermId,
    ) -> Result<ScoreBreakdown, ScoringError> {
        self.get_score_with_timeout(mep_id, term, self.default_timeout())
            .await
    }

    /// [`get_score`](Self::get_score) waiting at most `timeout` for term data.
    pub async fn get_score_with_timeout(
        &self,
        mep_id: &MepId,
        term: TermId,
        timeout: Duration,
    ) -> Result<ScoreBreakdown, ScoringError> {
        let term = self.term(term)?;
        let dataset = self.load_activities(term, timeout).await?;
        let record = dataset
            .get(mep_id)
            .ok_or_else(|| ScoringError::MepNotFound {
                mep_id: mep_id.clone(),
                term: term.id,
            })?;
        let statistics = self.statistics_for(&dataset);
        Ok(self.calculator.score(record, &statistics))
    }

    /// Score and rank every member of a term.
    pub async fn get_term_scores(&self, term: TermId) -> Result<TermScores, ScoringError> {
        self.get_term_scores_with_timeout(term, self.default_timeout())
            .await
    }

    pub async fn get_term_scores_with_timeout(
        &self,
        term: TermId,
        timeout: Duration,
    ) -> Result<TermScores, ScoringError> {
        let term = self.term(term)?;
        let dataset = self.load_activities(term, timeout).await?;
        let statistics = self.statistics_for(&dataset);
        let calculator = &self.calculator;

        let started = Instant::now();
        let mut scores: Vec<ScoreBreakdown> = dataset
            .records
            .par_iter()
            .map(|(_, record)| calculator.score(record, &statistics))
            .collect();
        scores.sort_by(|a, b| {
            b.final_score
                .total_cmp(&a.final_score)
                .then_with(|| a.mep_id.cmp(&b.mep_id))
        });

        tracing::debug!(
            term = %term.id,
            members = scores.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scored term"
        );

        Ok(TermScores {
            term: term.id,
            members: scores.len(),
            notices: statistics.notices(),
            scores: scores
                .into_iter()
                .enumerate()
                .map(|(index, breakdown)| RankedScore {
                    rank: index + 1,
                    breakdown,
                })
                .collect(),
        })
    }

    pub async fn get_term_statistics(
        &self,
        term: TermId,
    ) -> Result<Arc<TermStatistics>, ScoringError> {
        let term = self.term(term)?;
        let dataset = self.load_activities(term, self.default_timeout()).await?;
        Ok(self.statistics_for(&dataset))
    }

    /// Page through the raw items behind one activity or one score category.
    pub async fn get_category_detail(
        &self,
        mep_id: &MepId,
        term: TermId,
        selector: DetailSelector,
        page: PageRequest,
    ) -> Result<Page<DetailItem>, ScoringError> {
        self.get_category_detail_with_timeout(mep_id, term, selector, page, self.default_timeout())
            .await
    }

    /// `timeout` bounds each dataset load of the request.
    pub async fn get_category_detail_with_timeout(
        &self,
        mep_id: &MepId,
        term: TermId,
        selector: DetailSelector,
        page: PageRequest,
        timeout: Duration,
    ) -> Result<Page<DetailItem>, ScoringError> {
        let term = self.term(term)?;
        let limit = page.effective_limit()?;

        let mut sources = Vec::new();
        for kind in selector.activities() {
            let dataset = self
                .items
                .get_with_timeout(kind.dataset_name(), term, timeout)
                .await?;
            sources.push((kind, dataset));
        }

        let mut entries: Vec<(ActivityKind, &ActivityItem)> = sources
            .iter()
            .flat_map(|(kind, dataset)| {
                dataset
                    .items_for(mep_id)
                    .iter()
                    .map(move |item| (*kind, item))
            })
            .collect();

        if entries.is_empty() {
            self.ensure_member(mep_id, term, timeout).await?;
        }

        entries.sort_by(|(_, a), (_, b)| newest_first(a, b));
        let total = entries.len();
        let items = entries
            .into_iter()
            .skip(page.offset)
            .take(limit)
            .map(|(activity, item)| DetailItem {
                activity,
                item: item.clone(),
            })
            .collect();

        Ok(Page {
            items,
            total,
            offset: page.offset,
            limit,
        })
    }

    /// Distinguishes an unknown member from one with no items. An unavailable
    /// summary dataset is not treated as proof of absence.
    async fn ensure_member(
        &self,
        mep_id: &MepId,
        term: &Term,
        timeout: Duration,
    ) -> Result<(), ScoringError> {
        match self.load_activities(term, timeout).await {
            Ok(dataset) if dataset.get(mep_id).is_none() => Err(ScoringError::MepNotFound {
                mep_id: mep_id.clone(),
                term: term.id,
            }),
            _ => Ok(()),
        }
    }

    pub fn cache_stats(&self) -> CacheOverview {
        CacheOverview {
            activities: self.activities.stats(),
            items: self.items.stats(),
        }
    }

    /// How many times term statistics have been computed.
    pub fn statistics_runs(&self) -> u64 {
        self.statistics_runs.load(Ordering::Relaxed)
    }

    /// Start the cache sweepers; stop them with [`MaintenanceHandle::shutdown`].
    pub fn start_maintenance(&self) -> MaintenanceHandle {
        MaintenanceHandle {
            sweepers: vec![self.activities.spawn_sweeper(), self.items.spawn_sweeper()],
        }
    }

    fn statistics_for(&self, dataset: &Arc<ActivityDataset>) -> Arc<TermStatistics> {
        let mut memo = lock(&self.statistics);
        if let Some(entry) = memo.get(&dataset.term()) {
            let current = entry
                .source
                .upgrade()
                .is_some_and(|source| Arc::ptr_eq(&source, dataset));
            if current {
                return Arc::clone(&entry.statistics);
            }
        }

        let statistics = Arc::new(TermStatistics::compute(
            dataset,
            self.calculator.config().iqr_multiplier,
        ));
        self.statistics_runs.fetch_add(1, Ordering::Relaxed);
        for notice in statistics.notices() {
            tracing::warn!(
                term = %notice.term,
                activity = %notice.activity,
                reason = ?notice.reason,
                "degenerate activity statistics; scoring with fallback range"
            );
        }

        memo.insert(
            dataset.term(),
            MemoizedStatistics {
                source: Arc::downgrade(dataset),
                statistics: Arc::clone(&statistics),
            },
        );
        statistics
    }
}

fn widest_category() -> usize {
    ScoreCategory::ALL
        .into_iter()
        .map(|category| category.activities().len())
        .max()
        .unwrap_or(1)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poison) => poison.into_inner(),
    }
}

/// Owns the background cache sweepers.
pub struct MaintenanceHandle {
    sweepers: Vec<SweeperHandle>,
}

impl MaintenanceHandle {
    pub async fn shutdown(self) {
        for sweeper in self.sweepers {
            sweeper.shutdown().await;
        }
    }
}

/// Error raised by the scoring service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoringError {
    #[error("term {0} is not a known legislative term")]
    UnknownTerm(TermId),
    #[error("MEP {mep_id} has no activity record for term {term}")]
    MepNotFound { mep_id: MepId, term: TermId },
    #[error(transparent)]
    Data(#[from] CacheError),
    #[error("`{0}` is neither an activity nor a score category")]
    UnknownCategory(String),
    #[error("page limit {limit} must be between 1 and {max}")]
    InvalidPage { limit: usize, max: usize },
}

impl ScoringError {
    /// Stable machine-readable label.
    pub fn kind(&self) -> &'static str {
        match self {
            ScoringError::UnknownTerm(_) => "unknown_term",
            ScoringError::MepNotFound { .. } => "mep_not_found",
            ScoringError::UnknownCategory(_) => "unknown_category",
            ScoringError::InvalidPage { .. } => "invalid_page",
            ScoringError::Data(err) => match err {
                CacheError::DatasetUnavailable { .. } => "dataset_unavailable",
                CacheError::InvalidDataset(_) => "invalid_dataset",
                CacheError::Unreadable { .. } => "dataset_unreadable",
                CacheError::ParseFailure { .. } => "parse_failure",
                CacheError::TimedOut { .. } => "load_timeout",
                CacheError::LoadAborted { .. } => "load_aborted",
            },
        }
    }
}
