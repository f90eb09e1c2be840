//! Score aggregation over cached term data, and the HTTP surface for it.

pub mod aggregator;
pub mod detail;
pub mod router;

#[cfg(test)]
mod tests;

pub use aggregator::{
    CacheOverview, MaintenanceHandle, RankedScore, ScoringError, ScoringService, TermScores,
};
pub use detail::{
    DetailItem, DetailSelector, Page, PageRequest, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT,
};
pub use router::scoring_router;
