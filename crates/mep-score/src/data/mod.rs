//! Term-scoped dataset files: where they live, how they decode, and the cache
//! that keeps them in memory between requests.

pub mod cache;
pub mod decode;
pub mod records;
pub mod resolver;

pub use cache::{CacheConfig, CacheError, CacheStats, SweeperHandle, TermDataCache};
pub use decode::{DecodeScope, TermDataset};
pub use records::{
    ActivityCounts, ActivityDataset, ActivityItem, ActivityItemsDataset, ActivityRecord,
    Attendance, MemberInfo, MepId, RoleCounts,
};
pub use resolver::{
    Candidate, ConsolidatedFile, LegacyTermDirectory, OptimizedTermFile, Resolution,
    ResolveError, ResolveStrategy, ResolverTier, TermDataResolver,
};

/// Logical name of the per-member activity summary dataset.
pub const ACTIVITY_DATASET: &str = "mep_activities";
