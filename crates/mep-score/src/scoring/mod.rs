//! Activity scoring: term statistics, per-activity points, role multiplier and
//! attendance penalty.

pub mod activity;
pub mod calculator;
pub mod config;
pub mod stats;

pub use activity::{ActivityKind, InstitutionalRole, ScoreCategory};
pub use calculator::{
    ActivityScore, AttendanceAdjustment, CategoryScores, RoleMultiplier, ScoreBreakdown,
    ScoreCalculator, ScoringMethod,
};
pub use config::{
    AttendancePolicy, FixedRates, RoleBonusTable, RoleTablePreset, ScoringConfig,
    ScoringConfigError,
};
pub use stats::{CategoryStats, Degeneracy, DegenerateStatistics, Placement, TermStatistics};
