use serde::Serialize;

use super::activity::{ActivityKind, InstitutionalRole, ScoreCategory};
use super::config::ScoringConfig;
use super::stats::{Placement, TermStatistics};
use crate::data::records::{ActivityRecord, Attendance, MemberInfo, MepId, RoleCounts};
use crate::terms::TermId;

/// How an activity's points were derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ScoringMethod {
    Outlier { placement: Placement },
    FixedRate { points_per_item: f64 },
}

/// Audit line for one activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityScore {
    pub activity: ActivityKind,
    pub category: ScoreCategory,
    pub count: u32,
    #[serde(flatten)]
    pub method: ScoringMethod,
    pub points: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CategoryScores {
    pub legislative_production: f64,
    pub control_transparency: f64,
    pub engagement_presence: f64,
}

impl CategoryScores {
    pub fn get(&self, category: ScoreCategory) -> f64 {
        match category {
            ScoreCategory::LegislativeProduction => self.legislative_production,
            ScoreCategory::ControlTransparency => self.control_transparency,
            ScoreCategory::EngagementPresence => self.engagement_presence,
        }
    }

    fn add(&mut self, category: ScoreCategory, points: f64) {
        match category {
            ScoreCategory::LegislativeProduction => self.legislative_production += points,
            ScoreCategory::ControlTransparency => self.control_transparency += points,
            ScoreCategory::EngagementPresence => self.engagement_presence += points,
        }
    }

    pub fn total(&self) -> f64 {
        self.legislative_production + self.control_transparency + self.engagement_presence
    }
}

/// The single role bonus applied, if any.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoleMultiplier {
    pub role: Option<InstitutionalRole>,
    pub bonus: f64,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttendanceAdjustment {
    pub attended: u32,
    pub total: u32,
    /// Absent when no votes were recorded.
    pub rate: Option<f64>,
    pub penalty: f64,
    pub exempt: bool,
}

/// Full, auditable score for one member in one term.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub mep_id: MepId,
    pub term: TermId,
    #[serde(flatten)]
    pub member: MemberInfo,
    pub categories: CategoryScores,
    pub base_score: f64,
    pub roles: RoleMultiplier,
    pub attendance: AttendanceAdjustment,
    pub final_score: f64,
    pub activities: Vec<ActivityScore>,
}

/// Applies a [`ScoringConfig`] to activity records.
#[derive(Debug, Clone, Default)]
pub struct ScoreCalculator {
    config: ScoringConfig,
}

impl ScoreCalculator {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Points for an outlier-scored count: zero below the lower fence, the
    /// maximum above the upper fence, `log2(1 + normalized) * max` between.
    pub fn outlier_points(&self, placement: Placement) -> f64 {
        let max = self.config.outlier_max_points;
        match placement {
            Placement::BelowRange => 0.0,
            Placement::AboveRange => max,
            Placement::Normal { normalized } => (1.0 + normalized.clamp(0.0, 1.0)).log2() * max,
        }
    }

    pub fn activity_score(
        &self,
        kind: ActivityKind,
        count: u32,
        statistics: &TermStatistics,
    ) -> ActivityScore {
        let (method, points) = match self.config.fixed_rates.rate(kind) {
            Some(rate) => (
                ScoringMethod::FixedRate {
                    points_per_item: rate,
                },
                f64::from(count) * rate,
            ),
            None => {
                let placement = statistics
                    .get(kind)
                    .map(|stats| stats.placement(f64::from(count)))
                    .unwrap_or(Placement::Normal { normalized: 0.0 });
                (
                    ScoringMethod::Outlier { placement },
                    self.outlier_points(placement),
                )
            }
        };

        ActivityScore {
            activity: kind,
            category: kind.category(),
            count,
            method,
            points,
        }
    }

    /// Highest bonus among the roles held; on equal bonuses the higher-ranked role wins.
    pub fn role_multiplier(&self, roles: &RoleCounts) -> RoleMultiplier {
        let table = &self.config.role_bonuses;
        let best = roles.held().fold(None, |best: Option<(InstitutionalRole, f64)>, role| {
            let bonus = table.bonus(role);
            match best {
                Some((_, current)) if current >= bonus => best,
                _ => Some((role, bonus)),
            }
        });

        match best {
            Some((role, bonus)) => RoleMultiplier {
                role: Some(role),
                bonus,
                multiplier: 1.0 + bonus,
            },
            None => RoleMultiplier {
                role: None,
                bonus: 0.0,
                multiplier: 1.0,
            },
        }
    }

    pub fn attendance_adjustment(
        &self,
        attendance: &Attendance,
        roles: &RoleCounts,
    ) -> AttendanceAdjustment {
        let policy = &self.config.attendance;
        let exempt = policy.exempt_presiding_officers
            && roles.held().any(InstitutionalRole::is_presiding_officer);
        let rate = attendance.rate();
        let penalty = match rate {
            _ if exempt => 1.0,
            None => 1.0,
            Some(rate) => policy.penalty_for_rate(rate),
        };

        AttendanceAdjustment {
            attended: attendance.attended,
            total: attendance.total,
            rate,
            penalty,
            exempt,
        }
    }

    /// Score one record against statistics computed for the same term.
    pub fn score(&self, record: &ActivityRecord, statistics: &TermStatistics) -> ScoreBreakdown {
        let activities: Vec<ActivityScore> = ActivityKind::ALL
            .into_iter()
            .map(|kind| self.activity_score(kind, record.activities.get(kind), statistics))
            .collect();

        let mut categories = CategoryScores::default();
        for line in &activities {
            categories.add(line.category, line.points);
        }

        let base_score = categories.total();
        let roles = self.role_multiplier(&record.roles);
        let attendance = self.attendance_adjustment(&record.attendance, &record.roles);
        let final_score = (base_score * roles.multiplier * attendance.penalty).max(0.0);

        ScoreBreakdown {
            mep_id: record.mep_id.clone(),
            term: record.term,
            member: record.member.clone(),
            categories,
            base_score,
            roles,
            attendance,
            final_score,
            activities,
        }
    }
}
