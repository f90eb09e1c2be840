use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Tracked parliamentary activity. Each kind also names its per-activity item dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Speeches,
    Amendments,
    WrittenQuestions,
    OralQuestions,
    Motions,
    Explanations,
    ReportsRapporteur,
    ReportsShadow,
    OpinionsRapporteur,
    OpinionsShadow,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 10] = [
        ActivityKind::Speeches,
        ActivityKind::Amendments,
        ActivityKind::WrittenQuestions,
        ActivityKind::OralQuestions,
        ActivityKind::Motions,
        ActivityKind::Explanations,
        ActivityKind::ReportsRapporteur,
        ActivityKind::ReportsShadow,
        ActivityKind::OpinionsRapporteur,
        ActivityKind::OpinionsShadow,
    ];

    /// Activities scored against the term distribution rather than at a fixed rate.
    pub const OUTLIER_SCORED: [ActivityKind; 6] = [
        ActivityKind::Amendments,
        ActivityKind::WrittenQuestions,
        ActivityKind::OralQuestions,
        ActivityKind::Explanations,
        ActivityKind::Speeches,
        ActivityKind::Motions,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::Speeches => "speeches",
            ActivityKind::Amendments => "amendments",
            ActivityKind::WrittenQuestions => "written_questions",
            ActivityKind::OralQuestions => "oral_questions",
            ActivityKind::Motions => "motions",
            ActivityKind::Explanations => "explanations",
            ActivityKind::ReportsRapporteur => "reports_rapporteur",
            ActivityKind::ReportsShadow => "reports_shadow",
            ActivityKind::OpinionsRapporteur => "opinions_rapporteur",
            ActivityKind::OpinionsShadow => "opinions_shadow",
        }
    }

    /// Logical dataset holding the raw items behind this activity's count.
    pub fn dataset_name(self) -> &'static str {
        self.as_str()
    }

    pub fn is_outlier_scored(self) -> bool {
        Self::OUTLIER_SCORED.contains(&self)
    }

    pub fn category(self) -> ScoreCategory {
        match self {
            ActivityKind::Amendments
            | ActivityKind::ReportsRapporteur
            | ActivityKind::ReportsShadow
            | ActivityKind::OpinionsRapporteur
            | ActivityKind::OpinionsShadow => ScoreCategory::LegislativeProduction,
            ActivityKind::WrittenQuestions
            | ActivityKind::OralQuestions
            | ActivityKind::Explanations => ScoreCategory::ControlTransparency,
            ActivityKind::Speeches | ActivityKind::Motions => ScoreCategory::EngagementPresence,
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| value.to_string())
    }
}

/// Score categories shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCategory {
    LegislativeProduction,
    ControlTransparency,
    EngagementPresence,
}

impl ScoreCategory {
    pub const ALL: [ScoreCategory; 3] = [
        ScoreCategory::LegislativeProduction,
        ScoreCategory::ControlTransparency,
        ScoreCategory::EngagementPresence,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScoreCategory::LegislativeProduction => "legislative_production",
            ScoreCategory::ControlTransparency => "control_transparency",
            ScoreCategory::EngagementPresence => "engagement_presence",
        }
    }

    pub fn activities(self) -> Vec<ActivityKind> {
        ActivityKind::ALL
            .into_iter()
            .filter(|kind| kind.category() == self)
            .collect()
    }
}

impl fmt::Display for ScoreCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoreCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| value.to_string())
    }
}

/// Leadership roles that earn a bonus, listed from highest to lowest rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstitutionalRole {
    EpPresident,
    EpVicePresident,
    CommitteeChair,
    Quaestor,
    CommitteeViceChair,
    DelegationChair,
    DelegationViceChair,
}

impl InstitutionalRole {
    pub const RANKED: [InstitutionalRole; 7] = [
        InstitutionalRole::EpPresident,
        InstitutionalRole::EpVicePresident,
        InstitutionalRole::CommitteeChair,
        InstitutionalRole::Quaestor,
        InstitutionalRole::CommitteeViceChair,
        InstitutionalRole::DelegationChair,
        InstitutionalRole::DelegationViceChair,
    ];

    /// Presiding officers chair plenary sessions and structurally do not vote.
    pub fn is_presiding_officer(self) -> bool {
        matches!(
            self,
            InstitutionalRole::EpPresident | InstitutionalRole::EpVicePresident
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            InstitutionalRole::EpPresident => "EP President",
            InstitutionalRole::EpVicePresident => "EP Vice-President",
            InstitutionalRole::CommitteeChair => "Committee Chair",
            InstitutionalRole::Quaestor => "Quaestor",
            InstitutionalRole::CommitteeViceChair => "Committee Vice-Chair",
            InstitutionalRole::DelegationChair => "Delegation Chair",
            InstitutionalRole::DelegationViceChair => "Delegation Vice-Chair",
        }
    }
}
