use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::activity::{ActivityKind, InstitutionalRole};

/// Points per item for activities that are not scored against the term distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedRates {
    pub reports_rapporteur: f64,
    pub reports_shadow: f64,
    pub opinions_rapporteur: f64,
    pub opinions_shadow: f64,
}

impl Default for FixedRates {
    fn default() -> Self {
        Self {
            reports_rapporteur: 4.0,
            reports_shadow: 1.0,
            opinions_rapporteur: 1.0,
            opinions_shadow: 0.5,
        }
    }
}

impl FixedRates {
    /// `None` for outlier-scored activities.
    pub fn rate(&self, kind: ActivityKind) -> Option<f64> {
        match kind {
            ActivityKind::ReportsRapporteur => Some(self.reports_rapporteur),
            ActivityKind::ReportsShadow => Some(self.reports_shadow),
            ActivityKind::OpinionsRapporteur => Some(self.opinions_rapporteur),
            ActivityKind::OpinionsShadow => Some(self.opinions_shadow),
            _ => None,
        }
    }

    fn values(&self) -> [(&'static str, f64); 4] {
        [
            ("reports_rapporteur", self.reports_rapporteur),
            ("reports_shadow", self.reports_shadow),
            ("opinions_rapporteur", self.opinions_rapporteur),
            ("opinions_shadow", self.opinions_shadow),
        ]
    }
}

/// Bonus fraction per institutional role; `0.6` means +60%.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleBonusTable {
    pub ep_president: f64,
    pub ep_vice_president: f64,
    pub committee_chair: f64,
    pub quaestor: f64,
    pub committee_vice_chair: f64,
    pub delegation_chair: f64,
    pub delegation_vice_chair: f64,
}

impl RoleBonusTable {
    pub fn primary() -> Self {
        Self {
            ep_president: 1.0,
            ep_vice_president: 0.6,
            committee_chair: 0.6,
            quaestor: 0.35,
            committee_vice_chair: 0.3,
            delegation_chair: 0.2,
            delegation_vice_chair: 0.1,
        }
    }

    pub fn alternate() -> Self {
        Self {
            ep_president: 1.0,
            ep_vice_president: 0.25,
            committee_chair: 0.15,
            quaestor: 0.25,
            committee_vice_chair: 0.15,
            delegation_chair: 0.1,
            delegation_vice_chair: 0.075,
        }
    }

    pub fn bonus(&self, role: InstitutionalRole) -> f64 {
        match role {
            InstitutionalRole::EpPresident => self.ep_president,
            InstitutionalRole::EpVicePresident => self.ep_vice_president,
            InstitutionalRole::CommitteeChair => self.committee_chair,
            InstitutionalRole::Quaestor => self.quaestor,
            InstitutionalRole::CommitteeViceChair => self.committee_vice_chair,
            InstitutionalRole::DelegationChair => self.delegation_chair,
            InstitutionalRole::DelegationViceChair => self.delegation_vice_chair,
        }
    }
}

impl Default for RoleBonusTable {
    fn default() -> Self {
        Self::primary()
    }
}

/// Named role-bonus tables selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleTablePreset {
    #[default]
    Primary,
    Alternate,
}

impl RoleTablePreset {
    pub fn table(self) -> RoleBonusTable {
        match self {
            RoleTablePreset::Primary => RoleBonusTable::primary(),
            RoleTablePreset::Alternate => RoleBonusTable::alternate(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoleTablePreset::Primary => "primary",
            RoleTablePreset::Alternate => "alternate",
        }
    }
}

impl fmt::Display for RoleTablePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleTablePreset {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "primary" => Ok(Self::Primary),
            "alternate" | "alt" => Ok(Self::Alternate),
            _ => Err(value.to_string()),
        }
    }
}

/// Attendance thresholds and the penalty applied below each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendancePolicy {
    pub full_credit_rate: f64,
    pub reduced_credit_rate: f64,
    pub reduced_penalty: f64,
    pub low_penalty: f64,
    pub exempt_presiding_officers: bool,
}

impl Default for AttendancePolicy {
    fn default() -> Self {
        Self {
            full_credit_rate: 0.75,
            reduced_credit_rate: 0.55,
            reduced_penalty: 0.75,
            low_penalty: 0.5,
            exempt_presiding_officers: true,
        }
    }
}

impl AttendancePolicy {
    pub fn penalty_for_rate(&self, rate: f64) -> f64 {
        if rate >= self.full_credit_rate {
            1.0
        } else if rate >= self.reduced_credit_rate {
            self.reduced_penalty
        } else {
            self.low_penalty
        }
    }
}

/// Every tunable of the scoring methodology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Points awarded at the top of the normal range and to high outliers.
    pub outlier_max_points: f64,
    /// Tukey fence multiplier applied to the IQR.
    pub iqr_multiplier: f64,
    pub fixed_rates: FixedRates,
    pub role_bonuses: RoleBonusTable,
    pub attendance: AttendancePolicy,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            outlier_max_points: 4.0,
            iqr_multiplier: 1.5,
            fixed_rates: FixedRates::default(),
            role_bonuses: RoleBonusTable::primary(),
            attendance: AttendancePolicy::default(),
        }
    }
}

impl ScoringConfig {
    pub fn with_preset(preset: RoleTablePreset) -> Self {
        Self {
            role_bonuses: preset.table(),
            ..Self::default()
        }
    }

    /// Read overrides from a JSON document. Omitted fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ScoringConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ScoringConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|source| ScoringConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ScoringConfigError> {
        let mut checks = vec![
            ("outlier_max_points", self.outlier_max_points),
            ("iqr_multiplier", self.iqr_multiplier),
            ("attendance.reduced_penalty", self.attendance.reduced_penalty),
            ("attendance.low_penalty", self.attendance.low_penalty),
        ];
        checks.extend(self.fixed_rates.values());
        checks.extend(
            InstitutionalRole::RANKED
                .into_iter()
                .map(|role| (role.label(), self.role_bonuses.bonus(role))),
        );

        if let Some((field, _)) = checks
            .into_iter()
            .find(|(_, value)| !value.is_finite() || *value < 0.0)
        {
            return Err(ScoringConfigError::Invalid(format!(
                "{field} must be a finite, non-negative number"
            )));
        }

        let policy = &self.attendance;
        if !(0.0..=1.0).contains(&policy.reduced_credit_rate)
            || !(0.0..=1.0).contains(&policy.full_credit_rate)
            || policy.reduced_credit_rate > policy.full_credit_rate
        {
            return Err(ScoringConfigError::Invalid(
                "attendance thresholds must lie in [0, 1] with reduced_credit_rate <= full_credit_rate"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringConfigError {
    #[error("unable to read scoring config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("scoring config {} is not valid JSON: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid scoring config: {0}")]
    Invalid(String),
}
