use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use crate::scoring::{ActivityKind, InstitutionalRole};
use crate::terms::TermId;

/// Identifier published by the parliament; numeric ids are kept in their decimal form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MepId(pub String);

impl MepId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MepId {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

impl<'de> Deserialize<'de> for MepId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MepIdVisitor;

        impl<'de> Visitor<'de> for MepIdVisitor {
            type Value = MepId;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an MEP id as a string or an integer")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<MepId, E> {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(E::invalid_value(de::Unexpected::Str(value), &self));
                }
                Ok(MepId(trimmed.to_string()))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<MepId, E> {
                Ok(MepId(value.to_string()))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<MepId, E> {
                if value < 0 {
                    return Err(E::invalid_value(de::Unexpected::Signed(value), &self));
                }
                Ok(MepId(value.to_string()))
            }
        }

        deserializer.deserialize_any(MepIdVisitor)
    }
}

/// Raw per-term activity counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityCounts {
    pub speeches: u32,
    pub amendments: u32,
    pub written_questions: u32,
    pub oral_questions: u32,
    pub motions: u32,
    pub explanations: u32,
    pub reports_rapporteur: u32,
    pub reports_shadow: u32,
    pub opinions_rapporteur: u32,
    pub opinions_shadow: u32,
}

impl ActivityCounts {
    pub fn get(&self, kind: ActivityKind) -> u32 {
        match kind {
            ActivityKind::Speeches => self.speeches,
            ActivityKind::Amendments => self.amendments,
            ActivityKind::WrittenQuestions => self.written_questions,
            ActivityKind::OralQuestions => self.oral_questions,
            ActivityKind::Motions => self.motions,
            ActivityKind::Explanations => self.explanations,
            ActivityKind::ReportsRapporteur => self.reports_rapporteur,
            ActivityKind::ReportsShadow => self.reports_shadow,
            ActivityKind::OpinionsRapporteur => self.opinions_rapporteur,
            ActivityKind::OpinionsShadow => self.opinions_shadow,
        }
    }
}

/// Role flags for the term. Upstream exports use either counts or booleans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleCounts {
    #[serde(deserialize_with = "count_or_flag")]
    pub committee_chair: u32,
    #[serde(deserialize_with = "count_or_flag")]
    pub committee_vice_chair: u32,
    #[serde(deserialize_with = "count_or_flag")]
    pub committee_member: u32,
    #[serde(deserialize_with = "count_or_flag")]
    pub committee_substitute: u32,
    #[serde(deserialize_with = "count_or_flag")]
    pub delegation_chair: u32,
    #[serde(deserialize_with = "count_or_flag")]
    pub delegation_vice_chair: u32,
    #[serde(deserialize_with = "count_or_flag")]
    pub delegation_member: u32,
    #[serde(deserialize_with = "count_or_flag")]
    pub delegation_substitute: u32,
    #[serde(deserialize_with = "count_or_flag")]
    pub ep_president: u32,
    #[serde(deserialize_with = "count_or_flag")]
    pub ep_vice_president: u32,
    #[serde(deserialize_with = "count_or_flag")]
    pub quaestor: u32,
}

impl RoleCounts {
    pub fn holds(&self, role: InstitutionalRole) -> bool {
        let count = match role {
            InstitutionalRole::EpPresident => self.ep_president,
            InstitutionalRole::EpVicePresident => self.ep_vice_president,
            InstitutionalRole::CommitteeChair => self.committee_chair,
            InstitutionalRole::Quaestor => self.quaestor,
            InstitutionalRole::CommitteeViceChair => self.committee_vice_chair,
            InstitutionalRole::DelegationChair => self.delegation_chair,
            InstitutionalRole::DelegationViceChair => self.delegation_vice_chair,
        };
        count > 0
    }

    pub fn held(&self) -> impl Iterator<Item = InstitutionalRole> + '_ {
        InstitutionalRole::RANKED
            .into_iter()
            .filter(|role| self.holds(*role))
    }
}

fn count_or_flag<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Count(u32),
        Flag(bool),
        Missing(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Count(count) => count,
        Raw::Flag(flag) => u32::from(flag),
        Raw::Missing(()) => 0,
    })
}

/// Roll-call participation for the term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attendance {
    pub attended: u32,
    pub total: u32,
}

impl Attendance {
    /// `None` when no roll-call votes were recorded.
    pub fn rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(f64::from(self.attended) / f64::from(self.total))
        }
    }
}

/// Descriptive member data carried through to score breakdowns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// One member's activity for one term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityRecord {
    pub mep_id: MepId,
    pub term: TermId,
    pub member: MemberInfo,
    pub activities: ActivityCounts,
    pub roles: RoleCounts,
    pub attendance: Attendance,
}

/// Wire shape of an activity row before the member id and term are settled.
#[derive(Debug, Deserialize)]
pub(crate) struct RawActivityRecord {
    #[serde(default)]
    pub(crate) mep_id: Option<MepId>,
    #[serde(default)]
    pub(crate) term: Option<TermId>,
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) country: Option<String>,
    #[serde(default)]
    pub(crate) group: Option<String>,
    #[serde(default)]
    pub(crate) activities: ActivityCounts,
    #[serde(default)]
    pub(crate) roles: RoleCounts,
    #[serde(default)]
    pub(crate) attendance: Attendance,
}

impl RawActivityRecord {
    pub(crate) fn into_record(self, mep_id: MepId, term: TermId) -> ActivityRecord {
        ActivityRecord {
            mep_id,
            term,
            member: MemberInfo {
                name: self.name,
                country: self.country,
                group: self.group,
            },
            activities: self.activities,
            roles: self.roles,
            attendance: self.attendance,
        }
    }
}

/// Every activity record of a term, indexed by member.
#[derive(Debug, Clone, Default)]
pub struct ActivityDataset {
    pub(crate) term: TermId,
    pub(crate) records: HashMap<MepId, ActivityRecord>,
}

impl ActivityDataset {
    pub fn from_records(term: TermId, records: impl IntoIterator<Item = ActivityRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.mep_id.clone(), record))
            .collect();
        Self { term, records }
    }

    pub fn term(&self) -> TermId {
        self.term
    }

    pub fn get(&self, mep_id: &MepId) -> Option<&ActivityRecord> {
        self.records.get(mep_id)
    }

    pub fn records(&self) -> impl Iterator<Item = &ActivityRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One raw item (a speech, an amendment...) contributing to an activity count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityItem {
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawActivityItem {
    #[serde(default)]
    pub(crate) mep_id: Option<MepId>,
    #[serde(flatten)]
    pub(crate) item: ActivityItem,
}

/// Accepts `YYYY-MM-DD` as well as timestamps that start with a date.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let day = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map(Some)
        .map_err(|err| de::Error::custom(format!("failed to parse '{raw}' as YYYY-MM-DD ({err})")))
}

/// Items of one activity for one term, indexed by member.
#[derive(Debug, Clone, Default)]
pub struct ActivityItemsDataset {
    pub(crate) term: TermId,
    pub(crate) items: HashMap<MepId, Vec<ActivityItem>>,
}

impl ActivityItemsDataset {
    pub fn term(&self) -> TermId {
        self.term
    }

    pub fn items_for(&self, mep_id: &MepId) -> &[ActivityItem] {
        self.items.get(mep_id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn member_count(&self) -> usize {
        self.items.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mep_id_accepts_numbers_and_strings() {
        let from_number: MepId = serde_json::from_value(json!(124810)).expect("number id");
        let from_string: MepId = serde_json::from_value(json!(" 124810 ")).expect("string id");
        assert_eq!(from_number, from_string);
        assert!(serde_json::from_value::<MepId>(json!("")).is_err());
        assert!(serde_json::from_value::<MepId>(json!(-4)).is_err());
    }

    #[test]
    fn role_flags_accept_counts_and_booleans() {
        let roles: RoleCounts = serde_json::from_value(json!({
            "committee_chair": true,
            "delegation_vice_chair": 2,
            "quaestor": false,
            "ep_president": null
        }))
        .expect("roles parse");
        assert!(roles.holds(InstitutionalRole::CommitteeChair));
        assert!(roles.holds(InstitutionalRole::DelegationViceChair));
        assert!(!roles.holds(InstitutionalRole::Quaestor));
        assert!(!roles.holds(InstitutionalRole::EpPresident));
        assert_eq!(
            roles.held().collect::<Vec<_>>(),
            vec![
                InstitutionalRole::CommitteeChair,
                InstitutionalRole::DelegationViceChair
            ]
        );
    }

    #[test]
    fn attendance_rate_is_absent_without_votes() {
        assert_eq!(Attendance::default().rate(), None);
        let attendance = Attendance {
            attended: 3,
            total: 4,
        };
        assert_eq!(attendance.rate(), Some(0.75));
    }

    #[test]
    fn empty_datasets_have_no_members() {
        let activities = ActivityDataset::default();
        assert!(activities.is_empty());
        assert_eq!(activities.term(), TermId::default());

        let items = ActivityItemsDataset::default();
        assert_eq!(items.member_count(), 0);
        assert!(items.items_for(&MepId::from("1")).is_empty());
    }

    #[test]
    fn item_dates_tolerate_timestamps() {
        let item: ActivityItem = serde_json::from_value(json!({
            "date": "2020-03-04T10:15:00Z",
            "title": "Plenary debate",
            "procedure": "2019/0123(COD)"
        }))
        .expect("item parses");
        assert_eq!(item.date, NaiveDate::from_ymd_opt(2020, 3, 4));
        assert_eq!(item.extra.get("procedure"), Some(&json!("2019/0123(COD)")));
    }
}
