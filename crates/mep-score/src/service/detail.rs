use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::aggregator::ScoringError;
use crate::data::records::ActivityItem;
use crate::scoring::{ActivityKind, ScoreCategory};

pub const DEFAULT_PAGE_LIMIT: usize = 50;
pub const MAX_PAGE_LIMIT: usize = 500;

/// Which raw items to list: one activity, or every activity of a score category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailSelector {
    Activity(ActivityKind),
    Category(ScoreCategory),
}

impl DetailSelector {
    pub fn activities(self) -> Vec<ActivityKind> {
        match self {
            DetailSelector::Activity(kind) => vec![kind],
            DetailSelector::Category(category) => category.activities(),
        }
    }
}

impl FromStr for DetailSelector {
    type Err = ScoringError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if let Ok(kind) = value.parse::<ActivityKind>() {
            return Ok(Self::Activity(kind));
        }
        value
            .parse::<ScoreCategory>()
            .map(Self::Category)
            .map_err(ScoringError::UnknownCategory)
    }
}

/// Offset/limit window; `limit` defaults to [`DEFAULT_PAGE_LIMIT`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl PageRequest {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }

    pub fn effective_limit(&self) -> Result<usize, ScoringError> {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(ScoringError::InvalidPage {
                limit,
                max: MAX_PAGE_LIMIT,
            });
        }
        Ok(limit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

/// A raw item tagged with the activity it counts towards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailItem {
    pub activity: ActivityKind,
    #[serde(flatten)]
    pub item: ActivityItem,
}

/// Newest first; undated items last.
pub(crate) fn newest_first(a: &ActivityItem, b: &ActivityItem) -> Ordering {
    match (a.date, b.date) {
        (Some(left), Some(right)) => right.cmp(&left),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn item(date: Option<(i32, u32, u32)>) -> ActivityItem {
        ActivityItem {
            date: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            title: None,
            reference: None,
            url: None,
            extra: Default::default(),
        }
    }

    #[test]
    fn selector_accepts_activities_and_categories() {
        assert_eq!(
            "speeches".parse::<DetailSelector>().expect("activity"),
            DetailSelector::Activity(ActivityKind::Speeches)
        );
        let category = "control-transparency"
            .parse::<DetailSelector>()
            .expect("category");
        assert_eq!(category.activities().len(), 3);
        assert!(matches!(
            "votes".parse::<DetailSelector>(),
            Err(ScoringError::UnknownCategory(name)) if name == "votes"
        ));
    }

    #[test]
    fn page_limits_are_bounded() {
        assert_eq!(PageRequest::default().effective_limit().expect("default"), 50);
        assert_eq!(PageRequest::new(0, 500).effective_limit().expect("max"), 500);
        assert!(PageRequest::new(0, 0).effective_limit().is_err());
        assert!(PageRequest::new(0, 501).effective_limit().is_err());
    }

    #[test]
    fn undated_items_sort_last() {
        let mut items = vec![
            item(None),
            item(Some((2020, 1, 1))),
            item(Some((2021, 6, 30))),
        ];
        items.sort_by(newest_first);
        assert_eq!(items[0].date, NaiveDate::from_ymd_opt(2021, 6, 30));
        assert_eq!(items[2].date, None);
    }
}
