//! Legislative terms and the calendar that maps dates onto them.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Legislative term number (8, 9, 10...).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TermId(pub u32);

impl TermId {
    /// Label used by the legacy per-term directories, e.g. `8th term`.
    pub fn ordinal_label(self) -> String {
        let n = self.0;
        let suffix = match (n % 10, n % 100) {
            (_, 11..=13) => "th",
            (1, _) => "st",
            (2, _) => "nd",
            (3, _) => "rd",
            _ => "th",
        };
        format!("{n}{suffix} term")
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A term with an inclusive start date and an exclusive end date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Term {
    pub id: TermId,
    pub start: NaiveDate,
    /// `None` for the sitting term.
    pub end: Option<NaiveDate>,
}

impl Term {
    pub fn new(id: TermId, start: NaiveDate, end: Option<NaiveDate>) -> Self {
        Self { id, start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && self.end.map_or(true, |end| date < end)
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

/// Error raised when a set of terms does not form a valid calendar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalendarError {
    #[error("term {0} is declared more than once")]
    Duplicate(TermId),
    #[error("term {0} ends before it starts")]
    InvertedRange(TermId),
    #[error("term {later} starts before term {earlier} ends")]
    Overlap { earlier: TermId, later: TermId },
    #[error("term {0} is open-ended but is not the latest term")]
    OpenEndedNotLast(TermId),
}

const EUROPEAN_PARLIAMENT_TERMS: [(u32, (i32, u32, u32), Option<(i32, u32, u32)>); 3] = [
    (8, (2014, 7, 1), Some((2019, 7, 2))),
    (9, (2019, 7, 2), Some((2024, 7, 16))),
    (10, (2024, 7, 16), None),
];

/// Ordered, non-overlapping set of terms.
#[derive(Debug, Clone)]
pub struct TermCalendar {
    terms: Vec<Term>,
}

impl TermCalendar {
    pub fn new(mut terms: Vec<Term>) -> Result<Self, CalendarError> {
        terms.sort_by_key(|term| (term.start, term.id));

        let mut seen = BTreeSet::new();
        for term in &terms {
            if !seen.insert(term.id) {
                return Err(CalendarError::Duplicate(term.id));
            }
            if term.end.is_some_and(|end| end <= term.start) {
                return Err(CalendarError::InvertedRange(term.id));
            }
        }

        for pair in terms.windows(2) {
            let (earlier, later) = (&pair[0], &pair[1]);
            match earlier.end {
                None => return Err(CalendarError::OpenEndedNotLast(earlier.id)),
                Some(end) if later.start < end => {
                    return Err(CalendarError::Overlap {
                        earlier: earlier.id,
                        later: later.id,
                    })
                }
                Some(_) => {}
            }
        }

        Ok(Self { terms })
    }

    /// Terms 8 to 10 of the European Parliament.
    pub fn european_parliament() -> Self {
        let ymd = |(y, m, d): (i32, u32, u32)| NaiveDate::from_ymd_opt(y, m, d);
        let terms = EUROPEAN_PARLIAMENT_TERMS
            .iter()
            .filter_map(|&(id, start, end)| {
                let start = ymd(start)?;
                let end = match end {
                    Some(end) => Some(ymd(end)?),
                    None => None,
                };
                Some(Term::new(TermId(id), start, end))
            })
            .collect();
        Self { terms }
    }

    pub fn get(&self, id: TermId) -> Option<&Term> {
        self.terms.iter().find(|term| term.id == id)
    }

    pub fn term_for_date(&self, date: NaiveDate) -> Option<&Term> {
        self.terms.iter().find(|term| term.contains(date))
    }

    pub fn latest(&self) -> Option<&Term> {
        self.terms.last()
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }
}
