//! Streaming decoders that build the member-indexed structures directly from
//! a reader, dropping rows outside the requested term as they are parsed.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;

use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};

use super::records::{
    ActivityDataset, ActivityItem, ActivityItemsDataset, ActivityRecord, MepId, RawActivityItem,
    RawActivityRecord,
};
use super::resolver::ResolverTier;
use crate::terms::Term;

/// Term and tier a file is decoded for.
#[derive(Debug, Clone)]
pub struct DecodeScope {
    pub term: Term,
    pub tier: ResolverTier,
}

impl DecodeScope {
    pub fn new(term: Term, tier: ResolverTier) -> Self {
        Self { term, tier }
    }
}

/// Payload types the term cache can load.
pub trait TermDataset: Sized + Send + Sync + 'static {
    fn decode<R: Read>(reader: R, scope: &DecodeScope) -> serde_json::Result<Self>;

    /// Number of top-level entries, for logging.
    fn entry_count(&self) -> usize;
}

impl TermDataset for ActivityDataset {
    fn decode<R: Read>(reader: R, scope: &DecodeScope) -> serde_json::Result<Self> {
        let mut deserializer = serde_json::Deserializer::from_reader(reader);
        let records = RecordsSeed { scope }.deserialize(&mut deserializer)?;
        deserializer.end()?;
        Ok(Self {
            term: scope.term.id,
            records,
        })
    }

    fn entry_count(&self) -> usize {
        self.len()
    }
}

impl TermDataset for ActivityItemsDataset {
    fn decode<R: Read>(reader: R, scope: &DecodeScope) -> serde_json::Result<Self> {
        let mut deserializer = serde_json::Deserializer::from_reader(reader);
        let items = ItemsSeed { scope }.deserialize(&mut deserializer)?;
        deserializer.end()?;
        Ok(Self {
            term: scope.term.id,
            items,
        })
    }

    fn entry_count(&self) -> usize {
        self.item_count()
    }
}

struct RecordsSeed<'a> {
    scope: &'a DecodeScope,
}

impl<'de> DeserializeSeed<'de> for RecordsSeed<'_> {
    type Value = HashMap<MepId, ActivityRecord>;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(RecordsVisitor { scope: self.scope })
    }
}

struct RecordsVisitor<'a> {
    scope: &'a DecodeScope,
}

impl RecordsVisitor<'_> {
    /// Rows tagged with another term never belong here; untagged rows are only
    /// trusted when the file itself is term-specific.
    fn admit(&self, raw: &RawActivityRecord) -> bool {
        match raw.term {
            Some(term) => term == self.scope.term.id,
            None => !self.scope.tier.requires_term_filter(),
        }
    }

    fn insert(
        &self,
        out: &mut HashMap<MepId, ActivityRecord>,
        mep_id: MepId,
        raw: RawActivityRecord,
    ) {
        if self.admit(&raw) {
            let record = raw.into_record(mep_id.clone(), self.scope.term.id);
            if out.insert(mep_id, record).is_some() {
                tracing::debug!(term = %self.scope.term.id, "duplicate activity row replaced");
            }
        }
    }
}

impl<'de> Visitor<'de> for RecordsVisitor<'_> {
    type Value = HashMap<MepId, ActivityRecord>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of activity records or an object keyed by MEP id")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut out = HashMap::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(mut raw) = seq.next_element::<RawActivityRecord>()? {
            let mep_id = raw
                .mep_id
                .take()
                .ok_or_else(|| de::Error::missing_field("mep_id"))?;
            self.insert(&mut out, mep_id, raw);
        }
        Ok(out)
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut out = HashMap::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(key) = map.next_key::<MepId>()? {
            let mut raw: RawActivityRecord = map.next_value()?;
            let mep_id = raw.mep_id.take().unwrap_or(key);
            self.insert(&mut out, mep_id, raw);
        }
        Ok(out)
    }
}

struct ItemsSeed<'a> {
    scope: &'a DecodeScope,
}

impl<'de> DeserializeSeed<'de> for ItemsSeed<'_> {
    type Value = HashMap<MepId, Vec<ActivityItem>>;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ItemsVisitor { scope: self.scope })
    }
}

struct ItemsVisitor<'a> {
    scope: &'a DecodeScope,
}

fn admit_item(scope: &DecodeScope, item: &ActivityItem) -> bool {
    if !scope.tier.requires_term_filter() {
        return true;
    }
    item.date.is_some_and(|date| scope.term.contains(date))
}

impl<'de> Visitor<'de> for ItemsVisitor<'_> {
    type Value = HashMap<MepId, Vec<ActivityItem>>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of activity items or an object of item arrays keyed by MEP id")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut out: HashMap<MepId, Vec<ActivityItem>> = HashMap::new();
        while let Some(raw) = seq.next_element::<RawActivityItem>()? {
            let mep_id = raw.mep_id.ok_or_else(|| de::Error::missing_field("mep_id"))?;
            if admit_item(self.scope, &raw.item) {
                out.entry(mep_id).or_default().push(raw.item);
            }
        }
        Ok(out)
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut out: HashMap<MepId, Vec<ActivityItem>> =
            HashMap::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(key) = map.next_key::<MepId>()? {
            let items = map.next_value_seed(MemberItemsSeed { scope: self.scope })?;
            if !items.is_empty() {
                out.entry(key).or_default().extend(items);
            }
        }
        Ok(out)
    }
}

struct MemberItemsSeed<'a> {
    scope: &'a DecodeScope,
}

impl<'de> DeserializeSeed<'de> for MemberItemsSeed<'_> {
    type Value = Vec<ActivityItem>;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for MemberItemsSeed<'_> {
    type Value = Vec<ActivityItem>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of activity items")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element::<ActivityItem>()? {
            if admit_item(self.scope, &item) {
                items.push(item);
            }
        }
        Ok(items)
    }
}
