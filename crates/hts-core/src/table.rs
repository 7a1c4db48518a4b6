//! Keyed value tables.
//!
//! Every variable and constraint instance in a scheduling model is addressed by
//! an [`EntryKey`]: the entity it belongs to (a plant, a reservoir, a market
//! zone) and the time period. Solve results expose one [`ValueTable`] per named
//! group, so `values["generation"].get_at("g1", 3)` is the output of plant `g1`
//! in period 3.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Entity identifier plus time period.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryKey {
    pub entity: String,
    pub period: usize,
}

impl EntryKey {
    pub fn new(entity: impl Into<String>, period: usize) -> Self {
        Self {
            entity: entity.into(),
            period,
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.entity, self.period)
    }
}

/// One serialized row of a [`ValueTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRow {
    pub entity: String,
    pub period: usize,
    pub value: f64,
}

/// Values keyed by `(entity, period)`, ordered by entity then period.
///
/// Serializes as a flat list of `{entity, period, value}` rows so that JSON
/// output stays tabular.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ValueRow>", into = "Vec<ValueRow>")]
pub struct ValueTable {
    entries: BTreeMap<EntryKey, f64>,
}

impl ValueTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: EntryKey, value: f64) -> Option<f64> {
        self.entries.insert(key, value)
    }

    pub fn get(&self, key: &EntryKey) -> Option<f64> {
        self.entries.get(key).copied()
    }

    /// Lookup without building an owned key.
    pub fn get_at(&self, entity: &str, period: usize) -> Option<f64> {
        self.entries
            .iter()
            .find(|(k, _)| k.period == period && k.entity == entity)
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntryKey, f64)> {
        self.entries.iter().map(|(k, v)| (k, *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &EntryKey> {
        self.entries.keys()
    }

    /// Distinct entity identifiers, sorted.
    pub fn entities(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.entries.keys().map(|k| k.entity.as_str()).collect();
        out.dedup();
        out
    }

    pub fn sum(&self) -> f64 {
        self.entries.values().sum()
    }
}

impl FromIterator<(EntryKey, f64)> for ValueTable {
    fn from_iter<I: IntoIterator<Item = (EntryKey, f64)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<ValueRow>> for ValueTable {
    fn from(rows: Vec<ValueRow>) -> Self {
        rows.into_iter()
            .map(|r| (EntryKey::new(r.entity, r.period), r.value))
            .collect()
    }
}

impl From<ValueTable> for Vec<ValueRow> {
    fn from(table: ValueTable) -> Self {
        table
            .entries
            .into_iter()
            .map(|(k, value)| ValueRow {
                entity: k.entity,
                period: k.period,
                value,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ValueTable {
        [
            (EntryKey::new("g2", 0), 40.0),
            (EntryKey::new("g1", 1), 20.0),
            (EntryKey::new("g1", 0), 10.0),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn orders_by_entity_then_period() {
        let table = sample();
        let keys: Vec<String> = table.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["g1,0", "g1,1", "g2,0"]);
        assert_eq!(table.entities(), vec!["g1", "g2"]);
    }

    #[test]
    fn lookup_by_parts() {
        let table = sample();
        assert_eq!(table.get_at("g1", 1), Some(20.0));
        assert_eq!(table.get_at("g3", 0), None);
        assert_eq!(table.get(&EntryKey::new("g2", 0)), Some(40.0));
        assert!((table.sum() - 70.0).abs() < 1e-12);
    }

    #[test]
    fn serializes_as_rows() {
        let json = serde_json::to_value(sample()).unwrap();
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["entity"], "g1");
        assert_eq!(rows[0]["period"], 0);
        assert_eq!(rows[0]["value"], 10.0);

        let back: ValueTable = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample());
    }
}
