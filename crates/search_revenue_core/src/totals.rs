//! Attribution keys, revenue totals and ranking.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// (search engine domain, normalized keyword) pair used to bucket revenue.
///
/// Equality is structural and case-sensitive; keywords are lowercased before
/// a key is ever built, so `Ipod` and `ipod` land on the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributionKey {
    pub engine_domain: String,
    pub keyword: String,
}

impl AttributionKey {
    pub fn new(engine_domain: impl Into<String>, keyword: impl Into<String>) -> Self {
        Self {
            engine_domain: engine_domain.into(),
            keyword: keyword.into(),
        }
    }
}

/// Revenue accumulated per attribution key. Values only ever grow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Totals {
    revenue_by_key: HashMap<AttributionKey, f64>,
}

impl Totals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &AttributionKey, revenue: f64) {
        if let Some(total) = self.revenue_by_key.get_mut(key) {
            *total += revenue;
        } else {
            self.revenue_by_key.insert(key.clone(), revenue);
        }
    }

    pub fn get(&self, key: &AttributionKey) -> Option<f64> {
        self.revenue_by_key.get(key).copied()
    }

    pub fn revenue_for(&self, engine_domain: &str, keyword: &str) -> Option<f64> {
        self.get(&AttributionKey::new(engine_domain, keyword))
    }

    pub fn len(&self) -> usize {
        self.revenue_by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revenue_by_key.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AttributionKey, f64)> {
        self.revenue_by_key.iter().map(|(key, revenue)| (key, *revenue))
    }

    pub fn total_revenue(&self) -> f64 {
        self.revenue_by_key.values().sum()
    }

    /// Folds another run's totals into this one by per-key addition.
    ///
    /// Only valid when both runs scanned disjoint visitor sets.
    pub fn merge(&mut self, other: Totals) {
        for (key, revenue) in other.revenue_by_key {
            *self.revenue_by_key.entry(key).or_insert(0.0) += revenue;
        }
    }
}

impl FromIterator<(AttributionKey, f64)> for Totals {
    fn from_iter<T: IntoIterator<Item = (AttributionKey, f64)>>(iter: T) -> Self {
        let mut totals = Totals::new();
        for (key, revenue) in iter {
            totals.add(&key, revenue);
        }
        totals
    }
}

/// Orders totals by revenue descending.
///
/// Equal revenues fall back to engine domain, then keyword, both ascending, so
/// the order never depends on hash map iteration.
pub fn rank(totals: &Totals) -> Vec<(AttributionKey, f64)> {
    let mut rows: Vec<(AttributionKey, f64)> = totals
        .iter()
        .map(|(key, revenue)| (key.clone(), revenue))
        .collect();
    rows.sort_by(|(key_a, revenue_a), (key_b, revenue_b)| {
        match revenue_b.total_cmp(revenue_a) {
            Ordering::Equal => key_a.cmp(key_b),
            ordering => ordering,
        }
    });
    rows
}
