//! Weight resolution for weighted backend selection.
//!
//! A sparse priority table assigns weights by lower-cased deployer name.
//! Deployers missing from the table get an even share, `floor(100 / N)`.
//! Weights are summed in descriptor order into cumulative thresholds that
//! serve as decision boundaries for the random draw.
//!
//! Values are taken as given: negative weights, weights above 100 or
//! totals other than 100 skew the split but never error. Weights are
//! 64-bit, matching the edge's INTEGER type.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::routing::deployer::Deployer;

/// Sparse mapping from lower-cased deployer name to weight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PriorityTable(BTreeMap<String, i64>);

impl<'de> Deserialize<'de> for PriorityTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, i64>::deserialize(deserializer)?;
        Ok(raw.into_iter().collect())
    }
}

impl PriorityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, weight: i64) -> Self {
        self.insert(name, weight);
        self
    }

    pub fn insert(&mut self, name: &str, weight: i64) {
        self.0.insert(name.to_lowercase(), weight);
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.0.get(&name.to_lowercase()).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<(S, i64)> for PriorityTable {
    fn from_iter<I: IntoIterator<Item = (S, i64)>>(iter: I) -> Self {
        let mut table = PriorityTable::new();
        for (name, weight) in iter {
            table.insert(name.as_ref(), weight);
        }
        table
    }
}

/// Resolved weights and cumulative thresholds, aligned with descriptor order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Weights {
    /// Share used for deployers absent from the table.
    pub default_weight: i64,
    pub weights: Vec<i64>,
    pub thresholds: Vec<i64>,
}

impl Weights {
    /// Sum of all resolved weights (the last threshold).
    pub fn total(&self) -> i64 {
        self.thresholds.last().copied().unwrap_or(0)
    }
}

/// Even share for `count` deployers.
pub fn default_weight(count: usize) -> i64 {
    if count == 0 {
        return 0;
    }
    100 / count as i64
}

/// Resolve per-deployer weights and their cumulative thresholds.
///
/// Pure in `(deployers, table)`; nothing is cached between calls.
pub fn resolve_weights(deployers: &[Deployer], table: &PriorityTable) -> Weights {
    let default_weight = default_weight(deployers.len());

    let weights: Vec<i64> = deployers
        .iter()
        .map(|d| table.get(d.name()).unwrap_or(default_weight))
        .collect();

    let thresholds = weights
        .iter()
        .scan(0i64, |acc, w| {
            *acc = acc.saturating_add(*w);
            Some(*acc)
        })
        .collect();

    Weights {
        default_weight,
        weights,
        thresholds,
    }
}
