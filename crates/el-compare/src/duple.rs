//! Duple detection: pairs of fields that change together.
//!
//! Every transition between consecutive snapshots is diffed. Each unordered
//! pair of changed paths in that transition is one co-occurrence. Pairs are
//! canonicalized so `(a, b)` and `(b, a)` share one counter.
//!
//! Cost per transition is quadratic in the number of changed paths. Dust
//! filtering in the diff keeps that number small; a full-state reset can
//! still blow it up, which `max_changes_per_transition` guards against.

use std::collections::{BTreeMap, BTreeSet};

use el_core::{Path, Snapshot, Value};
use serde::Serialize;
use tracing::warn;

use crate::diff::{Diff, diff_snapshots};
use crate::options::AnalysisOptions;

/// Canonical identifier of an unordered path pair; always `a < b`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DupleId {
    a: Path,
    b: Path,
}

impl DupleId {
    /// Canonicalize a pair; `None` when both paths are the same.
    pub fn new(p: Path, q: Path) -> Option<Self> {
        match p.cmp(&q) {
            core::cmp::Ordering::Less => Some(Self { a: p, b: q }),
            core::cmp::Ordering::Greater => Some(Self { a: q, b: p }),
            core::cmp::Ordering::Equal => None,
        }
    }

    pub fn a(&self) -> &Path {
        &self.a
    }

    pub fn b(&self) -> &Path {
        &self.b
    }
}

impl core::fmt::Display for DupleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.a, self.b)
    }
}

/// One observed co-change: before/after values of both paths.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DupleExample {
    pub timestamp: f64,
    pub prev_a: Option<Value>,
    pub cur_a: Option<Value>,
    pub prev_b: Option<Value>,
    pub cur_b: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Duple {
    pub id: DupleId,
    pub occurrences: u64,
    /// The first few co-changes, capped by `max_examples_per_duple`.
    pub examples: Vec<DupleExample>,
}

/// Duples that met the occurrence threshold, keyed by canonical id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DupleTable {
    duples: BTreeMap<DupleId, Duple>,
    transitions: usize,
}

impl DupleTable {
    pub fn len(&self) -> usize {
        self.duples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.duples.is_empty()
    }

    /// Number of snapshot transitions scanned.
    pub fn transitions(&self) -> usize {
        self.transitions
    }

    pub fn get(&self, id: &DupleId) -> Option<&Duple> {
        self.duples.get(id)
    }

    /// Look up a pair in either order.
    pub fn get_pair(&self, p: &str, q: &str) -> Option<&Duple> {
        DupleId::new(Path::parse(p), Path::parse(q)).and_then(|id| self.duples.get(&id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Duple> {
        self.duples.values()
    }

    pub fn ids(&self) -> BTreeSet<&DupleId> {
        self.duples.keys().collect()
    }

    /// Occurrence count per pair id (`a:b`).
    pub fn pattern_frequencies(&self) -> BTreeMap<String, u64> {
        self.duples
            .values()
            .map(|d| (d.id.to_string(), d.occurrences))
            .collect()
    }

    /// Top `top_n` duples by occurrences, ties broken by id ascending.
    pub fn most_significant(&self, top_n: usize) -> Vec<&Duple> {
        let mut ranked: Vec<&Duple> = self.duples.values().collect();
        // BTreeMap order is id-ascending and sort_by is stable.
        ranked.sort_by(|x, y| y.occurrences.cmp(&x.occurrences));
        ranked.truncate(top_n);
        ranked
    }
}

/// Configured duple detector.
#[derive(Debug, Clone)]
pub struct DupleDetector {
    pub min_occurrences: u64,
    pub max_examples: usize,
    pub max_changes_per_transition: Option<usize>,
}

impl Default for DupleDetector {
    fn default() -> Self {
        Self::from_options(&AnalysisOptions::default())
    }
}

impl DupleDetector {
    pub fn from_options(options: &AnalysisOptions) -> Self {
        Self {
            min_occurrences: options.min_occurrences,
            max_examples: options.max_examples_per_duple,
            max_changes_per_transition: options.max_changes_per_transition,
        }
    }

    pub fn with_min_occurrences(mut self, min_occurrences: u64) -> Self {
        self.min_occurrences = min_occurrences;
        self
    }

    /// Scan consecutive snapshot pairs and count co-changing paths.
    pub fn find_related_duples(&self, snapshots: &[Snapshot]) -> DupleTable {
        let mut counts: BTreeMap<DupleId, Duple> = BTreeMap::new();
        let mut transitions = 0;

        for window in snapshots.windows(2) {
            transitions += 1;
            let changes = diff_snapshots(&window[0], &window[1]);
            self.record_transition(&mut counts, window[1].timestamp(), &changes);
        }

        counts.retain(|_, d| d.occurrences >= self.min_occurrences);
        DupleTable {
            duples: counts,
            transitions,
        }
    }

    fn record_transition(
        &self,
        counts: &mut BTreeMap<DupleId, Duple>,
        timestamp: f64,
        changes: &Diff,
    ) {
        if let Some(cap) = self.max_changes_per_transition {
            if changes.len() > cap {
                warn!(
                    timestamp,
                    changed = changes.len(),
                    cap,
                    "transition exceeds change cap, skipping its pairs"
                );
                return;
            }
        }

        let records = changes.records();
        for (i, first) in records.iter().enumerate() {
            for second in &records[i + 1..] {
                let Some(id) = DupleId::new(first.path.clone(), second.path.clone()) else {
                    continue;
                };
                let (ra, rb) = if id.a == first.path {
                    (first, second)
                } else {
                    (second, first)
                };
                let duple = counts.entry(id.clone()).or_insert_with(|| Duple {
                    id,
                    occurrences: 0,
                    examples: Vec::new(),
                });
                duple.occurrences += 1;
                if duple.examples.len() < self.max_examples {
                    duple.examples.push(DupleExample {
                        timestamp,
                        prev_a: ra.previous.clone(),
                        cur_a: ra.current.clone(),
                        prev_b: rb.previous.clone(),
                        cur_b: rb.current.clone(),
                    });
                }
            }
        }
    }
}

/// Find duples occurring at least `min_occurrences` times with default limits.
pub fn find_related_duples(snapshots: &[Snapshot], min_occurrences: u64) -> DupleTable {
    DupleDetector::default()
        .with_min_occurrences(min_occurrences)
        .find_related_duples(snapshots)
}

/// Co-changing pairs within a single diff (one transition), canonicalized.
pub fn related_pairs(changes: &Diff) -> Vec<DupleId> {
    let records = changes.records();
    let mut pairs = Vec::new();
    for (i, first) in records.iter().enumerate() {
        for second in &records[i + 1..] {
            if let Some(id) = DupleId::new(first.path.clone(), second.path.clone()) {
                pairs.push(id);
            }
        }
    }
    pairs
}
