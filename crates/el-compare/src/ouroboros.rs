//! Ouroboros comparison: center-outward comparison of two log entities.
//!
//! A request moves through resolve, align and traverse before ending in a
//! completed report or a structured error. Traversal starts at the middle
//! of the aligned points and expands one ring at a time:
//!
//! ```text
//! n = 5:   2, 3, 1, 4, 0
//!          ^  ^--^  ^--^
//!       center ring1 ring2
//! ```
//!
//! Each ring visits `center + k` before `center - k`. `depth_limit` bounds
//! the number of rings after the center.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use el_core::{Entity, Path, SessionData, Snapshot};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, warn};

use crate::correlation::nearest_index;
use crate::diff::{Diff, diff_at};
use crate::duple::{DupleDetector, DupleId, DupleTable, related_pairs};
use crate::options::AnalysisOptions;
use crate::report::{
    Aggregate, ComparisonReport, ComparisonSummary, ReportError, TopChange,
};
use crate::resolver::{EntityResolver, ResolveError};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ComparisonMode {
    /// Compare the duple tables of both entities.
    CoOccurrence,
    /// Compare aligned snapshots step by step.
    Temporal,
}

/// Indices grouped by expansion ring; ring 0 is the center alone.
pub fn center_out_rings(n: usize, depth_limit: Option<usize>) -> Vec<Vec<usize>> {
    if n == 0 {
        return Vec::new();
    }
    let center = n / 2;
    let mut rings = vec![vec![center]];
    let mut step = 1;
    while depth_limit.is_none_or(|limit| step <= limit) {
        let mut ring = Vec::with_capacity(2);
        if center + step < n {
            ring.push(center + step);
        }
        if step <= center {
            ring.push(center - step);
        }
        if ring.is_empty() {
            break;
        }
        rings.push(ring);
        step += 1;
    }
    rings
}

/// Visit order of `n` points expanding outward from `n / 2`.
pub fn center_out_order(n: usize, depth_limit: Option<usize>) -> Vec<usize> {
    center_out_rings(n, depth_limit).into_iter().flatten().collect()
}

/// Node of the traversal tree: root, one ring per expansion step, one leaf
/// per visited point. Inner nodes carry the mean divergence of their leaves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonNode {
    /// Inclusive range of point indices covered.
    pub index_range: (usize, usize),
    pub divergence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ComparisonNode>,
}

impl ComparisonNode {
    fn leaf(index: usize, label: String, divergence: f64) -> Self {
        Self {
            index_range: (index, index),
            divergence,
            label: Some(label),
            children: Vec::new(),
        }
    }

    fn branch(children: Vec<ComparisonNode>) -> Option<Self> {
        let lo = children.iter().map(|c| c.index_range.0).min()?;
        let hi = children.iter().map(|c| c.index_range.1).max()?;
        let leaves = children.iter().map(|c| c.leaf_count()).sum::<usize>();
        let total = children
            .iter()
            .map(|c| c.divergence * c.leaf_count() as f64)
            .sum::<f64>();
        Some(Self {
            index_range: (lo, hi),
            divergence: total / leaves as f64,
            label: None,
            children,
        })
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn leaf_count(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.children.iter().map(|c| c.leaf_count()).sum()
        }
    }
}

/// One aligned pair of snapshots in temporal mode.
#[derive(Debug, Clone, Copy, PartialEq)]
struct StepPair {
    first: usize,
    second: usize,
}

/// Comparison points produced by alignment.
#[derive(Debug, Clone, PartialEq)]
enum Alignment {
    Pairs {
        ids: Vec<DupleId>,
        first: DupleTable,
        second: DupleTable,
    },
    Steps(Vec<StepPair>),
}

impl Alignment {
    fn len(&self) -> usize {
        match self {
            Alignment::Pairs { ids, .. } => ids.len(),
            Alignment::Steps(steps) => steps.len(),
        }
    }
}

/// Divergence of two frequencies: 1 when one side lacks the pair.
fn frequency_divergence(c1: u64, c2: u64) -> f64 {
    match (c1, c2) {
        (0, 0) => 0.0,
        (0, _) | (_, 0) => 1.0,
        _ => c1.abs_diff(c2) as f64 / c1.max(c2) as f64,
    }
}

/// Align two equally-weighted sequences by relative position.
fn align_by_position(len1: usize, len2: usize) -> Vec<StepPair> {
    let n = len1.min(len2);
    (0..n)
        .map(|i| StepPair {
            first: i * len1 / n,
            second: i * len2 / n,
        })
        .collect()
}

/// Align sequences at different levels.
fn align_across_levels(s1: &[Snapshot], s2: &[Snapshot]) -> Vec<StepPair> {
    if s1.len() == 1 {
        return (0..s2.len()).map(|j| StepPair { first: 0, second: j }).collect();
    }
    if s2.len() == 1 {
        return (0..s1.len()).map(|i| StepPair { first: i, second: 0 }).collect();
    }

    let swapped = s2.len() < s1.len();
    let (short, long) = if swapped { (s2, s1) } else { (s1, s2) };
    let long_ts: Vec<f64> = long.iter().map(Snapshot::timestamp).collect();
    short
        .iter()
        .enumerate()
        .filter_map(|(i, snap)| {
            let j = nearest_index(&long_ts, snap.timestamp())?;
            Some(if swapped {
                StepPair { first: j, second: i }
            } else {
                StepPair { first: i, second: j }
            })
        })
        .collect()
}

/// Changes and co-changing pairs between two individual snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotComparison {
    pub mode: ComparisonMode,
    pub changes: Diff,
    pub related_pairs: Vec<DupleId>,
    /// Absolute time between the snapshots; temporal mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_difference: Option<f64>,
}

pub fn compare_snapshots(first: &Snapshot, second: &Snapshot, mode: ComparisonMode) -> SnapshotComparison {
    let changes = diff_at(first.state(), second.state(), &Path::root(), Some(second.timestamp()));
    let related_pairs = related_pairs(&changes);
    SnapshotComparison {
        mode,
        time_difference: (mode == ComparisonMode::Temporal)
            .then(|| (second.timestamp() - first.timestamp()).abs()),
        changes,
        related_pairs,
    }
}

/// A visited comparison point.
struct Visit {
    index: usize,
    label: String,
    divergence: f64,
}

/// Compares two entities resolved through `R`.
#[derive(Debug, Clone)]
pub struct OuroborosComparator<R> {
    resolver: R,
    options: AnalysisOptions,
}

impl<R: EntityResolver> OuroborosComparator<R> {
    pub fn new(resolver: R) -> Self {
        Self::with_options(resolver, AnalysisOptions::default())
    }

    pub fn with_options(resolver: R, options: AnalysisOptions) -> Self {
        Self { resolver, options }
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Run a comparison to completion. Resolution failures are reported in
    /// the returned report, never raised.
    pub fn compare(&self, entity1: &Entity, entity2: &Entity, mode: ComparisonMode) -> ComparisonReport {
        debug!(%entity1, %entity2, %mode, "resolving entities");
        let first = self.resolve_non_empty(entity1);
        let second = self.resolve_non_empty(entity2);

        let (first, second) = match (first, second) {
            (Ok(a), Ok(b)) => (a, b),
            (a, b) => {
                let causes: Vec<String> = [a.err(), b.err()]
                    .into_iter()
                    .flatten()
                    .map(|e| {
                        warn!(error = %e, "entity resolution failed");
                        e.to_string()
                    })
                    .collect();
                return ComparisonReport::error(
                    entity1.clone(),
                    entity2.clone(),
                    mode,
                    ReportError::load_failure(causes),
                );
            }
        };

        let cross_level = entity1.level != entity2.level;
        let alignment = self.align(&first, &second, mode, cross_level);
        let points = alignment.len();
        debug!(points, cross_level, "aligned comparison points");

        let summary = self.traverse(&first, &second, &alignment, cross_level);
        debug!(
            visited = summary.aggregate.visited,
            complete = summary.aggregate.complete,
            "traversal finished"
        );
        ComparisonReport::ok(entity1.clone(), entity2.clone(), mode, summary)
    }

    /// An entity resolving to no snapshots is as unavailable as a missing one.
    fn resolve_non_empty(&self, entity: &Entity) -> Result<Arc<SessionData>, ResolveError> {
        let data = self.resolver.resolve(entity)?;
        if data.is_empty() {
            return Err(ResolveError::empty(entity));
        }
        Ok(data)
    }

    fn align(
        &self,
        first: &SessionData,
        second: &SessionData,
        mode: ComparisonMode,
        cross_level: bool,
    ) -> Alignment {
        match mode {
            ComparisonMode::CoOccurrence => {
                let detector = DupleDetector::from_options(&self.options)
                    .with_min_occurrences(self.options.co_occurrence_min_occurrences);
                let first = detector.find_related_duples(first.snapshots());
                let second = detector.find_related_duples(second.snapshots());
                let ids: BTreeSet<DupleId> =
                    first.ids().into_iter().chain(second.ids()).cloned().collect();
                Alignment::Pairs {
                    ids: ids.into_iter().collect(),
                    first,
                    second,
                }
            }
            ComparisonMode::Temporal => {
                let (s1, s2) = (first.snapshots(), second.snapshots());
                Alignment::Steps(if cross_level {
                    align_across_levels(s1, s2)
                } else {
                    align_by_position(s1.len(), s2.len())
                })
            }
        }
    }

    fn visit(
        &self,
        first: &SessionData,
        second: &SessionData,
        alignment: &Alignment,
        index: usize,
        patterns: &mut BTreeMap<String, u64>,
    ) -> Visit {
        match alignment {
            Alignment::Pairs { ids, first, second } => {
                let id = &ids[index];
                let c1 = first.get(id).map_or(0, |d| d.occurrences);
                let c2 = second.get(id).map_or(0, |d| d.occurrences);
                Visit {
                    index,
                    label: id.to_string(),
                    divergence: frequency_divergence(c1, c2),
                }
            }
            Alignment::Steps(steps) => {
                let step = steps[index];
                let a = &first.snapshots()[step.first];
                let b = &second.snapshots()[step.second];
                let changes = diff_at(a.state(), b.state(), &Path::root(), None);
                self.count_patterns(&changes, index, patterns);
                Visit {
                    index,
                    label: format!("{}~{}", step.first, step.second),
                    divergence: changes.len() as f64,
                }
            }
        }
    }

    fn count_patterns(&self, changes: &Diff, index: usize, patterns: &mut BTreeMap<String, u64>) {
        if let Some(cap) = self.options.max_changes_per_transition {
            if changes.len() > cap {
                warn!(
                    index,
                    changed = changes.len(),
                    cap,
                    "comparison point exceeds change cap, skipping its pairs"
                );
                return;
            }
        }
        for id in related_pairs(changes) {
            *patterns.entry(id.to_string()).or_insert(0) += 1;
        }
    }

    fn traverse(
        &self,
        first: &SessionData,
        second: &SessionData,
        alignment: &Alignment,
        cross_level: bool,
    ) -> ComparisonSummary {
        let points = alignment.len();
        let mut patterns = BTreeMap::new();
        let mut visits = Vec::new();
        let mut rings = Vec::new();

        for ring in center_out_rings(points, self.options.depth_limit) {
            let mut leaves = Vec::with_capacity(ring.len());
            for index in ring {
                let visit = self.visit(first, second, alignment, index, &mut patterns);
                leaves.push(ComparisonNode::leaf(visit.index, visit.label.clone(), visit.divergence));
                visits.push(visit);
            }
            rings.extend(ComparisonNode::branch(leaves));
        }

        if let Alignment::Pairs { first, second, .. } = alignment {
            for table in [first, second] {
                for (id, count) in table.pattern_frequencies() {
                    *patterns.entry(id).or_insert(0) += count;
                }
            }
        }

        let mut ranked: Vec<&Visit> = visits.iter().collect();
        ranked.sort_by(|x, y| y.divergence.total_cmp(&x.divergence).then(x.index.cmp(&y.index)));
        let top_changes = ranked
            .into_iter()
            .take(self.options.top_n)
            .map(|v| TopChange {
                index: v.index,
                point: v.label.clone(),
                divergence: v.divergence,
            })
            .collect();

        let with_best_match = cross_level && matches!(alignment, Alignment::Steps(_));
        let aggregate = Aggregate::from_points(
            visits.iter().map(|v| (v.index, v.divergence)).collect(),
            points,
            with_best_match,
        );

        ComparisonSummary {
            points,
            top_changes,
            pattern_frequencies: patterns,
            aggregate,
            tree: ComparisonNode::branch(rings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::MemoryResolver;
    use el_core::Value;
    use serde_json::json;

    #[test]
    fn test_center_out_order() {
        assert_eq!(center_out_order(5, None), vec![2, 3, 1, 4, 0]);
        assert_eq!(center_out_order(5, Some(1)), vec![2, 3, 1]);
        assert_eq!(center_out_order(4, None), vec![2, 3, 1, 0]);
        assert_eq!(center_out_order(1, None), vec![0]);
        assert_eq!(center_out_order(5, Some(0)), vec![2]);
        assert!(center_out_order(0, None).is_empty());
    }

    #[test]
    fn test_rings() {
        assert_eq!(center_out_rings(4, None), vec![vec![2], vec![3, 1], vec![0]]);
    }

    #[test]
    fn test_frequency_divergence() {
        assert_eq!(frequency_divergence(3, 0), 1.0);
        assert_eq!(frequency_divergence(0, 3), 1.0);
        assert_eq!(frequency_divergence(4, 4), 0.0);
        assert_eq!(frequency_divergence(2, 4), 0.5);
    }

    #[test]
    fn test_align_by_position() {
        let pairs = align_by_position(6, 3);
        let got: Vec<(usize, usize)> = pairs.iter().map(|p| (p.first, p.second)).collect();
        assert_eq!(got, vec![(0, 0), (2, 1), (4, 2)]);
        assert!(align_by_position(0, 3).is_empty());
    }

    fn snap(t: f64, j: serde_json::Value) -> Snapshot {
        Snapshot::new(t, Value::from(j)).unwrap()
    }

    #[test]
    fn test_align_across_levels_nearest() {
        let short = vec![snap(1.0, json!({})), snap(10.0, json!({}))];
        let long = vec![
            snap(0.0, json!({})),
            snap(2.0, json!({})),
            snap(8.0, json!({})),
            snap(12.0, json!({})),
        ];
        let got: Vec<(usize, usize)> = align_across_levels(&long, &short)
            .iter()
            .map(|p| (p.first, p.second))
            .collect();
        // 1.0 ties between 0.0 and 2.0; 10.0 ties between 8.0 and 12.0
        assert_eq!(got, vec![(0, 0), (2, 1)]);
    }

    #[test]
    fn test_compare_snapshots() {
        let a = snap(1.0, json!({"x": 1, "y": 1, "z": 0}));
        let b = snap(4.5, json!({"x": 2, "y": 2, "z": 0}));
        let temporal = compare_snapshots(&a, &b, ComparisonMode::Temporal);
        assert_eq!(temporal.changes.len(), 2);
        assert_eq!(temporal.related_pairs.len(), 1);
        assert_eq!(temporal.time_difference, Some(3.5));
        let co = compare_snapshots(&a, &b, ComparisonMode::CoOccurrence);
        assert_eq!(co.time_difference, None);
    }

    #[test]
    fn test_temporal_tree_shape() {
        let session = |offset: i32| {
            SessionData::from_snapshots(
                (0..5)
                    .map(|i| snap(f64::from(i), json!({"x": i, "y": i + offset})))
                    .collect(),
            )
        };
        let resolver = MemoryResolver::new()
            .with(Entity::session("a"), session(0))
            .with(Entity::session("b"), session(1));
        let report = OuroborosComparator::new(resolver).compare(
            &Entity::session("a"),
            &Entity::session("b"),
            ComparisonMode::Temporal,
        );
        let summary = report.summary().unwrap();
        assert_eq!(summary.points, 5);
        let tree = summary.tree.as_ref().unwrap();
        assert_eq!(tree.index_range, (0, 4));
        assert_eq!(tree.children.len(), 3);
        assert_eq!(tree.children[1].index_range, (1, 3));
        assert_eq!(tree.leaf_count(), 5);
        assert_eq!(tree.divergence, 1.0);
        assert!(summary.aggregate.complete);
        assert_eq!(summary.aggregate.best_match_index, None);
    }
}
