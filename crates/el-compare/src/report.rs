//! Comparison reporting: the structured result of an ouroboros comparison,
//! in machine-readable (JSON) and plain-text form.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use el_core::Entity;
use serde::Serialize;

use crate::ouroboros::{ComparisonMode, ComparisonNode};

/// Error text shown when either entity cannot be resolved.
pub const LOAD_FAILURE_MESSAGE: &str = "Failed to load session snapshots";

/// Troubleshooting hints accompanying [`LOAD_FAILURE_MESSAGE`], in order.
pub const LOAD_FAILURE_SUGGESTIONS: [&str; 3] = [
    "Check that both entities exist and are accessible",
    "Verify that snapshots are available for both entities",
    "Try comparing different entities or using a different comparison mode",
];

/// Result of comparing two entities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    /// First compared entity.
    pub entity1: Entity,
    /// Second compared entity.
    pub entity2: Entity,
    /// Mode the comparison ran in.
    pub mode: ComparisonMode,
    #[serde(flatten)]
    pub outcome: ReportOutcome,
}

/// Terminal state of a comparison; serialized under a `status` tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportOutcome {
    Ok(ComparisonSummary),
    Error(ReportError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportError {
    /// Human-readable failure message.
    pub error: String,
    /// Troubleshooting hints, in display order.
    pub suggestions: Vec<String>,
    /// Resolver failures behind the error, one per entity that failed.
    pub causes: Vec<String>,
}

impl ReportError {
    pub fn load_failure(causes: Vec<String>) -> Self {
        Self {
            error: LOAD_FAILURE_MESSAGE.to_string(),
            suggestions: LOAD_FAILURE_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
            causes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonSummary {
    /// Number of aligned comparison points, visited or not.
    pub points: usize,
    /// Most divergent visited points, highest first.
    pub top_changes: Vec<TopChange>,
    /// Co-change count per pair id (`a:b`).
    pub pattern_frequencies: BTreeMap<String, u64>,
    /// Statistics over the visited points.
    pub aggregate: Aggregate,
    /// Traversal tree; `None` when there are no points.
    pub tree: Option<ComparisonNode>,
}

/// A highly divergent comparison point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopChange {
    /// Index among the aligned points.
    pub index: usize,
    /// Pair id (co-occurrence) or aligned step label (temporal).
    pub point: String,
    /// Divergence at this point.
    pub divergence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Aggregate {
    /// Mean divergence over visited points.
    pub mean_divergence: Option<f64>,
    /// Population variance of the visited divergences.
    pub variance: Option<f64>,
    /// Highest divergence seen.
    pub max_divergence: Option<f64>,
    /// Point with the highest divergence (lowest index on ties).
    pub max_index: Option<usize>,
    /// Minimum-divergence point; only set for cross-level temporal comparisons.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_match_index: Option<usize>,
    /// `(index, divergence)` of every visited point, by index.
    pub distribution: Vec<(usize, f64)>,
    /// Number of points visited.
    pub visited: usize,
    /// True when every aligned point was visited.
    pub complete: bool,
}

impl Aggregate {
    /// Linear aggregate over visited `(index, divergence)` points.
    pub fn from_points(
        mut distribution: Vec<(usize, f64)>,
        total_points: usize,
        with_best_match: bool,
    ) -> Self {
        distribution.sort_by_key(|&(i, _)| i);
        let visited = distribution.len();
        let complete = visited == total_points;
        if visited == 0 {
            return Self {
                complete,
                ..Self::default()
            };
        }

        let n = visited as f64;
        let mean = distribution.iter().map(|&(_, d)| d).sum::<f64>() / n;
        let variance = distribution
            .iter()
            .map(|&(_, d)| (d - mean) * (d - mean))
            .sum::<f64>()
            / n;

        // strict comparisons keep the lowest index on ties
        let mut max = distribution[0];
        let mut min = distribution[0];
        for &(i, d) in &distribution[1..] {
            if d > max.1 {
                max = (i, d);
            }
            if d < min.1 {
                min = (i, d);
            }
        }

        Self {
            mean_divergence: Some(mean),
            variance: Some(variance),
            max_divergence: Some(max.1),
            max_index: Some(max.0),
            best_match_index: with_best_match.then_some(min.0),
            distribution,
            visited,
            complete,
        }
    }
}

impl ComparisonReport {
    pub fn ok(entity1: Entity, entity2: Entity, mode: ComparisonMode, summary: ComparisonSummary) -> Self {
        Self {
            entity1,
            entity2,
            mode,
            outcome: ReportOutcome::Ok(summary),
        }
    }

    pub fn error(entity1: Entity, entity2: Entity, mode: ComparisonMode, error: ReportError) -> Self {
        Self {
            entity1,
            entity2,
            mode,
            outcome: ReportOutcome::Error(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, ReportOutcome::Ok(_))
    }

    pub fn summary(&self) -> Option<&ComparisonSummary> {
        match &self.outcome {
            ReportOutcome::Ok(summary) => Some(summary),
            ReportOutcome::Error(_) => None,
        }
    }

    pub fn report_error(&self) -> Option<&ReportError> {
        match &self.outcome {
            ReportOutcome::Ok(_) => None,
            ReportOutcome::Error(e) => Some(e),
        }
    }

    /// Plain-text summary.
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "============================================================");
        let _ = writeln!(out, "Comparison: {} vs {} ({})", self.entity1, self.entity2, self.mode);

        match &self.outcome {
            ReportOutcome::Error(e) => {
                let _ = writeln!(out, "Status: ERROR");
                let _ = writeln!(out, "{}", e.error);
                for cause in &e.causes {
                    let _ = writeln!(out, "  cause: {}", cause);
                }
                let _ = writeln!(out, "Suggestions:");
                for s in &e.suggestions {
                    let _ = writeln!(out, "  - {}", s);
                }
            }
            ReportOutcome::Ok(summary) => {
                let agg = &summary.aggregate;
                let _ = writeln!(out, "Status: OK");
                let _ = writeln!(
                    out,
                    "Points visited: {}/{}{}",
                    agg.visited,
                    summary.points,
                    if agg.complete { "" } else { " (partial)" }
                );
                if let (Some(mean), Some(max)) = (agg.mean_divergence, agg.max_divergence) {
                    let _ = writeln!(out, "Divergence: mean {:.3}, max {:.3}", mean, max);
                }
                if let Some(best) = agg.best_match_index {
                    let _ = writeln!(out, "Best match at point {}", best);
                }
                if !summary.top_changes.is_empty() {
                    let _ = writeln!(out, "Top changes:");
                    for c in &summary.top_changes {
                        let _ = writeln!(out, "  [{}] {} ({:.3})", c.index, c.point, c.divergence);
                    }
                }
                if !summary.pattern_frequencies.is_empty() {
                    let _ = writeln!(out, "Patterns: {}", summary.pattern_frequencies.len());
                }
            }
        }

        let _ = writeln!(out, "============================================================");
        out
    }

    /// Print the plain-text summary to stdout.
    pub fn print_summary(&self) {
        print!("{}", self.render_summary());
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_statistics() {
        let agg = Aggregate::from_points(vec![(2, 4.0), (0, 2.0), (1, 0.0), (3, 4.0)], 5, true);
        assert_eq!(agg.mean_divergence, Some(2.5));
        assert_eq!(agg.variance, Some(2.75));
        assert_eq!(agg.max_divergence, Some(4.0));
        assert_eq!(agg.max_index, Some(2));
        assert_eq!(agg.best_match_index, Some(1));
        assert_eq!(agg.distribution[0], (0, 2.0));
        assert_eq!(agg.visited, 4);
        assert!(!agg.complete);
    }

    #[test]
    fn test_aggregate_empty() {
        let agg = Aggregate::from_points(Vec::new(), 0, true);
        assert_eq!(agg.mean_divergence, None);
        assert_eq!(agg.best_match_index, None);
        assert!(agg.complete);
    }

    #[test]
    fn test_error_report_json() {
        let report = ComparisonReport::error(
            Entity::session("a"),
            Entity::session("b"),
            ComparisonMode::Temporal,
            ReportError::load_failure(vec!["entity session:a not found".into()]),
        );
        let json: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["mode"], "temporal");
        assert_eq!(json["entity1"]["id"], "a");
        assert_eq!(json["entity1"]["level"], "session");
        assert_eq!(json["error"], LOAD_FAILURE_MESSAGE);
        assert_eq!(json["suggestions"].as_array().unwrap().len(), 3);
        assert!(report.render_summary().contains("Status: ERROR"));
    }

    #[test]
    fn test_ok_report_json() {
        let summary = ComparisonSummary {
            points: 1,
            top_changes: vec![TopChange {
                index: 0,
                point: "x:y".into(),
                divergence: 1.0,
            }],
            pattern_frequencies: BTreeMap::from([("x:y".to_string(), 2)]),
            aggregate: Aggregate::from_points(vec![(0, 1.0)], 1, false),
            tree: None,
        };
        let report = ComparisonReport::ok(
            Entity::session("a"),
            Entity::session("b"),
            ComparisonMode::CoOccurrence,
            summary,
        );
        let json: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["mode"], "co_occurrence");
        assert_eq!(json["pattern_frequencies"]["x:y"], 2);
        assert_eq!(json["aggregate"]["mean_divergence"], 1.0);
        assert!(json["aggregate"].get("best_match_index").is_none());
        assert!(report.render_summary().contains("Points visited: 1/1"));
    }
}
