//! Single-session analysis: duples, field correlation and damage reduction.

use el_core::{Path, SessionData};
use serde::Serialize;
use tracing::debug;

use crate::correlation::{CorrelationResult, DamageQuery, DamageReduction, series_correlation};
use crate::duple::{Duple, DupleDetector, DupleTable};
use crate::options::AnalysisOptions;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionAnalysis {
    pub snapshot_count: usize,
    pub event_count: usize,
    pub duples: DupleTable,
    /// Most frequent duples, at most `top_n`.
    pub top_patterns: Vec<Duple>,
    pub correlation_fields: (Path, Path),
    pub correlation: CorrelationResult,
    pub damage_reduction: DamageReduction,
}

#[derive(Debug, Clone, Default)]
pub struct SessionAnalyzer {
    pub options: AnalysisOptions,
}

impl SessionAnalyzer {
    pub fn new(options: AnalysisOptions) -> Self {
        Self { options }
    }

    pub fn analyze(&self, session: &SessionData) -> SessionAnalysis {
        let snapshots = session.snapshots();
        debug!(
            snapshots = snapshots.len(),
            events = session.events().len(),
            "analyzing session"
        );

        let duples = DupleDetector::from_options(&self.options).find_related_duples(snapshots);
        let top_patterns = duples
            .most_significant(self.options.top_n)
            .into_iter()
            .cloned()
            .collect();

        let (x, y) = &self.options.correlation_fields;
        let correlation = series_correlation(snapshots, x, y);
        let damage_reduction =
            DamageQuery::from_options(&self.options).analyze(snapshots, session.events());

        SessionAnalysis {
            snapshot_count: snapshots.len(),
            event_count: session.events().len(),
            duples,
            top_patterns,
            correlation_fields: self.options.correlation_fields.clone(),
            correlation,
            damage_reduction,
        }
    }
}
