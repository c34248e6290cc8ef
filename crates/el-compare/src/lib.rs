//! Temporal snapshot comparison for Elemental game logs.
//!
//! Provides structural diffing of snapshots, co-changing field pair
//! ("duple") detection, series correlation and damage-reduction analysis,
//! and the center-outward "ouroboros" comparison of two log entities.

pub mod analysis;
pub mod correlation;
pub mod diff;
pub mod duple;
pub mod options;
pub mod ouroboros;
pub mod report;
pub mod resolver;
pub mod series;

pub use analysis::{SessionAnalysis, SessionAnalyzer};
pub use correlation::{Classification, CorrelationResult, DamageQuery, DamageReduction};
pub use diff::{ChangeRecord, Diff, StructuralComparison, compare_structures, diff, diff_snapshots};
pub use duple::{Duple, DupleDetector, DupleId, DupleTable, find_related_duples};
pub use options::{AnalysisOptions, OptionsError, SplitRule};
pub use ouroboros::{
    ComparisonMode, ComparisonNode, OuroborosComparator, SnapshotComparison, center_out_order,
    compare_snapshots,
};
pub use report::{Aggregate, ComparisonReport, ComparisonSummary, ReportError, ReportOutcome};
pub use resolver::{CachedResolver, EntityResolver, MemoryResolver, ResolveError};
pub use series::{Series, detect_field_changes, extract_series, rate_of_change};
