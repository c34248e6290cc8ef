//! Numeric series extracted from snapshot sequences.
//!
//! Snapshots missing a field (or holding a non-numeric value there) are
//! skipped; relative order is preserved.

use el_core::{Path, Snapshot};
use serde::Serialize;

/// Values of one field over time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    pub timestamps: Vec<f64>,
    pub values: Vec<f64>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Two fields sampled from the same snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlignedSeries {
    pub timestamps: Vec<f64>,
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

impl AlignedSeries {
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }
}

pub fn extract_series(snapshots: &[Snapshot], field: &Path) -> Series {
    let mut series = Series::default();
    for snap in snapshots {
        if let Some(v) = snap.number_at(field) {
            series.timestamps.push(snap.timestamp());
            series.values.push(v);
        }
    }
    series
}

/// Samples from snapshots that carry both fields.
pub fn extract_aligned(snapshots: &[Snapshot], x: &Path, y: &Path) -> AlignedSeries {
    let mut aligned = AlignedSeries::default();
    for snap in snapshots {
        if let (Some(xv), Some(yv)) = (snap.number_at(x), snap.number_at(y)) {
            aligned.timestamps.push(snap.timestamp());
            aligned.xs.push(xv);
            aligned.ys.push(yv);
        }
    }
    aligned
}

/// A step where a field moved by more than the detection threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub path: Path,
    pub timestamp: f64,
    pub previous_value: f64,
    pub new_value: f64,
}

impl FieldChange {
    pub fn delta(&self) -> f64 {
        self.new_value - self.previous_value
    }
}

/// Every step where `field` changes by strictly more than `threshold`.
pub fn detect_field_changes(snapshots: &[Snapshot], field: &Path, threshold: f64) -> Vec<FieldChange> {
    let series = extract_series(snapshots, field);
    series
        .values
        .windows(2)
        .zip(series.timestamps.iter().skip(1))
        .filter(|(w, _)| (w[1] - w[0]).abs() > threshold)
        .map(|(w, &timestamp)| FieldChange {
            path: field.clone(),
            timestamp,
            previous_value: w[0],
            new_value: w[1],
        })
        .collect()
}

/// Finite differences `Δvalue / Δt` over `window` samples.
///
/// Returns `(timestamp, rate)` pairs; spans with zero elapsed time are skipped.
/// Only indices present in both vectors are used.
pub fn rate_of_change(series: &Series, window: usize) -> Vec<(f64, f64)> {
    if window == 0 {
        return Vec::new();
    }
    let len = series.timestamps.len().min(series.values.len());
    (window..len)
        .filter_map(|i| {
            let dt = series.timestamps[i] - series.timestamps[i - window];
            let dv = series.values[i] - series.values[i - window];
            (dt != 0.0).then(|| (series.timestamps[i], dv / dt))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use el_core::Value;
    use serde_json::json;

    fn snap(t: f64, j: serde_json::Value) -> Snapshot {
        Snapshot::new(t, Value::from(j)).unwrap()
    }

    fn health_run() -> Vec<Snapshot> {
        vec![
            snap(0.0, json!({"player": {"health": 100, "wetness": 0}})),
            snap(1.0, json!({"player": {"health": 98}})),
            snap(2.0, json!({"player": {"health": 80, "wetness": "soaked"}})),
            snap(4.0, json!({"player": {"health": 79, "wetness": 40}})),
        ]
    }

    #[test]
    fn test_missing_and_non_numeric_are_skipped() {
        let wet = extract_series(&health_run(), &Path::parse("player.wetness"));
        assert_eq!(wet.values, vec![0.0, 40.0]);
        assert_eq!(wet.timestamps, vec![0.0, 4.0]);

        let aligned = extract_aligned(
            &health_run(),
            &Path::parse("player.health"),
            &Path::parse("player.wetness"),
        );
        assert_eq!(aligned.xs, vec![100.0, 79.0]);
        assert_eq!(aligned.ys, vec![0.0, 40.0]);
    }

    #[test]
    fn test_detect_field_changes_threshold() {
        let changes = detect_field_changes(&health_run(), &Path::parse("player.health"), 1.5);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].timestamp, 1.0);
        assert_eq!(changes[1].delta(), -18.0);
    }

    #[test]
    fn test_rate_of_change() {
        let series = Series {
            timestamps: vec![0.0, 1.0, 2.0, 2.0, 4.0],
            values: vec![100.0, 90.0, 80.0, 70.0, 60.0],
        };
        let rates = rate_of_change(&series, 1);
        // the 2.0 -> 2.0 step is skipped
        assert_eq!(rates, vec![(1.0, -10.0), (2.0, -10.0), (4.0, -5.0)]);
        assert_eq!(rate_of_change(&series, 2), vec![(2.0, -10.0), (2.0, -20.0), (4.0, -10.0)]);
        assert!(rate_of_change(&series, 0).is_empty());
        assert!(rate_of_change(&series, 9).is_empty());
    }

    #[test]
    fn test_rate_of_change_with_ragged_series() {
        let series = Series {
            timestamps: vec![0.0, 1.0],
            values: vec![10.0, 20.0, 30.0, 40.0],
        };
        assert_eq!(rate_of_change(&series, 1), vec![(1.0, 10.0)]);
        let series = Series {
            timestamps: vec![0.0, 1.0, 2.0],
            values: vec![10.0],
        };
        assert!(rate_of_change(&series, 1).is_empty());
    }
}
