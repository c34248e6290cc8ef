//! Correlation between snapshot fields, and damage-reduction analysis.
//!
//! Missing data never fails an analysis: too few samples or a constant
//! series produce an undefined coefficient, and ratios with a zero baseline
//! are left out.

use el_core::{Event, Path, Snapshot, Value};
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::debug;

use crate::options::{AnalysisOptions, SplitRule};
use crate::series::{extract_aligned, extract_series};

/// Strength and direction of a correlation coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Classification {
    StrongPositive,
    Positive,
    Weak,
    Negative,
    StrongNegative,
}

impl Classification {
    pub fn from_coefficient(r: f64) -> Self {
        if r >= 0.7 {
            Classification::StrongPositive
        } else if r >= 0.3 {
            Classification::Positive
        } else if r <= -0.7 {
            Classification::StrongNegative
        } else if r <= -0.3 {
            Classification::Negative
        } else {
            Classification::Weak
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CorrelationResult {
    /// `None` with fewer than two samples or a constant series.
    pub coefficient: Option<f64>,
    pub classification: Option<Classification>,
    pub sample_count: usize,
}

impl CorrelationResult {
    pub fn from_samples(xs: &[f64], ys: &[f64]) -> Self {
        let coefficient = pearson(xs, ys);
        Self {
            coefficient,
            classification: coefficient.map(Classification::from_coefficient),
            sample_count: xs.len().min(ys.len()),
        }
    }

    pub fn is_defined(&self) -> bool {
        self.coefficient.is_some()
    }
}

/// Pearson correlation coefficient, clamped to `[-1, 1]`.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let constant = |v: &[f64]| v.iter().all(|&x| x == v[0]);
    if constant(xs) || constant(ys) {
        return None;
    }
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    let r = sxy / (sxx * syy).sqrt();
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Correlate two dotted fields over the snapshots that carry both.
pub fn series_correlation(snapshots: &[Snapshot], x: &Path, y: &Path) -> CorrelationResult {
    let aligned = extract_aligned(snapshots, x, y);
    CorrelationResult::from_samples(&aligned.xs, &aligned.ys)
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Index of the timestamp closest to `t`; ties go to the earliest.
/// `timestamps` must be sorted ascending.
pub fn nearest_index(timestamps: &[f64], t: f64) -> Option<usize> {
    if timestamps.is_empty() {
        return None;
    }
    let idx = timestamps.partition_point(|&x| x < t);
    let best = if idx == 0 {
        0
    } else if idx == timestamps.len() {
        idx - 1
    } else if timestamps[idx] - t < t - timestamps[idx - 1] {
        idx
    } else {
        idx - 1
    };
    let target = timestamps[best];
    Some(timestamps.partition_point(|&x| x < target))
}

/// A damage event paired with the nearest snapshot's field value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DamageSample {
    pub timestamp: f64,
    pub amount: f64,
    pub paired_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DamageReduction {
    pub samples: Vec<DamageSample>,
    pub average_damage: Option<f64>,
    /// Correlation between the paired field and the damage amount.
    pub correlation: CorrelationResult,
    pub split_rule: SplitRule,
    pub split_value: Option<f64>,
    pub high_count: usize,
    pub low_count: usize,
    pub high_avg: Option<f64>,
    pub low_avg: Option<f64>,
    /// `(low_avg - high_avg) / low_avg * 100`; omitted when a group is empty
    /// or `low_avg` is zero.
    pub damage_reduction_pct: Option<f64>,
}

/// Which events count as damage and which snapshot field they pair with.
#[derive(Debug, Clone, PartialEq)]
pub struct DamageQuery {
    pub event_type: String,
    pub source_field: String,
    pub source: String,
    pub amount_field: String,
    pub paired_field: Path,
    pub split_rule: SplitRule,
}

impl Default for DamageQuery {
    fn default() -> Self {
        Self::from_options(&AnalysisOptions::default())
    }
}

impl DamageQuery {
    pub fn from_options(options: &AnalysisOptions) -> Self {
        Self {
            event_type: options.damage_event_type.clone(),
            source_field: options.damage_source_field.clone(),
            source: options.damage_source.clone(),
            amount_field: options.damage_amount_field.clone(),
            paired_field: options.paired_field.clone(),
            split_rule: options.split_rule,
        }
    }

    fn damage_amount(&self, event: &Event) -> Option<f64> {
        if event.kind() != self.event_type {
            return None;
        }
        match event.field(&self.source_field) {
            Some(Value::String(s)) if *s == self.source => {}
            _ => return None,
        }
        match event.field(&self.amount_field) {
            Some(Value::Number(n)) => Some(*n),
            other => {
                debug!(timestamp = event.timestamp(), ?other, "damage event without numeric amount");
                None
            }
        }
    }

    /// Pair matching damage events with snapshots and compare group averages.
    pub fn analyze(&self, snapshots: &[Snapshot], events: &[Event]) -> DamageReduction {
        let paired = extract_series(snapshots, &self.paired_field);

        let samples: Vec<DamageSample> = events
            .iter()
            .filter_map(|event| {
                let amount = self.damage_amount(event)?;
                let idx = nearest_index(&paired.timestamps, event.timestamp())?;
                Some(DamageSample {
                    timestamp: event.timestamp(),
                    amount,
                    paired_value: paired.values[idx],
                })
            })
            .collect();

        let amounts: Vec<f64> = samples.iter().map(|s| s.amount).collect();
        let values: Vec<f64> = samples.iter().map(|s| s.paired_value).collect();

        let split_value = match self.split_rule {
            SplitRule::Median => median(&values),
            SplitRule::Mean => mean(&values),
        };

        let (mut high, mut low) = (Vec::new(), Vec::new());
        if let Some(split) = split_value {
            for s in &samples {
                if s.paired_value > split {
                    high.push(s.amount);
                } else {
                    low.push(s.amount);
                }
            }
        }
        let high_avg = mean(&high);
        let low_avg = mean(&low);
        let damage_reduction_pct = match (low_avg, high_avg) {
            (Some(low), Some(high)) if low != 0.0 => {
                let pct = (low - high) / low * 100.0;
                pct.is_finite().then_some(pct)
            }
            _ => None,
        };

        DamageReduction {
            average_damage: mean(&amounts),
            correlation: CorrelationResult::from_samples(&values, &amounts),
            split_rule: self.split_rule,
            split_value,
            high_count: high.len(),
            low_count: low.len(),
            high_avg,
            low_avg,
            damage_reduction_pct,
            samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classification_boundaries() {
        assert_eq!(Classification::from_coefficient(0.7), Classification::StrongPositive);
        assert_eq!(Classification::from_coefficient(0.69), Classification::Positive);
        assert_eq!(Classification::from_coefficient(0.3), Classification::Positive);
        assert_eq!(Classification::from_coefficient(0.29), Classification::Weak);
        assert_eq!(Classification::from_coefficient(-0.29), Classification::Weak);
        assert_eq!(Classification::from_coefficient(-0.3), Classification::Negative);
        assert_eq!(Classification::from_coefficient(-0.7), Classification::StrongNegative);
        assert_eq!(Classification::StrongNegative.to_string(), "strong_negative");
    }

    #[test]
    fn test_pearson_basic() {
        let r = pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!((r - 1.0).abs() < 1e-12);
        let r = pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap();
        assert!((r + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_undefined_coefficients() {
        assert_eq!(pearson(&[1.0], &[1.0]), None);
        assert_eq!(pearson(&[], &[]), None);
        assert_eq!(pearson(&[5.0, 5.0, 5.0], &[1.0, 2.0, 3.0]), None);
        let result = CorrelationResult::from_samples(&[1.0], &[2.0]);
        assert!(!result.is_defined());
        assert_eq!(result.classification, None);
        assert_eq!(result.sample_count, 1);
    }

    #[test]
    fn test_nearest_index_ties_go_early() {
        let ts = [0.0, 10.0, 10.0, 20.0];
        assert_eq!(nearest_index(&ts, -5.0), Some(0));
        assert_eq!(nearest_index(&ts, 4.0), Some(0));
        assert_eq!(nearest_index(&ts, 5.0), Some(0));
        assert_eq!(nearest_index(&ts, 6.0), Some(1));
        assert_eq!(nearest_index(&ts, 10.0), Some(1));
        assert_eq!(nearest_index(&ts, 15.0), Some(1));
        assert_eq!(nearest_index(&ts, 99.0), Some(3));
        assert_eq!(nearest_index(&[], 1.0), None);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    fn snap(t: f64, wetness: f64) -> Snapshot {
        Snapshot::new(t, Value::from(json!({"player": {"wetness": wetness}}))).unwrap()
    }

    fn damage(t: f64, source: &str, amount: serde_json::Value) -> Event {
        Event::new(
            "PLAYER_DAMAGED",
            t,
            Value::from(json!({"source": source, "amount": amount})),
        )
        .unwrap()
    }

    #[test]
    fn test_events_filtered_by_source_and_amount() {
        let snapshots = vec![snap(0.0, 0.0), snap(10.0, 80.0)];
        let events = vec![
            damage(1.0, "LAVA", json!(50)),
            damage(2.0, "WATER", json!(10)),
            damage(9.0, "LAVA", json!("lots")),
            damage(9.5, "LAVA", json!(20)),
            Event::new("ENEMY_SPAWNED", 3.0, Value::from(json!({"source": "LAVA", "amount": 1})))
                .unwrap(),
        ];
        let result = DamageQuery::default().analyze(&snapshots, &events);
        assert_eq!(result.samples.len(), 2);
        assert_eq!(result.samples[0].paired_value, 0.0);
        assert_eq!(result.samples[1].paired_value, 80.0);
        assert_eq!(result.low_avg, Some(50.0));
        assert_eq!(result.high_avg, Some(20.0));
        assert_eq!(result.damage_reduction_pct, Some(60.0));
    }

    #[test]
    fn test_zero_baseline_is_omitted() {
        let snapshots = vec![snap(0.0, 0.0), snap(10.0, 80.0)];
        let events = vec![damage(0.0, "LAVA", json!(0)), damage(10.0, "LAVA", json!(5))];
        let result = DamageQuery::default().analyze(&snapshots, &events);
        assert_eq!(result.low_avg, Some(0.0));
        assert_eq!(result.damage_reduction_pct, None);
    }

    #[test]
    fn test_single_group_is_omitted() {
        let snapshots = vec![snap(0.0, 30.0)];
        let events = vec![damage(0.0, "LAVA", json!(40)), damage(1.0, "LAVA", json!(42))];
        let result = DamageQuery::default().analyze(&snapshots, &events);
        assert_eq!(result.high_count, 0);
        assert_eq!(result.low_count, 2);
        assert_eq!(result.damage_reduction_pct, None);
        assert!(!result.correlation.is_defined());
    }

    #[test]
    fn test_no_snapshots_means_no_samples() {
        let events = vec![damage(0.0, "LAVA", json!(40))];
        let result = DamageQuery::default().analyze(&[], &events);
        assert!(result.samples.is_empty());
        assert_eq!(result.average_damage, None);
        assert_eq!(result.split_value, None);
    }
}
