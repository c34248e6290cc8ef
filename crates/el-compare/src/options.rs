//! Analysis options and configuration file loading.
//!
//! Options can come from `Default`, from JSON via serde, or from an rc-style
//! file:
//!
//! ```text
//! # comments and blank lines are ignored
//! OPTIONS=min_occurrences:3,top_n:10
//! OPTIONS=depth_limit:2,damage_source:LAVA
//! ```

use std::path::Path as FsPath;

use el_core::Path;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// How damage samples are split into a "high" and a "low" group.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SplitRule {
    /// Split at the median of the paired field.
    #[default]
    Median,
    /// Split at the arithmetic mean of the paired field.
    Mean,
}

/// Tunables for every analysis in this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    // Duple detection
    /// Minimum co-change count for a duple to be kept.
    pub min_occurrences: u64,
    /// Threshold used for per-entity tables in co-occurrence comparisons.
    pub co_occurrence_min_occurrences: u64,
    /// Size of ranked views (`most_significant`, `top_changes`).
    pub top_n: usize,
    /// Examples recorded per duple.
    pub max_examples_per_duple: usize,
    /// Transitions with more changed paths contribute no pairs (None = uncapped).
    pub max_changes_per_transition: Option<usize>,

    // Ouroboros traversal
    /// Expansion rings visited after the center (None = all).
    pub depth_limit: Option<usize>,

    // Damage-reduction analysis
    /// Event type counted as damage.
    pub damage_event_type: String,
    /// Event data key naming the damage source.
    pub damage_source_field: String,
    /// Source value selecting the events to analyze.
    pub damage_source: String,
    /// Event data key holding the damage amount.
    pub damage_amount_field: String,
    /// Snapshot field paired with each damage event.
    pub paired_field: Path,
    /// Where samples are split into high and low groups.
    pub split_rule: SplitRule,

    // Series correlation
    /// Field pair correlated by session analysis.
    pub correlation_fields: (Path, Path),
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            min_occurrences: 2,
            co_occurrence_min_occurrences: 1,
            top_n: 5,
            max_examples_per_duple: 8,
            max_changes_per_transition: None,

            depth_limit: None,

            damage_event_type: "PLAYER_DAMAGED".to_string(),
            damage_source_field: "source".to_string(),
            damage_source: "LAVA".to_string(),
            damage_amount_field: "amount".to_string(),
            paired_field: Path::parse("player.wetness"),
            split_rule: SplitRule::Median,

            correlation_fields: (
                Path::parse("player.wetness"),
                Path::parse("player.fire_resistance"),
            ),
        }
    }
}

/// Options parsing error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Unknown option: {0}")]
    UnknownOption(String),

    #[error("Invalid value '{value}' for option '{option}'")]
    InvalidValue { option: String, value: String },

    #[error("Missing value for option '{0}'")]
    MissingValue(String),
}

fn invalid(option: &str, value: &str) -> OptionsError {
    OptionsError::InvalidValue {
        option: option.to_string(),
        value: value.to_string(),
    }
}

fn parse_num<T: core::str::FromStr>(option: &str, value: &str) -> Result<T, OptionsError> {
    value.parse().map_err(|_| invalid(option, value))
}

fn parse_limit(option: &str, value: &str) -> Result<Option<usize>, OptionsError> {
    match value {
        "none" | "unbounded" => Ok(None),
        _ => parse_num(option, value).map(Some),
    }
}

impl AnalysisOptions {
    /// Load options from an rc-style file
    pub fn load_from_file(path: &FsPath) -> Result<Self, OptionsError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| OptionsError::Io(e.to_string()))?;
        Self::parse_config(&contents)
    }

    /// Parse options from rc-style text
    pub fn parse_config(contents: &str) -> Result<Self, OptionsError> {
        let mut options = Self::default();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(opts) = line.strip_prefix("OPTIONS=") {
                for opt in opts.split(',').map(str::trim).filter(|o| !o.is_empty()) {
                    options.parse_option(opt)?;
                }
            }
        }

        Ok(options)
    }

    fn parse_option(&mut self, opt: &str) -> Result<(), OptionsError> {
        let (key, value) = opt
            .split_once(':')
            .or_else(|| opt.split_once('='))
            .ok_or_else(|| OptionsError::MissingValue(opt.to_string()))?;
        self.set_option(key.trim(), value.trim())
    }

    fn set_option(&mut self, key: &str, value: &str) -> Result<(), OptionsError> {
        if value.is_empty() {
            return Err(OptionsError::MissingValue(key.to_string()));
        }
        match key {
            "min_occurrences" => self.min_occurrences = parse_num(key, value)?,
            "co_occurrence_min_occurrences" => {
                self.co_occurrence_min_occurrences = parse_num(key, value)?
            }
            "top_n" => self.top_n = parse_num(key, value)?,
            "max_examples_per_duple" => self.max_examples_per_duple = parse_num(key, value)?,
            "max_changes_per_transition" => {
                self.max_changes_per_transition = parse_limit(key, value)?
            }
            "depth_limit" => self.depth_limit = parse_limit(key, value)?,
            "damage_event_type" => self.damage_event_type = value.to_string(),
            "damage_source_field" => self.damage_source_field = value.to_string(),
            "damage_source" => self.damage_source = value.to_string(),
            "damage_amount_field" => self.damage_amount_field = value.to_string(),
            "paired_field" => self.paired_field = Path::parse(value),
            "split_rule" => self.split_rule = value.parse().map_err(|_| invalid(key, value))?,
            "correlation_fields" => {
                let (x, y) = value.split_once('+').ok_or_else(|| invalid(key, value))?;
                self.correlation_fields = (Path::parse(x.trim()), Path::parse(y.trim()));
            }
            _ => return Err(OptionsError::UnknownOption(key.to_string())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = AnalysisOptions::default();
        assert_eq!(opts.min_occurrences, 2);
        assert_eq!(opts.depth_limit, None);
        assert_eq!(opts.damage_source, "LAVA");
        assert_eq!(opts.paired_field.canonical(), "player.wetness");
        assert_eq!(opts.split_rule, SplitRule::Median);
    }

    #[test]
    fn test_parse_config() {
        let text = "\
# analysis settings
OPTIONS=min_occurrences:3, top_n=10
OPTIONS=depth_limit:2,max_changes_per_transition:none
OPTIONS=split_rule:mean,correlation_fields:player.health+player.wetness
";
        let opts = AnalysisOptions::parse_config(text).unwrap();
        assert_eq!(opts.min_occurrences, 3);
        assert_eq!(opts.top_n, 10);
        assert_eq!(opts.depth_limit, Some(2));
        assert_eq!(opts.max_changes_per_transition, None);
        assert_eq!(opts.split_rule, SplitRule::Mean);
        assert_eq!(opts.correlation_fields.0.canonical(), "player.health");
        assert_eq!(opts.correlation_fields.1.canonical(), "player.wetness");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            AnalysisOptions::parse_config("OPTIONS=colour:blue"),
            Err(OptionsError::UnknownOption("colour".into()))
        );
        assert!(matches!(
            AnalysisOptions::parse_config("OPTIONS=top_n:many"),
            Err(OptionsError::InvalidValue { .. })
        ));
        assert_eq!(
            AnalysisOptions::parse_config("OPTIONS=top_n"),
            Err(OptionsError::MissingValue("top_n".into()))
        );
        assert!(matches!(
            AnalysisOptions::load_from_file(FsPath::new("/nonexistent/el.rc")),
            Err(OptionsError::Io(_))
        ));
    }

    #[test]
    fn test_json_options_fill_defaults() {
        let opts: AnalysisOptions =
            serde_json::from_str(r#"{"min_occurrences": 4, "paired_field": "player.health"}"#)
                .unwrap();
        assert_eq!(opts.min_occurrences, 4);
        assert_eq!(opts.paired_field.canonical(), "player.health");
        assert_eq!(opts.top_n, 5);
    }
}
