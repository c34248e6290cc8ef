//! Structural snapshot diffing.
//!
//! Compares two `Value` trees and produces a flat list of `ChangeRecord`s, one
//! per changed leaf. Unchanged leaves ("dust") are dropped, which keeps the
//! result small relative to the snapshots and is what makes pairwise duple
//! detection affordable.
//!
//! Traversal uses an explicit work stack, so nesting depth costs heap, not
//! native stack.

use std::collections::BTreeSet;

use el_core::{Path, Snapshot, Value};
use serde::Serialize;

/// A single changed location between two values.
///
/// `None` means the key is absent on that side, which is different from a
/// present `Value::Null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRecord {
    pub path: Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl ChangeRecord {
    pub fn is_addition(&self) -> bool {
        self.previous.is_none()
    }

    pub fn is_removal(&self) -> bool {
        self.current.is_none()
    }
}

fn show(v: &Option<Value>) -> String {
    match v {
        Some(v) => serde_json::to_string(v).unwrap_or_else(|_| "?".into()),
        None => "<absent>".into(),
    }
}

impl core::fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}: {} -> {}",
            self.path,
            show(&self.previous),
            show(&self.current)
        )
    }
}

/// All changes between two values, in traversal order. Paths are unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Diff {
    records: Vec<ChangeRecord>,
}

impl Diff {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.records.iter().map(|r| &r.path)
    }

    /// The set of changed paths.
    pub fn path_set(&self) -> BTreeSet<Path> {
        self.paths().cloned().collect()
    }

    pub fn get(&self, path: &Path) -> Option<&ChangeRecord> {
        self.records.iter().find(|r| &r.path == path)
    }
}

impl IntoIterator for Diff {
    type Item = ChangeRecord;
    type IntoIter = std::vec::IntoIter<ChangeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

enum Pending<'a> {
    Pair(Path, &'a Value, &'a Value),
    Added(Path, &'a Value),
    Removed(Path, &'a Value),
}

/// Diff two values rooted at `prefix`.
pub fn diff(previous: &Value, current: &Value, prefix: &Path) -> Diff {
    diff_at(previous, current, prefix, None)
}

/// Diff two values, stamping every record with `timestamp`.
///
/// Objects are walked over the union of their keys: the current side's key
/// order first, then keys only present on the previous side. Any other pair
/// (scalars, arrays, or mismatched kinds) is compared as a whole and yields at
/// most one record at its path.
pub fn diff_at(previous: &Value, current: &Value, prefix: &Path, timestamp: Option<f64>) -> Diff {
    let mut records = Vec::new();
    let mut work = vec![Pending::Pair(prefix.clone(), previous, current)];

    while let Some(item) = work.pop() {
        match item {
            Pending::Pair(path, Value::Object(prev), Value::Object(curr)) => {
                let mut children = Vec::with_capacity(curr.len());
                for (key, cv) in curr.iter() {
                    let child = path.child(key);
                    children.push(match prev.get(key) {
                        Some(pv) => Pending::Pair(child, pv, cv),
                        None => Pending::Added(child, cv),
                    });
                }
                for (key, pv) in prev.iter() {
                    if !curr.contains_key(key) {
                        children.push(Pending::Removed(path.child(key), pv));
                    }
                }
                // Reverse so the stack pops children in key order.
                work.extend(children.into_iter().rev());
            }
            Pending::Pair(path, prev, curr) => {
                if prev != curr {
                    records.push(ChangeRecord {
                        path,
                        previous: Some(prev.clone()),
                        current: Some(curr.clone()),
                        timestamp,
                    });
                }
            }
            Pending::Added(path, curr) => records.push(ChangeRecord {
                path,
                previous: None,
                current: Some(curr.clone()),
                timestamp,
            }),
            Pending::Removed(path, prev) => records.push(ChangeRecord {
                path,
                previous: Some(prev.clone()),
                current: None,
                timestamp,
            }),
        }
    }

    Diff { records }
}

/// Diff two consecutive snapshots; records carry the later snapshot's timestamp.
pub fn diff_snapshots(previous: &Snapshot, current: &Snapshot) -> Diff {
    diff_at(
        previous.state(),
        current.state(),
        &Path::root(),
        Some(current.timestamp()),
    )
}

/// Shape-level comparison of two arbitrary values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuralComparison {
    Objects {
        common_keys: Vec<String>,
        only_in_first: Vec<String>,
        only_in_second: Vec<String>,
        differences: Diff,
    },
    Arrays {
        length_diff: i64,
        common_length: usize,
        /// Differences at the first, middle and last shared index.
        sample_differences: Vec<(usize, Diff)>,
    },
    Values {
        equal: bool,
        first: Value,
        second: Value,
    },
}

/// Compare two values by shape: key sets for objects, sampled elements for arrays.
pub fn compare_structures(first: &Value, second: &Value) -> StructuralComparison {
    match (first, second) {
        (Value::Object(a), Value::Object(b)) => StructuralComparison::Objects {
            common_keys: a
                .keys()
                .filter(|k| b.contains_key(k))
                .map(String::from)
                .collect(),
            only_in_first: a
                .keys()
                .filter(|k| !b.contains_key(k))
                .map(String::from)
                .collect(),
            only_in_second: b
                .keys()
                .filter(|k| !a.contains_key(k))
                .map(String::from)
                .collect(),
            differences: diff(first, second, &Path::root()),
        },
        (Value::Array(a), Value::Array(b)) => {
            let common_length = a.len().min(b.len());
            let mut indices = BTreeSet::new();
            if common_length > 0 {
                indices.insert(0);
                indices.insert(common_length - 1);
            }
            if common_length > 2 {
                indices.insert(common_length / 2);
            }
            let sample_differences = indices
                .into_iter()
                .filter_map(|i| {
                    let d = diff(&a[i], &b[i], &Path::root().child(i.to_string()));
                    (!d.is_empty()).then_some((i, d))
                })
                .collect();
            StructuralComparison::Arrays {
                length_diff: a.len() as i64 - b.len() as i64,
                common_length,
                sample_differences,
            }
        }
        _ => StructuralComparison::Values {
            equal: first == second,
            first: first.clone(),
            second: second.clone(),
        },
    }
}
