//! Tagged value model for snapshot and event payloads.
//!
//! Log entries have no fixed schema, so every payload is a `Value`: a closed
//! set of kinds that analysis code matches on exhaustively. Objects keep their
//! insertion order and unique keys.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::Display;

use crate::error::ValueError;
use crate::path::Path;

/// The kind tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

/// A dynamically shaped, immutable payload.
///
/// Equality and dropping walk an explicit work list, so nesting depth is not
/// bounded by the native stack. `Clone`, `Debug` and serde conversions still
/// recurse; inputs parsed by `serde_json` are capped at 128 levels.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(Object),
}

/// Ordered key/value mapping with unique keys.
#[derive(Debug, Clone, Default)]
pub struct Object {
    entries: Vec<(String, Value)>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value. Replacing an existing key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Keep only the entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Value) -> bool) {
        self.entries.retain(|(k, v)| keep(k, v));
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut obj = Object::new();
        for (k, v) in iter {
            obj.insert(k, v);
        }
        obj
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    fn mismatch(&self, expected: ValueKind) -> ValueError {
        ValueError::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }

    pub fn as_bool(&self) -> Result<bool, ValueError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(other.mismatch(ValueKind::Bool)),
        }
    }

    pub fn as_number(&self) -> Result<f64, ValueError> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(other.mismatch(ValueKind::Number)),
        }
    }

    pub fn as_str(&self) -> Result<&str, ValueError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(other.mismatch(ValueKind::String)),
        }
    }

    pub fn as_array(&self) -> Result<&[Value], ValueError> {
        match self {
            Value::Array(items) => Ok(items),
            other => Err(other.mismatch(ValueKind::Array)),
        }
    }

    pub fn as_object(&self) -> Result<&Object, ValueError> {
        match self {
            Value::Object(obj) => Ok(obj),
            other => Err(other.mismatch(ValueKind::Object)),
        }
    }

    pub fn into_object(mut self) -> Result<Object, ValueError> {
        match &mut self {
            Value::Object(obj) => Ok(core::mem::take(obj)),
            other => Err(other.mismatch(ValueKind::Object)),
        }
    }

    /// Follow `path` through nested objects (and arrays, for numeric segments).
    pub fn get_path(&self, path: &Path) -> Option<&Value> {
        let mut current = self;
        for segment in path.segments() {
            current = match current {
                Value::Object(obj) => obj.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Numeric value at `path`; `None` when missing or not a number.
    pub fn number_at(&self, path: &Path) -> Option<f64> {
        match self.get_path(path)? {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

fn numbers_equal(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

/// Structural equality over an explicit work list, so deeply nested values
/// never grow the native stack. Object key order is not significant.
fn structurally_equal<'a>(mut pending: Vec<(&'a Value, &'a Value)>) -> bool {
    while let Some((a, b)) = pending.pop() {
        match (a, b) {
            (Value::Null, Value::Null) => {}
            (Value::Bool(x), Value::Bool(y)) if x == y => {}
            (Value::Number(x), Value::Number(y)) if numbers_equal(*x, *y) => {}
            (Value::String(x), Value::String(y)) if x == y => {}
            (Value::Array(xs), Value::Array(ys)) if xs.len() == ys.len() => {
                pending.extend(xs.iter().zip(ys.iter()));
            }
            (Value::Object(x), Value::Object(y)) if x.len() == y.len() => {
                for (key, xv) in x.iter() {
                    match y.get(key) {
                        Some(yv) => pending.push((xv, yv)),
                        None => return false,
                    }
                }
            }
            _ => return false,
        }
    }
    true
}

impl Drop for Value {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        match self {
            Value::Array(items) => pending.append(items),
            Value::Object(obj) => pending.extend(obj.entries.drain(..).map(|(_, v)| v)),
            _ => return,
        }
        // Children are emptied before they drop, so each drop is shallow.
        while let Some(mut value) = pending.pop() {
            match &mut value {
                Value::Array(items) => pending.append(items),
                Value::Object(obj) => pending.extend(obj.entries.drain(..).map(|(_, v)| v)),
                _ => {}
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        structurally_equal(vec![(self, other)])
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let mut pending = Vec::with_capacity(self.len());
        for (key, v) in self.iter() {
            match other.get(key) {
                Some(ov) => pending.push((v, ov)),
                None => return false,
            }
        }
        structurally_equal(pending)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Value::Object(obj)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            // Non-finite numbers have no JSON form.
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Object(obj) => serde_json::Value::Object(
                obj.iter()
                    .map(|(k, v)| (k.to_string(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(obj) => obj.serialize(serializer),
        }
    }
}

impl Serialize for Object {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        Value::from(json!({
            "player": {"health": 90, "wetness": 30.5, "inventory": ["map", "potion"]},
            "environment": {"current_area": "VOLCANO", "lava_present": true},
        }))
    }

    #[test]
    fn test_object_preserves_insertion_order() {
        let v = sample();
        let keys: Vec<&str> = v.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["player", "environment"]);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut obj = Object::new();
        obj.insert("a", Value::from(1));
        obj.insert("b", Value::from(2));
        let old = obj.insert("a", Value::from(3));
        assert_eq!(old, Some(Value::from(1)));
        assert_eq!(obj.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(obj.get("a"), Some(&Value::from(3)));
    }

    #[test]
    fn test_typed_accessor_mismatch() {
        let v = Value::from("LAVA");
        assert_eq!(v.as_str().unwrap(), "LAVA");
        assert_eq!(
            v.as_number(),
            Err(ValueError::TypeMismatch {
                expected: ValueKind::Number,
                found: ValueKind::String,
            })
        );
        assert!(matches!(
            Value::Null.as_object(),
            Err(ValueError::TypeMismatch { expected: ValueKind::Object, .. })
        ));
    }

    #[test]
    fn test_object_equality_ignores_key_order() {
        let a = Value::from(json!({"x": 1, "y": [1, 2]}));
        let b = Value::from(json!({"y": [1, 2], "x": 1}));
        assert_eq!(a, b);
        let c = Value::from(json!({"y": [2, 1], "x": 1}));
        assert_ne!(a, c);
    }

    #[test]
    fn test_nan_equals_itself() {
        let v = Value::Number(f64::NAN);
        assert_eq!(v, v.clone());
    }

    #[test]
    fn test_deeply_nested_equality_does_not_overflow() {
        let mut a = Value::Null;
        let mut b = Value::Null;
        for _ in 0..50_000 {
            a = Value::Array(vec![a]);
            b = Value::Array(vec![b]);
        }
        assert_eq!(a, b);
    }

    #[test]
    fn test_deeply_nested_values_drop() {
        let mut array = Value::Null;
        let mut object = Value::from(1);
        for _ in 0..200_000 {
            array = Value::Array(vec![array, Value::from(true)]);
            object = Value::Object([("n".to_string(), object)].into_iter().collect());
        }
        assert_eq!(array.kind(), ValueKind::Array);
        drop(array);
        drop(object);
    }

    #[test]
    fn test_into_object() {
        let obj = sample().into_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(
            Value::from(3).into_object(),
            Err(ValueError::TypeMismatch {
                expected: ValueKind::Object,
                found: ValueKind::Number,
            })
        );
    }

    #[test]
    fn test_get_path_and_number_at() {
        let v = sample();
        assert_eq!(v.number_at(&Path::parse("player.wetness")), Some(30.5));
        assert_eq!(
            v.get_path(&Path::parse("player.inventory.1")),
            Some(&Value::from("potion"))
        );
        assert_eq!(v.number_at(&Path::parse("environment.current_area")), None);
        assert_eq!(v.get_path(&Path::parse("player.mana")), None);
    }

    #[test]
    fn test_json_round_trip_keeps_order() {
        let v = sample();
        let text = serde_json::to_string(&v).unwrap();
        assert!(text.starts_with("{\"player\""));
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, v);
    }
}
