use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::{join_u64, split_u64, LongFormat, Value};

/// An NBT-style record: ordered string keys mapping to typed values.
///
/// All getters are lenient: a missing key or a value of the wrong shape
/// reads as `None`, never an error. Malformed persisted state must degrade
/// to absent state rather than fail a load.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    entries: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn put(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Read a 64-bit counter, accepting native, non-negative signed, or
    /// split-halves encodings.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.entries.get(key)? {
            Value::Long(v) => Some(*v),
            Value::Int(v) if *v >= 0 => Some(*v as u64),
            Value::IntArray(halves) if halves.len() == 2 => {
                Some(join_u64([halves[0], halves[1]]))
            }
            _ => None,
        }
    }

    /// Write a 64-bit counter in the requested encoding.
    pub fn put_u64(&mut self, key: impl Into<String>, v: u64, format: LongFormat) {
        let value = match format {
            LongFormat::Native => Value::Long(v),
            LongFormat::Split => Value::IntArray(split_u64(v).to_vec()),
        };
        self.put(key, value);
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.entries.get(key)? {
            Value::Int(v) => Some(*v),
            Value::Long(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn put_i64(&mut self, key: impl Into<String>, v: i64) {
        self.put(key, Value::Int(v));
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        match self.entries.get(key)? {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn put_text(&mut self, key: impl Into<String>, v: impl Into<String>) {
        self.put(key, Value::Text(v.into()));
    }

    pub fn get_long_array(&self, key: &str) -> Option<&[u64]> {
        match self.entries.get(key)? {
            Value::LongArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn put_long_array(&mut self, key: impl Into<String>, v: Vec<u64>) {
        self.put(key, Value::LongArray(v));
    }

    pub fn get_list(&self, key: &str) -> Option<&[Record]> {
        match self.entries.get(key)? {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn put_list(&mut self, key: impl Into<String>, v: Vec<Record>) {
        self.put(key, Value::List(v));
    }

    pub fn get_record(&self, key: &str) -> Option<&Record> {
        match self.entries.get(key)? {
            Value::Compound(r) => Some(r),
            _ => None,
        }
    }

    pub fn put_record(&mut self, key: impl Into<String>, v: Record) {
        self.put(key, Value::Compound(v));
    }
}
