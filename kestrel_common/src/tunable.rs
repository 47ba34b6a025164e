//! Live-tunable parameter store interface.
//!
//! Commands read their tuning values from the store every tick and publish
//! their current values on start, so an operator can edit them between
//! ticks. Reads never fail: an absent or wrongly-typed key yields the
//! caller's default.

use std::collections::HashMap;

/// Value held by a parameter store entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
}

/// Named numeric/boolean values shared with the dashboard.
pub trait ParameterStore {
    fn get_number(&self, name: &str, default: f64) -> f64;
    fn put_number(&mut self, name: &str, value: f64);
    fn get_bool(&self, name: &str, default: bool) -> bool;
    fn put_bool(&mut self, name: &str, value: bool);
}

/// In-memory store used by the simulation host and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryParameterStore {
    entries: HashMap<String, ParamValue>,
}

impl MemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw entry lookup.
    pub fn entry(&self, name: &str) -> Option<ParamValue> {
        self.entries.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn remove(&mut self, name: &str) -> Option<ParamValue> {
        self.entries.remove(name)
    }

    // Only allocates the key the first time a name is written.
    fn put(&mut self, name: &str, value: ParamValue) {
        match self.entries.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                self.entries.insert(name.to_string(), value);
            }
        }
    }
}

impl ParameterStore for MemoryParameterStore {
    fn get_number(&self, name: &str, default: f64) -> f64 {
        match self.entries.get(name) {
            Some(ParamValue::Number(v)) if v.is_finite() => *v,
            _ => default,
        }
    }

    fn put_number(&mut self, name: &str, value: f64) {
        self.put(name, ParamValue::Number(value));
    }

    fn get_bool(&self, name: &str, default: bool) -> bool {
        match self.entries.get(name) {
            Some(ParamValue::Bool(b)) => *b,
            _ => default,
        }
    }

    fn put_bool(&mut self, name: &str, value: bool) {
        self.put(name, ParamValue::Bool(value));
    }
}
