//! Generic sync values and the field-tagged maps built from them.
//!
//! Entity state crosses the network as [`SyncMap`] blobs: string-keyed maps
//! of loosely typed values. New fields can be added without breaking older
//! decoders because every accessor tolerates a missing (or wrong-typed) key
//! by returning a default.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned box: position plus size.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Bounds {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }
}

/// One replicated value. The `Map` variant nests a whole blob, which is how
/// application-defined structured data rides along.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Str(String),
    Vec2(Vec2),
    Map(HashMap<String, SyncValue>),
}

/// A string-keyed map of [`SyncValue`]s.
///
/// Typed getters return a caller default when the key is absent or holds a
/// value of a different type, so decoders never fail on missing fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SyncMap {
    values: HashMap<String, SyncValue>,
}

impl SyncMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.values.insert(key.to_string(), SyncValue::Bool(value));
    }

    pub fn set_int(&mut self, key: &str, value: i32) {
        self.values.insert(key.to_string(), SyncValue::Int(value));
    }

    pub fn set_float(&mut self, key: &str, value: f32) {
        self.values.insert(key.to_string(), SyncValue::Float(value));
    }

    pub fn set_str(&mut self, key: &str, value: &str) {
        self.values
            .insert(key.to_string(), SyncValue::Str(value.to_string()));
    }

    pub fn set_vec2(&mut self, key: &str, value: Vec2) {
        self.values.insert(key.to_string(), SyncValue::Vec2(value));
    }

    pub fn set_map(&mut self, key: &str, value: SyncMap) {
        self.values
            .insert(key.to_string(), SyncValue::Map(value.values));
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get_bool_or(key, false)
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(SyncValue::Bool(v)) => *v,
            _ => default,
        }
    }

    pub fn get_int(&self, key: &str) -> i32 {
        self.get_int_or(key, 0)
    }

    pub fn get_int_or(&self, key: &str, default: i32) -> i32 {
        match self.values.get(key) {
            Some(SyncValue::Int(v)) => *v,
            _ => default,
        }
    }

    pub fn get_float(&self, key: &str) -> f32 {
        self.get_float_or(key, 0.0)
    }

    pub fn get_float_or(&self, key: &str, default: f32) -> f32 {
        match self.values.get(key) {
            Some(SyncValue::Float(v)) => *v,
            _ => default,
        }
    }

    pub fn get_str(&self, key: &str) -> String {
        self.get_str_or(key, "")
    }

    pub fn get_str_or(&self, key: &str, default: &str) -> String {
        match self.values.get(key) {
            Some(SyncValue::Str(v)) => v.clone(),
            _ => default.to_string(),
        }
    }

    pub fn get_vec2(&self, key: &str) -> Vec2 {
        self.get_vec2_or(key, Vec2::default())
    }

    pub fn get_vec2_or(&self, key: &str, default: Vec2) -> Vec2 {
        match self.values.get(key) {
            Some(SyncValue::Vec2(v)) => *v,
            _ => default,
        }
    }

    pub fn get_map(&self, key: &str) -> SyncMap {
        match self.values.get(key) {
            Some(SyncValue::Map(v)) => SyncMap { values: v.clone() },
            _ => SyncMap::new(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Replaces the whole contents with a copy of `other`.
    pub fn overwrite_from(&mut self, other: &SyncMap) {
        self.values.clear();
        self.values
            .extend(other.values.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}
