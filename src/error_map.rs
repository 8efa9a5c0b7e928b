//! Path-keyed error aggregation
//!
//! Extraction walks a tree of selectors and followed URLs. A failure in one
//! branch must not hide the results of its siblings, so branch failures are
//! collected here under the key of the branch (selector name, `name#index`
//! or followed URL) instead of aborting the walk.
//!
//! Keys are never overwritten: the first error keeps the bare key, later ones
//! get `#1`, `#2`, ... appended in the order they were added.

use crate::TrawlError;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// A single entry of an [`ErrorMap`]
#[derive(Debug)]
pub enum ErrorEntry {
    /// A plain error
    Leaf(TrawlError),
    /// The errors of a nested branch
    Nested(ErrorMap),
}

impl ErrorEntry {
    /// Returns the leaf error, if this entry is one
    pub fn as_leaf(&self) -> Option<&TrawlError> {
        match self {
            Self::Leaf(err) => Some(err),
            Self::Nested(_) => None,
        }
    }

    /// Returns the nested errors, if this entry is a branch
    pub fn as_nested(&self) -> Option<&ErrorMap> {
        match self {
            Self::Leaf(_) => None,
            Self::Nested(errs) => Some(errs),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Leaf(err) => Value::String(err.to_string()),
            Self::Nested(errs) => errs.to_json(),
        }
    }
}

/// Ordered, path-keyed collection of errors
#[derive(Debug, Default)]
pub struct ErrorMap {
    entries: Vec<(String, ErrorEntry)>,
}

impl ErrorMap {
    /// Creates an empty error map
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an error under `key`
    ///
    /// An empty key or an empty aggregate is ignored. Aggregates are nested
    /// under the key instead of being flattened into this map.
    pub fn add(&mut self, key: impl Into<String>, err: impl Into<TrawlError>) {
        let key = key.into();
        if key.is_empty() {
            return;
        }

        let entry = match err.into() {
            TrawlError::Aggregate(errs) if errs.is_empty() => return,
            TrawlError::Aggregate(errs) => ErrorEntry::Nested(errs),
            err => ErrorEntry::Leaf(err),
        };

        let key = self.free_key(key);
        self.entries.push((key, entry));
    }

    /// Records the error of `result` under `key` and returns its value otherwise
    pub fn add_result<T>(
        &mut self,
        key: impl Into<String>,
        result: Result<T, TrawlError>,
    ) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.add(key, err);
                None
            }
        }
    }

    /// Returns the entry stored under `key`
    pub fn get(&self, key: &str) -> Option<&ErrorEntry> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, entry)| entry)
    }

    /// Returns true if an entry is stored under `key`
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Returns the keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Returns the number of top-level entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no error was recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Converts the map into `Ok(value)` when empty, `Err(Aggregate)` otherwise
    pub fn into_result<T>(self, value: T) -> Result<T, TrawlError> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(TrawlError::Aggregate(self))
        }
    }

    /// Converts the map into `None` when empty
    pub fn into_option(self) -> Option<Self> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }

    /// Renders the map as a JSON object of messages, nested for branches
    ///
    /// Keys keep their insertion order.
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        for (key, entry) in &self.entries {
            object.insert(key.clone(), entry.to_json());
        }
        Value::Object(object)
    }

    fn free_key(&self, key: String) -> String {
        if !self.contains_key(&key) {
            return key;
        }

        let mut suffix = 1usize;
        loop {
            let candidate = format!("{}#{}", key, suffix);
            if !self.contains_key(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

impl fmt::Display for ErrorMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Insertion order, independent of serde_json's map ordering.
        write!(f, "{{")?;
        for (i, (key, entry)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}:", Value::String(key.clone()))?;
            match entry {
                ErrorEntry::Leaf(err) => write!(f, "{}", Value::String(err.to_string()))?,
                ErrorEntry::Nested(errs) => write!(f, "{}", errs)?,
            }
        }
        write!(f, "}}")
    }
}

impl Serialize for ErrorMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, entry) in &self.entries {
            match entry {
                ErrorEntry::Leaf(err) => map.serialize_entry(key, &err.to_string())?,
                ErrorEntry::Nested(errs) => map.serialize_entry(key, errs)?,
            }
        }
        map.end()
    }
}

impl From<ErrorMap> for TrawlError {
    fn from(errs: ErrorMap) -> Self {
        TrawlError::Aggregate(errs)
    }
}
