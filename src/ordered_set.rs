//! Insertion-ordered string set.
//!
//! Serialized as a plain JSON array. Duplicates in the input are dropped
//! on load, keeping the first occurrence.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct OrderedSet {
    items: Vec<String>,
    index: HashSet<String>,
}

impl OrderedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning false if it was already present
    pub fn insert(&mut self, value: impl Into<String>) -> bool {
        let value = value.into();
        if self.index.contains(&value) {
            return false;
        }
        self.index.insert(value.clone());
        self.items.push(value);
        true
    }

    pub fn contains(&self, value: &str) -> bool {
        self.index.contains(value)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }
}

/// Equality ignores insertion order
impl PartialEq for OrderedSet {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for OrderedSet {}

impl<S: Into<String>> FromIterator<S> for OrderedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = OrderedSet::new();
        for item in iter {
            set.insert(item);
        }
        set
    }
}

impl Serialize for OrderedSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for OrderedSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<String>::deserialize(deserializer)?;
        Ok(items.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_dedupes() {
        let mut set = OrderedSet::new();
        assert!(set.insert("a"));
        assert!(set.insert("b"));
        assert!(!set.insert("a"));
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_deserialize_drops_duplicates() {
        let set: OrderedSet = serde_json::from_str(r#"["x", "y", "x", "z"]"#).unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["x", "y", "z"]);
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["x","y","z"]"#);
    }

    #[test]
    fn test_equality_ignores_order() {
        let a: OrderedSet = ["one", "two"].into_iter().collect();
        let b: OrderedSet = ["two", "one"].into_iter().collect();
        assert_eq!(a, b);
    }
}
