//! Scope index: origin -> names of its live records.
//!
//! Derived from the manifest at open and kept in step with every commit.
//! Never persisted.

use std::collections::{BTreeSet, HashMap};

use crate::origin::Origin;

#[derive(Debug, Clone, Default)]
pub struct ScopeIndex {
    by_origin: HashMap<Origin, BTreeSet<String>>,
    len: usize,
}

impl ScopeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys<'a, I>(keys: I) -> Self
    where
        I: IntoIterator<Item = (&'a Origin, &'a str)>,
    {
        let mut index = Self::new();
        for (origin, name) in keys {
            index.add(origin, name);
        }
        index
    }

    /// Returns false if the name was already present.
    pub fn add(&mut self, origin: &Origin, name: &str) -> bool {
        let inserted = self
            .by_origin
            .entry(origin.clone())
            .or_default()
            .insert(name.to_string());
        if inserted {
            self.len += 1;
        }
        inserted
    }

    pub fn remove(&mut self, origin: &Origin, name: &str) -> bool {
        let Some(names) = self.by_origin.get_mut(origin) else {
            return false;
        };
        let removed = names.remove(name);
        if names.is_empty() {
            self.by_origin.remove(origin);
        }
        if removed {
            self.len -= 1;
        }
        removed
    }

    /// Drops every name under `origin` and returns them.
    pub fn take_origin(&mut self, origin: &Origin) -> BTreeSet<String> {
        let names = self.by_origin.remove(origin).unwrap_or_default();
        self.len -= names.len();
        names
    }

    pub fn records_for(&self, origin: &Origin) -> BTreeSet<String> {
        self.by_origin.get(origin).cloned().unwrap_or_default()
    }

    pub fn contains(&self, origin: &Origin, name: &str) -> bool {
        self.by_origin
            .get(origin)
            .is_some_and(|names| names.contains(name))
    }

    /// Origins with at least one live record, sorted.
    pub fn origins(&self) -> Vec<Origin> {
        let mut origins: Vec<Origin> = self.by_origin.keys().cloned().collect();
        origins.sort();
        origins
    }

    pub fn origin_count(&self) -> usize {
        self.by_origin.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn o(s: &str) -> Origin {
        Origin::parse(s).unwrap()
    }

    #[test]
    fn add_remove_and_enumerate() {
        let mut idx = ScopeIndex::new();
        let a = o("https://a.example");
        let b = o("https://b.example");
        assert!(idx.add(&a, "zoom"));
        assert!(!idx.add(&a, "zoom"));
        idx.add(&a, "secret/login");
        idx.add(&b, "zoom");
        assert_eq!(idx.len(), 3);
        assert_eq!(
            idx.records_for(&a).into_iter().collect::<Vec<_>>(),
            vec!["secret/login".to_string(), "zoom".to_string()]
        );
        assert_eq!(idx.origins(), vec![a.clone(), b.clone()]);

        assert!(idx.remove(&b, "zoom"));
        assert!(!idx.remove(&b, "zoom"));
        assert_eq!(idx.origin_count(), 1);
        assert!(idx.records_for(&b).is_empty());
    }

    #[test]
    fn take_origin_keeps_others() {
        let a = o("https://a.example");
        let b = o("https://b.example");
        let mut idx = ScopeIndex::from_keys([(&a, "x"), (&a, "y"), (&b, "x")]);
        let taken = idx.take_origin(&a);
        assert_eq!(taken.len(), 2);
        assert_eq!(idx.len(), 1);
        assert!(idx.contains(&b, "x"));
        assert!(idx.take_origin(&a).is_empty());
    }
}
