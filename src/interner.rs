//! Mapping between strings and dense sequential identifiers

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::base::Len;

/// Assigns 0-based identifiers to strings in first-seen order.
///
/// Identifiers are never reused: there is no deletion.
#[derive(Default, Clone, Serialize, Deserialize)]
pub struct StringInterner {
    ids: HashMap<String, usize>,
    strings: Vec<String>,
}

impl StringInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the identifier of `s`, assigning the next one if unseen
    pub fn get_id(&mut self, s: &str) -> usize {
        if let Some(&id) = self.ids.get(s) {
            return id;
        }
        let id = self.strings.len();
        self.strings.push(s.to_string());
        self.ids.insert(s.to_string(), id);
        id
    }

    /// Read-only lookup
    pub fn lookup_id(&self, s: &str) -> Option<usize> {
        self.ids.get(s).copied()
    }

    /// Inverse mapping
    pub fn get_str(&self, id: usize) -> Option<&str> {
        self.strings.get(id).map(|s| s.as_str())
    }

    /// Strings in identifier order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.strings.iter().enumerate().map(|(id, s)| (id, s.as_str()))
    }
}

impl Len for StringInterner {
    fn len(&self) -> usize {
        self.strings.len()
    }
}

impl<'a> FromIterator<&'a str> for StringInterner {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        let mut interner = StringInterner::new();
        for s in iter {
            interner.get_id(s);
        }
        interner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids() {
        let mut interner = StringInterner::new();
        assert_eq!(interner.get_id("401"), 0);
        assert_eq!(interner.get_id("402"), 1);
        assert_eq!(interner.get_id("401"), 0);
        assert_eq!(interner.get_id("403"), 2);
        assert_eq!(interner.len(), 3);
    }

    #[test]
    fn test_lookup() {
        let interner: StringInterner = ["a", "b"].into_iter().collect();
        assert_eq!(interner.lookup_id("b"), Some(1));
        assert_eq!(interner.lookup_id("c"), None);
        assert_eq!(interner.get_str(0), Some("a"));
        assert_eq!(interner.get_str(2), None);
        assert_eq!(interner.len(), 2);
    }
}
