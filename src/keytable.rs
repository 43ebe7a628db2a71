//! Hash table keyed by a (string, integer) pair
//!
//! Used for all per-(document, query) bookkeeping. The string part is
//! interned so that the table itself only hashes integer pairs, and
//! entries are stored densely so that each key also gets a stable
//! entry number.

use std::collections::HashMap;

use crate::base::Len;
use crate::interner::StringInterner;

struct Entry<V> {
    key: usize,
    number: usize,
    value: V,
}

pub struct CompositeKeyTable<V> {
    keys: StringInterner,
    slots: HashMap<(usize, usize), usize>,
    entries: Vec<Entry<V>>,
}

impl<V> Default for CompositeKeyTable<V> {
    fn default() -> Self {
        Self {
            keys: StringInterner::new(),
            slots: HashMap::new(),
            entries: Vec::new(),
        }
    }
}

impl<V> CompositeKeyTable<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find-or-insert: returns the value slot and whether the key was
    /// already present
    pub fn update(&mut self, key: &str, number: usize) -> (&mut V, bool)
    where
        V: Default,
    {
        let key_id = self.keys.get_id(key);
        let (ix, found) = match self.slots.get(&(key_id, number)) {
            Some(&ix) => (ix, true),
            None => {
                let ix = self.entries.len();
                self.entries.push(Entry {
                    key: key_id,
                    number,
                    value: V::default(),
                });
                self.slots.insert((key_id, number), ix);
                (ix, false)
            }
        };
        (&mut self.entries[ix].value, found)
    }

    /// Returns the entry number of a key
    fn position(&self, key: &str, number: usize) -> Option<usize> {
        let key_id = self.keys.lookup_id(key)?;
        self.slots.get(&(key_id, number)).copied()
    }

    pub fn get(&self, key: &str, number: usize) -> Option<&V> {
        self.position(key, number).map(|ix| &self.entries[ix].value)
    }

    /// Iterates over (string, integer, value) triples
    ///
    /// The order is the insertion order, and hence stable as long as no
    /// key is added.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize, &V)> + '_ {
        self.entries.iter().map(move |e| {
            (
                self.keys.get_str(e.key).unwrap_or_default(),
                e.number,
                &e.value,
            )
        })
    }
}

impl<V> Len for CompositeKeyTable<V> {
    fn len(&self) -> usize {
        self.entries.len()
    }
}
