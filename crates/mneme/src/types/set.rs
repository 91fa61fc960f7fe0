//! Set storage shared by `set` and `frozenset`.

use indexmap::IndexMap;

use crate::{exception::Exception, types::dict::Key, value::Value};

/// A Python set: unique elements under Python key equality, iterated in
/// insertion order so runs are deterministic.
#[derive(Debug, Clone, Default)]
pub struct Set {
    entries: IndexMap<Key, ()>,
}

impl Set {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts an element; duplicates are ignored. Unhashable values raise.
    pub fn insert(&mut self, value: Value) -> Result<(), Exception> {
        self.entries.entry(Key::new(value)?).or_insert(());
        Ok(())
    }

    pub fn contains(&self, value: &Value) -> Result<bool, Exception> {
        Ok(self.entries.contains_key(&Key::new(value.clone())?))
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    /// Removes an element preserving the order of the rest.
    pub fn remove(&mut self, value: &Value) -> Result<bool, Exception> {
        Ok(self.entries.shift_remove(&Key::new(value.clone())?).is_some())
    }

    /// Removes and returns the first element in insertion order.
    pub fn pop_first(&mut self) -> Option<Value> {
        self.entries.shift_remove_index(0).map(|(k, ())| k.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &())> {
        self.entries.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.keys().map(|k| &k.value)
    }

    pub fn is_subset(&self, other: &Self) -> bool {
        self.entries.keys().all(|k| other.contains_key(k))
    }

    pub fn union_with(&self, other: &Self) -> Self {
        let mut out = self.clone();
        for (k, ()) in other.iter() {
            out.entries.entry(k.clone()).or_insert(());
        }
        out
    }

    pub fn intersection_with(&self, other: &Self) -> Self {
        let mut out = Self::new();
        for (k, ()) in self.iter() {
            if other.contains_key(k) {
                out.entries.insert(k.clone(), ());
            }
        }
        out
    }

    pub fn difference_with(&self, other: &Self) -> Self {
        let mut out = Self::new();
        for (k, ()) in self.iter() {
            if !other.contains_key(k) {
                out.entries.insert(k.clone(), ());
            }
        }
        out
    }

    pub fn symmetric_difference_with(&self, other: &Self) -> Self {
        let mut out = self.difference_with(other);
        for (k, ()) in other.iter() {
            if !self.contains_key(k) {
                out.entries.insert(k.clone(), ());
            }
        }
        out
    }

    /// Structural equality regardless of insertion order.
    pub fn set_eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.is_subset(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_and_order() {
        let mut s = Set::new();
        s.insert(Value::Int(2)).unwrap();
        s.insert(Value::Int(1)).unwrap();
        s.insert(Value::Int(2)).unwrap();
        assert_eq!(s.len(), 2);
        let got: Vec<i64> = s
            .values()
            .map(|v| match v {
                Value::Int(i) => *i,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(got, [2, 1]);
    }

    #[test]
    fn algebra() {
        let mut a = Set::new();
        let mut b = Set::new();
        for i in 0..4 {
            a.insert(Value::Int(i)).unwrap();
        }
        for i in 2..6 {
            b.insert(Value::Int(i)).unwrap();
        }
        assert_eq!(a.intersection_with(&b).len(), 2);
        assert_eq!(a.union_with(&b).len(), 6);
        assert_eq!(a.difference_with(&b).len(), 2);
        assert_eq!(a.symmetric_difference_with(&b).len(), 4);
        assert!(a.intersection_with(&b).is_subset(&a));
    }
}
