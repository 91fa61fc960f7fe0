//! Insertion-ordered dictionaries with Python key semantics.
//!
//! Keys compare the way Python compares them: `1`, `1.0` and `True` are the
//! same key, strings hash by content, tuples hash element-wise, and
//! unhashable values (lists, dicts, sets) are rejected with `TypeError`.

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    rc::Rc,
};

use indexmap::IndexMap;
use num_traits::ToPrimitive;

use crate::{
    exception::Exception,
    value::{type_name, Value},
};

/// A hashable dict/set key wrapping the original value.
///
/// Hash and equality follow Python rules, precomputed at construction so the
/// map never re-derives them. Instances and other identity-like values hash
/// by pointer.
#[derive(Debug, Clone)]
pub struct Key {
    pub value: Value,
    hash: u64,
}

impl Key {
    /// Builds a key, rejecting unhashable values.
    pub fn new(value: Value) -> Result<Self, Exception> {
        let mut hasher = DefaultHasher::new();
        hash_value(&value, &mut hasher)?;
        let hash = hasher.finish();
        Ok(Self { value, hash })
    }
}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        key_eq(&self.value, &other.value)
    }
}

impl Eq for Key {}

/// Python hash for a value, or `TypeError` for unhashable kinds.
fn hash_value(value: &Value, hasher: &mut DefaultHasher) -> Result<(), Exception> {
    match value {
        Value::None => hasher.write_u8(0),
        // bool hashes as the int it equals
        Value::Bool(b) => hash_i64(i64::from(*b), hasher),
        Value::Int(i) => hash_i64(*i, hasher),
        Value::BigInt(b) => {
            hasher.write_u8(1);
            b.to_signed_bytes_le().hash(hasher);
        }
        Value::Float(f) => {
            // an integral float must hash like the int it equals
            if f.fract() == 0.0 && *f >= -(2f64.powi(62)) && *f <= 2f64.powi(62) {
                hash_i64(*f as i64, hasher);
            } else {
                hasher.write_u8(2);
                hasher.write_u64(f.to_bits());
            }
        }
        Value::Str(s) => {
            hasher.write_u8(3);
            s.hash(hasher);
        }
        Value::Tuple(items) => {
            hasher.write_u8(4);
            for item in items.iter() {
                hash_value(item, hasher)?;
            }
        }
        Value::FrozenSet(set) => {
            hasher.write_u8(5);
            // order-insensitive combination
            let mut acc: u64 = 0;
            for (key, _) in set.iter() {
                let mut h = DefaultHasher::new();
                hash_value(&key.value, &mut h)?;
                acc ^= h.finish();
            }
            hasher.write_u64(acc);
        }
        Value::Range { start, stop, step } => {
            hasher.write_u8(6);
            hasher.write_i64(*start);
            hasher.write_i64(*stop);
            hasher.write_i64(*step);
        }
        // identity-hashed values
        Value::Instance(inst) => hasher.write_usize(Rc::as_ptr(inst) as usize),
        Value::Class(class) => hasher.write_usize(Rc::as_ptr(class) as usize),
        Value::Function(func) => hasher.write_usize(Rc::as_ptr(func) as usize),
        Value::Builtin(b) => {
            hasher.write_u8(7);
            b.name().hash(hasher);
        }
        Value::List(_) | Value::Dict(_) | Value::Set(_) | Value::Deque(_) => {
            return Err(Exception::type_error(format!(
                "unhashable type: '{}'",
                type_name(value)
            )));
        }
        other => {
            return Err(Exception::type_error(format!(
                "unhashable type: '{}'",
                type_name(other)
            )));
        }
    }
    Ok(())
}

fn hash_i64(i: i64, hasher: &mut DefaultHasher) {
    hasher.write_u8(1);
    hasher.write_i64(i);
}

/// Key equality: numeric cross-type equality plus structural equality for
/// strings and tuples; identity for instances and classes.
fn key_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Tuple(x), Value::Tuple(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(l, r)| key_eq(l, r))
        }
        (Value::Instance(x), Value::Instance(y)) => Rc::ptr_eq(x, y),
        (Value::Class(x), Value::Class(y)) => Rc::ptr_eq(x, y),
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        (Value::Builtin(x), Value::Builtin(y)) => x == y,
        (Value::FrozenSet(x), Value::FrozenSet(y)) => {
            x.len() == y.len() && x.iter().all(|(k, _)| y.contains_key(k))
        }
        (
            Value::Range { start, stop, step },
            Value::Range {
                start: s2,
                stop: e2,
                step: st2,
            },
        ) => start == s2 && stop == e2 && step == st2,
        _ => match (numeric_key(a), numeric_key(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

/// Canonical numeric form so `1 == 1.0 == True` as keys.
fn numeric_key(v: &Value) -> Option<f64> {
    match v {
        Value::Bool(b) => Some(f64::from(i8::from(*b))),
        Value::Int(i) => Some(*i as f64),
        Value::BigInt(b) => b.to_f64(),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

/// Distinguishes plain dicts from the `collections` flavors that share the
/// same storage but differ in type name, repr and extra methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictFlavor {
    Plain,
    DefaultDict,
    Counter,
    OrderedDict,
}

/// The dict storage: an insertion-ordered map plus the defaultdict factory.
///
/// The factory is a private field rather than a reserved key, so no
/// Python-visible operation (`len`, iteration, `in`, `keys`/`values`/`items`,
/// `str`, `repr`) can ever observe it.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    entries: IndexMap<Key, Value>,
    pub default_factory: Option<Value>,
    pub flavor: DictFlavorField,
}

/// Newtype wrapper so `Default` yields a plain dict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictFlavorField(pub DictFlavor);

impl Default for DictFlavorField {
    fn default() -> Self {
        Self(DictFlavor::Plain)
    }
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flavor(flavor: DictFlavor) -> Self {
        Self {
            entries: IndexMap::new(),
            default_factory: None,
            flavor: DictFlavorField(flavor),
        }
    }

    pub fn flavor(&self) -> DictFlavor {
        self.flavor.0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, key: Value, value: Value) -> Result<(), Exception> {
        self.entries.insert(Key::new(key)?, value);
        Ok(())
    }

    pub fn get(&self, key: &Value) -> Result<Option<&Value>, Exception> {
        Ok(self.entries.get(&Key::new(key.clone())?))
    }

    pub fn contains(&self, key: &Value) -> Result<bool, Exception> {
        Ok(self.entries.contains_key(&Key::new(key.clone())?))
    }

    /// Removes a key preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &Value) -> Result<Option<Value>, Exception> {
        Ok(self.entries.shift_remove(&Key::new(key.clone())?))
    }

    pub fn pop_last(&mut self) -> Option<(Value, Value)> {
        self.entries.pop().map(|(k, v)| (k.value, v))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (&k.value, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.keys().map(|k| &k.value)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.entries.values_mut()
    }

    /// Entry access by insertion position, for index-stable iteration while
    /// the guest mutates values in place.
    pub fn get_index(&self, index: usize) -> Option<(&Value, &Value)> {
        self.entries.get_index(index).map(|(k, v)| (&k.value, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_keys_unify() {
        let mut d = Dict::new();
        d.insert(Value::Int(1), Value::Str("int".into())).unwrap();
        d.insert(Value::Float(1.0), Value::Str("float".into())).unwrap();
        d.insert(Value::Bool(true), Value::Str("bool".into())).unwrap();
        assert_eq!(d.len(), 1);
        let got = d.get(&Value::Int(1)).unwrap().unwrap();
        assert!(matches!(got, Value::Str(s) if &**s == "bool"));
    }

    #[test]
    fn unhashable_key_rejected() {
        let mut d = Dict::new();
        let err = d
            .insert(Value::List(std::rc::Rc::default()), Value::None)
            .unwrap_err();
        assert_eq!(err.to_string(), "TypeError: unhashable type: 'list'");
    }

    #[test]
    fn insertion_order_preserved_across_removal() {
        let mut d = Dict::new();
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            d.insert(Value::Str((*name).into()), Value::Int(i as i64)).unwrap();
        }
        d.remove(&Value::Str("a".into())).unwrap();
        let keys: Vec<String> = d
            .keys()
            .map(|k| match k {
                Value::Str(s) => s.to_string(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(keys, ["b", "c"]);
    }
}
