//! Open-addressed hash table keyed by interned strings.
//!
//! Linear probing with tombstones. An empty slot terminates a probe
//! sequence; a tombstone (left behind by `delete`) keeps the probe
//! walking so entries displaced past it stay reachable, and is
//! recycled as an insertion slot. `count` includes tombstones, which
//! keeps the load-factor check honest: the table grows once
//! `count + 1` would exceed 75% of capacity, and growth discards
//! tombstones.
//!
//! Keys are [`ObjRef`]s to interned strings, so key equality is
//! identity. The exception is [`Table::find_string`], the intern
//! set's own lookup, which has no interned handle yet and compares
//! length, hash and bytes.
//!
//! The table does not own the heap, so operations that need a key's
//! hash or text borrow the object slice (`Heap::objects`) alongside.

use crate::object::{Obj, ObjRef};
use crate::value::Value;

const TABLE_MAX_LOAD: f64 = 0.75;

#[derive(Debug, Clone, Copy)]
struct Entry {
    key: Option<ObjRef>,
    value: Value,
}

impl Entry {
    const EMPTY: Entry = Entry {
        key: None,
        value: Value::Nil,
    };

    const TOMBSTONE: Entry = Entry {
        key: None,
        value: Value::Bool(true),
    };

    fn is_tombstone(&self) -> bool {
        self.key.is_none() && !matches!(self.value, Value::Nil)
    }
}

/// The hash table used for globals and the string intern set.
#[derive(Debug, Default)]
pub struct Table {
    /// Live entries plus tombstones.
    count: usize,
    entries: Vec<Entry>,
}

fn key_hash(objects: &[Obj], key: ObjRef) -> u32 {
    match &objects[key.index()] {
        Obj::String(s) => s.hash,
        other => panic!("table key must be an interned string, found {other:?}"),
    }
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries plus tombstones.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Probes for `key`. Returns the slot holding it, or the slot an
    /// insertion should use (the first tombstone on the probe path if
    /// any, else the terminating empty slot).
    fn find_entry(entries: &[Entry], objects: &[Obj], key: ObjRef) -> usize {
        let capacity = entries.len();
        let mut index = key_hash(objects, key) as usize % capacity;
        let mut tombstone: Option<usize> = None;

        loop {
            let entry = &entries[index];
            match entry.key {
                None => {
                    if entry.is_tombstone() {
                        tombstone.get_or_insert(index);
                    } else {
                        return tombstone.unwrap_or(index);
                    }
                }
                Some(existing) if existing == key => return index,
                Some(_) => {}
            }
            index = (index + 1) % capacity;
        }
    }

    pub fn get(&self, objects: &[Obj], key: ObjRef) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }
        let index = Self::find_entry(&self.entries, objects, key);
        let entry = &self.entries[index];
        match entry.key {
            Some(_) => Some(entry.value),
            None => None,
        }
    }

    /// Inserts or updates `key`. Returns true if the key was not
    /// present before.
    pub fn set(&mut self, objects: &[Obj], key: ObjRef, value: Value) -> bool {
        if (self.count + 1) as f64 > self.entries.len() as f64 * TABLE_MAX_LOAD {
            self.grow(objects);
        }

        let index = Self::find_entry(&self.entries, objects, key);
        let entry = &mut self.entries[index];
        let is_new_key = entry.key.is_none();

        // Recycling a tombstone does not change the count; it was
        // never decremented on delete.
        if is_new_key && !entry.is_tombstone() {
            self.count += 1;
        }

        entry.key = Some(key);
        entry.value = value;
        is_new_key
    }

    /// Removes `key`, leaving a tombstone. Returns true if the key
    /// was present.
    pub fn delete(&mut self, objects: &[Obj], key: ObjRef) -> bool {
        if self.entries.is_empty() {
            return false;
        }

        let index = Self::find_entry(&self.entries, objects, key);
        if self.entries[index].key.is_none() {
            return false;
        }

        self.entries[index] = Entry::TOMBSTONE;
        true
    }

    /// Copies every live entry of `self` into `to`.
    pub fn add_all(&self, objects: &[Obj], to: &mut Table) {
        for entry in &self.entries {
            if let Some(key) = entry.key {
                to.set(objects, key, entry.value);
            }
        }
    }

    /// Content-based lookup used by the intern set: compares length,
    /// hash, then bytes. Returns the interned handle if `text` is
    /// already present.
    pub fn find_string(&self, objects: &[Obj], text: &str, hash: u32) -> Option<ObjRef> {
        if self.entries.is_empty() {
            return None;
        }

        let capacity = self.entries.len();
        let mut index = hash as usize % capacity;
        loop {
            let entry = &self.entries[index];
            match entry.key {
                None => {
                    // A truly empty slot ends the probe; tombstones
                    // keep it going.
                    if !entry.is_tombstone() {
                        return None;
                    }
                }
                Some(key) => {
                    if let Obj::String(s) = &objects[key.index()] {
                        if s.hash == hash && s.len() == text.len() && s.as_str() == text {
                            return Some(key);
                        }
                    }
                }
            }
            index = (index + 1) % capacity;
        }
    }

    /// Doubles capacity (from a floor of 8) and rehashes. Tombstones
    /// are dropped, so `count` is recomputed from live entries.
    fn grow(&mut self, objects: &[Obj]) {
        let new_capacity = if self.entries.len() < 8 {
            8
        } else {
            self.entries.len() * 2
        };

        let old = std::mem::replace(&mut self.entries, vec![Entry::EMPTY; new_capacity]);
        self.count = 0;

        for entry in old {
            if let Some(key) = entry.key {
                let index = Self::find_entry(&self.entries, objects, key);
                self.entries[index] = entry;
                self.count += 1;
            }
        }
    }
}
