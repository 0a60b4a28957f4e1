//! Index capability set (§4.4, §9): the `DbIndex` contract re-expressed as a
//! trait, plus an in-memory ordered implementation.
//!
//! Index mechanics (the actual B-tree/hash structures) are explicitly out of
//! scope per §1; this module implements only enough of the contract —
//! `create`/`drop`/`insert`/`del`/`lookup` — for the catalog and executor to
//! exercise it, backed by a `BTreeMap` that is rebuilt from a full table
//! scan whenever the index is (re)created. See DESIGN.md for why this is
//! not persisted to disk.

use std::collections::BTreeMap;

use crate::heaptable::Handle;
use crate::value::Value;

/// Capability set exposed by every index kind (§9).
pub trait Index {
    /// (Re)builds the index from `entries`, each a composite key (one
    /// `Value` per indexed column, in column order) paired with the handle
    /// it was read from.
    fn create(&mut self, entries: Vec<(Vec<Value>, Handle)>);
    fn drop_index(&mut self);
    fn insert(&mut self, key: Vec<Value>, handle: Handle);
    fn del(&mut self, key: &[Value], handle: Handle);
    fn lookup(&self, key: &[Value]) -> Vec<Handle>;
}

/// The only index kind this kernel implements: `index_type == "BTREE"`,
/// `is_unique = true` (§4.6's `is_unique = (index_type == "BTREE")`).
pub struct BTreeIndex {
    table_name: String,
    index_name: String,
    columns: Vec<String>,
    map: BTreeMap<Vec<Value>, Vec<Handle>>,
}

impl BTreeIndex {
    pub fn new(table_name: String, index_name: String, columns: Vec<String>) -> Self {
        Self { table_name, index_name, columns, map: BTreeMap::new() }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Index for BTreeIndex {
    fn create(&mut self, entries: Vec<(Vec<Value>, Handle)>) {
        self.map.clear();
        for (key, handle) in entries {
            self.map.entry(key).or_default().push(handle);
        }
    }

    fn drop_index(&mut self) {
        self.map.clear();
    }

    fn insert(&mut self, key: Vec<Value>, handle: Handle) {
        self.map.entry(key).or_default().push(handle);
    }

    fn del(&mut self, key: &[Value], handle: Handle) {
        if let Some(handles) = self.map.get_mut(key) {
            handles.retain(|h| *h != handle);
            if handles.is_empty() {
                self.map.remove(key);
            }
        }
    }

    fn lookup(&self, key: &[Value]) -> Vec<Handle> {
        self.map.get(key).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_lookup() {
        let mut idx = BTreeIndex::new("foo".into(), "idx_foo_id".into(), vec!["id".into()]);
        idx.insert(vec![Value::Int(1)], (1, 1));
        idx.insert(vec![Value::Int(2)], (1, 2));
        assert_eq!(idx.lookup(&[Value::Int(1)]), vec![(1, 1)]);
        assert_eq!(idx.lookup(&[Value::Int(3)]), Vec::<Handle>::new());
    }

    #[test]
    fn del_removes_handle_but_keeps_other_keys() {
        let mut idx = BTreeIndex::new("foo".into(), "idx_foo_id".into(), vec!["id".into()]);
        idx.insert(vec![Value::Int(1)], (1, 1));
        idx.del(&[Value::Int(1)], (1, 1));
        assert!(idx.lookup(&[Value::Int(1)]).is_empty());
    }
}
