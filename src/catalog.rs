//! Schema catalog: the bootstrapped meta-relations `_tables`, `_columns`,
//! `_indices` and the rules that keep them consistent with physical files
//! (§4.4).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::warn;
use thiserror::Error;

use crate::heaptable::{self, Handle, HeapTable, Relation};
use crate::heapfile::{FileRecordStore, RecordStore};
use crate::index::{BTreeIndex, Index};
use crate::value::{row, ColumnAttribute, ColumnDef, Value};

pub const META_TABLES: &str = "_tables";
pub const META_COLUMNS: &str = "_columns";
pub const META_INDICES: &str = "_indices";

#[derive(Debug, Error)]
pub enum Error {
    #[error("table '{0}' does not exist")]
    UnknownTable(String),
    #[error("invalid column name '{0}'")]
    UnknownColumn(String),
    #[error("cannot drop a schema table")]
    CannotDropSchemaTable,
    #[error("catalog bootstrap failed: {0}")]
    Bootstrap(String),
    #[error(transparent)]
    HeapTable(#[from] heaptable::Error),
}

fn tables_columns() -> Vec<ColumnDef> {
    vec![ColumnDef::new("table_name", ColumnAttribute::Text)]
}

fn columns_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::new("table_name", ColumnAttribute::Text),
        ColumnDef::new("column_name", ColumnAttribute::Text),
        ColumnDef::new("data_type", ColumnAttribute::Text),
    ]
}

fn indices_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::new("table_name", ColumnAttribute::Text),
        ColumnDef::new("index_name", ColumnAttribute::Text),
        ColumnDef::new("seq_in_index", ColumnAttribute::Int),
        ColumnDef::new("column_name", ColumnAttribute::Text),
        ColumnDef::new("index_type", ColumnAttribute::Text),
        ColumnDef::new("is_unique", ColumnAttribute::Boolean),
    ]
}

/// Self-describing schema catalog plus the process-lifetime table/index
/// caches (§4.4, §5).
pub struct Catalog<S: RecordStore = FileRecordStore> {
    data_dir: PathBuf,
    table_cache: HashMap<String, Arc<Mutex<HeapTable<S>>>>,
    index_cache: HashMap<(String, String), Arc<Mutex<BTreeIndex>>>,
}

impl<S: RecordStore> Catalog<S> {
    /// Opens the catalog rooted at `data_dir`, bootstrapping the three
    /// meta-relations on first use. Both `_tables` and `_indices` are
    /// constructed behind the same idempotency check, fixing the source's
    /// known double-initialization gap (§9).
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)
            .map_err(|e| Error::Bootstrap(format!("failed to create data directory: {e}")))?;

        let needs_bootstrap = !data_dir.join(format!("{META_TABLES}.db")).exists();

        let mut tables = HeapTable::new(META_TABLES, tables_columns(), data_dir.join(format!("{META_TABLES}.db")));
        let mut columns_rel =
            HeapTable::new(META_COLUMNS, columns_columns(), data_dir.join(format!("{META_COLUMNS}.db")));
        let mut indices_rel =
            HeapTable::new(META_INDICES, indices_columns(), data_dir.join(format!("{META_INDICES}.db")));

        if needs_bootstrap {
            tables.create()?;
            columns_rel.create()?;
            indices_rel.create()?;
            for (name, cols) in [
                (META_TABLES, tables_columns()),
                (META_COLUMNS, columns_columns()),
                (META_INDICES, indices_columns()),
            ] {
                tables.insert(&row([("table_name", Value::Text(name.to_string()))]))?;
                for col in cols {
                    columns_rel.insert(&row([
                        ("table_name", Value::Text(name.to_string())),
                        ("column_name", Value::Text(col.name.clone())),
                        ("data_type", Value::Text(col.data_type.as_catalog_str().to_string())),
                    ]))?;
                }
            }
        } else {
            tables.open()?;
            columns_rel.open()?;
            indices_rel.open()?;
        }

        let mut table_cache = HashMap::new();
        table_cache.insert(META_TABLES.to_string(), Arc::new(Mutex::new(tables)));
        table_cache.insert(META_COLUMNS.to_string(), Arc::new(Mutex::new(columns_rel)));
        table_cache.insert(META_INDICES.to_string(), Arc::new(Mutex::new(indices_rel)));

        Ok(Self { data_dir, table_cache, index_cache: HashMap::new() })
    }

    fn meta(&self, name: &str) -> Arc<Mutex<HeapTable<S>>> {
        self.table_cache.get(name).expect("meta-relation always present after open()").clone()
    }

    /// Column definitions for `name`, in insertion order, read straight
    /// from `_columns`.
    pub fn column_defs(&self, name: &str) -> Result<Vec<ColumnDef>, Error> {
        let rel = self.meta(META_COLUMNS);
        let mut guard = rel.lock().unwrap();
        let mut defs = Vec::new();
        for handle in guard.select()? {
            let r = guard.project(handle)?;
            if matches!(r.get("table_name"), Some(Value::Text(t)) if t == name) {
                let col_name = match r.get("column_name") {
                    Some(Value::Text(s)) => s.clone(),
                    _ => continue,
                };
                let data_type = match r.get("data_type") {
                    Some(Value::Text(s)) => s.clone(),
                    _ => continue,
                };
                let attr = ColumnAttribute::from_catalog_str(&data_type)
                    .ok_or_else(|| Error::Bootstrap(format!("corrupt data_type '{data_type}'")))?;
                defs.push(ColumnDef::new(col_name, attr));
            }
        }
        if defs.is_empty() {
            return Err(Error::UnknownTable(name.to_string()));
        }
        Ok(defs)
    }

    /// Returns the cached `HeapTable` for `name`, constructing it from
    /// `_columns` on first access (§4.4).
    pub fn get_table(&mut self, name: &str) -> Result<Arc<Mutex<HeapTable<S>>>, Error> {
        if let Some(t) = self.table_cache.get(name) {
            return Ok(t.clone());
        }
        let columns = self.column_defs(name)?;
        let path = self.data_dir.join(format!("{name}.db"));
        let mut table = HeapTable::new(name, columns, path);
        table.open()?;
        let arc = Arc::new(Mutex::new(table));
        self.table_cache.insert(name.to_string(), arc.clone());
        Ok(arc)
    }

    fn table_name_handles(&self, meta_name: &str, name: &str) -> Result<Vec<Handle>, Error> {
        let rel = self.meta(meta_name);
        let mut guard = rel.lock().unwrap();
        let mut out = Vec::new();
        for handle in guard.select()? {
            let r = guard.project(handle)?;
            if matches!(r.get("table_name"), Some(Value::Text(t)) if t == name) {
                out.push(handle);
            }
        }
        Ok(out)
    }

    fn delete_columns_rows(&self, name: &str) -> Result<(), Error> {
        let handles = self.table_name_handles(META_COLUMNS, name)?;
        let rel = self.meta(META_COLUMNS);
        let mut guard = rel.lock().unwrap();
        for h in handles {
            guard.del(h)?;
        }
        Ok(())
    }

    fn delete_tables_row(&self, name: &str) -> Result<(), Error> {
        let handles = self.table_name_handles(META_TABLES, name)?;
        let rel = self.meta(META_TABLES);
        let mut guard = rel.lock().unwrap();
        for h in handles {
            guard.del(h)?;
        }
        Ok(())
    }

    fn delete_indices_rows(&self, table: &str, index_name: &str) -> Result<(), Error> {
        let rel = self.meta(META_INDICES);
        let mut guard = rel.lock().unwrap();
        let mut handles = Vec::new();
        for h in guard.select()? {
            let r = guard.project(h)?;
            let matches_table = matches!(r.get("table_name"), Some(Value::Text(t)) if t == table);
            let matches_index = matches!(r.get("index_name"), Some(Value::Text(n)) if n == index_name);
            if matches_table && matches_index {
                handles.push(h);
            }
        }
        for h in handles {
            guard.del(h)?;
        }
        Ok(())
    }

    /// Creates a user table, inserting `_tables`/`_columns` rows first and
    /// reversing them if the backing `HeapFile::create()` fails (§4.6).
    pub fn create_table(
        &mut self,
        name: &str,
        columns: Vec<ColumnDef>,
        if_not_exists: bool,
    ) -> Result<(), Error> {
        {
            let rel = self.meta(META_TABLES);
            rel.lock().unwrap().insert(&row([("table_name", Value::Text(name.to_string()))]))?;
        }
        {
            let rel = self.meta(META_COLUMNS);
            let mut guard = rel.lock().unwrap();
            for col in &columns {
                if let Err(e) = guard.insert(&row([
                    ("table_name", Value::Text(name.to_string())),
                    ("column_name", Value::Text(col.name.clone())),
                    ("data_type", Value::Text(col.data_type.as_catalog_str().to_string())),
                ])) {
                    drop(guard);
                    let _ = self.delete_columns_rows(name);
                    let _ = self.delete_tables_row(name);
                    return Err(e.into());
                }
            }
        }

        let path = self.data_dir.join(format!("{name}.db"));
        let mut table = HeapTable::new(name, columns, path);
        let created = if if_not_exists { table.create_if_not_exists() } else { table.create() };
        if let Err(e) = created {
            let _ = self.delete_columns_rows(name);
            let _ = self.delete_tables_row(name);
            return Err(e.into());
        }
        self.table_cache.insert(name.to_string(), Arc::new(Mutex::new(table)));
        Ok(())
    }

    /// Drops a user table. Does *not* drop the table's indices or their
    /// `_indices` rows — a known gap carried over from the source (§9);
    /// see DESIGN.md.
    pub fn drop_table(&mut self, name: &str) -> Result<(), Error> {
        if matches!(name, META_TABLES | META_COLUMNS | META_INDICES) {
            return Err(Error::CannotDropSchemaTable);
        }
        self.delete_columns_rows(name)?;
        let table = self.get_table(name)?;
        table.lock().unwrap().drop_relation()?;
        self.table_cache.remove(name);
        self.delete_tables_row(name)?;
        warn!("dropped table '{name}' without dropping its indices (known gap, see DESIGN.md)");
        Ok(())
    }

    /// Creates an index: one `_indices` row per column with dense
    /// `seq_in_index`, then builds the in-memory index from a full scan
    /// (§4.6). Reverses the `_indices` rows on any failure.
    pub fn create_index(
        &mut self,
        table: &str,
        index_name: &str,
        columns: Vec<String>,
        index_type: &str,
    ) -> Result<(), Error> {
        let defs = self.column_defs(table)?;
        for c in &columns {
            if !defs.iter().any(|d| &d.name == c) {
                return Err(Error::UnknownColumn(c.clone()));
            }
        }
        let is_unique = index_type == "BTREE";

        let mut inserted = Vec::new();
        {
            let rel = self.meta(META_INDICES);
            let mut guard = rel.lock().unwrap();
            for (i, col) in columns.iter().enumerate() {
                let r = row([
                    ("table_name", Value::Text(table.to_string())),
                    ("index_name", Value::Text(index_name.to_string())),
                    ("seq_in_index", Value::Int(i as i32 + 1)),
                    ("column_name", Value::Text(col.clone())),
                    ("index_type", Value::Text(index_type.to_string())),
                    ("is_unique", Value::Boolean(is_unique)),
                ]);
                match guard.insert(&r) {
                    Ok(h) => inserted.push(h),
                    Err(e) => {
                        for h in inserted {
                            let _ = guard.del(h);
                        }
                        return Err(e.into());
                    }
                }
            }
        }

        match self.build_index(table, index_name, columns) {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = self.delete_indices_rows(table, index_name);
                Err(e)
            }
        }
    }

    fn build_index(&mut self, table: &str, index_name: &str, columns: Vec<String>) -> Result<(), Error> {
        let table_arc = self.get_table(table)?;
        let mut entries = Vec::new();
        {
            let mut t = table_arc.lock().unwrap();
            for h in t.select()? {
                let r = t.project_cols(h, &columns)?;
                let key: Vec<Value> = columns
                    .iter()
                    .map(|c| r.get(c).cloned().expect("projected column present"))
                    .collect();
                entries.push((key, h));
            }
        }
        let mut index = BTreeIndex::new(table.to_string(), index_name.to_string(), columns);
        index.create(entries);
        self.index_cache.insert((table.to_string(), index_name.to_string()), Arc::new(Mutex::new(index)));
        Ok(())
    }

    pub fn drop_index(&mut self, table: &str, index_name: &str) -> Result<(), Error> {
        self.index_cache.remove(&(table.to_string(), index_name.to_string()));
        self.delete_indices_rows(table, index_name)?;
        Ok(())
    }

    /// Distinct index names on `table`, in first-seen `_indices` order.
    pub fn get_index_names(&self, table: &str) -> Result<Vec<String>, Error> {
        let rel = self.meta(META_INDICES);
        let mut guard = rel.lock().unwrap();
        let mut names = Vec::new();
        for h in guard.select()? {
            let r = guard.project(h)?;
            let matches_table = matches!(r.get("table_name"), Some(Value::Text(t)) if t == table);
            if matches_table {
                if let Some(Value::Text(n)) = r.get("index_name") {
                    if !names.contains(n) {
                        names.push(n.clone());
                    }
                }
            }
        }
        Ok(names)
    }

    /// Returns the in-memory index, rebuilding it from `_indices` metadata
    /// and a full table scan if this is the first access this process.
    pub fn get_index(&mut self, table: &str, index_name: &str) -> Result<Arc<Mutex<BTreeIndex>>, Error> {
        let key = (table.to_string(), index_name.to_string());
        if let Some(idx) = self.index_cache.get(&key) {
            return Ok(idx.clone());
        }
        let rel = self.meta(META_INDICES);
        let mut rows = Vec::new();
        {
            let mut guard = rel.lock().unwrap();
            for h in guard.select()? {
                let r = guard.project(h)?;
                let matches_table = matches!(r.get("table_name"), Some(Value::Text(t)) if t == table);
                let matches_index = matches!(r.get("index_name"), Some(Value::Text(n)) if n == index_name);
                if matches_table && matches_index {
                    rows.push(r);
                }
            }
        }
        rows.sort_by_key(|r| match r.get("seq_in_index") {
            Some(Value::Int(n)) => *n,
            _ => i32::MAX,
        });
        let columns: Vec<String> = rows
            .iter()
            .filter_map(|r| match r.get("column_name") {
                Some(Value::Text(s)) => Some(s.clone()),
                _ => None,
            })
            .collect();
        if columns.is_empty() {
            return Err(Error::UnknownTable(format!("index '{index_name}' on '{table}'")));
        }
        self.build_index(table, index_name, columns)?;
        Ok(self.index_cache.get(&key).expect("just inserted").clone())
    }

    /// All user-table names (§8 invariant 6 / scenario S4): every `_tables`
    /// row except the three meta-relations themselves.
    pub fn show_tables(&self) -> Result<Vec<String>, Error> {
        let rel = self.meta(META_TABLES);
        let mut guard = rel.lock().unwrap();
        let mut names = Vec::new();
        for h in guard.select()? {
            let r = guard.project(h)?;
            if let Some(Value::Text(name)) = r.get("table_name") {
                if !matches!(name.as_str(), META_TABLES | META_COLUMNS | META_INDICES) {
                    names.push(name.clone());
                }
            }
        }
        Ok(names)
    }

    pub fn show_columns(&self, table: &str) -> Result<Vec<crate::value::Row>, Error> {
        let rel = self.meta(META_COLUMNS);
        let mut guard = rel.lock().unwrap();
        let mut rows = Vec::new();
        for h in guard.select()? {
            let r = guard.project(h)?;
            if matches!(r.get("table_name"), Some(Value::Text(t)) if t == table) {
                rows.push(r);
            }
        }
        Ok(rows)
    }

    /// `_indices` rows for user tables only, filtering by `index_name` not
    /// matching a meta-relation name — preserved historical behavior (§9);
    /// see DESIGN.md for why this should really filter by `table_name`.
    pub fn show_index(&self, table: &str) -> Result<Vec<crate::value::Row>, Error> {
        let rel = self.meta(META_INDICES);
        let mut guard = rel.lock().unwrap();
        let mut rows = Vec::new();
        for h in guard.select()? {
            let r = guard.project(h)?;
            let table_matches = matches!(r.get("table_name"), Some(Value::Text(t)) if t == table);
            let index_name_is_meta =
                matches!(r.get("index_name"), Some(Value::Text(n)) if matches!(n.as_str(), META_TABLES | META_COLUMNS | META_INDICES));
            if table_matches && !index_name_is_meta {
                rows.push(r);
            }
        }
        Ok(rows)
    }
}
