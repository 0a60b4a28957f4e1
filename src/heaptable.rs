//! Heap table: row <-> bytes marshalling and open/create/drop/insert/select/
//! project/delete over a [`HeapFile`] (§4.3).

use thiserror::Error;

use crate::heapfile::{self, BlockId, FileRecordStore, HeapFile, RecordStore};
use crate::page::{self, RecordId, BLOCK_SZ};
use crate::value::{ColumnAttribute, ColumnDef, Row, Value, MAX_TEXT_LEN};

/// Stable identifier for a live row: `(block_id, record_id)` (§3).
pub type Handle = (BlockId, RecordId);

/// Leaves a small safety margin below `BLOCK_SZ` for the slot directory and
/// header, per §4.3's marshalling abort rule.
const MAX_RECORD_SIZE: usize = BLOCK_SZ - 64;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported NULL/default for column '{0}'")]
    MissingColumn(String),
    #[error("invalid column name '{0}'")]
    UnknownColumn(String),
    #[error("row too big")]
    RowTooBig,
    #[error("corrupt record")]
    Corrupt,
    #[error("update is not supported")]
    Unsupported,
    #[error(transparent)]
    HeapFile(#[from] heapfile::Error),
    #[error(transparent)]
    Page(#[from] page::Error),
}

/// Capability set a physical relation exposes to the executor (§9's
/// re-expression of `DbRelation` as a trait rather than a base class).
pub trait Relation {
    fn name(&self) -> &str;
    fn columns(&self) -> &[ColumnDef];
    fn open(&mut self) -> Result<(), Error>;
    fn close(&mut self) -> Result<(), Error>;
    fn create(&mut self) -> Result<(), Error>;
    fn create_if_not_exists(&mut self) -> Result<(), Error>;
    fn drop_relation(&mut self) -> Result<(), Error>;
    fn insert(&mut self, row: &Row) -> Result<Handle, Error>;
    fn select(&mut self) -> Result<Vec<Handle>, Error>;
    fn project(&mut self, handle: Handle) -> Result<Row, Error>;
    fn project_cols(&mut self, handle: Handle, cols: &[String]) -> Result<Row, Error>;
    fn del(&mut self, handle: Handle) -> Result<(), Error>;
    fn update(&mut self, _handle: Handle, _row: &Row) -> Result<(), Error> {
        Err(Error::Unsupported)
    }
}

/// A heap-organized table: rows marshalled per [`ColumnDef`] order and
/// stored across the [`SlottedPage`](crate::page::SlottedPage)s of a
/// [`HeapFile`].
pub struct HeapTable<S: RecordStore = FileRecordStore> {
    name: String,
    columns: Vec<ColumnDef>,
    file: HeapFile<S>,
}

impl<S: RecordStore> HeapTable<S> {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>, path: impl Into<std::path::PathBuf>) -> Self {
        let name = name.into();
        Self { file: HeapFile::new(path), name, columns }
    }

    fn ensure_open(&mut self) -> Result<(), Error> {
        if !self.file.is_open() {
            self.file.open()?;
        }
        Ok(())
    }

    fn marshal(&self, row: &Row) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::new();
        for col in &self.columns {
            let value = row.get(&col.name).ok_or_else(|| Error::MissingColumn(col.name.clone()))?;
            match (col.data_type, value) {
                (ColumnAttribute::Int, Value::Int(i)) => buf.extend_from_slice(&i.to_le_bytes()),
                (ColumnAttribute::Boolean, Value::Boolean(b)) => {
                    buf.extend_from_slice(&(*b as i32).to_le_bytes())
                }
                (ColumnAttribute::Text, Value::Text(s)) => {
                    if s.len() > MAX_TEXT_LEN {
                        return Err(Error::RowTooBig);
                    }
                    buf.extend_from_slice(&(s.len() as u16).to_le_bytes());
                    buf.extend_from_slice(s.as_bytes());
                }
                _ => return Err(Error::MissingColumn(col.name.clone())),
            }
            if buf.len() > MAX_RECORD_SIZE {
                return Err(Error::RowTooBig);
            }
        }
        Ok(buf)
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<Row, Error> {
        let mut row = Row::new();
        let mut offset = 0usize;
        for col in &self.columns {
            match col.data_type {
                ColumnAttribute::Int => {
                    let field = bytes.get(offset..offset + 4).ok_or(Error::Corrupt)?;
                    let i = i32::from_le_bytes(field.try_into().unwrap());
                    row.insert(col.name.clone(), Value::Int(i));
                    offset += 4;
                }
                ColumnAttribute::Boolean => {
                    let field = bytes.get(offset..offset + 4).ok_or(Error::Corrupt)?;
                    let i = i32::from_le_bytes(field.try_into().unwrap());
                    row.insert(col.name.clone(), Value::Boolean(i != 0));
                    offset += 4;
                }
                ColumnAttribute::Text => {
                    let len_field = bytes.get(offset..offset + 2).ok_or(Error::Corrupt)?;
                    let len = u16::from_le_bytes(len_field.try_into().unwrap()) as usize;
                    offset += 2;
                    let text_bytes = bytes.get(offset..offset + len).ok_or(Error::Corrupt)?;
                    let s = String::from_utf8_lossy(text_bytes).into_owned();
                    row.insert(col.name.clone(), Value::Text(s));
                    offset += len;
                }
            }
        }
        Ok(row)
    }

    /// Inserts into the last block, allocating a new one and retrying once
    /// on `NoRoom` — the explicit-result re-expression of the
    /// exception-driven retry described in §9.
    fn insert_bytes(&mut self, data: &[u8]) -> Result<Handle, Error> {
        self.ensure_open()?;
        let last_id = self.file.get_last_block_id();
        let mut page = self.file.get(last_id)?;
        match page.add(data) {
            Ok(record_id) => {
                self.file.put(&page)?;
                Ok((last_id, record_id))
            }
            Err(page::Error::NoRoom(_)) => {
                let mut new_page = self.file.get_new()?;
                match new_page.add(data) {
                    Ok(record_id) => {
                        let block_id = new_page.block_id();
                        self.file.put(&new_page)?;
                        Ok((block_id, record_id))
                    }
                    Err(_) => Err(Error::RowTooBig),
                }
            }
        }
    }
}

impl<S: RecordStore> Relation for HeapTable<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    fn open(&mut self) -> Result<(), Error> {
        self.file.open()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        self.file.close()?;
        Ok(())
    }

    fn create(&mut self) -> Result<(), Error> {
        self.file.create()?;
        Ok(())
    }

    fn create_if_not_exists(&mut self) -> Result<(), Error> {
        if self.file.open().is_err() {
            self.file.create()?;
        }
        Ok(())
    }

    fn drop_relation(&mut self) -> Result<(), Error> {
        self.file.drop_file()?;
        Ok(())
    }

    fn insert(&mut self, row: &Row) -> Result<Handle, Error> {
        let bytes = self.marshal(row)?;
        self.insert_bytes(&bytes)
    }

    fn select(&mut self) -> Result<Vec<Handle>, Error> {
        self.ensure_open()?;
        let mut handles = Vec::new();
        for block_id in self.file.block_ids() {
            let page = self.file.get(block_id)?;
            for record_id in page.ids() {
                handles.push((block_id, record_id));
            }
        }
        Ok(handles)
    }

    fn project(&mut self, handle: Handle) -> Result<Row, Error> {
        self.ensure_open()?;
        let (block_id, record_id) = handle;
        let page = self.file.get(block_id)?;
        let bytes = page.get(record_id).ok_or(Error::Corrupt)?;
        self.unmarshal(&bytes)
    }

    fn project_cols(&mut self, handle: Handle, cols: &[String]) -> Result<Row, Error> {
        let row = self.project(handle)?;
        let mut result = Row::new();
        for name in cols {
            let value = row.get(name).ok_or_else(|| Error::UnknownColumn(name.clone()))?;
            result.insert(name.clone(), value.clone());
        }
        Ok(result)
    }

    fn del(&mut self, handle: Handle) -> Result<(), Error> {
        self.ensure_open()?;
        let (block_id, record_id) = handle;
        let mut page = self.file.get(block_id)?;
        page.del(record_id);
        self.file.put(&page)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::row;

    fn columns() -> Vec<ColumnDef> {
        vec![ColumnDef::new("id", ColumnAttribute::Int), ColumnDef::new("data", ColumnAttribute::Text)]
    }

    #[test]
    fn insert_then_project_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let mut table: HeapTable<FileRecordStore> =
            HeapTable::new("foo", columns(), dir.path().join("foo.db"));
        table.create().unwrap();
        let r = row([("id", Value::Int(1)), ("data", Value::Text("hello".into()))]);
        let handle = table.insert(&r).unwrap();
        assert_eq!(table.project(handle).unwrap(), r);
    }

    #[test]
    fn select_excludes_deleted_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut table: HeapTable<FileRecordStore> =
            HeapTable::new("foo", columns(), dir.path().join("foo.db"));
        table.create().unwrap();
        let r1 = row([("id", Value::Int(1)), ("data", Value::Text("a".into()))]);
        let r2 = row([("id", Value::Int(2)), ("data", Value::Text("b".into()))]);
        let h1 = table.insert(&r1).unwrap();
        let h2 = table.insert(&r2).unwrap();
        table.del(h1).unwrap();
        let handles = table.select().unwrap();
        assert_eq!(handles, vec![h2]);
    }

    #[test]
    fn missing_column_is_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut table: HeapTable<FileRecordStore> =
            HeapTable::new("foo", columns(), dir.path().join("foo.db"));
        table.create().unwrap();
        let r = row([("id", Value::Int(1))]);
        assert!(matches!(table.insert(&r), Err(Error::MissingColumn(_))));
    }

    #[test]
    fn insert_allocates_new_block_when_current_is_full() {
        let dir = tempfile::tempdir().unwrap();
        let big_columns = vec![ColumnDef::new("data", ColumnAttribute::Text)];
        let mut table: HeapTable<FileRecordStore> =
            HeapTable::new("big", big_columns, dir.path().join("big.db"));
        table.create().unwrap();
        let payload = "x".repeat(3000);
        for _ in 0..5 {
            let r = row([("data", Value::Text(payload.clone()))]);
            table.insert(&r).unwrap();
        }
        assert!(table.file.get_last_block_id() > 1);
    }
}
