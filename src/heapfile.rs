//! Heap file: a durable sequence of blocks keyed by 1-based [`BlockId`],
//! backed by a [`RecordStore`] (§4.2).

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, trace};
use thiserror::Error;

use crate::page::{SlottedPage, BLOCK_SZ};

pub type BlockId = u32;

#[derive(Debug, Error)]
pub enum Error {
    #[error("heap file is closed")]
    ClosedFile,
    #[error("storage error: {0}")]
    Storage(#[from] io::Error),
    #[error(transparent)]
    Page(#[from] crate::page::Error),
}

/// The durable, record-number-keyed block store collaborator described in
/// §6: create exclusive / open / close / remove / put / get / count.
///
/// This is the one external collaborator the spec treats as a black box;
/// [`FileRecordStore`] is the concrete implementation this crate ships so
/// the kernel is self-contained and testable.
pub trait RecordStore {
    fn create(path: &Path) -> io::Result<Self>
    where
        Self: Sized;
    fn open(path: &Path) -> io::Result<Self>
    where
        Self: Sized;
    fn close(&mut self) -> io::Result<()>;
    fn remove(path: &Path) -> io::Result<()>;
    fn put(&mut self, block_id: BlockId, data: &[u8; BLOCK_SZ]) -> io::Result<()>;
    fn get(&mut self, block_id: BlockId) -> io::Result<Box<[u8; BLOCK_SZ]>>;
    /// Number of records (blocks) currently stored.
    fn count(&self) -> io::Result<u32>;
}

/// A single flat file of fixed-size `BLOCK_SZ` records, addressed by
/// `(block_id - 1) * BLOCK_SZ` byte offset — the disk layout described in
/// §6, grounded on the pack's `FluxDb` pager (`storage/pager.rs`), which
/// computes page offsets from a fixed page size the same way.
pub struct FileRecordStore {
    file: Option<File>,
    path: PathBuf,
}

impl RecordStore for FileRecordStore {
    fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).create_new(true).open(path)?;
        Ok(Self { file: Some(file), path: path.to_path_buf() })
    }

    fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self { file: Some(file), path: path.to_path_buf() })
    }

    fn close(&mut self) -> io::Result<()> {
        self.file = None;
        Ok(())
    }

    fn remove(path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn put(&mut self, block_id: BlockId, data: &[u8; BLOCK_SZ]) -> io::Result<()> {
        let file = self.file.as_mut().ok_or_else(closed)?;
        file.seek(SeekFrom::Start((block_id as u64 - 1) * BLOCK_SZ as u64))?;
        file.write_all(data)
    }

    fn get(&mut self, block_id: BlockId) -> io::Result<Box<[u8; BLOCK_SZ]>> {
        let file = self.file.as_mut().ok_or_else(closed)?;
        file.seek(SeekFrom::Start((block_id as u64 - 1) * BLOCK_SZ as u64))?;
        let mut buf = Box::new([0u8; BLOCK_SZ]);
        file.read_exact(buf.as_mut())?;
        Ok(buf)
    }

    fn count(&self) -> io::Result<u32> {
        let file = self.file.as_ref().ok_or_else(closed)?;
        Ok((file.metadata()?.len() / BLOCK_SZ as u64) as u32)
    }
}

impl FileRecordStore {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "record store is closed")
}

/// A sequence of numbered blocks backed by a [`RecordStore`] (§4.2).
pub struct HeapFile<S: RecordStore = FileRecordStore> {
    path: PathBuf,
    store: Option<S>,
    last: BlockId,
}

impl<S: RecordStore> HeapFile<S> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), store: None, last: 0 }
    }

    pub fn is_open(&self) -> bool {
        self.store.is_some()
    }

    fn store_mut(&mut self) -> Result<&mut S, Error> {
        self.store.as_mut().ok_or(Error::ClosedFile)
    }

    /// Creates the backing store exclusively and allocates block 1.
    pub fn create(&mut self) -> Result<(), Error> {
        let mut store = S::create(&self.path)?;
        let mut page = SlottedPage::new(Box::new([0u8; BLOCK_SZ]), 1, true);
        store.put(1, page.block())?;
        let _ = &mut page;
        self.store = Some(store);
        self.last = 1;
        debug!("created heap file {:?} with block 1", self.path);
        Ok(())
    }

    pub fn open(&mut self) -> Result<(), Error> {
        let store = S::open(&self.path)?;
        self.last = store.count()?;
        self.store = Some(store);
        trace!("opened heap file {:?}, last block {}", self.path, self.last);
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), Error> {
        if let Some(mut store) = self.store.take() {
            store.close()?;
        }
        Ok(())
    }

    /// Closes (if open) and removes the backing store.
    pub fn drop_file(&mut self) -> Result<(), Error> {
        self.close()?;
        S::remove(&self.path)?;
        Ok(())
    }

    /// Allocates a new, empty page at `last + 1`.
    pub fn get_new(&mut self) -> Result<SlottedPage, Error> {
        let new_id = self.last + 1;
        let page = SlottedPage::new(Box::new([0u8; BLOCK_SZ]), new_id, true);
        let store = self.store_mut()?;
        store.put(new_id, page.block())?;
        let block = store.get(new_id)?;
        self.last = new_id;
        Ok(SlottedPage::new(block, new_id, false))
    }

    pub fn get(&mut self, block_id: BlockId) -> Result<SlottedPage, Error> {
        let store = self.store_mut()?;
        let block = store.get(block_id)?;
        Ok(SlottedPage::new(block, block_id, false))
    }

    pub fn put(&mut self, page: &SlottedPage) -> Result<(), Error> {
        let block_id = page.block_id();
        let store = self.store_mut()?;
        store.put(block_id, page.block())?;
        Ok(())
    }

    pub fn block_ids(&self) -> std::ops::RangeInclusive<BlockId> {
        1..=self.last
    }

    pub fn get_last_block_id(&self) -> BlockId {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_allocates_block_one_and_get_new_increments_last() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        let mut heap: HeapFile<FileRecordStore> = HeapFile::new(&path);
        heap.create().unwrap();
        assert_eq!(heap.get_last_block_id(), 1);
        heap.get_new().unwrap();
        assert_eq!(heap.get_last_block_id(), 2);
        heap.close().unwrap();

        let mut reopened: HeapFile<FileRecordStore> = HeapFile::new(&path);
        reopened.open().unwrap();
        assert_eq!(reopened.get_last_block_id(), 2);
    }

    #[test]
    fn operations_on_closed_file_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        let mut heap: HeapFile<FileRecordStore> = HeapFile::new(&path);
        heap.create().unwrap();
        heap.close().unwrap();
        assert!(matches!(heap.get(1), Err(Error::ClosedFile)));
    }
}
