//! Top-level engine: configuration plus the bootstrapped handle the single
//! executor thread drives (§5).

use std::path::{Path, PathBuf};

use crate::ast::Statement;
use crate::catalog::Catalog;
use crate::executor::{Error as ExecutorError, Executor, QueryResult};
use crate::heapfile::FileRecordStore;
use crate::page::BLOCK_SZ;

/// Analogous to the single positional CLI argument of the record store's
/// external interface: where the environment lives on disk.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub block_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { data_dir: PathBuf::from("./data"), block_size: BLOCK_SZ }
    }
}

impl EngineConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), ..Self::default() }
    }
}

/// Owns the catalog and data directory handle for the process lifetime;
/// the single-threaded entry point for executing statements (§5).
pub struct Engine {
    executor: Executor<FileRecordStore>,
}

impl Engine {
    pub fn open(config: EngineConfig) -> Result<Self, ExecutorError> {
        let catalog: Catalog<FileRecordStore> = Catalog::open(config.data_dir)?;
        Ok(Self { executor: Executor::new(catalog) })
    }

    pub fn open_dir(data_dir: impl AsRef<Path>) -> Result<Self, ExecutorError> {
        Self::open(EngineConfig::new(data_dir.as_ref()))
    }

    pub fn execute(&mut self, statement: &Statement) -> Result<QueryResult, ExecutorError> {
        self.executor.execute(statement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ColumnSpec, Statement};
    use crate::value::{ColumnAttribute, Value};

    #[test]
    fn engine_opens_and_executes_ddl() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = Engine::open_dir(dir.path()).unwrap();
        let result = engine
            .execute(&Statement::CreateTable {
                table: "foo".into(),
                columns: vec![ColumnSpec { name: "id".into(), data_type: ColumnAttribute::Int }],
            })
            .unwrap();
        assert_eq!(result, QueryResult::Message("created table foo".to_string()));
    }

    #[test]
    fn engine_reopen_preserves_catalog() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut engine = Engine::open_dir(dir.path()).unwrap();
            engine
                .execute(&Statement::CreateTable {
                    table: "foo".into(),
                    columns: vec![ColumnSpec { name: "id".into(), data_type: ColumnAttribute::Int }],
                })
                .unwrap();
            engine
                .execute(&Statement::Insert { table: "foo".into(), columns: None, values: vec![Value::Int(1)] })
                .unwrap();
        }
        let mut engine = Engine::open_dir(dir.path()).unwrap();
        let result =
            engine.execute(&Statement::Select { table: "foo".into(), columns: None, predicate: None }).unwrap();
        match result {
            QueryResult::Rows { rows, .. } => assert_eq!(rows.len(), 1),
            _ => panic!("expected rows"),
        }
    }
}
