//! Executor: a stateless dispatcher keyed by statement kind (§4.6).

use thiserror::Error;

use crate::ast::{Equality, Predicate, Statement};
use crate::catalog::{self, Catalog};
use crate::heapfile::RecordStore;
use crate::heaptable::{self, Relation};
use crate::index::Index;
use crate::plan::{self, EvalPlan};
use crate::value::{ColumnAttribute, ColumnDef, Row, Value};

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported NULL/default for column '{0}'")]
    MissingColumn(String),
    #[error("invalid column name '{0}'")]
    UnknownColumn(String),
    #[error("unrecognized data type '{0}'")]
    UnrecognizedDataType(String),
    #[error("cannot drop a schema table")]
    CannotDropSchemaTable,
    #[error(transparent)]
    Catalog(#[from] catalog::Error),
    #[error(transparent)]
    Relation(#[from] heaptable::Error),
    #[error(transparent)]
    Plan(#[from] plan::Error),
}

/// What a statement produced (§6's "informational message or tabular
/// result").
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Message(String),
    Rows { columns: Vec<ColumnDef>, rows: Vec<Row>, message: String },
}

/// Recursive descent over a [`Predicate`] tree, matching the original's
/// `AND`/`SIMPLE_OP`/default-throw shape (§9 Design Notes): `AND` unions
/// both sub-maps (a repeated key keeps the later-evaluated binding), a
/// `SIMPLE_OP`-equivalent `Eq` validates its column and literal type, and
/// any other shape — `Other`, or an `Eq` literal that isn't INT/TEXT — is
/// rejected with `UnsupportedPredicate` rather than silently ignored.
pub fn get_where_conjunction(predicate: &Predicate, cols: &[ColumnDef]) -> Result<Row, Error> {
    match predicate {
        Predicate::And(left, right) => {
            let mut map = get_where_conjunction(left, cols)?;
            map.extend(get_where_conjunction(right, cols)?);
            Ok(map)
        }
        Predicate::Eq { column, value } => {
            if !cols.iter().any(|c| &c.name == column) {
                return Err(Error::UnknownColumn(column.clone()));
            }
            if !matches!(value, Value::Int(_) | Value::Text(_)) {
                return Err(Error::Plan(plan::Error::UnsupportedPredicate));
            }
            let mut map = Row::new();
            map.insert(column.clone(), value.clone());
            Ok(map)
        }
        Predicate::Other => Err(Error::Plan(plan::Error::UnsupportedPredicate)),
    }
}

pub struct Executor<S: RecordStore> {
    catalog: Catalog<S>,
}

impl<S: RecordStore> Executor<S> {
    pub fn new(catalog: Catalog<S>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog<S> {
        &self.catalog
    }

    pub fn execute(&mut self, statement: &Statement) -> Result<QueryResult, Error> {
        match statement {
            Statement::CreateTable { table, columns } => self.create_table(table, columns, false),
            Statement::DropTable { table } => self.drop_table(table),
            Statement::CreateIndex { table, index_name, columns, index_type } => {
                self.create_index(table, index_name, columns, index_type)
            }
            Statement::DropIndex { table, index_name } => self.drop_index(table, index_name),
            Statement::ShowTables => self.show_tables(),
            Statement::ShowColumns { table } => self.show_columns(table),
            Statement::ShowIndex { table } => self.show_index(table),
            Statement::Insert { table, columns, values } => self.insert(table, columns.as_deref(), values),
            Statement::Delete { table, predicate } => self.delete(table, predicate.as_ref()),
            Statement::Select { table, columns, predicate } => {
                self.select(table, columns.as_deref(), predicate.as_ref())
            }
        }
    }

    fn create_table(
        &mut self,
        table: &str,
        columns: &[crate::ast::ColumnSpec],
        if_not_exists: bool,
    ) -> Result<QueryResult, Error> {
        for c in columns {
            if !matches!(c.data_type, ColumnAttribute::Int | ColumnAttribute::Text) {
                return Err(Error::UnrecognizedDataType(c.data_type.to_string()));
            }
        }
        let defs: Vec<ColumnDef> =
            columns.iter().map(|c| ColumnDef::new(c.name.clone(), c.data_type)).collect();
        self.catalog.create_table(table, defs, if_not_exists)?;
        Ok(QueryResult::Message(format!("created table {table}")))
    }

    fn drop_table(&mut self, table: &str) -> Result<QueryResult, Error> {
        self.catalog.drop_table(table)?;
        Ok(QueryResult::Message(format!("dropped table {table}")))
    }

    fn create_index(
        &mut self,
        table: &str,
        index_name: &str,
        columns: &[String],
        index_type: &str,
    ) -> Result<QueryResult, Error> {
        self.catalog.create_index(table, index_name, columns.to_vec(), index_type)?;
        Ok(QueryResult::Message(format!("created index {index_name} on {table}")))
    }

    fn drop_index(&mut self, table: &str, index_name: &str) -> Result<QueryResult, Error> {
        self.catalog.drop_index(table, index_name)?;
        Ok(QueryResult::Message(format!("dropped index {index_name}")))
    }

    fn show_tables(&mut self) -> Result<QueryResult, Error> {
        let names = self.catalog.show_tables()?;
        let columns = vec![ColumnDef::new("table_name", ColumnAttribute::Text)];
        let rows = names
            .into_iter()
            .map(|n| crate::value::row([("table_name", Value::Text(n))]))
            .collect::<Vec<_>>();
        let message = format!("{} rows", rows.len());
        Ok(QueryResult::Rows { columns, rows, message })
    }

    fn show_columns(&mut self, table: &str) -> Result<QueryResult, Error> {
        let rows = self.catalog.show_columns(table)?;
        let columns = vec![
            ColumnDef::new("table_name", ColumnAttribute::Text),
            ColumnDef::new("column_name", ColumnAttribute::Text),
            ColumnDef::new("data_type", ColumnAttribute::Text),
        ];
        let message = format!("{} rows", rows.len());
        Ok(QueryResult::Rows { columns, rows, message })
    }

    fn show_index(&mut self, table: &str) -> Result<QueryResult, Error> {
        let rows = self.catalog.show_index(table)?;
        let columns = vec![
            ColumnDef::new("table_name", ColumnAttribute::Text),
            ColumnDef::new("index_name", ColumnAttribute::Text),
            ColumnDef::new("seq_in_index", ColumnAttribute::Int),
            ColumnDef::new("column_name", ColumnAttribute::Text),
            ColumnDef::new("index_type", ColumnAttribute::Text),
            ColumnDef::new("is_unique", ColumnAttribute::Boolean),
        ];
        let message = format!("{} rows", rows.len());
        Ok(QueryResult::Rows { columns, rows, message })
    }

    fn insert(&mut self, table: &str, columns: Option<&[String]>, values: &[Value]) -> Result<QueryResult, Error> {
        let defs = self.catalog.column_defs(table)?;
        let mut row = Row::new();
        match columns {
            Some(names) => {
                if names.len() != values.len() {
                    return Err(Error::MissingColumn("unsupported NULL/default".to_string()));
                }
                for (name, value) in names.iter().zip(values) {
                    if !defs.iter().any(|d| &d.name == name) {
                        return Err(Error::UnknownColumn(name.clone()));
                    }
                    row.insert(name.clone(), value.clone());
                }
            }
            None => {
                if values.len() != defs.len() {
                    return Err(Error::MissingColumn("unsupported NULL/default".to_string()));
                }
                for (def, value) in defs.iter().zip(values) {
                    row.insert(def.name.clone(), value.clone());
                }
            }
        }

        let table_arc = self.catalog.get_table(table)?;
        let handle = {
            let mut t = table_arc.lock().unwrap();
            t.insert(&row)?
        };

        let index_names = self.catalog.get_index_names(table)?;
        let mut touched = 0;
        for index_name in &index_names {
            let idx = self.catalog.get_index(table, index_name)?;
            let mut idx = idx.lock().unwrap();
            let key: Vec<Value> =
                idx.columns().iter().map(|c| row.get(c).cloned().expect("indexed column present")).collect();
            idx.insert(key, handle);
            touched += 1;
        }

        Ok(QueryResult::Message(format!("1 row inserted, {touched} indices updated")))
    }

    fn delete(&mut self, table: &str, predicate: Option<&Predicate>) -> Result<QueryResult, Error> {
        let table_arc = self.catalog.get_table(table)?;
        let defs = self.catalog.column_defs(table)?;
        let plan = match predicate {
            None => EvalPlan::project_all(EvalPlan::table_scan()),
            Some(predicate) => {
                let conjunction = get_where_conjunction(predicate, &defs)?;
                let eqs: Vec<Equality> =
                    conjunction.into_iter().map(|(column, value)| Equality { column, value }).collect();
                EvalPlan::project_all(EvalPlan::select(eqs, EvalPlan::table_scan())?)
            }
        }
        .optimize();

        let handles = {
            let mut t = table_arc.lock().unwrap();
            plan.pipeline(&mut *t)?
        };

        let index_names = self.catalog.get_index_names(table)?;
        let mut indices_touched = 0;
        for &handle in &handles {
            let row = {
                let mut t = table_arc.lock().unwrap();
                t.project(handle)?
            };
            for index_name in &index_names {
                let idx = self.catalog.get_index(table, index_name)?;
                let mut idx = idx.lock().unwrap();
                let key: Vec<Value> = idx
                    .columns()
                    .iter()
                    .map(|c| row.get(c).cloned().expect("indexed column present"))
                    .collect();
                idx.del(&key, handle);
                indices_touched += 1;
            }
        }
        for &handle in &handles {
            let mut t = table_arc.lock().unwrap();
            t.del(handle)?;
        }

        Ok(QueryResult::Message(format!(
            "successfully deleted {} rows from {table} and {} indices",
            handles.len(),
            indices_touched
        )))
    }

    fn select(
        &mut self,
        table: &str,
        columns: Option<&[String]>,
        predicate: Option<&Predicate>,
    ) -> Result<QueryResult, Error> {
        let defs = self.catalog.column_defs(table)?;
        let table_arc = self.catalog.get_table(table)?;

        let scan = match predicate {
            None => EvalPlan::table_scan(),
            Some(predicate) => {
                let conjunction = get_where_conjunction(predicate, &defs)?;
                let eqs: Vec<Equality> =
                    conjunction.into_iter().map(|(column, value)| Equality { column, value }).collect();
                EvalPlan::select(eqs, EvalPlan::table_scan())?
            }
        };

        let (plan, result_columns) = match columns {
            None => (EvalPlan::project_all(scan), defs.clone()),
            Some(cols) => {
                let result_columns: Result<Vec<ColumnDef>, Error> = cols
                    .iter()
                    .map(|name| {
                        defs.iter()
                            .find(|d| &d.name == name)
                            .cloned()
                            .ok_or_else(|| Error::UnknownColumn(name.clone()))
                    })
                    .collect();
                (EvalPlan::project(cols.to_vec(), scan), result_columns?)
            }
        };
        let plan = plan.optimize();

        let rows = {
            let mut t = table_arc.lock().unwrap();
            plan.evaluate(&mut *t)?
        };
        let message = format!("{} rows", rows.len());
        Ok(QueryResult::Rows { columns: result_columns, rows, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ColumnSpec;
    use crate::heapfile::FileRecordStore;

    fn setup() -> Executor<FileRecordStore> {
        let dir = tempfile::tempdir().unwrap();
        let catalog: Catalog<FileRecordStore> = Catalog::open(dir.path()).unwrap();
        std::mem::forget(dir);
        Executor::new(catalog)
    }

    fn create_foo(ex: &mut Executor<FileRecordStore>) {
        ex.execute(&Statement::CreateTable {
            table: "foo".into(),
            columns: vec![
                ColumnSpec { name: "id".into(), data_type: ColumnAttribute::Int },
                ColumnSpec { name: "data".into(), data_type: ColumnAttribute::Text },
            ],
        })
        .unwrap();
    }

    #[test]
    fn create_insert_select_star() {
        let mut ex = setup();
        create_foo(&mut ex);
        ex.execute(&Statement::Insert {
            table: "foo".into(),
            columns: None,
            values: vec![Value::Int(1), Value::Text("hello".into())],
        })
        .unwrap();
        let result = ex
            .execute(&Statement::Select { table: "foo".into(), columns: None, predicate: None })
            .unwrap();
        match result {
            QueryResult::Rows { rows, .. } => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].get("data"), Some(&Value::Text("hello".into())));
            }
            _ => panic!("expected rows"),
        }
    }

    #[test]
    fn delete_with_predicate_and_index_maintenance() {
        let mut ex = setup();
        create_foo(&mut ex);
        ex.execute(&Statement::CreateIndex {
            table: "foo".into(),
            index_name: "idx_foo_id".into(),
            columns: vec!["id".into()],
            index_type: "BTREE".into(),
        })
        .unwrap();
        ex.execute(&Statement::Insert {
            table: "foo".into(),
            columns: None,
            values: vec![Value::Int(1), Value::Text("a".into())],
        })
        .unwrap();
        ex.execute(&Statement::Insert {
            table: "foo".into(),
            columns: None,
            values: vec![Value::Int(2), Value::Text("b".into())],
        })
        .unwrap();
        let result = ex
            .execute(&Statement::Delete {
                table: "foo".into(),
                predicate: Some(Predicate::Eq { column: "id".into(), value: Value::Int(1) }),
            })
            .unwrap();
        assert_eq!(
            result,
            QueryResult::Message("successfully deleted 1 rows from foo and 1 indices".into())
        );

        let remaining = ex
            .execute(&Statement::Select { table: "foo".into(), columns: None, predicate: None })
            .unwrap();
        match remaining {
            QueryResult::Rows { rows, .. } => assert_eq!(rows.len(), 1),
            _ => panic!("expected rows"),
        }
    }

    #[test]
    fn show_tables_excludes_schema_tables() {
        let mut ex = setup();
        create_foo(&mut ex);
        let result = ex.execute(&Statement::ShowTables).unwrap();
        match result {
            QueryResult::Rows { rows, .. } => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].get("table_name"), Some(&Value::Text("foo".into())));
            }
            _ => panic!("expected rows"),
        }
    }

    #[test]
    fn insert_arity_mismatch_is_schema_error() {
        let mut ex = setup();
        create_foo(&mut ex);
        let result =
            ex.execute(&Statement::Insert { table: "foo".into(), columns: None, values: vec![Value::Int(1)] });
        assert!(matches!(result, Err(Error::MissingColumn(_))));
    }

    #[test]
    fn create_table_rejects_boolean_column_as_unrecognized() {
        let mut ex = setup();
        let result = ex.execute(&Statement::CreateTable {
            table: "bad".into(),
            columns: vec![ColumnSpec { name: "flag".into(), data_type: ColumnAttribute::Boolean }],
        });
        assert!(matches!(result, Err(Error::UnrecognizedDataType(_))));
        assert!(ex.execute(&Statement::ShowTables).unwrap() == QueryResult::Rows {
            columns: vec![ColumnDef::new("table_name", ColumnAttribute::Text)],
            rows: vec![],
            message: "0 rows".into(),
        });
    }

    #[test]
    fn drop_table_removes_it_from_show_tables() {
        let mut ex = setup();
        create_foo(&mut ex);
        ex.execute(&Statement::DropTable { table: "foo".into() }).unwrap();
        let result = ex.execute(&Statement::ShowTables).unwrap();
        match result {
            QueryResult::Rows { rows, .. } => assert!(rows.is_empty()),
            _ => panic!("expected rows"),
        }
    }

    #[test]
    fn predicate_other_is_rejected_as_unsupported() {
        let mut ex = setup();
        create_foo(&mut ex);
        let result = ex.execute(&Statement::Select {
            table: "foo".into(),
            columns: None,
            predicate: Some(Predicate::Other),
        });
        assert!(matches!(result, Err(Error::Plan(plan::Error::UnsupportedPredicate))));
    }

    #[test]
    fn predicate_and_merges_disjoint_keys() {
        let mut ex = setup();
        create_foo(&mut ex);
        ex.execute(&Statement::Insert {
            table: "foo".into(),
            columns: None,
            values: vec![Value::Int(1), Value::Text("a".into())],
        })
        .unwrap();
        ex.execute(&Statement::Insert {
            table: "foo".into(),
            columns: None,
            values: vec![Value::Int(2), Value::Text("b".into())],
        })
        .unwrap();
        let result = ex
            .execute(&Statement::Select {
                table: "foo".into(),
                columns: None,
                predicate: Some(Predicate::And(
                    Box::new(Predicate::Eq { column: "id".into(), value: Value::Int(1) }),
                    Box::new(Predicate::Eq { column: "data".into(), value: Value::Text("a".into()) }),
                )),
            })
            .unwrap();
        match result {
            QueryResult::Rows { rows, .. } => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].get("id"), Some(&Value::Int(1)));
            }
            _ => panic!("expected rows"),
        }
    }

    #[test]
    fn predicate_and_with_repeated_key_is_last_write_wins() {
        let mut ex = setup();
        create_foo(&mut ex);
        ex.execute(&Statement::Insert {
            table: "foo".into(),
            columns: None,
            values: vec![Value::Int(1), Value::Text("a".into())],
        })
        .unwrap();
        ex.execute(&Statement::Insert {
            table: "foo".into(),
            columns: None,
            values: vec![Value::Int(2), Value::Text("b".into())],
        })
        .unwrap();
        let result = ex
            .execute(&Statement::Select {
                table: "foo".into(),
                columns: None,
                predicate: Some(Predicate::And(
                    Box::new(Predicate::Eq { column: "id".into(), value: Value::Int(1) }),
                    Box::new(Predicate::Eq { column: "id".into(), value: Value::Int(2) }),
                )),
            })
            .unwrap();
        match result {
            QueryResult::Rows { rows, .. } => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].get("id"), Some(&Value::Int(2)));
            }
            _ => panic!("expected rows"),
        }
    }

    #[test]
    fn predicate_eq_with_boolean_literal_is_rejected_as_unsupported() {
        let mut ex = setup();
        create_foo(&mut ex);
        let result = ex.execute(&Statement::Select {
            table: "foo".into(),
            columns: None,
            predicate: Some(Predicate::Eq { column: "id".into(), value: Value::Boolean(true) }),
        });
        assert!(matches!(result, Err(Error::Plan(plan::Error::UnsupportedPredicate))));
    }
}
