//! Evaluation plan: the small algebraic tree that compiles a SELECT/DELETE
//! into a pipeline of handles (§4.5), grounded on the visitor-style
//! tree-walking pattern of `CollectingVisitor`.

use thiserror::Error;

use crate::ast::Equality;
use crate::heaptable::{Handle, Relation};
use crate::value::Row;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported predicate")]
    UnsupportedPredicate,
    #[error("plan is not pipeline-shaped")]
    NotPipelineShaped,
    #[error(transparent)]
    Relation(#[from] crate::heaptable::Error),
}

/// The plan tree (§4.5). Only equality-AND predicates are representable —
/// anything else is rejected at construction, not at evaluation time.
pub enum EvalPlan {
    TableScan,
    Select { predicate: Vec<Equality>, child: Box<EvalPlan> },
    Project { columns: Vec<String>, child: Box<EvalPlan> },
    ProjectAll { child: Box<EvalPlan> },
    /// The fused node `optimize()` rewrites `Select(p, TableScan)` into.
    SelectFromTable { predicate: Vec<Equality> },
}

impl EvalPlan {
    pub fn table_scan() -> Self {
        EvalPlan::TableScan
    }

    pub fn select(predicate: Vec<Equality>, child: EvalPlan) -> Result<Self, Error> {
        if predicate.is_empty() {
            return Err(Error::UnsupportedPredicate);
        }
        Ok(EvalPlan::Select { predicate, child: Box::new(child) })
    }

    pub fn project(columns: Vec<String>, child: EvalPlan) -> Self {
        EvalPlan::Project { columns, child: Box::new(child) }
    }

    pub fn project_all(child: EvalPlan) -> Self {
        EvalPlan::ProjectAll { child: Box::new(child) }
    }

    /// `Select(p, TableScan(t)) -> SelectFromTable(p, t)`. Total: every
    /// other shape is returned unchanged. Preserves the multiset of output
    /// rows (§4.5).
    pub fn optimize(self) -> Self {
        match self {
            EvalPlan::Select { predicate, child } => match *child {
                EvalPlan::TableScan => EvalPlan::SelectFromTable { predicate },
                other => EvalPlan::Select { predicate, child: Box::new(other.optimize()) },
            },
            EvalPlan::Project { columns, child } => EvalPlan::Project { columns, child: Box::new(child.optimize()) },
            EvalPlan::ProjectAll { child } => EvalPlan::ProjectAll { child: Box::new(child.optimize()) },
            other => other,
        }
    }

    fn matches(predicate: &[Equality], row: &Row) -> bool {
        predicate.iter().all(|eq| row.get(&eq.column) == Some(&eq.value))
    }

    fn scan_handles<R: Relation>(&self, table: &mut R) -> Result<Vec<Handle>, Error> {
        match self {
            EvalPlan::TableScan => Ok(table.select()?),
            EvalPlan::SelectFromTable { predicate } => {
                let mut out = Vec::new();
                for h in table.select()? {
                    let row = table.project(h)?;
                    if Self::matches(predicate, &row) {
                        out.push(h);
                    }
                }
                Ok(out)
            }
            EvalPlan::Select { predicate, child } => {
                let mut out = Vec::new();
                for h in child.scan_handles(table)? {
                    let row = table.project(h)?;
                    if Self::matches(predicate, &row) {
                        out.push(h);
                    }
                }
                Ok(out)
            }
            EvalPlan::Project { child, .. } | EvalPlan::ProjectAll { child } => child.scan_handles(table),
        }
    }

    /// Evaluates the plan down to its handle set without materializing
    /// rows. Requires `Project{All}(Select?(TableScan))`-shape (§4.5).
    pub fn pipeline<R: Relation>(&self, table: &mut R) -> Result<Vec<Handle>, Error> {
        match self {
            EvalPlan::Project { child, .. } | EvalPlan::ProjectAll { child } => match &**child {
                EvalPlan::TableScan | EvalPlan::SelectFromTable { .. } => child.scan_handles(table),
                _ => Err(Error::NotPipelineShaped),
            },
            EvalPlan::TableScan | EvalPlan::SelectFromTable { .. } => self.scan_handles(table),
            _ => Err(Error::NotPipelineShaped),
        }
    }

    /// Materializes rows by projecting each handle through `table`.
    pub fn evaluate<R: Relation>(&self, table: &mut R) -> Result<Vec<Row>, Error> {
        match self {
            EvalPlan::ProjectAll { child } => {
                let handles = child.scan_handles(table)?;
                handles.into_iter().map(|h| table.project(h).map_err(Error::from)).collect()
            }
            EvalPlan::Project { columns, child } => {
                let handles = child.scan_handles(table)?;
                handles.into_iter().map(|h| table.project_cols(h, columns).map_err(Error::from)).collect()
            }
            other => {
                let handles = other.scan_handles(table)?;
                handles.into_iter().map(|h| table.project(h).map_err(Error::from)).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heapfile::FileRecordStore;
    use crate::heaptable::HeapTable;
    use crate::value::{row, ColumnAttribute, ColumnDef, Value};

    fn fixture() -> HeapTable<FileRecordStore> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        std::mem::forget(dir);
        let mut t = HeapTable::new(
            "t",
            vec![ColumnDef::new("id", ColumnAttribute::Int), ColumnDef::new("data", ColumnAttribute::Text)],
            path,
        );
        t.create().unwrap();
        t.insert(&row([("id", Value::Int(1)), ("data", Value::Text("a".into()))])).unwrap();
        t.insert(&row([("id", Value::Int(2)), ("data", Value::Text("b".into()))])).unwrap();
        t
    }

    #[test]
    fn select_star_returns_all_rows() {
        let mut t = fixture();
        let plan = EvalPlan::project_all(EvalPlan::table_scan()).optimize();
        let rows = plan.evaluate(&mut t).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn select_with_predicate_filters_and_fuses() {
        let mut t = fixture();
        let predicate = vec![Equality { column: "id".into(), value: Value::Int(2) }];
        let plan = EvalPlan::project_all(
            EvalPlan::select(predicate, EvalPlan::table_scan()).unwrap(),
        )
        .optimize();
        assert!(matches!(
            &**match &plan {
                EvalPlan::ProjectAll { child } => child,
                _ => unreachable!(),
            },
            EvalPlan::SelectFromTable { .. }
        ));
        let rows = plan.evaluate(&mut t).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("data"), Some(&Value::Text("b".into())));
    }

    #[test]
    fn pipeline_returns_handles_for_delete() {
        let mut t = fixture();
        let predicate = vec![Equality { column: "id".into(), value: Value::Int(1) }];
        let plan = EvalPlan::project_all(EvalPlan::select(predicate, EvalPlan::table_scan()).unwrap()).optimize();
        let handles = plan.pipeline(&mut t).unwrap();
        assert_eq!(handles.len(), 1);
    }

    #[test]
    fn empty_predicate_is_rejected_at_build_time() {
        assert!(matches!(EvalPlan::select(vec![], EvalPlan::table_scan()), Err(Error::UnsupportedPredicate)));
    }
}
