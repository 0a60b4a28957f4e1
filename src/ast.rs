//! Minimal typed statement tree: the executor's input contract (§7).
//!
//! Tokenizing/parsing SQL text into this tree is explicitly out of scope
//! (§1) — callers (tests, demo programs) build `Statement` values directly.

use crate::value::{ColumnAttribute, Value};

/// A single equality conjunct, `column = value`, the leaf of a [`Predicate`]
/// tree once it has been walked down to `SIMPLE_OP` form.
#[derive(Debug, Clone, PartialEq)]
pub struct Equality {
    pub column: String,
    pub value: Value,
}

/// A `WHERE` clause expression, mirroring the original's `kExprOperator`
/// descent (§9 Design Notes): an `AND` of two sub-expressions, a `SIMPLE_OP`
/// equality leaf, or `Other` for any operator this dialect doesn't support
/// (`!=`, `<`, `OR`, ...). `get_where_conjunction` walks this tree and
/// rejects `Other` with `UnsupportedPredicate` instead of silently dropping
/// it — the AST itself must be able to represent the expression before it
/// can be rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq { column: String, value: Value },
    And(Box<Predicate>, Box<Predicate>),
    Other,
}

/// A column declaration as it appears in `CREATE TABLE` (§7).
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: ColumnAttribute,
}

/// The statement forms this kernel executes (§7). Every statement the
/// original dialect supports beyond these is out of scope.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable { table: String, columns: Vec<ColumnSpec> },
    DropTable { table: String },
    CreateIndex { table: String, index_name: String, columns: Vec<String>, index_type: String },
    DropIndex { table: String, index_name: String },
    ShowTables,
    ShowColumns { table: String },
    ShowIndex { table: String },
    Insert { table: String, columns: Option<Vec<String>>, values: Vec<Value> },
    Delete { table: String, predicate: Option<Predicate> },
    Select { table: String, columns: Option<Vec<String>>, predicate: Option<Predicate> },
}
