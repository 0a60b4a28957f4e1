//! Exercises the kernel end-to-end by constructing `ast::Statement` values
//! directly, the way a parser sitting outside this crate would hand them to
//! `Engine::execute` (§1, §6). Not the CLI/REPL described in §6 — that
//! remains an external collaborator.

use heapql::{ColumnAttribute, Engine, Value};
use heapql::ast::{ColumnSpec, Predicate, Statement};

fn main() {
    env_logger::init();
    let dir = tempfile::tempdir().expect("tempdir");
    let mut engine = Engine::open_dir(dir.path()).expect("open engine");

    let result = engine
        .execute(&Statement::CreateTable {
            table: "foo".into(),
            columns: vec![
                ColumnSpec { name: "id".into(), data_type: ColumnAttribute::Int },
                ColumnSpec { name: "data".into(), data_type: ColumnAttribute::Text },
            ],
        })
        .expect("create table");
    println!("{}", heapql::render::render(&result));

    for (id, data) in [(1, "hello"), (2, "world")] {
        let result = engine
            .execute(&Statement::Insert {
                table: "foo".into(),
                columns: None,
                values: vec![Value::Int(id), Value::Text(data.into())],
            })
            .expect("insert");
        println!("{}", heapql::render::render(&result));
    }

    let result = engine
        .execute(&Statement::Select { table: "foo".into(), columns: None, predicate: None })
        .expect("select *");
    println!("{}", heapql::render::render(&result));

    let result = engine
        .execute(&Statement::Select {
            table: "foo".into(),
            columns: Some(vec!["id".into()]),
            predicate: Some(Predicate::Eq { column: "data".into(), value: Value::Text("world".into()) }),
        })
        .expect("select with predicate");
    println!("{}", heapql::render::render(&result));

    let result = engine
        .execute(&Statement::Delete {
            table: "foo".into(),
            predicate: Some(Predicate::Eq { column: "id".into(), value: Value::Int(1) }),
        })
        .expect("delete");
    println!("{}", heapql::render::render(&result));
}
