//! Embedded in-memory table store.
//!
//! Ships as the default local/secondary engine and as the backing store for
//! integration tests. Tables with an `id` column auto-assign row ids and
//! report them as `last_insert_id`.

use super::sql::{self, OrderSpec, Projection, Stmt};
use super::{Connector, Store, StoreRole};
use crate::connection::config::StoreConfig;
use crate::core::{DbError, Result, Row, Value};
use crate::result::QueryResult;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Table {
    columns: Vec<String>,
    rows: BTreeMap<i64, Row>,
    next_id: i64,
}

impl Table {
    fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn insert(&mut self, columns: &Option<Vec<String>>, values: Row) -> Result<Option<i64>> {
        let mut row = vec![Value::Null; self.columns.len()];
        match columns {
            Some(names) => {
                if names.len() != values.len() {
                    return Err(DbError::ExecutionError(
                        "Column count does not match value count".into(),
                    ));
                }
                for (name, value) in names.iter().zip(values) {
                    let idx = self.column_index(name).ok_or_else(|| {
                        DbError::ColumnNotFound(name.clone(), "<insert>".to_string())
                    })?;
                    row[idx] = value;
                }
            }
            None => {
                if values.len() != self.columns.len() {
                    return Err(DbError::ExecutionError(
                        "Value count does not match table arity".into(),
                    ));
                }
                row = values;
            }
        }

        match self.column_index("id") {
            Some(id_idx) => {
                let id = match row[id_idx] {
                    Value::Integer(explicit) => {
                        self.next_id = self.next_id.max(explicit + 1);
                        explicit
                    }
                    _ => {
                        let id = self.next_id;
                        self.next_id += 1;
                        row[id_idx] = Value::Integer(id);
                        id
                    }
                };
                self.rows.insert(id, row);
                Ok(Some(id))
            }
            None => {
                let key = self.next_id;
                self.next_id += 1;
                self.rows.insert(key, row);
                Ok(None)
            }
        }
    }
}

#[derive(Debug, Default)]
struct Database {
    tables: HashMap<String, Table>,
}

/// Shared in-memory database; clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Database>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply(&self, stmt: Stmt) -> Result<StmtOutcome> {
        let mut db = self.inner.lock()?;
        match stmt {
            Stmt::CreateTable {
                table,
                columns,
                if_not_exists,
            } => {
                if db.tables.contains_key(&table) {
                    if if_not_exists {
                        return Ok(StmtOutcome::Write(None));
                    }
                    return Err(DbError::TableExists(table));
                }
                db.tables.insert(table, Table::new(columns));
                Ok(StmtOutcome::Write(None))
            }
            Stmt::Insert {
                table,
                columns,
                rows,
            } => {
                let table = db
                    .tables
                    .get_mut(&table)
                    .ok_or(DbError::TableNotFound(table))?;
                let mut last_id = None;
                for values in rows {
                    last_id = table.insert(&columns, values)?;
                }
                Ok(StmtOutcome::Write(last_id))
            }
            Stmt::Select {
                table,
                projection,
                selection,
                order_by,
                limit,
            } => {
                let table = db
                    .tables
                    .get(&table)
                    .ok_or(DbError::TableNotFound(table))?;

                let mut matched: Vec<&Row> = Vec::new();
                for row in table.rows.values() {
                    let keep = match &selection {
                        Some(expr) => expr.matches(&table.columns, row)?,
                        None => true,
                    };
                    if keep {
                        matched.push(row);
                    }
                }

                if let Some(OrderSpec { column, descending }) = order_by {
                    let idx = table.column_index(&column).ok_or_else(|| {
                        DbError::ColumnNotFound(column.clone(), "<order by>".to_string())
                    })?;
                    matched.sort_by(|a, b| {
                        let ord = a[idx]
                            .compare(&b[idx])
                            .unwrap_or(std::cmp::Ordering::Equal);
                        if descending {
                            ord.reverse()
                        } else {
                            ord
                        }
                    });
                }

                if let Some(limit) = limit {
                    matched.truncate(limit);
                }

                let (columns, indices): (Vec<String>, Vec<usize>) = match projection {
                    Projection::All => (
                        table.columns.clone(),
                        (0..table.columns.len()).collect(),
                    ),
                    Projection::Columns(names) => {
                        let mut indices = Vec::with_capacity(names.len());
                        for name in &names {
                            let idx = table.column_index(name).ok_or_else(|| {
                                DbError::ColumnNotFound(name.clone(), "<select>".to_string())
                            })?;
                            indices.push(idx);
                        }
                        (names, indices)
                    }
                };

                let rows = matched
                    .into_iter()
                    .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                    .collect();
                Ok(StmtOutcome::Rows(QueryResult::new(columns, rows)))
            }
            Stmt::Update {
                table,
                assignments,
                selection,
            } => {
                let table = db
                    .tables
                    .get_mut(&table)
                    .ok_or(DbError::TableNotFound(table))?;
                let columns = table.columns.clone();
                let mut resolved = Vec::with_capacity(assignments.len());
                for (name, value) in assignments {
                    let idx = table.column_index(&name).ok_or_else(|| {
                        DbError::ColumnNotFound(name.clone(), "<update>".to_string())
                    })?;
                    resolved.push((idx, value));
                }
                for row in table.rows.values_mut() {
                    let touch = match &selection {
                        Some(expr) => expr.matches(&columns, row)?,
                        None => true,
                    };
                    if touch {
                        for (idx, value) in &resolved {
                            row[*idx] = value.clone();
                        }
                    }
                }
                Ok(StmtOutcome::Write(None))
            }
            Stmt::Delete { table, selection } => {
                let table = db
                    .tables
                    .get_mut(&table)
                    .ok_or(DbError::TableNotFound(table))?;
                let columns = table.columns.clone();
                let mut doomed = Vec::new();
                for (key, row) in table.rows.iter() {
                    let hit = match &selection {
                        Some(expr) => expr.matches(&columns, row)?,
                        None => true,
                    };
                    if hit {
                        doomed.push(*key);
                    }
                }
                for key in doomed {
                    table.rows.remove(&key);
                }
                Ok(StmtOutcome::Write(None))
            }
        }
    }
}

enum StmtOutcome {
    Rows(QueryResult),
    Write(Option<i64>),
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        // Lock round-trip stands in for a network ping.
        drop(self.inner.lock()?);
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        match self.apply(sql::parse(sql, params)?)? {
            StmtOutcome::Rows(result) => Ok(result),
            StmtOutcome::Write(_) => Err(DbError::ExecutionError(
                "Write statement submitted through query".into(),
            )),
        }
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<Option<i64>> {
        match self.apply(sql::parse(sql, params)?)? {
            StmtOutcome::Write(last_id) => Ok(last_id),
            StmtOutcome::Rows(_) => Err(DbError::ExecutionError(
                "Read statement submitted through execute".into(),
            )),
        }
    }

    async fn execute_many(&self, sql: &str, batches: &[Vec<Value>]) -> Result<()> {
        for params in batches {
            self.execute(sql, params).await?;
        }
        Ok(())
    }
}

/// Opens shared [`MemoryStore`] instances keyed by database name, so a
/// reconnect observes the data written before the connection was dropped.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    databases: Arc<Mutex<HashMap<String, MemoryStore>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Store = MemoryStore;

    async fn open(&self, _role: StoreRole, config: &StoreConfig) -> Result<Self::Store> {
        let mut databases = self.databases.lock()?;
        Ok(databases
            .entry(config.database.clone())
            .or_default()
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> MemoryStore {
        let store = MemoryStore::new();
        let stmt = sql::parse(
            "CREATE TABLE invoices (id INTEGER, number TEXT, date TEXT)",
            &[],
        )
        .unwrap();
        store.apply(stmt).unwrap();
        store
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids() {
        let store = setup();
        let first = store
            .execute(
                "INSERT INTO invoices (number, date) VALUES (?, ?)",
                &[Value::from("FATURA NR.1"), Value::from("2026-01-10")],
            )
            .await
            .unwrap();
        let second = store
            .execute(
                "INSERT INTO invoices (number, date) VALUES (?, ?)",
                &[Value::from("FATURA NR.2"), Value::from("2026-02-01")],
            )
            .await
            .unwrap();

        assert_eq!(first, Some(1));
        assert_eq!(second, Some(2));
    }

    #[tokio::test]
    async fn select_filters_orders_and_limits() {
        let store = setup();
        for (number, date) in [
            ("FATURA NR.1", "2025-03-01"),
            ("FATURA NR.2", "2026-01-10"),
            ("FATURA NR.3", "2026-06-01"),
        ] {
            store
                .execute(
                    "INSERT INTO invoices (number, date) VALUES (?, ?)",
                    &[Value::from(number), Value::from(date)],
                )
                .await
                .unwrap();
        }

        let result = store
            .query(
                "SELECT number FROM invoices WHERE date >= ? AND date <= ? ORDER BY id DESC LIMIT 1",
                &[Value::from("2026-01-01"), Value::from("2026-12-31")],
            )
            .await
            .unwrap();

        assert_eq!(result.row_count(), 1);
        assert_eq!(result.get(0, "number").as_str(), Some("FATURA NR.3"));
    }

    #[tokio::test]
    async fn update_rewrites_matching_rows() {
        let store = setup();
        store
            .execute(
                "INSERT INTO invoices (number, date) VALUES (?, ?)",
                &[Value::from("FATURA NR.1"), Value::from("2026-01-10")],
            )
            .await
            .unwrap();

        store
            .execute(
                "UPDATE invoices SET number = ? WHERE id = ?",
                &[Value::from("FATURA NR.7"), Value::from(1)],
            )
            .await
            .unwrap();

        let result = store
            .query("SELECT number FROM invoices", &[])
            .await
            .unwrap();
        assert_eq!(result.get(0, "number").as_str(), Some("FATURA NR.7"));
    }

    #[tokio::test]
    async fn connector_shares_database_by_name() {
        let connector = MemoryConnector::new();
        let config = StoreConfig::new("fatura_local");

        let first = connector
            .open(StoreRole::Secondary, &config)
            .await
            .unwrap();
        first
            .execute("CREATE TABLE offers (id INTEGER, number TEXT)", &[])
            .await
            .unwrap();

        let second = connector
            .open(StoreRole::Secondary, &config)
            .await
            .unwrap();
        let result = second.query("SELECT * FROM offers", &[]).await.unwrap();
        assert!(result.is_empty());
    }
}
