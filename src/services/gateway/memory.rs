use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{Direction, Filter, GatewayError, Operation, RemoteGateway, Row, Table};

/// Process-local store with the same key constraints as the SQLite schema.
/// Foreign keys are not checked.
#[derive(Clone, Default)]
pub struct MemoryGateway {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    tables: HashMap<Table, Vec<Row>>,
    rejected: HashSet<(Operation, Table)>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `operation` on `table` fail with
    /// [`GatewayError::Rejected`] until [`MemoryGateway::allow`] is called.
    pub fn reject(&self, operation: Operation, table: Table) {
        self.lock().rejected.insert((operation, table));
    }

    pub fn allow(&self, operation: Operation, table: Table) {
        self.lock().rejected.remove(&(operation, table));
    }

    pub fn row_count(&self, table: Table) -> usize {
        self.lock().tables.get(&table).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Inner {
    fn check(&self, operation: Operation, table: Table) -> Result<(), GatewayError> {
        if self.rejected.contains(&(operation, table)) {
            return Err(GatewayError::Rejected { table, operation });
        }
        Ok(())
    }
}

fn key_of(table: Table, row: &Row) -> Vec<Value> {
    table
        .key_columns()
        .iter()
        .map(|column| row.get(*column).cloned().unwrap_or(Value::Null))
        .collect()
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (a, b) => a.to_string().cmp(&b.to_string()),
    }
}

#[async_trait]
impl RemoteGateway for MemoryGateway {
    async fn select(&self, table: Table, filter: &Filter) -> Result<Vec<Row>, GatewayError> {
        filter.validate(table)?;
        let inner = self.lock();
        inner.check(Operation::Select, table)?;
        let mut rows: Vec<Row> = inner
            .tables
            .get(&table)
            .map(|rows| rows.iter().filter(|row| filter.matches(row)).cloned().collect())
            .unwrap_or_default();
        if let Some((column, direction)) = filter.order() {
            rows.sort_by(|a, b| {
                let ordering = compare_values(
                    a.get(column).unwrap_or(&Value::Null),
                    b.get(column).unwrap_or(&Value::Null),
                );
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }
        Ok(rows)
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, GatewayError> {
        let prepared = rows
            .into_iter()
            .map(|row| table.prepare_insert(row))
            .collect::<Result<Vec<_>, _>>()?;

        let mut inner = self.lock();
        inner.check(Operation::Insert, table)?;
        let existing = inner.tables.entry(table).or_default();
        let mut seen: HashSet<String> = existing
            .iter()
            .map(|row| Value::Array(key_of(table, row)).to_string())
            .collect();
        for row in &prepared {
            if !seen.insert(Value::Array(key_of(table, row)).to_string()) {
                return Err(GatewayError::Constraint {
                    table,
                    message: format!("duplicate key {}", table.key_columns().join(", ")),
                });
            }
        }
        existing.extend(prepared.iter().cloned());
        debug!(%table, inserted = prepared.len(), "memory insert");
        Ok(prepared)
    }

    async fn update(&self, table: Table, patch: Row, filter: &Filter) -> Result<Row, GatewayError> {
        filter.validate(table)?;
        table.check_patch(&patch)?;
        let mut inner = self.lock();
        inner.check(Operation::Update, table)?;
        let rows = inner.tables.entry(table).or_default();
        let mut updated = None;
        for row in rows.iter_mut().filter(|row| filter.matches(row)) {
            for (column, value) in &patch {
                row.insert(column.clone(), value.clone());
            }
            if updated.is_none() {
                updated = Some(row.clone());
            }
        }
        updated.ok_or(GatewayError::NotFound { table })
    }

    async fn delete(&self, table: Table, filter: &Filter) -> Result<(), GatewayError> {
        filter.validate(table)?;
        let mut inner = self.lock();
        inner.check(Operation::Delete, table)?;
        if let Some(rows) = inner.tables.get_mut(&table) {
            let before = rows.len();
            rows.retain(|row| !filter.matches(row));
            debug!(%table, deleted = before - rows.len(), "memory delete");
        }
        Ok(())
    }
}
