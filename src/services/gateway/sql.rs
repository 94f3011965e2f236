use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    error::ErrorKind,
    query::QueryScalar,
    sqlite::{Sqlite, SqliteArguments},
};
use tracing::debug;

use super::{ColumnKind, Direction, Filter, GatewayError, RemoteGateway, Row, Table};
use crate::db::DbPool;

type JsonQuery<'q> = QueryScalar<'q, Sqlite, String, SqliteArguments<'q>>;

/// Gateway over the SQLite schema in `migrations/`. Rows come back as
/// JSON objects built by SQLite itself (`json_object`).
#[derive(Clone)]
pub struct SqlGateway {
    pool: DbPool,
}

impl SqlGateway {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn projection(table: Table) -> String {
    let fields = table
        .columns()
        .iter()
        .map(|column| match column.kind {
            ColumnKind::Bool => format!(
                "'{0}', json(CASE WHEN {0} IS NULL THEN 'null' WHEN {0} THEN 'true' ELSE 'false' END)",
                column.name
            ),
            ColumnKind::Text | ColumnKind::Integer => format!("'{0}', {0}", column.name),
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("json_object({fields})")
}

fn where_clause(filter: &Filter, binds: &mut Vec<Value>) -> String {
    if filter.is_empty() {
        return String::new();
    }
    let predicates = filter
        .conditions()
        .iter()
        .map(|(column, value)| {
            binds.push(value.clone());
            format!("{column} = ?")
        })
        .collect::<Vec<_>>()
        .join(" AND ");
    format!(" WHERE {predicates}")
}

fn bind_values(mut query: JsonQuery<'_>, values: Vec<Value>) -> JsonQuery<'_> {
    for value in values {
        query = match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(flag) => query.bind(flag),
            Value::Number(number) => match number.as_i64() {
                Some(int) => query.bind(int),
                None => query.bind(number.as_f64()),
            },
            Value::String(text) => query.bind(text),
            other => query.bind(other.to_string()),
        };
    }
    query
}

fn parse_row(raw: &str) -> Result<Row, GatewayError> {
    Ok(serde_json::from_str(raw)?)
}

fn classify(table: Table, err: sqlx::Error) -> GatewayError {
    if let sqlx::Error::Database(db) = &err {
        if matches!(
            db.kind(),
            ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation
        ) {
            return GatewayError::Constraint {
                table,
                message: db.message().to_string(),
            };
        }
    }
    GatewayError::Database(err)
}

#[async_trait]
impl RemoteGateway for SqlGateway {
    async fn select(&self, table: Table, filter: &Filter) -> Result<Vec<Row>, GatewayError> {
        filter.validate(table)?;
        let mut binds = Vec::new();
        let mut sql = format!(
            "SELECT {} FROM {table}{}",
            projection(table),
            where_clause(filter, &mut binds)
        );
        if let Some((column, direction)) = filter.order() {
            let direction = match direction {
                Direction::Ascending => "ASC",
                Direction::Descending => "DESC",
            };
            sql.push_str(&format!(" ORDER BY {column} {direction}"));
        }
        let raw = bind_values(sqlx::query_scalar(&sql), binds)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| classify(table, err))?;
        raw.iter().map(|json| parse_row(json)).collect()
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, GatewayError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            let row = table.prepare_insert(row)?;
            let columns: Vec<&str> = row.keys().map(String::as_str).collect();
            let placeholders = vec!["?"; columns.len()].join(", ");
            let sql = format!(
                "INSERT INTO {table} ({}) VALUES ({placeholders}) RETURNING {}",
                columns.join(", "),
                projection(table)
            );
            let values = row.values().cloned().collect();
            let raw = bind_values(sqlx::query_scalar(&sql), values)
                .fetch_one(&mut *tx)
                .await
                .map_err(|err| classify(table, err))?;
            inserted.push(parse_row(&raw)?);
        }
        tx.commit().await?;
        debug!(%table, inserted = inserted.len(), "sql insert");
        Ok(inserted)
    }

    async fn update(&self, table: Table, patch: Row, filter: &Filter) -> Result<Row, GatewayError> {
        filter.validate(table)?;
        table.check_patch(&patch)?;
        if patch.is_empty() {
            return self
                .select(table, filter)
                .await?
                .into_iter()
                .next()
                .ok_or(GatewayError::NotFound { table });
        }
        let assignments = patch
            .keys()
            .map(|column| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut binds: Vec<Value> = patch.into_iter().map(|(_, value)| value).collect();
        let sql = format!(
            "UPDATE {table} SET {assignments}{} RETURNING {}",
            where_clause(filter, &mut binds),
            projection(table)
        );
        let raw = bind_values(sqlx::query_scalar(&sql), binds)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| classify(table, err))?;
        match raw.first() {
            Some(json) => parse_row(json),
            None => Err(GatewayError::NotFound { table }),
        }
    }

    async fn delete(&self, table: Table, filter: &Filter) -> Result<(), GatewayError> {
        filter.validate(table)?;
        let mut binds = Vec::new();
        let sql = format!(
            "DELETE FROM {table}{} RETURNING {}",
            where_clause(filter, &mut binds),
            projection(table)
        );
        let removed = bind_values(sqlx::query_scalar(&sql), binds)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| classify(table, err))?;
        debug!(%table, deleted = removed.len(), "sql delete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    async fn gateway() -> SqlGateway {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("migrations");
        SqlGateway::new(pool)
    }

    #[tokio::test]
    async fn insert_returns_generated_columns() {
        let gateway = gateway().await;
        let rows = gateway
            .insert(
                Table::Participant,
                vec![row(json!({ "nome": "Ana", "email": "ana@example.com" }))],
            )
            .await
            .expect("insert");
        assert_eq!(rows.len(), 1);
        assert!(rows[0]["id"].is_string());
        assert_eq!(rows[0]["pago"], Value::Bool(false));
    }

    #[tokio::test]
    async fn duplicate_join_rows_violate_the_key() {
        let gateway = gateway().await;
        let city = gateway
            .insert(Table::City, vec![row(json!({ "nome": "Olinda", "estado": "PE" }))])
            .await
            .expect("city")
            .remove(0);
        let trip = gateway
            .insert(
                Table::Trip,
                vec![row(json!({ "data_inicio": "2024-01-15", "data_fim": "2024-01-22" }))],
            )
            .await
            .expect("trip")
            .remove(0);
        let link = row(json!({ "viagem_id": trip["id"], "cidade_id": city["id"] }));

        gateway
            .insert(Table::TripCity, vec![link.clone()])
            .await
            .expect("first link");
        let duplicate = gateway.insert(Table::TripCity, vec![link]).await;

        assert!(matches!(duplicate, Err(GatewayError::Constraint { .. })));
    }

    #[tokio::test]
    async fn update_and_delete_follow_the_filter() {
        let gateway = gateway().await;
        let city = gateway
            .insert(Table::City, vec![row(json!({ "nome": "Paraty", "estado": "RJ" }))])
            .await
            .expect("city")
            .remove(0);
        let by_id = Filter::new().eq("id", city["id"].clone());

        let updated = gateway
            .update(Table::City, row(json!({ "nome": "Parati" })), &by_id)
            .await
            .expect("update");
        assert_eq!(updated["nome"], json!("Parati"));
        assert_eq!(updated["estado"], json!("RJ"));

        gateway.delete(Table::City, &by_id).await.expect("delete");
        gateway
            .delete(Table::City, &by_id)
            .await
            .expect("second delete is a no-op");
        assert!(gateway.select(Table::City, &by_id).await.expect("select").is_empty());
    }
}
