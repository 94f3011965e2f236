//! Table-scoped access to the relational store.
//!
//! Everything above this module talks to the store through
//! [`RemoteGateway`], which only knows tables, equality filters and JSON
//! rows. Column names are checked against [`Table::columns`] before any
//! query is built, so callers cannot smuggle arbitrary SQL through a filter.

pub mod memory;
pub mod sql;

use std::fmt;

use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryGateway;
pub use sql::SqlGateway;

pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("constraint violated on {table}: {message}")]
    Constraint { table: Table, message: String },
    #[error("unknown column {column} on {table}")]
    UnknownColumn { table: Table, column: String },
    #[error("no row in {table} matched the filter")]
    NotFound { table: Table },
    #[error("{operation} on {table} rejected by the store")]
    Rejected { table: Table, operation: Operation },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("row decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Select => "select",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Bool,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ColumnKind::Text => "text",
            ColumnKind::Integer => "integer",
            ColumnKind::Bool => "boolean",
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub required: bool,
}

impl Column {
    /// Whether `value` can be stored in this column as is.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self.kind, value) {
            (_, Value::Null) => !self.required,
            (ColumnKind::Text, Value::String(_)) => true,
            (ColumnKind::Integer, value) => value.is_i64(),
            (ColumnKind::Bool, Value::Bool(_)) => true,
            _ => false,
        }
    }
}

const fn text(name: &'static str) -> Column {
    Column {
        name,
        kind: ColumnKind::Text,
        required: true,
    }
}

const fn optional(name: &'static str) -> Column {
    Column {
        name,
        kind: ColumnKind::Text,
        required: false,
    }
}

const TRIP_COLUMNS: &[Column] = &[
    text("id"),
    text("data_inicio"),
    text("data_fim"),
    optional("guia_turistico_id"),
    optional("imagem"),
    optional("criado_em"),
];

const PARTICIPANT_COLUMNS: &[Column] = &[
    text("id"),
    text("nome"),
    text("email"),
    Column {
        name: "pago",
        kind: ColumnKind::Bool,
        required: false,
    },
    optional("avatar"),
    optional("criado_em"),
];

const CITY_COLUMNS: &[Column] = &[text("id"), text("nome"), text("estado"), optional("criado_em")];

const ATTRACTION_COLUMNS: &[Column] = &[
    text("id"),
    text("nome"),
    optional("descricao"),
    optional("cidade_id"),
    optional("criado_em"),
];

const GUIDE_COLUMNS: &[Column] = &[
    text("id"),
    text("nome"),
    text("email"),
    optional("contratado_em"),
    optional("avatar"),
    optional("criado_em"),
];

const TRIP_PARTICIPANT_COLUMNS: &[Column] = &[text("viagem_id"), text("participante_id")];

const TRIP_CITY_COLUMNS: &[Column] = &[text("viagem_id"), text("cidade_id")];

const ITINERARY_COLUMNS: &[Column] = &[
    text("viagem_id"),
    text("ponto_turistico_id"),
    Column {
        name: "ordem",
        kind: ColumnKind::Integer,
        required: true,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Trip,
    Participant,
    City,
    Attraction,
    Guide,
    TripParticipant,
    TripCity,
    Itinerary,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Trip => "viagem",
            Table::Participant => "participante",
            Table::City => "cidade",
            Table::Attraction => "ponto_turistico",
            Table::Guide => "guia_turistico",
            Table::TripParticipant => "viagem_participante",
            Table::TripCity => "viagem_cidade",
            Table::Itinerary => "roteiro",
        }
    }

    pub fn columns(&self) -> &'static [Column] {
        match self {
            Table::Trip => TRIP_COLUMNS,
            Table::Participant => PARTICIPANT_COLUMNS,
            Table::City => CITY_COLUMNS,
            Table::Attraction => ATTRACTION_COLUMNS,
            Table::Guide => GUIDE_COLUMNS,
            Table::TripParticipant => TRIP_PARTICIPANT_COLUMNS,
            Table::TripCity => TRIP_CITY_COLUMNS,
            Table::Itinerary => ITINERARY_COLUMNS,
        }
    }

    /// Columns that together identify a row.
    pub fn key_columns(&self) -> &'static [&'static str] {
        match self {
            Table::TripParticipant => &["viagem_id", "participante_id"],
            Table::TripCity => &["viagem_id", "cidade_id"],
            Table::Itinerary => &["viagem_id", "ponto_turistico_id"],
            _ => &["id"],
        }
    }

    pub fn has_generated_id(&self) -> bool {
        self.key_columns() == ["id"]
    }

    /// Columns only the store writes: `criado_em` and a generated `id`.
    pub fn is_generated(&self, name: &str) -> bool {
        name == "criado_em" || (name == "id" && self.has_generated_id())
    }

    pub fn column(&self, name: &str) -> Result<&'static Column, GatewayError> {
        self.columns()
            .iter()
            .find(|column| column.name == name)
            .ok_or_else(|| GatewayError::UnknownColumn {
                table: *self,
                column: name.to_string(),
            })
    }

    /// Validates a row about to be inserted and fills in the values the
    /// store generates itself (`id`, `criado_em`).
    pub fn prepare_insert(&self, mut row: Row) -> Result<Row, GatewayError> {
        for name in row.keys() {
            self.column(name)?;
        }
        if self.has_generated_id() && !matches!(row.get("id"), Some(Value::String(_))) {
            row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        }
        if self.column("criado_em").is_ok() && row.get("criado_em").map_or(true, Value::is_null) {
            row.insert("criado_em".into(), Value::String(Utc::now().to_rfc3339()));
        }
        for column in self.columns() {
            let value = row.entry(column.name).or_insert(Value::Null);
            if value.is_null() && column.kind == ColumnKind::Bool {
                *value = Value::Bool(false);
            }
            self.check_value(column, value)?;
        }
        Ok(row)
    }

    /// Validates an update. Generated columns cannot be patched.
    pub fn check_patch(&self, patch: &Row) -> Result<(), GatewayError> {
        for (name, value) in patch {
            let column = self.column(name)?;
            if self.is_generated(name) {
                return Err(GatewayError::Constraint {
                    table: *self,
                    message: format!("{name} is set by the store"),
                });
            }
            self.check_value(column, value)?;
        }
        Ok(())
    }

    fn check_value(&self, column: &Column, value: &Value) -> Result<(), GatewayError> {
        if column.accepts(value) {
            return Ok(());
        }
        let message = if value.is_null() {
            format!("{} must not be null", column.name)
        } else {
            format!("{} expects {}, got {value}", column.name, column.kind)
        };
        Err(GatewayError::Constraint {
            table: *self,
            message,
        })
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Equality predicates joined with AND, plus an optional ordering.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
    order: Option<(String, Direction)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some((column.into(), direction));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn order(&self) -> Option<(&str, Direction)> {
        self.order
            .as_ref()
            .map(|(column, direction)| (column.as_str(), *direction))
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.conditions
            .iter()
            .all(|(column, value)| row.get(column).unwrap_or(&Value::Null) == value)
    }

    pub fn validate(&self, table: Table) -> Result<(), GatewayError> {
        for (column, _) in &self.conditions {
            table.column(column)?;
        }
        if let Some((column, _)) = &self.order {
            table.column(column)?;
        }
        Ok(())
    }
}

#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn select(&self, table: Table, filter: &Filter) -> Result<Vec<Row>, GatewayError>;

    /// Inserts every row or none of them.
    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, GatewayError>;

    async fn update(&self, table: Table, patch: Row, filter: &Filter) -> Result<Row, GatewayError>;

    /// Deleting rows that do not exist is not an error.
    async fn delete(&self, table: Table, filter: &Filter) -> Result<(), GatewayError>;
}

pub fn decode<T: DeserializeOwned>(row: Row) -> Result<T, GatewayError> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

pub fn decode_all<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, GatewayError> {
    rows.into_iter().map(decode).collect()
}

pub fn encode<T: Serialize>(value: &T) -> Result<Row, GatewayError> {
    match serde_json::to_value(value)? {
        Value::Object(row) => Ok(row),
        other => Err(GatewayError::Decode(serde::de::Error::custom(format!(
            "expected an object, got {other}"
        )))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn prepare_insert_generates_id_and_timestamp() {
        let prepared = Table::City
            .prepare_insert(row(json!({ "nome": "Ouro Preto", "estado": "MG" })))
            .expect("valid row");
        assert!(prepared["id"].as_str().is_some_and(|id| !id.is_empty()));
        assert!(prepared["criado_em"].is_string());
    }

    #[test]
    fn prepare_insert_rejects_unknown_and_missing_columns() {
        let unknown =
            Table::City.prepare_insert(row(json!({ "nome": "x", "estado": "y", "pais": "BR" })));
        assert!(matches!(unknown, Err(GatewayError::UnknownColumn { .. })));

        let missing = Table::City.prepare_insert(row(json!({ "nome": "x" })));
        assert!(matches!(missing, Err(GatewayError::Constraint { .. })));
    }

    #[test]
    fn prepare_insert_defaults_flags_to_false() {
        let prepared = Table::Participant
            .prepare_insert(row(json!({ "nome": "Ana", "email": "ana@example.com" })))
            .expect("valid row");
        assert_eq!(prepared["pago"], Value::Bool(false));
        assert_eq!(prepared["avatar"], Value::Null);
    }

    #[test]
    fn patch_values_must_match_column_kinds() {
        let mistyped = Table::City.check_patch(&row(json!({ "nome": 5 })));
        assert!(matches!(mistyped, Err(GatewayError::Constraint { .. })));

        let flag = Table::Participant.check_patch(&row(json!({ "pago": "sim" })));
        assert!(matches!(flag, Err(GatewayError::Constraint { .. })));

        let order = Table::Itinerary.check_patch(&row(json!({ "ordem": 2.5 })));
        assert!(matches!(order, Err(GatewayError::Constraint { .. })));

        let cleared = Table::Attraction.check_patch(&row(json!({ "descricao": null })));
        assert!(cleared.is_ok());
        assert!(Table::City.check_patch(&row(json!({ "estado": "SC" }))).is_ok());
    }

    #[test]
    fn generated_columns_cannot_be_patched() {
        let stamp = Table::City.check_patch(&row(json!({ "criado_em": "yesterday" })));
        assert!(matches!(stamp, Err(GatewayError::Constraint { .. })));

        let id = Table::Guide.check_patch(&row(json!({ "id": "other" })));
        assert!(matches!(id, Err(GatewayError::Constraint { .. })));
    }

    #[test]
    fn insert_rejects_mistyped_values() {
        let prepared = Table::Itinerary.prepare_insert(row(json!({
            "viagem_id": "t1",
            "ponto_turistico_id": "a1",
            "ordem": "first",
        })));
        assert!(matches!(prepared, Err(GatewayError::Constraint { .. })));
    }

    #[test]
    fn join_tables_keep_caller_keys() {
        let prepared = Table::TripCity
            .prepare_insert(row(json!({ "viagem_id": "t", "cidade_id": "c" })))
            .expect("valid row");
        assert!(!prepared.contains_key("id"));
        assert_eq!(prepared.len(), 2);
    }

    #[test]
    fn filter_matches_all_conditions() {
        let filter = Filter::new().eq("viagem_id", "t1").eq("cidade_id", "c1");
        assert!(filter.matches(&row(json!({ "viagem_id": "t1", "cidade_id": "c1" }))));
        assert!(!filter.matches(&row(json!({ "viagem_id": "t1", "cidade_id": "c2" }))));
        assert!(filter.validate(Table::TripCity).is_ok());
        assert!(filter.validate(Table::TripParticipant).is_err());
    }
}
