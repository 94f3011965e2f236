use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::{catalog::Entity, gateway::Table};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "estado")]
    pub state: String,
    #[serde(rename = "criado_em")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCity {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "estado")]
    pub state: String,
}

/// Partial update of a city; absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CityPatch {
    #[serde(rename = "nome", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "estado", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl Entity for City {
    type Draft = NewCity;
    type Patch = CityPatch;
    const TABLE: Table = Table::City;
    const ORDER_BY: &'static str = "nome";

    fn id(&self) -> &str {
        &self.id
    }
}
