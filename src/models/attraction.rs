use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, NoneAsEmptyString};

use crate::services::{catalog::Entity, gateway::Table};

/// Ponto turístico. Attractions may exist without a city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attraction {
    pub id: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "descricao")]
    pub description: Option<String>,
    #[serde(rename = "cidade_id")]
    pub city_id: Option<String>,
    #[serde(rename = "criado_em")]
    pub created_at: Option<DateTime<Utc>>,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAttraction {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde_as(deserialize_as = "NoneAsEmptyString")]
    #[serde(rename = "descricao", default)]
    pub description: Option<String>,
    #[serde_as(deserialize_as = "NoneAsEmptyString")]
    #[serde(rename = "cidade_id", default)]
    pub city_id: Option<String>,
}

/// `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttractionPatch {
    #[serde(rename = "nome", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        rename = "descricao",
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub description: Option<Option<String>>,
    #[serde(
        rename = "cidade_id",
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub city_id: Option<Option<String>>,
}

impl Entity for Attraction {
    type Draft = NewAttraction;
    type Patch = AttractionPatch;
    const TABLE: Table = Table::Attraction;
    const ORDER_BY: &'static str = "nome";

    fn id(&self) -> &str {
        &self.id
    }
}
