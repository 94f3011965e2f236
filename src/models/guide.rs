use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, NoneAsEmptyString};

use crate::services::{catalog::Entity, gateway::Table};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guide {
    pub id: String,
    #[serde(rename = "nome")]
    pub name: String,
    pub email: String,
    #[serde(rename = "contratado_em")]
    pub hired_on: Option<NaiveDate>,
    pub avatar: Option<String>,
    #[serde(rename = "criado_em")]
    pub created_at: Option<DateTime<Utc>>,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGuide {
    #[serde(rename = "nome")]
    pub name: String,
    pub email: String,
    #[serde_as(deserialize_as = "NoneAsEmptyString")]
    #[serde(rename = "contratado_em", default)]
    pub hired_on: Option<NaiveDate>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuidePatch {
    #[serde(rename = "nome", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(
        rename = "contratado_em",
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub hired_on: Option<Option<NaiveDate>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub avatar: Option<Option<String>>,
}

impl Entity for Guide {
    type Draft = NewGuide;
    type Patch = GuidePatch;
    const TABLE: Table = Table::Guide;
    const ORDER_BY: &'static str = "nome";
    const IMAGE_PREFIX: Option<&'static str> = Some("guias");

    fn id(&self) -> &str {
        &self.id
    }

    fn set_image(draft: &mut NewGuide, url: String) {
        draft.avatar = Some(url);
    }
}
