use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

use crate::services::{catalog::Entity, gateway::Table};

/// Participante, a client that can be enrolled in trips.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    #[serde(rename = "nome")]
    pub name: String,
    pub email: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "pago", default)]
    pub paid: bool,
    pub avatar: Option<String>,
    #[serde(rename = "criado_em")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewParticipant {
    #[serde(rename = "nome")]
    pub name: String,
    pub email: String,
    #[serde(rename = "pago", default)]
    pub paid: bool,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParticipantPatch {
    #[serde(rename = "nome", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "pago", default, skip_serializing_if = "Option::is_none")]
    pub paid: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub avatar: Option<Option<String>>,
}

impl Entity for Participant {
    type Draft = NewParticipant;
    type Patch = ParticipantPatch;
    const TABLE: Table = Table::Participant;
    const ORDER_BY: &'static str = "nome";
    const IMAGE_PREFIX: Option<&'static str> = Some("participantes");

    fn id(&self) -> &str {
        &self.id
    }

    fn set_image(draft: &mut NewParticipant, url: String) {
        draft.avatar = Some(url);
    }
}
