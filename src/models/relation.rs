use std::fmt;

use serde::{Deserialize, Serialize};

use crate::services::gateway::Table;

/// The two membership join tables hanging off a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    Participants,
    Cities,
}

impl RelationKind {
    pub fn table(&self) -> Table {
        match self {
            RelationKind::Participants => Table::TripParticipant,
            RelationKind::Cities => Table::TripCity,
        }
    }

    pub fn foreign_column(&self) -> &'static str {
        match self {
            RelationKind::Participants => "participante_id",
            RelationKind::Cities => "cidade_id",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RelationKind::Participants => "participantes",
            RelationKind::Cities => "cidades",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table().as_str())
    }
}

/// Which half of a delete-then-insert replacement went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationStage {
    Clear,
    Insert,
}

impl fmt::Display for RelationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationStage::Clear => f.write_str("clearing"),
            RelationStage::Insert => f.write_str("inserting"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripLink {
    #[serde(rename = "viagem_id")]
    pub trip_id: String,
    #[serde(alias = "participante_id", alias = "cidade_id")]
    pub foreign_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItineraryStop {
    #[serde(rename = "viagem_id")]
    pub trip_id: String,
    #[serde(rename = "ponto_turistico_id")]
    pub attraction_id: String,
    #[serde(rename = "ordem")]
    pub order: i64,
}
