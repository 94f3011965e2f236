use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{models::relation::ItineraryStop, services::storage::ImageUpload};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: String,
    #[serde(rename = "data_inicio")]
    pub start_date: NaiveDate,
    #[serde(rename = "data_fim")]
    pub end_date: NaiveDate,
    #[serde(rename = "guia_turistico_id")]
    pub guide_id: Option<String>,
    #[serde(rename = "imagem")]
    pub image_url: Option<String>,
    #[serde(rename = "criado_em")]
    pub created_at: DateTime<Utc>,
}

/// Scalar columns of a trip as written to the store.
#[derive(Debug, Serialize)]
pub(crate) struct TripRow<'a> {
    pub data_inicio: NaiveDate,
    pub data_fim: NaiveDate,
    pub guia_turistico_id: Option<&'a str>,
    pub imagem: Option<&'a str>,
}

/// A trip plus everything hanging off it, as the list screens show it.
#[derive(Debug, Clone, Serialize)]
pub struct TripOverview {
    #[serde(flatten)]
    pub trip: Trip,
    #[serde(rename = "participantes")]
    pub participants: BTreeSet<String>,
    #[serde(rename = "cidades")]
    pub cities: BTreeSet<String>,
    #[serde(rename = "roteiro")]
    pub itinerary: Vec<ItineraryStop>,
}

/// Form state for a trip that has not been submitted yet. Participant and
/// city selections are pending sets; nothing here touches the store.
#[derive(Debug, Clone, PartialEq)]
pub struct TripDraft {
    pub id: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub guide_id: Option<String>,
    pub image_url: Option<String>,
    pub image_upload: Option<ImageUpload>,
    pub participants: BTreeSet<String>,
    pub cities: BTreeSet<String>,
}

impl TripDraft {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            id: None,
            start_date,
            end_date,
            guide_id: None,
            image_url: None,
            image_upload: None,
            participants: BTreeSet::new(),
            cities: BTreeSet::new(),
        }
    }

    /// Draft for editing an existing trip with its current links.
    pub fn from_overview(overview: &TripOverview) -> Self {
        let trip = &overview.trip;
        Self {
            id: Some(trip.id.clone()),
            start_date: trip.start_date,
            end_date: trip.end_date,
            guide_id: trip.guide_id.clone(),
            image_url: trip.image_url.clone(),
            image_upload: None,
            participants: overview.participants.clone(),
            cities: overview.cities.clone(),
        }
    }

    pub fn with_guide(mut self, guide_id: impl Into<String>) -> Self {
        self.guide_id = Some(guide_id.into());
        self
    }

    pub fn with_participants<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.participants.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_cities<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cities.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Returns false when the participant was already selected.
    pub fn add_participant(&mut self, id: impl Into<String>) -> bool {
        self.participants.insert(id.into())
    }

    pub fn remove_participant(&mut self, id: &str) -> bool {
        self.participants.remove(id)
    }

    pub fn add_city(&mut self, id: impl Into<String>) -> bool {
        self.cities.insert(id.into())
    }

    pub fn remove_city(&mut self, id: &str) -> bool {
        self.cities.remove(id)
    }

    pub fn attach_image(&mut self, upload: ImageUpload) {
        self.image_upload = Some(upload);
    }

    pub(crate) fn row(&self) -> TripRow<'_> {
        TripRow {
            data_inicio: self.start_date,
            data_fim: self.end_date,
            guia_turistico_id: self.guide_id.as_deref(),
            imagem: self.image_url.as_deref(),
        }
    }
}
