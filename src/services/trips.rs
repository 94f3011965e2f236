//! Create, update and delete a trip together with its join rows.
//!
//! The store gives us no multi-statement transactions, so a submit is a
//! fixed chain of single writes: upload, trip row, participant links, city
//! links. A failed upload or trip write stops the chain; nothing already
//! written is ever rolled back.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::{
    error::AppError,
    models::{
        relation::RelationKind,
        trip::{Trip, TripDraft, TripOverview},
    },
    services::{
        gateway::{decode, decode_all, encode, Direction, Filter, RemoteGateway, Table},
        itinerary::ItinerarySequencer,
        relations::RelationStore,
        storage::{upload_image, FileStorage},
    },
};

const TRIP_IMAGE_PREFIX: &str = "viagens";

#[derive(Clone)]
pub struct TripCoordinator {
    gateway: Arc<dyn RemoteGateway>,
    storage: Arc<dyn FileStorage>,
    participants: Arc<RelationStore>,
    cities: Arc<RelationStore>,
    itinerary: Arc<ItinerarySequencer>,
}

impl TripCoordinator {
    pub fn new(gateway: Arc<dyn RemoteGateway>, storage: Arc<dyn FileStorage>) -> Self {
        Self {
            participants: Arc::new(RelationStore::new(
                RelationKind::Participants,
                gateway.clone(),
            )),
            cities: Arc::new(RelationStore::new(RelationKind::Cities, gateway.clone())),
            itinerary: Arc::new(ItinerarySequencer::new(gateway.clone())),
            gateway,
            storage,
        }
    }

    pub fn participants(&self) -> &RelationStore {
        &self.participants
    }

    pub fn cities(&self) -> &RelationStore {
        &self.cities
    }

    pub fn relations(&self, kind: RelationKind) -> &RelationStore {
        match kind {
            RelationKind::Participants => &self.participants,
            RelationKind::Cities => &self.cities,
        }
    }

    pub fn itinerary(&self) -> &ItinerarySequencer {
        &self.itinerary
    }

    /// Loads every mirror; called once at startup.
    pub async fn refresh_all(&self) -> Result<(), AppError> {
        self.participants.list_all().await?;
        self.cities.list_all().await?;
        self.itinerary.list_all().await?;
        Ok(())
    }

    /// Newest trips first.
    pub async fn list(&self) -> Result<Vec<Trip>, AppError> {
        let filter = Filter::new().order_by("data_inicio", Direction::Descending);
        let rows = self.gateway.select(Table::Trip, &filter).await?;
        Ok(decode_all(rows)?)
    }

    pub async fn get(&self, trip_id: &str) -> Result<Trip, AppError> {
        let rows = self
            .gateway
            .select(Table::Trip, &Filter::new().eq("id", trip_id))
            .await?;
        let row = rows.into_iter().next().ok_or(AppError::NotFound)?;
        Ok(decode(row)?)
    }

    /// Attaches the mirrored links; no extra round trip beyond the trip.
    pub fn overview(&self, trip: Trip) -> TripOverview {
        TripOverview {
            participants: self.participants.links_for(&trip.id),
            cities: self.cities.links_for(&trip.id),
            itinerary: self.itinerary.stops_for(&trip.id),
            trip,
        }
    }

    #[instrument(skip_all, fields(trip_id = draft.id.as_deref().unwrap_or("new")))]
    pub async fn create_or_update(&self, draft: &TripDraft) -> Result<Trip, AppError> {
        let mut draft = draft.clone();
        if let Some(image) = draft.image_upload.take() {
            let url = upload_image(self.storage.as_ref(), TRIP_IMAGE_PREFIX, &image).await?;
            draft.image_url = Some(url.to_string());
        }

        let trip = self.write_trip(&draft).await?;

        // Cities are replaced even when the participant replacement failed.
        let participants = self.participants.replace_for(&trip.id, &draft.participants).await;
        let cities = self.cities.replace_for(&trip.id, &draft.cities).await;
        participants?;
        cities?;

        info!(
            trip_id = %trip.id,
            participants = draft.participants.len(),
            cities = draft.cities.len(),
            "trip saved"
        );
        Ok(trip)
    }

    async fn write_trip(&self, draft: &TripDraft) -> Result<Trip, AppError> {
        let row = encode(&draft.row()).map_err(AppError::TripWrite)?;
        let written = match &draft.id {
            Some(id) => self
                .gateway
                .update(Table::Trip, row, &Filter::new().eq("id", id.as_str()))
                .await
                .map_err(AppError::TripWrite)?,
            None => self
                .gateway
                .insert(Table::Trip, vec![row])
                .await
                .map_err(AppError::TripWrite)?
                .into_iter()
                .next()
                .ok_or(AppError::NotFound)?,
        };
        decode(written).map_err(AppError::TripWrite)
    }

    /// Deletes links, stops and finally the trip row. A failure part-way
    /// leaves whatever was not deleted yet and is reported as
    /// [`AppError::TripDelete`].
    #[instrument(skip(self))]
    pub async fn delete(&self, trip_id: &str) -> Result<(), AppError> {
        let interrupted = |err| interrupted_delete(trip_id, err);
        self.participants.clear_for(trip_id).await.map_err(interrupted)?;
        self.cities.clear_for(trip_id).await.map_err(interrupted)?;
        self.itinerary.clear_for(trip_id).await.map_err(interrupted)?;
        self.gateway
            .delete(Table::Trip, &Filter::new().eq("id", trip_id))
            .await
            .map_err(AppError::remote_write(Table::Trip))
            .map_err(interrupted)?;
        info!(trip_id, "trip deleted");
        Ok(())
    }
}

fn interrupted_delete(trip_id: &str, err: AppError) -> AppError {
    match err {
        AppError::RemoteWrite { table, source } => {
            warn!(trip_id, %table, "trip delete stopped part-way: {source}");
            AppError::TripDelete {
                trip_id: trip_id.to_string(),
                table,
                source,
            }
        }
        other => other,
    }
}
