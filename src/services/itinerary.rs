//! Ordered attraction stops per trip (`roteiro`).
//!
//! `ordem` is assigned here as "stops currently mirrored for the trip + 1".
//! Removals never renumber, so gaps are normal. Two sessions appending at
//! the same time can pick the same number; the store does not prevent it.

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, info};

use crate::{
    error::AppError,
    models::relation::ItineraryStop,
    services::gateway::{decode_all, Direction, Filter, RemoteGateway, Row, Table},
};

pub struct ItinerarySequencer {
    gateway: Arc<dyn RemoteGateway>,
    mirror: RwLock<Vec<ItineraryStop>>,
}

impl ItinerarySequencer {
    pub fn new(gateway: Arc<dyn RemoteGateway>) -> Self {
        Self {
            gateway,
            mirror: RwLock::new(Vec::new()),
        }
    }

    pub async fn list_all(&self) -> Result<Vec<ItineraryStop>, AppError> {
        let filter = Filter::new().order_by("ordem", Direction::Ascending);
        let rows = self.gateway.select(Table::Itinerary, &filter).await?;
        let stops: Vec<ItineraryStop> = decode_all(rows)?;
        debug!(rows = stops.len(), "itinerary mirror refreshed");
        *self.mirror.write().unwrap_or_else(PoisonError::into_inner) = stops.clone();
        Ok(stops)
    }

    pub fn stops_for(&self, trip_id: &str) -> Vec<ItineraryStop> {
        let mut stops: Vec<ItineraryStop> = self
            .mirror
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|stop| stop.trip_id == trip_id)
            .cloned()
            .collect();
        stops.sort_by_key(|stop| stop.order);
        stops
    }

    pub async fn append(
        &self,
        trip_id: &str,
        attraction_id: &str,
    ) -> Result<ItineraryStop, AppError> {
        let order = self.stops_for(trip_id).len() as i64 + 1;
        let mut row = Row::new();
        row.insert("viagem_id".into(), Value::String(trip_id.to_string()));
        row.insert("ponto_turistico_id".into(), Value::String(attraction_id.to_string()));
        row.insert("ordem".into(), Value::from(order));

        self.gateway
            .insert(Table::Itinerary, vec![row])
            .await
            .map_err(AppError::remote_write(Table::Itinerary))?;
        info!(trip_id, attraction_id, order, "stop appended");
        self.list_all().await?;

        Ok(ItineraryStop {
            trip_id: trip_id.to_string(),
            attraction_id: attraction_id.to_string(),
            order,
        })
    }

    pub async fn remove(&self, trip_id: &str, attraction_id: &str) -> Result<(), AppError> {
        let filter = Filter::new()
            .eq("viagem_id", trip_id)
            .eq("ponto_turistico_id", attraction_id);
        self.gateway
            .delete(Table::Itinerary, &filter)
            .await
            .map_err(AppError::remote_write(Table::Itinerary))?;
        info!(trip_id, attraction_id, "stop removed");
        self.list_all().await?;
        Ok(())
    }

    pub async fn clear_for(&self, trip_id: &str) -> Result<(), AppError> {
        self.gateway
            .delete(Table::Itinerary, &Filter::new().eq("viagem_id", trip_id))
            .await
            .map_err(AppError::remote_write(Table::Itinerary))?;
        self.list_all().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::gateway::{MemoryGateway, Operation};

    fn orders(stops: &[ItineraryStop]) -> Vec<(&str, i64)> {
        stops
            .iter()
            .map(|stop| (stop.attraction_id.as_str(), stop.order))
            .collect()
    }

    #[tokio::test]
    async fn append_numbers_from_one() {
        let sequencer = ItinerarySequencer::new(Arc::new(MemoryGateway::new()));
        let first = sequencer.append("t1", "a1").await.expect("append");
        let second = sequencer.append("t1", "a2").await.expect("append");
        let other_trip = sequencer.append("t2", "a1").await.expect("append");

        assert_eq!(first.order, 1);
        assert_eq!(second.order, 2);
        assert_eq!(other_trip.order, 1);
        assert_eq!(orders(&sequencer.stops_for("t1")), vec![("a1", 1), ("a2", 2)]);
    }

    #[tokio::test]
    async fn remove_leaves_gaps() {
        let sequencer = ItinerarySequencer::new(Arc::new(MemoryGateway::new()));
        sequencer.append("t1", "a1").await.expect("append");
        sequencer.append("t1", "a2").await.expect("append");
        sequencer.remove("t1", "a1").await.expect("remove");

        assert_eq!(orders(&sequencer.stops_for("t1")), vec![("a2", 2)]);

        // One stop left, so the next append reuses 2.
        let next = sequencer.append("t1", "a3").await.expect("append");
        assert_eq!(next.order, 2);
    }

    #[tokio::test]
    async fn failed_insert_is_reported_and_mirror_kept() {
        let gateway = MemoryGateway::new();
        let sequencer = ItinerarySequencer::new(Arc::new(gateway.clone()));
        sequencer.append("t1", "a1").await.expect("append");

        gateway.reject(Operation::Insert, Table::Itinerary);
        let err = sequencer.append("t1", "a2").await.expect_err("rejected");

        assert!(matches!(err, AppError::RemoteWrite { .. }));
        assert_eq!(orders(&sequencer.stops_for("t1")), vec![("a1", 1)]);
    }

    #[tokio::test]
    async fn same_attraction_twice_is_rejected() {
        let sequencer = ItinerarySequencer::new(Arc::new(MemoryGateway::new()));
        sequencer.append("t1", "a1").await.expect("append");
        assert!(sequencer.append("t1", "a1").await.is_err());
    }
}
