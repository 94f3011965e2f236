//! In-memory mirror of one trip membership join table.
//!
//! The mirror is refreshed in full after every mutation that goes through
//! [`RelationStore`]; there is no incremental patching. Lookups never touch
//! the gateway.

use std::{
    collections::BTreeSet,
    sync::{Arc, PoisonError, RwLock},
};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    error::AppError,
    models::relation::{RelationKind, RelationStage, TripLink},
    services::gateway::{decode_all, Filter, GatewayError, RemoteGateway, Row},
};

pub struct RelationStore {
    kind: RelationKind,
    gateway: Arc<dyn RemoteGateway>,
    mirror: RwLock<Vec<TripLink>>,
}

impl RelationStore {
    pub fn new(kind: RelationKind, gateway: Arc<dyn RemoteGateway>) -> Self {
        Self {
            kind,
            gateway,
            mirror: RwLock::new(Vec::new()),
        }
    }

    /// Fetches every join row of this kind and replaces the mirror.
    pub async fn list_all(&self) -> Result<Vec<TripLink>, AppError> {
        let rows = self
            .gateway
            .select(self.kind.table(), &Filter::new())
            .await?;
        let links: Vec<TripLink> = decode_all(rows)?;
        debug!(relation = %self.kind, rows = links.len(), "relation mirror refreshed");
        *self.mirror.write().unwrap_or_else(PoisonError::into_inner) = links.clone();
        Ok(links)
    }

    pub fn links_for(&self, trip_id: &str) -> BTreeSet<String> {
        self.mirror
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|link| link.trip_id == trip_id)
            .map(|link| link.foreign_id.clone())
            .collect()
    }

    /// Reverse lookup, e.g. every trip a participant is enrolled in.
    pub fn trips_for(&self, foreign_id: &str) -> BTreeSet<String> {
        self.mirror
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|link| link.foreign_id == foreign_id)
            .map(|link| link.trip_id.clone())
            .collect()
    }

    #[cfg(test)]
    fn snapshot(&self) -> Vec<TripLink> {
        self.mirror
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Duplicate pairs are left to the store's key constraint.
    pub async fn add(&self, trip_id: &str, foreign_id: &str) -> Result<(), AppError> {
        let table = self.kind.table();
        self.gateway
            .insert(table, vec![self.row(trip_id, foreign_id)])
            .await
            .map_err(AppError::remote_write(table))?;
        info!(relation = %self.kind, trip_id, foreign_id, "link added");
        self.list_all().await?;
        Ok(())
    }

    /// Removing a pair that does not exist leaves everything as it was.
    pub async fn remove(&self, trip_id: &str, foreign_id: &str) -> Result<(), AppError> {
        let table = self.kind.table();
        let filter = Filter::new()
            .eq("viagem_id", trip_id)
            .eq(self.kind.foreign_column(), foreign_id);
        self.gateway
            .delete(table, &filter)
            .await
            .map_err(AppError::remote_write(table))?;
        info!(relation = %self.kind, trip_id, foreign_id, "link removed");
        self.list_all().await?;
        Ok(())
    }

    /// Deletes every link of `trip_id`, then inserts `ids` in one batch.
    ///
    /// Not atomic: when the insert fails the trip is left with no links of
    /// this kind. The mirror is refreshed either way so it shows what the
    /// store actually holds.
    pub async fn replace_for(
        &self,
        trip_id: &str,
        ids: &BTreeSet<String>,
    ) -> Result<(), AppError> {
        let outcome = self.write_replacement(trip_id, ids).await;
        self.finish(trip_id, outcome).await
    }

    /// Deletes every link of `trip_id`. Failures are plain write errors.
    pub async fn clear_for(&self, trip_id: &str) -> Result<(), AppError> {
        let table = self.kind.table();
        let outcome = self
            .gateway
            .delete(table, &Filter::new().eq("viagem_id", trip_id))
            .await
            .map_err(AppError::remote_write(table));
        self.finish(trip_id, outcome).await
    }

    async fn write_replacement(
        &self,
        trip_id: &str,
        ids: &BTreeSet<String>,
    ) -> Result<(), AppError> {
        self.clear_remote(trip_id).await?;
        if ids.is_empty() {
            return Ok(());
        }
        let rows = ids.iter().map(|id| self.row(trip_id, id)).collect();
        self.gateway
            .insert(self.kind.table(), rows)
            .await
            .map_err(|source| self.partial(trip_id, RelationStage::Insert, source))?;
        info!(relation = %self.kind, trip_id, links = ids.len(), "links replaced");
        Ok(())
    }

    async fn clear_remote(&self, trip_id: &str) -> Result<(), AppError> {
        self.gateway
            .delete(self.kind.table(), &Filter::new().eq("viagem_id", trip_id))
            .await
            .map_err(|source| self.partial(trip_id, RelationStage::Clear, source))
    }

    async fn finish(&self, trip_id: &str, outcome: Result<(), AppError>) -> Result<(), AppError> {
        if let Err(err) = &outcome {
            warn!(relation = %self.kind, trip_id, "link update incomplete: {err}");
        }
        let refreshed = self.list_all().await;
        outcome?;
        refreshed.map(|_| ())
    }

    fn partial(
        &self,
        trip_id: &str,
        stage: RelationStage,
        source: GatewayError,
    ) -> AppError {
        AppError::PartialRelation {
            trip_id: trip_id.to_string(),
            relation: self.kind,
            stage,
            source,
        }
    }

    fn row(&self, trip_id: &str, foreign_id: &str) -> Row {
        let mut row = Row::new();
        row.insert("viagem_id".into(), Value::String(trip_id.to_string()));
        row.insert(
            self.kind.foreign_column().into(),
            Value::String(foreign_id.to_string()),
        );
        row
    }
}
