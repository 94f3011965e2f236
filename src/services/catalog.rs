use std::{marker::PhantomData, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

use crate::{
    error::AppError,
    services::{
        gateway::{
            decode, decode_all, encode, Direction, Filter, GatewayError, RemoteGateway, Table,
        },
        storage::{upload_image, FileStorage, ImageUpload},
    },
};

/// A row type managed by the catalog screens (cities, attractions, guides,
/// participants). Trips are not catalog entities.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    type Draft: Serialize + DeserializeOwned + Send + Sync;
    /// Typed partial update. Only the fields it serializes are written.
    type Patch: Serialize + DeserializeOwned + Send + Sync;

    const TABLE: Table;
    const ORDER_BY: &'static str;
    /// Storage prefix for the entity's picture, if it has one.
    const IMAGE_PREFIX: Option<&'static str> = None;

    fn id(&self) -> &str;

    fn set_image(_draft: &mut Self::Draft, _url: String) {}
}

pub struct Catalog<E> {
    gateway: Arc<dyn RemoteGateway>,
    storage: Arc<dyn FileStorage>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Catalog<E> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            storage: self.storage.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Catalog<E> {
    pub fn new(gateway: Arc<dyn RemoteGateway>, storage: Arc<dyn FileStorage>) -> Self {
        Self {
            gateway,
            storage,
            _entity: PhantomData,
        }
    }

    pub async fn list(&self) -> Result<Vec<E>, AppError> {
        let filter = Filter::new().order_by(E::ORDER_BY, Direction::Ascending);
        let rows = self.gateway.select(E::TABLE, &filter).await?;
        Ok(decode_all(rows)?)
    }

    pub async fn get(&self, id: &str) -> Result<E, AppError> {
        let rows = self.gateway.select(E::TABLE, &by_id(id)).await?;
        let row = rows.into_iter().next().ok_or(AppError::NotFound)?;
        Ok(decode(row)?)
    }

    /// Uploads `image` first when given; a failed upload writes nothing.
    pub async fn create(
        &self,
        mut draft: E::Draft,
        image: Option<ImageUpload>,
    ) -> Result<E, AppError> {
        if let Some(image) = image {
            let prefix = E::IMAGE_PREFIX.ok_or_else(|| {
                AppError::BadRequest(format!("{} não aceita imagens.", E::TABLE))
            })?;
            let url = upload_image(self.storage.as_ref(), prefix, &image).await?;
            E::set_image(&mut draft, url.to_string());
        }
        let row = encode(&draft)?;
        let created = self
            .gateway
            .insert(E::TABLE, vec![row])
            .await
            .map_err(AppError::remote_write(E::TABLE))?
            .into_iter()
            .next()
            .ok_or(AppError::NotFound)?;
        let entity: E = decode(created)?;
        info!(table = %E::TABLE, id = entity.id(), "record created");
        Ok(entity)
    }

    /// Partial update; only the columns present in `patch` change.
    pub async fn update(&self, id: &str, patch: &E::Patch) -> Result<E, AppError> {
        let patch = encode(patch)?;
        let updated = self
            .gateway
            .update(E::TABLE, patch, &by_id(id))
            .await
            .map_err(|err| match err {
                GatewayError::NotFound { .. } => AppError::NotFound,
                other => AppError::RemoteWrite {
                    table: E::TABLE,
                    source: other,
                },
            })?;
        info!(table = %E::TABLE, id, "record updated");
        Ok(decode(updated)?)
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.gateway
            .delete(E::TABLE, &by_id(id))
            .await
            .map_err(AppError::remote_write(E::TABLE))?;
        info!(table = %E::TABLE, id, "record deleted");
        Ok(())
    }
}

fn by_id(id: &str) -> Filter {
    Filter::new().eq("id", id)
}
