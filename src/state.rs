use std::sync::Arc;

use crate::{
    config::AppConfig,
    services::{
        catalog::{Catalog, Entity},
        gateway::RemoteGateway,
        storage::FileStorage,
        trips::TripCoordinator,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub gateway: Arc<dyn RemoteGateway>,
    pub storage: Arc<dyn FileStorage>,
    pub trips: TripCoordinator,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        gateway: Arc<dyn RemoteGateway>,
        storage: Arc<dyn FileStorage>,
    ) -> Self {
        let trips = TripCoordinator::new(gateway.clone(), storage.clone());
        Self {
            config,
            gateway,
            storage,
            trips,
        }
    }

    pub fn catalog<E: Entity>(&self) -> Catalog<E> {
        Catalog::new(self.gateway.clone(), self.storage.clone())
    }
}
