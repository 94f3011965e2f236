use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{
    models::relation::{RelationKind, RelationStage},
    services::gateway::{GatewayError, Table},
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("write to {table} rejected: {source}")]
    RemoteWrite { table: Table, source: GatewayError },
    #[error("trip row could not be written: {0}")]
    TripWrite(#[source] GatewayError),
    #[error("image upload failed: {0}")]
    Upload(String),
    #[error("trip {trip_id}: {stage} of {relation} links failed: {source}")]
    PartialRelation {
        trip_id: String,
        relation: RelationKind,
        stage: RelationStage,
        source: GatewayError,
    },
    #[error("deleting trip {trip_id} stopped at {table}: {source}")]
    TripDelete {
        trip_id: String,
        table: Table,
        source: GatewayError,
    },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
    #[error("not found")]
    NotFound,
}

impl AppError {
    pub fn remote_write(table: Table) -> impl FnOnce(GatewayError) -> Self {
        move |source| AppError::RemoteWrite { table, source }
    }

    /// Message shown to the person at the keyboard. Every failure ends up
    /// here; nothing is retried.
    pub fn notification(&self) -> String {
        match self {
            AppError::RemoteWrite {
                source: GatewayError::Constraint { .. },
                ..
            } => "Registro duplicado ou inválido, nada foi alterado.".into(),
            AppError::RemoteWrite { .. } => "Erro ao salvar alterações.".into(),
            AppError::TripWrite(GatewayError::NotFound { .. }) => "Viagem não encontrada.".into(),
            AppError::TripWrite(_) => "Erro ao salvar viagem.".into(),
            AppError::Upload(_) => "Erro ao enviar imagem, a viagem não foi salva.".into(),
            AppError::PartialRelation { relation, .. } => format!(
                "A viagem foi salva, mas os vínculos de {} ficaram incompletos. Edite a viagem novamente.",
                relation.label()
            ),
            AppError::TripDelete { .. } => {
                "Erro ao excluir viagem, a exclusão ficou incompleta. Tente novamente.".into()
            }
            AppError::BadRequest(message) => message.clone(),
            AppError::NotFound => "Registro não encontrado.".into(),
            AppError::Config(_)
            | AppError::Io(_)
            | AppError::Database(_)
            | AppError::Gateway(_)
            | AppError::Other(_) => "Erro interno, tente novamente.".into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Upload(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound | AppError::TripWrite(GatewayError::NotFound { .. }) => {
                StatusCode::NOT_FOUND
            }
            AppError::RemoteWrite {
                source: GatewayError::Constraint { .. },
                ..
            } => StatusCode::CONFLICT,
            AppError::Config(_)
            | AppError::Io(_)
            | AppError::Database(_)
            | AppError::Gateway(_)
            | AppError::RemoteWrite { .. }
            | AppError::TripWrite(_)
            | AppError::PartialRelation { .. }
            | AppError::TripDelete { .. }
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {self}");
        }
        (status, Json(json!({ "error": self.notification() }))).into_response()
    }
}
