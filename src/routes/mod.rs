pub mod catalog;
pub mod trips;

use axum::{extract::Multipart, Router};
use serde::de::DeserializeOwned;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    error::AppError,
    models::{attraction::Attraction, city::City, guide::Guide, participant::Participant},
    services::storage::ImageUpload,
    state::AppState,
};

pub fn create_router(state: AppState) -> Router {
    let storage_root = state.config.storage_root.clone();
    Router::new()
        .nest("/trips", trips::router())
        .nest("/cities", catalog::router::<City>())
        .nest("/attractions", catalog::router::<Attraction>())
        .nest("/guides", catalog::router::<Guide>())
        .nest("/participants", catalog::router::<Participant>().merge(trips::participant_router()))
        .nest_service("/storage", ServeDir::new(storage_root))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

const DRAFT_FIELD: &str = "draft";

/// Reads a multipart form made of a JSON `draft` part and at most one file
/// part. The file part is optional.
pub(crate) async fn read_draft<T: DeserializeOwned>(
    mut multipart: Multipart,
) -> Result<(T, Option<ImageUpload>), AppError> {
    let mut draft = None;
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(err.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        if name == DRAFT_FIELD {
            let raw = field
                .text()
                .await
                .map_err(|err| AppError::BadRequest(err.body_text()))?;
            let parsed = serde_json::from_str(&raw)
                .map_err(|err| AppError::BadRequest(format!("Formulário inválido: {err}")))?;
            draft = Some(parsed);
        } else if let Some(file_name) = file_name {
            let content = field
                .bytes()
                .await
                .map_err(|err| AppError::BadRequest(err.body_text()))?;
            if !content.is_empty() {
                image = Some(ImageUpload::new(file_name, content.to_vec()));
            }
        }
    }

    let draft = draft.ok_or_else(|| AppError::BadRequest("Formulário vazio.".into()))?;
    Ok((draft, image))
}
