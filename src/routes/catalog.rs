use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::{
    error::AppError,
    routes::read_draft,
    services::catalog::Entity,
    state::AppState,
};

/// List/create/update/delete for one catalog table.
pub fn router<E: Entity>() -> Router<AppState> {
    Router::new()
        .route("/", get(list::<E>).post(create::<E>))
        .route("/:id", get(show::<E>).put(update::<E>).delete(remove::<E>))
}

async fn list<E: Entity>(State(state): State<AppState>) -> Result<Json<Vec<E>>, AppError> {
    Ok(Json(state.catalog::<E>().list().await?))
}

async fn show<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<E>, AppError> {
    Ok(Json(state.catalog::<E>().get(&id).await?))
}

async fn create<E: Entity>(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<E>), AppError> {
    let (draft, image) = read_draft::<E::Draft>(multipart).await?;
    let created = state.catalog::<E>().create(draft, image).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<E::Patch>,
) -> Result<Json<E>, AppError> {
    Ok(Json(state.catalog::<E>().update(&id, &patch).await?))
}

async fn remove<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.catalog::<E>().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
