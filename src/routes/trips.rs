use std::collections::BTreeSet;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_with::{serde_as, NoneAsEmptyString};

use crate::{
    error::AppError,
    models::{
        relation::{ItineraryStop, RelationKind},
        trip::{TripDraft, TripOverview},
    },
    routes::read_draft,
    services::storage::ImageUpload,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(show).put(update).delete(remove))
        .route(
            "/:id/participants/:participant_id",
            post(add_participant).delete(remove_participant),
        )
        .route("/:id/cities/:city_id", post(add_city).delete(remove_city))
        .route("/:id/itinerary", get(itinerary))
        .route(
            "/:id/itinerary/:attraction_id",
            post(append_stop).delete(remove_stop),
        )
}

/// Routes mounted under `/participants`.
pub fn participant_router() -> Router<AppState> {
    Router::new().route("/:id/trips", get(participant_trips))
}

#[serde_as]
#[derive(Deserialize)]
struct TripForm {
    data_inicio: NaiveDate,
    data_fim: NaiveDate,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    guia_turistico_id: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    imagem: Option<String>,
    #[serde(default)]
    participantes: Vec<String>,
    #[serde(default)]
    cidades: Vec<String>,
}

impl TripForm {
    fn into_draft(self, id: Option<String>, image: Option<ImageUpload>) -> TripDraft {
        let mut draft = TripDraft::new(self.data_inicio, self.data_fim)
            .with_participants(self.participantes)
            .with_cities(self.cidades);
        draft.id = id;
        draft.guide_id = self.guia_turistico_id;
        draft.image_url = self.imagem;
        draft.image_upload = image;
        draft
    }
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<TripOverview>>, AppError> {
    let trips = state.trips.list().await?;
    Ok(Json(
        trips
            .into_iter()
            .map(|trip| state.trips.overview(trip))
            .collect(),
    ))
}

async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TripOverview>, AppError> {
    let trip = state.trips.get(&id).await?;
    Ok(Json(state.trips.overview(trip)))
}

async fn create(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<TripOverview>), AppError> {
    let (form, image) = read_draft::<TripForm>(multipart).await?;
    let trip = state
        .trips
        .create_or_update(&form.into_draft(None, image))
        .await?;
    Ok((StatusCode::CREATED, Json(state.trips.overview(trip))))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<TripOverview>, AppError> {
    let (form, image) = read_draft::<TripForm>(multipart).await?;
    let trip = state
        .trips
        .create_or_update(&form.into_draft(Some(id), image))
        .await?;
    Ok(Json(state.trips.overview(trip)))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.trips.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn link(
    state: &AppState,
    kind: RelationKind,
    trip_id: &str,
    foreign_id: &str,
) -> Result<Json<BTreeSet<String>>, AppError> {
    let store = state.trips.relations(kind);
    store.add(trip_id, foreign_id).await?;
    Ok(Json(store.links_for(trip_id)))
}

async fn unlink(
    state: &AppState,
    kind: RelationKind,
    trip_id: &str,
    foreign_id: &str,
) -> Result<Json<BTreeSet<String>>, AppError> {
    let store = state.trips.relations(kind);
    store.remove(trip_id, foreign_id).await?;
    Ok(Json(store.links_for(trip_id)))
}

async fn add_participant(
    State(state): State<AppState>,
    Path((trip_id, participant_id)): Path<(String, String)>,
) -> Result<Json<BTreeSet<String>>, AppError> {
    link(&state, RelationKind::Participants, &trip_id, &participant_id).await
}

async fn remove_participant(
    State(state): State<AppState>,
    Path((trip_id, participant_id)): Path<(String, String)>,
) -> Result<Json<BTreeSet<String>>, AppError> {
    unlink(&state, RelationKind::Participants, &trip_id, &participant_id).await
}

async fn add_city(
    State(state): State<AppState>,
    Path((trip_id, city_id)): Path<(String, String)>,
) -> Result<Json<BTreeSet<String>>, AppError> {
    link(&state, RelationKind::Cities, &trip_id, &city_id).await
}

async fn remove_city(
    State(state): State<AppState>,
    Path((trip_id, city_id)): Path<(String, String)>,
) -> Result<Json<BTreeSet<String>>, AppError> {
    unlink(&state, RelationKind::Cities, &trip_id, &city_id).await
}

async fn itinerary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<Vec<ItineraryStop>> {
    Json(state.trips.itinerary().stops_for(&id))
}

async fn append_stop(
    State(state): State<AppState>,
    Path((trip_id, attraction_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<ItineraryStop>), AppError> {
    let stop = state
        .trips
        .itinerary()
        .append(&trip_id, &attraction_id)
        .await?;
    Ok((StatusCode::CREATED, Json(stop)))
}

async fn remove_stop(
    State(state): State<AppState>,
    Path((trip_id, attraction_id)): Path<(String, String)>,
) -> Result<Json<Vec<ItineraryStop>>, AppError> {
    let itinerary = state.trips.itinerary();
    itinerary.remove(&trip_id, &attraction_id).await?;
    Ok(Json(itinerary.stops_for(&trip_id)))
}

async fn participant_trips(
    State(state): State<AppState>,
    Path(participant_id): Path<String>,
) -> Json<BTreeSet<String>> {
    Json(state.trips.participants().trips_for(&participant_id))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::Body, http::Request};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;
    use url::Url;

    use crate::{
        config::AppConfig,
        routes::create_router,
        services::{gateway::MemoryGateway, storage::LocalStorage},
        state::AppState,
    };

    const BOUNDARY: &str = "roteiro-boundary";

    fn app(root: &TempDir) -> axum::Router {
        let base = Url::parse("http://localhost:3000/").expect("url");
        let config = AppConfig {
            database_url: "memory".into(),
            listen_addr: ([127, 0, 0, 1], 0).into(),
            storage_root: root.path().to_path_buf(),
            public_base_url: base.clone(),
        };
        let storage = LocalStorage::new(root.path().to_path_buf(), base);
        create_router(AppState::new(
            config,
            Arc::new(MemoryGateway::new()),
            Arc::new(storage),
        ))
    }

    fn multipart(draft: &Value) -> Body {
        Body::from(format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"draft\"\r\n\r\n{draft}\r\n--{BOUNDARY}--\r\n"
        ))
    }

    async fn send(app: &axum::Router, request: Request<Body>) -> (u16, Value) {
        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status().as_u16();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, body)
    }

    fn form_request(method: &str, uri: &str, draft: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart(draft))
            .expect("request")
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    #[tokio::test]
    async fn create_edit_and_delete_a_trip_over_http() {
        let root = TempDir::new().expect("tempdir");
        let app = app(&root);

        let (status, created) = send(
            &app,
            form_request(
                "POST",
                "/trips",
                &json!({
                    "data_inicio": "2024-01-15",
                    "data_fim": "2024-01-22",
                    "guia_turistico_id": "",
                    "participantes": ["p1", "p2"],
                    "cidades": ["c1"],
                }),
            ),
        )
        .await;
        assert_eq!(status, 201);
        assert_eq!(created["participantes"], json!(["p1", "p2"]));
        assert_eq!(created["guia_turistico_id"], Value::Null);
        let id = created["id"].as_str().expect("trip id").to_string();

        let (status, updated) = send(
            &app,
            form_request(
                "PUT",
                &format!("/trips/{id}"),
                &json!({
                    "data_inicio": "2024-01-15",
                    "data_fim": "2024-01-22",
                    "participantes": ["p1"],
                    "cidades": ["c1"],
                }),
            ),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(updated["participantes"], json!(["p1"]));

        let (status, trips) = send(&app, empty_request("GET", "/participants/p2/trips")).await;
        assert_eq!(status, 200);
        assert_eq!(trips, json!([]));

        let (status, _) = send(&app, empty_request("DELETE", &format!("/trips/{id}"))).await;
        assert_eq!(status, 204);
        let (status, body) = send(&app, empty_request("GET", &format!("/trips/{id}"))).await;
        assert_eq!(status, 404);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn itinerary_endpoints_append_and_remove() {
        let root = TempDir::new().expect("tempdir");
        let app = app(&root);

        let (status, first) = send(&app, empty_request("POST", "/trips/t1/itinerary/a1")).await;
        assert_eq!(status, 201);
        assert_eq!(first["ordem"], json!(1));
        send(&app, empty_request("POST", "/trips/t1/itinerary/a2")).await;

        let (status, remaining) =
            send(&app, empty_request("DELETE", "/trips/t1/itinerary/a1")).await;
        assert_eq!(status, 200);
        assert_eq!(
            remaining,
            json!([{ "viagem_id": "t1", "ponto_turistico_id": "a2", "ordem": 2 }])
        );
    }

    #[tokio::test]
    async fn duplicate_link_is_a_conflict() {
        let root = TempDir::new().expect("tempdir");
        let app = app(&root);

        let (status, links) = send(&app, empty_request("POST", "/trips/t1/cities/c1")).await;
        assert_eq!(status, 200);
        assert_eq!(links, json!(["c1"]));

        let (status, body) = send(&app, empty_request("POST", "/trips/t1/cities/c1")).await;
        assert_eq!(status, 409);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn dates_are_not_checked_against_each_other() {
        let root = TempDir::new().expect("tempdir");
        let app = app(&root);

        let (status, created) = send(
            &app,
            form_request(
                "POST",
                "/trips",
                &json!({ "data_inicio": "2024-02-01", "data_fim": "2024-01-01" }),
            ),
        )
        .await;
        assert_eq!(status, 201);
        assert_eq!(created["data_fim"], json!("2024-01-01"));

        let (_, trips) = send(&app, empty_request("GET", "/trips")).await;
        assert_eq!(trips.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn catalog_create_accepts_json_draft() {
        let root = TempDir::new().expect("tempdir");
        let app = app(&root);

        let (status, city) = send(
            &app,
            form_request("POST", "/cities", &json!({ "nome": "Bonito", "estado": "MS" })),
        )
        .await;
        assert_eq!(status, 201);
        assert_eq!(city["nome"], json!("Bonito"));

        let (status, cities) = send(&app, empty_request("GET", "/cities")).await;
        assert_eq!(status, 200);
        assert_eq!(cities.as_array().map(Vec::len), Some(1));
    }

    fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn catalog_update_refuses_mistyped_and_generated_fields() {
        let root = TempDir::new().expect("tempdir");
        let app = app(&root);

        let (_, city) = send(
            &app,
            form_request("POST", "/cities", &json!({ "nome": "A", "estado": "SP" })),
        )
        .await;
        let uri = format!("/cities/{}", city["id"].as_str().expect("city id"));

        let response = app
            .clone()
            .oneshot(json_request("PUT", &uri, &json!({ "nome": 5 })))
            .await
            .expect("response");
        assert!(response.status().is_client_error());

        let response = app
            .clone()
            .oneshot(json_request("PUT", &uri, &json!({ "criado_em": "2020-01-01T00:00:00Z" })))
            .await
            .expect("response");
        assert!(response.status().is_client_error());

        let (status, updated) =
            send(&app, json_request("PUT", &uri, &json!({ "estado": "RJ" }))).await;
        assert_eq!(status, 200);
        assert_eq!(updated["nome"], json!("A"));
        assert_eq!(updated["estado"], json!("RJ"));

        let (status, cities) = send(&app, empty_request("GET", "/cities")).await;
        assert_eq!(status, 200);
        assert_eq!(cities[0]["nome"], json!("A"));
    }
}
