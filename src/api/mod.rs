use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::{patch, post};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::AppError;
use crate::models::{EntityId, Lecture, Material, Task, Validate};
use crate::services::{SearchHit, WeeklyGrid};
use crate::session::Session;
use crate::state::AppState;
use crate::sync::{Collection, Mutation, MutationOutcome};

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

/// A collection as currently cached; `error` is set when the view is stale.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub error: Option<String>,
    pub loaded: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/session", post(sign_in).delete(sign_out))
        .route("/lectures", get(list::<Lecture>).post(create::<Lecture>))
        .route("/lectures/{id}", patch(update::<Lecture>).delete(remove::<Lecture>))
        .route("/schedule", get(weekly_schedule))
        .route("/tasks", get(list_tasks).post(create::<Task>))
        .route("/tasks/{id}", patch(update::<Task>).delete(remove::<Task>))
        .route("/tasks/{id}/toggle", post(toggle_task))
        .route("/materials", get(list::<Material>).post(create::<Material>))
        .route("/materials/{id}", patch(update::<Material>).delete(remove::<Material>))
        .route("/search", get(search))
        .route("/refresh", post(refresh_all))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let signed_in = state.sessions.is_signed_in().await;
    Json(json!({ "status": "ok", "signed_in": signed_in }))
}

async fn sign_in(
    State(state): State<AppState>,
    Json(session): Json<Session>,
) -> StatusCode {
    state.sessions.sign_in(session).await;
    StatusCode::NO_CONTENT
}

async fn sign_out(State(state): State<AppState>) -> StatusCode {
    state.sessions.sign_out().await;
    StatusCode::NO_CONTENT
}

async fn list<E: Collection>(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<E>>, AppError> {
    let workspace = state.sessions.workspace().await?;
    let view = workspace.cache::<E>().view();
    Ok(Json(ListResponse {
        items: view.snapshot.to_vec(),
        error: view.error,
        loaded: view.loaded,
    }))
}

async fn list_tasks(State(state): State<AppState>) -> Result<Json<ListResponse<Task>>, AppError> {
    let workspace = state.sessions.workspace().await?;
    Ok(Json(ListResponse {
        items: workspace.ordered_tasks(),
        error: workspace.tasks().error(),
        loaded: workspace.tasks().view().loaded,
    }))
}

async fn create<E: Collection>(
    State(state): State<AppState>,
    Json(draft): Json<E::Draft>,
) -> Result<(StatusCode, Json<MutationOutcome>), AppError> {
    draft.validate()?;
    let workspace = state.sessions.workspace().await?;
    let outcome = workspace.cache::<E>().mutate(Mutation::Insert(draft)).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn update<E: Collection>(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
    Json(changes): Json<E::Patch>,
) -> Result<Json<MutationOutcome>, AppError> {
    changes.validate()?;
    let workspace = state.sessions.workspace().await?;
    let outcome = workspace
        .cache::<E>()
        .mutate(Mutation::Update(id, changes))
        .await?;
    Ok(Json(outcome))
}

async fn remove<E: Collection>(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> Result<Json<MutationOutcome>, AppError> {
    let workspace = state.sessions.workspace().await?;
    let outcome = workspace.cache::<E>().mutate(Mutation::Delete(id)).await?;
    Ok(Json(outcome))
}

async fn toggle_task(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> Result<Json<MutationOutcome>, AppError> {
    let workspace = state.sessions.workspace().await?;
    Ok(Json(workspace.toggle_task(id).await?))
}

async fn weekly_schedule(State(state): State<AppState>) -> Result<Json<WeeklyGrid>, AppError> {
    let workspace = state.sessions.workspace().await?;
    Ok(Json(workspace.weekly_grid()))
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchHit>>, AppError> {
    let workspace = state.sessions.workspace().await?;
    Ok(Json(workspace.search(&params.q)))
}

async fn refresh_all(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    let workspace = state.sessions.workspace().await?;
    workspace.refresh_all().await?;
    Ok(StatusCode::NO_CONTENT)
}
