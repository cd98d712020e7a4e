// handlers.rs
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use crate::answers;
use crate::auth::{self, CurrentUser};
use crate::dashboard;
use crate::error::ApiError;
use crate::models::{
    AnswerSubmission, ListParams, LoginRequest, SignupRequest, SurveyPayload, UserResource,
};
use crate::state::AppState;
use crate::surveys;

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = auth::signup(&state.pool, req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(auth::login(&state.pool, req).await?))
}

pub async fn logout(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    auth::logout(&state.pool, &user.token_hash).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(user: CurrentUser) -> Json<UserResource> {
    Json(user.user.into())
}

/// List the requester's surveys, newest first.
pub async fn list_surveys(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = params.page.unwrap_or(1);
    Ok(Json(
        surveys::list_owned(&state.pool, user.user.id, page).await?,
    ))
}

pub async fn create_survey(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<SurveyPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let resource = surveys::create(&state.pool, &state.images_dir, user.user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(resource)))
}

pub async fn get_survey(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(surveys::read(&state.pool, id, user.user.id).await?))
}

pub async fn update_survey(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SurveyPayload>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(
        surveys::update(&state.pool, &state.images_dir, id, user.user.id, payload).await?,
    ))
}

pub async fn delete_survey(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    surveys::delete(&state.pool, &state.images_dir, id, user.user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Public survey fetch by slug; drafts and expired surveys 404 like
/// missing ones.
pub async fn get_survey_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(surveys::get_public(&state.pool, &slug).await?))
}

/// Anonymous answer submission for one survey.
pub async fn submit_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(submission): Json<AnswerSubmission>,
) -> Result<impl IntoResponse, ApiError> {
    let answer = answers::store_answer(&state.pool, id, &submission).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": answer.id }))))
}

pub async fn dashboard_overview(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(dashboard::overview(&state.pool, user.user.id).await?))
}
