// routes.rs
use axum::routing::{get, post};
use axum::Router;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::handlers;
use crate::state::AppState;
use crate::storage;

pub fn create_routes(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_origin(Any);

    let api = Router::new()
        .route("/signup", post(handlers::signup))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/me", get(handlers::me))
        .route("/dashboard", get(handlers::dashboard_overview))
        .route(
            "/surveys",
            get(handlers::list_surveys).post(handlers::create_survey),
        )
        .route(
            "/surveys/get-by-slug/{slug}",
            get(handlers::get_survey_by_slug),
        )
        .route(
            "/surveys/{id}",
            get(handlers::get_survey)
                .put(handlers::update_survey)
                .delete(handlers::delete_survey),
        )
        .route("/surveys/{id}/answer", post(handlers::submit_answer));

    let images_dir = state.images_dir.clone();

    Router::new()
        .nest("/api", api)
        .nest_service(
            &format!("/{}", storage::IMAGES_PREFIX),
            ServeDir::new(images_dir),
        )
        .layer(cors)
        .with_state(state)
}
