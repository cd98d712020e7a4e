// src/main.rs
mod answers;
mod auth;
mod dashboard;
mod db;
mod error;
mod handlers;
mod models;
mod questions;
mod routes;
mod state;
mod storage;
mod surveys;

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[tokio::main]
async fn main() {
    dotenv().ok(); // Load environment variables from .env file

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Get the port from the environment (default to 3030 for local development)
    let port = env::var("PORT").unwrap_or_else(|_| "3030".to_string());
    let port = port.parse::<u16>().expect("PORT must be a valid number");

    let images_dir =
        PathBuf::from(env::var("IMAGES_DIR").unwrap_or_else(|_| "images".to_string()));

    let pool = db::create_pool()
        .await
        .expect("Failed to connect to the database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    let app = routes::create_routes(AppState::new(pool, images_dir));

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {addr}");
    axum_server::bind(addr)
        .serve(app.into_make_service())
        .await
        .expect("Server failed");
}
