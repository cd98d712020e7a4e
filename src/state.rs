// state.rs
use std::path::PathBuf;

use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Directory uploaded survey images are written to and served from.
    pub images_dir: PathBuf,
}

impl AppState {
    pub fn new(pool: PgPool, images_dir: PathBuf) -> Self {
        Self { pool, images_dir }
    }
}
