//! Route definitions for the REST API.

mod datums;
mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Datum operations
        .route("/datums", post(datums::create_datum))
        .route(
            "/datums/:hash",
            get(datums::get_datum)
                .put(datums::update_datum)
                .delete(datums::delete_datum),
        )
        .route("/datums/:hash/latest", get(datums::get_latest_datum))
        .route("/datums/:hash/details", get(datums::get_datum_details))
        .route("/datums/:hash/revisions", get(datums::get_datum_revisions))
        .route("/datums/:hash/deletes", get(datums::get_datum_deletes))
        .route(
            "/datums/:hash/deletes/oldest",
            get(datums::get_oldest_datum_delete),
        )
        // Attach state
        .with_state(state)
}

pub use datums::*;
pub use health::*;
