//! Datum record endpoints.
//!
//! Path hashes are action hashes. Writes are authored by the server's agent.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::AppState;
use datum_core::types::{Action, ActionHash, Datum, Record, RecordDetails};

/// Request body for updating a datum.
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateDatumRequest {
    /// Action being revised: the root or any update of the same chain.
    pub previous_datum_hash: ActionHash,
    pub updated_datum: Datum,
}

/// Response for deleting a datum.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteDatumResponse {
    pub action_hash: ActionHash,
}

/// Create a datum.
/// POST /datums
pub async fn create_datum(
    State(state): State<AppState>,
    Json(datum): Json<Datum>,
) -> ApiResult<(StatusCode, Json<Record>)> {
    let record = state
        .with_store(move |store, agent| store.create(agent, datum))
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Get the record stored at a hash.
/// GET /datums/:hash
pub async fn get_datum(
    State(state): State<AppState>,
    Path(hash): Path<ActionHash>,
) -> ApiResult<Json<Record>> {
    let record = state
        .with_store(move |store, _| store.get_original(&hash))
        .await?;
    Ok(Json(record))
}

/// Get the head of the chain containing a hash.
/// GET /datums/:hash/latest
pub async fn get_latest_datum(
    State(state): State<AppState>,
    Path(hash): Path<ActionHash>,
) -> ApiResult<Json<Record>> {
    let record = state
        .with_store(move |store, _| store.get_latest(&hash))
        .await?;
    Ok(Json(record))
}

/// Get a record with its direct updates and deletes.
/// GET /datums/:hash/details
pub async fn get_datum_details(
    State(state): State<AppState>,
    Path(hash): Path<ActionHash>,
) -> ApiResult<Json<RecordDetails>> {
    let details = state
        .with_store(move |store, _| store.get_details(&hash))
        .await?;
    Ok(Json(details))
}

/// Update a datum. The path hash is the chain root.
/// PUT /datums/:hash
pub async fn update_datum(
    State(state): State<AppState>,
    Path(original): Path<ActionHash>,
    Json(request): Json<UpdateDatumRequest>,
) -> ApiResult<Json<Record>> {
    let record = state
        .with_store(move |store, agent| {
            store.update(
                agent,
                &original,
                &request.previous_datum_hash,
                request.updated_datum,
            )
        })
        .await?;
    Ok(Json(record))
}

/// Get every revision of a chain.
/// GET /datums/:hash/revisions
pub async fn get_datum_revisions(
    State(state): State<AppState>,
    Path(original): Path<ActionHash>,
) -> ApiResult<Json<Vec<Record>>> {
    let revisions = state
        .with_store(move |store, _| store.get_all_revisions(&original))
        .await?;
    Ok(Json(revisions))
}

/// Mark a record deleted.
/// DELETE /datums/:hash
pub async fn delete_datum(
    State(state): State<AppState>,
    Path(hash): Path<ActionHash>,
) -> ApiResult<Json<DeleteDatumResponse>> {
    let action_hash = state
        .with_store(move |store, agent| store.delete(agent, &hash))
        .await?;
    Ok(Json(DeleteDatumResponse { action_hash }))
}

/// Get every delete marker for a record.
/// GET /datums/:hash/deletes
pub async fn get_datum_deletes(
    State(state): State<AppState>,
    Path(hash): Path<ActionHash>,
) -> ApiResult<Json<Vec<Action>>> {
    let deletes = state
        .with_store(move |store, _| store.get_all_deletes(&hash))
        .await?;
    Ok(Json(deletes))
}

/// Get the earliest delete marker for a record.
/// GET /datums/:hash/deletes/oldest
pub async fn get_oldest_datum_delete(
    State(state): State<AppState>,
    Path(hash): Path<ActionHash>,
) -> ApiResult<Json<Action>> {
    let delete = state
        .with_store(move |store, _| store.get_oldest_delete(&hash))
        .await?;
    Ok(Json(delete))
}
