//! Routes for the async transaction lifecycle.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing::get, routing::post};
use serde::Deserialize;
use storefront_core::channel::ConnectionHandle;
use storefront_core::transaction::{Transaction, TransactionStatus};
use storefront_pipeline::application::transaction_handlers;
use storefront_pipeline::domain::commands;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginTransactionRequest {
    /// Connection the client waits on.
    pub channel_handle: String,
}

/// Request body for POST /{transaction_id}/complete.
#[derive(Debug, Deserialize)]
pub struct CompleteTransactionRequest {
    /// Terminal status reached.
    pub status: String,
}

/// POST /
#[instrument(skip(state, request))]
async fn begin_transaction(
    State(state): State<AppState>,
    Json(request): Json<BeginTransactionRequest>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let command = commands::BeginTransaction {
        correlation_id: Uuid::new_v4(),
        channel_handle: ConnectionHandle::new(request.channel_handle),
    };

    info!(correlation_id = %command.correlation_id, "handling begin_transaction command");

    let transaction = transaction_handlers::handle_begin_transaction(
        &command,
        state.settings.transaction_ttl,
        state.ports.clock.as_ref(),
        state.ports.transaction_store.as_ref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// POST /{transaction_id}/complete
#[instrument(skip(state, request), fields(status = %request.status))]
async fn complete_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<Uuid>,
    Json(request): Json<CompleteTransactionRequest>,
) -> Result<Json<Transaction>, ApiError> {
    let status: TransactionStatus = request.status.parse()?;
    let command = commands::CompleteTransaction {
        transaction_id,
        status,
    };

    info!("handling complete_transaction command");

    let transaction = transaction_handlers::handle_complete_transaction(
        &command,
        state.ports.transaction_store.as_ref(),
    )
    .await?;

    Ok(Json(transaction))
}

/// GET /{transaction_id}
#[instrument(skip(state))]
async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<Transaction>, ApiError> {
    let transaction =
        transaction_handlers::get_transaction(transaction_id, state.ports.transaction_store.as_ref())
            .await?;
    Ok(Json(transaction))
}

/// Returns the transaction router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(begin_transaction))
        .route("/{transaction_id}", get(get_transaction))
        .route("/{transaction_id}/complete", post(complete_transaction))
}
