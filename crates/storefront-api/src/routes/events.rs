//! Read API over the event history.

use axum::extract::{Path, Query, State};
use axum::{Json, Router, routing::get};
use serde::Deserialize;
use storefront_core::event::EventType;
use storefront_pipeline::application::query_handlers::{self, EventView};
use tracing::instrument;

use crate::error::ApiError;
use crate::state::AppState;

/// Query string for GET /{subject_key}.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    /// Restricts the result to one event type.
    pub event_type: Option<String>,
}

/// GET /{subject_key}
#[instrument(skip(state))]
async fn get_events(
    State(state): State<AppState>,
    Path(subject_key): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<EventView>>, ApiError> {
    let clock = state.ports.clock.as_ref();
    let store = state.ports.event_store.as_ref();
    let views = match query.event_type.as_deref() {
        Some(raw) => {
            let event_type: EventType = raw.parse()?;
            query_handlers::get_events_by_subject_and_type(&subject_key, event_type, clock, store)
                .await?
        }
        None => query_handlers::get_events_by_subject(&subject_key, clock, store).await?,
    };
    Ok(Json(views))
}

/// Returns the event-history router.
pub fn router() -> Router<AppState> {
    Router::new().route("/{subject_key}", get(get_events))
}
