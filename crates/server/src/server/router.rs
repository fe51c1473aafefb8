use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde_json::json;
use tracing::{error, info};

use crate::error::RequestError;
use crate::models::image::ListImagesResponse;
use crate::models::listing::{Listing, ListingQuery};
use crate::models::message::StreamedMessage;
use crate::models::query::{MessageQuery, MessagesQuery};
use crate::server::state::AppState;
use crate::store::paginate::collect_messages;
use crate::store::{MessageStream, PageToken};

/// Set on message listings cut short after the first page.
pub const TRUNCATED_HEADER: &str = "x-results-truncated";

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/messages", get(list_messages))
        .route("/api/messages/stream", get(stream_messages))
        .route("/api/images", get(list_images))
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>, addr: &str) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("starting server on: {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

pub async fn health() -> impl IntoResponse {
    "ok"
}

pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MessagesQuery>,
) -> Result<Response, RequestError> {
    let query = MessageQuery::from_params(params);
    let collected = collect_messages(state.messages.as_ref(), &query, state.pagination).await?;
    let body = Json(collected.messages);
    if collected.truncated {
        Ok(([(TRUNCATED_HEADER, "true")], body).into_response())
    } else {
        Ok(body.into_response())
    }
}

pub async fn stream_messages(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MessagesQuery>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let query = MessageQuery::from_params(params);
    Sse::new(message_events(state.messages.stream(query))).keep_alive(KeepAlive::default())
}

/// One event per message, then either `complete` or a single `error` event.
fn message_events(messages: MessageStream) -> impl Stream<Item = Result<Event, axum::Error>> {
    futures::stream::unfold(Some(messages), |messages| async move {
        let mut messages = messages?;
        let event = match messages.next().await {
            Some(Ok(message)) => {
                return Some((
                    Event::default().json_data(StreamedMessage::from(&message)),
                    Some(messages),
                ))
            }
            Some(Err(e)) => {
                error!("message stream failed: {e}");
                Event::default()
                    .event("error")
                    .json_data(json!({ "error": e.to_string() }))
            }
            None => Event::default()
                .event("complete")
                .json_data(json!({ "message": "Processing complete" })),
        };
        Some((event, None))
    })
}

pub async fn list_images(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<ListImagesResponse>, RequestError> {
    let listing = Listing::from_query(query)?;
    let page = state
        .images
        .list(listing.limit as usize, listing.next_token.map(PageToken::new))
        .await?;
    Ok(Json(page.into()))
}
