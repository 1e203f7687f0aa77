use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::oneshot;

use crate::api::room_access;
use crate::auth::validate_identity_token;
use crate::errors::AppError;
use crate::feed::MessageFeed;
use crate::models::{MessageView, Room};
use crate::AppState;

/// Query params for the WebSocket upgrade. The token travels as a query
/// param since browsers can't set headers on WebSocket requests.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
    pub kind: String,
    pub room_id: String,
}

/// GET /api/v1/ws?token=..&kind=livestreams&room_id=..
/// Live message feed for one room. Every snapshot is sent as a JSON array
/// of messages, oldest first.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    // Authenticate and authorize before upgrading
    let claims = validate_identity_token(&query.token, &state.config)?;
    let room = room_access(&state, &query.kind, &query.room_id, &claims.sub).await?;

    let feed = MessageFeed::open(state.store.clone(), state.authors.clone(), room).await?;
    let uid = claims.sub;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, feed, uid)))
}

async fn handle_socket(socket: WebSocket, mut feed: MessageFeed, uid: String) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let room: Room = feed.room().clone();
    tracing::info!(uid = %uid, room = room.id(), "Feed socket connected");

    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    // Task: forward feed snapshots to the socket
    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                next = feed.changed() => match next {
                    Some(snapshot) => {
                        if send_snapshot(&mut ws_sink, &snapshot).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        feed.close();
        let _ = ws_sink.close().await;
    });

    // Task: drain the client side until it closes
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_stream.next().await {
            match msg {
                Message::Close(_) => break,
                Message::Ping(_) => {} // axum auto-responds with pong
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => {
            let _ = stop_tx.send(());
            let _ = send_task.await;
        }
    }

    tracing::info!(uid = %uid, room = room.id(), "Feed socket disconnected");
}

async fn send_snapshot(
    sink: &mut SplitSink<WebSocket, Message>,
    snapshot: &[MessageView],
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(snapshot) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!("Failed to serialize feed snapshot: {}", e);
            return Ok(());
        }
    };
    sink.send(Message::Text(text)).await
}
