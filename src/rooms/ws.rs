use axum::{
    debug_handler,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::store::SharedStore;

use super::{
    msg::{ClientEvent, ServerEvent},
    signaling,
};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn signaling_ws(
    State(store): State<SharedStore>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, store))
}

async fn handle_socket(socket: WebSocket, store: SharedStore) {
    let connection = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    store.lock().peers.register(connection, tx);
    debug!(%connection, "signaling socket opened");

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    warn!(%connection, error = %err, "failed to encode server event");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        match serde_json::from_str::<ClientEvent>(text.as_str()) {
            Ok(ClientEvent::JoinSession {
                session_id,
                username,
            }) => {
                let mut store = store.lock();
                signaling::join(&mut store, connection, &session_id, &username);
            }
            Err(err) => {
                debug!(%connection, error = %err, "unreadable signaling frame");
                signaling::invalid_frame(&store.lock(), connection, &err.to_string());
            }
        }
    }

    signaling::disconnect(&mut store.lock(), connection);
    debug!(%connection, "signaling socket closed");

    tokio::select! {
        _ = &mut send_task => {}
        _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => send_task.abort(),
    }
}
