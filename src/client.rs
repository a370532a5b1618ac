use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use futures_util::{SinkExt, StreamExt};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::rooms::msg::{ClientEvent, RoomNotice, ServerEvent};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run_join_client(url: &str, session: &str, username: &str) -> Result<()> {
    debug!(url, session, "connecting to signaling server");
    let (ws_stream, _) = timeout(CONNECT_TIMEOUT, connect_async(url))
        .await
        .map_err(|_| anyhow!("connection to {url} timed out, is the server running?"))?
        .with_context(|| format!("failed to connect to {url}"))?;
    let (mut write, mut read) = ws_stream.split();

    let join = serde_json::to_string(&ClientEvent::JoinSession {
        session_id: session.to_owned(),
        username: username.to_owned(),
    })?;
    write.send(Message::Text(join.into())).await?;

    loop {
        let frame = tokio::select! {
            frame = read.next() => frame,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, leaving session");
                let _ = write.send(Message::Close(None)).await;
                return Ok(());
            }
        };
        let Some(frame) = frame else {
            info!("signaling server closed the connection");
            return Ok(());
        };
        let text = match frame.context("signaling socket failed")? {
            Message::Text(text) => text,
            Message::Close(_) => {
                info!("signaling server closed the connection");
                return Ok(());
            }
            _ => continue,
        };
        let event: ServerEvent = match serde_json::from_str(text.as_str()) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, frame = %text.as_str(), "unreadable server frame");
                continue;
            }
        };
        match event {
            ServerEvent::SessionJoined {
                session_id,
                user_id,
                participants,
            } => info!(%session_id, %user_id, ?participants, "joined session"),
            ServerEvent::ExistingPeers { peer_ids } => {
                for peer in peer_ids {
                    info!(peer_id = %peer.id, username = %peer.username, "existing peer");
                }
            }
            ServerEvent::Message(RoomNotice::UserJoined {
                username, peer_id, ..
            }) => info!(%peer_id, %username, "user joined"),
            ServerEvent::Message(RoomNotice::UserLeft { username, user_id }) => {
                info!(%user_id, %username, "user left")
            }
            ServerEvent::UsernameTaken => bail!("username {username} is already taken"),
            ServerEvent::SessionNotFound => bail!("session {session} does not exist"),
            ServerEvent::Error { message } => warn!(%message, "server reported an error"),
        }
    }
}
