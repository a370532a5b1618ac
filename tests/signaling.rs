use futures_util::{SinkExt, StreamExt};
use livebubbles::{
    AppState,
    rooms::msg::{ClientEvent, PeerSummary, RoomNotice, ServerEvent},
    store::Store,
};
use serde_json::Value;
use tokio::{
    net::TcpStream,
    time::{Duration, timeout},
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_test_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = livebubbles::app(AppState {
        store: Store::shared(),
    });
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("127.0.0.1:{}", addr.port())
}

async fn create_session(base: &str) -> String {
    let response = reqwest::Client::new()
        .post(format!("http://{base}/sessions"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    body["sessionId"].as_str().unwrap().to_owned()
}

async fn open_socket(base: &str) -> Socket {
    let (socket, _) = connect_async(format!("ws://{base}/ws")).await.unwrap();
    socket
}

async fn send(socket: &mut Socket, event: &ClientEvent) {
    let text = serde_json::to_string(event).unwrap();
    socket.send(Message::Text(text.into())).await.unwrap();
}

async fn recv(socket: &mut Socket) -> ServerEvent {
    loop {
        let frame = timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("timed out waiting for a server event")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn assert_silent(socket: &mut Socket) {
    assert!(
        timeout(Duration::from_millis(150), socket.next()).await.is_err(),
        "expected no further events"
    );
}

async fn join(socket: &mut Socket, session_id: &str, username: &str) -> (String, Vec<PeerSummary>) {
    send(
        socket,
        &ClientEvent::JoinSession {
            session_id: session_id.to_owned(),
            username: username.to_owned(),
        },
    )
    .await;
    let user_id = match recv(socket).await {
        ServerEvent::SessionJoined {
            session_id: joined,
            user_id,
            ..
        } => {
            assert_eq!(joined, session_id);
            user_id
        }
        other => panic!("expected session-joined, got {other:?}"),
    };
    match recv(socket).await {
        ServerEvent::ExistingPeers { peer_ids } => (user_id, peer_ids),
        other => panic!("expected existing-peers, got {other:?}"),
    }
}

async fn participants(base: &str, session_id: &str) -> Vec<String> {
    let body: Value = reqwest::get(format!("http://{base}/sessions/{session_id}"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    serde_json::from_value(body["participants"].clone()).unwrap()
}

#[tokio::test]
async fn created_session_code_is_uppercase_alphanumeric() {
    let base = start_test_server().await;
    let session_id = create_session(&base).await;

    assert!((8..=9).contains(&session_id.len()));
    assert!(
        session_id
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
    );

    let body: Value = reqwest::get(format!("http://{base}/sessions/{session_id}"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["id"], session_id.as_str());
    assert_eq!(body["participants"], serde_json::json!([]));
    assert!(body["createdAt"].is_string());
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let base = start_test_server().await;
    let response = reqwest::get(format!("http://{base}/sessions/NOSUCHONE"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn joining_announces_both_ways() {
    let base = start_test_server().await;
    let session_id = create_session(&base).await;
    let mut alice = open_socket(&base).await;
    let mut bob = open_socket(&base).await;

    let (alice_id, peers) = join(&mut alice, &session_id, "alice").await;
    assert!(peers.is_empty());

    let (bob_id, peers) = join(&mut bob, &session_id, "bob").await;
    assert_eq!(
        peers,
        vec![PeerSummary {
            id: alice_id.clone(),
            username: "alice".into()
        }]
    );
    assert_eq!(
        recv(&mut alice).await,
        ServerEvent::Message(RoomNotice::UserJoined {
            username: "bob".into(),
            user_id: bob_id.clone(),
            peer_id: bob_id,
        })
    );
    assert_eq!(participants(&base, &session_id).await, vec!["alice", "bob"]);
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let base = start_test_server().await;
    let session_id = create_session(&base).await;
    let mut alice = open_socket(&base).await;
    let mut imposter = open_socket(&base).await;

    join(&mut alice, &session_id, "alice").await;
    send(
        &mut imposter,
        &ClientEvent::JoinSession {
            session_id: session_id.clone(),
            username: "alice".into(),
        },
    )
    .await;

    assert_eq!(recv(&mut imposter).await, ServerEvent::UsernameTaken);
    assert_silent(&mut alice).await;
    assert_eq!(participants(&base, &session_id).await, vec!["alice"]);
}

#[tokio::test]
async fn joining_a_missing_session_is_rejected() {
    let base = start_test_server().await;
    let mut alice = open_socket(&base).await;
    send(
        &mut alice,
        &ClientEvent::JoinSession {
            session_id: "NOSUCHONE".into(),
            username: "alice".into(),
        },
    )
    .await;
    assert_eq!(recv(&mut alice).await, ServerEvent::SessionNotFound);
}

#[tokio::test]
async fn garbage_frames_get_an_error_and_keep_the_socket() {
    let base = start_test_server().await;
    let session_id = create_session(&base).await;
    let mut alice = open_socket(&base).await;

    alice
        .send(Message::Text("{\"event\":\"dance\"}".into()))
        .await
        .unwrap();
    assert!(matches!(recv(&mut alice).await, ServerEvent::Error { .. }));

    let (_, peers) = join(&mut alice, &session_id, "alice").await;
    assert!(peers.is_empty());
}

#[tokio::test]
async fn leaving_notifies_the_rest_and_frees_the_name() {
    let base = start_test_server().await;
    let session_id = create_session(&base).await;
    let mut alice = open_socket(&base).await;
    let mut bob = open_socket(&base).await;

    join(&mut alice, &session_id, "alice").await;
    let (bob_id, _) = join(&mut bob, &session_id, "bob").await;
    recv(&mut alice).await;

    bob.close(None).await.unwrap();
    assert_eq!(
        recv(&mut alice).await,
        ServerEvent::Message(RoomNotice::UserLeft {
            username: "bob".into(),
            user_id: bob_id,
        })
    );
    assert_eq!(participants(&base, &session_id).await, vec!["alice"]);

    let mut bob_again = open_socket(&base).await;
    let (_, peers) = join(&mut bob_again, &session_id, "bob").await;
    assert_eq!(peers.len(), 1);
}

#[tokio::test]
async fn health_reports_counts() {
    let base = start_test_server().await;
    let session_id = create_session(&base).await;
    let mut alice = open_socket(&base).await;
    join(&mut alice, &session_id, "alice").await;

    let body: Value = reqwest::get(format!("http://{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessions"], 1);
    assert_eq!(body["members"], 1);
}
