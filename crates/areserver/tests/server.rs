//! End-to-end tests: a real server on a random port, real WebSocket clients.

use std::time::Duration;

use areserver::prelude::*;
use futures_util::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct Running {
    addr: String,
    admin: AdminHandle,
    task: JoinHandle<Result<(), ServerError>>,
}

async fn start_server(builder: ServerBuilder) -> Running {
    let server = builder
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr().to_string();
    let admin = server.admin_handle();
    let task = tokio::spawn(server.run());
    Running { addr, admin, task }
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

/// Reads the next binary message and decodes it as server records.
async fn recv(ws: &mut ClientWs) -> Vec<Record> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("message should arrive in time")
            .expect("stream open")
            .expect("valid frame");
        match msg {
            Message::Binary(data) => {
                return BinaryCodec.decode_all(&data).expect("valid records");
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

async fn send(ws: &mut ClientWs, requests: &[ClientRecord]) {
    let data = BinaryCodec.encode(requests).unwrap();
    ws.send(Message::Binary(data.into())).await.unwrap();
}

fn joined_uid(records: &[Record]) -> PlayerId {
    match records {
        [Record::Join { uid }] => *uid,
        other => panic!("expected a lone JOIN, got {other:?}"),
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_first_client_receives_map_batch() {
    let server = start_server(Server::builder()).await;
    let mut a = connect(&server.addr).await;

    let batch = recv(&mut a).await;

    assert_eq!(batch.len(), 1448);
    assert_eq!(batch[0], Record::MultiOn);
    assert_eq!(batch[1447], Record::MultiOff);
    assert!(!batch.iter().any(|r| matches!(r, Record::Join { .. })));
}

#[tokio::test]
async fn test_full_session_join_update_part() {
    let server = start_server(Server::builder()).await;

    let mut a = connect(&server.addr).await;
    recv(&mut a).await;

    let mut b = connect(&server.addr).await;
    let uid_b = joined_uid(&recv(&mut a).await);
    let onboarding = recv(&mut b).await;

    // B was introduced to A, but not to itself.
    let uid_a = match &onboarding[1] {
        Record::Join { uid } => *uid,
        other => panic!("expected JOIN first, got {other:?}"),
    };
    assert_ne!(uid_a, uid_b);
    assert_eq!(
        onboarding[3],
        Record::Life {
            uid: uid_a,
            hp: 100
        }
    );
    assert!(!onboarding.contains(&Record::Join { uid: uid_b }));

    // A moves; both hear about it.
    send(&mut a, &[ClientRecord::Pos { x: 5, y: 5, z: 1 }]).await;
    let expected = vec![Record::Pos {
        uid: uid_a,
        x: 5,
        y: 5,
        z: 1,
    }];
    assert_eq!(recv(&mut a).await, expected);
    assert_eq!(recv(&mut b).await, expected);

    // B leaves; A hears PART.
    b.close(None).await.unwrap();
    assert_eq!(recv(&mut a).await, vec![Record::Part { uid: uid_b }]);

    assert!(server.admin.send(AdminCommand::Quit));
    server.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_malformed_message_keeps_connection_open() {
    let server = start_server(Server::builder()).await;
    let mut a = connect(&server.addr).await;
    recv(&mut a).await;

    a.send(Message::Binary(vec![0xFF, 0x00, 0x13].into()))
        .await
        .unwrap();
    send(&mut a, &[ClientRecord::Chat { text: "still here".into() }]).await;

    match recv(&mut a).await.as_slice() {
        [Record::Chat { text, .. }] => assert_eq!(text, "still here"),
        other => panic!("expected CHAT echo, got {other:?}"),
    }
}

#[tokio::test]
async fn test_admin_regen_resends_map_to_everyone() {
    let server = start_server(Server::builder()).await;
    let mut a = connect(&server.addr).await;
    recv(&mut a).await;

    assert!(server.admin.send(AdminCommand::Regen));

    let batch = recv(&mut a).await;
    assert_eq!(batch.len(), 1448);
    assert_eq!(batch[0], Record::MultiOn);
}

#[tokio::test]
async fn test_connection_over_limit_gets_nothing() {
    let server = start_server(Server::builder().max_connections(1)).await;
    let mut a = connect(&server.addr).await;
    recv(&mut a).await;

    let mut b = connect(&server.addr).await;

    // The refused socket is closed without an onboarding batch.
    let next = tokio::time::timeout(Duration::from_secs(5), b.next())
        .await
        .expect("refused connection should close promptly");
    assert!(matches!(next, None | Some(Ok(Message::Close(_))) | Some(Err(_))));
}

#[tokio::test]
async fn test_quit_stops_server_loop() {
    let server = start_server(Server::builder()).await;
    assert!(server.admin.send(AdminCommand::Quit));

    let result = tokio::time::timeout(Duration::from_secs(5), server.task)
        .await
        .expect("loop should stop")
        .expect("task should not panic");
    assert!(result.is_ok());
}
