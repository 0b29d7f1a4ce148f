//! End-to-end tests against an in-process Bayeux websocket server.

use std::time::Duration;

use attendance_core::{AttendanceClient, ClientConfig, ClientError, Phase};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, ORIGIN, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(5);

/// What the mock server saw
#[derive(Debug)]
enum Seen {
    Origin(Option<String>),
    Envelope(Value),
}

/// Boot a one-connection server and return its URL plus the observation channel.
///
/// With `drop_after_handshake`, the server closes the socket right after
/// answering the handshake.
async fn boot_server(drop_after_handshake: bool) -> (String, mpsc::UnboundedReceiver<Seen>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let origin_tx = seen_tx.clone();
        let callback = move |req: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
            let origin = req
                .headers()
                .get(ORIGIN)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let _ = origin_tx.send(Seen::Origin(origin));
            resp.headers_mut()
                .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static("bayeux"));
            Ok(resp)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();

        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else { continue };
            let batch: Vec<Value> = serde_json::from_str(text.as_str()).unwrap();
            for env in batch {
                let _ = seen_tx.send(Seen::Envelope(env.clone()));
                let replies = match env["channel"].as_str().unwrap_or_default() {
                    "/meta/handshake" => vec![json!([{
                        "channel": "/meta/handshake",
                        "successful": true,
                        "clientId": "abc123",
                        "id": env["id"]
                    }])],
                    "/meta/connect" => vec![json!([{
                        "channel": "/meta/connect",
                        "successful": true,
                        "advice": {"timeout": 60000.0, "reconnect": "retry", "interval": 0},
                        "id": env["id"]
                    }])],
                    "/meta/subscribe" => vec![
                        json!([{
                            "channel": "/meta/subscribe",
                            "successful": true,
                            "subscription": env["subscription"],
                            "id": env["id"]
                        }]),
                        json!([{
                            "channel": env["subscription"],
                            "data": {"type": 1, "qrUrl": "https://x/y"}
                        }]),
                        json!([{
                            "channel": env["subscription"],
                            "data": {
                                "type": 3,
                                "student": {"name": "A", "studentNumber": "007", "rank": 3.0, "id": 99.0}
                            }
                        }]),
                    ],
                    _ => vec![],
                };
                for reply in replies {
                    ws.send(Message::Text(reply.to_string().into())).await.unwrap();
                }
                if drop_after_handshake && env["channel"] == "/meta/handshake" {
                    let _ = ws.close(None).await;
                    return;
                }
            }
        }
    });

    (format!("ws://{}/faye", addr), seen_rx)
}

async fn next_envelope(rx: &mut mpsc::UnboundedReceiver<Seen>) -> Value {
    loop {
        match timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap() {
            Seen::Envelope(env) => return env,
            Seen::Origin(_) => continue,
        }
    }
}

#[tokio::test]
async fn test_full_session_over_websocket() {
    let (url, mut seen) = boot_server(false).await;
    let client = AttendanceClient::new(ClientConfig::default().with_endpoint(url)).unwrap();
    let mut codes = client.subscribe_code_refresh();
    let mut results = client.subscribe_results();

    client.attach(7, 42).await;
    client.open().await.unwrap();
    // Second open is a no-op
    client.open().await.unwrap();

    match timeout(TIMEOUT, seen.recv()).await.unwrap().unwrap() {
        Seen::Origin(origin) => assert_eq!(origin.as_deref(), Some("https://www.teachermate.com.cn")),
        other => panic!("expected origin first, got {:?}", other),
    }

    let handshake = next_envelope(&mut seen).await;
    assert_eq!(handshake["channel"], "/meta/handshake");
    assert_eq!(handshake["id"], "1");

    let connect = next_envelope(&mut seen).await;
    assert_eq!(connect["channel"], "/meta/connect");
    assert_eq!(connect["clientId"], "abc123");
    assert_eq!(connect["connectionType"], "websocket");
    assert_eq!(connect["id"], "2");

    let subscribe = next_envelope(&mut seen).await;
    assert_eq!(subscribe["channel"], "/meta/subscribe");
    assert_eq!(subscribe["subscription"], "/attendance/7/42/qr");
    assert_eq!(subscribe["id"], "3");

    let code = timeout(TIMEOUT, codes.recv()).await.unwrap().unwrap();
    assert_eq!(code.url, "https://x/y");

    let result = timeout(TIMEOUT, results.recv()).await.unwrap().unwrap();
    assert_eq!(result.id, 99);
    assert_eq!(result.name, "A");
    assert_eq!(result.external_number, "007");
    assert_eq!(result.rank, 3);

    assert!(client.is_connected().await);
    assert_eq!(client.client_id().await.as_deref(), Some("abc123"));

    client.close().await;
    assert!(!client.is_connected().await);
}

#[tokio::test]
async fn test_server_close_terminates_reader() {
    let (url, mut seen) = boot_server(true).await;
    let client = AttendanceClient::new(ClientConfig::default().with_endpoint(url)).unwrap();
    client.open().await.unwrap();

    let handshake = next_envelope(&mut seen).await;
    assert_eq!(handshake["channel"], "/meta/handshake");

    let disconnected = timeout(TIMEOUT, async {
        loop {
            if client.phase().await == Phase::Disconnected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(disconnected.is_ok());
    assert_eq!(client.client_id().await, None);

    client.close().await;
}

#[tokio::test]
async fn test_open_fails_without_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig::default().with_endpoint(format!("ws://{}/faye", addr));
    let client = AttendanceClient::new(config).unwrap();
    let err = client.open().await.unwrap_err();
    assert!(matches!(err, ClientError::Connection(_) | ClientError::Timeout(_)));
    assert!(!client.is_closed());
}

#[tokio::test]
async fn test_invalid_endpoint_rejected() {
    let config = ClientConfig::default().with_endpoint("http://127.0.0.1/faye");
    assert!(matches!(
        AttendanceClient::new(config),
        Err(ClientError::InvalidConfig(_))
    ));
}
