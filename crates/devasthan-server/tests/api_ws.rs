mod common;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn next_json(ws: &mut WsStream) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("frame should arrive")
            .expect("stream open")
            .expect("valid frame");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn websocket_observers_receive_crowd_and_sos_events() {
    let server = common::spawn_server().await;

    let (mut first, _) = connect_async(server.ws_url()).await.expect("failed to connect");
    let (mut second, _) = connect_async(server.ws_url()).await.expect("failed to connect");
    common::wait_for_observers(&server.state, 2).await;

    let client = reqwest::Client::new();
    client
        .post(server.url("/api/v1/crowd_data"))
        .json(&json!({"location_id": "main_entrance", "person_count": 320}))
        .send()
        .await
        .unwrap();

    for ws in [&mut first, &mut second] {
        let event = next_json(ws).await;
        assert_eq!(event["type"], "crowd_update");
        assert_eq!(event["tier"], "Critical");
        assert_eq!(event["count"], 320);
    }

    client
        .post(server.url("/api/v1/sos"))
        .json(&json!({"location_lat": 10.0, "location_lon": 20.0}))
        .send()
        .await
        .unwrap();

    for ws in [&mut first, &mut second] {
        let event = next_json(ws).await;
        assert_eq!(event["type"], "sos_alert");
        assert_eq!(event["status"], "new");
        assert_eq!(event["location"]["latitude"], 10.0);
    }
}

#[tokio::test]
async fn inbound_frames_are_ignored_and_close_removes_observer() {
    let server = common::spawn_server().await;

    let (mut ws, _) = connect_async(server.ws_url()).await.expect("failed to connect");
    common::wait_for_observers(&server.state, 1).await;

    ws.send(Message::Text("ping from dashboard".into()))
        .await
        .unwrap();
    server
        .state
        .gateway
        .ingest("east_corridor", 120)
        .await
        .unwrap();
    let event = next_json(&mut ws).await;
    assert_eq!(event["tier"], "Moderate");

    ws.close(None).await.unwrap();
    common::wait_for_observers(&server.state, 0).await;

    let report = server
        .state
        .hub
        .broadcast_json(r#"{"type":"noop"}"#.into())
        .await;
    assert_eq!(report.attempted, 0);
}
