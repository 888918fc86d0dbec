//! Live client against a local WebSocket server

mod common;

use common::{MockLiveServer, ServerEvent};
use live_analytics::*;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

async fn wait_for(client: &LiveClient, kind: EventKind) -> SessionEvent {
    loop {
        match client.next_event(WAIT).await {
            Some(event) if event.kind() == kind => return event,
            Some(event) => verbose_println!("skipping {:?}", event),
            None => panic!("timed out waiting for {}", kind),
        }
    }
}

fn frame_json(msg: &Message) -> Value {
    serde_json::from_str(msg.to_text().unwrap()).unwrap()
}

#[tokio::test]
async fn test_connect_sends_configuration_in_query() {
    let server = MockLiveServer::start().await;

    let client = live_analytics::builder()
        .event_channel()
        .url(server.ws_url())
        .config(SessionConfiguration::new().with_speakers(2, 6).with_language("en"))
        .header("Authorization", "Token test")
        .connect()
        .await
        .unwrap();

    wait_for(&client, EventKind::Open).await;
    assert!(client.is_open());

    match server.next_seen(WAIT).await {
        Some(ServerEvent::Connected(target)) => {
            verbose_println!("upgrade target: {}", target);
            assert!(target.starts_with("/v1/live?"));
            assert!(target.contains("min_speakers=2"));
            assert!(target.contains("max_speakers=6"));
            assert!(target.contains("language=en"));
        }
        other => panic!("expected connection, got {:?}", other),
    }

    client.close(WAIT).await.unwrap();
}

#[tokio::test]
async fn test_audio_sent_before_open_arrives_in_order() {
    let server = MockLiveServer::start().await;

    let client = live_analytics::builder().event_channel().url(server.ws_url()).connect().await.unwrap();

    // the socket is still connecting here
    client.send(b"chunk-1".to_vec()).unwrap();
    client.send(b"chunk-2".to_vec()).unwrap();
    wait_for(&client, EventKind::Open).await;
    client.send(b"chunk-3".to_vec()).unwrap();

    let frames = server.frames(3, WAIT).await;
    assert_eq!(
        frames,
        vec![
            Message::Binary(b"chunk-1".to_vec()),
            Message::Binary(b"chunk-2".to_vec()),
            Message::Binary(b"chunk-3".to_vec()),
        ]
    );

    client.close(WAIT).await.unwrap();
}

#[tokio::test]
async fn test_inbound_events_are_dispatched() {
    let server = MockLiveServer::start().await;
    let (tx, rx) = crossbeam_channel::unbounded();

    let client = live_analytics::builder()
        .event_channel()
        .url(server.ws_url())
        .on(EventKind::SpeakerChange, ChannelListener::new(tx))
        .connect()
        .await
        .unwrap();
    wait_for(&client, EventKind::Open).await;

    server.push_text(r#"{"event":{"event_type":"speaker_change","data":{"speaker":1}}}"#);
    server.push_text("not json");
    server.push_text(r#"{"type":"metrics_update","data":{"talk_ratio":0.6}}"#);

    let error = wait_for(&client, EventKind::Error).await;
    assert_eq!(error.as_error().map(|e| e.kind), Some(ErrorKind::Parse));
    let metrics = wait_for(&client, EventKind::MetricsUpdate).await;
    assert_eq!(metrics.data(), Some(&json!({"talk_ratio": 0.6})));

    let speaker = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(speaker, SessionEvent::SpeakerChange(json!({"speaker": 1})));
    assert!(client.is_open());

    client.close(WAIT).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_callbacks_only_client_queues_nothing() {
    let server = MockLiveServer::start().await;
    let (tx, rx) = crossbeam_channel::unbounded();

    let client = live_analytics::builder()
        .url(server.ws_url())
        .on(EventKind::Silence, ChannelListener::new(tx))
        .connect()
        .await
        .unwrap();
    assert!(!client.has_event_channel());

    for _ in 0..50 {
        server.push_text(r#"{"type":"silence","data":{}}"#);
    }
    for _ in 0..50 {
        rx.recv_timeout(WAIT).unwrap();
    }

    assert!(client.try_recv_event().is_none());
    assert!(client.next_event(Duration::from_millis(50)).await.is_none());
    assert_eq!(client.metrics().frames_received, 50);

    client.close(WAIT).await.unwrap();
}

#[tokio::test]
async fn test_graceful_close_reports_server_close_code() {
    let server = MockLiveServer::start().await;
    let client = live_analytics::builder().event_channel().url(server.ws_url()).connect().await.unwrap();
    wait_for(&client, EventKind::Open).await;

    client.request_close().unwrap();
    assert_eq!(client.state(), ConnectionState::Closing);

    let close = wait_for(&client, EventKind::Close).await;
    assert_eq!(close, SessionEvent::Close { code: 1000, reason: "stream closed".into() });
    assert_eq!(client.state(), ConnectionState::Closed);

    let frames = server.frames(1, WAIT).await;
    assert_eq!(frame_json(&frames[0]), json!({"type": "CloseStream"}));
}

#[tokio::test]
async fn test_close_times_out_and_aborts() {
    let server = MockLiveServer::start_ignoring_close().await;
    let client = live_analytics::builder().event_channel().url(server.ws_url()).connect().await.unwrap();
    wait_for(&client, EventKind::Open).await;

    let session = client.session().clone();
    let result = client.close(Duration::from_millis(300)).await;

    assert!(matches!(result, Err(LiveError::Timeout(_))));
    assert_eq!(session.state(), ConnectionState::Failed);
}

#[tokio::test]
async fn test_control_frames_on_the_wire() {
    let server = MockLiveServer::start().await;
    let client = live_analytics::builder()
        .event_channel()
        .url(server.ws_url())
        .finalize_mode(FinalizeMode::SignalOnly)
        .connect()
        .await
        .unwrap();
    wait_for(&client, EventKind::Open).await;

    client.keep_alive().unwrap();
    client
        .configure(SessionConfiguration::new().with_silence_threshold(1.5))
        .unwrap();
    client.finalize().unwrap();
    assert!(client.is_open());

    let frames: Vec<Value> = server.frames(3, WAIT).await.iter().map(frame_json).collect();
    assert_eq!(
        frames,
        vec![
            json!({"type": "KeepAlive"}),
            json!({"type": "Configure", "silence_detection": true, "silence_threshold": 1.5}),
            json!({"type": "Finalize"}),
        ]
    );

    client.close(WAIT).await.unwrap();
}

#[tokio::test]
async fn test_periodic_keep_alive() {
    let server = MockLiveServer::start().await;
    let client = live_analytics::builder()
        .event_channel()
        .url(server.ws_url())
        .keep_alive(Duration::from_millis(100))
        .connect()
        .await
        .unwrap();
    wait_for(&client, EventKind::Open).await;

    let frames = server.frames(2, WAIT).await;
    assert_eq!(frames.len(), 2);
    for frame in &frames {
        assert_eq!(frame_json(frame), json!({"type": "KeepAlive"}));
    }

    client.close(WAIT).await.unwrap();
}

#[tokio::test]
async fn test_connection_refused_fails_session() {
    // bind then drop to get a port nothing listens on
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let client = live_analytics::builder()
        .event_channel()
        .url(format!("ws://{}", addr))
        .connect()
        .await
        .unwrap();

    let error = wait_for(&client, EventKind::Error).await;
    assert_eq!(error.as_error().map(|e| e.kind), Some(ErrorKind::Transport));
    assert_eq!(client.state(), ConnectionState::Failed);
    assert!(matches!(client.send(vec![0u8]), Err(LiveError::SessionClosed(ConnectionState::Failed))));
}

#[tokio::test]
async fn test_server_drop_closes_session() {
    let server = MockLiveServer::start().await;
    let client = live_analytics::builder().event_channel().url(server.ws_url()).connect().await.unwrap();
    wait_for(&client, EventKind::Open).await;

    server.shutdown();

    let event = loop {
        match client.next_event(WAIT).await {
            Some(event) if event.is_terminal() => break event,
            Some(_) => continue,
            None => panic!("session never ended"),
        }
    };
    verbose_println!("terminal event: {:?}", event);
    assert!(client.state().is_terminal());
}
