//! End-to-end bridge tests.
//!
//! A mock engine stands in for the hooked host, a plain thread stands in
//! for its engine (GUI) thread, and requests go through a real TCP
//! listener the way a client would reach an injected bridge.

mod fixtures;
mod mock_engine;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use talkbridge::audio::SampleFormat;
use talkbridge::server::{http, TalkServer, TalkServerSettings};
use talkbridge::talk::json::parse_params_reply;

use fixtures::{decode_frames, is_terminal_frame, silence_frame};
use mock_engine::{MockEngine, MockEngineConfig};

/// A running bridge with a pump thread standing in for the engine thread.
struct TestBridge {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
}

impl TestBridge {
    async fn start(engine: MockEngine, settings: TalkServerSettings) -> Self {
        let server = Arc::new(TalkServer::new(Box::new(engine), settings));

        let shutdown = Arc::new(AtomicBool::new(false));
        let pump_server = server.clone();
        let pump_shutdown = shutdown.clone();
        std::thread::spawn(move || {
            while !pump_shutdown.load(Ordering::SeqCst) {
                pump_server.process_messages();
                std::thread::sleep(Duration::from_millis(5));
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(http::serve(server, listener));

        // Give the pump its first tick so /ready reflects the engine.
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self { addr, shutdown }
    }

    fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }
}

impl Drop for TestBridge {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn one_frame_engine() -> MockEngine {
    MockEngine::new(MockEngineConfig {
        frame: silence_frame(22_050, 8), // 16 bytes of silence
        frame_count: Some(1),
        frame_interval: Duration::ZERO,
    })
}

#[tokio::test]
async fn ready_endpoint_reports_engine_state() {
    let bridge = TestBridge::start(one_frame_engine(), TalkServerSettings::default()).await;

    let response = reqwest::get(bridge.url("/ready")).await.unwrap();
    assert_eq!(response.status(), 200);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));
    assert_eq!(response.text().await.unwrap(), "1");
}

#[tokio::test]
async fn talk_streams_one_frame_and_terminates() {
    let bridge = TestBridge::start(one_frame_engine(), TalkServerSettings::default()).await;

    let response = reqwest::get(bridge.url("/talk?text=hello")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/octet-stream"
    );

    let body = response.bytes().await.unwrap();
    let frames = decode_frames(&body);
    assert_eq!(frames.len(), 2);

    assert_eq!(frames[0].format, SampleFormat::S16);
    assert_eq!(frames[0].frequency, 22_050);
    assert_eq!(frames[0].channels, 1);
    assert_eq!(frames[0].data, vec![0u8; 16]);

    assert!(is_terminal_frame(&frames[1]));
}

#[tokio::test]
async fn talk_parameters_reach_the_engine() {
    let engine = one_frame_engine();
    let staged = engine.staged_text();
    let bridge = TestBridge::start(engine, TalkServerSettings::default()).await;

    let response = reqwest::get(bridge.url("/talk?text=hi%20there&pitch=1.25&cast=0"))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let _ = response.bytes().await.unwrap();

    assert_eq!(staged.lock().unwrap().as_slice(), b"hi there");

    // The snapshot reflects the applied pitch.
    let text = reqwest::get(bridge.url("/params"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let (params, _) = parse_params_reply(&text).unwrap();
    assert_eq!(params.pitch(), 1.25);
}

#[tokio::test]
async fn stop_cancels_a_streaming_talk() {
    let engine = MockEngine::new(MockEngineConfig {
        frame: silence_frame(22_050, 8),
        frame_count: None, // stream until stopped
        frame_interval: Duration::from_millis(10),
    });
    let bridge = TestBridge::start(engine, TalkServerSettings::default()).await;

    let talk_url = bridge.url("/talk?text=endless");
    let talk = tokio::spawn(async move { reqwest::get(talk_url).await.unwrap().bytes().await });

    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    let response = reqwest::get(bridge.url("/stop")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");
    assert!(started.elapsed() < Duration::from_secs(1));

    // The talk stream must terminate with the empty frame and nothing after.
    let body = tokio::time::timeout(Duration::from_secs(5), talk)
        .await
        .expect("talk stream did not terminate")
        .unwrap()
        .unwrap();
    let frames = decode_frames(&body);
    assert!(frames.len() >= 2);
    assert!(is_terminal_frame(frames.last().unwrap()));
    assert!(frames[..frames.len() - 1].iter().all(|f| !is_terminal_frame(f)));
}

#[tokio::test]
async fn params_returns_the_cast_list() {
    let bridge = TestBridge::start(one_frame_engine(), TalkServerSettings::default()).await;

    let response = reqwest::get(bridge.url("/params")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );

    let text = response.text().await.unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert!(doc.get("params").is_some());
    assert!(doc.get("avators").is_some());

    let (params, casts) = parse_params_reply(&text).unwrap();
    assert_eq!(params.volume(), 1.0);
    assert_eq!(casts.len(), 1);
    assert_eq!(casts[0].name, "Mock");
    assert_eq!(casts[0].param_names, vec!["happy", "angry"]);
}

#[tokio::test]
async fn talk_without_text_is_a_bad_request() {
    let bridge = TestBridge::start(one_frame_engine(), TalkServerSettings::default()).await;

    let response = reqwest::get(bridge.url("/talk")).await.unwrap();
    assert_eq!(response.status(), 400);

    let response = reqwest::get(bridge.url("/talk?text=")).await.unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn malformed_parameter_is_a_bad_request() {
    let bridge = TestBridge::start(one_frame_engine(), TalkServerSettings::default()).await;

    let response = reqwest::get(bridge.url("/talk?text=hello&pitch=loud"))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let bridge = TestBridge::start(one_frame_engine(), TalkServerSettings::default()).await;

    let response = reqwest::get(bridge.url("/speak?text=hi")).await.unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn full_queue_answers_unavailable() {
    let settings = TalkServerSettings {
        max_queue: 0,
        ..Default::default()
    };
    let bridge = TestBridge::start(one_frame_engine(), settings).await;

    let response = reqwest::get(bridge.url("/stop")).await.unwrap();
    assert_eq!(response.status(), 503);
}

#[tokio::test]
async fn consecutive_talks_are_served_in_order() {
    let bridge = TestBridge::start(one_frame_engine(), TalkServerSettings::default()).await;

    for text in ["one", "two", "three"] {
        let response = reqwest::get(bridge.url(&format!("/talk?text={text}")))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let frames = decode_frames(&response.bytes().await.unwrap());
        assert!(is_terminal_frame(frames.last().unwrap()));
    }
}
