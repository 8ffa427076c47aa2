//! Neural voice client against a local WebSocket server
//!
//! Each test starts a [`TestVoiceServer`] with a scripted frame list and
//! checks what the client assembles from it.

mod helpers;

use cantor_ap::config::SynthesisConfig;
use cantor_ap::markup::{MarkupBuilder, Script, VoiceParams};
use cantor_ap::synthesis::{NeuralVoiceClient, SpeechService};
use cantor_ap::Error;
use cantor_common::ContentType;
use helpers::{ServerFrame, TestVoiceServer};
use std::net::TcpListener;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

fn client_for(endpoint: &str) -> NeuralVoiceClient {
    let config = SynthesisConfig {
        endpoint: endpoint.to_string(),
        connect_timeout_ms: 1000,
        ..Default::default()
    };
    NeuralVoiceClient::new(&config).expect("Valid endpoint")
}

fn script() -> Script {
    MarkupBuilder::new().build(
        "Line one.\nLine two.",
        ContentType::Katha,
        &VoiceParams::new("hi-IN-MadhurNeural"),
    )
}

// ============================================================================
// Successful exchanges
// ============================================================================

/// **Given:** A server answering with one audio frame and the terminal marker
/// **Then:** The client returns exactly the frame's payload, after sending
/// the speech config and the markup document in that order
#[tokio::test]
async fn test_single_audio_frame() {
    let payload = vec![0xAB; 4096];
    let server = TestVoiceServer::start(vec![
        ServerFrame::audio("req", &payload),
        ServerFrame::turn_end(),
    ]);
    let client = client_for(&server.endpoint());

    let audio = client
        .synthesize(&script(), Duration::from_secs(5), &CancellationToken::new())
        .await
        .expect("Synthesis should succeed");

    assert_eq!(audio.len(), 4096);
    assert_eq!(audio, payload);

    let received = server.join();
    assert_eq!(received.len(), 2);
    assert!(received[0].contains("Path:speech.config"));
    assert!(received[0].contains("audio-24khz-48kbitrate-mono-mp3"));
    assert!(received[1].contains("Path:ssml"));
    assert!(received[1].contains("<speak"));
    assert!(received[1].contains("hi-IN-MadhurNeural"));
    assert!(received[1].contains("Line one."));
}

/// Metadata and non-audio frames do not end the turn or add bytes
#[tokio::test]
async fn test_control_frames_ignored() {
    let server = TestVoiceServer::start(vec![
        ServerFrame::text("turn.start", "{}"),
        ServerFrame::binary_control("req", b"metadata"),
        ServerFrame::audio("req", b"first-"),
        ServerFrame::text("audio.metadata", "{\"Metadata\":[]}"),
        ServerFrame::audio("req", b"second"),
        ServerFrame::turn_end(),
    ]);
    let client = client_for(&server.endpoint());

    let audio = client
        .synthesize(&script(), Duration::from_secs(5), &CancellationToken::new())
        .await
        .expect("Synthesis should succeed");

    assert_eq!(audio, b"first-second".to_vec());
}

// ============================================================================
// Failures
// ============================================================================

/// **Given:** A server that never sends the terminal marker
/// **Then:** The client gives up at its deadline with a transport error
#[tokio::test]
async fn test_timeout_without_terminal_marker() {
    let server = TestVoiceServer::start(vec![
        ServerFrame::audio("req", b"partial"),
        ServerFrame::Hold(Duration::from_secs(3)),
    ]);
    let client = client_for(&server.endpoint());

    let started = Instant::now();
    let result = client
        .synthesize(&script(), Duration::from_millis(300), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::Transport(_))), "got {:?}", result);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_terminal_marker_without_audio() {
    let server = TestVoiceServer::start(vec![ServerFrame::turn_end()]);
    let client = client_for(&server.endpoint());

    let result = client
        .synthesize(&script(), Duration::from_secs(5), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::EmptySynthesis)), "got {:?}", result);
}

/// A binary frame shorter than its declared header is a protocol violation
#[tokio::test]
async fn test_truncated_binary_frame() {
    // Declares a 64-byte header, carries one byte
    let server = TestVoiceServer::start(vec![
        ServerFrame::Binary(vec![0x00, 0x40, b'P']),
        ServerFrame::turn_end(),
    ]);
    let client = client_for(&server.endpoint());

    let result = client
        .synthesize(&script(), Duration::from_secs(5), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::Protocol(_))), "got {:?}", result);
}

#[tokio::test]
async fn test_cancel_abandons_exchange() {
    let server = TestVoiceServer::start(vec![ServerFrame::Hold(Duration::from_secs(3))]);
    let client = client_for(&server.endpoint());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = client.synthesize(&script(), Duration::from_secs(10), &cancel).await;

    assert!(matches!(result, Err(Error::Transport(_))), "got {:?}", result);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_connection_refused() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let client = client_for(&format!("ws://{}/synthesize", addr));

    let result = client
        .synthesize(&script(), Duration::from_secs(2), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::Transport(_))), "got {:?}", result);
}
