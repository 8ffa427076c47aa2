//! WebSocket client for the neural voice service
//!
//! One socket per request, no pooling. The exchange runs on the blocking
//! pool with short socket read timeouts so that the deadline and the
//! cancellation token are observed between reads.

use super::wire::{self, BinaryFrame, TextMessage};
use super::SpeechService;
use crate::config::SynthesisConfig;
use crate::error::{Error, Result};
use crate::markup::{render_ssml, Script};
use async_trait::async_trait;
use chrono::Utc;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tungstenite::client::IntoClientRequest;
use tungstenite::http::HeaderValue;
use tungstenite::{Message, WebSocket};
use url::Url;
use uuid::Uuid;

/// Socket read timeout between deadline/cancellation checks
const POLL_INTERVAL: Duration = Duration::from_millis(100);

const USER_AGENT: &str = concat!("cantor-ap/", env!("CARGO_PKG_VERSION"));

/// Production [`SpeechService`]
#[derive(Debug, Clone)]
pub struct NeuralVoiceClient {
    endpoint: Url,
    trusted_client_token: Option<String>,
    output_format: String,
    connect_timeout: Duration,
}

impl NeuralVoiceClient {
    /// # Errors
    ///
    /// Returns `Config` if the endpoint is not a ws:// or wss:// URL.
    pub fn new(config: &SynthesisConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| Error::Config(format!("Invalid synthesis endpoint {}: {}", config.endpoint, e)))?;
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(Error::Config(format!(
                "Synthesis endpoint must use ws:// or wss://, got {}",
                endpoint.scheme()
            )));
        }

        Ok(Self {
            endpoint,
            trusted_client_token: config.trusted_client_token.clone(),
            output_format: config.output_format.clone(),
            connect_timeout: config.connect_timeout(),
        })
    }

    /// Endpoint with per-connection query parameters
    fn connection_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            if let Some(token) = &self.trusted_client_token {
                query.append_pair("TrustedClientToken", token);
            }
            query.append_pair("ConnectionId", &Uuid::new_v4().simple().to_string());
        }
        url
    }
}

#[async_trait]
impl SpeechService for NeuralVoiceClient {
    async fn synthesize(
        &self,
        script: &Script,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let exchange = Exchange {
            url: self.connection_url(),
            request_id: Uuid::new_v4().simple().to_string(),
            output_format: self.output_format.clone(),
            ssml: render_ssml(script),
            connect_timeout: self.connect_timeout,
            deadline: Instant::now() + timeout,
            cancel: cancel.clone(),
        };
        let request_id = exchange.request_id.clone();
        debug!(request_id = %request_id, utterances = script.utterance_count(), "Starting synthesis");

        let audio = tokio::task::spawn_blocking(move || exchange.run())
            .await
            .map_err(|e| Error::Transport(format!("Synthesis task failed: {}", e)))??;

        info!(request_id = %request_id, bytes = audio.len(), "Synthesis complete");
        Ok(audio)
    }
}

/// One request/response exchange, owned by a blocking task
struct Exchange {
    url: Url,
    request_id: String,
    output_format: String,
    ssml: String,
    connect_timeout: Duration,
    deadline: Instant,
    cancel: CancellationToken,
}

impl Exchange {
    fn run(self) -> Result<Vec<u8>> {
        let host = self
            .url
            .host_str()
            .ok_or_else(|| Error::Config(format!("No host in {}", self.url)))?
            .to_string();
        let port = self
            .url
            .port_or_known_default()
            .ok_or_else(|| Error::Config(format!("No port for {}", self.url)))?;

        let addr = (host.as_str(), port)
            .to_socket_addrs()
            .map_err(|e| Error::Transport(format!("Failed to resolve {}: {}", host, e)))?
            .next()
            .ok_or_else(|| Error::Transport(format!("No address for {}", host)))?;

        let tcp = TcpStream::connect_timeout(&addr, self.connect_timeout)
            .map_err(|e| Error::Transport(format!("Connect to {} failed: {}", addr, e)))?;
        tcp.set_read_timeout(Some(self.connect_timeout))?;
        tcp.set_write_timeout(Some(self.connect_timeout))?;
        tcp.set_nodelay(true)?;

        // Shares the socket; used to switch to polling reads and to force-close
        let control = tcp.try_clone()?;

        let mut request = self.url.as_str().into_client_request()?;
        request
            .headers_mut()
            .insert("User-Agent", HeaderValue::from_static(USER_AGENT));

        let result = if self.url.scheme() == "wss" {
            let connector = native_tls::TlsConnector::new()
                .map_err(|e| Error::Transport(format!("TLS setup failed: {}", e)))?;
            let tls = connector
                .connect(&host, tcp)
                .map_err(|e| Error::Transport(format!("TLS handshake failed: {}", e)))?;
            let (socket, _response) = tungstenite::client(request, tls)
                .map_err(|e| Error::Transport(format!("WebSocket handshake failed: {}", e)))?;
            self.converse(socket, &control)
        } else {
            let (socket, _response) = tungstenite::client(request, tcp)
                .map_err(|e| Error::Transport(format!("WebSocket handshake failed: {}", e)))?;
            self.converse(socket, &control)
        };

        let _ = control.shutdown(Shutdown::Both);
        result
    }

    fn converse<S: Read + Write>(&self, mut socket: WebSocket<S>, control: &TcpStream) -> Result<Vec<u8>> {
        control.set_read_timeout(Some(POLL_INTERVAL))?;

        let timestamp = wire::timestamp(Utc::now());
        socket.send(Message::Text(wire::speech_config_message(&timestamp, &self.output_format)))?;
        socket.send(Message::Text(wire::ssml_message(&self.request_id, &timestamp, &self.ssml)))?;

        let mut audio = Vec::new();
        let outcome = loop {
            if self.cancel.is_cancelled() {
                break Err(Error::Transport("Synthesis cancelled".to_string()));
            }
            if Instant::now() >= self.deadline {
                warn!(request_id = %self.request_id, "No terminal marker before deadline");
                break Err(Error::Transport("Timed out waiting for synthesis to finish".to_string()));
            }

            match socket.read() {
                Ok(Message::Binary(frame)) => match wire::parse_binary(&frame) {
                    Ok(BinaryFrame::Audio(payload)) => audio.extend_from_slice(payload),
                    Ok(BinaryFrame::Control) => {}
                    Err(e) => break Err(e),
                },
                Ok(Message::Text(text)) => match wire::parse_text(&text) {
                    TextMessage::TurnEnd => break Ok(()),
                    TextMessage::Control { path } => {
                        debug!(request_id = %self.request_id, path = ?path, "Control message");
                    }
                },
                Ok(Message::Close(_)) => {
                    break Err(Error::Transport("Connection closed before synthesis finished".to_string()));
                }
                Ok(_) => {}
                Err(tungstenite::Error::Io(ref e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(e) => break Err(e.into()),
            }
        };

        if outcome.is_ok() {
            // Best effort; the socket is shut down by the caller either way
            let _ = socket.close(None);
            let _ = socket.flush();
        }
        outcome?;

        if audio.is_empty() {
            return Err(Error::EmptySynthesis);
        }
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> SynthesisConfig {
        SynthesisConfig {
            endpoint: endpoint.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_rejects_non_websocket_endpoint() {
        assert!(matches!(
            NeuralVoiceClient::new(&config("https://example.org/tts")),
            Err(Error::Config(_))
        ));
        assert!(matches!(NeuralVoiceClient::new(&config("not a url")), Err(Error::Config(_))));
    }

    #[test]
    fn test_connection_url_has_fresh_connection_id() {
        let mut cfg = config("wss://voice.example.org/synthesize");
        cfg.trusted_client_token = Some("token123".to_string());
        let client = NeuralVoiceClient::new(&cfg).unwrap();

        let a = client.connection_url();
        let b = client.connection_url();
        let pairs: Vec<(String, String)> = a.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("TrustedClientToken".to_string(), "token123".to_string()));
        assert_eq!(pairs[1].0, "ConnectionId");
        assert_eq!(pairs[1].1.len(), 32);
        assert!(!pairs[1].1.contains('-'));
        assert_ne!(a, b);
    }
}
