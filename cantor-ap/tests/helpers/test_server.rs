//! Local neural voice server for synthesis tests
//!
//! Listens on an ephemeral port, accepts one WebSocket connection, records
//! the text messages it receives and answers with a scripted frame list.

use cantor_ap::synthesis::wire;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tungstenite::Message;

/// One scripted server action
#[derive(Debug, Clone)]
pub enum ServerFrame {
    Binary(Vec<u8>),
    Text(String),
    /// Send nothing for a while
    Hold(Duration),
}

impl ServerFrame {
    /// Binary audio frame carrying `payload`
    pub fn audio(request_id: &str, payload: &[u8]) -> Self {
        let header = format!(
            "X-RequestId:{}\r\nContent-Type:audio/mpeg\r\nPath:{}",
            request_id,
            wire::PATH_AUDIO
        );
        ServerFrame::Binary(wire::encode_binary(&header, payload))
    }

    /// Binary frame whose path is not audio
    pub fn binary_control(request_id: &str, payload: &[u8]) -> Self {
        let header = format!("X-RequestId:{}\r\nPath:audio.metadata", request_id);
        ServerFrame::Binary(wire::encode_binary(&header, payload))
    }

    pub fn text(path: &str, body: &str) -> Self {
        ServerFrame::Text(format!(
            "X-RequestId:server\r\nContent-Type:application/json\r\nPath:{}\r\n\r\n{}",
            path, body
        ))
    }

    pub fn turn_end() -> Self {
        Self::text(wire::PATH_TURN_END, "{}")
    }
}

/// Handle to a running test server
pub struct TestVoiceServer {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<String>>>,
    handle: Option<JoinHandle<()>>,
}

impl TestVoiceServer {
    /// Serve one connection with `frames`, sent after both client messages arrive
    pub fn start(frames: Vec<ServerFrame>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind test server");
        let addr = listener.local_addr().expect("No local address");
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = received.clone();

        let handle = std::thread::spawn(move || {
            let Ok((stream, _)) = listener.accept() else {
                return;
            };
            let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
            let Ok(mut socket) = tungstenite::accept(stream) else {
                return;
            };

            while log.lock().unwrap().len() < 2 {
                match socket.read() {
                    Ok(Message::Text(text)) => log.lock().unwrap().push(text),
                    Ok(_) => {}
                    Err(_) => return,
                }
            }

            for frame in frames {
                let sent = match frame {
                    ServerFrame::Binary(bytes) => socket.send(Message::Binary(bytes)),
                    ServerFrame::Text(text) => socket.send(Message::Text(text)),
                    ServerFrame::Hold(duration) => {
                        std::thread::sleep(duration);
                        Ok(())
                    }
                };
                if sent.is_err() {
                    return;
                }
            }

            // Wait for the client to hang up
            loop {
                match socket.read() {
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        });

        Self {
            addr,
            received,
            handle: Some(handle),
        }
    }

    /// Endpoint for the synthesis config
    pub fn endpoint(&self) -> String {
        format!("ws://{}/synthesize", self.addr)
    }

    /// Text messages received from the client, in order
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    /// Wait for the connection to finish
    pub fn join(mut self) -> Vec<String> {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.received()
    }
}
