use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;
use voxtalk_core::{AgentConfig, AudioChunk, SessionError, SessionEvent};
use voxtalk_audio::pcm;

use crate::dispatch::Dispatcher;
use crate::messages::{ClientMessage, SettingsPayload};

/// Full-duplex websocket session against the agent endpoint.
///
/// One task owns both directions: mic chunks arrive over an mpsc channel and
/// leave as binary frames in arrival order, while server frames are fed to
/// the dispatcher and surface as [`SessionEvent`]s. The loop ends when the
/// stop flag flips, the server closes, or an I/O error occurs.
pub struct Session {
    config: AgentConfig,
    wire_rate: u32,
}

impl Session {
    pub fn new(config: AgentConfig, wire_rate: u32) -> Self {
        Self { config, wire_rate }
    }

    pub async fn run(
        &self,
        api_key: &str,
        mut mic_rx: mpsc::UnboundedReceiver<AudioChunk>,
        mut dispatcher: Dispatcher,
        events: mpsc::UnboundedSender<SessionEvent>,
        mut stop: watch::Receiver<bool>,
    ) -> Result<(), SessionError> {
        let url = Url::parse(&self.config.endpoint)
            .map_err(|e| SessionError::ConnectionFailed(e.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| SessionError::ConnectionFailed("endpoint has no host".to_string()))?
            .to_string();

        let request = http::Request::builder()
            .uri(url.as_str())
            .header("Authorization", format!("Token {}", api_key))
            .header(
                "Sec-WebSocket-Key",
                tungstenite::handshake::client::generate_key(),
            )
            .header("Sec-WebSocket-Version", "13")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Host", host)
            .body(())
            .map_err(|e| SessionError::ConnectionFailed(e.to_string()))?;

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| SessionError::ConnectionFailed(e.to_string()))?;
        tracing::info!("connected to {}", self.config.endpoint);
        let _ = events.send(SessionEvent::Connected);

        let (mut ws_sink, mut ws_source) = ws_stream.split();

        // Settings must be the first frame on the wire.
        let settings =
            ClientMessage::Settings(SettingsPayload::from_config(&self.config, self.wire_rate));
        ws_sink
            .send(Message::Text(settings.to_json()?.into()))
            .await
            .map_err(|e| SessionError::HandshakeFailed(e.to_string()))?;
        tracing::debug!("settings sent, awaiting SettingsApplied");

        let mut keepalive =
            tokio::time::interval(Duration::from_secs(self.config.keepalive_secs.max(1)));
        keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        keepalive.tick().await; // first tick fires immediately

        let result = loop {
            tokio::select! {
                frame = ws_source.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            let event = dispatcher.handle_text(text.as_str());
                            if let SessionEvent::AgentError(ref description) = event {
                                tracing::error!("agent error: {}", description);
                            }
                            let _ = events.send(event);
                        }
                        Some(Ok(Message::Binary(data))) => {
                            if let Some(event) = dispatcher.handle_binary(&data) {
                                let _ = events.send(event);
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                break Err(SessionError::SendFailed(e.to_string()));
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("server closed the connection");
                            break Ok(());
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            break Err(SessionError::ReceiveFailed(e.to_string()));
                        }
                        None => {
                            tracing::info!("websocket stream ended");
                            break Ok(());
                        }
                    }
                }
                chunk = mic_rx.recv() => {
                    match chunk {
                        Some(chunk) => {
                            let bytes = pcm::encode_linear16(&chunk.samples);
                            if let Err(e) = ws_sink.send(Message::Binary(bytes.into())).await {
                                break Err(SessionError::SendFailed(e.to_string()));
                            }
                        }
                        // Capture side went away; nothing left to send.
                        None => {
                            tracing::warn!("mic channel closed");
                            break Ok(());
                        }
                    }
                }
                _ = keepalive.tick() => {
                    let json = ClientMessage::KeepAlive.to_json()?;
                    if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                        break Err(SessionError::SendFailed(e.to_string()));
                    }
                }
                _ = stop.changed() => {
                    if *stop.borrow() {
                        tracing::info!("stop requested, closing session");
                        break Ok(());
                    }
                }
            }
        };

        // Best-effort close on every exit path; the peer may already be gone.
        let _ = ws_sink.send(Message::Close(None)).await;

        let _ = events.send(SessionEvent::Closed);
        result
    }
}
