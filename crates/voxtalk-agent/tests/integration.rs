use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use voxtalk_agent::{Dispatcher, Session};
use voxtalk_audio::{pcm, PlaybackSink};
use voxtalk_core::{AgentConfig, AudioChunk, SessionEvent, SpeakingTracker, TranscriptRole};

fn make_pipeline(grace_ms: u64) -> (Dispatcher, PlaybackSink, Arc<SpeakingTracker>) {
    let tracker = Arc::new(SpeakingTracker::new(Duration::from_millis(grace_ms)));
    let sink = PlaybackSink::new(Arc::clone(&tracker));
    let dispatcher = Dispatcher::new(Arc::clone(&tracker), sink.clone());
    (dispatcher, sink, tracker)
}

#[test]
fn test_full_conversation_turn() {
    let (mut d, sink, tracker) = make_pipeline(10_000);

    // Handshake.
    assert_eq!(
        d.handle_text(r#"{"type":"Welcome","request_id":"r-1"}"#),
        SessionEvent::Welcome {
            session_id: Some("r-1".to_string())
        }
    );
    assert_eq!(d.handle_text(r#"{"type":"SettingsApplied"}"#), SessionEvent::Ready);

    // User speaks, transcript comes back, agent thinks and answers.
    assert_eq!(
        d.handle_text(r#"{"type":"UserStartedSpeaking"}"#),
        SessionEvent::Listening
    );
    assert_eq!(
        d.handle_text(r#"{"type":"ConversationText","role":"user","content":"what time is it"}"#),
        SessionEvent::Transcript {
            role: TranscriptRole::User,
            content: "what time is it".to_string()
        }
    );
    assert_eq!(d.handle_text(r#"{"type":"AgentThinking"}"#), SessionEvent::Thinking);
    assert_eq!(
        d.handle_text(r#"{"type":"AgentStartedSpeaking"}"#),
        SessionEvent::AgentSpeaking
    );

    // Agent audio streams in; the mic gate must be closed while it does.
    let frame = pcm::encode_linear16(&vec![0.3; 320]);
    assert_eq!(d.handle_binary(&frame), Some(SessionEvent::FirstAudio));
    assert_eq!(d.handle_binary(&frame), None);
    assert!(!tracker.should_process_audio());
    assert_eq!(sink.queued_chunks(), 2);

    assert_eq!(
        d.handle_text(r#"{"type":"AgentAudioDone"}"#),
        SessionEvent::AgentFinished
    );
}

#[test]
fn test_barge_in_mid_answer_silences_playback() {
    let (mut d, sink, tracker) = make_pipeline(10_000);

    let frame = pcm::encode_linear16(&vec![0.3; 320]);
    d.handle_binary(&frame);
    d.handle_binary(&frame);
    d.handle_binary(&frame);
    assert_eq!(sink.queued_chunks(), 3);

    // The user talks over the agent.
    let event = d.handle_text(r#"{"type":"UserStartedSpeaking"}"#);
    assert_eq!(event, SessionEvent::BargeIn);

    // Everything queued is gone and the mic gate is open immediately.
    assert_eq!(sink.queued_chunks(), 0);
    assert!(tracker.should_process_audio());

    // A followup notice is plain listening, not a second barge-in.
    assert_eq!(
        d.handle_text(r#"{"type":"UserStartedSpeaking"}"#),
        SessionEvent::Listening
    );
}

#[test]
fn test_session_survives_unknown_and_fallback_frames() {
    let (mut d, _, _) = make_pipeline(1000);

    assert_eq!(
        d.handle_text(r#"{"type":"SomethingElse","x":1}"#),
        SessionEvent::Unknown(r#"{"type":"SomethingElse","x":1}"#.to_string())
    );
    assert_eq!(
        d.handle_text(r#"{"raw":"EndOfThought"}"#),
        SessionEvent::EndOfThought
    );
    assert_eq!(
        d.handle_text(r#"{"raw":"Interruption"}"#),
        SessionEvent::Interrupted
    );

    // Normal traffic still works afterwards.
    assert_eq!(d.handle_text(r#"{"type":"AgentThinking"}"#), SessionEvent::Thinking);
}

/// Mock server: accepts one websocket connection, echoes pings implicitly,
/// and returns every data frame received before the peer closed.
async fn accept_and_collect(
    listener: TcpListener,
    ack_after_binaries: Option<usize>,
) -> (Vec<Message>, bool) {
    let (stream, _) = listener.accept().await.expect("accept failed");
    let mut ws = tokio_tungstenite::accept_async(stream)
        .await
        .expect("websocket handshake failed");

    let mut received = Vec::new();
    let mut saw_close = false;
    while let Some(frame) = ws.next().await {
        match frame {
            Ok(Message::Close(_)) => {
                saw_close = true;
                break;
            }
            Ok(msg @ (Message::Text(_) | Message::Binary(_))) => {
                received.push(msg);
                if let Some(n) = ack_after_binaries {
                    let binaries = received
                        .iter()
                        .filter(|m| matches!(m, Message::Binary(_)))
                        .count();
                    if binaries == n {
                        ws.send(Message::Text(r#"{"type":"AgentAudioDone"}"#.into()))
                            .await
                            .expect("ack send failed");
                    }
                }
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    (received, saw_close)
}

fn local_agent_config(addr: std::net::SocketAddr) -> AgentConfig {
    let mut config = AgentConfig::default();
    config.endpoint = format!("ws://{}", addr);
    // Keep the keepalive timer out of short-lived tests.
    config.keepalive_secs = 600;
    config
}

#[tokio::test]
async fn test_session_sends_settings_first_then_mic_audio_in_order() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(accept_and_collect(listener, Some(3)));

    let (dispatcher, _sink, _tracker) = make_pipeline(1000);
    let (mic_tx, mic_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (stop_tx, stop_rx) = watch::channel(false);

    // Mic audio queued before the connection even opens must still come
    // after the settings frame.
    for level in [0.1_f32, 0.2, 0.3] {
        mic_tx.send(AudioChunk::mono(vec![level; 160], 16_000)).unwrap();
    }

    let session = Session::new(local_agent_config(addr), 16_000);
    let client = tokio::spawn(async move {
        session
            .run("test-key", mic_rx, dispatcher, event_tx, stop_rx)
            .await
    });

    // The server acknowledges the third binary frame; once that lands we
    // know everything queued went over the wire.
    loop {
        match event_rx.recv().await.expect("session events ended early") {
            SessionEvent::AgentFinished => break,
            _ => {}
        }
    }
    stop_tx.send(true).unwrap();

    assert!(client.await.unwrap().is_ok());
    let (received, saw_close) = server.await.unwrap();
    assert!(saw_close, "session exit should close the websocket");

    match &received[0] {
        Message::Text(text) => {
            let settings: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
            assert_eq!(settings["type"], "Settings");
            assert_eq!(settings["audio"]["input"]["sample_rate"], 16_000);
        }
        other => panic!("first frame was not the settings message: {:?}", other),
    }

    let levels: Vec<f32> = received
        .iter()
        .filter_map(|m| match m {
            Message::Binary(data) => Some(pcm::decode_linear16(data)[0]),
            _ => None,
        })
        .collect();
    assert_eq!(levels.len(), 3);
    for (sent, got) in [0.1_f32, 0.2, 0.3].iter().zip(&levels) {
        assert!((sent - got).abs() < 1e-3, "mic frames out of order: {:?}", levels);
    }
}

#[tokio::test]
async fn test_session_exits_cleanly_when_server_closes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept failed");
        let mut ws = tokio_tungstenite::accept_async(stream)
            .await
            .expect("websocket handshake failed");
        // Take the settings frame, then hang up.
        let _ = ws.next().await;
        ws.close(None).await.expect("close failed");
        while ws.next().await.is_some() {}
    });

    let (dispatcher, _sink, _tracker) = make_pipeline(1000);
    let (_mic_tx, mic_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (_stop_tx, stop_rx) = watch::channel(false);

    let session = Session::new(local_agent_config(addr), 16_000);
    let client = tokio::spawn(async move {
        session
            .run("test-key", mic_rx, dispatcher, event_tx, stop_rx)
            .await
    });

    assert!(client.await.unwrap().is_ok());
    server.await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = event_rx.try_recv() {
        events.push(event);
    }
    assert_eq!(events.first(), Some(&SessionEvent::Connected));
    assert_eq!(events.last(), Some(&SessionEvent::Closed));
}

#[tokio::test]
async fn test_session_dispatches_inbound_frames() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept failed");
        let mut ws = tokio_tungstenite::accept_async(stream)
            .await
            .expect("websocket handshake failed");
        let _ = ws.next().await; // settings
        ws.send(Message::Text(
            r#"{"type":"ConversationText","role":"user","content":"hi"}"#.into(),
        ))
        .await
        .unwrap();
        ws.send(Message::Binary(pcm::encode_linear16(&vec![0.3; 160]).into()))
            .await
            .unwrap();
        ws.close(None).await.expect("close failed");
        while ws.next().await.is_some() {}
    });

    let (dispatcher, sink, _tracker) = make_pipeline(1000);
    let (_mic_tx, mic_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (_stop_tx, stop_rx) = watch::channel(false);

    let session = Session::new(local_agent_config(addr), 16_000);
    let client = tokio::spawn(async move {
        session
            .run("test-key", mic_rx, dispatcher, event_tx, stop_rx)
            .await
    });

    assert!(client.await.unwrap().is_ok());
    server.await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = event_rx.try_recv() {
        events.push(event);
    }
    assert!(events.contains(&SessionEvent::Transcript {
        role: TranscriptRole::User,
        content: "hi".to_string()
    }));
    assert!(events.contains(&SessionEvent::FirstAudio));
    // Agent audio landed in the playback queue; no worker drains it here.
    assert_eq!(sink.queued_chunks(), 1);
}
