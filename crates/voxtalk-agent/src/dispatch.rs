use std::sync::Arc;

use voxtalk_audio::{pcm, PlaybackSink};
use voxtalk_core::{SessionEvent, SpeakingTracker, TranscriptRole};

use crate::messages::ControlMessage;

/// Turns incoming frames into session events and playback side effects.
///
/// Text frames go through [`ControlMessage::parse`]; binary frames are
/// decoded from linear16 and handed to the playback sink. The dispatcher
/// owns the barge-in decision: a `UserStartedSpeaking` notice that arrives
/// while the agent is audible stops playback exactly once, because the stop
/// itself clears the speaking state that gates the branch.
pub struct Dispatcher {
    tracker: Arc<SpeakingTracker>,
    sink: PlaybackSink,
    first_audio_seen: bool,
}

impl Dispatcher {
    pub fn new(tracker: Arc<SpeakingTracker>, sink: PlaybackSink) -> Self {
        Self {
            tracker,
            sink,
            first_audio_seen: false,
        }
    }

    /// Handle one JSON control frame.
    pub fn handle_text(&mut self, raw: &str) -> SessionEvent {
        match ControlMessage::parse(raw) {
            ControlMessage::Welcome { request_id } => SessionEvent::Welcome {
                session_id: request_id,
            },
            ControlMessage::SettingsApplied => SessionEvent::Ready,
            ControlMessage::ConversationText { role, content } => SessionEvent::Transcript {
                role: TranscriptRole::from_wire(&role),
                content,
            },
            ControlMessage::UserStartedSpeaking => {
                if self.tracker.is_speaking() {
                    tracing::info!("user barged in, stopping playback");
                    self.sink.stop();
                    SessionEvent::BargeIn
                } else {
                    SessionEvent::Listening
                }
            }
            ControlMessage::AgentThinking => SessionEvent::Thinking,
            ControlMessage::EndOfThought => SessionEvent::EndOfThought,
            ControlMessage::AgentStartedSpeaking => {
                // Close the gate even before the first audio frame lands.
                self.tracker.mark_speaking_started();
                SessionEvent::AgentSpeaking
            }
            ControlMessage::AgentAudioDone | ControlMessage::AgentFinishedSpeaking => {
                self.tracker.mark_speaking_ended();
                SessionEvent::AgentFinished
            }
            ControlMessage::Interruption => {
                // Server-side interrupt notice, same stop path as barge-in.
                if self.tracker.is_speaking() {
                    self.sink.stop();
                }
                SessionEvent::Interrupted
            }
            ControlMessage::FunctionCalling => SessionEvent::FunctionCalling,
            ControlMessage::Warning { description } => {
                tracing::warn!("agent warning: {}", description);
                SessionEvent::Unknown(format!("warning: {}", description))
            }
            ControlMessage::Error { description } => SessionEvent::AgentError(description),
            ControlMessage::Unknown => SessionEvent::Unknown(raw.to_string()),
        }
    }

    /// Handle one binary audio frame. Returns an event only for the first
    /// frame of the session.
    pub fn handle_binary(&mut self, bytes: &[u8]) -> Option<SessionEvent> {
        let samples = pcm::decode_linear16(bytes);
        self.sink.play(samples);
        if !self.first_audio_seen {
            self.first_audio_seen = true;
            tracing::debug!("first audio frame received ({} bytes)", bytes.len());
            return Some(SessionEvent::FirstAudio);
        }
        None
    }
}
