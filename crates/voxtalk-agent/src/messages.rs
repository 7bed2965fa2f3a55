//! Wire message types for the agent websocket.
//!
//! The protocol carries two kinds of frames: binary frames of linear16 PCM
//! audio (both directions) and JSON text frames tagged by a `type` field.
//! The first client frame after connecting must be `Settings`; the server
//! answers with `Welcome` and then `SettingsApplied` once the session is
//! configured.

use serde::{Deserialize, Serialize};
use voxtalk_core::{AgentConfig, SessionError};

// =============================================================================
// Client messages
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    Settings(SettingsPayload),
    KeepAlive,
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, SessionError> {
        serde_json::to_string(self).map_err(|e| SessionError::Serialization(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingsPayload {
    pub audio: AudioSettings,
    pub agent: AgentSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioSettings {
    pub input: AudioFormat,
    pub output: OutputFormat,
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioFormat {
    pub encoding: String,
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputFormat {
    pub encoding: String,
    pub sample_rate: u32,
    pub container: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentSettings {
    pub listen: ListenSettings,
    pub think: ThinkSettings,
    pub speak: SpeakSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListenSettings {
    pub provider: Provider,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThinkSettings {
    pub provider: Provider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeakSettings {
    pub provider: Provider,
}

#[derive(Debug, Clone, Serialize)]
pub struct Provider {
    #[serde(rename = "type")]
    pub kind: String,
    pub model: String,
}

impl SettingsPayload {
    /// Build the session settings from the agent config. Both directions use
    /// raw linear16 at `wire_rate`.
    pub fn from_config(config: &AgentConfig, wire_rate: u32) -> Self {
        Self {
            audio: AudioSettings {
                input: AudioFormat {
                    encoding: "linear16".to_string(),
                    sample_rate: wire_rate,
                },
                output: OutputFormat {
                    encoding: "linear16".to_string(),
                    sample_rate: wire_rate,
                    container: "none".to_string(),
                },
            },
            agent: AgentSettings {
                listen: ListenSettings {
                    provider: Provider {
                        kind: "deepgram".to_string(),
                        model: config.listen.model.clone(),
                    },
                },
                think: ThinkSettings {
                    provider: Provider {
                        kind: config.think.provider.clone(),
                        model: config.think.model.clone(),
                    },
                    prompt: if config.think.instructions.is_empty() {
                        None
                    } else {
                        Some(config.think.instructions.clone())
                    },
                },
                speak: SpeakSettings {
                    provider: Provider {
                        kind: "deepgram".to_string(),
                        model: config.speak.voice.clone(),
                    },
                },
            },
        }
    }
}

// =============================================================================
// Server messages
// =============================================================================

/// Control frames received from the agent, tagged by `type`.
///
/// Unrecognized tags deserialize to [`Unknown`](Self::Unknown); callers go
/// through [`parse`](Self::parse), which also catches `EndOfThought` and
/// `Interruption` notices that some server versions emit in envelopes that
/// do not match the tagged layout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    Welcome {
        #[serde(default)]
        request_id: Option<String>,
    },
    SettingsApplied,
    ConversationText {
        role: String,
        content: String,
    },
    UserStartedSpeaking,
    AgentThinking,
    EndOfThought,
    AgentStartedSpeaking,
    AgentAudioDone,
    // Older server versions use this name for AgentAudioDone.
    AgentFinishedSpeaking,
    Interruption,
    FunctionCalling,
    Warning {
        #[serde(default)]
        description: String,
    },
    Error {
        #[serde(default)]
        description: String,
    },
    #[serde(other)]
    Unknown,
}

impl ControlMessage {
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<ControlMessage>(raw) {
            Ok(ControlMessage::Unknown) | Err(_) => {
                // Fallback for envelopes the tagged layout does not cover.
                if raw.contains("EndOfThought") {
                    ControlMessage::EndOfThought
                } else if raw.contains("Interruption") {
                    ControlMessage::Interruption
                } else {
                    ControlMessage::Unknown
                }
            }
            Ok(msg) => msg,
        }
    }
}
