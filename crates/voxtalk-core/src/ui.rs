/// Speaker role attached to a transcript line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptRole {
    User,
    Assistant,
    Other(String),
}

impl TranscriptRole {
    pub fn from_wire(role: &str) -> Self {
        match role {
            "user" => TranscriptRole::User,
            "assistant" => TranscriptRole::Assistant,
            other => TranscriptRole::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for TranscriptRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptRole::User => write!(f, "You"),
            TranscriptRole::Assistant => write!(f, "Assistant"),
            TranscriptRole::Other(role) => write!(f, "{}", role),
        }
    }
}

/// Events surfaced from the session to a presentation adapter (TUI or
/// headless printer) via an unbounded mpsc channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected,
    Welcome { session_id: Option<String> },
    Ready,
    Transcript { role: TranscriptRole, content: String },
    Listening,
    Thinking,
    EndOfThought,
    AgentSpeaking,
    AgentFinished,
    FirstAudio,
    BargeIn,
    Interrupted,
    FunctionCalling,
    Unknown(String),
    AgentError(String),
    Closed,
}

/// Aggregate session state broadcast to the presentation layer via a watch
/// channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkState {
    pub connected: bool,
    pub agent_speaking: bool,
    pub mic_muted: bool,
}

/// Commands sent from the presentation layer back to the wiring.
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    SetMicMuted(bool),
    Quit,
}
