pub mod config;
pub mod error;
pub mod tracker;
pub mod types;
pub mod ui;

pub use config::{AgentConfig, AppConfig, AudioConfig, GeneralConfig};
pub use error::{AudioError, ConfigError, SessionError};
pub use tracker::SpeakingTracker;
pub use types::AudioChunk;
pub use ui::{LinkState, SessionEvent, TranscriptRole, UiCommand};
