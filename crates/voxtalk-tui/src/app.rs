use crossterm::event::{KeyCode, KeyEvent};
use std::collections::VecDeque;
use voxtalk_core::{LinkState, SessionEvent, TranscriptRole, UiCommand};

use crate::log_layer::LogBuffer;

const TRANSCRIPT_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Conversation,
    Logs,
}

/// What the agent is doing right now, derived from session events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentActivity {
    Idle,
    Listening,
    Thinking,
    Speaking,
}

impl AgentActivity {
    pub fn label(&self) -> &'static str {
        match self {
            AgentActivity::Idle => "idle",
            AgentActivity::Listening => "listening",
            AgentActivity::Thinking => "thinking",
            AgentActivity::Speaking => "speaking",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    None,
    Quit,
    Command(UiCommand),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptLine {
    pub role: TranscriptRole,
    pub content: String,
}

pub struct App {
    pub tab: Tab,
    pub link: LinkState,
    pub activity: AgentActivity,
    pub transcript: VecDeque<TranscriptLine>,
    pub notice: Option<String>,
    pub should_quit: bool,
    pub logs: LogBuffer,
    pub log_scroll: usize,
    pub log_auto_scroll: bool,
}

impl App {
    pub fn new(logs: LogBuffer) -> Self {
        Self {
            tab: Tab::Conversation,
            link: LinkState::default(),
            activity: AgentActivity::Idle,
            transcript: VecDeque::new(),
            notice: None,
            should_quit: false,
            logs,
            log_scroll: 0,
            log_auto_scroll: true,
        }
    }

    pub fn update_link(&mut self, link: LinkState) {
        self.link = link;
    }

    pub fn apply_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected => {
                self.notice = Some("connected, speak to begin".to_string());
            }
            SessionEvent::Welcome { session_id } => {
                self.notice = Some(match session_id {
                    Some(id) => format!("session {}", id),
                    None => "session established".to_string(),
                });
            }
            SessionEvent::Ready => {
                self.notice = Some("ready, you can interrupt at any time".to_string());
            }
            SessionEvent::Transcript { role, content } => {
                if self.transcript.len() >= TRANSCRIPT_CAPACITY {
                    self.transcript.pop_front();
                }
                self.transcript.push_back(TranscriptLine { role, content });
            }
            SessionEvent::Listening => self.activity = AgentActivity::Listening,
            SessionEvent::Thinking => self.activity = AgentActivity::Thinking,
            SessionEvent::EndOfThought => {
                self.notice = Some("preparing response".to_string());
            }
            SessionEvent::AgentSpeaking | SessionEvent::FirstAudio => {
                self.activity = AgentActivity::Speaking;
            }
            SessionEvent::AgentFinished => self.activity = AgentActivity::Idle,
            SessionEvent::BargeIn => {
                self.activity = AgentActivity::Listening;
                self.notice = Some("you interrupted the assistant".to_string());
            }
            SessionEvent::Interrupted => {
                self.notice = Some("assistant was interrupted".to_string());
            }
            SessionEvent::FunctionCalling => {
                self.notice = Some("calling a function".to_string());
            }
            SessionEvent::Unknown(raw) => {
                tracing::debug!("unhandled event: {}", raw);
            }
            SessionEvent::AgentError(description) => {
                self.notice = Some(format!("error: {}", description));
            }
            SessionEvent::Closed => {
                self.activity = AgentActivity::Idle;
                self.notice = Some("connection closed".to_string());
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> AppAction {
        // Global keys
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                return AppAction::Quit;
            }
            KeyCode::Char('m') => {
                return AppAction::Command(UiCommand::SetMicMuted(!self.link.mic_muted));
            }
            KeyCode::Char('1') => {
                self.tab = Tab::Conversation;
                return AppAction::None;
            }
            KeyCode::Char('2') => {
                self.tab = Tab::Logs;
                return AppAction::None;
            }
            _ => {}
        }

        match self.tab {
            Tab::Logs => self.handle_logs_key(key),
            Tab::Conversation => AppAction::None,
        }
    }

    fn handle_logs_key(&mut self, key: KeyEvent) -> AppAction {
        match key.code {
            KeyCode::Up => {
                self.log_scroll = self.log_scroll.saturating_add(1);
                self.log_auto_scroll = false;
                AppAction::None
            }
            KeyCode::Down => {
                self.log_scroll = self.log_scroll.saturating_sub(1);
                AppAction::None
            }
            KeyCode::Char('G') => {
                self.log_scroll = 0;
                self.log_auto_scroll = true;
                AppAction::None
            }
            _ => AppAction::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::sync::{Arc, Mutex};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn make_app() -> App {
        App::new(Arc::new(Mutex::new(VecDeque::new())))
    }

    #[test]
    fn test_app_initial_state() {
        let app = make_app();
        assert_eq!(app.tab, Tab::Conversation);
        assert_eq!(app.activity, AgentActivity::Idle);
        assert!(app.transcript.is_empty());
        assert!(!app.should_quit);
        assert!(app.log_auto_scroll);
    }

    #[test]
    fn test_app_tab_switching() {
        let mut app = make_app();
        app.handle_key(key(KeyCode::Char('2')));
        assert_eq!(app.tab, Tab::Logs);
        app.handle_key(key(KeyCode::Char('1')));
        assert_eq!(app.tab, Tab::Conversation);
    }

    #[test]
    fn test_app_quit() {
        let mut app = make_app();
        let action = app.handle_key(key(KeyCode::Char('q')));
        assert_eq!(action, AppAction::Quit);
        assert!(app.should_quit);
    }

    #[test]
    fn test_app_mute_toggle() {
        let mut app = make_app();
        let action = app.handle_key(key(KeyCode::Char('m')));
        assert_eq!(action, AppAction::Command(UiCommand::SetMicMuted(true)));

        app.update_link(LinkState {
            mic_muted: true,
            ..Default::default()
        });
        let action = app.handle_key(key(KeyCode::Char('m')));
        assert_eq!(action, AppAction::Command(UiCommand::SetMicMuted(false)));
    }

    #[test]
    fn test_transcript_accumulates() {
        let mut app = make_app();
        app.apply_event(SessionEvent::Transcript {
            role: TranscriptRole::User,
            content: "hello".to_string(),
        });
        app.apply_event(SessionEvent::Transcript {
            role: TranscriptRole::Assistant,
            content: "hi there".to_string(),
        });
        assert_eq!(app.transcript.len(), 2);
        assert_eq!(app.transcript[0].role, TranscriptRole::User);
        assert_eq!(app.transcript[1].content, "hi there");
    }

    #[test]
    fn test_transcript_bounded() {
        let mut app = make_app();
        for i in 0..(TRANSCRIPT_CAPACITY + 10) {
            app.apply_event(SessionEvent::Transcript {
                role: TranscriptRole::User,
                content: format!("line {}", i),
            });
        }
        assert_eq!(app.transcript.len(), TRANSCRIPT_CAPACITY);
        assert_eq!(app.transcript[0].content, "line 10");
    }

    #[test]
    fn test_activity_follows_events() {
        let mut app = make_app();
        app.apply_event(SessionEvent::Listening);
        assert_eq!(app.activity, AgentActivity::Listening);
        app.apply_event(SessionEvent::Thinking);
        assert_eq!(app.activity, AgentActivity::Thinking);
        app.apply_event(SessionEvent::AgentSpeaking);
        assert_eq!(app.activity, AgentActivity::Speaking);
        app.apply_event(SessionEvent::AgentFinished);
        assert_eq!(app.activity, AgentActivity::Idle);
    }

    #[test]
    fn test_barge_in_switches_to_listening() {
        let mut app = make_app();
        app.apply_event(SessionEvent::AgentSpeaking);
        app.apply_event(SessionEvent::BargeIn);
        assert_eq!(app.activity, AgentActivity::Listening);
        assert!(app.notice.as_deref().unwrap().contains("interrupted"));
    }

    #[test]
    fn test_app_log_scroll() {
        let mut app = make_app();
        app.tab = Tab::Logs;

        app.handle_key(key(KeyCode::Up));
        assert_eq!(app.log_scroll, 1);
        assert!(!app.log_auto_scroll);

        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.log_scroll, 0);

        app.handle_key(key(KeyCode::Up));
        app.handle_key(key(KeyCode::Up));
        app.handle_key(key(KeyCode::Char('G')));
        assert_eq!(app.log_scroll, 0);
        assert!(app.log_auto_scroll);
    }
}
