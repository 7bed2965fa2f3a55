use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Tracks whether the agent is currently producing audio, with a trailing
/// grace window so the mic gate stays closed while the speaker finishes
/// rendering buffered samples.
///
/// Instead of a cancellable timer, the end of speech arms a deadline that is
/// compared against the clock on each read. A new `mark_speaking_started`
/// simply clears the deadline, so an old end-of-speech can never clear an
/// active speaking state.
pub struct SpeakingTracker {
    state: Mutex<TrackerState>,
    grace: Duration,
}

#[derive(Debug)]
struct TrackerState {
    speaking: bool,
    grace_deadline: Option<Instant>,
}

impl SpeakingTracker {
    pub fn new(grace: Duration) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                speaking: false,
                grace_deadline: None,
            }),
            grace,
        }
    }

    /// The agent started producing audio. Takes effect immediately and
    /// invalidates any pending grace deadline.
    pub fn mark_speaking_started(&self) {
        let mut state = self.state.lock().expect("tracker lock poisoned");
        state.speaking = true;
        state.grace_deadline = None;
    }

    /// The agent finished producing audio. The speaking flag stays set until
    /// the grace window elapses.
    pub fn mark_speaking_ended(&self) {
        let mut state = self.state.lock().expect("tracker lock poisoned");
        if state.speaking && state.grace_deadline.is_none() {
            state.grace_deadline = Some(Instant::now() + self.grace);
        }
    }

    /// Hard interrupt: clear the speaking state right now, skipping the
    /// grace window. Used on barge-in.
    pub fn clear_now(&self) {
        let mut state = self.state.lock().expect("tracker lock poisoned");
        state.speaking = false;
        state.grace_deadline = None;
    }

    /// Whether locally captured audio should be forwarded upstream.
    /// Expires the grace deadline lazily.
    pub fn should_process_audio(&self) -> bool {
        let mut state = self.state.lock().expect("tracker lock poisoned");
        if !state.speaking {
            return true;
        }
        match state.grace_deadline {
            Some(deadline) if Instant::now() >= deadline => {
                state.speaking = false;
                state.grace_deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_speaking(&self) -> bool {
        !self.should_process_audio()
    }
}
