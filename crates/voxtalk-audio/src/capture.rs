use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::DeviceTrait;
use cpal::{Device, Stream, StreamConfig};
use tokio::sync::mpsc;
use voxtalk_core::{AudioChunk, AudioError, SpeakingTracker};

use crate::pcm;

// ── CaptureGate ───────────────────────────────────────────────

/// Application-level echo suppression: drops mic chunks while the agent is
/// speaking (per the tracker), so the agent's own playback is never sent
/// back upstream as user speech.
pub struct CaptureGate {
    tracker: Arc<SpeakingTracker>,
    suppressing: AtomicBool,
}

impl CaptureGate {
    pub fn new(tracker: Arc<SpeakingTracker>) -> Self {
        Self {
            tracker,
            suppressing: AtomicBool::new(false),
        }
    }

    /// Whether the next chunk may pass. Logs only on transitions so a long
    /// agent utterance produces one line, not one per chunk.
    pub fn allows(&self) -> bool {
        if self.tracker.should_process_audio() {
            if self.suppressing.swap(false, Ordering::Relaxed) {
                tracing::debug!("mic gate reopened");
            }
            true
        } else {
            if !self.suppressing.swap(true, Ordering::Relaxed) {
                tracing::debug!("suppressing mic audio while agent is speaking");
            }
            false
        }
    }

    /// Gate a chunk: `Some` to forward, `None` to drop.
    pub fn filter(&self, chunk: AudioChunk) -> Option<AudioChunk> {
        if self.allows() {
            Some(chunk)
        } else {
            None
        }
    }
}

// ── CaptureHandle ─────────────────────────────────────────────

#[derive(Clone)]
pub struct CaptureHandle {
    muted: Arc<AtomicBool>,
    errored: Arc<AtomicBool>,
}

impl CaptureHandle {
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    pub fn had_error(&self) -> bool {
        self.errored.load(Ordering::Relaxed)
    }
}

// ── CaptureNode ───────────────────────────────────────────────

/// Owns the cpal input stream. Each callback block is downmixed to mono,
/// resampled to the wire rate when needed, gated, and pushed into the
/// outbound queue in capture order.
pub struct CaptureNode {
    _stream: Stream,
}

impl CaptureNode {
    pub fn new(
        device: &Device,
        config: &StreamConfig,
        wire_rate: u32,
        gate: Arc<CaptureGate>,
        tx: mpsc::UnboundedSender<AudioChunk>,
    ) -> Result<(Self, CaptureHandle), AudioError> {
        let muted = Arc::new(AtomicBool::new(false));
        let muted_flag = Arc::clone(&muted);
        let errored = Arc::new(AtomicBool::new(false));
        let errored_flag = Arc::clone(&errored);

        let channels = config.channels;
        let device_rate = config.sample_rate.0;

        let err_callback = move |err: cpal::StreamError| {
            tracing::error!("capture stream error: {}", err);
            errored_flag.store(true, Ordering::Relaxed);
        };

        let stream = device
            .build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if muted_flag.load(Ordering::Relaxed) {
                        return;
                    }
                    let mono = pcm::downmix_to_mono(data, channels);
                    let samples = pcm::resample_nearest(&mono, device_rate, wire_rate);
                    if let Some(chunk) = gate.filter(AudioChunk::mono(samples, wire_rate)) {
                        // Receiver dropped means the session is shutting down.
                        let _ = tx.send(chunk);
                    }
                },
                err_callback,
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        let handle = CaptureHandle { muted, errored };
        Ok((Self { _stream: stream }, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn make_gate(grace_ms: u64) -> (Arc<SpeakingTracker>, CaptureGate) {
        let tracker = Arc::new(SpeakingTracker::new(Duration::from_millis(grace_ms)));
        let gate = CaptureGate::new(Arc::clone(&tracker));
        (tracker, gate)
    }

    fn chunk() -> AudioChunk {
        AudioChunk::mono(vec![0.1; 160], 16000)
    }

    #[test]
    fn test_gate_open_by_default() {
        let (_tracker, gate) = make_gate(100);
        assert!(gate.allows());
        assert!(gate.filter(chunk()).is_some());
    }

    #[test]
    fn test_gate_closes_while_agent_speaks() {
        let (tracker, gate) = make_gate(10_000);
        tracker.mark_speaking_started();
        assert!(!gate.allows());
        assert!(gate.filter(chunk()).is_none());
    }

    #[test]
    fn test_gate_reopens_after_hard_clear() {
        let (tracker, gate) = make_gate(10_000);
        tracker.mark_speaking_started();
        assert!(gate.filter(chunk()).is_none());
        tracker.clear_now();
        assert!(gate.filter(chunk()).is_some());
    }

    #[test]
    fn test_gate_suppression_flag_tracks_transitions() {
        let (tracker, gate) = make_gate(0);
        assert!(gate.allows());
        assert!(!gate.suppressing.load(Ordering::Relaxed));

        tracker.mark_speaking_started();
        assert!(!gate.allows());
        assert!(gate.suppressing.load(Ordering::Relaxed));
        // Repeated suppressed reads keep the flag set (no re-log).
        assert!(!gate.allows());
        assert!(gate.suppressing.load(Ordering::Relaxed));

        tracker.clear_now();
        assert!(gate.allows());
        assert!(!gate.suppressing.load(Ordering::Relaxed));
    }

    #[test]
    fn test_capture_handle_mute_roundtrip() {
        let handle = CaptureHandle {
            muted: Arc::new(AtomicBool::new(false)),
            errored: Arc::new(AtomicBool::new(false)),
        };
        assert!(!handle.is_muted());
        handle.set_muted(true);
        assert!(handle.is_muted());
        let clone = handle.clone();
        clone.set_muted(false);
        assert!(!handle.is_muted());
    }
}
