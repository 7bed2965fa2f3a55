use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ringbuf::traits::Producer;
use ringbuf::HeapProd;
use voxtalk_core::SpeakingTracker;

use crate::pcm;

// ── PlaybackSink ──────────────────────────────────────────────

/// Buffered, interruptible playback of agent audio.
///
/// Producers enqueue decoded sample buffers with [`play`](Self::play); a
/// dedicated worker thread drains the queue into the output ring buffer at
/// the device's pace. [`stop`](Self::stop) is the barge-in path: it discards
/// everything queued, abandons the chunk currently being written, asks the
/// output callback to flush the ring buffer, and clears the speaking state
/// so the mic gate reopens at once. The sink stays usable for the next turn.
#[derive(Clone)]
pub struct PlaybackSink {
    shared: Arc<SinkShared>,
}

struct SinkShared {
    tracker: Arc<SpeakingTracker>,
    queue: Mutex<VecDeque<Vec<f32>>>,
    /// Bumped by `stop()`; the worker abandons any chunk whose generation
    /// no longer matches.
    generation: AtomicU64,
    /// Observed by the output stream callback, which empties the ring
    /// buffer when set.
    flush: Arc<AtomicBool>,
}

impl PlaybackSink {
    pub fn new(tracker: Arc<SpeakingTracker>) -> Self {
        Self {
            shared: Arc::new(SinkShared {
                tracker,
                queue: Mutex::new(VecDeque::new()),
                generation: AtomicU64::new(0),
                flush: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    /// Enqueue a buffer of mono samples at the wire rate. First write of a
    /// turn marks the agent as speaking; repeated writes keep it marked.
    pub fn play(&self, samples: Vec<f32>) {
        if samples.is_empty() {
            return;
        }
        self.shared.tracker.mark_speaking_started();
        self.shared
            .queue
            .lock()
            .expect("playback queue lock poisoned")
            .push_back(samples);
    }

    /// Hard interruption: drop all queued audio and silence the device as
    /// fast as the output callback can observe the flush flag.
    pub fn stop(&self) {
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        self.shared
            .queue
            .lock()
            .expect("playback queue lock poisoned")
            .clear();
        self.shared.flush.store(true, Ordering::Release);
        self.shared.tracker.clear_now();
    }

    pub fn queued_chunks(&self) -> usize {
        self.shared
            .queue
            .lock()
            .expect("playback queue lock poisoned")
            .len()
    }

    /// Flag shared with the output stream callback.
    pub fn flush_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shared.flush)
    }

    /// Spawn the worker thread that drains the queue into `producer`.
    /// `wire_rate` is the rate of enqueued samples, `device_rate` the rate
    /// the output device was opened at.
    pub fn start(
        &self,
        mut producer: HeapProd<f32>,
        wire_rate: u32,
        device_rate: u32,
        poll: Duration,
    ) -> PlaybackWorker {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let shared = Arc::clone(&self.shared);

        let thread = std::thread::Builder::new()
            .name("playback".into())
            .spawn(move || {
                let mut draining = false;
                while flag.load(Ordering::Relaxed) {
                    let generation = shared.generation.load(Ordering::Acquire);
                    let chunk = shared
                        .queue
                        .lock()
                        .expect("playback queue lock poisoned")
                        .pop_front();

                    match chunk {
                        Some(samples) => {
                            draining = true;
                            let samples = if device_rate != wire_rate {
                                pcm::resample_nearest(&samples, wire_rate, device_rate)
                            } else {
                                samples
                            };
                            let mut offset = 0;
                            while offset < samples.len() {
                                if !flag.load(Ordering::Relaxed) {
                                    return;
                                }
                                if shared.generation.load(Ordering::Acquire) != generation {
                                    // Interrupted mid-chunk; abandon the rest.
                                    break;
                                }
                                offset += producer.push_slice(&samples[offset..]);
                                if offset < samples.len() {
                                    std::thread::sleep(poll);
                                }
                            }
                        }
                        None => {
                            if draining {
                                // Queue ran dry: the turn's audio has been
                                // handed to the device, start the grace
                                // window.
                                shared.tracker.mark_speaking_ended();
                                draining = false;
                            }
                            std::thread::sleep(poll);
                        }
                    }
                }
            })
            .expect("failed to spawn playback thread");

        PlaybackWorker {
            running,
            thread: Some(thread),
        }
    }
}

// ── PlaybackWorker ────────────────────────────────────────────

pub struct PlaybackWorker {
    running: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl PlaybackWorker {
    /// Signal the worker to stop and wait for it to finish.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(t) = self.thread.take() {
            t.join().expect("playback thread panicked");
        }
    }
}

impl Drop for PlaybackWorker {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}
