use cpal::traits::DeviceTrait;
use cpal::{Device, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Observer};
use ringbuf::HeapCons;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use voxtalk_core::AudioError;

// ── OutputHandle ──────────────────────────────────────────────

#[derive(Clone)]
pub struct OutputHandle {
    errored: Arc<AtomicBool>,
}

impl OutputHandle {
    pub fn has_errored(&self) -> bool {
        self.errored.load(Ordering::Relaxed)
    }
}

// ── OutputNode ────────────────────────────────────────────────

/// Speaker stream. Pulls samples from the ring buffer filled by the
/// playback worker; when the shared `flush` flag is raised (barge-in) the
/// callback discards everything buffered before emitting silence, so
/// interrupted agent audio never reaches the speaker.
pub struct OutputNode {
    _stream: Stream,
}

impl OutputNode {
    pub fn new(
        device: &Device,
        config: &StreamConfig,
        consumer: HeapCons<f32>,
        flush: Arc<AtomicBool>,
    ) -> Result<(Self, OutputHandle), AudioError> {
        let channels = config.channels as usize;
        let consumer = Arc::new(Mutex::new(consumer));
        let errored = Arc::new(AtomicBool::new(false));
        let errored_flag = Arc::clone(&errored);

        let err_callback = move |err: cpal::StreamError| {
            tracing::error!("output stream error: {}", err);
            errored_flag.store(true, Ordering::Relaxed);
        };

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut cons) = consumer.lock() else {
                        data.fill(0.0);
                        return;
                    };
                    if flush.swap(false, Ordering::AcqRel) {
                        let pending = cons.occupied_len();
                        cons.skip(pending);
                        data.fill(0.0);
                        return;
                    }
                    // Mono ring buffer; duplicate across device channels.
                    for frame in data.chunks_mut(channels) {
                        let sample = cons.try_pop().unwrap_or(0.0);
                        frame.fill(sample);
                    }
                },
                err_callback,
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        let handle = OutputHandle { errored };
        Ok((Self { _stream: stream }, handle))
    }
}
