pub mod capture;
pub mod device;
pub mod output;
pub mod pcm;
pub mod playback;

pub use capture::{CaptureGate, CaptureHandle, CaptureNode};
pub use device::DeviceManager;
pub use output::{OutputHandle, OutputNode};
pub use playback::{PlaybackSink, PlaybackWorker};

use ringbuf::traits::Split;
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Create a ring buffer split into producer and consumer halves.
pub fn create_ring_buffer(capacity: usize) -> (HeapProd<f32>, HeapCons<f32>) {
    HeapRb::<f32>::new(capacity).split()
}
