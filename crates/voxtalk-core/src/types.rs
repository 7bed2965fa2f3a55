/// A block of mono PCM samples captured from or destined for an audio device.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioChunk {
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
        }
    }

    pub fn duration_ms(&self) -> f32 {
        let frames = self.samples.len() as f32 / self.channels.max(1) as f32;
        frames / self.sample_rate as f32 * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_chunk_mono() {
        let chunk = AudioChunk::mono(vec![0.0, 0.5, -0.5], 16000);
        assert_eq!(chunk.channels, 1);
        assert_eq!(chunk.sample_rate, 16000);
        assert_eq!(chunk.samples.len(), 3);
    }

    #[test]
    fn test_audio_chunk_duration() {
        let chunk = AudioChunk::mono(vec![0.0; 800], 16000);
        assert!((chunk.duration_ms() - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_audio_chunk_duration_guards_zero_channels() {
        let chunk = AudioChunk {
            samples: vec![0.0; 160],
            sample_rate: 16000,
            channels: 0,
        };
        assert!((chunk.duration_ms() - 10.0).abs() < 1e-3);
    }
}
