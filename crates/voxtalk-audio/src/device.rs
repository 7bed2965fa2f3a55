use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host, SampleFormat, SampleRate, StreamConfig, SupportedStreamConfigRange};
use voxtalk_core::AudioError;

pub struct DeviceManager {
    host: Host,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn get_input_device(&self, name: &str) -> Result<Device, AudioError> {
        if name == "default" {
            return self
                .host
                .default_input_device()
                .ok_or_else(|| AudioError::DeviceNotFound("no default input device".to_string()));
        }
        let devices = self
            .host
            .input_devices()
            .map_err(|e| AudioError::DeviceEnumeration(e.to_string()))?;
        find_by_name(devices, name)
            .ok_or_else(|| AudioError::DeviceNotFound(format!("input device not found: {}", name)))
    }

    pub fn list_input_devices(&self) -> Result<Vec<(String, Device)>, AudioError> {
        let devices = self
            .host
            .input_devices()
            .map_err(|e| AudioError::DeviceEnumeration(e.to_string()))?;
        Ok(devices
            .filter_map(|d| d.name().ok().map(|n| (n, d)))
            .collect())
    }

    pub fn list_output_devices(&self) -> Result<Vec<(String, Device)>, AudioError> {
        let devices = self
            .host
            .output_devices()
            .map_err(|e| AudioError::DeviceEnumeration(e.to_string()))?;
        Ok(devices
            .filter_map(|d| d.name().ok().map(|n| (n, d)))
            .collect())
    }

    pub fn get_output_device(&self, name: &str) -> Result<Device, AudioError> {
        if name == "default" {
            return self
                .host
                .default_output_device()
                .ok_or_else(|| AudioError::DeviceNotFound("no default output device".to_string()));
        }
        let devices = self
            .host
            .output_devices()
            .map_err(|e| AudioError::DeviceEnumeration(e.to_string()))?;
        find_by_name(devices, name)
            .ok_or_else(|| AudioError::DeviceNotFound(format!("output device not found: {}", name)))
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

fn find_by_name(devices: impl Iterator<Item = Device>, name: &str) -> Option<Device> {
    let mut devices = devices;
    devices.find(|d| d.name().map(|n| n == name).unwrap_or(false))
}

/// Pick an input stream config, preferring f32 samples at the wire rate.
/// Falls back to the closest supported rate; the capture path resamples when
/// the device cannot open at `preferred_rate`. `buffer_frames` is expressed
/// at the wire rate and scaled to the device rate.
pub fn negotiate_input_config(
    device: &Device,
    preferred_rate: u32,
    buffer_frames: u32,
) -> Result<StreamConfig, AudioError> {
    let supported: Vec<_> = device
        .supported_input_configs()
        .map_err(|e| AudioError::NoStreamConfig(e.to_string()))?
        .collect();
    select_stream_config(&supported, preferred_rate, buffer_frames)
}

/// Output counterpart of [`negotiate_input_config`]. The chosen channel
/// count is kept (capped at 2); the output callback duplicates the mono
/// signal across channels, so a stereo-only device still works.
pub fn negotiate_output_config(
    device: &Device,
    preferred_rate: u32,
    buffer_frames: u32,
) -> Result<StreamConfig, AudioError> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::NoStreamConfig(e.to_string()))?
        .collect();
    select_stream_config(&supported, preferred_rate, buffer_frames)
}

fn select_stream_config(
    supported: &[SupportedStreamConfigRange],
    preferred_rate: u32,
    buffer_frames: u32,
) -> Result<StreamConfig, AudioError> {
    let candidates: Vec<_> = supported.iter().filter(|c| c.channels() <= 2).collect();

    let chosen = candidates
        .iter()
        .find(|c| c.sample_format() == SampleFormat::F32)
        .or_else(|| candidates.first())
        .ok_or_else(|| AudioError::NoStreamConfig("no config with <=2 channels".into()))?;

    let rate = clamp_rate(preferred_rate, chosen.min_sample_rate().0, chosen.max_sample_rate().0);
    let buffer = scale_buffer(buffer_frames, preferred_rate, rate);

    Ok(StreamConfig {
        channels: chosen.channels().min(2),
        sample_rate: SampleRate(rate),
        buffer_size: cpal::BufferSize::Fixed(buffer),
    })
}

fn clamp_rate(preferred: u32, min: u32, max: u32) -> u32 {
    preferred.clamp(min, max)
}

fn scale_buffer(frames: u32, from_rate: u32, to_rate: u32) -> u32 {
    if from_rate == to_rate {
        frames
    } else {
        ((frames as u64 * to_rate as u64) / from_rate as u64).max(1) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpal::SupportedBufferSize;

    fn range(
        channels: u16,
        min_rate: u32,
        max_rate: u32,
        format: SampleFormat,
    ) -> SupportedStreamConfigRange {
        SupportedStreamConfigRange::new(
            channels,
            SampleRate(min_rate),
            SampleRate(max_rate),
            SupportedBufferSize::Range { min: 64, max: 4096 },
            format,
        )
    }

    #[test]
    fn test_select_keeps_stereo_channel_count() {
        // Hardware that only exposes stereo configs must still negotiate;
        // the output callback spreads the mono signal across channels.
        let supported = vec![range(2, 8000, 48000, SampleFormat::F32)];
        let config = select_stream_config(&supported, 16000, 800).unwrap();
        assert_eq!(config.channels, 2);
        assert_eq!(config.sample_rate, SampleRate(16000));
    }

    #[test]
    fn test_select_prefers_f32_format() {
        let supported = vec![
            range(1, 8000, 48000, SampleFormat::I16),
            range(2, 8000, 48000, SampleFormat::F32),
        ];
        let config = select_stream_config(&supported, 16000, 800).unwrap();
        assert_eq!(config.channels, 2);
    }

    #[test]
    fn test_select_falls_back_to_non_f32() {
        let supported = vec![range(1, 8000, 48000, SampleFormat::I16)];
        let config = select_stream_config(&supported, 16000, 800).unwrap();
        assert_eq!(config.channels, 1);
    }

    #[test]
    fn test_select_clamps_rate_and_scales_buffer() {
        let supported = vec![range(2, 44100, 48000, SampleFormat::F32)];
        let config = select_stream_config(&supported, 16000, 800).unwrap();
        assert_eq!(config.sample_rate, SampleRate(44100));
        // 50 ms at 16 kHz becomes 50 ms at 44.1 kHz.
        assert_eq!(config.buffer_size, cpal::BufferSize::Fixed(2205));
    }

    #[test]
    fn test_select_skips_surround_configs() {
        let supported = vec![
            range(6, 8000, 48000, SampleFormat::F32),
            range(2, 8000, 48000, SampleFormat::F32),
        ];
        let config = select_stream_config(&supported, 16000, 800).unwrap();
        assert_eq!(config.channels, 2);
    }

    #[test]
    fn test_select_errors_when_only_surround() {
        let supported = vec![range(6, 8000, 48000, SampleFormat::F32)];
        assert!(matches!(
            select_stream_config(&supported, 16000, 800),
            Err(AudioError::NoStreamConfig(_))
        ));
    }

    #[test]
    fn test_clamp_rate_within_range() {
        assert_eq!(clamp_rate(16000, 8000, 48000), 16000);
    }

    #[test]
    fn test_clamp_rate_below_min() {
        assert_eq!(clamp_rate(16000, 44100, 48000), 44100);
    }

    #[test]
    fn test_clamp_rate_above_max() {
        assert_eq!(clamp_rate(96000, 8000, 48000), 48000);
    }

    #[test]
    fn test_scale_buffer_identity() {
        assert_eq!(scale_buffer(800, 16000, 16000), 800);
    }

    #[test]
    fn test_scale_buffer_up() {
        // 50 ms at 16 kHz should stay 50 ms at 48 kHz.
        assert_eq!(scale_buffer(800, 16000, 48000), 2400);
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn test_default_devices_resolve() {
        let manager = DeviceManager::new();
        manager.get_input_device("default").unwrap();
        manager.get_output_device("default").unwrap();
    }
}
