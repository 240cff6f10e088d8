use crate::error::{DuplexError, DuplexResult};
use crate::format::SampleFormat;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DuplexOptions {
    pub device: String,
    pub period_frames: usize,
    pub nperiods: usize,
    pub rate: u32,
    pub input_channels: usize,
    pub output_channels: usize,
    pub format: SampleFormat,
    /// Number of valid observations to collect.
    pub sample_size: usize,
    /// Simulated processing cost as a percentage of one chunk's duration.
    pub load_percent: u32,
    pub busy_sleep_us: u64,
    /// Defaults to `period_frames`.
    pub processing_frames: Option<usize>,
    pub poll_timeout_ms: u32,
    pub availability_threshold: usize,
    pub use_ring_buffer: bool,
    pub wait_for_readiness: bool,
    pub gate_on_readiness: bool,
}

impl Default for DuplexOptions {
    fn default() -> Self {
        Self {
            device: "default".to_string(),
            period_frames: 1024,
            nperiods: 2,
            rate: 48_000,
            input_channels: 2,
            output_channels: 2,
            format: SampleFormat::S32Le,
            sample_size: 1000,
            load_percent: 0,
            busy_sleep_us: 1,
            processing_frames: None,
            poll_timeout_ms: 100,
            availability_threshold: 1,
            use_ring_buffer: true,
            wait_for_readiness: true,
            gate_on_readiness: false,
        }
    }
}

impl DuplexOptions {
    pub fn buffer_frames(&self) -> usize {
        self.period_frames.saturating_mul(self.nperiods)
    }

    pub fn min_channels(&self) -> usize {
        self.input_channels.min(self.output_channels)
    }

    pub fn processing_frames(&self) -> usize {
        self.processing_frames.unwrap_or(self.period_frames)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms as u64)
    }

    pub fn busy_sleep(&self) -> Duration {
        Duration::from_micros(self.busy_sleep_us)
    }

    /// Time spent per processed chunk: `load% * chunk / rate`.
    pub fn load_sleep(&self) -> Duration {
        if self.rate == 0 {
            return Duration::ZERO;
        }
        let nanos = self.processing_frames() as u128 * self.load_percent as u128 * 1_000_000_000
            / (100 * self.rate as u128);
        Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
    }

    pub fn validate(&self) -> DuplexResult<()> {
        let positive = [
            ("period size", self.period_frames),
            ("number of periods", self.nperiods),
            ("input channels", self.input_channels),
            ("output channels", self.output_channels),
            ("sample size", self.sample_size),
            ("availability threshold", self.availability_threshold),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(DuplexError::Config(format!("{name} must be at least 1")));
            }
        }
        if self.rate == 0 {
            return Err(DuplexError::Config("sampling rate must be positive".into()));
        }
        if self.device.trim().is_empty() {
            return Err(DuplexError::Config("device name is empty".into()));
        }
        let buffer_frames = self
            .period_frames
            .checked_mul(self.nperiods)
            .ok_or_else(|| DuplexError::Config("period size * number of periods overflows".into()))?;
        let chunk = self.processing_frames();
        if chunk == 0 {
            return Err(DuplexError::Config("processing chunk must be at least 1 frame".into()));
        }
        if chunk.saturating_mul(2) > buffer_frames {
            return Err(DuplexError::Config(format!(
                "processing chunk of {chunk} frames exceeds half the {buffer_frames}-frame buffer"
            )));
        }
        if self.gate_on_readiness && !self.wait_for_readiness {
            return Err(DuplexError::Config(
                "gating on readiness requires waiting for readiness".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let options = DuplexOptions::default();
        options.validate().unwrap();
        assert_eq!(options.buffer_frames(), 2048);
        assert_eq!(options.processing_frames(), 1024);
    }

    #[test]
    fn chunk_larger_than_half_the_buffer_is_rejected() {
        let options = DuplexOptions {
            processing_frames: Some(1025),
            ..Default::default()
        };
        let err = options.validate().unwrap_err();
        assert!(matches!(err, DuplexError::Config(_)));
        assert!(err.is_startup());

        let options = DuplexOptions {
            processing_frames: Some(1024),
            ..Default::default()
        };
        options.validate().unwrap();
    }

    #[test]
    fn single_period_needs_a_smaller_chunk() {
        let options = DuplexOptions {
            nperiods: 1,
            ..Default::default()
        };
        assert!(options.validate().is_err());

        let options = DuplexOptions {
            nperiods: 1,
            processing_frames: Some(256),
            ..Default::default()
        };
        options.validate().unwrap();
    }

    #[test]
    fn zero_sized_settings_are_rejected() {
        for options in [
            DuplexOptions {
                period_frames: 0,
                ..Default::default()
            },
            DuplexOptions {
                output_channels: 0,
                ..Default::default()
            },
            DuplexOptions {
                sample_size: 0,
                ..Default::default()
            },
            DuplexOptions {
                rate: 0,
                ..Default::default()
            },
            DuplexOptions {
                processing_frames: Some(0),
                ..Default::default()
            },
        ] {
            assert!(options.validate().is_err(), "{options:?}");
        }
    }

    #[test]
    fn gating_without_waiting_is_rejected() {
        let options = DuplexOptions {
            wait_for_readiness: false,
            gate_on_readiness: true,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn load_sleep_scales_with_chunk_duration() {
        let options = DuplexOptions {
            load_percent: 50,
            processing_frames: Some(480),
            ..Default::default()
        };
        assert_eq!(options.load_sleep(), Duration::from_millis(5));
        assert_eq!(DuplexOptions::default().load_sleep(), Duration::ZERO);
    }
}
