use super::error_fmt::{open_error, param_error, poll_error};
use super::traits::{PcmStream, Readiness, ReadinessWait, StreamDirection, StreamState};
use crate::format::SampleFormat;
use crate::options::DuplexOptions;
use alsa::pcm::{Access, Format, Frames, HwParams, PCM, State};
use alsa::poll::{Flags, pollfd};
use alsa::{Direction, PollDescriptors, ValueOr};
use nix::libc;
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

pub struct AlsaStream {
    pcm: Rc<PCM>,
    direction: StreamDirection,
    channels: usize,
    format: SampleFormat,
}

impl std::fmt::Debug for AlsaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlsaStream")
            .field("direction", &self.direction)
            .field("channels", &self.channels)
            .field("format", &self.format)
            .finish()
    }
}

impl AlsaStream {
    pub fn direction(&self) -> StreamDirection {
        self.direction
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    fn frame_bytes(&self) -> usize {
        self.channels * self.format.bytes()
    }
}

impl PcmStream for AlsaStream {
    fn available_frames(&mut self) -> Result<i64, String> {
        self.pcm
            .avail_update()
            .map(|frames| frames as i64)
            .map_err(|e| e.to_string())
    }

    fn read_frames(&mut self, dst: &mut [u8], frames: usize) -> Result<usize, String> {
        let bytes = frames * self.frame_bytes();
        let dst = dst
            .get_mut(..bytes)
            .ok_or_else(|| format!("buffer too small for {frames} frames"))?;
        match self.pcm.io_bytes().readi(dst) {
            Ok(read) => Ok(read),
            Err(e) if e.errno() == libc::EAGAIN => Ok(0),
            Err(e) => Err(e.to_string()),
        }
    }

    fn write_frames(&mut self, src: &[u8], frames: usize) -> Result<usize, String> {
        let bytes = frames * self.frame_bytes();
        let src = src
            .get(..bytes)
            .ok_or_else(|| format!("buffer too small for {frames} frames"))?;
        match self.pcm.io_bytes().writei(src) {
            Ok(written) => Ok(written),
            Err(e) if e.errno() == libc::EAGAIN => Ok(0),
            Err(e) => Err(e.to_string()),
        }
    }

    fn state(&self) -> StreamState {
        match self.pcm.state() {
            State::Running => StreamState::Running,
            State::XRun => StreamState::Xrun,
            _ => StreamState::Other,
        }
    }
}

/// Polls the playback and capture descriptors together.
pub struct AlsaReadiness {
    playback: Rc<PCM>,
    capture: Rc<PCM>,
    playback_count: usize,
    fds: Vec<pollfd>,
}

impl std::fmt::Debug for AlsaReadiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlsaReadiness")
            .field("playback_count", &self.playback_count)
            .field("fds", &self.fds.len())
            .finish()
    }
}

impl AlsaReadiness {
    fn new(playback: Rc<PCM>, capture: Rc<PCM>) -> Result<Self, String> {
        let playback_count = PollDescriptors::count(playback.as_ref());
        if playback_count < 1 {
            return Err("ALSA playback exposes no poll descriptors".to_string());
        }
        let capture_count = PollDescriptors::count(capture.as_ref());
        if capture_count < 1 {
            return Err("ALSA capture exposes no poll descriptors".to_string());
        }
        let empty = pollfd {
            fd: -1,
            events: 0,
            revents: 0,
        };
        Ok(Self {
            playback,
            capture,
            playback_count,
            fds: vec![empty; playback_count + capture_count],
        })
    }
}

impl ReadinessWait for AlsaReadiness {
    fn wait(&mut self, timeout: Duration) -> Result<Option<Readiness>, String> {
        let playback_count = self.playback_count;
        {
            let (playback_fds, capture_fds) = self.fds.split_at_mut(playback_count);
            let filled = PollDescriptors::fill(self.playback.as_ref(), playback_fds)
                .map_err(|e| poll_error(StreamDirection::Playback, "poll descriptors", e))?;
            if filled != playback_fds.len() {
                return Err(format!(
                    "ALSA playback filled {filled} of {} poll descriptors",
                    playback_fds.len()
                ));
            }
            let filled = PollDescriptors::fill(self.capture.as_ref(), capture_fds)
                .map_err(|e| poll_error(StreamDirection::Capture, "poll descriptors", e))?;
            if filled != capture_fds.len() {
                return Err(format!(
                    "ALSA capture filled {filled} of {} poll descriptors",
                    capture_fds.len()
                ));
            }
        }

        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;
        let ready = alsa::poll::poll(&mut self.fds, timeout_ms).map_err(|e| e.to_string())?;
        if ready == 0 {
            return Ok(None);
        }

        let (playback_fds, capture_fds) = self.fds.split_at(playback_count);
        let playback_events = PollDescriptors::revents(self.playback.as_ref(), playback_fds)
            .map_err(|e| poll_error(StreamDirection::Playback, "revents", e))?;
        let capture_events = PollDescriptors::revents(self.capture.as_ref(), capture_fds)
            .map_err(|e| poll_error(StreamDirection::Capture, "revents", e))?;
        Ok(Some(Readiness {
            pollin: capture_events.contains(Flags::IN),
            pollout: playback_events.contains(Flags::OUT),
        }))
    }
}

#[derive(Debug)]
pub struct AlsaDuplex {
    pub capture: AlsaStream,
    pub playback: AlsaStream,
    pub readiness: AlsaReadiness,
}

/// Opens, configures and links both directions of `options.device`.
pub fn open_duplex(options: &DuplexOptions) -> Result<AlsaDuplex, String> {
    let playback = open_stream(options, StreamDirection::Playback)?;
    let capture = open_stream(options, StreamDirection::Capture)?;
    playback
        .pcm
        .link(&capture.pcm)
        .map_err(|e| format!("Failed to link ALSA playback and capture: {e}"))?;
    let readiness = AlsaReadiness::new(playback.pcm.clone(), capture.pcm.clone())?;
    Ok(AlsaDuplex {
        capture,
        playback,
        readiness,
    })
}

fn open_stream(options: &DuplexOptions, direction: StreamDirection) -> Result<AlsaStream, String> {
    let (alsa_direction, channels) = match direction {
        StreamDirection::Capture => (Direction::Capture, options.input_channels),
        StreamDirection::Playback => (Direction::Playback, options.output_channels),
    };
    let pcm = PCM::new(&options.device, alsa_direction, true)
        .map_err(|e| open_error(direction, &options.device, e))?;
    configure_pcm(&pcm, direction, options, channels)?;
    Ok(AlsaStream {
        pcm: Rc::new(pcm),
        direction,
        channels,
        format: options.format,
    })
}

fn configure_pcm(
    pcm: &PCM,
    direction: StreamDirection,
    options: &DuplexOptions,
    channels: usize,
) -> Result<(), String> {
    let period_frames = options.period_frames as Frames;
    let buffer_frames = options.buffer_frames() as Frames;
    {
        let hwp = HwParams::any(pcm).map_err(|e| param_error(direction, "hw_params_any", e))?;
        hwp.set_channels(channels as u32)
            .map_err(|e| param_error(direction, "set_channels", e))?;
        hwp.set_access(Access::RWInterleaved)
            .map_err(|e| param_error(direction, "set_access", e))?;
        hwp.set_format(alsa_format(options.format))
            .map_err(|e| param_error(direction, "set_format", e))?;
        hwp.set_rate(options.rate, ValueOr::Nearest)
            .map_err(|e| param_error(direction, &format!("set_rate ({})", options.rate), e))?;
        hwp.set_buffer_size(buffer_frames)
            .map_err(|e| param_error(direction, "set_buffer_size", e))?;
        hwp.set_period_size(period_frames, ValueOr::Nearest)
            .map_err(|e| param_error(direction, &format!("set_period_size ({period_frames})"), e))?;
        pcm.hw_params(&hwp)
            .map_err(|e| param_error(direction, "hw_params", e))?;
    }

    let swp = pcm
        .sw_params_current()
        .map_err(|e| param_error(direction, "sw_params_current", e))?;
    swp.set_avail_min(period_frames)
        .map_err(|e| param_error(direction, "set_avail_min", e))?;
    swp.set_start_threshold(period_frames)
        .map_err(|e| param_error(direction, "set_start_threshold", e))?;
    pcm.sw_params(&swp)
        .map_err(|e| param_error(direction, "sw_params", e))?;

    let cur = pcm
        .hw_params_current()
        .map_err(|e| param_error(direction, "hw_params_current", e))?;
    debug!(
        "ALSA {} configured: channels={} format={} rate={:?} period={:?} buffer={:?}",
        direction,
        channels,
        options.format,
        cur.get_rate().ok(),
        cur.get_period_size().ok(),
        cur.get_buffer_size().ok()
    );
    Ok(())
}

fn alsa_format(format: SampleFormat) -> Format {
    match format {
        SampleFormat::S16Le => Format::S16LE,
        SampleFormat::S32Le => Format::S32LE,
    }
}
