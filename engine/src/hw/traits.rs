use serde::Serialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StreamDirection {
    Capture,
    Playback,
}

impl StreamDirection {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Capture => "capture",
            Self::Playback => "playback",
        }
    }
}

impl fmt::Display for StreamDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Running,
    Xrun,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub pollin: bool,
    pub pollout: bool,
}

/// One direction of an already configured, non-blocking interleaved stream.
///
/// Buffers are raw device-native bytes; frame counts are in frames of the
/// stream's own channel count and sample width. A transfer that would block
/// reports `Ok(0)`.
pub trait PcmStream {
    fn available_frames(&mut self) -> Result<i64, String>;
    fn read_frames(&mut self, dst: &mut [u8], frames: usize) -> Result<usize, String>;
    fn write_frames(&mut self, src: &[u8], frames: usize) -> Result<usize, String>;
    fn state(&self) -> StreamState;
}

pub trait ReadinessWait {
    /// `Ok(None)` when the timeout elapsed without any descriptor becoming ready.
    fn wait(&mut self, timeout: Duration) -> Result<Option<Readiness>, String>;
}

/// Reports both directions ready without waiting.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReady;

impl ReadinessWait for AlwaysReady {
    fn wait(&mut self, _timeout: Duration) -> Result<Option<Readiness>, String> {
        Ok(Some(Readiness {
            pollin: true,
            pollout: true,
        }))
    }
}
