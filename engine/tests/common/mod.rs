#![allow(dead_code)]

use duplex_stats_engine::{
    DuplexOptions, PcmStream, Readiness, ReadinessWait, SampleFormat, StreamState,
};
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

/// Scripted stand-in for one direction of a device.
///
/// `available_frames` pops from `avail_script` and falls back to
/// `steady_avail`. Capture reads produce a ramp of raw sample values;
/// playback writes are appended to `written`.
#[derive(Debug)]
pub struct FakeStream {
    pub channels: usize,
    pub format: SampleFormat,
    pub avail_script: VecDeque<i64>,
    pub steady_avail: i64,
    pub max_per_call: usize,
    pub xrun_after_state_calls: Option<usize>,
    pub fail_transfer_call: Option<usize>,
    pub stall_after_transfers: Option<usize>,
    pub avail_calls: usize,
    pub read_calls: usize,
    pub write_calls: usize,
    pub state_calls: Cell<usize>,
    pub frames_read: usize,
    pub frames_written: usize,
    pub written: Vec<u8>,
    pub next_value: i32,
    pub io_probe: Rc<Cell<usize>>,
}

impl FakeStream {
    pub fn new(channels: usize, format: SampleFormat, steady_avail: i64) -> Self {
        Self {
            channels,
            format,
            avail_script: VecDeque::new(),
            steady_avail,
            max_per_call: usize::MAX,
            xrun_after_state_calls: None,
            fail_transfer_call: None,
            stall_after_transfers: None,
            avail_calls: 0,
            read_calls: 0,
            write_calls: 0,
            state_calls: Cell::new(0),
            frames_read: 0,
            frames_written: 0,
            written: Vec::new(),
            next_value: 1,
            io_probe: Rc::new(Cell::new(0)),
        }
    }

    pub fn with_script(mut self, script: &[i64]) -> Self {
        self.avail_script = script.iter().copied().collect();
        self
    }

    pub fn with_max_per_call(mut self, frames: usize) -> Self {
        self.max_per_call = frames;
        self
    }

    pub fn frame_bytes(&self) -> usize {
        self.channels * self.format.bytes()
    }

    /// Raw samples written to playback after skipping `skip_frames`.
    pub fn written_samples(&self, skip_frames: usize) -> Vec<i32> {
        let start = skip_frames * self.frame_bytes();
        let bytes = &self.written[start.min(self.written.len())..];
        (0..bytes.len() / self.format.bytes())
            .map(|i| self.format.read_raw(bytes, i))
            .collect()
    }

    fn touch(&self) {
        self.io_probe.set(self.io_probe.get() + 1);
    }

    /// Frame cap for the current transfer call, or the injected failure.
    fn transfer_call(&mut self) -> Result<usize, String> {
        let call = self.read_calls + self.write_calls;
        if self.fail_transfer_call == Some(call) {
            return Err("Input/output error".to_string());
        }
        match self.stall_after_transfers {
            Some(limit) if call > limit => Ok(0),
            _ => Ok(self.max_per_call),
        }
    }
}

impl PcmStream for FakeStream {
    fn available_frames(&mut self) -> Result<i64, String> {
        self.touch();
        self.avail_calls += 1;
        Ok(self.avail_script.pop_front().unwrap_or(self.steady_avail))
    }

    fn read_frames(&mut self, dst: &mut [u8], frames: usize) -> Result<usize, String> {
        self.touch();
        assert!(frames > 0, "zero-sized read requested");
        self.read_calls += 1;
        let n = frames.min(self.transfer_call()?);
        for i in 0..n * self.channels {
            self.format.write_raw(dst, i, self.next_value);
            self.next_value += 1;
        }
        self.frames_read += n;
        Ok(n)
    }

    fn write_frames(&mut self, src: &[u8], frames: usize) -> Result<usize, String> {
        self.touch();
        assert!(frames > 0, "zero-sized write requested");
        self.write_calls += 1;
        let n = frames.min(self.transfer_call()?);
        self.written
            .extend_from_slice(&src[..n * self.frame_bytes()]);
        self.frames_written += n;
        Ok(n)
    }

    fn state(&self) -> StreamState {
        self.touch();
        let calls = self.state_calls.get() + 1;
        self.state_calls.set(calls);
        match self.xrun_after_state_calls {
            Some(limit) if calls > limit => StreamState::Xrun,
            _ => StreamState::Running,
        }
    }
}

#[derive(Debug, Default)]
pub struct ScriptedReadiness {
    pub script: VecDeque<Option<Readiness>>,
    pub waits: usize,
}

impl ScriptedReadiness {
    pub fn new(script: Vec<Option<Readiness>>) -> Self {
        Self {
            script: script.into(),
            waits: 0,
        }
    }
}

impl ReadinessWait for ScriptedReadiness {
    fn wait(&mut self, _timeout: Duration) -> Result<Option<Readiness>, String> {
        self.waits += 1;
        Ok(self.script.pop_front().unwrap_or(Some(Readiness {
            pollin: true,
            pollout: true,
        })))
    }
}

pub fn both_ready() -> Option<Readiness> {
    Some(Readiness {
        pollin: true,
        pollout: true,
    })
}

pub fn options(period_frames: usize, nperiods: usize, sample_size: usize) -> DuplexOptions {
    DuplexOptions {
        period_frames,
        nperiods,
        sample_size,
        busy_sleep_us: 0,
        ..Default::default()
    }
}
