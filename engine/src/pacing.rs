//! The duplex pacing loop.
//!
//! Each cycle checks stream health, optionally waits for readiness, reads
//! whatever capture frames fit into the ring buffer, runs the simulated
//! processing stage for every full chunk, and drains processed frames to
//! playback. Cycles that move no frames are not recorded.

use crate::error::{DuplexError, DuplexResult};
use crate::hw::traits::{PcmStream, Readiness, ReadinessWait, StreamDirection, StreamState};
use crate::options::DuplexOptions;
use crate::prefill::{playback_prefill_frames, prefill_playback};
use crate::ring::{ChannelMap, RingBuffer};
use crate::stats::{Observation, ReportRow, StatsSampler, Timestamp, report_rows};
use std::time::Duration;
use tracing::{debug, error, info, trace};

#[derive(Debug)]
pub enum RunOutcome {
    Completed,
    Aborted(DuplexError),
}

#[derive(Debug)]
pub struct RunReport {
    pub requested: usize,
    pub observations: Vec<Observation>,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed)
    }

    pub fn error(&self) -> Option<&DuplexError> {
        match &self.outcome {
            RunOutcome::Completed => None,
            RunOutcome::Aborted(err) => Some(err),
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = ReportRow> + '_ {
        report_rows(&self.observations)
    }
}

pub struct PacingLoop<C, P, R> {
    options: DuplexOptions,
    capture: C,
    playback: P,
    readiness: R,
    ring: RingBuffer,
    capture_map: ChannelMap,
    playback_map: ChannelMap,
    capture_scratch: Vec<u8>,
    playback_scratch: Vec<u8>,
    capacity: usize,
    processing_frames: usize,
    load_sleep: Duration,
    fill: usize,
    drain: usize,
    cycles: u64,
}

impl<C, P, R> std::fmt::Debug for PacingLoop<C, P, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacingLoop")
            .field("capacity", &self.capacity)
            .field("processing_frames", &self.processing_frames)
            .field("fill", &self.fill)
            .field("drain", &self.drain)
            .field("cycles", &self.cycles)
            .finish()
    }
}

impl<C: PcmStream, P: PcmStream, R: ReadinessWait> PacingLoop<C, P, R> {
    /// Validates `options` and allocates every buffer the run needs.
    /// No stream is touched.
    pub fn new(options: DuplexOptions, capture: C, playback: P, readiness: R) -> DuplexResult<Self> {
        options.validate()?;
        let capacity = options.buffer_frames();
        let capture_map = ChannelMap::new(options.input_channels, options.format);
        let playback_map = ChannelMap::new(options.output_channels, options.format);
        Ok(Self {
            ring: RingBuffer::new(capacity, options.min_channels()),
            capture_scratch: vec![0; capacity * capture_map.frame_bytes()],
            playback_scratch: vec![0; capacity * playback_map.frame_bytes()],
            capture_map,
            playback_map,
            capacity,
            processing_frames: options.processing_frames(),
            load_sleep: options.load_sleep(),
            fill: 0,
            drain: 0,
            cycles: 0,
            options,
            capture,
            playback,
            readiness,
        })
    }

    pub fn options(&self) -> &DuplexOptions {
        &self.options
    }

    pub fn capture(&self) -> &C {
        &self.capture
    }

    pub fn playback(&self) -> &P {
        &self.playback
    }

    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    pub fn fill(&self) -> usize {
        self.fill
    }

    pub fn drain(&self) -> usize {
        self.drain
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn into_parts(self) -> (C, P, R) {
        (self.capture, self.playback, self.readiness)
    }

    /// Writes a full buffer of silence to the freshly opened playback stream.
    pub fn prefill(&mut self) -> DuplexResult<usize> {
        let frames = playback_prefill_frames(self.options.period_frames, self.options.nperiods);
        let written = prefill_playback(
            &mut self.playback,
            &self.playback_scratch,
            self.playback_map.frame_bytes(),
            frames,
        )?;
        debug!("Prefilled playback with {} frames", written);
        Ok(written)
    }

    /// Runs until `sample_size` observations are collected or a stream fails.
    pub fn run(&mut self) -> RunReport {
        let requested = self.options.sample_size;
        let busy_sleep = self.options.busy_sleep();
        let mut sampler = StatsSampler::new(requested);
        let mut sample_index = 0;
        info!(
            "Sampling {} observations: period={} periods={} rate={} format={} channels={}/{} chunk={}",
            requested,
            self.options.period_frames,
            self.options.nperiods,
            self.options.rate,
            self.options.format,
            self.options.input_channels,
            self.options.output_channels,
            self.processing_frames
        );

        let outcome = loop {
            let observation = match self.cycle() {
                Ok(observation) => observation,
                Err(err) => {
                    error!("{} (sample {})", err, sample_index);
                    break RunOutcome::Aborted(err);
                }
            };
            if !observation.valid {
                if !busy_sleep.is_zero() {
                    std::thread::sleep(busy_sleep);
                }
                continue;
            }
            sampler.record(sample_index, observation);
            sample_index += 1;
            if sample_index >= requested {
                break RunOutcome::Completed;
            }
        };

        debug!("Done sampling after {} cycles", self.cycles);
        RunReport {
            requested,
            observations: sampler.finalize(),
            outcome,
        }
    }

    fn cycle(&mut self) -> DuplexResult<Observation> {
        let mut observation = Observation {
            wakeup: Timestamp::now(),
            ..Default::default()
        };

        check_health(&self.playback, StreamDirection::Playback)?;
        check_health(&self.capture, StreamDirection::Capture)?;

        let readiness = if self.options.wait_for_readiness {
            self.wait_ready()?
        } else {
            Readiness::default()
        };
        observation.pollin = readiness.pollin;
        observation.pollout = readiness.pollout;

        let capture_available = query_available(&mut self.capture, StreamDirection::Capture)?;
        observation.capture_available = capture_available;
        let playback_available = query_available(&mut self.playback, StreamDirection::Playback)?;
        observation.playback_available = playback_available;

        let gate = self.options.gate_on_readiness;
        let threshold = self.options.availability_threshold as i64;

        if (!gate || readiness.pollin) && capture_available >= threshold {
            observation.capture_read = self.capture_intake(capture_available as usize)?;
        }

        self.simulate_processing();

        if self.drain > 0 && (!gate || readiness.pollout) && playback_available >= threshold {
            observation.playback_written = self.playback_drain(playback_available as usize)?;
        }

        observation.cycles = self.cycles;
        self.cycles += 1;
        observation.fill = self.fill;
        observation.drain = self.drain;
        observation.valid = observation.moved_frames();
        trace!(?observation, "cycle");
        Ok(observation)
    }

    fn wait_ready(&mut self) -> DuplexResult<Readiness> {
        let timeout = self.options.poll_timeout();
        match self.readiness.wait(timeout) {
            Ok(Some(readiness)) => Ok(readiness),
            Ok(None) => Err(DuplexError::ReadinessTimeout(timeout)),
            Err(message) => Err(DuplexError::Readiness(message)),
        }
    }

    /// Frames the ring can still accept; undrained frames stay reserved.
    fn room(&self) -> usize {
        self.capacity - self.fill - self.drain
    }

    fn capture_intake(&mut self, available: usize) -> DuplexResult<usize> {
        let frames = available.min(self.room());
        if frames == 0 {
            return Ok(0);
        }
        let read = transfer(
            StreamDirection::Capture,
            self.capture_map.frame_bytes(),
            frames,
            |offset, remaining| {
                let dst = &mut self.capture_scratch[offset..];
                self.capture.read_frames(dst, remaining)
            },
        )?;
        if self.options.use_ring_buffer {
            self.ring.push(&self.capture_scratch, self.capture_map, read);
        }
        self.fill += read;
        Ok(read)
    }

    fn simulate_processing(&mut self) {
        while self.fill >= self.processing_frames {
            if !self.load_sleep.is_zero() {
                std::thread::sleep(self.load_sleep);
            }
            self.fill -= self.processing_frames;
            self.drain += self.processing_frames;
        }
    }

    fn playback_drain(&mut self, available: usize) -> DuplexResult<usize> {
        let frames = self.drain.min(available);
        if frames == 0 {
            return Ok(0);
        }
        if self.options.use_ring_buffer {
            self.ring.pop(&mut self.playback_scratch, self.playback_map, frames);
        }
        let written = transfer(
            StreamDirection::Playback,
            self.playback_map.frame_bytes(),
            frames,
            |offset, remaining| {
                let src = &self.playback_scratch[offset..];
                self.playback.write_frames(src, remaining)
            },
        )?;
        self.drain -= written;
        Ok(written)
    }
}

fn check_health(stream: &impl PcmStream, direction: StreamDirection) -> DuplexResult<()> {
    match stream.state() {
        StreamState::Xrun => Err(DuplexError::Xrun { direction }),
        StreamState::Running | StreamState::Other => Ok(()),
    }
}

fn query_available(stream: &mut impl PcmStream, direction: StreamDirection) -> DuplexResult<i64> {
    let available = stream
        .available_frames()
        .map_err(|message| DuplexError::device(direction, "avail_update", message))?;
    if available < 0 {
        return Err(DuplexError::NegativeAvailable {
            direction,
            value: available,
        });
    }
    Ok(available)
}

/// Repeats a device transfer until `frames` frames have moved. A call that
/// moves nothing while frames are still owed ends the run.
fn transfer(
    direction: StreamDirection,
    frame_bytes: usize,
    frames: usize,
    mut call: impl FnMut(usize, usize) -> Result<usize, String>,
) -> DuplexResult<usize> {
    let op = match direction {
        StreamDirection::Capture => "read",
        StreamDirection::Playback => "write",
    };
    let mut moved = 0;
    while moved < frames {
        let remaining = frames - moved;
        let n = call(moved * frame_bytes, remaining)
            .map_err(|message| DuplexError::device(direction, op, message))?;
        if n == 0 {
            return Err(DuplexError::stalled(direction, op, remaining));
        }
        moved += n.min(remaining);
    }
    Ok(moved)
}
