use crate::format::{Sample, SampleFormat};

/// Layout of a device-side interleaved batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMap {
    pub device_channels: usize,
    pub format: SampleFormat,
}

impl ChannelMap {
    pub fn new(device_channels: usize, format: SampleFormat) -> Self {
        Self {
            device_channels,
            format,
        }
    }

    pub fn frame_bytes(&self) -> usize {
        self.device_channels * self.format.bytes()
    }
}

/// Fixed-capacity circular store of normalized frames.
///
/// Cells are interleaved over the ring's own channel count (the minimum of
/// the capture and playback channel counts): cell `frame * channels + ch`.
/// Device channels beyond that count are never read or written.
#[derive(Debug)]
pub struct RingBuffer {
    cells: Box<[Sample]>,
    capacity: usize,
    channels: usize,
    head: usize,
    tail: usize,
    fill: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize, channels: usize) -> Self {
        let capacity = capacity.max(1);
        let channels = channels.max(1);
        Self {
            cells: vec![0.0; capacity * channels].into_boxed_slice(),
            capacity,
            channels,
            head: 0,
            tail: 0,
            fill: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn tail(&self) -> usize {
        self.tail
    }

    pub fn room(&self) -> usize {
        self.capacity - self.fill
    }

    pub fn available(&self) -> usize {
        self.fill
    }

    pub fn is_empty(&self) -> bool {
        self.fill == 0
    }

    /// Decodes `count` frames from `batch` into the ring at `head`.
    ///
    /// Panics when `count > room()`; callers clamp beforehand.
    pub fn push(&mut self, batch: &[u8], map: ChannelMap, count: usize) {
        assert!(
            count <= self.room(),
            "ring push of {count} frames exceeds room {}",
            self.room()
        );
        assert!(map.device_channels >= self.channels);
        for frame in 0..count {
            let cell = ((self.head + frame) % self.capacity) * self.channels;
            let src = frame * map.device_channels;
            for ch in 0..self.channels {
                self.cells[cell + ch] = map.format.decode(batch, src + ch);
            }
        }
        self.head = (self.head + count) % self.capacity;
        self.fill += count;
    }

    /// Encodes `count` frames from `tail` into `batch`.
    ///
    /// Panics when `count > available()`.
    pub fn pop(&mut self, batch: &mut [u8], map: ChannelMap, count: usize) {
        assert!(
            count <= self.fill,
            "ring pop of {count} frames exceeds fill {}",
            self.fill
        );
        assert!(map.device_channels >= self.channels);
        for frame in 0..count {
            let cell = ((self.tail + frame) % self.capacity) * self.channels;
            let dst = frame * map.device_channels;
            for ch in 0..self.channels {
                map.format.encode(batch, dst + ch, self.cells[cell + ch]);
            }
        }
        self.tail = (self.tail + count) % self.capacity;
        self.fill -= count;
    }
}
