pub mod error;
pub mod format;
pub mod hw;
pub mod options;
pub mod pacing;
pub mod prefill;
pub mod ring;
pub mod rt;
pub mod stats;

pub use error::{DuplexError, DuplexResult};
pub use format::{Sample, SampleFormat};
pub use hw::traits::{AlwaysReady, PcmStream, Readiness, ReadinessWait, StreamDirection, StreamState};
pub use options::DuplexOptions;
pub use pacing::{PacingLoop, RunOutcome, RunReport};
pub use ring::{ChannelMap, RingBuffer};
pub use stats::{Observation, ReportRow, StatsSampler, Timestamp};
