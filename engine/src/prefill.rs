use crate::error::{DuplexError, DuplexResult};
use crate::hw::traits::{PcmStream, StreamDirection};

pub fn playback_prefill_frames(period_frames: usize, nperiods: usize) -> usize {
    period_frames.saturating_mul(nperiods.max(1))
}

/// Checks that a freshly opened playback stream has its whole buffer free,
/// then fills it from `silence` (zeroed frames of `frame_bytes` each).
pub fn prefill_playback<P: PcmStream>(
    playback: &mut P,
    silence: &[u8],
    frame_bytes: usize,
    frames: usize,
) -> DuplexResult<usize> {
    let available = playback
        .available_frames()
        .map_err(|message| DuplexError::device(StreamDirection::Playback, "avail", message))?;
    if available < 0 || available as usize != frames {
        return Err(DuplexError::PrefillMismatch {
            expected: frames,
            found: available,
        });
    }
    let mut written = 0;
    while written < frames {
        let remaining = frames - written;
        let chunk = &silence[written * frame_bytes..frames * frame_bytes];
        let n = playback
            .write_frames(chunk, remaining)
            .map_err(|message| DuplexError::device(StreamDirection::Playback, "prefill write", message))?;
        if n == 0 {
            return Err(DuplexError::stalled(StreamDirection::Playback, "prefill write", remaining));
        }
        written += n.min(remaining);
    }
    Ok(written)
}
