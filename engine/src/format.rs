//! Conversion between device-native interleaved integer samples and the
//! normalized floating point values kept in the ring buffer.

use crate::error::DuplexError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Normalized sample in `[-1, 1]`. Double precision keeps S32 round trips exact.
pub type Sample = f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SampleFormat {
    #[serde(rename = "S16LE", alias = "s16le")]
    S16Le,
    #[default]
    #[serde(rename = "S32LE", alias = "s32le")]
    S32Le,
}

impl SampleFormat {
    pub const fn bytes(self) -> usize {
        match self {
            Self::S16Le => 2,
            Self::S32Le => 4,
        }
    }

    pub const fn max_magnitude(self) -> i32 {
        match self {
            Self::S16Le => i16::MAX as i32,
            Self::S32Le => i32::MAX,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::S16Le => "S16LE",
            Self::S32Le => "S32LE",
        }
    }

    pub fn to_normalized(self, raw: i32) -> Sample {
        raw as Sample / self.max_magnitude() as Sample
    }

    /// Saturates outside `[-1, 1]`; NaN maps to zero.
    pub fn from_normalized(self, value: Sample) -> i32 {
        let max = self.max_magnitude() as Sample;
        (value.clamp(-1.0, 1.0) * max).round() as i32
    }

    /// Reads the `index`-th sample of an interleaved little-endian buffer.
    pub fn read_raw(self, src: &[u8], index: usize) -> i32 {
        let o = index * self.bytes();
        match self {
            Self::S16Le => i16::from_le_bytes([src[o], src[o + 1]]) as i32,
            Self::S32Le => i32::from_le_bytes([src[o], src[o + 1], src[o + 2], src[o + 3]]),
        }
    }

    pub fn write_raw(self, dst: &mut [u8], index: usize, raw: i32) {
        let o = index * self.bytes();
        match self {
            Self::S16Le => {
                let v = raw.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
                dst[o..o + 2].copy_from_slice(&v.to_le_bytes());
            }
            Self::S32Le => dst[o..o + 4].copy_from_slice(&raw.to_le_bytes()),
        }
    }

    pub fn decode(self, src: &[u8], index: usize) -> Sample {
        self.to_normalized(self.read_raw(src, index))
    }

    pub fn encode(self, dst: &mut [u8], index: usize, value: Sample) {
        self.write_raw(dst, index, self.from_normalized(value));
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleFormat {
    type Err = DuplexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('_', "").as_str() {
            "S16LE" => Ok(Self::S16Le),
            "S32LE" => Ok(Self::S32Le),
            _ => Err(DuplexError::UnsupportedFormat(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn narrow_round_trip_is_exact_except_most_negative() {
        let format = SampleFormat::S16Le;
        for x in (i16::MIN as i32 + 1)..=(i16::MAX as i32) {
            assert_eq!(format.from_normalized(format.to_normalized(x)), x);
        }
        let min = i16::MIN as i32;
        let back = format.from_normalized(format.to_normalized(min));
        assert!((back - min).abs() <= 1);
    }

    #[test]
    fn wide_round_trip_within_one_lsb() {
        let format = SampleFormat::S32Le;
        let mut x = i32::MIN as i64;
        while x <= i32::MAX as i64 {
            let raw = x as i32;
            let back = format.from_normalized(format.to_normalized(raw));
            assert!(
                (back as i64 - raw as i64).abs() <= 1,
                "{raw} came back as {back}"
            );
            x += 65_521;
        }
        for raw in [i32::MAX, i32::MAX - 1, -1, 0, 1, i32::MIN + 1] {
            assert_eq!(format.from_normalized(format.to_normalized(raw)), raw);
        }
    }

    #[test]
    fn normalization_is_monotonic() {
        let format = SampleFormat::S16Le;
        let mut previous = format.to_normalized(i16::MIN as i32);
        for x in (i16::MIN as i32 + 1)..=(i16::MAX as i32) {
            let current = format.to_normalized(x);
            assert!(current > previous);
            previous = current;
        }
    }

    #[test]
    fn full_scale_maps_to_unit_range() {
        assert_abs_diff_eq!(SampleFormat::S16Le.to_normalized(32767), 1.0);
        assert_abs_diff_eq!(SampleFormat::S32Le.to_normalized(i32::MAX), 1.0);
        assert_abs_diff_eq!(SampleFormat::S32Le.to_normalized(-i32::MAX), -1.0);
    }

    #[test]
    fn out_of_range_values_saturate() {
        assert_eq!(SampleFormat::S16Le.from_normalized(1.5), 32767);
        assert_eq!(SampleFormat::S16Le.from_normalized(-3.0), -32767);
        assert_eq!(SampleFormat::S32Le.from_normalized(2.0), i32::MAX);
        assert_eq!(SampleFormat::S32Le.from_normalized(Sample::NAN), 0);
    }

    #[test]
    fn interleaved_bytes_are_little_endian() {
        let mut buf = vec![0_u8; 8];
        SampleFormat::S16Le.write_raw(&mut buf, 1, -2);
        assert_eq!(&buf[2..4], &[0xFE, 0xFF]);
        assert_eq!(SampleFormat::S16Le.read_raw(&buf, 1), -2);

        SampleFormat::S32Le.write_raw(&mut buf, 1, 0x0102_0304);
        assert_eq!(&buf[4..8], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(SampleFormat::S32Le.read_raw(&buf, 1), 0x0102_0304);
    }

    #[test]
    fn parses_device_format_names() {
        assert_eq!("S16LE".parse::<SampleFormat>().unwrap(), SampleFormat::S16Le);
        assert_eq!("s32_le".parse::<SampleFormat>().unwrap(), SampleFormat::S32Le);
        let err = "FLOAT_LE".parse::<SampleFormat>().unwrap_err();
        assert!(matches!(err, DuplexError::UnsupportedFormat(ref s) if s == "FLOAT_LE"));
        assert!(err.is_startup());
    }
}
