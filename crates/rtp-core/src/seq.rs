//! Wraparound-aware sequence number and timestamp arithmetic
//!
//! RTP sequence numbers (16 bit) and timestamps (32 bit) are modular
//! counters. Comparisons between two values take the shortest way around
//! the circle; unwrapping extends a run of values into a monotonic 64-bit
//! space relative to the previously seen value.

use crate::{RtpSequenceNumber, RtpTimestamp};

/// Half of the sequence number space
pub const SEQ_HALF_RANGE: i64 = 1 << 15;

/// Signed distance from `from` to `to`, in `-32768..=32767`
///
/// A distance of exactly half the space is ambiguous and reported as
/// `-32768`; [`SequenceUnwrapper`] resolves it with the timestamp.
pub fn seq_delta(from: RtpSequenceNumber, to: RtpSequenceNumber) -> i64 {
    i64::from(to.wrapping_sub(from) as i16)
}

/// Signed distance between two RTP timestamps, in `i32` range
pub fn timestamp_delta(from: RtpTimestamp, to: RtpTimestamp) -> i64 {
    i64::from(to.wrapping_sub(from) as i32)
}

/// Extends 16-bit sequence numbers to a monotonic 64-bit space
///
/// Each value is placed at the candidate closest to the previous packet's
/// extended value. When the step is exactly half the space, the sign of the
/// timestamp difference decides the direction; a zero difference counts as
/// forward, so the later arrival becomes the later packet.
#[derive(Debug, Clone, Default)]
pub struct SequenceUnwrapper {
    last: Option<(i64, RtpSequenceNumber, RtpTimestamp)>,
}

impl SequenceUnwrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend `seq`, carried with RTP timestamp `timestamp`
    pub fn unwrap(&mut self, seq: RtpSequenceNumber, timestamp: RtpTimestamp) -> i64 {
        let extended = match self.last {
            None => i64::from(seq),
            Some((last_extended, last_seq, last_timestamp)) => {
                let mut delta = seq_delta(last_seq, seq);
                if delta == -SEQ_HALF_RANGE && timestamp_delta(last_timestamp, timestamp) >= 0 {
                    delta = SEQ_HALF_RANGE;
                }
                last_extended + delta
            }
        };
        self.last = Some((extended, seq, timestamp));
        extended
    }

    /// Last extended value handed out
    pub fn last(&self) -> Option<i64> {
        self.last.map(|(extended, _, _)| extended)
    }
}

/// Extends 32-bit RTP timestamps to a 64-bit space
///
/// Like [`SequenceUnwrapper`], each value lands on the candidate closest
/// to the previous one, so timestamps may move backwards.
#[derive(Debug, Clone, Default)]
pub struct TimestampUnwrapper {
    last: Option<(i64, RtpTimestamp)>,
}

impl TimestampUnwrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend `timestamp`
    pub fn unwrap(&mut self, timestamp: RtpTimestamp) -> i64 {
        let extended = match self.last {
            None => i64::from(timestamp),
            Some((last_extended, last)) => last_extended + timestamp_delta(last, timestamp),
        };
        self.last = Some((extended, timestamp));
        extended
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_delta() {
        assert_eq!(seq_delta(10, 12), 2);
        assert_eq!(seq_delta(12, 10), -2);
        assert_eq!(seq_delta(65535, 0), 1);
        assert_eq!(seq_delta(0, 65535), -1);
        assert_eq!(seq_delta(0, 32768), -32768);
    }

    #[test]
    fn test_unwrap_across_wrap() {
        let mut unwrapper = SequenceUnwrapper::new();
        let out: Vec<i64> = [65534u16, 65535, 0, 1]
            .iter()
            .enumerate()
            .map(|(i, &seq)| unwrapper.unwrap(seq, i as u32 * 160))
            .collect();
        assert_eq!(out, vec![65534, 65535, 65536, 65537]);
    }

    #[test]
    fn test_unwrap_reordered_across_wrap() {
        let mut unwrapper = SequenceUnwrapper::new();
        assert_eq!(unwrapper.unwrap(65535, 0), 65535);
        assert_eq!(unwrapper.unwrap(1, 320), 65537);
        assert_eq!(unwrapper.unwrap(0, 160), 65536);
        assert_eq!(unwrapper.unwrap(65534, u32::MAX - 159), 65534);
    }

    #[test]
    fn test_half_range_tie_break() {
        let mut forward = SequenceUnwrapper::new();
        forward.unwrap(0, 1000);
        assert_eq!(forward.unwrap(32768, 2000), 32768);

        let mut backward = SequenceUnwrapper::new();
        backward.unwrap(0, 1000);
        assert_eq!(backward.unwrap(32768, 500), -32768);

        // Equal timestamps: arrival order wins
        let mut same = SequenceUnwrapper::new();
        same.unwrap(0, 1000);
        assert_eq!(same.unwrap(32768, 1000), 32768);
    }

    #[test]
    fn test_timestamp_unwrap() {
        let mut unwrapper = TimestampUnwrapper::new();
        assert_eq!(unwrapper.unwrap(u32::MAX - 159), i64::from(u32::MAX) - 159);
        assert_eq!(unwrapper.unwrap(0), i64::from(u32::MAX) + 1);
        assert_eq!(unwrapper.unwrap(160), i64::from(u32::MAX) + 161);
        assert_eq!(timestamp_delta(u32::MAX, 159), 160);
        assert_eq!(timestamp_delta(160, 0), -160);
    }
}
