//! RTP clock conversion

/// Convert signed RTP ticks into output samples per channel
///
/// Used where the RTP clock differs from the audio sample rate (G.722).
pub fn ticks_to_samples(ticks: i64, clock_rate: u32, sample_rate: u32) -> i64 {
    if clock_rate == 0 || clock_rate == sample_rate {
        return ticks;
    }
    let scaled = i128::from(ticks) * i128::from(sample_rate) / i128::from(clock_rate);
    scaled as i64
}

/// Typical clock rates for audio payloads
pub mod clock_rates {
    /// G.711, G.729, GSM, DVI4/8000 (8kHz)
    pub const AUDIO_8KHZ: u32 = 8000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_to_samples() {
        // G.722 advertises an 8kHz clock for 16kHz audio
        assert_eq!(ticks_to_samples(160, 8000, 16000), 320);
        assert_eq!(ticks_to_samples(-160, 8000, 16000), -320);
        assert_eq!(ticks_to_samples(160, 8000, 8000), 160);
        assert_eq!(ticks_to_samples(160, 0, 16000), 160);
    }
}
