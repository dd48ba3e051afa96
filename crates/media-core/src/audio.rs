//! Sample format conversion: channel remixing and linear resampling
//!
//! Buffers are interleaved 16-bit PCM.

/// Convert between channel counts
///
/// Down-mixing to mono averages all channels; otherwise output channel `n`
/// takes input channel `n` (or the last input channel).
pub fn remix(samples: &[i16], from_channels: u16, to_channels: u16) -> Vec<i16> {
    let from = usize::from(from_channels.max(1));
    let to = usize::from(to_channels.max(1));
    if from == to {
        return samples.to_vec();
    }

    let frames = samples.chunks_exact(from);
    let mut out = Vec::with_capacity(frames.len() * to);
    for frame in frames {
        if to == 1 {
            let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
            out.push((sum / from as i32) as i16);
        } else {
            for channel in 0..to {
                out.push(frame[channel.min(from - 1)]);
            }
        }
    }
    out
}

/// Number of output frames when resampling `frames` from `from_rate` to `to_rate`
pub fn resampled_len(frames: usize, from_rate: u32, to_rate: u32) -> usize {
    if from_rate == 0 || from_rate == to_rate {
        return frames;
    }
    ((frames as u64 * u64::from(to_rate) + u64::from(from_rate) / 2) / u64::from(from_rate)) as usize
}

/// Linear-interpolation resampler
pub fn resample_linear(samples: &[i16], channels: u16, from_rate: u32, to_rate: u32) -> Vec<i16> {
    let channels = usize::from(channels.max(1));
    let frames = samples.len() / channels;
    if from_rate == 0 || from_rate == to_rate || frames == 0 {
        return samples[..frames * channels].to_vec();
    }

    let out_frames = resampled_len(frames, from_rate, to_rate);
    let step = f64::from(from_rate) / f64::from(to_rate);
    let mut out = Vec::with_capacity(out_frames * channels);
    for n in 0..out_frames {
        let position = n as f64 * step;
        let index = (position as usize).min(frames - 1);
        let next = (index + 1).min(frames - 1);
        let fraction = position - index as f64;
        for channel in 0..channels {
            let a = f64::from(samples[index * channels + channel]);
            let b = f64::from(samples[next * channels + channel]);
            out.push((a + (b - a) * fraction).round() as i16);
        }
    }
    out
}

/// Convert a buffer to the target channel count and rate
pub fn convert(samples: &[i16], from_channels: u16, from_rate: u32, to_channels: u16, to_rate: u32) -> Vec<i16> {
    let remixed = remix(samples, from_channels, to_channels);
    resample_linear(&remixed, to_channels, from_rate, to_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remix() {
        assert_eq!(remix(&[100, 300, -10, 10], 2, 1), vec![200, 0]);
        assert_eq!(remix(&[5, -5], 1, 2), vec![5, 5, -5, -5]);
        assert_eq!(remix(&[1, 2, 3], 2, 1), vec![1]);
    }

    #[test]
    fn test_upsample_interpolates() {
        let out = resample_linear(&[0, 100, 200], 1, 8000, 16000);
        assert_eq!(out, vec![0, 50, 100, 150, 200, 200]);
    }

    #[test]
    fn test_downsample_length() {
        let input = vec![1000i16; 441];
        let out = resample_linear(&input, 1, 44100, 8000);
        assert_eq!(out.len(), 80);
        assert!(out.iter().all(|&s| s == 1000));
    }

    #[test]
    fn test_same_rate_passthrough() {
        assert_eq!(convert(&[1, 2, 3, 4], 2, 8000, 2, 8000), vec![1, 2, 3, 4]);
    }
}
