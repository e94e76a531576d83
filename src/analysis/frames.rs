//! Short-time framing helpers shared by the detectors
//!
//! Frames are centered: frame `i` covers samples
//! `[i * hop - frame_len / 2, i * hop + frame_len / 2)`, zero-padded at the
//! edges, so frame `i` corresponds to time `i * hop / sample_rate`.

/// Number of centered frames for a signal of `len` samples
#[inline]
pub fn frame_count(len: usize, hop: usize) -> usize {
    if len == 0 || hop == 0 {
        0
    } else {
        1 + len / hop
    }
}

/// Convert a frame index to seconds
#[inline]
pub fn frame_to_secs(frame: usize, hop: usize, sample_rate: u32) -> f64 {
    (frame * hop) as f64 / sample_rate as f64
}

/// Per-frame RMS of a mono signal
///
/// Uses a running sum of squares, so the cost is linear in the signal
/// length regardless of frame size.
pub fn frame_rms(samples: &[f32], frame_len: usize, hop: usize) -> Vec<f32> {
    let n = frame_count(samples.len(), hop);
    if n == 0 || frame_len == 0 {
        return Vec::new();
    }

    let mut prefix = Vec::with_capacity(samples.len() + 1);
    prefix.push(0.0_f64);
    let mut acc = 0.0_f64;
    for &s in samples {
        acc += (s as f64) * (s as f64);
        prefix.push(acc);
    }

    let half = frame_len / 2;
    (0..n)
        .map(|i| {
            let center = i * hop;
            let start = center.saturating_sub(half).min(samples.len());
            let end = (center + half).min(samples.len());
            let energy = (prefix[end] - prefix[start]).max(0.0);
            (energy / frame_len as f64).sqrt() as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_frame_count() {
        assert_eq!(frame_count(0, 512), 0);
        assert_eq!(frame_count(511, 512), 1);
        assert_eq!(frame_count(1024, 512), 3);
    }

    #[test]
    fn test_frame_rms_constant_signal() {
        let samples = vec![0.5_f32; 8192];
        let rms = frame_rms(&samples, 2048, 512);
        assert_eq!(rms.len(), 17);
        // Interior frames are fully covered
        assert_relative_eq!(rms[8], 0.5, epsilon = 1e-6);
        // First frame is half padding
        assert_relative_eq!(rms[0], 0.5 * 0.5_f32.sqrt(), epsilon = 1e-6);
    }

    #[test]
    fn test_frame_rms_locates_burst() {
        let mut samples = vec![0.0_f32; 10_240];
        for s in &mut samples[5120..6144] {
            *s = 1.0;
        }
        let rms = frame_rms(&samples, 1024, 512);
        assert_eq!(rms[5], 0.0);
        assert!(rms[11] > 0.9);
        assert_eq!(rms[15], 0.0);
    }

    #[test]
    fn test_frame_to_secs() {
        assert_relative_eq!(frame_to_secs(43, 512, 22050), 43.0 * 512.0 / 22050.0);
    }
}
