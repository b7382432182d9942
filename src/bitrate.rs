//! Target bitrate calculation for size-constrained re-encodes.

/// Floor below which MP3 audio is not worth delivering.
pub const MIN_BITRATE_KBPS: u32 = 32;

/// Safety margin left for container and metadata overhead.
const SIZE_MARGIN: f64 = 0.95;

/// Calculate the constant bitrate (kbit/s) that encodes `duration_secs` of
/// audio into roughly, but not more than, `target_size_bytes`.
///
/// Callers must validate the duration first; a zero or negative duration is
/// a caller bug.
pub fn calculate_bitrate(target_size_bytes: u64, duration_secs: f64) -> u32 {
    debug_assert!(duration_secs > 0.0, "duration must be validated by the caller");

    // bytes -> kilobits (1 byte = 8 bits, 1 kilobit = 1000 bits)
    let target_kbits = (target_size_bytes as f64 * 8.0) / 1000.0;
    let raw = target_kbits / duration_secs;

    let margined = (raw * SIZE_MARGIN).floor();
    if margined < MIN_BITRATE_KBPS as f64 {
        MIN_BITRATE_KBPS
    } else {
        margined as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_minutes_into_eight_mib() {
        // floor((8388608 * 8 / 1000) / 600 * 0.95) = 106
        assert_eq!(calculate_bitrate(8 * 1024 * 1024, 600.0), 106);
    }

    #[test]
    fn clamps_to_minimum() {
        assert_eq!(calculate_bitrate(100, 1.0), MIN_BITRATE_KBPS);
        assert_eq!(calculate_bitrate(1, 10_000.0), MIN_BITRATE_KBPS);
    }

    #[test]
    fn never_below_minimum() {
        for size in [1u64, 1000, 100_000, 8 * 1024 * 1024] {
            for dur in [1.0, 60.0, 600.0, 36_000.0] {
                assert!(calculate_bitrate(size, dur) >= MIN_BITRATE_KBPS);
            }
        }
    }

    #[test]
    fn monotonic_in_target_size() {
        let mut prev = 0;
        for size in (1_000_000u64..=16_000_000).step_by(1_000_000) {
            let rate = calculate_bitrate(size, 300.0);
            assert!(rate >= prev, "bitrate dropped when target size grew");
            prev = rate;
        }
    }

    #[test]
    fn monotonic_in_duration() {
        let mut prev = u32::MAX;
        for dur in [30.0, 60.0, 120.0, 600.0, 3600.0] {
            let rate = calculate_bitrate(8 * 1024 * 1024, dur);
            assert!(rate <= prev, "bitrate rose when duration grew");
            prev = rate;
        }
    }

    #[test]
    fn short_clip_gets_generous_rate() {
        // 8 MiB over 30 seconds leaves far more headroom than any encoder needs
        assert!(calculate_bitrate(8 * 1024 * 1024, 30.0) > 2000);
    }
}
