//! Controller value rescaling
//!
//! MIDI data bytes run 0-127 but synth parameters have much smaller
//! native ranges (a curve selector is 0-3, an output level 0-99).
//! Conversion is integer-truncating multiplication: monotonic, never
//! exceeds the target maximum, deterministic across platforms.

/// Map `value` (0-127) onto 0..=`max` by truncating multiplication.
pub fn scale(max: u8, value: u8) -> u8 {
    ((value as u32 * max as u32) / 127) as u8
}

/// Rescale a detune controller value (CC 94) to master tune.
///
/// 0 means no detune at all; 1..=127 maps linearly onto -99..=99.
pub fn rescale_detune(value: u8) -> i16 {
    if value == 0 {
        0
    } else {
        ((value as i32 - 1) * 198 / 126 - 99) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_endpoints() {
        assert_eq!(scale(99, 0), 0);
        assert_eq!(scale(99, 127), 99);
        assert_eq!(scale(3, 127), 3);
        assert_eq!(scale(1, 127), 1);
        assert_eq!(scale(48, 127), 48);
    }

    #[test]
    fn test_scale_truncates() {
        // 64 * 1 / 127 == 0 with integer division
        assert_eq!(scale(1, 64), 0);
        assert_eq!(scale(99, 64), 49);
    }

    #[test]
    fn test_scale_monotonic_and_bounded() {
        for max in [1u8, 3, 4, 7, 14, 31, 48, 99] {
            let mut previous = 0;
            for value in 0..=127u8 {
                let scaled = scale(max, value);
                assert!(scaled <= max);
                assert!(scaled >= previous);
                previous = scaled;
            }
        }
    }

    #[test]
    fn test_rescale_detune() {
        assert_eq!(rescale_detune(0), 0);
        assert_eq!(rescale_detune(1), -99);
        assert_eq!(rescale_detune(64), 0);
        assert_eq!(rescale_detune(127), 99);
    }
}
