// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Raw code to ampere conversion
//!
//! The transducer reports the loop current as a 16-bit code with a fixed
//! resolution of 0.000610 mA per unit. The 4-20 mA loop is mapped linearly onto
//! 0-63 A:
//!
//! ```text
//! mA   = code * 0.000610
//! amps = (mA - 4.0) * 63.0 / 16.0      clamped to [0, 63], rounded
//! ```
//!
//! Codes the device uses to signal overflow or an invalid channel are rejected
//! before scaling, and currents outside 3.8-30 mA (open loop, broken wiring)
//! are rejected after scaling.

/// Loop current represented by one code unit, in milliamps.
pub const MILLIAMPS_PER_CODE: f64 = 0.000610;

/// Lowest accepted loop current. Below this the loop is considered open.
pub const MIN_VALID_MILLIAMPS: f64 = 3.8;

/// Highest accepted loop current.
pub const MAX_VALID_MILLIAMPS: f64 = 30.0;

/// Loop current at 0 A.
pub const LOOP_ZERO_MILLIAMPS: f64 = 4.0;

/// Loop current span between 0 A and full scale.
pub const LOOP_SPAN_MILLIAMPS: f64 = 16.0;

/// Current at full scale (20 mA).
pub const FULL_SCALE_AMPS: f64 = 63.0;

/// Codes the device emits instead of a measurement.
pub const SENTINEL_CODES: [u16; 4] = [0xFFFF, 0xFFFE, 0x0000, 0x7FFF];

/// Convert a raw transducer code to whole amperes.
///
/// Returns `None` for sentinel codes and for loop currents outside the valid band.
/// The result, when present, is always within `0..=63`.
pub fn convert(raw_code: u16) -> Option<i32> {
    if SENTINEL_CODES.contains(&raw_code) {
        return None;
    }
    milliamps_to_amps(code_to_milliamps(raw_code))
}

/// Scale a raw code to milliamps.
pub fn code_to_milliamps(raw_code: u16) -> f64 {
    MILLIAMPS_PER_CODE * f64::from(raw_code)
}

/// Map a loop current to whole amperes, applying band rejection, clamping and rounding.
pub fn milliamps_to_amps(milliamps: f64) -> Option<i32> {
    if !(MIN_VALID_MILLIAMPS..=MAX_VALID_MILLIAMPS).contains(&milliamps) {
        return None;
    }
    let amps = (milliamps - LOOP_ZERO_MILLIAMPS) * (FULL_SCALE_AMPS / LOOP_SPAN_MILLIAMPS);
    Some(amps.clamp(0.0, FULL_SCALE_AMPS).round() as i32)
}

/// Inverse mapping used by the device simulator: the code closest to `amps`.
///
/// Saturates at the ends of the 16-bit range.
pub fn amps_to_code(amps: f64) -> u16 {
    let milliamps = LOOP_ZERO_MILLIAMPS + amps * (LOOP_SPAN_MILLIAMPS / FULL_SCALE_AMPS);
    (milliamps / MILLIAMPS_PER_CODE)
        .round()
        .clamp(0.0, f64::from(u16::MAX)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_codes_rejected() {
        for code in SENTINEL_CODES {
            assert_eq!(convert(code), None, "code {code:#06X} should be rejected");
        }
    }

    #[test]
    fn test_band_limits() {
        assert_eq!(milliamps_to_amps(3.7), None);
        assert_eq!(milliamps_to_amps(30.1), None);
        assert_eq!(milliamps_to_amps(4.0), Some(0));
        assert_eq!(milliamps_to_amps(20.0), Some(63));
        // Inside the band but below the loop zero clamps to 0
        assert_eq!(milliamps_to_amps(3.9), Some(0));
        // Above full scale clamps to 63
        assert_eq!(milliamps_to_amps(25.0), Some(63));
    }

    #[test]
    fn test_codes_near_calibration_points() {
        // 6066 * 0.000610 = 3.700 mA: open loop
        assert_eq!(convert(6066), None);
        // 6557 * 0.000610 = 3.9998 mA
        assert_eq!(convert(6557), Some(0));
        // 32787 * 0.000610 = 20.0001 mA
        assert_eq!(convert(32787), Some(63));
        // 12 mA is mid scale
        assert_eq!(milliamps_to_amps(12.0), Some(32));
    }

    #[test]
    fn test_amps_to_code_inverts_convert() {
        for amps in 0..=63 {
            let code = amps_to_code(f64::from(amps));
            assert_eq!(convert(code), Some(amps));
        }
    }

    #[test]
    fn test_every_code_converts_within_range() {
        let mut present = 0;
        for code in 0..=u16::MAX {
            if let Some(amps) = convert(code) {
                assert!((0..=63).contains(&amps), "code {code:#06X} gave {amps} A");
                present += 1;
            }
        }
        assert!(present > 0);
    }

    #[test]
    fn test_convert_is_deterministic() {
        assert_eq!(convert(20000), convert(20000));
    }
}
