//! Level mapping from captured sample ranges to ROM sample ranges
//!
//! All arithmetic is exact integer rational math; the single rounding step
//! rounds half to even.
//!
//! # Luma
//! ```text
//! x'  = x - black_t                      (or span_t - (x - black_t) inverted)
//! out = round(x' * (724 - 164) / span_t) + 164      span_t = white_t - black_t
//! ```
//!
//! # Chroma
//! ```text
//! out = round((x - centre_t) * amp_rom / amp_t * sign) + 128
//! ```

use crate::capture::LineSamples;
use crate::error::{CodecError, Result};
use crate::raster::Component;
use crate::standard::Standard;
use crate::{CHROMA_BLANK, CHROMA_MAX, LUMA_MAX};

/// ROM white level; offset of the mapped range
pub const ROM_LUMA_WHITE: i64 = 164;
/// ROM black level
pub const ROM_LUMA_BLACK: i64 = 724;

/// R-Y peak in ROM units (centred on 128)
pub const ROM_RY_MAX: i64 = 193;
/// B-Y peak in ROM units (centred on 128)
pub const ROM_BY_MAX: i64 = 174;

/// Captured luma levels for one acquisition path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LumaTarget {
    pub black: i64,
    pub white: i64,
}

/// 10-bit studio levels
pub const DIGITAL_LUMA: LumaTarget = LumaTarget {
    black: 64,
    white: 940,
};

/// 12-bit analogue digitiser levels
pub const ANALOGUE_LUMA: LumaTarget = LumaTarget {
    black: 3072,
    white: 832,
};

/// Chroma zero level of the digital acquisition path
pub const DIGITAL_CHROMA_CENTRE: i64 = 512;
/// Chroma zero level of the analogue acquisition path
pub const ANALOGUE_CHROMA_CENTRE: i64 = 2048;

/// Which captured range the samples come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LevelProfile {
    pub use_digital_factors: bool,
    pub invert: bool,
}

impl LevelProfile {
    pub fn luma_target(&self) -> LumaTarget {
        if self.use_digital_factors {
            DIGITAL_LUMA
        } else {
            ANALOGUE_LUMA
        }
    }

    pub fn chroma_centre(&self) -> i64 {
        if self.use_digital_factors {
            DIGITAL_CHROMA_CENTRE
        } else {
            ANALOGUE_CHROMA_CENTRE
        }
    }

    /// Captured colour-difference amplitude matching the ROM peak
    pub fn chroma_amplitude(&self, component: Component, standard: Standard) -> i64 {
        let ry = component == Component::RY;
        match (self.use_digital_factors, standard) {
            (true, _) => 448,
            (false, Standard::Ntsc) => {
                if ry {
                    1040
                } else {
                    736
                }
            }
            (false, _) => {
                if ry {
                    1120
                } else {
                    794
                }
            }
        }
    }
}

/// `num / den` rounded to nearest, ties to even
pub fn div_round_half_even(num: i64, den: i64) -> i64 {
    let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
    let q = num.div_euclid(den);
    let r = num.rem_euclid(den);
    match (2 * r).cmp(&den) {
        std::cmp::Ordering::Less => q,
        std::cmp::Ordering::Greater => q + 1,
        std::cmp::Ordering::Equal => {
            if q % 2 == 0 {
                q
            } else {
                q + 1
            }
        }
    }
}

/// Map one captured luma sample; the result may be out of range
pub fn map_luma(sample: u16, profile: &LevelProfile) -> i64 {
    let target = profile.luma_target();
    let span = target.white - target.black;
    let mut shifted = sample as i64 - target.black;
    if profile.invert {
        shifted = span - shifted;
    }
    div_round_half_even(shifted * (ROM_LUMA_BLACK - ROM_LUMA_WHITE), span) + ROM_LUMA_WHITE
}

/// Map one captured chroma sample; the result may be out of range
///
/// `negate` flips polarity on top of the profile's inversion.
pub fn map_chroma(
    sample: u16,
    component: Component,
    standard: Standard,
    profile: &LevelProfile,
    negate: bool,
) -> i64 {
    let rom_amplitude = match component {
        Component::RY => ROM_RY_MAX,
        _ => ROM_BY_MAX,
    } - CHROMA_BLANK as i64;
    let mut shifted = sample as i64 - profile.chroma_centre();
    if profile.invert != negate {
        shifted = -shifted;
    }
    div_round_half_even(
        shifted * rom_amplitude,
        profile.chroma_amplitude(component, standard),
    ) + CHROMA_BLANK as i64
}

/// Level-mapped line, ROM sample values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedLine {
    pub y: Vec<i32>,
    pub ry: Vec<i32>,
    pub by: Vec<i32>,
}

/// Map a whole captured line, rejecting negatives and clamping overshoot
pub fn map_line(
    line: &LineSamples,
    line_index: usize,
    standard: Standard,
    profile: &LevelProfile,
    negate_ry: bool,
) -> Result<MappedLine> {
    let check = |component: Component, mapped: Vec<i64>, max: i32| -> Result<Vec<i32>> {
        let mut overshoot = 0usize;
        let out = mapped
            .into_iter()
            .enumerate()
            .map(|(sample, value)| {
                if value < 0 {
                    return Err(CodecError::NegativeSample {
                        component,
                        line: line_index,
                        sample,
                        value,
                    });
                }
                if value > max as i64 {
                    overshoot += 1;
                    return Ok(max);
                }
                Ok(value as i32)
            })
            .collect::<Result<Vec<i32>>>()?;
        if overshoot > 0 {
            tracing::warn!(
                "{} line {}: clamped {} sample(s) above {}",
                component,
                line_index,
                overshoot,
                max
            );
        }
        Ok(out)
    };

    let y = line.y.iter().map(|&s| map_luma(s, profile)).collect();
    let ry = line
        .ry
        .iter()
        .map(|&s| map_chroma(s, Component::RY, standard, profile, negate_ry))
        .collect();
    let by = line
        .by
        .iter()
        .map(|&s| map_chroma(s, Component::BY, standard, profile, false))
        .collect();

    Ok(MappedLine {
        y: check(Component::Luma, y, LUMA_MAX)?,
        ry: check(Component::RY, ry, CHROMA_MAX)?,
        by: check(Component::BY, by, CHROMA_MAX)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGITAL: LevelProfile = LevelProfile {
        use_digital_factors: true,
        invert: false,
    };
    const ANALOGUE: LevelProfile = LevelProfile {
        use_digital_factors: false,
        invert: false,
    };

    #[test]
    fn test_round_half_even() {
        assert_eq!(div_round_half_even(5, 2), 2);
        assert_eq!(div_round_half_even(7, 2), 4);
        assert_eq!(div_round_half_even(-5, 2), -2);
        assert_eq!(div_round_half_even(-7, 2), -4);
        assert_eq!(div_round_half_even(10, 4), 2);
        assert_eq!(div_round_half_even(11, 4), 3);
        assert_eq!(div_round_half_even(5, -2), -2);
        assert_eq!(div_round_half_even(-9, 4), -2);
    }

    #[test]
    fn test_luma_digital_example() {
        // (452 - 64) * (724 - 164) / (940 - 64) + 164 = 412.036...
        assert_eq!(map_luma(452, &DIGITAL), 412);
    }

    #[test]
    fn test_luma_digital_endpoints() {
        assert_eq!(map_luma(64, &DIGITAL), 164);
        assert_eq!(map_luma(940, &DIGITAL), 724);
    }

    #[test]
    fn test_luma_analogue_endpoints() {
        assert_eq!(map_luma(3072, &ANALOGUE), 164);
        assert_eq!(map_luma(832, &ANALOGUE), 724);
    }

    #[test]
    fn test_luma_inverted_swaps_endpoints() {
        let inverted = LevelProfile {
            invert: true,
            ..DIGITAL
        };
        assert_eq!(map_luma(64, &inverted), 724);
        assert_eq!(map_luma(940, &inverted), 164);
    }

    #[test]
    fn test_luma_out_of_range() {
        // 1023 * 560 / -2240 = -255.75 → -256
        assert_eq!(map_luma(4095, &ANALOGUE), -92);
        // 1936 * 560 / 876 = 1237.6
        assert_eq!(map_luma(2000, &DIGITAL), 1402);
    }

    #[test]
    fn test_chroma_centre_maps_to_axis() {
        for component in [Component::RY, Component::BY] {
            assert_eq!(map_chroma(512, component, Standard::Pal, &DIGITAL, false), 128);
            assert_eq!(map_chroma(2048, component, Standard::Ntsc, &ANALOGUE, false), 128);
        }
    }

    #[test]
    fn test_chroma_peaks() {
        assert_eq!(map_chroma(512 + 448, Component::RY, Standard::Pal, &DIGITAL, false), 193);
        assert_eq!(map_chroma(512 + 448, Component::BY, Standard::Pal, &DIGITAL, false), 174);
        assert_eq!(map_chroma(2048 + 1120, Component::RY, Standard::Pal, &ANALOGUE, false), 193);
        assert_eq!(map_chroma(2048 + 736, Component::BY, Standard::Ntsc, &ANALOGUE, false), 174);
    }

    #[test]
    fn test_chroma_negate_mirrors() {
        let up = map_chroma(700, Component::RY, Standard::Pal, &DIGITAL, false);
        let down = map_chroma(700, Component::RY, Standard::Pal, &DIGITAL, true);
        assert_eq!(up - 128, 128 - down);

        let inverted = LevelProfile {
            invert: true,
            ..DIGITAL
        };
        assert_eq!(map_chroma(700, Component::RY, Standard::Pal, &inverted, false), down);
        // invert and negate cancel
        assert_eq!(map_chroma(700, Component::RY, Standard::Pal, &inverted, true), up);
    }

    #[test]
    fn test_map_line_rejects_negative() {
        let line = LineSamples::new(vec![3072, 4095], vec![2048], vec![2048]);
        let err = map_line(&line, 7, Standard::Pal, &ANALOGUE, false).unwrap_err();
        assert!(matches!(
            err,
            CodecError::NegativeSample {
                component: Component::Luma,
                line: 7,
                sample: 1,
                value: -92,
            }
        ));

        let inverted = LevelProfile {
            invert: true,
            ..ANALOGUE
        };
        let line = LineSamples::new(vec![3072], vec![2048], vec![2048, u16::MAX]);
        let err = map_line(&line, 0, Standard::Pal, &inverted, false).unwrap_err();
        assert!(matches!(
            err,
            CodecError::NegativeSample {
                component: Component::BY,
                sample: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_map_line_clamps_overshoot() {
        let line = LineSamples::new(vec![64, 940, 2000], vec![2000, 512], vec![512, 512]);
        let mapped = map_line(&line, 0, Standard::Pal, &DIGITAL, false).unwrap();
        assert_eq!(mapped.y, vec![164, 724, LUMA_MAX]);
        // 1488 * 65 / 448 = 215.9 → 344
        assert_eq!(mapped.ry, vec![CHROMA_MAX, 128]);
        assert_eq!(mapped.by, vec![128, 128]);
    }
}
