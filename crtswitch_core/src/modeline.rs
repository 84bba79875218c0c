// Copyright 2026 the Crtswitch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CRT modeline synthesis.
//!
//! [`synthesize`] turns a requested raster size and refresh rate into a full
//! [`ModeTiming`] using empirically tuned formulas for 15 kHz arcade and
//! consumer CRTs:
//!
//! - **Horizontal**: sync start, sync end and total scale linearly with the
//!   width. Widths of 700 pixels and above use a second regime with extra
//!   porch and a doubled horizontal offset, so `h_total` jumps at the
//!   boundary.
//! - **Vertical**: the total is chosen from an ordered band table keyed by
//!   height and refresh rate. Every band is evaluated and the **last**
//!   matching band wins; bands overlap on purpose.
//! - **Interlace**: heights of 300 lines and above are interlaced, which
//!   widens the vertical sync pulse, halves the pixel clock and sets the
//!   [`ModeFlags::INTERLACE`] bit.
//!
//! The formulas are only meaningful for the heights and rates the band table
//! anticipates. Out-of-table requests are rejected with a [`TimingError`],
//! and requests that fall back to a refresh-agnostic band are accepted but
//! flagged with a [`TimingWarning`].

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

bitflags::bitflags! {
    /// Sync polarity and scan flags of a mode, in `RandR` wire layout.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ModeFlags: u32 {
        /// Positive horizontal sync.
        const HSYNC_POSITIVE = 1 << 0;
        /// Negative horizontal sync.
        const HSYNC_NEGATIVE = 1 << 1;
        /// Positive vertical sync.
        const VSYNC_POSITIVE = 1 << 2;
        /// Negative vertical sync.
        const VSYNC_NEGATIVE = 1 << 3;
        /// Interlaced scan.
        const INTERLACE = 1 << 4;
        /// Double scan.
        const DOUBLE_SCAN = 1 << 5;
    }
}

impl ModeFlags {
    /// `-HSync -VSync`, progressive (wire value 10).
    pub const CRT_PROGRESSIVE: Self = Self::HSYNC_NEGATIVE.union(Self::VSYNC_NEGATIVE);
    /// `-HSync -VSync Interlace` (wire value 26).
    pub const CRT_INTERLACED: Self = Self::CRT_PROGRESSIVE.union(Self::INTERLACE);
}

/// Widths at or above this use the wide horizontal regime.
pub const WIDE_THRESHOLD: u32 = 700;

/// Heights at or above this are interlaced.
pub const INTERLACE_THRESHOLD: u32 = 300;

/// Vertical porch subtracted from the sync start; doubled above 300 lines.
const BASE_PORCH: i64 = 8;

/// Refresh rates the refresh-agnostic bands were tuned for (PAL to NTSC).
const BANDED_REFRESH: core::ops::RangeInclusive<f64> = 50.0..=60.0;

/// A fully specified CRT timing, without a name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModeTiming {
    /// Pixel clock in Hz.
    pub pixel_clock: u64,
    /// Visible width in pixels.
    pub width: u32,
    /// Horizontal sync start.
    pub h_sync_start: u32,
    /// Horizontal sync end.
    pub h_sync_end: u32,
    /// Horizontal total.
    pub h_total: u32,
    /// Horizontal skew, always zero for synthesized modes.
    pub h_skew: u32,
    /// Visible height in lines.
    pub height: u32,
    /// Vertical sync start.
    pub v_sync_start: u32,
    /// Vertical sync end.
    pub v_sync_end: u32,
    /// Vertical total.
    pub v_total: u32,
    /// Sync polarity and scan flags.
    pub flags: ModeFlags,
}

impl ModeTiming {
    /// The 700×480 interlaced desktop timing restored on teardown.
    pub const DESKTOP: Self = Self {
        pixel_clock: 13_849_698,
        width: 700,
        h_sync_start: 742,
        h_sync_end: 801,
        h_total: 867,
        h_skew: 0,
        height: 480,
        v_sync_start: 490,
        v_sync_end: 496,
        v_total: 533,
        flags: ModeFlags::CRT_INTERLACED,
    };

    /// Returns `true` if the timing is interlaced.
    #[inline]
    #[must_use]
    pub const fn interlaced(&self) -> bool {
        self.flags.contains(ModeFlags::INTERLACE)
    }

    /// Returns the field-corrected refresh rate implied by the timing.
    #[must_use]
    pub fn refresh_hz(&self) -> f64 {
        let total = f64::from(self.h_total) * f64::from(self.v_total);
        if total == 0.0 {
            return 0.0;
        }
        let rate = self.pixel_clock as f64 / total;
        if self.interlaced() { rate * 2.0 } else { rate }
    }

    /// Checks the ordering invariants of the horizontal and vertical timing
    /// points.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.width <= self.h_sync_start
            && self.h_sync_start <= self.h_sync_end
            && self.h_sync_end <= self.h_total
            && self.height <= self.v_sync_start
            && self.v_sync_start <= self.v_sync_end
            && self.v_sync_end <= self.v_total
    }

    /// Attaches a name, producing a [`Modeline`].
    #[must_use]
    pub fn named(self, name: impl Into<String>) -> Modeline {
        Modeline {
            name: name.into(),
            timing: self,
        }
    }
}

/// A named timing, as registered with the display server.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Modeline {
    /// Unique mode name.
    pub name: String,
    /// Timing parameters.
    pub timing: ModeTiming,
}

impl Modeline {
    /// Name of the desktop timing restored on teardown.
    pub const DESKTOP_NAME: &'static str = "d_mo";

    /// Prefix of synthesized mode names; the session generation follows it.
    pub const SYNTHESIZED_PREFIX: &'static str = "CRT";

    /// Returns the desktop modeline.
    #[must_use]
    pub fn desktop() -> Self {
        ModeTiming::DESKTOP.named(Self::DESKTOP_NAME)
    }

    /// Returns the synthesized mode name for a session generation.
    #[must_use]
    pub fn synthesized_name(generation: u32) -> String {
        alloc::format!("{}{generation}", Self::SYNTHESIZED_PREFIX)
    }
}

/// Formats the modeline in `xrandr --newmode` syntax.
impl fmt::Display for Modeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.timing;
        write!(
            f,
            "\"{}\" {}.{:06} {} {} {} {} {} {} {} {}",
            self.name,
            t.pixel_clock / 1_000_000,
            t.pixel_clock % 1_000_000,
            t.width,
            t.h_sync_start,
            t.h_sync_end,
            t.h_total,
            t.height,
            t.v_sync_start,
            t.v_sync_end,
            t.v_total,
        )?;
        for (flag, label) in [
            (ModeFlags::HSYNC_POSITIVE, "+HSync"),
            (ModeFlags::HSYNC_NEGATIVE, "-HSync"),
            (ModeFlags::VSYNC_POSITIVE, "+VSync"),
            (ModeFlags::VSYNC_NEGATIVE, "-VSync"),
            (ModeFlags::INTERLACE, "Interlace"),
            (ModeFlags::DOUBLE_SCAN, "DoubleScan"),
        ] {
            if t.flags.contains(flag) {
                write!(f, " {label}")?;
            }
        }
        Ok(())
    }
}

/// Why a timing could not be synthesized.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimingError {
    /// Width or height is zero, or the refresh rate is not a positive number.
    InvalidRequest {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
        /// Requested refresh rate.
        refresh_hz: f64,
    },
    /// No vertical band covers this height and refresh rate.
    NoVerticalBand {
        /// Requested height.
        height: u32,
        /// Requested refresh rate.
        refresh_hz: f64,
    },
    /// The formulas produced timing points that are out of order.
    Degenerate {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
        /// Requested refresh rate.
        refresh_hz: f64,
    },
}

impl fmt::Display for TimingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest {
                width,
                height,
                refresh_hz,
            } => write!(f, "invalid mode request {width}x{height}@{refresh_hz}"),
            Self::NoVerticalBand { height, refresh_hz } => {
                write!(f, "no vertical band covers {height} lines at {refresh_hz} Hz")
            }
            Self::Degenerate {
                width,
                height,
                refresh_hz,
            } => write!(
                f,
                "timing for {width}x{height}@{refresh_hz} has out-of-order sync points"
            ),
        }
    }
}

impl core::error::Error for TimingError {}

/// A synthesized timing that was accepted but is of doubtful quality.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimingWarning {
    /// The winning vertical band ignores the refresh rate, and the rate lies
    /// outside the range the band was tuned for.
    RefreshNotBanded {
        /// Index of the winning band in [`VERTICAL_BANDS`].
        band: usize,
        /// Requested refresh rate.
        refresh_hz: f64,
    },
}

/// Output of [`synthesize`].
#[derive(Clone, Debug, PartialEq)]
pub struct Synthesis {
    /// The synthesized timing.
    pub timing: ModeTiming,
    /// Index of the vertical band that set `v_total`.
    pub band: usize,
    /// Quality warnings.
    pub warnings: Vec<TimingWarning>,
}

/// One rule of the vertical-total table. All bounds are exclusive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VerticalBand {
    /// Height must exceed this.
    pub height_above: Option<u32>,
    /// Height must be below this.
    pub height_below: Option<u32>,
    /// Refresh rate must exceed this.
    pub hz_above: Option<f64>,
    /// Refresh rate must be below this.
    pub hz_below: Option<f64>,
    /// Vertical total assigned when the rule matches.
    pub v_total: u32,
}

impl VerticalBand {
    const fn new(
        height_above: Option<u32>,
        height_below: Option<u32>,
        hz_above: Option<f64>,
        hz_below: Option<f64>,
        v_total: u32,
    ) -> Self {
        Self {
            height_above,
            height_below,
            hz_above,
            hz_below,
            v_total,
        }
    }

    /// Returns `true` if the rule applies to the given height and rate.
    #[must_use]
    pub fn matches(&self, height: u32, refresh_hz: f64) -> bool {
        self.height_above.is_none_or(|h| height > h)
            && self.height_below.is_none_or(|h| height < h)
            && self.hz_above.is_none_or(|hz| refresh_hz > hz)
            && self.hz_below.is_none_or(|hz| refresh_hz < hz)
    }

    /// Returns `true` if the rule does not look at the refresh rate.
    #[must_use]
    pub const fn ignores_refresh(&self) -> bool {
        self.hz_above.is_none() && self.hz_below.is_none()
    }
}

/// Vertical-total rules in evaluation order. Later matches override earlier
/// ones.
pub const VERTICAL_BANDS: [VerticalBand; 11] = [
    VerticalBand::new(None, Some(241), None, None, 261),
    VerticalBand::new(None, Some(241), Some(56.0), Some(58.0), 280),
    VerticalBand::new(None, Some(241), None, Some(55.0), 313),
    VerticalBand::new(Some(250), Some(260), Some(54.0), None, 296),
    VerticalBand::new(Some(250), Some(260), Some(52.0), Some(54.0), 285),
    VerticalBand::new(Some(250), Some(260), None, Some(52.0), 313),
    VerticalBand::new(Some(260), Some(300), None, None, 318),
    VerticalBand::new(Some(400), None, Some(56.0), None, 533),
    VerticalBand::new(Some(520), None, None, Some(57.0), 580),
    VerticalBand::new(Some(300), None, None, Some(56.0), 615),
    VerticalBand::new(Some(500), None, None, Some(56.0), 624),
];

/// Returns the index and vertical total of the last band matching the
/// request.
#[must_use]
pub fn vertical_band(height: u32, refresh_hz: f64) -> Option<(usize, u32)> {
    let mut selected = None;
    for (index, band) in VERTICAL_BANDS.iter().enumerate() {
        if band.matches(height, refresh_hz) {
            selected = Some((index, band.v_total));
        }
    }
    selected
}

/// Synthesizes a CRT timing.
///
/// `h_offset` shifts the picture horizontally by moving the sync end (four
/// pixels per step, eight in the wide regime). `pixel_adjust` widens both
/// porches (two pixels per step, four in the wide regime).
pub fn synthesize(
    width: u32,
    height: u32,
    refresh_hz: f64,
    h_offset: i32,
    pixel_adjust: i32,
) -> Result<Synthesis, TimingError> {
    if width == 0 || height == 0 || !refresh_hz.is_finite() || refresh_hz <= 0.0 {
        return Err(TimingError::InvalidRequest {
            width,
            height,
            refresh_hz,
        });
    }
    let degenerate = TimingError::Degenerate {
        width,
        height,
        refresh_hz,
    };

    let w = f64::from(width);
    let adjust = f64::from(pixel_adjust);
    let (h_sync_start, h_total, offset) = if width < WIDE_THRESHOLD {
        (
            w * 1.033 + adjust * 2.0,
            w * 1.225 + adjust * 2.0,
            f64::from(h_offset),
        )
    } else {
        (
            w * 1.033 + f64::from(width / 112) + adjust * 4.0,
            w * 1.225 + f64::from(width / 58) + adjust * 4.0,
            f64::from(h_offset) * 2.0,
        )
    };
    let h_sync_end = w * 1.117 - offset * 4.0;

    let (band, v_total) =
        vertical_band(height, refresh_hz).ok_or(TimingError::NoVerticalBand {
            height,
            refresh_hz,
        })?;
    let interlaced = height >= INTERLACE_THRESHOLD;
    let porch = if height > INTERLACE_THRESHOLD {
        BASE_PORCH * 2
    } else {
        BASE_PORCH
    };
    let lines = i64::from(height);
    let v_sync_start = lines + (i64::from(v_total) - lines) / 2 - porch;
    let v_sync_end = v_sync_start + if interlaced { 6 } else { 3 };

    let to_u32 = |v: i64| u32::try_from(v).map_err(|_| degenerate);
    let h_total = to_u32(truncate(h_total))?;
    let mut pixel_clock = f64::from(h_total) * f64::from(v_total) * refresh_hz;
    if interlaced {
        pixel_clock /= 2.0;
    }

    let timing = ModeTiming {
        pixel_clock: truncate_clock(pixel_clock),
        width,
        h_sync_start: to_u32(truncate(h_sync_start))?,
        h_sync_end: to_u32(truncate(h_sync_end))?,
        h_total,
        h_skew: 0,
        height,
        v_sync_start: to_u32(v_sync_start)?,
        v_sync_end: to_u32(v_sync_end)?,
        v_total,
        flags: if interlaced {
            ModeFlags::CRT_INTERLACED
        } else {
            ModeFlags::CRT_PROGRESSIVE
        },
    };
    if !timing.is_well_formed() {
        return Err(degenerate);
    }

    let mut warnings = Vec::new();
    if VERTICAL_BANDS[band].ignores_refresh() && !BANDED_REFRESH.contains(&refresh_hz) {
        warnings.push(TimingWarning::RefreshNotBanded { band, refresh_hz });
    }

    Ok(Synthesis {
        timing,
        band,
        warnings,
    })
}

/// Truncates toward zero, saturating at the `i64` range.
#[expect(
    clippy::cast_possible_truncation,
    reason = "timing formulas truncate like an integer cast"
)]
fn truncate(v: f64) -> i64 {
    v as i64
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "pixel clock is non-negative and truncated to whole Hz"
)]
fn truncate_clock(v: f64) -> u64 {
    v as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    fn timing(width: u32, height: u32, hz: f64) -> ModeTiming {
        synthesize(width, height, hz, 0, 0).unwrap().timing
    }

    #[test]
    fn narrow_horizontal_regime() {
        let t = timing(256, 240, 60.0);
        assert_eq!(t.h_sync_start, 264);
        assert_eq!(t.h_sync_end, 285);
        assert_eq!(t.h_total, 313);
        assert!(t.h_sync_start < t.h_sync_end && t.h_sync_end < t.h_total);
    }

    #[test]
    fn wide_horizontal_regime() {
        let t = timing(800, 240, 60.0);
        assert_eq!(t.h_sync_start, 833);
        assert_eq!(t.h_sync_end, 893);
        assert_eq!(t.h_total, 993);
        assert!(t.h_sync_start < t.h_sync_end && t.h_sync_end < t.h_total);
        // The narrow formula alone would give 1.225 * 800 = 980.
        assert!(t.h_total > 980);
    }

    #[test]
    fn horizontal_total_jumps_at_wide_threshold() {
        let below = timing(699, 240, 60.0);
        let at = timing(700, 240, 60.0);
        assert_eq!(below.h_total, 856);
        assert_eq!(at.h_total, 869);
        // Narrow formula at 700 would be 857.
        assert!(at.h_total > 857);
        assert_eq!(at.h_sync_start, 729);
        assert_eq!(at.h_sync_end, 781);
    }

    #[test]
    fn pixel_adjust_and_offset_scale_with_regime() {
        let narrow = synthesize(256, 240, 60.0, 1, 2).unwrap().timing;
        assert_eq!(narrow.h_sync_start, 268);
        assert_eq!(narrow.h_total, 317);
        assert_eq!(narrow.h_sync_end, 281);

        let wide = synthesize(800, 240, 60.0, 1, 2).unwrap().timing;
        assert_eq!(wide.h_sync_start, 841);
        assert_eq!(wide.h_total, 1001);
        assert_eq!(wide.h_sync_end, 885);
    }

    #[test]
    fn progressive_240_lines_at_60hz() {
        let s = synthesize(256, 240, 60.0, 0, 0).unwrap();
        let t = s.timing;
        assert_eq!(s.band, 0);
        assert!(s.warnings.is_empty());
        assert!(!t.interlaced());
        assert_eq!(t.flags.bits(), 10);
        assert_eq!(t.v_total, 261);
        assert_eq!(t.v_sync_start, 242);
        assert_eq!(t.v_sync_end, 245);
        assert_eq!(t.pixel_clock, 313 * 261 * 60);
        assert_eq!(t.h_skew, 0);
    }

    #[test]
    fn last_matching_band_wins() {
        // Bands 0 and 1 both match; 1 comes later.
        let s = synthesize(256, 240, 57.0, 0, 0).unwrap();
        assert_eq!((s.band, s.timing.v_total), (1, 280));

        // Bands 0 and 2 both match.
        let s = synthesize(256, 240, 50.0, 0, 0).unwrap();
        assert_eq!((s.band, s.timing.v_total), (2, 313));

        // Bands 8, 9 and 10 all match; the last one sets the total.
        let s = synthesize(720, 576, 50.0, 0, 0).unwrap();
        assert_eq!((s.band, s.timing.v_total), (10, 624));
    }

    #[test]
    fn mid_height_bands_follow_refresh() {
        assert_eq!(vertical_band(255, 60.0), Some((3, 296)));
        assert_eq!(vertical_band(255, 53.0), Some((4, 285)));
        assert_eq!(vertical_band(255, 50.0), Some((5, 313)));
        assert_eq!(vertical_band(280, 60.0), Some((6, 318)));
    }

    #[test]
    fn interlaced_480_lines_at_60hz() {
        let t = timing(640, 480, 60.0);
        assert!(t.interlaced());
        assert_eq!(t.flags.bits(), 26);
        assert_eq!(t.h_total, 784);
        assert_eq!(t.v_total, 533);
        assert_eq!(t.v_sync_start, 490);
        assert_eq!(t.v_sync_end, 496);
        let full = u64::from(t.h_total) * u64::from(t.v_total) * 60;
        assert_eq!(t.pixel_clock, full / 2);
        assert_eq!(t.pixel_clock, 12_536_160);
    }

    #[test]
    fn refresh_rate_round_trips_through_timing() {
        let t = timing(640, 480, 60.0);
        assert!((t.refresh_hz() - 60.0).abs() < 1e-6);
        let t = timing(256, 240, 60.0);
        assert!((t.refresh_hz() - 60.0).abs() < 1e-6);
        assert!((ModeTiming::DESKTOP.refresh_hz() - 59.94).abs() < 0.01);
    }

    #[test]
    fn uncovered_heights_are_rejected() {
        assert!(matches!(
            synthesize(320, 245, 60.0, 0, 0),
            Err(TimingError::NoVerticalBand { height: 245, .. })
        ));
        assert!(matches!(
            synthesize(320, 300, 60.0, 0, 0),
            Err(TimingError::NoVerticalBand { .. })
        ));
        assert!(matches!(
            synthesize(640, 350, 60.0, 0, 0),
            Err(TimingError::NoVerticalBand { .. })
        ));
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        assert!(matches!(
            synthesize(0, 240, 60.0, 0, 0),
            Err(TimingError::InvalidRequest { .. })
        ));
        assert!(matches!(
            synthesize(320, 0, 60.0, 0, 0),
            Err(TimingError::InvalidRequest { .. })
        ));
        assert!(matches!(
            synthesize(320, 240, f64::NAN, 0, 0),
            Err(TimingError::InvalidRequest { .. })
        ));
        assert!(matches!(
            synthesize(320, 240, -60.0, 0, 0),
            Err(TimingError::InvalidRequest { .. })
        ));
        // The band total is smaller than the visible height.
        assert!(matches!(
            synthesize(800, 600, 60.0, 0, 0),
            Err(TimingError::Degenerate { .. })
        ));
        // A large offset pulls the sync end before the sync start.
        assert!(matches!(
            synthesize(256, 240, 60.0, 10, 0),
            Err(TimingError::Degenerate { .. })
        ));
    }

    #[test]
    fn refresh_agnostic_band_outside_range_warns() {
        let s = synthesize(256, 240, 75.0, 0, 0).unwrap();
        assert_eq!(s.timing.v_total, 261);
        assert_eq!(
            s.warnings,
            [TimingWarning::RefreshNotBanded {
                band: 0,
                refresh_hz: 75.0
            }]
        );
        // Refresh-specific bands never warn.
        assert!(synthesize(256, 240, 50.0, 0, 0).unwrap().warnings.is_empty());
    }

    #[test]
    fn desktop_timing_is_well_formed() {
        let desktop = Modeline::desktop();
        assert_eq!(desktop.name, "d_mo");
        assert!(desktop.timing.is_well_formed());
        assert!(desktop.timing.interlaced());
        assert_eq!(Modeline::synthesized_name(3), "CRT3");
    }

    #[test]
    fn modeline_formats_as_newmode_arguments() {
        let line = timing(256, 240, 60.0).named("CRT1");
        assert_eq!(
            line.to_string(),
            "\"CRT1\" 4.901580 256 264 285 313 240 242 245 261 -HSync -VSync"
        );
        assert!(Modeline::desktop().to_string().ends_with("-HSync -VSync Interlace"));
    }
}
