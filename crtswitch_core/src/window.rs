// Copyright 2026 the Crtswitch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Video window chrome: opacity and decorations.

/// Window opacity as a percentage, clamped to `0..=100`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Opacity(u8);

impl Opacity {
    /// Fully opaque.
    pub const OPAQUE: Self = Self(100);

    /// Creates an opacity, clamping values above 100.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "checked <= 100 first")]
    pub const fn from_percent(percent: u32) -> Self {
        if percent > 100 {
            Self::OPAQUE
        } else {
            Self(percent as u8)
        }
    }

    /// Returns the percentage.
    #[must_use]
    pub const fn percent(self) -> u32 {
        self.0 as u32
    }

    /// Returns the 32-bit cardinal written to the window property, or `None`
    /// when the window is fully opaque and the property should be removed.
    ///
    /// The scale is applied in floating point and truncated, so 50% maps to
    /// `0x7FFF_FFFF`.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "below u32::MAX for < 100%")]
    pub fn to_cardinal(self) -> Option<u32> {
        if self.0 >= 100 {
            None
        } else {
            Some((f64::from(self.0) * (f64::from(u32::MAX) / 100.0)) as u32)
        }
    }
}

impl Default for Opacity {
    fn default() -> Self {
        Self::OPAQUE
    }
}

/// Writes window properties understood by the compositor.
pub trait WindowProperties {
    /// Error type for failed writes.
    type Error: core::error::Error;

    /// Sets the opacity cardinal, or removes the property for `None`.
    fn set_opacity_cardinal(&mut self, cardinal: Option<u32>) -> Result<(), Self::Error>;
}

/// Opacity and decoration state of the video window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowChrome {
    opacity: Opacity,
    decorations: bool,
}

impl Default for WindowChrome {
    fn default() -> Self {
        Self {
            opacity: Opacity::OPAQUE,
            decorations: true,
        }
    }
}

impl WindowChrome {
    /// Creates chrome for an opaque, decorated window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current opacity.
    #[must_use]
    pub fn opacity(&self) -> Opacity {
        self.opacity
    }

    /// Returns `true` if the window should carry decorations.
    #[must_use]
    pub fn decorations(&self) -> bool {
        self.decorations
    }

    /// Applies an opacity to the window and records it.
    ///
    /// The recorded value only changes once the write succeeded.
    pub fn set_opacity<P: WindowProperties>(
        &mut self,
        props: &mut P,
        opacity: Opacity,
    ) -> Result<(), P::Error> {
        props.set_opacity_cardinal(opacity.to_cardinal())?;
        self.opacity = opacity;
        Ok(())
    }

    /// Records the decoration flag.
    ///
    /// Decorations are applied when the frontend recreates the window, so
    /// nothing is written here. Returns `true` if the flag changed.
    pub fn set_decorations(&mut self, on: bool) -> bool {
        let changed = self.decorations != on;
        self.decorations = on;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use core::fmt;

    #[derive(Debug)]
    struct Never;

    impl fmt::Display for Never {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("never")
        }
    }

    impl core::error::Error for Never {}

    #[derive(Default)]
    struct Props {
        writes: Vec<Option<u32>>,
    }

    impl WindowProperties for Props {
        type Error = Never;

        fn set_opacity_cardinal(&mut self, cardinal: Option<u32>) -> Result<(), Never> {
            self.writes.push(cardinal);
            Ok(())
        }
    }

    #[test]
    fn cardinal_scales_percent() {
        assert_eq!(Opacity::from_percent(0).to_cardinal(), Some(0));
        assert_eq!(Opacity::from_percent(50).to_cardinal(), Some(0x7FFF_FFFF));
        assert_eq!(Opacity::from_percent(1).to_cardinal(), Some(42_949_672));
        assert_eq!(Opacity::from_percent(100).to_cardinal(), None);
        assert_eq!(Opacity::from_percent(250), Opacity::OPAQUE);
    }

    #[test]
    fn opaque_removes_the_property() {
        let mut chrome = WindowChrome::new();
        let mut props = Props::default();
        chrome.set_opacity(&mut props, Opacity::from_percent(50)).unwrap();
        chrome.set_opacity(&mut props, Opacity::OPAQUE).unwrap();
        assert_eq!(props.writes, [Some(0x7FFF_FFFF), None]);
        assert_eq!(chrome.opacity(), Opacity::OPAQUE);
    }

    #[test]
    fn decorations_report_changes() {
        let mut chrome = WindowChrome::new();
        assert!(!chrome.set_decorations(true));
        assert!(chrome.set_decorations(false));
        assert!(!chrome.decorations());
    }
}
