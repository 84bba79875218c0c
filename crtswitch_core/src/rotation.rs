// Copyright 2026 the Crtswitch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Screen orientation and CRTC rotation bits.

bitflags::bitflags! {
    /// CRTC rotation and reflection bits, in `RandR` wire layout.
    ///
    /// A CRTC reports both its current rotation (exactly one rotation bit,
    /// optionally with reflections) and the set of rotations it supports.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Rotation: u16 {
        /// No rotation.
        const ROTATE_0 = 1 << 0;
        /// Rotated 90° counter-clockwise.
        const ROTATE_90 = 1 << 1;
        /// Upside down.
        const ROTATE_180 = 1 << 2;
        /// Rotated 270° counter-clockwise.
        const ROTATE_270 = 1 << 3;
        /// Mirrored horizontally.
        const REFLECT_X = 1 << 4;
        /// Mirrored vertically.
        const REFLECT_Y = 1 << 5;
    }
}

impl Rotation {
    /// Returns `true` if the rotation scans out sideways, so the CRTC's width
    /// and height are swapped relative to the mode.
    #[inline]
    #[must_use]
    pub const fn is_portrait(self) -> bool {
        self.intersects(Self::ROTATE_90.union(Self::ROTATE_270))
    }
}

/// Logical screen orientation chosen by the frontend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    /// Upright.
    #[default]
    Normal,
    /// Portrait, for vertical arcade monitors.
    Vertical,
    /// Upside down.
    Flipped,
    /// Portrait, turned the other way.
    FlippedRotated,
}

impl Orientation {
    /// Returns the rotation bit that realizes this orientation.
    #[must_use]
    pub const fn rotation(self) -> Rotation {
        match self {
            Self::Normal => Rotation::ROTATE_0,
            Self::Vertical => Rotation::ROTATE_270,
            Self::Flipped => Rotation::ROTATE_180,
            Self::FlippedRotated => Rotation::ROTATE_90,
        }
    }

    /// Maps a CRTC's current rotation back to an orientation.
    ///
    /// Only an exact single rotation bit is recognized; anything else,
    /// including reflected rotations, reads as [`Orientation::Normal`].
    #[must_use]
    pub fn from_rotation(rotation: Rotation) -> Self {
        if rotation == Rotation::ROTATE_270 {
            Self::Vertical
        } else if rotation == Rotation::ROTATE_180 {
            Self::Flipped
        } else if rotation == Rotation::ROTATE_90 {
            Self::FlippedRotated
        } else {
            Self::Normal
        }
    }

    /// Returns `true` for the two sideways orientations.
    #[must_use]
    pub const fn is_portrait(self) -> bool {
        matches!(self, Self::Vertical | Self::FlippedRotated)
    }
}
