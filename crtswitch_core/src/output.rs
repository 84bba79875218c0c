// Copyright 2026 the Crtswitch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display output, CRTC and mode identification.
//!
//! [`OutputId`], [`CrtcId`] and [`ModeId`] are lightweight handles assigned by
//! the display server; core treats them as opaque. [`OutputSelector`] picks the
//! outputs a resolution change applies to, and [`OutputNames`] is the list of
//! connector names offered to the frontend for selection.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// Identifies a physical display connector (e.g. `VGA-0`).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct OutputId(pub u32);

impl fmt::Debug for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutputId({})", self.0)
    }
}

/// Identifies a display controller (CRTC).
///
/// The zero value means "no CRTC", matching the X protocol's `None`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CrtcId(pub u32);

impl CrtcId {
    /// The "no CRTC" handle.
    pub const NONE: Self = Self(0);

    /// Returns `true` if this is the "no CRTC" handle.
    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for CrtcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CrtcId({})", self.0)
    }
}

/// Identifies a mode registered with the display server.
///
/// The zero value means "no mode"; a CRTC configured with it is disabled.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ModeId(pub u32);

impl ModeId {
    /// The "no mode" handle.
    pub const NONE: Self = Self(0);
}

impl fmt::Debug for ModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModeId({})", self.0)
    }
}

/// Which outputs a resolution change targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum OutputSelector {
    /// The output at this index in the server's output list.
    Specific(u32),
    /// Every output that currently has a monitor connected.
    #[default]
    All,
}

impl OutputSelector {
    /// Index that older frontend settings store to mean every output.
    pub const LEGACY_ALL: u32 = 20;

    /// Converts a stored settings index, mapping [`Self::LEGACY_ALL`] to
    /// [`OutputSelector::All`].
    #[must_use]
    pub const fn from_setting(index: u32) -> Self {
        if index == Self::LEGACY_ALL {
            Self::All
        } else {
            Self::Specific(index)
        }
    }

    /// Resolves the selector against the server's output list.
    ///
    /// A specific index that is out of range is returned as the error.
    pub fn resolve(self, outputs: &[OutputId]) -> Result<Vec<OutputId>, u32> {
        match self {
            Self::All => Ok(outputs.to_vec()),
            Self::Specific(index) => usize::try_from(index)
                .ok()
                .and_then(|i| outputs.get(i))
                .map(|output| alloc::vec![*output])
                .ok_or(index),
        }
    }
}

/// Connector names in server order, for frontend selection menus.
///
/// The pipe-delimited form (`HDMI-0|VGA-0`) is produced only by the
/// [`Display`](fmt::Display) implementation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutputNames(pub Vec<String>);

impl OutputNames {
    /// Returns the number of names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no names.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the index of the output with the given name, suitable for
    /// [`OutputSelector::Specific`].
    #[must_use]
    pub fn position(&self, name: &str) -> Option<u32> {
        self.0
            .iter()
            .position(|n| n == name)
            .and_then(|i| u32::try_from(i).ok())
    }
}

impl fmt::Display for OutputNames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, name) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}
