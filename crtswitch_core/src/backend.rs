// Copyright 2026 the Crtswitch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend contract for display-server integrations.
//!
//! Crtswitch splits platform-specific work into *backend* crates. Each
//! backend provides the following pieces:
//!
//! - **Connector**: Implements [`Connector`] to open a fresh connection to
//!   the display server. Every session operation connects and drops
//!   the connection, so a failed connect never leaves partial state.
//!
//! - **Display server**: Implements [`DisplayServer`], the queries for outputs,
//!   CRTCs and modes, plus the mutating requests that register modes and
//!   reconfigure CRTCs.
//!
//! - **Barriers**: Every mutating request returns a [`Barrier`] that must be
//!   handed back to [`DisplayServer::sync`] before a dependent request is
//!   issued. The session code routes all CRTC changes through a single
//!   disable → resize → reattach helper, so the ordering lives in one place.
//!
//! # Crate boundaries
//!
//! `crtswitch_core` owns the timing model, the session lifecycle and this
//! contract module. Backend crates depend on `crtswitch_core` and provide
//! platform glue. Frontends depend on both and drive a
//! [`CrtSession`](crate::session::CrtSession).

use alloc::string::String;
use alloc::vec::Vec;

use crate::modeline::Modeline;
use crate::output::{CrtcId, ModeId, OutputId};
use crate::rotation::Rotation;

bitflags::bitflags! {
    /// Optional features a display server supports.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// Custom modelines can be created and bound at runtime.
        const CRT_SWITCHRES = 1 << 0;
        /// CRTCs can be rotated.
        const SCREEN_ROTATION = 1 << 1;
    }
}

/// Proof that a mutating request was issued and still needs a round trip.
///
/// Returned by every mutating [`DisplayServer`] method and consumed by
/// [`DisplayServer::sync`].
#[must_use = "mutating display-server requests must be followed by `sync`"]
#[derive(Debug)]
pub struct Barrier {
    _private: (),
}

impl Barrier {
    /// Creates a barrier. Backends call this from their mutating requests.
    #[inline]
    pub const fn new() -> Self {
        Self { _private: () }
    }
}

impl Default for Barrier {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a monitor is attached to an output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// A monitor is attached.
    Connected,
    /// Nothing is attached.
    Disconnected,
    /// The server cannot tell.
    Unknown,
}

/// A mode known to the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeEntry {
    /// Server-assigned handle.
    pub id: ModeId,
    /// Mode name.
    pub name: String,
}

/// Snapshot of the server's outputs, CRTCs and modes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScreenResources {
    /// Outputs in server order.
    pub outputs: Vec<OutputId>,
    /// CRTCs in server order.
    pub crtcs: Vec<CrtcId>,
    /// Every registered mode.
    pub modes: Vec<ModeEntry>,
}

impl ScreenResources {
    /// Looks up a mode by name.
    #[must_use]
    pub fn find_mode(&self, name: &str) -> Option<ModeId> {
        self.modes.iter().find(|m| m.name == name).map(|m| m.id)
    }
}

/// State of one output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputInfo {
    /// Connector name, e.g. `VGA-0`.
    pub name: String,
    /// Whether a monitor is attached.
    pub connection: ConnectionState,
    /// CRTC currently driving the output, or [`CrtcId::NONE`].
    pub crtc: CrtcId,
    /// CRTCs able to drive the output.
    pub crtcs: Vec<CrtcId>,
    /// Modes the output accepts.
    pub modes: Vec<ModeId>,
}

impl OutputInfo {
    /// Returns `true` if a monitor is attached.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }
}

/// State of one CRTC.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrtcInfo {
    /// Left edge within the screen.
    pub x: i32,
    /// Top edge within the screen.
    pub y: i32,
    /// Scanned-out width, after rotation. Zero when disabled.
    pub width: u32,
    /// Scanned-out height, after rotation. Zero when disabled.
    pub height: u32,
    /// Current mode, or [`ModeId::NONE`].
    pub mode: ModeId,
    /// Current rotation.
    pub rotation: Rotation,
    /// Supported rotations.
    pub rotations: Rotation,
    /// Outputs the CRTC drives.
    pub outputs: Vec<OutputId>,
}

impl CrtcInfo {
    /// Returns `true` if the CRTC scans out a non-empty area.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.width != 0 && self.height != 0
    }

    /// Captures the parts of the configuration restored after a mode change.
    #[must_use]
    pub fn snapshot(&self) -> CrtcSnapshot {
        CrtcSnapshot {
            x: self.x,
            y: self.y,
            rotation: self.rotation,
            mode: self.mode,
        }
    }
}

/// CRTC configuration captured before it is mutated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CrtcSnapshot {
    /// Left edge within the screen.
    pub x: i32,
    /// Top edge within the screen.
    pub y: i32,
    /// Rotation.
    pub rotation: Rotation,
    /// Mode.
    pub mode: ModeId,
}

/// A CRTC configuration to apply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrtcConfig {
    /// Left edge within the screen.
    pub x: i32,
    /// Top edge within the screen.
    pub y: i32,
    /// Mode to scan out.
    pub mode: ModeId,
    /// Rotation.
    pub rotation: Rotation,
    /// Outputs to drive.
    pub outputs: Vec<OutputId>,
}

/// Virtual screen size in pixels and physical millimeters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScreenSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Physical width in millimeters.
    pub mm_width: u32,
    /// Physical height in millimeters.
    pub mm_height: u32,
}

impl ScreenSize {
    /// Density assumed when a mode change resizes the screen.
    pub const DEFAULT_DPI: f64 = 96.0;

    /// Computes a screen size whose physical dimensions match `dpi`.
    ///
    /// Millimeters are truncated toward zero.
    #[must_use]
    pub fn at_dpi(width: u32, height: u32, dpi: f64) -> Self {
        Self {
            width,
            height,
            mm_width: pixels_to_mm(width, dpi),
            mm_height: pixels_to_mm(height, dpi),
        }
    }

    /// Returns the vertical density, or [`Self::DEFAULT_DPI`] when the
    /// physical height is unknown.
    #[must_use]
    pub fn dpi(&self) -> f64 {
        if self.mm_height == 0 {
            Self::DEFAULT_DPI
        } else {
            25.4 * f64::from(self.height) / f64::from(self.mm_height)
        }
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "physical size is truncated to whole millimeters"
)]
fn pixels_to_mm(pixels: u32, dpi: f64) -> u32 {
    (25.4 * f64::from(pixels) / dpi) as u32
}

/// Requests understood by a display server.
///
/// Query methods are round trips and need no barrier. Mutating methods
/// return a [`Barrier`] that must be passed to [`sync`](Self::sync) before the
/// next request that depends on the mutation.
pub trait DisplayServer {
    /// Error type for failed requests.
    type Error: core::error::Error;

    /// Returns the optional features this server supports.
    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    /// Queries outputs, CRTCs and modes.
    fn screen_resources(&mut self) -> Result<ScreenResources, Self::Error>;

    /// Queries one output.
    fn output_info(&mut self, output: OutputId) -> Result<OutputInfo, Self::Error>;

    /// Queries one CRTC.
    fn crtc_info(&mut self, crtc: CrtcId) -> Result<CrtcInfo, Self::Error>;

    /// Queries the current virtual screen size.
    fn screen_size(&mut self) -> Result<ScreenSize, Self::Error>;

    /// Registers a new mode and returns its handle.
    fn create_mode(&mut self, modeline: &Modeline) -> Result<ModeId, Self::Error>;

    /// Destroys a mode. It must no longer be attached to any output.
    fn destroy_mode(&mut self, mode: ModeId) -> Result<Barrier, Self::Error>;

    /// Adds a mode to an output's list of accepted modes.
    fn add_output_mode(&mut self, output: OutputId, mode: ModeId)
    -> Result<Barrier, Self::Error>;

    /// Removes a mode from an output's list of accepted modes.
    fn delete_output_mode(
        &mut self,
        output: OutputId,
        mode: ModeId,
    ) -> Result<Barrier, Self::Error>;

    /// Blanks a CRTC, detaching it from its outputs.
    fn disable_crtc(&mut self, crtc: CrtcId) -> Result<Barrier, Self::Error>;

    /// Applies a CRTC configuration.
    fn set_crtc_config(
        &mut self,
        crtc: CrtcId,
        config: &CrtcConfig,
    ) -> Result<Barrier, Self::Error>;

    /// Resizes the virtual screen.
    fn set_screen_size(&mut self, size: &ScreenSize) -> Result<Barrier, Self::Error>;

    /// Blocks other clients until [`ungrab`](Self::ungrab).
    fn grab(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Releases a [`grab`](Self::grab).
    fn ungrab(&mut self) -> Result<Barrier, Self::Error> {
        Ok(Barrier::new())
    }

    /// Waits until the server has processed every request issued so far.
    fn sync(&mut self, barrier: Barrier) -> Result<(), Self::Error>;
}

/// Opens connections to a display server.
pub trait Connector {
    /// Connected server type.
    type Server: DisplayServer;

    /// Opens a new connection.
    fn connect(&self) -> Result<Self::Server, <Self::Server as DisplayServer>::Error>;
}

/// Receives the effective refresh rate after a resolution change, so the
/// playback and audio-sync layers can adjust.
pub trait RefreshObserver {
    /// Called with the requested refresh rate in Hz.
    fn refresh_rate_changed(&mut self, hz: f64);
}

impl<F: FnMut(f64)> RefreshObserver for F {
    fn refresh_rate_changed(&mut self, hz: f64) {
        self(hz);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_size_at_96_dpi() {
        let size = ScreenSize::at_dpi(320, 240, ScreenSize::DEFAULT_DPI);
        assert_eq!(size.mm_width, 84);
        assert_eq!(size.mm_height, 63);
        let size = ScreenSize::at_dpi(700, 480, ScreenSize::DEFAULT_DPI);
        assert_eq!((size.mm_width, size.mm_height), (185, 127));
    }

    #[test]
    fn dpi_falls_back_without_physical_size() {
        let size = ScreenSize {
            width: 1920,
            height: 1080,
            mm_width: 0,
            mm_height: 0,
        };
        assert!((size.dpi() - ScreenSize::DEFAULT_DPI).abs() < f64::EPSILON);

        let size = ScreenSize::at_dpi(1920, 1080, 72.0);
        assert!((size.dpi() - 72.0).abs() < 0.5);
    }

    #[test]
    fn closures_observe_refresh_rate() {
        let mut seen = None;
        {
            let mut observer = |hz: f64| seen = Some(hz);
            observer.refresh_rate_changed(59.94);
        }
        assert_eq!(seen, Some(59.94));
    }
}
