// Copyright 2026 the Crtswitch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory model of a display server's outputs, CRTCs and modes.

use alloc::string::String;
use alloc::vec::Vec;

use crtswitch_core::backend::{Capabilities, ConnectionState, ScreenSize};
use crtswitch_core::modeline::{ModeFlags, ModeTiming, Modeline};
use crtswitch_core::output::{CrtcId, ModeId, OutputId};
use crtswitch_core::rotation::Rotation;

/// The 640×480 VGA timing most simulated monitors start in.
pub const VGA_640X480: ModeTiming = ModeTiming {
    pixel_clock: 25_175_000,
    width: 640,
    h_sync_start: 656,
    h_sync_end: 752,
    h_total: 800,
    h_skew: 0,
    height: 480,
    v_sync_start: 490,
    v_sync_end: 492,
    v_total: 525,
    flags: ModeFlags::HSYNC_NEGATIVE.union(ModeFlags::VSYNC_NEGATIVE),
};

/// A mutating request received by the simulated server.
///
/// Queries are not logged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerCall {
    /// A mode was registered under this name.
    CreateMode(String),
    /// A mode was destroyed.
    DestroyMode(ModeId),
    /// A mode was added to an output.
    AddOutputMode(OutputId, ModeId),
    /// A mode was removed from an output.
    DeleteOutputMode(OutputId, ModeId),
    /// A CRTC was blanked.
    DisableCrtc(CrtcId),
    /// A CRTC was configured.
    SetCrtcConfig(CrtcId, ModeId, Rotation),
    /// The screen was resized.
    SetScreenSize(ScreenSize),
    /// The server was grabbed.
    Grab,
    /// The grab was released.
    Ungrab,
    /// A barrier was waited on.
    Sync,
}

/// A simulated output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimOutput {
    /// Handle.
    pub id: OutputId,
    /// Connector name.
    pub name: String,
    /// Whether a monitor is attached.
    pub connection: ConnectionState,
    /// Driving CRTC, or [`CrtcId::NONE`].
    pub crtc: CrtcId,
    /// CRTCs able to drive the output.
    pub crtcs: Vec<CrtcId>,
    /// Accepted modes.
    pub modes: Vec<ModeId>,
}

/// A simulated CRTC.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimCrtc {
    /// Handle.
    pub id: CrtcId,
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Scanned-out mode, or [`ModeId::NONE`] when disabled.
    pub mode: ModeId,
    /// Current rotation.
    pub rotation: Rotation,
    /// Supported rotations.
    pub rotations: Rotation,
    /// Driven outputs.
    pub outputs: Vec<OutputId>,
}

/// Complete state of a simulated display server.
///
/// Build one with [`new`](Self::new) and the `add_*` methods, or start from a
/// preset such as [`single_crt`](Self::single_crt), then hand it to a
/// [`SimulatedConnector`](crate::SimulatedConnector).
#[derive(Clone, Debug)]
pub struct DisplayState {
    pub(crate) outputs: Vec<SimOutput>,
    pub(crate) crtcs: Vec<SimCrtc>,
    pub(crate) modes: Vec<(ModeId, Modeline)>,
    pub(crate) screen: ScreenSize,
    pub(crate) capabilities: Capabilities,
    pub(crate) calls: Vec<ServerCall>,
    pub(crate) pending: u32,
    pub(crate) grabbed: bool,
    pub(crate) refuse_connections: bool,
    pub(crate) reject_modes: bool,
    next_id: u32,
}

impl DisplayState {
    /// Creates a server with no outputs and the given screen.
    #[must_use]
    pub fn new(screen: ScreenSize) -> Self {
        Self {
            outputs: Vec::new(),
            crtcs: Vec::new(),
            modes: Vec::new(),
            screen,
            capabilities: Capabilities::CRT_SWITCHRES | Capabilities::SCREEN_ROTATION,
            calls: Vec::new(),
            pending: 0,
            grabbed: false,
            refuse_connections: false,
            reject_modes: false,
            // Handles share one counter, like XIDs.
            next_id: 0x40,
        }
    }

    /// One connected `VGA-0` output scanning out 640×480 on a CRTC that
    /// supports `rotations`, plus a disconnected `HDMI-0`.
    #[must_use]
    pub fn single_crt(rotations: Rotation) -> Self {
        let mut state = Self::new(ScreenSize::at_dpi(640, 480, ScreenSize::DEFAULT_DPI));
        let native = state.add_mode(VGA_640X480.named("640x480"));
        let crtc = state.add_crtc(rotations);
        let vga = state.add_output("VGA-0", ConnectionState::Connected, &[crtc]);
        state.add_output("HDMI-0", ConnectionState::Disconnected, &[]);
        state.enable(crtc, native, &[vga]);
        state
    }

    fn alloc_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Registers a mode directly, bypassing the request log.
    pub fn add_mode(&mut self, modeline: Modeline) -> ModeId {
        let id = ModeId(self.alloc_id());
        self.modes.push((id, modeline));
        id
    }

    /// Adds a disabled CRTC.
    pub fn add_crtc(&mut self, rotations: Rotation) -> CrtcId {
        let id = CrtcId(self.alloc_id());
        self.crtcs.push(SimCrtc {
            id,
            x: 0,
            y: 0,
            mode: ModeId::NONE,
            rotation: Rotation::ROTATE_0,
            rotations: rotations | Rotation::ROTATE_0,
            outputs: Vec::new(),
        });
        id
    }

    /// Adds an output that may be driven by `crtcs`.
    pub fn add_output(
        &mut self,
        name: &str,
        connection: ConnectionState,
        crtcs: &[CrtcId],
    ) -> OutputId {
        let id = OutputId(self.alloc_id());
        self.outputs.push(SimOutput {
            id,
            name: name.into(),
            connection,
            crtc: CrtcId::NONE,
            crtcs: crtcs.to_vec(),
            modes: Vec::new(),
        });
        id
    }

    /// Lights up a CRTC at the origin, listing `mode` on each output.
    pub fn enable(&mut self, crtc: CrtcId, mode: ModeId, outputs: &[OutputId]) {
        for output in self.outputs.iter_mut().filter(|o| outputs.contains(&o.id)) {
            output.crtc = crtc;
            if !output.modes.contains(&mode) {
                output.modes.push(mode);
            }
        }
        if let Some(c) = self.crtcs.iter_mut().find(|c| c.id == crtc) {
            c.mode = mode;
            c.outputs = outputs.to_vec();
        }
    }

    /// Resizes the screen directly, bypassing the request log and checks.
    pub fn set_screen(&mut self, screen: ScreenSize) {
        self.screen = screen;
    }

    /// Rotates a CRTC directly, bypassing the request log and checks.
    pub fn set_rotation(&mut self, crtc: CrtcId, rotation: Rotation) {
        if let Some(c) = self.crtcs.iter_mut().find(|c| c.id == crtc) {
            c.rotation = rotation;
        }
    }

    /// Makes every following connection attempt fail.
    pub fn set_refuse_connections(&mut self, refuse: bool) {
        self.refuse_connections = refuse;
    }

    /// Makes every following mode registration fail.
    pub fn set_reject_modes(&mut self, reject: bool) {
        self.reject_modes = reject;
    }

    /// Overrides the advertised capabilities.
    pub fn set_capabilities(&mut self, capabilities: Capabilities) {
        self.capabilities = capabilities;
    }

    /// Returns the mutating requests received so far.
    #[must_use]
    pub fn calls(&self) -> &[ServerCall] {
        &self.calls
    }

    /// Forgets the request log.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Returns `true` while a client holds a grab.
    #[must_use]
    pub fn is_grabbed(&self) -> bool {
        self.grabbed
    }

    /// Returns the current screen size.
    #[must_use]
    pub fn screen(&self) -> ScreenSize {
        self.screen
    }

    /// Looks up an output.
    #[must_use]
    pub fn output(&self, id: OutputId) -> Option<&SimOutput> {
        self.outputs.iter().find(|o| o.id == id)
    }

    /// Looks up an output by connector name.
    #[must_use]
    pub fn output_named(&self, name: &str) -> Option<&SimOutput> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Looks up a CRTC.
    #[must_use]
    pub fn crtc(&self, id: CrtcId) -> Option<&SimCrtc> {
        self.crtcs.iter().find(|c| c.id == id)
    }

    /// Looks up a mode by name.
    #[must_use]
    pub fn mode_named(&self, name: &str) -> Option<ModeId> {
        self.modes.iter().find(|(_, m)| m.name == name).map(|(id, _)| *id)
    }

    /// Returns a mode's modeline.
    #[must_use]
    pub fn modeline(&self, id: ModeId) -> Option<&Modeline> {
        self.modes.iter().find(|(m, _)| *m == id).map(|(_, m)| m)
    }

    /// Returns the names of every registered mode.
    #[must_use]
    pub fn mode_names(&self) -> Vec<&str> {
        self.modes.iter().map(|(_, m)| m.name.as_str()).collect()
    }

    /// Returns `true` if any CRTC scans out `mode` or any output lists it.
    #[must_use]
    pub fn is_referenced(&self, mode: ModeId) -> bool {
        self.crtcs.iter().any(|c| c.mode == mode)
            || self.outputs.iter().any(|o| o.modes.contains(&mode))
    }

    /// Returns the scanned-out size of a CRTC after rotation, or zero when
    /// disabled.
    #[must_use]
    pub fn crtc_extent(&self, crtc: &SimCrtc) -> (u32, u32) {
        let Some(modeline) = self.modeline(crtc.mode) else {
            return (0, 0);
        };
        let (w, h) = (modeline.timing.width, modeline.timing.height);
        if crtc.rotation.is_portrait() {
            (h, w)
        } else {
            (w, h)
        }
    }
}
