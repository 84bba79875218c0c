// Copyright 2026 the Crtswitch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `RandR` display server.

use crtswitch_core::backend::{
    Barrier, Capabilities, ConnectionState, Connector, CrtcConfig, CrtcInfo, DisplayServer,
    ModeEntry, OutputInfo, ScreenResources, ScreenSize,
};
use crtswitch_core::modeline::{ModeFlags, Modeline};
use crtswitch_core::output::{CrtcId, ModeId, OutputId};
use crtswitch_core::rotation::Rotation;
use x11rb::connection::Connection as _;
use x11rb::protocol::randr::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{ConnectionExt as _, Window};
use x11rb::rust_connection::RustConnection;

use crate::X11Error;

/// Opens connections to an X server.
#[derive(Clone, Debug, Default)]
pub struct X11Connector {
    /// Display name such as `:0`; `None` uses `$DISPLAY`.
    pub display: Option<String>,
}

impl X11Connector {
    /// Creates a connector for `$DISPLAY`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a connector for a named display.
    #[must_use]
    pub fn with_display(display: impl Into<String>) -> Self {
        Self {
            display: Some(display.into()),
        }
    }
}

impl Connector for X11Connector {
    type Server = X11DisplayServer;

    fn connect(&self) -> Result<X11DisplayServer, X11Error> {
        X11DisplayServer::open(self.display.as_deref())
    }
}

/// A `RandR` connection to one X screen.
pub struct X11DisplayServer {
    conn: RustConnection,
    root: Window,
    screen: ScreenSize,
    config_timestamp: u32,
}

impl std::fmt::Debug for X11DisplayServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X11DisplayServer")
            .field("root", &self.root)
            .field("screen", &self.screen)
            .finish_non_exhaustive()
    }
}

impl X11DisplayServer {
    /// Connects to `display` and checks for `RandR` 1.2.
    pub fn open(display: Option<&str>) -> Result<Self, X11Error> {
        let (conn, screen_num) = RustConnection::connect(display)?;
        let root_screen = &conn.setup().roots[screen_num];
        let root = root_screen.root;
        let screen = ScreenSize {
            width: u32::from(root_screen.width_in_pixels),
            height: u32::from(root_screen.height_in_pixels),
            mm_width: u32::from(root_screen.width_in_millimeters),
            mm_height: u32::from(root_screen.height_in_millimeters),
        };

        let version = conn.randr_query_version(1, 2)?.reply()?;
        if (version.major_version, version.minor_version) < (1, 2) {
            return Err(X11Error::RandrUnavailable {
                major: version.major_version,
                minor: version.minor_version,
            });
        }

        let config_timestamp = conn
            .randr_get_screen_resources_current(root)?
            .reply()?
            .config_timestamp;

        Ok(Self {
            conn,
            root,
            screen,
            config_timestamp,
        })
    }

    /// Returns the root window, e.g. for [`X11Window`](crate::X11Window).
    #[must_use]
    pub fn root(&self) -> Window {
        self.root
    }

    pub(crate) fn connection(&self) -> &RustConnection {
        &self.conn
    }
}

fn narrow(value: u32, field: &'static str) -> Result<u16, X11Error> {
    u16::try_from(value).map_err(|_| X11Error::ValueOutOfRange(field))
}

fn narrow_pos(value: i32, field: &'static str) -> Result<i16, X11Error> {
    i16::try_from(value).map_err(|_| X11Error::ValueOutOfRange(field))
}

fn connection_state(c: randr::Connection) -> ConnectionState {
    match c {
        randr::Connection::CONNECTED => ConnectionState::Connected,
        randr::Connection::DISCONNECTED => ConnectionState::Disconnected,
        _ => ConnectionState::Unknown,
    }
}

fn rotation(r: randr::Rotation) -> Rotation {
    Rotation::from_bits_truncate(u16::from(r))
}

impl DisplayServer for X11DisplayServer {
    type Error = X11Error;

    fn capabilities(&self) -> Capabilities {
        Capabilities::CRT_SWITCHRES | Capabilities::SCREEN_ROTATION
    }

    fn screen_resources(&mut self) -> Result<ScreenResources, X11Error> {
        let reply = self
            .conn
            .randr_get_screen_resources_current(self.root)?
            .reply()?;
        self.config_timestamp = reply.config_timestamp;

        // Mode names are packed back to back in `names`.
        let mut names = reply.names.as_slice();
        let mut modes = Vec::with_capacity(reply.modes.len());
        for info in &reply.modes {
            let len = usize::from(info.name_len).min(names.len());
            let (name, rest) = names.split_at(len);
            names = rest;
            modes.push(ModeEntry {
                id: ModeId(info.id),
                name: String::from_utf8_lossy(name).into_owned(),
            });
        }

        Ok(ScreenResources {
            outputs: reply.outputs.into_iter().map(OutputId).collect(),
            crtcs: reply.crtcs.into_iter().map(CrtcId).collect(),
            modes,
        })
    }

    fn output_info(&mut self, output: OutputId) -> Result<OutputInfo, X11Error> {
        let reply = self
            .conn
            .randr_get_output_info(output.0, self.config_timestamp)?
            .reply()?;
        Ok(OutputInfo {
            name: String::from_utf8_lossy(&reply.name).into_owned(),
            connection: connection_state(reply.connection),
            crtc: CrtcId(reply.crtc),
            crtcs: reply.crtcs.into_iter().map(CrtcId).collect(),
            modes: reply.modes.into_iter().map(ModeId).collect(),
        })
    }

    fn crtc_info(&mut self, crtc: CrtcId) -> Result<CrtcInfo, X11Error> {
        let reply = self
            .conn
            .randr_get_crtc_info(crtc.0, self.config_timestamp)?
            .reply()?;
        Ok(CrtcInfo {
            x: i32::from(reply.x),
            y: i32::from(reply.y),
            width: u32::from(reply.width),
            height: u32::from(reply.height),
            mode: ModeId(reply.mode),
            rotation: rotation(reply.rotation),
            rotations: rotation(reply.rotations),
            outputs: reply.outputs.into_iter().map(OutputId).collect(),
        })
    }

    fn screen_size(&mut self) -> Result<ScreenSize, X11Error> {
        Ok(self.screen)
    }

    fn create_mode(&mut self, modeline: &Modeline) -> Result<ModeId, X11Error> {
        let t = &modeline.timing;
        let name = modeline.name.as_bytes();
        let info = randr::ModeInfo {
            id: 0,
            width: narrow(t.width, "mode width")?,
            height: narrow(t.height, "mode height")?,
            dot_clock: u32::try_from(t.pixel_clock)
                .map_err(|_| X11Error::ValueOutOfRange("pixel clock"))?,
            hsync_start: narrow(t.h_sync_start, "hsync start")?,
            hsync_end: narrow(t.h_sync_end, "hsync end")?,
            htotal: narrow(t.h_total, "htotal")?,
            hskew: narrow(t.h_skew, "hskew")?,
            vsync_start: narrow(t.v_sync_start, "vsync start")?,
            vsync_end: narrow(t.v_sync_end, "vsync end")?,
            vtotal: narrow(t.v_total, "vtotal")?,
            name_len: u16::try_from(name.len())
                .map_err(|_| X11Error::ValueOutOfRange("mode name"))?,
            mode_flags: mode_flag_bits(t.flags).into(),
        };
        let reply = self
            .conn
            .randr_create_mode(self.root, info, name)?
            .reply()?;
        Ok(ModeId(reply.mode))
    }

    fn destroy_mode(&mut self, mode: ModeId) -> Result<Barrier, X11Error> {
        self.conn.randr_destroy_mode(mode.0)?.check()?;
        Ok(Barrier::new())
    }

    fn add_output_mode(&mut self, output: OutputId, mode: ModeId) -> Result<Barrier, X11Error> {
        self.conn.randr_add_output_mode(output.0, mode.0)?.check()?;
        Ok(Barrier::new())
    }

    fn delete_output_mode(
        &mut self,
        output: OutputId,
        mode: ModeId,
    ) -> Result<Barrier, X11Error> {
        self.conn
            .randr_delete_output_mode(output.0, mode.0)?
            .check()?;
        Ok(Barrier::new())
    }

    fn disable_crtc(&mut self, crtc: CrtcId) -> Result<Barrier, X11Error> {
        self.set_crtc_config(
            crtc,
            &CrtcConfig {
                x: 0,
                y: 0,
                mode: ModeId::NONE,
                rotation: Rotation::ROTATE_0,
                outputs: Vec::new(),
            },
        )
    }

    fn set_crtc_config(&mut self, crtc: CrtcId, config: &CrtcConfig) -> Result<Barrier, X11Error> {
        let outputs: Vec<randr::Output> = config.outputs.iter().map(|o| o.0).collect();
        let reply = self
            .conn
            .randr_set_crtc_config(
                crtc.0,
                x11rb::CURRENT_TIME,
                self.config_timestamp,
                narrow_pos(config.x, "crtc x")?,
                narrow_pos(config.y, "crtc y")?,
                config.mode.0,
                randr::Rotation::from(config.rotation.bits()),
                &outputs,
            )?
            .reply()?;
        if reply.status != randr::SetConfig::SUCCESS {
            return Err(X11Error::ConfigRejected(u8::from(reply.status)));
        }
        Ok(Barrier::new())
    }

    fn set_screen_size(&mut self, size: &ScreenSize) -> Result<Barrier, X11Error> {
        self.conn
            .randr_set_screen_size(
                self.root,
                narrow(size.width, "screen width")?,
                narrow(size.height, "screen height")?,
                size.mm_width,
                size.mm_height,
            )?
            .check()?;
        self.screen = *size;
        Ok(Barrier::new())
    }

    fn grab(&mut self) -> Result<(), X11Error> {
        self.conn.grab_server()?.check()?;
        Ok(())
    }

    fn ungrab(&mut self) -> Result<Barrier, X11Error> {
        self.conn.ungrab_server()?.check()?;
        Ok(Barrier::new())
    }

    fn sync(&mut self, barrier: Barrier) -> Result<(), X11Error> {
        let _ = barrier;
        self.conn.get_input_focus()?.reply()?;
        Ok(())
    }
}

/// Maps mode flags onto `RandR` bits, which share the `xf86` layout.
fn mode_flag_bits(flags: ModeFlags) -> u32 {
    let mut bits = 0;
    for (flag, wire) in [
        (ModeFlags::HSYNC_POSITIVE, randr::ModeFlag::HSYNC_POSITIVE),
        (ModeFlags::HSYNC_NEGATIVE, randr::ModeFlag::HSYNC_NEGATIVE),
        (ModeFlags::VSYNC_POSITIVE, randr::ModeFlag::VSYNC_POSITIVE),
        (ModeFlags::VSYNC_NEGATIVE, randr::ModeFlag::VSYNC_NEGATIVE),
        (ModeFlags::INTERLACE, randr::ModeFlag::INTERLACE),
        (ModeFlags::DOUBLE_SCAN, randr::ModeFlag::DOUBLE_SCAN),
    ] {
        if flags.contains(flag) {
            bits |= u32::from(wire);
        }
    }
    bits
}
