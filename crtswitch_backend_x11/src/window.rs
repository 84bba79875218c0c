// Copyright 2026 the Crtswitch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crtswitch_core::window::WindowProperties;
use x11rb::connection::Connection as _;
use x11rb::protocol::xproto::{Atom, AtomEnum, ConnectionExt as _, PropMode, Window};
use x11rb::wrapper::ConnectionExt as _;

use crate::{X11DisplayServer, X11Error};

/// A frontend window whose EWMH properties can be written.
#[derive(Debug)]
pub struct X11Window<'a> {
    server: &'a X11DisplayServer,
    window: Window,
    opacity: Atom,
}

impl<'a> X11Window<'a> {
    /// Wraps `window`, interning the atoms it needs.
    pub fn new(server: &'a X11DisplayServer, window: Window) -> Result<Self, X11Error> {
        let opacity = server
            .connection()
            .intern_atom(false, b"_NET_WM_WINDOW_OPACITY")?
            .reply()?
            .atom;
        Ok(Self {
            server,
            window,
            opacity,
        })
    }
}

impl WindowProperties for X11Window<'_> {
    type Error = X11Error;

    fn set_opacity_cardinal(&mut self, cardinal: Option<u32>) -> Result<(), X11Error> {
        let conn = self.server.connection();
        match cardinal {
            Some(value) => {
                conn.change_property32(
                    PropMode::REPLACE,
                    self.window,
                    self.opacity,
                    AtomEnum::CARDINAL,
                    &[value],
                )?
                .check()?;
            }
            None => {
                conn.delete_property(self.window, self.opacity)?.check()?;
            }
        }
        conn.flush()?;
        Ok(())
    }
}
