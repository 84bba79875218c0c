// Copyright 2026 the Crtswitch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! X11 backend for Crtswitch.
//!
//! This crate implements the [`crtswitch_core::backend`] contract over the
//! `RandR` extension using `x11rb`:
//!
//! - [`X11Connector`] opens a connection to `$DISPLAY` (or a named display)
//!   and checks that `RandR` 1.2 or later is available.
//! - [`X11DisplayServer`] maps outputs, CRTCs and modes onto `RandR`
//!   requests. Mutating requests are checked, and [`sync`] performs a round
//!   trip like `XSync`.
//! - [`X11Window`] writes `_NET_WM_WINDOW_OPACITY` for
//!   [`WindowChrome`](crtswitch_core::window::WindowChrome).
//!
//! [`sync`]: crtswitch_core::backend::DisplayServer::sync

mod error;
mod server;
mod window;

pub use error::X11Error;
pub use server::{X11Connector, X11DisplayServer};
pub use window::X11Window;
