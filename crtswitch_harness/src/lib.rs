// Copyright 2026 the Crtswitch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated display server for exercising CRT switching without hardware.
//!
//! [`DisplayState`] models outputs, CRTCs and modes with the protocol
//! checks a real `RandR` server applies: modes still in use cannot be
//! destroyed, a lit CRTC must fit inside the screen, and outputs only accept
//! modes on their list. On top of that, every request fails while a barrier
//! is unsynced, which makes missing round trips visible in tests.
//!
//! [`SimulatedConnector`] shares one state between connections so tests can
//! inspect it after each session operation.

#![no_std]

extern crate alloc;

mod server;
mod state;

pub use server::{SimError, SimulatedConnector, SimulatedDisplay};
pub use state::{DisplayState, ServerCall, SimCrtc, SimOutput, VGA_640X480};
