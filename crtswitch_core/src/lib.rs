// Copyright 2026 the Crtswitch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CRT modeline synthesis and output-mode lifecycle.
//!
//! `crtswitch_core` turns a requested `width × height @ refresh` into a
//! 15 kHz-class CRT timing, registers it with a display server under a
//! generation-numbered name, and rebinds outputs to it. It is `no_std`
//! compatible (with `alloc`); all platform work sits behind the traits in
//! [`backend`].
//!
//! # Architecture
//!
//! ```text
//!   ModeRequest
//!       │
//!       ▼
//!   modeline::synthesize() ──► ModeTiming ──► CrtSession::apply()
//!                                                  │
//!                 ┌────────────────────────────────┘
//!                 ▼
//!   DisplayServer: create mode ─► add to outputs ─► reconfigure CRTCs
//!                 │
//!                 ▼
//!   CrtSession::teardown() ──► d_mo restored, CRT<n> destroyed
//! ```
//!
//! **[`modeline`]**: Timing synthesis from a raster size and refresh rate,
//! driven by the vertical band table.
//!
//! **[`session`]**: [`CrtSession`](session::CrtSession), which names,
//! registers, binds and finally destroys synthesized modes.
//!
//! **[`orientation`]**: Screen rotation through the same CRTC
//! reconfiguration sequence.
//!
//! **[`backend`]**: The [`DisplayServer`](backend::DisplayServer) and
//! [`Connector`](backend::Connector) traits backends implement.
//!
//! **[`window`]**: Video window opacity and decoration state.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types,
//! with the zero-overhead [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod backend;
pub mod error;
pub mod modeline;
pub mod orientation;
pub mod output;
pub mod rotation;
pub mod session;
pub mod trace;
pub mod window;
