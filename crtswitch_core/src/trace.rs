// Copyright 2026 the Crtswitch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for mode switching.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! session and orientation code call at each step. All method bodies default
//! to no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).

use crate::backend::ScreenSize;
use crate::modeline::{ModeTiming, TimingWarning};
use crate::output::{CrtcId, ModeId, OutputId};
use crate::rotation::Rotation;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Why an output or CRTC was left untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// No monitor is attached to the output.
    NotConnected,
    /// The output is not driven by any CRTC.
    NoCrtc,
    /// The CRTC scans out nothing.
    Disabled,
    /// The CRTC does not support the requested rotation.
    RotationUnsupported,
    /// The CRTC was already handled through another output.
    AlreadyVisited,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted after a timing has been synthesized and named.
#[derive(Clone, Copy, Debug)]
pub struct ModeSynthesizedEvent<'a> {
    /// Mode name.
    pub name: &'a str,
    /// Synthesized timing.
    pub timing: ModeTiming,
    /// Vertical band that set the total.
    pub band: usize,
    /// Quality warnings.
    pub warnings: &'a [TimingWarning],
}

/// Emitted once a mode has a server handle.
#[derive(Clone, Copy, Debug)]
pub struct ModeRegisteredEvent<'a> {
    /// Mode name.
    pub name: &'a str,
    /// Server handle.
    pub mode: ModeId,
    /// `true` if a mode with this name already existed.
    pub reused: bool,
}

/// Emitted when an output or CRTC is skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputSkippedEvent {
    /// The output being processed.
    pub output: OutputId,
    /// The CRTC being processed, or [`CrtcId::NONE`].
    pub crtc: CrtcId,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// Emitted after a CRTC went through the disable → resize → reattach
/// sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CrtcReconfiguredEvent {
    /// Reconfigured CRTC.
    pub crtc: CrtcId,
    /// Mode now scanned out.
    pub mode: ModeId,
    /// Rotation now applied.
    pub rotation: Rotation,
    /// Left edge within the screen.
    pub x: i32,
    /// Top edge within the screen.
    pub y: i32,
    /// Screen size set during the sequence.
    pub screen: ScreenSize,
}

/// Emitted after a synthesized mode was destroyed.
#[derive(Clone, Copy, Debug)]
pub struct ModeDestroyedEvent<'a> {
    /// Mode name.
    pub name: &'a str,
    /// Former server handle.
    pub mode: ModeId,
    /// Number of outputs the mode was detached from first.
    pub detached_outputs: u32,
}

/// Emitted when a CRTC's rotation changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrientationChangedEvent {
    /// Rotated CRTC.
    pub crtc: CrtcId,
    /// Rotation before the change.
    pub from: Rotation,
    /// Rotation after the change.
    pub to: Rotation,
}

/// Emitted at the end of a session teardown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TeardownEvent {
    /// Number of generations the session produced.
    pub generations: u32,
    /// Number of outputs switched back to the desktop mode.
    pub restored_outputs: u32,
    /// Number of synthesized modes destroyed.
    pub destroyed_modes: u32,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from mode switching.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a timing has been synthesized.
    fn on_mode_synthesized(&mut self, e: &ModeSynthesizedEvent<'_>) {
        _ = e;
    }

    /// Called when a mode was created or found by name.
    fn on_mode_registered(&mut self, e: &ModeRegisteredEvent<'_>) {
        _ = e;
    }

    /// Called when an output or CRTC is skipped.
    fn on_output_skipped(&mut self, e: &OutputSkippedEvent) {
        _ = e;
    }

    /// Called after a CRTC has been reconfigured.
    fn on_crtc_reconfigured(&mut self, e: &CrtcReconfiguredEvent) {
        _ = e;
    }

    /// Called after a mode has been destroyed.
    fn on_mode_destroyed(&mut self, e: &ModeDestroyedEvent<'_>) {
        _ = e;
    }

    /// Called after a CRTC has been rotated.
    fn on_orientation_changed(&mut self, e: &OrientationChangedEvent) {
        _ = e;
    }

    /// Called at the end of a teardown.
    fn on_teardown(&mut self, e: &TeardownEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`ModeSynthesizedEvent`].
    #[inline]
    pub fn mode_synthesized(&mut self, e: &ModeSynthesizedEvent<'_>) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_mode_synthesized(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`ModeRegisteredEvent`].
    #[inline]
    pub fn mode_registered(&mut self, e: &ModeRegisteredEvent<'_>) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_mode_registered(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`OutputSkippedEvent`].
    #[inline]
    pub fn output_skipped(&mut self, e: &OutputSkippedEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_output_skipped(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`CrtcReconfiguredEvent`].
    #[inline]
    pub fn crtc_reconfigured(&mut self, e: &CrtcReconfiguredEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_crtc_reconfigured(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`ModeDestroyedEvent`].
    #[inline]
    pub fn mode_destroyed(&mut self, e: &ModeDestroyedEvent<'_>) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_mode_destroyed(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`OrientationChangedEvent`].
    #[inline]
    pub fn orientation_changed(&mut self, e: &OrientationChangedEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_orientation_changed(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`TeardownEvent`].
    #[inline]
    pub fn teardown(&mut self, e: &TeardownEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_teardown(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_skip() -> OutputSkippedEvent {
        OutputSkippedEvent {
            output: OutputId(3),
            crtc: CrtcId::NONE,
            reason: SkipReason::NotConnected,
        }
    }

    #[test]
    fn noop_sink_compiles() {
        let mut sink = NoopSink;
        sink.on_output_skipped(&sample_skip());
        sink.on_mode_registered(&ModeRegisteredEvent {
            name: "CRT1",
            mode: ModeId(7),
            reused: false,
        });
        sink.on_teardown(&TeardownEvent {
            generations: 1,
            restored_outputs: 1,
            destroyed_modes: 1,
        });
    }

    #[test]
    fn tracer_none_does_nothing() {
        let mut tracer = Tracer::none();
        tracer.output_skipped(&sample_skip());
        tracer.mode_destroyed(&ModeDestroyedEvent {
            name: "CRT1",
            mode: ModeId(7),
            detached_outputs: 2,
        });
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_dispatches_to_sink() {
        use alloc::vec::Vec;

        struct RecordingSink {
            skipped: Vec<OutputId>,
        }
        impl TraceSink for RecordingSink {
            fn on_output_skipped(&mut self, e: &OutputSkippedEvent) {
                self.skipped.push(e.output);
            }
        }

        let mut sink = RecordingSink {
            skipped: Vec::new(),
        };
        let mut tracer = Tracer::new(&mut sink);
        tracer.output_skipped(&sample_skip());
        // Access sink after tracer is dropped.
        drop(tracer);
        assert_eq!(sink.skipped, &[OutputId(3)]);
    }
}
