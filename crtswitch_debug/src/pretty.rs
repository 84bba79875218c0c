// Copyright 2026 the Crtswitch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr).

use std::io::Write;

use crtswitch_core::trace::{
    CrtcReconfiguredEvent, ModeDestroyedEvent, ModeRegisteredEvent, ModeSynthesizedEvent,
    OrientationChangedEvent, OutputSkippedEvent, SkipReason, TeardownEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns the destination.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

pub(crate) fn skip_reason_name(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::NotConnected => "not-connected",
        SkipReason::NoCrtc => "no-crtc",
        SkipReason::Disabled => "disabled",
        SkipReason::RotationUnsupported => "rotation-unsupported",
        SkipReason::AlreadyVisited => "already-visited",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_mode_synthesized(&mut self, e: &ModeSynthesizedEvent<'_>) {
        let t = &e.timing;
        let _ = writeln!(
            self.writer,
            "[synth] {} {}x{} h={}/{}/{} v={}/{}/{} clock={}Hz band={}{}",
            e.name,
            t.width,
            t.height,
            t.h_sync_start,
            t.h_sync_end,
            t.h_total,
            t.v_sync_start,
            t.v_sync_end,
            t.v_total,
            t.pixel_clock,
            e.band,
            if t.interlaced() { " interlaced" } else { "" },
        );
        for w in e.warnings {
            let _ = writeln!(self.writer, "[synth:warn] {} {w:?}", e.name);
        }
    }

    fn on_mode_registered(&mut self, e: &ModeRegisteredEvent<'_>) {
        let how = if e.reused { "reused" } else { "created" };
        let _ = writeln!(self.writer, "[mode] {} id={} {how}", e.name, e.mode.0);
    }

    fn on_output_skipped(&mut self, e: &OutputSkippedEvent) {
        let _ = writeln!(
            self.writer,
            "[skip] output={} crtc={} {}",
            e.output.0,
            e.crtc.0,
            skip_reason_name(e.reason),
        );
    }

    fn on_crtc_reconfigured(&mut self, e: &CrtcReconfiguredEvent) {
        let _ = writeln!(
            self.writer,
            "[crtc] crtc={} mode={} at {},{} rotation={:#x} screen={}x{} ({}x{}mm)",
            e.crtc.0,
            e.mode.0,
            e.x,
            e.y,
            e.rotation.bits(),
            e.screen.width,
            e.screen.height,
            e.screen.mm_width,
            e.screen.mm_height,
        );
    }

    fn on_mode_destroyed(&mut self, e: &ModeDestroyedEvent<'_>) {
        let _ = writeln!(
            self.writer,
            "[destroy] {} id={} detached={}",
            e.name, e.mode.0, e.detached_outputs,
        );
    }

    fn on_orientation_changed(&mut self, e: &OrientationChangedEvent) {
        let _ = writeln!(
            self.writer,
            "[rotate] crtc={} {:#x} -> {:#x}",
            e.crtc.0,
            e.from.bits(),
            e.to.bits(),
        );
    }

    fn on_teardown(&mut self, e: &TeardownEvent) {
        let _ = writeln!(
            self.writer,
            "[teardown] generations={} restored={} destroyed={}",
            e.generations, e.restored_outputs, e.destroyed_modes,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crtswitch_core::modeline::synthesize;
    use crtswitch_core::output::{CrtcId, OutputId};

    #[test]
    fn pretty_print_synthesis() {
        let synthesis = synthesize(256, 240, 60.0, 0, 0).unwrap();
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_mode_synthesized(&ModeSynthesizedEvent {
            name: "CRT1",
            timing: synthesis.timing,
            band: synthesis.band,
            warnings: &synthesis.warnings,
        });
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert!(output.starts_with("[synth] CRT1 256x240"), "got: {output}");
        assert!(output.contains("h=264/285/313"), "got: {output}");
        assert!(!output.contains("interlaced"), "got: {output}");
    }

    #[test]
    fn pretty_print_skip() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_output_skipped(&OutputSkippedEvent {
            output: OutputId(68),
            crtc: CrtcId::NONE,
            reason: SkipReason::NotConnected,
        });
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(output, "[skip] output=68 crtc=0 not-connected\n");
    }
}
