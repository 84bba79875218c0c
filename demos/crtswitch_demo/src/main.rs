// Copyright 2026 the Crtswitch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated arcade session that exercises mode switching and diagnostics.
//!
//! Drives a [`CrtSession`] against the in-memory display server through a
//! few resolution changes, a rotation round trip, and teardown. Events go
//! to a [`PrettyPrintSink`](crtswitch_debug::pretty::PrettyPrintSink) on
//! stderr and a [`RecorderSink`](crtswitch_debug::recorder::RecorderSink);
//! the recording is exported as JSON on stdout.

use std::error::Error;
use std::io::Write as _;

use crtswitch_core::orientation::{get_orientation, set_orientation};
use crtswitch_core::output::OutputSelector;
use crtswitch_core::rotation::{Orientation, Rotation};
use crtswitch_core::session::{CrtSession, ModeRequest, output_names};
use crtswitch_core::trace::{
    CrtcReconfiguredEvent, ModeDestroyedEvent, ModeRegisteredEvent, ModeSynthesizedEvent,
    OrientationChangedEvent, OutputSkippedEvent, TeardownEvent, TraceSink, Tracer,
};
use crtswitch_debug::json;
use crtswitch_debug::pretty::PrettyPrintSink;
use crtswitch_debug::recorder::RecorderSink;
use crtswitch_harness::{DisplayState, SimulatedConnector};

/// Resolutions a typical arcade frontend walks through.
const GAMES: &[(u32, u32, f64)] = &[(320, 240, 60.0), (256, 224, 59.19), (384, 224, 55.02)];

/// Forwards every event to both sinks.
struct Tee<'a> {
    pretty: &'a mut PrettyPrintSink,
    recorder: &'a mut RecorderSink,
}

impl TraceSink for Tee<'_> {
    fn on_mode_synthesized(&mut self, e: &ModeSynthesizedEvent<'_>) {
        self.pretty.on_mode_synthesized(e);
        self.recorder.on_mode_synthesized(e);
    }

    fn on_mode_registered(&mut self, e: &ModeRegisteredEvent<'_>) {
        self.pretty.on_mode_registered(e);
        self.recorder.on_mode_registered(e);
    }

    fn on_output_skipped(&mut self, e: &OutputSkippedEvent) {
        self.pretty.on_output_skipped(e);
        self.recorder.on_output_skipped(e);
    }

    fn on_crtc_reconfigured(&mut self, e: &CrtcReconfiguredEvent) {
        self.pretty.on_crtc_reconfigured(e);
        self.recorder.on_crtc_reconfigured(e);
    }

    fn on_mode_destroyed(&mut self, e: &ModeDestroyedEvent<'_>) {
        self.pretty.on_mode_destroyed(e);
        self.recorder.on_mode_destroyed(e);
    }

    fn on_orientation_changed(&mut self, e: &OrientationChangedEvent) {
        self.pretty.on_orientation_changed(e);
        self.recorder.on_orientation_changed(e);
    }

    fn on_teardown(&mut self, e: &TeardownEvent) {
        self.pretty.on_teardown(e);
        self.recorder.on_teardown(e);
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let connector = SimulatedConnector::new(DisplayState::single_crt(
        Rotation::ROTATE_90 | Rotation::ROTATE_180 | Rotation::ROTATE_270,
    ));

    let mut pretty = PrettyPrintSink::stderr();
    let mut recorder = RecorderSink::new();
    let mut tee = Tee {
        pretty: &mut pretty,
        recorder: &mut recorder,
    };
    let mut tracer = Tracer::new(&mut tee);

    let names = output_names(&connector)?;
    eprintln!("outputs: {names}");

    let mut session = CrtSession::new();
    let mut observer = |hz: f64| eprintln!("frontend refresh -> {hz:.2} Hz");
    for &(width, height, refresh_hz) in GAMES {
        let request = ModeRequest {
            width,
            height,
            refresh_hz,
            output: OutputSelector::All,
            ..ModeRequest::default()
        };
        let report = session.apply(&connector, &request, &mut observer, &mut tracer)?;
        eprintln!(
            "{} on {} output(s), {} skipped",
            report.modeline.name,
            report.bindings.len(),
            report.skipped.len(),
        );
        session.collect_superseded(&connector, &mut tracer)?;
    }

    set_orientation(&connector, Orientation::Vertical, &mut tracer)?;
    eprintln!("orientation: {:?}", get_orientation(&connector)?);
    set_orientation(&connector, Orientation::Normal, &mut tracer)?;

    let report = session.teardown(&connector, &mut tracer)?;
    eprintln!(
        "restored {} output(s), destroyed {:?}",
        report.restored.len(),
        report.destroyed,
    );
    eprintln!("modes left: {:?}", connector.state().mode_names());

    drop(tracer);
    let mut stdout = std::io::stdout().lock();
    json::export(recorder.as_bytes(), &mut stdout)?;
    writeln!(stdout)?;
    Ok(())
}
