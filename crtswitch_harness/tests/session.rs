// Copyright 2026 the Crtswitch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Session lifecycle against the simulated display server.

use crtswitch_core::backend::{ConnectionState, ScreenSize};
use crtswitch_core::error::SwitchError;
use crtswitch_core::modeline::TimingError;
use crtswitch_core::output::{OutputId, OutputSelector};
use crtswitch_core::rotation::Rotation;
use crtswitch_core::session::{CrtSession, ModeRequest, output_names};
use crtswitch_core::trace::{
    ModeDestroyedEvent, ModeRegisteredEvent, OutputSkippedEvent, SkipReason, TraceSink, Tracer,
};
use crtswitch_harness::{DisplayState, ServerCall, SimError, SimulatedConnector, VGA_640X480};

fn cabinet() -> SimulatedConnector {
    SimulatedConnector::new(DisplayState::single_crt(Rotation::ROTATE_0))
}

fn request(width: u32, height: u32) -> ModeRequest {
    ModeRequest {
        width,
        height,
        ..ModeRequest::default()
    }
}

fn apply(
    session: &mut CrtSession,
    connector: &SimulatedConnector,
    request: &ModeRequest,
) -> Result<crtswitch_core::session::ApplyReport, SwitchError<SimError>> {
    session.apply(connector, request, &mut |_: f64| {}, &mut Tracer::none())
}

fn vga(connector: &SimulatedConnector) -> OutputId {
    connector.state().output_named("VGA-0").unwrap().id
}

#[derive(Default)]
struct Log {
    registered: Vec<(String, bool)>,
    skipped: Vec<(OutputId, SkipReason)>,
    destroyed: Vec<String>,
}

impl TraceSink for Log {
    fn on_mode_registered(&mut self, e: &ModeRegisteredEvent<'_>) {
        self.registered.push((e.name.to_string(), e.reused));
    }

    fn on_output_skipped(&mut self, e: &OutputSkippedEvent) {
        self.skipped.push((e.output, e.reason));
    }

    fn on_mode_destroyed(&mut self, e: &ModeDestroyedEvent<'_>) {
        self.destroyed.push(e.name.to_string());
    }
}

#[test]
fn apply_switches_the_connected_output() {
    let connector = cabinet();
    let mut session = CrtSession::new();
    let mut seen = Vec::new();
    let mut observer = |hz: f64| seen.push(hz);

    let report = session
        .apply(
            &connector,
            &ModeRequest::default(),
            &mut observer,
            &mut Tracer::none(),
        )
        .unwrap();

    assert_eq!(seen, [60.0]);
    assert_eq!(report.modeline.name, "CRT1");
    assert!(!report.reused);
    assert_eq!(report.bindings.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.bindings[0].name, "VGA-0");

    let state = connector.state();
    let crtc = state.crtc(report.bindings[0].crtc).unwrap();
    assert_eq!(crtc.mode, report.mode);
    assert_eq!(state.crtc_extent(crtc), (320, 240));
    assert_eq!(
        state.screen(),
        ScreenSize::at_dpi(320, 240, ScreenSize::DEFAULT_DPI)
    );
    assert_eq!(session.generation(), 1);
    assert!(session.is_active());
}

#[test]
fn every_crtc_change_is_fenced() {
    let connector = cabinet();
    let mut session = CrtSession::new();
    let report = apply(&mut session, &connector, &ModeRequest::default()).unwrap();

    let output = vga(&connector);
    let crtc = report.bindings[0].crtc;
    let screen = ScreenSize::at_dpi(320, 240, ScreenSize::DEFAULT_DPI);
    assert_eq!(
        connector.state().calls(),
        [
            ServerCall::CreateMode("CRT1".into()),
            ServerCall::AddOutputMode(output, report.mode),
            ServerCall::Sync,
            ServerCall::DisableCrtc(crtc),
            ServerCall::Sync,
            ServerCall::SetScreenSize(screen),
            ServerCall::Sync,
            ServerCall::SetCrtcConfig(crtc, report.mode, Rotation::ROTATE_0),
            ServerCall::Sync,
        ]
    );
}

#[test]
fn repeated_request_reuses_the_mode() {
    let connector = cabinet();
    let mut session = CrtSession::new();
    let first = apply(&mut session, &connector, &ModeRequest::default()).unwrap();
    let second = apply(&mut session, &connector, &ModeRequest::default()).unwrap();

    assert_eq!(first.mode, second.mode);
    assert!(second.reused);
    assert_eq!(session.generation(), 1);
    let names = connector.state().mode_names().len();
    assert_eq!(names, 2, "only the native mode and CRT1 exist");
}

#[test]
fn teardown_destroys_every_generation() {
    let connector = cabinet();
    let mut session = CrtSession::new();
    for width in [320, 256, 384] {
        apply(&mut session, &connector, &request(width, 240)).unwrap();
    }
    assert_eq!(session.generation(), 3);

    let mut log = Log::default();
    let report = session
        .teardown(&connector, &mut Tracer::new(&mut log))
        .unwrap();

    assert_eq!(report.destroyed, ["CRT1", "CRT2", "CRT3"]);
    assert_eq!(report.restored, [vga(&connector)]);
    assert_eq!(log.destroyed, report.destroyed);
    assert_eq!(log.registered, [("d_mo".to_string(), false)]);

    let state = connector.state();
    assert_eq!(state.mode_names(), ["640x480", "d_mo"]);
    let desktop = state.mode_named("d_mo").unwrap();
    let output = state.output_named("VGA-0").unwrap();
    assert_eq!(state.crtc(output.crtc).unwrap().mode, desktop);
    assert_eq!(state.screen().width, 700);
    assert_eq!(state.screen().height, 480);

    assert!(!session.is_active());
    assert_eq!(session.generation(), 0);
    assert_eq!(session.last_mode(), None);
}

#[test]
fn teardown_of_an_idle_session_only_registers_the_desktop_mode() {
    let connector = cabinet();
    let mut session = CrtSession::new();
    let report = session.teardown(&connector, &mut Tracer::none()).unwrap();

    assert!(report.restored.is_empty());
    assert!(report.destroyed.is_empty());
    assert_eq!(
        connector.state().calls(),
        [ServerCall::CreateMode("d_mo".into())]
    );
}

#[test]
fn teardown_restores_outputs_switched_by_earlier_requests() {
    let mut state = DisplayState::new(ScreenSize::at_dpi(640, 480, 96.0));
    let native = state.add_mode(VGA_640X480.named("640x480"));
    let left_crtc = state.add_crtc(Rotation::ROTATE_0);
    let right_crtc = state.add_crtc(Rotation::ROTATE_0);
    let left = state.add_output("VGA-0", ConnectionState::Connected, &[left_crtc]);
    let right = state.add_output("VGA-1", ConnectionState::Connected, &[right_crtc]);
    state.enable(left_crtc, native, &[left]);
    state.enable(right_crtc, native, &[right]);
    let connector = SimulatedConnector::new(state);
    let mut session = CrtSession::new();

    for (index, refresh_hz) in [(0, 60.0), (1, 59.0)] {
        let request = ModeRequest {
            width: 640,
            height: 480,
            refresh_hz,
            output: OutputSelector::Specific(index),
            ..ModeRequest::default()
        };
        apply(&mut session, &connector, &request).unwrap();
    }
    assert_eq!(session.generation(), 2);
    let crt1 = connector.state().mode_named("CRT1").unwrap();
    let crt2 = connector.state().mode_named("CRT2").unwrap();

    let report = session.teardown(&connector, &mut Tracer::none()).unwrap();

    assert_eq!(report.restored, [left, right]);
    assert_eq!(report.destroyed, ["CRT1", "CRT2"]);
    let state = connector.state();
    assert!(!state.is_referenced(crt1));
    assert!(!state.is_referenced(crt2));
    assert_eq!(state.mode_names(), ["640x480", "d_mo"]);
    let desktop = state.mode_named("d_mo").unwrap();
    assert_eq!(state.crtc(left_crtc).unwrap().mode, desktop);
    assert_eq!(state.crtc(right_crtc).unwrap().mode, desktop);
}

#[test]
fn all_outputs_with_nothing_connected_is_a_no_op() {
    let mut state = DisplayState::new(ScreenSize::at_dpi(640, 480, 96.0));
    state.add_output("VGA-0", ConnectionState::Disconnected, &[]);
    state.add_output("HDMI-0", ConnectionState::Unknown, &[]);
    let connector = SimulatedConnector::new(state);
    let mut session = CrtSession::new();

    let mut log = Log::default();
    let report = session
        .apply(
            &connector,
            &ModeRequest::default(),
            &mut |_: f64| {},
            &mut Tracer::new(&mut log),
        )
        .unwrap();

    assert!(report.bindings.is_empty());
    assert_eq!(report.skipped.len(), 2);
    assert!(
        log.skipped
            .iter()
            .all(|(_, reason)| *reason == SkipReason::NotConnected)
    );
}

#[test]
fn specific_disconnected_output_is_skipped() {
    let connector = cabinet();
    let hdmi = connector.state().output_named("HDMI-0").unwrap().id;
    let mut session = CrtSession::new();
    let report = apply(
        &mut session,
        &connector,
        &ModeRequest {
            output: OutputSelector::Specific(1),
            ..ModeRequest::default()
        },
    )
    .unwrap();

    assert!(report.bindings.is_empty());
    assert_eq!(report.skipped, [hdmi]);
    assert_eq!(session.selected_output(), OutputSelector::Specific(1));
}

#[test]
fn unknown_output_index_fails_before_any_request() {
    let connector = cabinet();
    let mut session = CrtSession::new();
    let err = apply(
        &mut session,
        &connector,
        &ModeRequest {
            output: OutputSelector::Specific(20),
            ..ModeRequest::default()
        },
    )
    .unwrap_err();

    assert!(matches!(
        err,
        SwitchError::UnknownOutput {
            index: 20,
            available: 2
        }
    ));
    assert!(connector.state().calls().is_empty());
    assert_eq!(session.generation(), 0);
}

#[test]
fn refused_connection_changes_nothing() {
    let connector = cabinet();
    connector.state_mut().set_refuse_connections(true);
    let mut session = CrtSession::new();
    let mut notified = false;

    let err = session
        .apply(
            &connector,
            &ModeRequest::default(),
            &mut |_: f64| notified = true,
            &mut Tracer::none(),
        )
        .unwrap_err();

    assert!(matches!(err, SwitchError::Connection(SimError::ConnectionRefused)));
    assert!(!notified);
    assert!(!session.is_active());
    assert!(connector.state().calls().is_empty());
}

#[test]
fn unsynthesizable_timing_never_connects() {
    let connector = cabinet();
    connector.state_mut().set_refuse_connections(true);
    let mut session = CrtSession::new();
    let err = apply(&mut session, &connector, &request(640, 245)).unwrap_err();
    assert!(matches!(
        err,
        SwitchError::Timing(TimingError::NoVerticalBand { height: 245, .. })
    ));
}

#[test]
fn rejected_mode_is_reported_by_name() {
    let connector = cabinet();
    connector.state_mut().set_reject_modes(true);
    let mut session = CrtSession::new();
    let err = apply(&mut session, &connector, &ModeRequest::default()).unwrap_err();

    match err {
        SwitchError::ModeRejected { name, source } => {
            assert_eq!(name, "CRT1");
            assert_eq!(source, SimError::ModeRefused("CRT1".into()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn superseded_mode_is_collected_once_unused() {
    let connector = cabinet();
    let mut session = CrtSession::new();
    apply(&mut session, &connector, &request(320, 240)).unwrap();
    apply(&mut session, &connector, &request(256, 240)).unwrap();

    let collected = session
        .collect_superseded(&connector, &mut Tracer::none())
        .unwrap();
    assert_eq!(collected.as_deref(), Some("CRT1"));
    assert_eq!(connector.state().mode_named("CRT1"), None);
    assert!(connector.state().mode_named("CRT2").is_some());

    let again = session
        .collect_superseded(&connector, &mut Tracer::none())
        .unwrap();
    assert_eq!(again, None);

    let report = session.teardown(&connector, &mut Tracer::none()).unwrap();
    assert_eq!(report.destroyed, ["CRT2"]);
}

#[test]
fn switching_a_portrait_crtc_swaps_the_screen() {
    let mut state = DisplayState::single_crt(Rotation::ROTATE_270);
    let crtc = state.output_named("VGA-0").unwrap().crtc;
    let vga = state.output_named("VGA-0").unwrap().id;
    let native = state.mode_named("640x480").unwrap();
    state.set_screen(ScreenSize::at_dpi(480, 640, ScreenSize::DEFAULT_DPI));
    state.set_rotation(crtc, Rotation::ROTATE_270);
    let connector = SimulatedConnector::new(state);
    let mut session = CrtSession::new();

    let report = apply(&mut session, &connector, &ModeRequest::default()).unwrap();
    assert_eq!(report.bindings[0].output, vga);
    assert_eq!(report.bindings[0].previous.mode, native);
    assert_eq!(report.bindings[0].previous.rotation, Rotation::ROTATE_270);
    let screen = connector.state().screen();
    assert_eq!((screen.width, screen.height), (240, 320));
}

#[test]
fn output_names_are_pipe_joined() {
    let connector = cabinet();
    let names = output_names(&connector).unwrap();
    assert_eq!(names.to_string(), "VGA-0|HDMI-0");
    assert_eq!(names.position("HDMI-0"), Some(1));
}
