// Copyright 2026 the Crtswitch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Output-mode lifecycle for a CRT switching session.
//!
//! A [`CrtSession`] owns the state that lives for one switching session: the
//! generation counter used to name synthesized modes, the output selection,
//! and the names of the most recent modes. Every operation opens its own
//! connection through a [`Connector`].
//!
//! # Lifecycle
//!
//! ```text
//!   ModeRequest ──► synthesize() ──► CRT<n> ──► create-or-reuse by name
//!                                                     │
//!          ┌──────────────────────────────────────────┘
//!          ▼
//!   for each target output:
//!     add mode ─► sync ─► snapshot CRTC ─► disable ─► sync
//!                                        ─► resize  ─► sync
//!                                        ─► reattach ─► sync
//!
//!   teardown(): restore d_mo on the selected and previously switched
//!               outputs, then detach and destroy CRT1..=CRT<generation>
//! ```
//!
//! Nothing is rolled back: if a request fails halfway through the output
//! list, outputs already switched stay switched.

use alloc::string::String;
use alloc::vec::Vec;

use crate::backend::{
    Connector, CrtcConfig, CrtcSnapshot, DisplayServer, OutputInfo, RefreshObserver,
    ScreenResources, ScreenSize,
};
use crate::error::SwitchError;
use crate::modeline::{self, ModeTiming, Modeline, TimingWarning};
use crate::output::{CrtcId, ModeId, OutputId, OutputNames, OutputSelector};
use crate::trace::{
    CrtcReconfiguredEvent, ModeDestroyedEvent, ModeRegisteredEvent, ModeSynthesizedEvent,
    OutputSkippedEvent, SkipReason, TeardownEvent, Tracer,
};

/// Error type of the server opened by connector `C`.
pub type ServerError<C> = <<C as Connector>::Server as DisplayServer>::Error;

/// A resolution change requested by the frontend.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModeRequest {
    /// Visible width in pixels.
    pub width: u32,
    /// Visible height in lines.
    pub height: u32,
    /// Refresh rate in Hz.
    pub refresh_hz: f64,
    /// Horizontal picture shift; positive moves the sync end earlier.
    pub h_offset: i32,
    /// Porch widening in pixel steps.
    pub pixel_adjust: i32,
    /// Outputs to switch.
    pub output: OutputSelector,
}

impl Default for ModeRequest {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            refresh_hz: 60.0,
            h_offset: 0,
            pixel_adjust: 0,
            output: OutputSelector::All,
        }
    }
}

/// An output switched to a new mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputBinding {
    /// The switched output.
    pub output: OutputId,
    /// Its connector name.
    pub name: String,
    /// The CRTC driving it.
    pub crtc: CrtcId,
    /// CRTC configuration before the switch.
    pub previous: CrtcSnapshot,
    /// The mode now scanned out.
    pub mode: ModeId,
}

/// Outcome of [`CrtSession::apply`].
#[derive(Clone, Debug, PartialEq)]
pub struct ApplyReport {
    /// The registered modeline.
    pub modeline: Modeline,
    /// Its server handle.
    pub mode: ModeId,
    /// `true` if the mode already existed on the server.
    pub reused: bool,
    /// Synthesis quality warnings.
    pub warnings: Vec<TimingWarning>,
    /// Outputs switched, in server order.
    pub bindings: Vec<OutputBinding>,
    /// Targeted outputs left untouched.
    pub skipped: Vec<OutputId>,
}

/// Outcome of [`CrtSession::teardown`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Outputs switched back to the desktop mode.
    pub restored: Vec<OutputId>,
    /// Names of the synthesized modes destroyed.
    pub destroyed: Vec<String>,
}

/// State of one CRT switching session.
///
/// The session is an owned value: operations take `&mut self`, so callers
/// that share it across threads must wrap it in a lock.
#[derive(Clone, Debug, Default)]
pub struct CrtSession {
    active: bool,
    generation: u32,
    selected_output: OutputSelector,
    last_mode: Option<String>,
    previous_mode: Option<String>,
    last_timing: Option<ModeTiming>,
    switched: Vec<OutputId>,
}

impl CrtSession {
    /// Creates an idle session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once a resolution change has been applied.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns the number of modes synthesized in this session.
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Returns the output selection of the last resolution change.
    #[must_use]
    pub fn selected_output(&self) -> OutputSelector {
        self.selected_output
    }

    /// Returns the name of the most recently synthesized mode.
    #[must_use]
    pub fn last_mode(&self) -> Option<&str> {
        self.last_mode.as_deref()
    }

    /// Returns the name of the mode superseded by [`last_mode`](Self::last_mode).
    #[must_use]
    pub fn previous_mode(&self) -> Option<&str> {
        self.previous_mode.as_deref()
    }

    /// Switches the selected outputs to a synthesized CRT mode.
    ///
    /// A request whose timing equals the previous one reuses the previous
    /// mode instead of registering a duplicate. Disconnected outputs are
    /// skipped; selecting [`OutputSelector::All`] with nothing connected
    /// succeeds with no bindings.
    pub fn apply<C: Connector>(
        &mut self,
        connector: &C,
        request: &ModeRequest,
        observer: &mut dyn RefreshObserver,
        tracer: &mut Tracer<'_>,
    ) -> Result<ApplyReport, SwitchError<ServerError<C>>> {
        let synthesis = modeline::synthesize(
            request.width,
            request.height,
            request.refresh_hz,
            request.h_offset,
            request.pixel_adjust,
        )?;

        let mut server = connector.connect().map_err(SwitchError::Connection)?;
        let resources = server.screen_resources().map_err(SwitchError::Server)?;
        let targets = request.output.resolve(&resources.outputs).map_err(|index| {
            SwitchError::UnknownOutput {
                index,
                available: resources.outputs.len(),
            }
        })?;

        let name = self.name_for(synthesis.timing);
        self.active = true;
        self.selected_output = request.output;

        let modeline = synthesis.timing.named(name);
        tracer.mode_synthesized(&ModeSynthesizedEvent {
            name: &modeline.name,
            timing: modeline.timing,
            band: synthesis.band,
            warnings: &synthesis.warnings,
        });
        observer.refresh_rate_changed(request.refresh_hz);

        let (mode, reused) = ensure_mode(&mut server, &resources, &modeline, tracer)?;

        let mut bindings = Vec::new();
        let mut skipped = Vec::new();
        for output in targets {
            match bind_output(&mut server, output, mode, &modeline.timing, tracer)
                .map_err(SwitchError::Server)?
            {
                Some(binding) => {
                    if !self.switched.contains(&binding.output) {
                        self.switched.push(binding.output);
                    }
                    bindings.push(binding);
                }
                None => skipped.push(output),
            }
        }

        Ok(ApplyReport {
            modeline,
            mode,
            reused,
            warnings: synthesis.warnings,
            bindings,
            skipped,
        })
    }

    /// Destroys the mode superseded by the latest resolution change.
    ///
    /// The mode is left alone while any CRTC still scans it out. Returns the
    /// name of the destroyed mode, if any.
    pub fn collect_superseded<C: Connector>(
        &mut self,
        connector: &C,
        tracer: &mut Tracer<'_>,
    ) -> Result<Option<String>, SwitchError<ServerError<C>>> {
        let Some(name) = self.previous_mode.clone() else {
            return Ok(None);
        };
        let mut server = connector.connect().map_err(SwitchError::Connection)?;
        let resources = server.screen_resources().map_err(SwitchError::Server)?;
        let Some(mode) = resources.find_mode(&name) else {
            self.previous_mode = None;
            return Ok(None);
        };

        for crtc in &resources.crtcs {
            let info = server.crtc_info(*crtc).map_err(SwitchError::Server)?;
            if info.mode == mode {
                return Ok(None);
            }
        }

        let outputs =
            output_infos(&mut server, &resources.outputs).map_err(SwitchError::Server)?;
        destroy_mode(&mut server, &outputs, &name, mode, tracer).map_err(SwitchError::Server)?;
        self.previous_mode = None;
        Ok(Some(name))
    }

    /// Ends the session.
    ///
    /// Registers the desktop mode, switches the selected outputs and every
    /// output switched earlier in the session back to it if the session is
    /// active, then detaches and destroys every mode named
    /// `CRT1` through `CRT<generation>` that still exists. The session is
    /// reset afterwards.
    pub fn teardown<C: Connector>(
        &mut self,
        connector: &C,
        tracer: &mut Tracer<'_>,
    ) -> Result<TeardownReport, SwitchError<ServerError<C>>> {
        let mut server = connector.connect().map_err(SwitchError::Connection)?;
        let resources = server.screen_resources().map_err(SwitchError::Server)?;

        let desktop = Modeline::desktop();
        let (desktop_mode, _) = ensure_mode(&mut server, &resources, &desktop, tracer)?;

        let mut report = TeardownReport::default();
        if self.active {
            let selected = self
                .selected_output
                .resolve(&resources.outputs)
                .unwrap_or_default();
            let targets = resources
                .outputs
                .iter()
                .copied()
                .filter(|output| selected.contains(output) || self.switched.contains(output));
            for output in targets {
                let binding =
                    bind_output(&mut server, output, desktop_mode, &desktop.timing, tracer)
                        .map_err(SwitchError::Server)?;
                if let Some(binding) = binding {
                    report.restored.push(binding.output);
                }
            }
        }

        let resources = server.screen_resources().map_err(SwitchError::Server)?;
        let outputs =
            output_infos(&mut server, &resources.outputs).map_err(SwitchError::Server)?;
        for generation in 1..=self.generation {
            let name = Modeline::synthesized_name(generation);
            let Some(mode) = resources.find_mode(&name) else {
                continue;
            };
            destroy_mode(&mut server, &outputs, &name, mode, tracer)
                .map_err(SwitchError::Server)?;
            report.destroyed.push(name);
        }

        tracer.teardown(&TeardownEvent {
            generations: self.generation,
            restored_outputs: count(report.restored.len()),
            destroyed_modes: count(report.destroyed.len()),
        });
        *self = Self::default();
        Ok(report)
    }

    /// Picks the name for a timing, advancing the generation unless the
    /// timing repeats the last one.
    fn name_for(&mut self, timing: ModeTiming) -> String {
        if let (Some(name), Some(last)) = (&self.last_mode, self.last_timing) {
            if last == timing {
                return name.clone();
            }
        }
        self.generation += 1;
        let name = Modeline::synthesized_name(self.generation);
        self.previous_mode = self.last_mode.replace(name.clone());
        self.last_timing = Some(timing);
        name
    }
}

/// Lists the names of every output, connected or not, in server order.
pub fn output_names<C: Connector>(
    connector: &C,
) -> Result<OutputNames, SwitchError<ServerError<C>>> {
    let mut server = connector.connect().map_err(SwitchError::Connection)?;
    let resources = server.screen_resources().map_err(SwitchError::Server)?;
    let mut names = Vec::with_capacity(resources.outputs.len());
    for output in &resources.outputs {
        names.push(server.output_info(*output).map_err(SwitchError::Server)?.name);
    }
    Ok(OutputNames(names))
}

/// Runs the disable → resize → reattach sequence on one CRTC.
///
/// The server refuses to resize the screen while a CRTC still scans out
/// geometry that would not fit, so the CRTC is blanked first. Each step is
/// followed by a barrier.
pub(crate) fn reconfigure_crtc<S: DisplayServer>(
    server: &mut S,
    crtc: CrtcId,
    config: &CrtcConfig,
    screen: &ScreenSize,
    tracer: &mut Tracer<'_>,
) -> Result<(), S::Error> {
    let barrier = server.disable_crtc(crtc)?;
    server.sync(barrier)?;
    let barrier = server.set_screen_size(screen)?;
    server.sync(barrier)?;
    let barrier = server.set_crtc_config(crtc, config)?;
    server.sync(barrier)?;

    tracer.crtc_reconfigured(&CrtcReconfiguredEvent {
        crtc,
        mode: config.mode,
        rotation: config.rotation,
        x: config.x,
        y: config.y,
        screen: *screen,
    });
    Ok(())
}

fn ensure_mode<S: DisplayServer>(
    server: &mut S,
    resources: &ScreenResources,
    modeline: &Modeline,
    tracer: &mut Tracer<'_>,
) -> Result<(ModeId, bool), SwitchError<S::Error>> {
    let (mode, reused) = match resources.find_mode(&modeline.name) {
        Some(mode) => (mode, true),
        None => {
            let mode =
                server
                    .create_mode(modeline)
                    .map_err(|source| SwitchError::ModeRejected {
                        name: modeline.name.clone(),
                        source,
                    })?;
            (mode, false)
        }
    };
    tracer.mode_registered(&ModeRegisteredEvent {
        name: &modeline.name,
        mode,
        reused,
    });
    Ok((mode, reused))
}

fn bind_output<S: DisplayServer>(
    server: &mut S,
    output: OutputId,
    mode: ModeId,
    timing: &ModeTiming,
    tracer: &mut Tracer<'_>,
) -> Result<Option<OutputBinding>, S::Error> {
    let info = server.output_info(output)?;
    let skip = if !info.is_connected() {
        Some(SkipReason::NotConnected)
    } else if info.crtc.is_none() {
        Some(SkipReason::NoCrtc)
    } else {
        None
    };
    if let Some(reason) = skip {
        tracer.output_skipped(&OutputSkippedEvent {
            output,
            crtc: info.crtc,
            reason,
        });
        return Ok(None);
    }

    let barrier = server.add_output_mode(output, mode)?;
    server.sync(barrier)?;

    let crtc = server.crtc_info(info.crtc)?;
    let previous = crtc.snapshot();
    let (width, height) = if crtc.rotation.is_portrait() {
        (timing.height, timing.width)
    } else {
        (timing.width, timing.height)
    };
    let screen = ScreenSize::at_dpi(width, height, ScreenSize::DEFAULT_DPI);
    let outputs = if crtc.outputs.is_empty() {
        alloc::vec![output]
    } else {
        crtc.outputs
    };
    let config = CrtcConfig {
        x: crtc.x,
        y: crtc.y,
        mode,
        rotation: crtc.rotation,
        outputs,
    };
    reconfigure_crtc(server, info.crtc, &config, &screen, tracer)?;

    Ok(Some(OutputBinding {
        output,
        name: info.name,
        crtc: info.crtc,
        previous,
        mode,
    }))
}

fn output_infos<S: DisplayServer>(
    server: &mut S,
    outputs: &[OutputId],
) -> Result<Vec<(OutputId, OutputInfo)>, S::Error> {
    let mut infos = Vec::with_capacity(outputs.len());
    for output in outputs {
        infos.push((*output, server.output_info(*output)?));
    }
    Ok(infos)
}

/// Detaches a mode from every output that lists it, then destroys it.
fn destroy_mode<S: DisplayServer>(
    server: &mut S,
    outputs: &[(OutputId, OutputInfo)],
    name: &str,
    mode: ModeId,
    tracer: &mut Tracer<'_>,
) -> Result<(), S::Error> {
    let mut detached = 0;
    for (output, info) in outputs {
        if info.modes.contains(&mode) {
            let barrier = server.delete_output_mode(*output, mode)?;
            server.sync(barrier)?;
            detached += 1;
        }
    }
    let barrier = server.destroy_mode(mode)?;
    server.sync(barrier)?;

    tracer.mode_destroyed(&ModeDestroyedEvent {
        name,
        mode,
        detached_outputs: detached,
    });
    Ok(())
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_timing_keeps_the_generation() {
        let mut session = CrtSession::new();
        let timing = modeline::synthesize(320, 240, 60.0, 0, 0).unwrap().timing;
        assert_eq!(session.name_for(timing), "CRT1");
        assert_eq!(session.name_for(timing), "CRT1");
        assert_eq!(session.generation(), 1);
        assert_eq!(session.previous_mode(), None);
    }

    #[test]
    fn new_timing_rotates_names() {
        let mut session = CrtSession::new();
        let a = modeline::synthesize(320, 240, 60.0, 0, 0).unwrap().timing;
        let b = modeline::synthesize(256, 224, 60.0, 0, 0).unwrap().timing;
        assert_eq!(session.name_for(a), "CRT1");
        assert_eq!(session.name_for(b), "CRT2");
        assert_eq!(session.last_mode(), Some("CRT2"));
        assert_eq!(session.previous_mode(), Some("CRT1"));
        // Going back to an earlier timing still gets a fresh name.
        assert_eq!(session.name_for(a), "CRT3");
        assert_eq!(session.previous_mode(), Some("CRT2"));
    }

    #[test]
    fn default_request_is_240p_on_every_output() {
        let request = ModeRequest::default();
        assert_eq!((request.width, request.height), (320, 240));
        assert_eq!(request.output, OutputSelector::All);
        assert!(
            modeline::synthesize(request.width, request.height, request.refresh_hz, 0, 0).is_ok()
        );
    }
}
