// Copyright 2026 the Crtswitch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`DisplayServer`] implementation over a shared [`DisplayState`].

use alloc::rc::Rc;
use alloc::string::String;
use core::cell::{Ref, RefCell, RefMut};
use core::fmt;

use crtswitch_core::backend::{
    Barrier, Capabilities, Connector, CrtcConfig, CrtcInfo, DisplayServer, ModeEntry, OutputInfo,
    ScreenResources, ScreenSize,
};
use crtswitch_core::modeline::Modeline;
use crtswitch_core::output::{CrtcId, ModeId, OutputId};

use crate::state::{DisplayState, ServerCall};

/// Protocol errors raised by the simulated server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimError {
    /// The connection was refused.
    ConnectionRefused,
    /// A request was issued while an earlier barrier was still pending.
    Unsynchronized,
    /// No such output.
    BadOutput(OutputId),
    /// No such CRTC.
    BadCrtc(CrtcId),
    /// No such mode.
    BadMode(ModeId),
    /// A mode with this name already exists.
    DuplicateName(String),
    /// Mode registration was refused.
    ModeRefused(String),
    /// The mode is still scanned out or listed by an output.
    ModeInUse(ModeId),
    /// The output does not accept the mode.
    ModeNotListed(OutputId, ModeId),
    /// The CRTC does not support the rotation.
    RotationUnsupported(CrtcId),
    /// The CRTC would extend past the screen.
    OutsideScreen(CrtcId),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionRefused => f.write_str("connection refused"),
            Self::Unsynchronized => f.write_str("request issued before the previous barrier"),
            Self::BadOutput(id) => write!(f, "BadOutput: {id:?}"),
            Self::BadCrtc(id) => write!(f, "BadCrtc: {id:?}"),
            Self::BadMode(id) => write!(f, "BadMode: {id:?}"),
            Self::DuplicateName(name) => write!(f, "BadName: mode {name} exists"),
            Self::ModeRefused(name) => write!(f, "BadValue: mode {name} refused"),
            Self::ModeInUse(id) => write!(f, "BadAccess: {id:?} is in use"),
            Self::ModeNotListed(output, mode) => {
                write!(f, "BadMatch: {output:?} does not accept {mode:?}")
            }
            Self::RotationUnsupported(id) => write!(f, "BadMatch: {id:?} cannot rotate so"),
            Self::OutsideScreen(id) => write!(f, "BadMatch: {id:?} exceeds the screen"),
        }
    }
}

impl core::error::Error for SimError {}

/// Opens connections to a shared [`DisplayState`].
///
/// Clones share the same state, so a test can keep one handle for
/// inspection while the session under test connects through another.
#[derive(Clone, Debug)]
pub struct SimulatedConnector {
    state: Rc<RefCell<DisplayState>>,
}

impl SimulatedConnector {
    /// Wraps a display state.
    #[must_use]
    pub fn new(state: DisplayState) -> Self {
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Borrows the state for inspection.
    #[must_use]
    pub fn state(&self) -> Ref<'_, DisplayState> {
        self.state.borrow()
    }

    /// Borrows the state for modification.
    #[must_use]
    pub fn state_mut(&self) -> RefMut<'_, DisplayState> {
        self.state.borrow_mut()
    }
}

impl Connector for SimulatedConnector {
    type Server = SimulatedDisplay;

    fn connect(&self) -> Result<SimulatedDisplay, SimError> {
        let mut state = self.state.borrow_mut();
        if state.refuse_connections {
            return Err(SimError::ConnectionRefused);
        }
        state.pending = 0;
        drop(state);
        Ok(SimulatedDisplay {
            state: Rc::clone(&self.state),
        })
    }
}

/// One connection to a simulated display server.
///
/// Every request fails with [`SimError::Unsynchronized`] while a barrier
/// from an earlier mutating request has not been synced.
#[derive(Debug)]
pub struct SimulatedDisplay {
    state: Rc<RefCell<DisplayState>>,
}

impl SimulatedDisplay {
    fn request(&self) -> Result<RefMut<'_, DisplayState>, SimError> {
        let state = self.state.borrow_mut();
        if state.pending > 0 {
            return Err(SimError::Unsynchronized);
        }
        Ok(state)
    }

    fn mutated(mut state: RefMut<'_, DisplayState>, call: ServerCall) -> Barrier {
        state.calls.push(call);
        state.pending += 1;
        Barrier::new()
    }
}

impl DisplayServer for SimulatedDisplay {
    type Error = SimError;

    fn capabilities(&self) -> Capabilities {
        self.state.borrow().capabilities
    }

    fn screen_resources(&mut self) -> Result<ScreenResources, SimError> {
        let state = self.request()?;
        Ok(ScreenResources {
            outputs: state.outputs.iter().map(|o| o.id).collect(),
            crtcs: state.crtcs.iter().map(|c| c.id).collect(),
            modes: state
                .modes
                .iter()
                .map(|(id, m)| ModeEntry {
                    id: *id,
                    name: m.name.clone(),
                })
                .collect(),
        })
    }

    fn output_info(&mut self, output: OutputId) -> Result<OutputInfo, SimError> {
        let state = self.request()?;
        let o = state.output(output).ok_or(SimError::BadOutput(output))?;
        Ok(OutputInfo {
            name: o.name.clone(),
            connection: o.connection,
            crtc: o.crtc,
            crtcs: o.crtcs.clone(),
            modes: o.modes.clone(),
        })
    }

    fn crtc_info(&mut self, crtc: CrtcId) -> Result<CrtcInfo, SimError> {
        let state = self.request()?;
        let c = state.crtc(crtc).ok_or(SimError::BadCrtc(crtc))?;
        let (width, height) = state.crtc_extent(c);
        Ok(CrtcInfo {
            x: c.x,
            y: c.y,
            width,
            height,
            mode: c.mode,
            rotation: c.rotation,
            rotations: c.rotations,
            outputs: c.outputs.clone(),
        })
    }

    fn screen_size(&mut self) -> Result<ScreenSize, SimError> {
        Ok(self.request()?.screen)
    }

    fn create_mode(&mut self, modeline: &Modeline) -> Result<ModeId, SimError> {
        let mut state = self.request()?;
        if state.reject_modes {
            return Err(SimError::ModeRefused(modeline.name.clone()));
        }
        if state.mode_named(&modeline.name).is_some() {
            return Err(SimError::DuplicateName(modeline.name.clone()));
        }
        state.calls.push(ServerCall::CreateMode(modeline.name.clone()));
        Ok(state.add_mode(modeline.clone()))
    }

    fn destroy_mode(&mut self, mode: ModeId) -> Result<Barrier, SimError> {
        let mut state = self.request()?;
        if state.modeline(mode).is_none() {
            return Err(SimError::BadMode(mode));
        }
        if state.is_referenced(mode) {
            return Err(SimError::ModeInUse(mode));
        }
        state.modes.retain(|(id, _)| *id != mode);
        Ok(Self::mutated(state, ServerCall::DestroyMode(mode)))
    }

    fn add_output_mode(&mut self, output: OutputId, mode: ModeId) -> Result<Barrier, SimError> {
        let mut state = self.request()?;
        if state.modeline(mode).is_none() {
            return Err(SimError::BadMode(mode));
        }
        let o = state
            .outputs
            .iter_mut()
            .find(|o| o.id == output)
            .ok_or(SimError::BadOutput(output))?;
        if !o.modes.contains(&mode) {
            o.modes.push(mode);
        }
        Ok(Self::mutated(state, ServerCall::AddOutputMode(output, mode)))
    }

    fn delete_output_mode(
        &mut self,
        output: OutputId,
        mode: ModeId,
    ) -> Result<Barrier, SimError> {
        let mut state = self.request()?;
        let crtc = state.output(output).ok_or(SimError::BadOutput(output))?.crtc;
        if state.crtc(crtc).is_some_and(|c| c.mode == mode) {
            return Err(SimError::ModeInUse(mode));
        }
        let o = state
            .outputs
            .iter_mut()
            .find(|o| o.id == output)
            .ok_or(SimError::BadOutput(output))?;
        if !o.modes.contains(&mode) {
            return Err(SimError::ModeNotListed(output, mode));
        }
        o.modes.retain(|m| *m != mode);
        Ok(Self::mutated(state, ServerCall::DeleteOutputMode(output, mode)))
    }

    fn disable_crtc(&mut self, crtc: CrtcId) -> Result<Barrier, SimError> {
        let mut state = self.request()?;
        let c = state
            .crtcs
            .iter_mut()
            .find(|c| c.id == crtc)
            .ok_or(SimError::BadCrtc(crtc))?;
        c.mode = ModeId::NONE;
        c.outputs.clear();
        for o in state.outputs.iter_mut().filter(|o| o.crtc == crtc) {
            o.crtc = CrtcId::NONE;
        }
        Ok(Self::mutated(state, ServerCall::DisableCrtc(crtc)))
    }

    fn set_crtc_config(&mut self, crtc: CrtcId, config: &CrtcConfig) -> Result<Barrier, SimError> {
        let mut state = self.request()?;
        let current = state.crtc(crtc).ok_or(SimError::BadCrtc(crtc))?;
        if !current.rotations.contains(config.rotation) {
            return Err(SimError::RotationUnsupported(crtc));
        }
        let modeline = state.modeline(config.mode).ok_or(SimError::BadMode(config.mode))?;
        let (w, h) = (modeline.timing.width, modeline.timing.height);
        let (w, h) = if config.rotation.is_portrait() {
            (h, w)
        } else {
            (w, h)
        };
        let screen = state.screen;
        let fits = |origin: i32, extent: u32, limit: u32| {
            u32::try_from(origin).is_ok_and(|o| o.saturating_add(extent) <= limit)
        };
        if !fits(config.x, w, screen.width) || !fits(config.y, h, screen.height) {
            return Err(SimError::OutsideScreen(crtc));
        }
        for output in &config.outputs {
            let o = state.output(*output).ok_or(SimError::BadOutput(*output))?;
            if !o.modes.contains(&config.mode) {
                return Err(SimError::ModeNotListed(*output, config.mode));
            }
        }

        for o in state.outputs.iter_mut() {
            if config.outputs.contains(&o.id) {
                o.crtc = crtc;
            } else if o.crtc == crtc {
                o.crtc = CrtcId::NONE;
            }
        }
        if let Some(c) = state.crtcs.iter_mut().find(|c| c.id == crtc) {
            c.x = config.x;
            c.y = config.y;
            c.mode = config.mode;
            c.rotation = config.rotation;
            c.outputs.clone_from(&config.outputs);
        }
        Ok(Self::mutated(
            state,
            ServerCall::SetCrtcConfig(crtc, config.mode, config.rotation),
        ))
    }

    fn set_screen_size(&mut self, size: &ScreenSize) -> Result<Barrier, SimError> {
        let mut state = self.request()?;
        for c in &state.crtcs {
            let (w, h) = state.crtc_extent(c);
            if w == 0 {
                continue;
            }
            let right = i64::from(c.x) + i64::from(w);
            let bottom = i64::from(c.y) + i64::from(h);
            if right > i64::from(size.width) || bottom > i64::from(size.height) {
                return Err(SimError::OutsideScreen(c.id));
            }
        }
        state.screen = *size;
        Ok(Self::mutated(state, ServerCall::SetScreenSize(*size)))
    }

    fn grab(&mut self) -> Result<(), SimError> {
        let mut state = self.request()?;
        state.grabbed = true;
        state.calls.push(ServerCall::Grab);
        Ok(())
    }

    fn ungrab(&mut self) -> Result<Barrier, SimError> {
        let mut state = self.state.borrow_mut();
        state.grabbed = false;
        Ok(Self::mutated(state, ServerCall::Ungrab))
    }

    fn sync(&mut self, barrier: Barrier) -> Result<(), SimError> {
        let _ = barrier;
        let mut state = self.state.borrow_mut();
        state.pending = state.pending.saturating_sub(1);
        state.calls.push(ServerCall::Sync);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crtswitch_core::backend::ConnectionState;
    use crtswitch_core::rotation::Rotation;

    #[test]
    fn requests_wait_for_the_barrier() {
        let connector = SimulatedConnector::new(DisplayState::single_crt(Rotation::ROTATE_0));
        let mut server = connector.connect().unwrap();
        let crtc = server.screen_resources().unwrap().crtcs[0];
        let barrier = server.disable_crtc(crtc).unwrap();
        assert_eq!(server.crtc_info(crtc), Err(SimError::Unsynchronized));
        server.sync(barrier).unwrap();
        assert_eq!(server.crtc_info(crtc).unwrap().width, 0);
    }

    #[test]
    fn capabilities_follow_the_state() {
        let connector = SimulatedConnector::new(DisplayState::single_crt(Rotation::ROTATE_0));
        assert!(
            connector
                .connect()
                .unwrap()
                .capabilities()
                .contains(Capabilities::CRT_SWITCHRES)
        );
        connector
            .state_mut()
            .set_capabilities(Capabilities::SCREEN_ROTATION);
        let server = connector.connect().unwrap();
        assert_eq!(server.capabilities(), Capabilities::SCREEN_ROTATION);
    }

    #[test]
    fn screen_cannot_shrink_under_a_lit_crtc() {
        let connector = SimulatedConnector::new(DisplayState::single_crt(Rotation::ROTATE_0));
        let mut server = connector.connect().unwrap();
        let small = ScreenSize::at_dpi(320, 240, ScreenSize::DEFAULT_DPI);
        assert!(matches!(
            server.set_screen_size(&small),
            Err(SimError::OutsideScreen(_))
        ));
    }

    #[test]
    fn listed_modes_cannot_be_destroyed() {
        let connector = SimulatedConnector::new(DisplayState::single_crt(Rotation::ROTATE_0));
        let mut server = connector.connect().unwrap();
        let mode = connector.state().mode_named("640x480").unwrap();
        assert_eq!(server.destroy_mode(mode).map(drop), Err(SimError::ModeInUse(mode)));
    }

    #[test]
    fn refused_connections_leave_no_trace() {
        let state = DisplayState::single_crt(Rotation::ROTATE_0);
        let connector = SimulatedConnector::new(state);
        connector.state_mut().set_refuse_connections(true);
        assert!(matches!(connector.connect(), Err(SimError::ConnectionRefused)));
        assert!(connector.state().calls().is_empty());
    }

    #[test]
    fn portrait_crtcs_report_swapped_extent() {
        let mut state = DisplayState::new(ScreenSize::at_dpi(480, 640, 96.0));
        let mode = state.add_mode(crate::VGA_640X480.named("640x480"));
        let crtc = state.add_crtc(Rotation::ROTATE_90);
        let out = state.add_output("VGA-0", ConnectionState::Connected, &[crtc]);
        state.enable(crtc, mode, &[out]);
        let connector = SimulatedConnector::new(state);
        let mut server = connector.connect().unwrap();
        let barrier = server
            .set_crtc_config(
                crtc,
                &CrtcConfig {
                    x: 0,
                    y: 0,
                    mode,
                    rotation: Rotation::ROTATE_90,
                    outputs: alloc::vec![out],
                },
            )
            .unwrap();
        server.sync(barrier).unwrap();
        let info = server.crtc_info(crtc).unwrap();
        assert_eq!((info.width, info.height), (480, 640));
    }
}
