// Copyright 2026 the Crtswitch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Screen orientation control.
//!
//! Rotation reuses the same disable → resize → reattach sequence as a mode
//! change, but keeps the physical density of the screen instead of assuming
//! 96 DPI, and holds a server grab so other clients never observe the
//! intermediate layouts.

use alloc::vec::Vec;

use crate::backend::{Connector, CrtcConfig, DisplayServer, ScreenSize};
use crate::error::SwitchError;
use crate::output::{CrtcId, OutputId};
use crate::rotation::Orientation;
use crate::session::{ServerError, reconfigure_crtc};
use crate::trace::{OrientationChangedEvent, OutputSkippedEvent, SkipReason, Tracer};

/// Rotates every enabled CRTC driving a connected output.
///
/// A CRTC shared by several outputs is rotated once. CRTCs that do not
/// support the requested rotation keep their current one and are traced as
/// skipped.
pub fn set_orientation<C: Connector>(
    connector: &C,
    orientation: Orientation,
    tracer: &mut Tracer<'_>,
) -> Result<(), SwitchError<ServerError<C>>> {
    let mut server = connector.connect().map_err(SwitchError::Connection)?;
    let dpi = server.screen_size().map_err(SwitchError::Server)?.dpi();
    let resources = server.screen_resources().map_err(SwitchError::Server)?;

    server.grab().map_err(SwitchError::Server)?;
    let rotated = rotate_all(&mut server, &resources.outputs, orientation, dpi, tracer);
    // Release the grab even when a request failed halfway.
    let released = server.ungrab().and_then(|barrier| server.sync(barrier));
    rotated.map_err(SwitchError::Server)?;
    released.map_err(SwitchError::Server)
}

fn rotate_all<S: DisplayServer>(
    server: &mut S,
    outputs: &[OutputId],
    orientation: Orientation,
    dpi: f64,
    tracer: &mut Tracer<'_>,
) -> Result<(), S::Error> {
    let to = orientation.rotation();
    let mut visited: Vec<CrtcId> = Vec::new();

    for &output in outputs {
        let info = server.output_info(output)?;
        if !info.is_connected() {
            tracer.output_skipped(&OutputSkippedEvent {
                output,
                crtc: info.crtc,
                reason: SkipReason::NotConnected,
            });
            continue;
        }

        for &crtc in &info.crtcs {
            if visited.contains(&crtc) {
                skip(tracer, output, crtc, SkipReason::AlreadyVisited);
                continue;
            }
            visited.push(crtc);

            let current = server.crtc_info(crtc)?;
            if !current.is_enabled() {
                skip(tracer, output, crtc, SkipReason::Disabled);
                continue;
            }
            if !current.rotations.contains(to) {
                skip(tracer, output, crtc, SkipReason::RotationUnsupported);
                continue;
            }

            let (width, height) = if current.rotation.is_portrait() == to.is_portrait() {
                (current.width, current.height)
            } else {
                (current.height, current.width)
            };
            let screen = ScreenSize::at_dpi(width, height, dpi);
            let config = CrtcConfig {
                x: current.x,
                y: current.y,
                mode: current.mode,
                rotation: to,
                outputs: current.outputs,
            };
            reconfigure_crtc(server, crtc, &config, &screen, tracer)?;

            tracer.orientation_changed(&OrientationChangedEvent {
                crtc,
                from: current.rotation,
                to,
            });
        }
    }
    Ok(())
}

fn skip(tracer: &mut Tracer<'_>, output: OutputId, crtc: CrtcId, reason: SkipReason) {
    tracer.output_skipped(&OutputSkippedEvent {
        output,
        crtc,
        reason,
    });
}

/// Reads the current orientation.
///
/// Only CRTCs of connected outputs are considered, the same set
/// [`set_orientation`] rotates. The last enabled one in output order decides.
/// With no enabled CRTC, or a rotation that is not a single plain rotation
/// bit, the result is [`Orientation::Normal`].
pub fn get_orientation<C: Connector>(
    connector: &C,
) -> Result<Orientation, SwitchError<ServerError<C>>> {
    let mut server = connector.connect().map_err(SwitchError::Connection)?;
    let resources = server.screen_resources().map_err(SwitchError::Server)?;

    let mut orientation = Orientation::Normal;
    for &output in &resources.outputs {
        let info = server.output_info(output).map_err(SwitchError::Server)?;
        if !info.is_connected() {
            continue;
        }
        for &crtc in &info.crtcs {
            let current = server.crtc_info(crtc).map_err(SwitchError::Server)?;
            if current.is_enabled() {
                orientation = Orientation::from_rotation(current.rotation);
            }
        }
    }
    Ok(orientation)
}
