// Copyright 2026 the Crtswitch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! JSON exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes a JSON array with one object per event. Every object carries an
//! `"event"` key naming the event kind; the remaining keys mirror the event
//! fields.

use std::io::{self, Write};

use serde_json::{Value, json};

use crate::pretty::skip_reason_name;
use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as a JSON array.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let events: Vec<Value> = decode(bytes).map(to_json).collect();
    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn to_json(recorded: RecordedEvent) -> Value {
    match recorded {
        RecordedEvent::ModeSynthesized {
            name,
            timing: t,
            band,
            warnings,
        } => json!({
            "event": "mode_synthesized",
            "name": name,
            "pixel_clock": t.pixel_clock,
            "horizontal": [t.width, t.h_sync_start, t.h_sync_end, t.h_total],
            "vertical": [t.height, t.v_sync_start, t.v_sync_end, t.v_total],
            "interlaced": t.interlaced(),
            "refresh_hz": t.refresh_hz(),
            "band": band,
            "warnings": warnings,
        }),
        RecordedEvent::ModeRegistered { name, mode, reused } => json!({
            "event": "mode_registered",
            "name": name,
            "mode": mode.0,
            "reused": reused,
        }),
        RecordedEvent::OutputSkipped(e) => json!({
            "event": "output_skipped",
            "output": e.output.0,
            "crtc": e.crtc.0,
            "reason": skip_reason_name(e.reason),
        }),
        RecordedEvent::CrtcReconfigured(e) => json!({
            "event": "crtc_reconfigured",
            "crtc": e.crtc.0,
            "mode": e.mode.0,
            "rotation": e.rotation.bits(),
            "x": e.x,
            "y": e.y,
            "screen": {
                "width": e.screen.width,
                "height": e.screen.height,
                "mm_width": e.screen.mm_width,
                "mm_height": e.screen.mm_height,
            },
        }),
        RecordedEvent::ModeDestroyed {
            name,
            mode,
            detached_outputs,
        } => json!({
            "event": "mode_destroyed",
            "name": name,
            "mode": mode.0,
            "detached_outputs": detached_outputs,
        }),
        RecordedEvent::OrientationChanged(e) => json!({
            "event": "orientation_changed",
            "crtc": e.crtc.0,
            "from": e.from.bits(),
            "to": e.to.bits(),
        }),
        RecordedEvent::Teardown(e) => json!({
            "event": "teardown",
            "generations": e.generations,
            "restored_outputs": e.restored_outputs,
            "destroyed_modes": e.destroyed_modes,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use crtswitch_core::modeline::synthesize;
    use crtswitch_core::output::{CrtcId, OutputId};
    use crtswitch_core::trace::{
        ModeSynthesizedEvent, OutputSkippedEvent, SkipReason, TeardownEvent, TraceSink,
    };

    #[test]
    fn export_produces_valid_json() {
        let synthesis = synthesize(640, 480, 60.0, 0, 0).unwrap();
        let mut rec = RecorderSink::new();
        rec.on_mode_synthesized(&ModeSynthesizedEvent {
            name: "CRT1",
            timing: synthesis.timing,
            band: synthesis.band,
            warnings: &synthesis.warnings,
        });
        rec.on_output_skipped(&OutputSkippedEvent {
            output: OutputId(68),
            crtc: CrtcId::NONE,
            reason: SkipReason::NotConnected,
        });
        rec.on_teardown(&TeardownEvent {
            generations: 1,
            restored_outputs: 1,
            destroyed_modes: 1,
        });

        let mut out = Vec::new();
        export(rec.as_bytes(), &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();

        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.len(), 3);

        assert_eq!(parsed[0]["event"], "mode_synthesized");
        assert_eq!(parsed[0]["pixel_clock"], 12_536_160);
        assert_eq!(parsed[0]["interlaced"], true);
        assert_eq!(parsed[0]["vertical"][3], 533);

        assert_eq!(parsed[1]["reason"], "not-connected");
        assert_eq!(parsed[2]["destroyed_modes"], 1);
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert!(parsed.is_empty());
    }
}
