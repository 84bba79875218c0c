// Copyright 2026 the Crtswitch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as little-endian records. Mode names are length-prefixed UTF-8.
//! [`decode`] reads them back as an iterator of [`RecordedEvent`].
//!
//! Synthesis warnings are stored as a count only.

use crtswitch_core::backend::ScreenSize;
use crtswitch_core::modeline::{ModeFlags, ModeTiming};
use crtswitch_core::output::{CrtcId, ModeId, OutputId};
use crtswitch_core::rotation::Rotation;
use crtswitch_core::trace::{
    CrtcReconfiguredEvent, ModeDestroyedEvent, ModeRegisteredEvent, ModeSynthesizedEvent,
    OrientationChangedEvent, OutputSkippedEvent, SkipReason, TeardownEvent, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_MODE_SYNTHESIZED: u8 = 1;
const TAG_MODE_REGISTERED: u8 = 2;
const TAG_OUTPUT_SKIPPED: u8 = 3;
const TAG_CRTC_RECONFIGURED: u8 = 4;
const TAG_MODE_DESTROYED: u8 = 5;
const TAG_ORIENTATION_CHANGED: u8 = 6;
const TAG_TEARDOWN: u8 = 7;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_len(&mut self, len: usize) {
        self.write_u32(u32::try_from(len).unwrap_or(u32::MAX));
    }

    fn write_str(&mut self, s: &str) {
        self.write_len(s.len());
        self.buf.extend_from_slice(s.as_bytes());
    }

    fn write_timing(&mut self, t: &ModeTiming) {
        self.write_u64(t.pixel_clock);
        for v in [
            t.width,
            t.h_sync_start,
            t.h_sync_end,
            t.h_total,
            t.h_skew,
            t.height,
            t.v_sync_start,
            t.v_sync_end,
            t.v_total,
            t.flags.bits(),
        ] {
            self.write_u32(v);
        }
    }

    fn write_screen(&mut self, s: &ScreenSize) {
        self.write_u32(s.width);
        self.write_u32(s.height);
        self.write_u32(s.mm_width);
        self.write_u32(s.mm_height);
    }

    fn write_skip_reason(&mut self, r: SkipReason) {
        self.write_u8(match r {
            SkipReason::NotConnected => 0,
            SkipReason::NoCrtc => 1,
            SkipReason::Disabled => 2,
            SkipReason::RotationUnsupported => 3,
            SkipReason::AlreadyVisited => 4,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_mode_synthesized(&mut self, e: &ModeSynthesizedEvent<'_>) {
        self.write_u8(TAG_MODE_SYNTHESIZED);
        self.write_str(e.name);
        self.write_timing(&e.timing);
        self.write_len(e.band);
        self.write_len(e.warnings.len());
    }

    fn on_mode_registered(&mut self, e: &ModeRegisteredEvent<'_>) {
        self.write_u8(TAG_MODE_REGISTERED);
        self.write_str(e.name);
        self.write_u32(e.mode.0);
        self.write_u8(u8::from(e.reused));
    }

    fn on_output_skipped(&mut self, e: &OutputSkippedEvent) {
        self.write_u8(TAG_OUTPUT_SKIPPED);
        self.write_u32(e.output.0);
        self.write_u32(e.crtc.0);
        self.write_skip_reason(e.reason);
    }

    fn on_crtc_reconfigured(&mut self, e: &CrtcReconfiguredEvent) {
        self.write_u8(TAG_CRTC_RECONFIGURED);
        self.write_u32(e.crtc.0);
        self.write_u32(e.mode.0);
        self.write_u16(e.rotation.bits());
        self.write_i32(e.x);
        self.write_i32(e.y);
        self.write_screen(&e.screen);
    }

    fn on_mode_destroyed(&mut self, e: &ModeDestroyedEvent<'_>) {
        self.write_u8(TAG_MODE_DESTROYED);
        self.write_str(e.name);
        self.write_u32(e.mode.0);
        self.write_u32(e.detached_outputs);
    }

    fn on_orientation_changed(&mut self, e: &OrientationChangedEvent) {
        self.write_u8(TAG_ORIENTATION_CHANGED);
        self.write_u32(e.crtc.0);
        self.write_u16(e.from.bits());
        self.write_u16(e.to.bits());
    }

    fn on_teardown(&mut self, e: &TeardownEvent) {
        self.write_u8(TAG_TEARDOWN);
        self.write_u32(e.generations);
        self.write_u32(e.restored_outputs);
        self.write_u32(e.destroyed_modes);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedEvent {
    /// A [`ModeSynthesizedEvent`].
    ModeSynthesized {
        /// Mode name.
        name: String,
        /// Synthesized timing.
        timing: ModeTiming,
        /// Winning vertical band.
        band: u32,
        /// Number of quality warnings.
        warnings: u32,
    },
    /// A [`ModeRegisteredEvent`].
    ModeRegistered {
        /// Mode name.
        name: String,
        /// Server handle.
        mode: ModeId,
        /// `true` if the mode already existed.
        reused: bool,
    },
    /// An [`OutputSkippedEvent`].
    OutputSkipped(OutputSkippedEvent),
    /// A [`CrtcReconfiguredEvent`].
    CrtcReconfigured(CrtcReconfiguredEvent),
    /// A [`ModeDestroyedEvent`].
    ModeDestroyed {
        /// Mode name.
        name: String,
        /// Former server handle.
        mode: ModeId,
        /// Outputs the mode was detached from.
        detached_outputs: u32,
    },
    /// An [`OrientationChangedEvent`].
    OrientationChanged(OrientationChangedEvent),
    /// A [`TeardownEvent`].
    Teardown(TeardownEvent),
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take(&mut self, n: usize) -> Option<&[u8]> {
        let end = self.pos.checked_add(n)?;
        let bytes = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn read_u16(&mut self) -> Option<u16> {
        Some(u16::from_le_bytes(self.take(2)?.try_into().ok()?))
    }

    fn read_u32(&mut self) -> Option<u32> {
        Some(u32::from_le_bytes(self.take(4)?.try_into().ok()?))
    }

    fn read_i32(&mut self) -> Option<i32> {
        Some(i32::from_le_bytes(self.take(4)?.try_into().ok()?))
    }

    fn read_u64(&mut self) -> Option<u64> {
        Some(u64::from_le_bytes(self.take(8)?.try_into().ok()?))
    }

    fn read_string(&mut self) -> Option<String> {
        let len = usize::try_from(self.read_u32()?).ok()?;
        String::from_utf8(self.take(len)?.to_vec()).ok()
    }

    fn read_rotation(&mut self) -> Option<Rotation> {
        Some(Rotation::from_bits_retain(self.read_u16()?))
    }

    fn read_timing(&mut self) -> Option<ModeTiming> {
        Some(ModeTiming {
            pixel_clock: self.read_u64()?,
            width: self.read_u32()?,
            h_sync_start: self.read_u32()?,
            h_sync_end: self.read_u32()?,
            h_total: self.read_u32()?,
            h_skew: self.read_u32()?,
            height: self.read_u32()?,
            v_sync_start: self.read_u32()?,
            v_sync_end: self.read_u32()?,
            v_total: self.read_u32()?,
            flags: ModeFlags::from_bits_retain(self.read_u32()?),
        })
    }

    fn read_screen(&mut self) -> Option<ScreenSize> {
        Some(ScreenSize {
            width: self.read_u32()?,
            height: self.read_u32()?,
            mm_width: self.read_u32()?,
            mm_height: self.read_u32()?,
        })
    }

    fn read_skip_reason(&mut self) -> Option<SkipReason> {
        match self.read_u8()? {
            0 => Some(SkipReason::NotConnected),
            1 => Some(SkipReason::NoCrtc),
            2 => Some(SkipReason::Disabled),
            3 => Some(SkipReason::RotationUnsupported),
            4 => Some(SkipReason::AlreadyVisited),
            _ => None,
        }
    }

    fn decode_mode_synthesized(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::ModeSynthesized {
            name: self.read_string()?,
            timing: self.read_timing()?,
            band: self.read_u32()?,
            warnings: self.read_u32()?,
        })
    }

    fn decode_mode_registered(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::ModeRegistered {
            name: self.read_string()?,
            mode: ModeId(self.read_u32()?),
            reused: self.read_u8()? != 0,
        })
    }

    fn decode_output_skipped(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::OutputSkipped(OutputSkippedEvent {
            output: OutputId(self.read_u32()?),
            crtc: CrtcId(self.read_u32()?),
            reason: self.read_skip_reason()?,
        }))
    }

    fn decode_crtc_reconfigured(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::CrtcReconfigured(CrtcReconfiguredEvent {
            crtc: CrtcId(self.read_u32()?),
            mode: ModeId(self.read_u32()?),
            rotation: self.read_rotation()?,
            x: self.read_i32()?,
            y: self.read_i32()?,
            screen: self.read_screen()?,
        }))
    }

    fn decode_mode_destroyed(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::ModeDestroyed {
            name: self.read_string()?,
            mode: ModeId(self.read_u32()?),
            detached_outputs: self.read_u32()?,
        })
    }

    fn decode_orientation_changed(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::OrientationChanged(OrientationChangedEvent {
            crtc: CrtcId(self.read_u32()?),
            from: self.read_rotation()?,
            to: self.read_rotation()?,
        }))
    }

    fn decode_teardown(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Teardown(TeardownEvent {
            generations: self.read_u32()?,
            restored_outputs: self.read_u32()?,
            destroyed_modes: self.read_u32()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_MODE_SYNTHESIZED => self.decode_mode_synthesized(),
            TAG_MODE_REGISTERED => self.decode_mode_registered(),
            TAG_OUTPUT_SKIPPED => self.decode_output_skipped(),
            TAG_CRTC_RECONFIGURED => self.decode_crtc_reconfigured(),
            TAG_MODE_DESTROYED => self.decode_mode_destroyed(),
            TAG_ORIENTATION_CHANGED => self.decode_orientation_changed(),
            TAG_TEARDOWN => self.decode_teardown(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crtswitch_core::modeline::{Modeline, synthesize};

    #[test]
    fn synthesis_keeps_name_and_timing() {
        let synthesis = synthesize(320, 240, 75.0, 0, 0).unwrap();
        let mut rec = RecorderSink::new();
        rec.on_mode_synthesized(&ModeSynthesizedEvent {
            name: "CRT3",
            timing: synthesis.timing,
            band: synthesis.band,
            warnings: &synthesis.warnings,
        });

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 1);
        match &events[0] {
            RecordedEvent::ModeSynthesized {
                name,
                timing,
                warnings,
                ..
            } => {
                assert_eq!(name, "CRT3");
                assert_eq!(*timing, synthesis.timing);
                assert_eq!(*warnings, 1);
            }
            other => panic!("expected ModeSynthesized, got {other:?}"),
        }
    }

    #[test]
    fn mixed_sequence_decodes_in_order() {
        let mut rec = RecorderSink::new();
        rec.on_mode_registered(&ModeRegisteredEvent {
            name: Modeline::DESKTOP_NAME,
            mode: ModeId(0x50),
            reused: true,
        });
        rec.on_crtc_reconfigured(&CrtcReconfiguredEvent {
            crtc: CrtcId(0x42),
            mode: ModeId(0x50),
            rotation: Rotation::ROTATE_270,
            x: -16,
            y: 0,
            screen: ScreenSize::at_dpi(480, 700, ScreenSize::DEFAULT_DPI),
        });
        rec.on_teardown(&TeardownEvent {
            generations: 4,
            restored_outputs: 1,
            destroyed_modes: 3,
        });

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0],
            RecordedEvent::ModeRegistered {
                name: "d_mo".into(),
                mode: ModeId(0x50),
                reused: true,
            }
        );
        match &events[1] {
            RecordedEvent::CrtcReconfigured(e) => {
                assert_eq!(e.x, -16);
                assert_eq!(e.rotation, Rotation::ROTATE_270);
                assert_eq!(e.screen.height, 700);
            }
            other => panic!("expected CrtcReconfigured, got {other:?}"),
        }
        assert!(matches!(
            events[2],
            RecordedEvent::Teardown(TeardownEvent {
                destroyed_modes: 3,
                ..
            })
        ));
    }

    #[test]
    fn truncated_recording_stops_cleanly() {
        let mut rec = RecorderSink::new();
        rec.on_mode_destroyed(&ModeDestroyedEvent {
            name: "CRT1",
            mode: ModeId(7),
            detached_outputs: 1,
        });
        let bytes = rec.into_bytes();
        assert_eq!(decode(&bytes[..bytes.len() - 1]).count(), 0);
        assert_eq!(decode(&[]).count(), 0);
    }

    #[test]
    fn unknown_skip_reason_stops_decoding() {
        let mut rec = RecorderSink::new();
        rec.on_output_skipped(&OutputSkippedEvent {
            output: OutputId(0x45),
            crtc: CrtcId(0x42),
            reason: SkipReason::AlreadyVisited,
        });
        let mut bytes = rec.into_bytes();
        assert_eq!(
            decode(&bytes).collect::<Vec<_>>(),
            [RecordedEvent::OutputSkipped(OutputSkippedEvent {
                output: OutputId(0x45),
                crtc: CrtcId(0x42),
                reason: SkipReason::AlreadyVisited,
            })]
        );

        if let Some(reason) = bytes.last_mut() {
            *reason = 9;
        }
        assert_eq!(decode(&bytes).count(), 0);
    }
}
