//! Polyphonic slice playback.
//!
//! Up to eight voices replay the recorder's current slice with per-slot micro
//! detune and pan offsets, so stacking voices thickens instead of doubling.
//! Offsets come from fixed tables indexed by voice slot; slot 0 always plays
//! exactly at the requested speed and centered, so `poly = 1` is transparent.
//!
//! The scan control picks a slice by index (`floor(scan * (count - 1))`); a
//! change of *index* retriggers every active voice from the slice edge. Scan
//! movement inside one index is inaudible by design — the knob selects, it
//! does not scrub.

use slicebox_core::dsp::pan_gains;

use crate::params::MAX_VOICES;
use crate::recorder::{Recorder, Slice};

/// Per-slot stereo placement. Slot 0 is center.
const PAN_OFFSETS: [f32; MAX_VOICES] = [0.0, -0.35, 0.35, -0.7, 0.7, -0.2, 0.2, -0.5];

/// Per-slot playback-rate multipliers, a few cents each way. Slot 0 is exact.
const PITCH_OFFSETS: [f32; MAX_VOICES] =
    [1.0, 1.0059, 0.9941, 1.0117, 0.9883, 1.0178, 0.9826, 1.0293];

/// Fixed per-voice gain; summing stays below clip for realistic material and
/// keeps output level growing with polyphony.
const VOICE_GAIN: f32 = 0.7;

#[derive(Copy, Clone, Debug, Default)]
struct Voice {
    active: bool,
    position: f32,
}

pub struct SlicePlayer {
    voices: [Voice; MAX_VOICES],
    poly: usize,
    speed: f32,
    looping: bool,
    current_slice: usize,
    triggered: bool,
}

impl SlicePlayer {
    pub fn new() -> Self {
        Self {
            voices: [Voice::default(); MAX_VOICES],
            poly: 1,
            speed: 1.0,
            looping: true,
            current_slice: 0,
            triggered: false,
        }
    }

    #[inline]
    pub fn current_slice(&self) -> usize {
        self.current_slice
    }

    /// Voices currently sounding (within the active polyphony window).
    pub fn active_voices(&self) -> usize {
        self.voices[..self.poly].iter().filter(|v| v.active).count()
    }

    pub fn set_speed(&mut self, speed: f32) {
        // Direction changes apply in place; running voices simply turn around.
        self.speed = speed;
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn set_poly(&mut self, poly: usize, slices: &[Slice]) {
        let poly = poly.clamp(1, MAX_VOICES);
        if poly > self.poly {
            // New slots start from the slice edge; running slots are untouched.
            if let Some(s) = slices.get(self.current_slice) {
                for slot in self.poly..poly {
                    self.voices[slot].active = true;
                    self.voices[slot].position = self.slot_start(slot, s);
                }
            }
        } else {
            for slot in poly..self.poly {
                self.voices[slot].active = false;
            }
        }
        self.poly = poly;
    }

    /// Follow the scan control: retrigger only when the selected index changes.
    pub fn update_scan(&mut self, scan: f32, slices: &[Slice]) {
        if slices.is_empty() {
            return;
        }
        let target = Self::scan_index(scan, slices.len());
        if !self.triggered || target != self.current_slice {
            self.trigger_index(target, slices);
        }
    }

    /// Unconditional retrigger at the scanned slice (sequencer gates land here).
    pub fn trigger_scan(&mut self, scan: f32, slices: &[Slice]) {
        if slices.is_empty() {
            return;
        }
        self.trigger_index(Self::scan_index(scan, slices.len()), slices);
    }

    /// React to a new slice table: clamp the selection, silence if empty.
    pub fn on_slices_changed(&mut self, slices: &[Slice]) {
        if slices.is_empty() {
            for v in &mut self.voices {
                v.active = false;
            }
            self.triggered = false;
            self.current_slice = 0;
            return;
        }
        let idx = self.current_slice.min(slices.len() - 1);
        self.trigger_index(idx, slices);
    }

    /// Render one stereo frame and advance all active voices.
    pub fn render(&mut self, rec: &Recorder) -> (f32, f32) {
        let slices = rec.slices();
        let Some(&slice) = slices.get(self.current_slice) else {
            return (0.0, 0.0);
        };

        let mut out_l = 0.0;
        let mut out_r = 0.0;
        for slot in 0..self.poly {
            let inc = self.speed * PITCH_OFFSETS[slot];
            let v = &mut self.voices[slot];
            if !v.active {
                continue;
            }

            let (sl, sr) = rec.read_lin(v.position);
            let (gl, gr) = pan_gains(PAN_OFFSETS[slot]);
            out_l += sl * gl * VOICE_GAIN;
            out_r += sr * gr * VOICE_GAIN;

            v.position += inc;
            if inc >= 0.0 {
                if v.position > slice.end as f32 {
                    if self.looping {
                        v.position = slice.start as f32;
                    } else {
                        v.active = false;
                    }
                }
            } else if v.position < slice.start as f32 {
                if self.looping {
                    v.position = slice.end as f32;
                } else {
                    v.active = false;
                }
            }
        }
        (out_l, out_r)
    }

    #[inline]
    fn scan_index(scan: f32, count: usize) -> usize {
        debug_assert!(count > 0);
        let idx = (scan.clamp(0.0, 1.0) * (count - 1) as f32) as usize;
        idx.min(count - 1)
    }

    /// Start position for a slot, honoring its playback direction.
    #[inline]
    fn slot_start(&self, slot: usize, slice: &Slice) -> f32 {
        if self.speed * PITCH_OFFSETS[slot] >= 0.0 {
            slice.start as f32
        } else {
            slice.end as f32
        }
    }

    fn trigger_index(&mut self, index: usize, slices: &[Slice]) {
        self.current_slice = index.min(slices.len() - 1);
        self.triggered = true;
        let slice = slices[self.current_slice];
        for slot in 0..self.poly {
            self.voices[slot].active = true;
            self.voices[slot].position = self.slot_start(slot, &slice);
        }
    }
}

impl Default for SlicePlayer {
    fn default() -> Self {
        Self::new()
    }
}

// --------------------------------- Tests (std only) ------------------------------
