//! Shared control state between the control thread and the audio callback.
//!
//! Every continuous parameter lives in an [`AtomicF32`] (an `AtomicU32`
//! holding the float's bit pattern); discrete parameters use `AtomicBool` /
//! `AtomicUsize`. The audio side only ever loads, the control side only ever
//! stores, both `Relaxed`: per-parameter tearing is impossible and cross-
//! parameter ordering does not matter at block granularity. The take-clear
//! flag is the one exception: a one-shot request the audio side swaps back
//! to `false` once acted on.
//!
//! All range policy lives in [`EngineHandle`]'s setters. The audio side can
//! trust whatever it loads.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use slicebox_core::dsp::clamp;
use tracing::debug;

// ------------------------------ Atomic f32 cell ------------------------------------

/// Lock-free f32 cell, stored as its IEEE-754 bit pattern in an `AtomicU32`.
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    #[inline]
    pub fn new(v: f32) -> Self {
        Self(AtomicU32::new(v.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, v: f32) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }
}

// ------------------------------ Parameter ranges -----------------------------------

pub const MIN_SLICE_SECS_RANGE: (f32, f32) = (0.001, 5.0);
pub const SPEED_RANGE: (f32, f32) = (-8.0, 8.0);
pub const FEEDBACK_MAX: f32 = 0.95;
pub const DELAY_TIME_RANGE: (f32, f32) = (0.001, 2.0);
pub const DELAY_FEEDBACK_MAX: f32 = 0.8;
pub const EQ_GAIN_RANGE: (f32, f32) = (-20.0, 0.0);
pub const BPM_RANGE: (f32, f32) = (30.0, 300.0);
pub const CHANNEL_VOLUME_MAX: f32 = 2.0;
pub const MAX_VOICES: usize = 8;
pub const MIXER_CHANNELS: usize = 4;

// ------------------------------ Parameter block ------------------------------------

/// The full control surface. One instance, shared via `Arc`.
#[derive(Debug)]
pub struct EngineParams {
    // Recorder
    pub recording: AtomicBool,
    pub clear_take: AtomicBool,
    pub min_slice_secs: AtomicF32,

    // Slice player
    pub scan: AtomicF32,
    pub poly: AtomicUsize,
    pub speed: AtomicF32,
    pub looping: AtomicBool,
    pub mix: AtomicF32,
    pub feedback: AtomicF32,

    // Granular
    pub grain_size: AtomicF32,
    pub grain_density: AtomicF32,
    pub grain_position: AtomicF32,
    pub grain_wet: AtomicF32,
    pub grain_chaos: AtomicBool,

    // Chaos modulator
    pub chaos_rate: AtomicF32,
    pub chaos_amount: AtomicF32,
    pub chaos_stepped: AtomicBool,

    // EQ
    pub eq_low_db: AtomicF32,
    pub eq_mid_db: AtomicF32,
    pub eq_high_db: AtomicF32,

    // Delay
    pub delay_time_l: AtomicF32,
    pub delay_time_r: AtomicF32,
    pub delay_feedback: AtomicF32,
    pub delay_wet: AtomicF32,
    pub delay_chaos: AtomicBool,

    // Reverb
    pub reverb_room: AtomicF32,
    pub reverb_damping: AtomicF32,
    pub reverb_decay: AtomicF32,
    pub reverb_wet: AtomicF32,
    pub reverb_chaos: AtomicBool,

    // Sequencer
    pub seq_enabled: AtomicBool,
    pub bpm: AtomicF32,

    // Mixer
    pub channel_volume: [AtomicF32; MIXER_CHANNELS],
    pub channel_pan: [AtomicF32; MIXER_CHANNELS],
    pub channel_mute: [AtomicBool; MIXER_CHANNELS],
    pub channel_solo: [AtomicBool; MIXER_CHANNELS],
    pub master_volume: AtomicF32,
}

impl EngineParams {
    pub fn new() -> Self {
        Self {
            recording: AtomicBool::new(false),
            clear_take: AtomicBool::new(false),
            min_slice_secs: AtomicF32::new(0.1),

            scan: AtomicF32::new(0.0),
            poly: AtomicUsize::new(1),
            speed: AtomicF32::new(1.0),
            looping: AtomicBool::new(true),
            mix: AtomicF32::new(1.0),
            feedback: AtomicF32::new(0.0),

            grain_size: AtomicF32::new(0.5),
            grain_density: AtomicF32::new(0.3),
            grain_position: AtomicF32::new(0.5),
            grain_wet: AtomicF32::new(0.0),
            grain_chaos: AtomicBool::new(false),

            chaos_rate: AtomicF32::new(0.5),
            chaos_amount: AtomicF32::new(0.5),
            chaos_stepped: AtomicBool::new(false),

            eq_low_db: AtomicF32::new(0.0),
            eq_mid_db: AtomicF32::new(0.0),
            eq_high_db: AtomicF32::new(0.0),

            delay_time_l: AtomicF32::new(0.25),
            delay_time_r: AtomicF32::new(0.375),
            delay_feedback: AtomicF32::new(0.3),
            delay_wet: AtomicF32::new(0.0),
            delay_chaos: AtomicBool::new(false),

            reverb_room: AtomicF32::new(0.5),
            reverb_damping: AtomicF32::new(0.5),
            reverb_decay: AtomicF32::new(0.5),
            reverb_wet: AtomicF32::new(0.0),
            reverb_chaos: AtomicBool::new(false),

            seq_enabled: AtomicBool::new(false),
            bpm: AtomicF32::new(120.0),

            channel_volume: std::array::from_fn(|_| AtomicF32::new(1.0)),
            channel_pan: std::array::from_fn(|_| AtomicF32::new(0.0)),
            channel_mute: std::array::from_fn(|_| AtomicBool::new(false)),
            channel_solo: std::array::from_fn(|_| AtomicBool::new(false)),
            master_volume: AtomicF32::new(1.0),
        }
    }
}

impl Default for EngineParams {
    fn default() -> Self {
        Self::new()
    }
}

// ------------------------------ Status snapshot ------------------------------------

/// Read side for UIs/CLIs: the audio thread stores a fresh snapshot once per
/// processed block.
#[derive(Debug, Default)]
pub struct EngineStatus {
    pub slice_count: AtomicUsize,
    pub current_slice: AtomicUsize,
    pub active_voices: AtomicUsize,
    pub recording: AtomicBool,
    pub buffer_full: AtomicBool,
}

/// Plain-value copy of [`EngineStatus`] for display.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub slice_count: usize,
    pub current_slice: usize,
    pub active_voices: usize,
    pub recording: bool,
    pub buffer_full: bool,
}

// ------------------------------ Control handle -------------------------------------

/// Cloneable control-side handle. Every setter clamps; out-of-range input is a
/// normal event, not an error.
#[derive(Clone, Debug)]
pub struct EngineHandle {
    pub(crate) params: Arc<EngineParams>,
    pub(crate) status: Arc<EngineStatus>,
}

impl EngineHandle {
    pub(crate) fn new(params: Arc<EngineParams>, status: Arc<EngineStatus>) -> Self {
        Self { params, status }
    }

    // --- Recorder ---

    pub fn set_recording(&self, on: bool) {
        debug!(recording = on, "recorder armed state change");
        self.params.recording.store(on, Ordering::Relaxed);
    }

    /// Drop the current take and its slices, disarming the recorder. Observed
    /// by the audio side at the next block.
    pub fn clear_recording(&self) {
        debug!("take clear requested");
        self.params.recording.store(false, Ordering::Relaxed);
        self.params.clear_take.store(true, Ordering::Relaxed);
    }

    pub fn set_min_slice_secs(&self, secs: f32) {
        let (lo, hi) = MIN_SLICE_SECS_RANGE;
        self.params.min_slice_secs.store(clamp(secs, lo, hi));
    }

    // --- Slice player ---

    pub fn set_scan(&self, scan: f32) {
        self.params.scan.store(clamp(scan, 0.0, 1.0));
    }

    pub fn set_poly(&self, voices: usize) {
        self.params.poly.store(voices.clamp(1, MAX_VOICES), Ordering::Relaxed);
    }

    pub fn set_speed(&self, speed: f32) {
        let (lo, hi) = SPEED_RANGE;
        self.params.speed.store(clamp(speed, lo, hi));
    }

    pub fn set_looping(&self, on: bool) {
        self.params.looping.store(on, Ordering::Relaxed);
    }

    /// Dry input vs slice-player balance (0 = input only, 1 = player only).
    pub fn set_mix(&self, mix: f32) {
        self.params.mix.store(clamp(mix, 0.0, 1.0));
    }

    /// Output-to-input feedback amount. Capped below unity so the loop decays.
    pub fn set_feedback(&self, fb: f32) {
        self.params.feedback.store(clamp(fb, 0.0, FEEDBACK_MAX));
    }

    // --- Granular ---

    pub fn set_grain_size(&self, size: f32) {
        self.params.grain_size.store(clamp(size, 0.0, 1.0));
    }

    pub fn set_grain_density(&self, density: f32) {
        self.params.grain_density.store(clamp(density, 0.0, 1.0));
    }

    pub fn set_grain_position(&self, position: f32) {
        self.params.grain_position.store(clamp(position, 0.0, 1.0));
    }

    pub fn set_grain_wet(&self, wet: f32) {
        self.params.grain_wet.store(clamp(wet, 0.0, 1.0));
    }

    pub fn set_grain_chaos(&self, on: bool) {
        self.params.grain_chaos.store(on, Ordering::Relaxed);
    }

    // --- Chaos modulator ---

    pub fn set_chaos_rate(&self, rate: f32) {
        self.params.chaos_rate.store(clamp(rate, 0.0, 1.0));
    }

    pub fn set_chaos_amount(&self, amount: f32) {
        self.params.chaos_amount.store(clamp(amount, 0.0, 1.0));
    }

    /// `true` selects the stepped (sample-and-hold) shape, `false` the smooth one.
    pub fn set_chaos_stepped(&self, stepped: bool) {
        self.params.chaos_stepped.store(stepped, Ordering::Relaxed);
    }

    // --- EQ (cut-only, dB) ---

    pub fn set_eq_low_db(&self, db: f32) {
        let (lo, hi) = EQ_GAIN_RANGE;
        self.params.eq_low_db.store(clamp(db, lo, hi));
    }

    pub fn set_eq_mid_db(&self, db: f32) {
        let (lo, hi) = EQ_GAIN_RANGE;
        self.params.eq_mid_db.store(clamp(db, lo, hi));
    }

    pub fn set_eq_high_db(&self, db: f32) {
        let (lo, hi) = EQ_GAIN_RANGE;
        self.params.eq_high_db.store(clamp(db, lo, hi));
    }

    // --- Delay ---

    pub fn set_delay_time_l(&self, secs: f32) {
        let (lo, hi) = DELAY_TIME_RANGE;
        self.params.delay_time_l.store(clamp(secs, lo, hi));
    }

    pub fn set_delay_time_r(&self, secs: f32) {
        let (lo, hi) = DELAY_TIME_RANGE;
        self.params.delay_time_r.store(clamp(secs, lo, hi));
    }

    pub fn set_delay_feedback(&self, fb: f32) {
        self.params.delay_feedback.store(clamp(fb, 0.0, DELAY_FEEDBACK_MAX));
    }

    pub fn set_delay_wet(&self, wet: f32) {
        self.params.delay_wet.store(clamp(wet, 0.0, 1.0));
    }

    pub fn set_delay_chaos(&self, on: bool) {
        self.params.delay_chaos.store(on, Ordering::Relaxed);
    }

    // --- Reverb ---

    pub fn set_reverb_room(&self, room: f32) {
        self.params.reverb_room.store(clamp(room, 0.0, 1.0));
    }

    pub fn set_reverb_damping(&self, damping: f32) {
        self.params.reverb_damping.store(clamp(damping, 0.0, 1.0));
    }

    pub fn set_reverb_decay(&self, decay: f32) {
        self.params.reverb_decay.store(clamp(decay, 0.0, 1.0));
    }

    pub fn set_reverb_wet(&self, wet: f32) {
        self.params.reverb_wet.store(clamp(wet, 0.0, 1.0));
    }

    pub fn set_reverb_chaos(&self, on: bool) {
        self.params.reverb_chaos.store(on, Ordering::Relaxed);
    }

    // --- Sequencer ---

    pub fn set_sequencer_enabled(&self, on: bool) {
        debug!(enabled = on, "sequencer enable change");
        self.params.seq_enabled.store(on, Ordering::Relaxed);
    }

    /// Request a tempo change. Takes effect at the next pattern boundary.
    pub fn set_bpm(&self, bpm: f32) {
        let (lo, hi) = BPM_RANGE;
        let clamped = clamp(bpm, lo, hi);
        debug!(bpm = clamped, "tempo change requested");
        self.params.bpm.store(clamped);
    }

    // --- Mixer ---

    pub fn set_channel_volume(&self, ch: usize, volume: f32) {
        if let Some(cell) = self.params.channel_volume.get(ch) {
            cell.store(clamp(volume, 0.0, CHANNEL_VOLUME_MAX));
        }
    }

    pub fn set_channel_pan(&self, ch: usize, pan: f32) {
        if let Some(cell) = self.params.channel_pan.get(ch) {
            cell.store(clamp(pan, -1.0, 1.0));
        }
    }

    pub fn set_channel_mute(&self, ch: usize, mute: bool) {
        if let Some(cell) = self.params.channel_mute.get(ch) {
            cell.store(mute, Ordering::Relaxed);
        }
    }

    pub fn set_channel_solo(&self, ch: usize, solo: bool) {
        if let Some(cell) = self.params.channel_solo.get(ch) {
            cell.store(solo, Ordering::Relaxed);
        }
    }

    pub fn set_master_volume(&self, volume: f32) {
        self.params.master_volume.store(clamp(volume, 0.0, CHANNEL_VOLUME_MAX));
    }

    // --- Status ---

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            slice_count: self.status.slice_count.load(Ordering::Relaxed),
            current_slice: self.status.current_slice.load(Ordering::Relaxed),
            active_voices: self.status.active_voices.load(Ordering::Relaxed),
            recording: self.status.recording.load(Ordering::Relaxed),
            buffer_full: self.status.buffer_full.load(Ordering::Relaxed),
        }
    }
}

// --------------------------------- Tests (std only) ------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> EngineHandle {
        EngineHandle::new(Arc::new(EngineParams::new()), Arc::new(EngineStatus::default()))
    }

    #[test]
    fn atomic_f32_roundtrips_bits() {
        let a = AtomicF32::new(0.0);
        for v in [0.0, -0.0, 1.5, -3.25, f32::MIN_POSITIVE, 1.0e30] {
            a.store(v);
            assert_eq!(a.load().to_bits(), v.to_bits());
        }
    }

    #[test]
    fn setters_clamp_to_range() {
        let h = handle();

        h.set_speed(100.0);
        assert_eq!(h.params.speed.load(), 8.0);
        h.set_speed(-100.0);
        assert_eq!(h.params.speed.load(), -8.0);

        h.set_feedback(2.0);
        assert_eq!(h.params.feedback.load(), FEEDBACK_MAX);

        h.set_delay_feedback(1.0);
        assert_eq!(h.params.delay_feedback.load(), DELAY_FEEDBACK_MAX);

        h.set_eq_low_db(6.0);
        assert_eq!(h.params.eq_low_db.load(), 0.0);
        h.set_eq_low_db(-40.0);
        assert_eq!(h.params.eq_low_db.load(), -20.0);

        h.set_bpm(10.0);
        assert_eq!(h.params.bpm.load(), 30.0);
        h.set_bpm(1000.0);
        assert_eq!(h.params.bpm.load(), 300.0);

        h.set_poly(0);
        assert_eq!(h.params.poly.load(Ordering::Relaxed), 1);
        h.set_poly(99);
        assert_eq!(h.params.poly.load(Ordering::Relaxed), MAX_VOICES);
    }

    #[test]
    fn out_of_range_mixer_channel_is_ignored() {
        let h = handle();
        h.set_channel_volume(7, 1.5);
        h.set_channel_mute(9, true);
        for ch in 0..MIXER_CHANNELS {
            assert_eq!(h.params.channel_volume[ch].load(), 1.0);
            assert!(!h.params.channel_mute[ch].load(Ordering::Relaxed));
        }
    }
}
