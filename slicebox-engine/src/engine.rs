//! The engine proper: owns every stage, reads the shared parameter block once
//! per processed block, and renders sample by sample.
//!
//! Signal flow per sample:
//!
//! ```text
//! input ─▶ recorder tap ─▶ (+feedback) ─▶ granular (wet/dry)
//!       ─▶ slice player mix ─▶ EQ ─▶ delay (wet/dry) ─▶ reverb (wet/dry)
//!       ─▶ mixer channel 0 ─▶ out
//! ```
//!
//! The audio thread never allocates, never locks and never returns an error:
//! all fallibility is pushed into [`SliceEngine::new`].

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::info;

use crate::delay::StereoDelay;
use crate::error::ConfigError;
use crate::eq::ThreeBandEq;
use crate::grain::GrainProcessor;
use crate::mixer::Mixer;
use crate::modulation::ChaosMod;
use crate::params::{EngineHandle, EngineParams, EngineStatus, MIXER_CHANNELS};
use crate::player::SlicePlayer;
use crate::recorder::Recorder;
use crate::reverb::StereoReverb;
use crate::sequencer::StepSequencer;
use slicebox_core::dsp::soft_clip;

/// Feedback is soft-limited with a 0.3 pre-gain so quiet loops stay linear
/// while hot loops flatten instead of running away.
const FEEDBACK_DRIVE: f32 = 0.3;

#[derive(Copy, Clone, Debug)]
pub struct EngineConfig {
    pub sample_rate: f32,
    pub max_record_secs: f32,
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { sample_rate: 48000.0, max_record_secs: 60.0, seed: 0x5EED_BA5E }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        if !(1.0..=600.0).contains(&self.max_record_secs) {
            return Err(ConfigError::InvalidRecordCapacity(self.max_record_secs));
        }
        Ok(())
    }
}

pub struct SliceEngine {
    params: Arc<EngineParams>,
    status: Arc<EngineStatus>,

    recorder: Recorder,
    player: SlicePlayer,
    grain_l: GrainProcessor,
    grain_r: GrainProcessor,
    chaos: ChaosMod,
    eq: ThreeBandEq,
    delay: StereoDelay,
    reverb: StereoReverb,
    sequencer: StepSequencer,
    mixer: Mixer,

    prev_recording: bool,
    prev_min_slice: f32,
    prev_bpm: f32,
    seq_was_enabled: bool,
    last_l: f32,
    last_r: f32,
}

impl SliceEngine {
    /// Build an engine and its control handle. The only fallible moment in
    /// the engine's life.
    pub fn new(cfg: EngineConfig) -> Result<(Self, EngineHandle), ConfigError> {
        cfg.validate()?;

        let params = Arc::new(EngineParams::new());
        let status = Arc::new(EngineStatus::default());
        let handle = EngineHandle::new(Arc::clone(&params), Arc::clone(&status));

        let bpm = params.bpm.load();
        let engine = Self {
            recorder: Recorder::new(cfg.sample_rate, cfg.max_record_secs),
            player: SlicePlayer::new(),
            grain_l: GrainProcessor::new(cfg.sample_rate, cfg.seed),
            grain_r: GrainProcessor::new(cfg.sample_rate, cfg.seed.wrapping_add(1)),
            chaos: ChaosMod::new(cfg.sample_rate),
            eq: ThreeBandEq::new(cfg.sample_rate),
            delay: StereoDelay::new(cfg.sample_rate),
            reverb: StereoReverb::new(cfg.sample_rate),
            sequencer: StepSequencer::new(cfg.sample_rate, bpm, cfg.seed.wrapping_add(2)),
            mixer: Mixer::new(),
            prev_recording: false,
            prev_min_slice: params.min_slice_secs.load(),
            prev_bpm: bpm,
            seq_was_enabled: false,
            last_l: 0.0,
            last_r: 0.0,
            params,
            status,
        };
        info!(
            sample_rate = cfg.sample_rate,
            max_record_secs = cfg.max_record_secs,
            "engine ready"
        );
        Ok((engine, handle))
    }

    /// Render one block. All four slices are truncated to the shortest; any
    /// remaining output frames are zeroed.
    pub fn process(
        &mut self,
        in_l: &[f32],
        in_r: &[f32],
        out_l: &mut [f32],
        out_r: &mut [f32],
    ) {
        let n = in_l
            .len()
            .min(in_r.len())
            .min(out_l.len())
            .min(out_r.len());

        self.sync_controls();

        let p = &self.params;
        let mix = p.mix.load();
        let feedback = p.feedback.load();
        let grain_wet = p.grain_wet.load();
        let grain_chaos = p.grain_chaos.load(Ordering::Relaxed);
        let delay_wet = p.delay_wet.load();
        let delay_chaos = p.delay_chaos.load(Ordering::Relaxed);
        let reverb_wet = p.reverb_wet.load();
        let reverb_chaos = p.reverb_chaos.load(Ordering::Relaxed);
        let seq_on = p.seq_enabled.load(Ordering::Relaxed);

        for i in 0..n {
            let chaos = self.chaos.next();

            let il = in_l[i];
            let ir = in_r[i];
            self.recorder.write(il, ir);

            // Output-to-input feedback, soft-limited.
            let fb_l = soft_clip(self.last_l * FEEDBACK_DRIVE) / FEEDBACK_DRIVE * feedback;
            let fb_r = soft_clip(self.last_r * FEEDBACK_DRIVE) / FEEDBACK_DRIVE * feedback;
            let src_l = il + fb_l;
            let src_r = ir + fb_r;

            let wet_l = self.grain_l.process(src_l, grain_chaos, chaos);
            let wet_r = self.grain_r.process(src_r, grain_chaos, chaos);
            let gr_l = src_l + (wet_l - src_l) * grain_wet;
            let gr_r = src_r + (wet_r - src_r) * grain_wet;

            if seq_on {
                if let Some(step) = self.sequencer.tick() {
                    if step.gate {
                        self.player.trigger_scan(step.scan, self.recorder.slices());
                    }
                }
            }
            let (pl_l, pl_r) = self.player.render(&self.recorder);
            let mut l = gr_l + (pl_l - gr_l) * mix;
            let mut r = gr_r + (pl_r - gr_r) * mix;

            let (eq_l, eq_r) = self.eq.process(l, r);
            let (dw_l, dw_r) = self.delay.process(eq_l, eq_r, delay_chaos, chaos);
            l = eq_l + (dw_l - eq_l) * delay_wet;
            r = eq_r + (dw_r - eq_r) * delay_wet;

            let (rw_l, rw_r) = self.reverb.process(l, r, reverb_chaos, chaos);
            l += (rw_l - l) * reverb_wet;
            r += (rw_r - r) * reverb_wet;

            self.last_l = l;
            self.last_r = r;

            let silent = (0.0, 0.0);
            let (mx_l, mx_r) = self.mixer.process(&[(l, r), silent, silent, silent]);
            out_l[i] = mx_l;
            out_r[i] = mx_r;
        }

        for v in &mut out_l[n..] {
            *v = 0.0;
        }
        for v in &mut out_r[n..] {
            *v = 0.0;
        }

        self.publish_status();
    }

    /// Observe the shared parameter block once per block. Structural changes
    /// (record arm, tempo, sequencer enable) are detected edge-wise here.
    fn sync_controls(&mut self) {
        if self.params.clear_take.swap(false, Ordering::Relaxed) {
            self.recorder.clear();
            self.player.on_slices_changed(self.recorder.slices());
            self.prev_recording = false;
        }

        let recording = self.params.recording.load(Ordering::Relaxed);
        let min_slice = self.params.min_slice_secs.load();

        if recording != self.prev_recording {
            if recording {
                self.recorder.start();
            } else {
                self.recorder.stop(min_slice);
                self.player.on_slices_changed(self.recorder.slices());
            }
            self.prev_recording = recording;
        } else if !recording && min_slice != self.prev_min_slice {
            self.recorder.rescan(min_slice);
            self.player.on_slices_changed(self.recorder.slices());
        }
        self.prev_min_slice = min_slice;

        let bpm = self.params.bpm.load();
        if bpm != self.prev_bpm {
            self.sequencer.set_bpm(bpm);
            self.prev_bpm = bpm;
        }
        let seq_on = self.params.seq_enabled.load(Ordering::Relaxed);
        if seq_on && !self.seq_was_enabled {
            self.sequencer.restart();
        }
        self.seq_was_enabled = seq_on;

        self.player.set_speed(self.params.speed.load());
        self.player.set_looping(self.params.looping.load(Ordering::Relaxed));
        self.player
            .set_poly(self.params.poly.load(Ordering::Relaxed), self.recorder.slices());
        self.player
            .update_scan(self.params.scan.load(), self.recorder.slices());

        let gsize = self.params.grain_size.load();
        let gdens = self.params.grain_density.load();
        let gpos = self.params.grain_position.load();
        for g in [&mut self.grain_l, &mut self.grain_r] {
            g.set_size(gsize);
            g.set_density(gdens);
            g.set_position(gpos);
        }

        self.chaos.set_rate(self.params.chaos_rate.load());
        self.chaos.set_amount(self.params.chaos_amount.load());
        self.chaos
            .set_stepped(self.params.chaos_stepped.load(Ordering::Relaxed));

        self.eq.set_gains(
            self.params.eq_low_db.load(),
            self.params.eq_mid_db.load(),
            self.params.eq_high_db.load(),
        );

        self.delay.set_time_l(self.params.delay_time_l.load());
        self.delay.set_time_r(self.params.delay_time_r.load());
        self.delay.set_feedback(self.params.delay_feedback.load());

        self.reverb.set_room(self.params.reverb_room.load());
        self.reverb.set_damping(self.params.reverb_damping.load());
        self.reverb.set_decay(self.params.reverb_decay.load());

        for ch in 0..MIXER_CHANNELS {
            self.mixer.set_volume(ch, self.params.channel_volume[ch].load());
            self.mixer.set_pan(ch, self.params.channel_pan[ch].load());
            self.mixer
                .set_mute(ch, self.params.channel_mute[ch].load(Ordering::Relaxed));
            self.mixer
                .set_solo(ch, self.params.channel_solo[ch].load(Ordering::Relaxed));
        }
        self.mixer.set_master(self.params.master_volume.load());
    }

    fn publish_status(&self) {
        self.status
            .slice_count
            .store(self.recorder.slice_count(), Ordering::Relaxed);
        self.status
            .current_slice
            .store(self.player.current_slice(), Ordering::Relaxed);
        self.status
            .active_voices
            .store(self.player.active_voices(), Ordering::Relaxed);
        self.status
            .recording
            .store(self.recorder.is_recording(), Ordering::Relaxed);
        self.status
            .buffer_full
            .store(self.recorder.is_full(), Ordering::Relaxed);
    }
}

// --------------------------------- Tests (std only) ------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;
    const BLOCK: usize = 4800;

    fn engine() -> (SliceEngine, EngineHandle) {
        SliceEngine::new(EngineConfig {
            sample_rate: SR,
            max_record_secs: 10.0,
            seed: 7,
        })
        .expect("valid config")
    }

    fn run_block(e: &mut SliceEngine, amp: f32) -> (Vec<f32>, Vec<f32>) {
        let in_l = vec![amp; BLOCK];
        let in_r = vec![amp; BLOCK];
        let mut out_l = vec![0.0; BLOCK];
        let mut out_r = vec![0.0; BLOCK];
        e.process(&in_l, &in_r, &mut out_l, &mut out_r);
        (out_l, out_r)
    }

    /// Record two bursts separated by silence, then disarm.
    fn record_two_slices(e: &mut SliceEngine, h: &EngineHandle) {
        h.set_recording(true);
        let _ = run_block(e, 0.5);
        let _ = run_block(e, 0.0);
        let _ = run_block(e, 0.5);
        h.set_recording(false);
        let _ = run_block(e, 0.0);
    }

    fn rms(v: &[f32]) -> f32 {
        (v.iter().map(|x| x * x).sum::<f32>() / v.len() as f32).sqrt()
    }

    #[test]
    fn config_is_validated() {
        assert_eq!(
            SliceEngine::new(EngineConfig { sample_rate: 0.0, ..Default::default() })
                .err()
                .map(|e| e.to_string()),
            Some("sample rate must be positive and finite, got 0".into())
        );
        assert!(SliceEngine::new(EngineConfig {
            max_record_secs: 0.1,
            ..Default::default()
        })
        .is_err());
        assert!(SliceEngine::new(EngineConfig::default()).is_ok());
    }

    #[test]
    fn record_then_play_produces_audio_from_silence() {
        let (mut e, h) = engine();
        record_two_slices(&mut e, &h);

        let st = h.status();
        assert_eq!(st.slice_count, 2);
        assert!(!st.recording);
        assert_eq!(st.active_voices, 1);

        // Slice 1 is solid burst material; loop it with silent input.
        h.set_scan(1.0);
        let (out_l, _) = run_block(&mut e, 0.0);
        assert!(rms(&out_l) > 0.05, "rms={}", rms(&out_l));
    }

    #[test]
    fn idle_engine_is_silent() {
        let (mut e, _h) = engine();
        let (out_l, out_r) = run_block(&mut e, 0.0);
        assert!(out_l.iter().all(|&x| x == 0.0));
        assert!(out_r.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn mix_zero_passes_input_through() {
        let (mut e, h) = engine();
        h.set_mix(0.0);
        let _ = run_block(&mut e, 0.0); // let controls settle
        let (out_l, _) = run_block(&mut e, 0.25);
        // Pan law then master tanh, no recorded material needed.
        let expect = (0.25 * std::f32::consts::FRAC_1_SQRT_2).tanh();
        assert!((out_l[100] - expect).abs() < 1e-4, "out={}", out_l[100]);
    }

    #[test]
    fn scan_switches_the_audible_slice() {
        let (mut e, h) = engine();
        record_two_slices(&mut e, &h);

        h.set_scan(0.0);
        let _ = run_block(&mut e, 0.0);
        assert_eq!(h.status().current_slice, 0);

        h.set_scan(1.0);
        let _ = run_block(&mut e, 0.0);
        assert_eq!(h.status().current_slice, 1);
    }

    #[test]
    fn poly_raises_active_voices_and_level() {
        let (mut e, h) = engine();
        record_two_slices(&mut e, &h);

        // Loop the solid burst slice so level only depends on voice count.
        h.set_scan(1.0);
        let (solo_out, _) = run_block(&mut e, 0.0);
        h.set_poly(4);
        let _ = run_block(&mut e, 0.0);
        assert_eq!(h.status().active_voices, 4);
        let (quad_out, _) = run_block(&mut e, 0.0);
        assert!(rms(&quad_out) > rms(&solo_out) * 1.2);
    }

    #[test]
    fn mismatched_buffer_lengths_truncate_and_zero_fill() {
        let (mut e, _h) = engine();
        let in_l = vec![0.1; 100];
        let in_r = vec![0.1; 64];
        let mut out_l = vec![9.0; 256];
        let mut out_r = vec![9.0; 256];
        e.process(&in_l, &in_r, &mut out_l, &mut out_r);
        assert!(out_l[64..].iter().all(|&x| x == 0.0));
        assert!(out_r[64..].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn sequencer_retriggers_one_shot_playback() {
        let (mut e, h) = engine();
        record_two_slices(&mut e, &h);
        h.set_looping(false);
        h.set_sequencer_enabled(true);
        h.set_bpm(300.0);

        // One-shot voices die at slice end; only sequencer gates revive them.
        let mut heard = 0usize;
        for _ in 0..20 {
            let (out_l, _) = run_block(&mut e, 0.0);
            if rms(&out_l) > 0.01 {
                heard += 1;
            }
        }
        assert!(heard >= 5, "heard audio in {} of 20 blocks", heard);
    }

    #[test]
    fn output_stays_bounded_with_everything_hot() {
        let (mut e, h) = engine();
        record_two_slices(&mut e, &h);
        h.set_feedback(0.95);
        h.set_grain_wet(1.0);
        h.set_grain_density(1.0);
        h.set_grain_chaos(true);
        h.set_delay_wet(1.0);
        h.set_delay_feedback(0.8);
        h.set_delay_chaos(true);
        h.set_reverb_wet(1.0);
        h.set_reverb_decay(1.0);
        h.set_reverb_chaos(true);
        h.set_chaos_amount(1.0);
        h.set_master_volume(2.0);

        for _ in 0..50 {
            let (out_l, out_r) = run_block(&mut e, 0.9);
            for (&l, &r) in out_l.iter().zip(out_r.iter()) {
                assert!(l.is_finite() && r.is_finite());
                assert!(l.abs() <= 1.0 && r.abs() <= 1.0);
            }
        }
    }

    #[test]
    fn rerecording_replaces_the_take() {
        let (mut e, h) = engine();
        record_two_slices(&mut e, &h);
        assert_eq!(h.status().slice_count, 2);

        h.set_recording(true);
        let _ = run_block(&mut e, 0.5);
        h.set_recording(false);
        let _ = run_block(&mut e, 0.0);
        assert_eq!(h.status().slice_count, 1);
    }

    #[test]
    fn clearing_drops_the_take_and_silences_playback() {
        let (mut e, h) = engine();
        record_two_slices(&mut e, &h);
        h.set_scan(1.0);
        let (out_l, _) = run_block(&mut e, 0.0);
        assert!(rms(&out_l) > 0.05);

        h.clear_recording();
        let (out_l, out_r) = run_block(&mut e, 0.0);
        let st = h.status();
        assert_eq!(st.slice_count, 0);
        assert_eq!(st.active_voices, 0);
        assert!(!st.recording);
        assert!(out_l.iter().all(|&x| x == 0.0));
        assert!(out_r.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn clearing_while_armed_discards_the_partial_take() {
        let (mut e, h) = engine();
        h.set_recording(true);
        let _ = run_block(&mut e, 0.5);
        h.clear_recording();
        let _ = run_block(&mut e, 0.0);
        let st = h.status();
        assert!(!st.recording);
        assert_eq!(st.slice_count, 0);
    }

    #[test]
    fn handle_is_usable_from_another_thread() {
        let (mut e, h) = engine();
        let h2 = h.clone();
        let t = std::thread::spawn(move || {
            h2.set_scan(0.5);
            h2.set_grain_density(0.8);
            h2.set_bpm(180.0);
        });
        let _ = run_block(&mut e, 0.1);
        t.join().expect("setter thread");
        let _ = run_block(&mut e, 0.1);
    }
}
