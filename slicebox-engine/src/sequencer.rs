//! 16-step gate/scan sequencer with boundary-quantized tempo.
//!
//! A pattern is 16 steps of `{gate, scan}`; a fired gate retriggers the slice
//! player at the step's scan value. Patterns regenerate from the owned RNG at
//! every pattern boundary: on-beat steps (0, 4, 8, 12) fire often, off-beat
//! steps rarely.
//!
//! Tempo changes never tear a running pattern. `set_bpm` precomputes the new
//! step length and parks it; the swap happens only when the playhead wraps at
//! a pattern boundary, so every pattern plays out at exactly one tempo and a
//! step never has a fractional boundary mid-flight.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use slicebox_core::dsp::clamp;
use tracing::trace;

pub const STEPS: usize = 16;
pub const BPM_MIN: f32 = 30.0;
pub const BPM_MAX: f32 = 300.0;

const ON_BEAT_GATE_PROB: f32 = 0.9;
const OFF_BEAT_GATE_PROB: f32 = 0.35;

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Step {
    pub gate: bool,
    pub scan: f32,
}

/// A tempo change staged for the next pattern boundary. The step length is
/// computed once, at request time, so applying it is just two stores.
#[derive(Copy, Clone, Debug, PartialEq)]
struct PendingTempo {
    bpm: f32,
    samples_per_step: usize,
}

pub struct StepSequencer {
    sample_rate: f32,
    bpm: f32,
    samples_per_step: usize,
    position: usize,
    steps: [Step; STEPS],
    pending: Option<PendingTempo>,
    rng: SmallRng,
    started: bool,
}

impl StepSequencer {
    pub fn new(sample_rate: f32, bpm: f32, seed: u64) -> Self {
        let bpm = clamp(bpm, BPM_MIN, BPM_MAX);
        let mut seq = Self {
            sample_rate,
            bpm,
            samples_per_step: Self::step_len(sample_rate, bpm),
            position: 0,
            steps: [Step::default(); STEPS],
            pending: None,
            rng: SmallRng::seed_from_u64(seed),
            started: false,
        };
        seq.regenerate();
        seq
    }

    /// Sixteenth-note step length in samples.
    #[inline]
    fn step_len(sample_rate: f32, bpm: f32) -> usize {
        ((sample_rate * 60.0 / bpm / 4.0) as usize).max(1)
    }

    #[inline]
    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    #[inline]
    pub fn samples_per_step(&self) -> usize {
        self.samples_per_step
    }

    #[inline]
    pub fn tempo_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Stage a tempo change for the next pattern boundary. A request equal to
    /// the running tempo cancels any staged change instead of parking a no-op.
    pub fn set_bpm(&mut self, bpm: f32) {
        let bpm = clamp(bpm, BPM_MIN, BPM_MAX);
        if bpm == self.bpm {
            self.pending = None;
            return;
        }
        self.pending = Some(PendingTempo {
            bpm,
            samples_per_step: Self::step_len(self.sample_rate, bpm),
        });
    }

    /// Restart from the top of a fresh pattern (used when the sequencer is
    /// re-enabled). Any staged tempo applies immediately since no pattern is
    /// in flight.
    pub fn restart(&mut self) {
        self.position = 0;
        self.started = false;
        if let Some(p) = self.pending.take() {
            self.bpm = p.bpm;
            self.samples_per_step = p.samples_per_step;
        }
        self.regenerate();
    }

    /// Advance one sample. Returns the step that fires on this sample, if any.
    #[inline]
    pub fn tick(&mut self) -> Option<Step> {
        if self.started && self.position >= self.samples_per_step * STEPS {
            // Pattern boundary: the only place a staged tempo may land.
            if let Some(p) = self.pending.take() {
                trace!(bpm = p.bpm, "applying staged tempo at pattern boundary");
                self.bpm = p.bpm;
                self.samples_per_step = p.samples_per_step;
            }
            self.position = 0;
            self.regenerate();
        }
        self.started = true;

        let fired = if self.position % self.samples_per_step == 0 {
            let idx = self.position / self.samples_per_step;
            Some(self.steps[idx])
        } else {
            None
        };
        self.position += 1;
        fired
    }

    fn regenerate(&mut self) {
        for (i, step) in self.steps.iter_mut().enumerate() {
            let prob = if i % 4 == 0 { ON_BEAT_GATE_PROB } else { OFF_BEAT_GATE_PROB };
            step.gate = self.rng.gen::<f32>() < prob;
            step.scan = self.rng.gen::<f32>();
        }
    }
}

// --------------------------------- Tests (std only) ------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    /// Sample indices (relative to `n` ticks) at which any step fired.
    fn fire_indices(seq: &mut StepSequencer, n: usize) -> Vec<usize> {
        let mut out = Vec::new();
        for i in 0..n {
            if seq.tick().is_some() {
                out.push(i);
            }
        }
        out
    }

    #[test]
    fn steps_fire_on_a_regular_grid() {
        let mut seq = StepSequencer::new(SR, 120.0, 1);
        // 120 BPM -> 6000 samples per sixteenth.
        assert_eq!(seq.samples_per_step(), 6000);
        let fired = fire_indices(&mut seq, 6000 * 16);
        assert_eq!(fired.len(), 16);
        for (k, &i) in fired.iter().enumerate() {
            assert_eq!(i, k * 6000);
        }
    }

    #[test]
    fn tempo_change_waits_for_the_pattern_boundary() {
        let mut seq = StepSequencer::new(SR, 120.0, 2);
        let pattern = seq.samples_per_step() * STEPS;

        // Change tempo mid-pattern.
        let _ = fire_indices(&mut seq, 100);
        seq.set_bpm(240.0);
        assert!(seq.tempo_pending());
        assert_eq!(seq.bpm(), 120.0);

        // Finish the current pattern: every remaining step still lands on the
        // old 6000-sample grid.
        let fired = fire_indices(&mut seq, pattern - 100);
        for &i in &fired {
            assert_eq!((i + 100) % 6000, 0);
        }
        assert_eq!(seq.bpm(), 120.0);

        // First tick of the next pattern swaps in the staged tempo.
        let half_pattern = seq.samples_per_step() * STEPS / 2;
        let fired = fire_indices(&mut seq, half_pattern);
        assert_eq!(seq.bpm(), 240.0);
        assert_eq!(seq.samples_per_step(), 3000);
        for w in fired.windows(2) {
            assert_eq!(w[1] - w[0], 3000);
        }
    }

    #[test]
    fn equal_tempo_request_cancels_a_staged_change() {
        let mut seq = StepSequencer::new(SR, 120.0, 3);
        seq.set_bpm(200.0);
        assert!(seq.tempo_pending());
        seq.set_bpm(120.0);
        assert!(!seq.tempo_pending());
    }

    #[test]
    fn latest_request_wins() {
        let mut seq = StepSequencer::new(SR, 120.0, 4);
        seq.set_bpm(200.0);
        seq.set_bpm(90.0);
        let pattern = seq.samples_per_step() * STEPS;
        let _ = fire_indices(&mut seq, pattern + 1);
        assert_eq!(seq.bpm(), 90.0);
    }

    #[test]
    fn bpm_is_clamped() {
        let seq = StepSequencer::new(SR, 10_000.0, 5);
        assert_eq!(seq.bpm(), BPM_MAX);
        let mut seq = StepSequencer::new(SR, 120.0, 5);
        seq.set_bpm(1.0);
        let pattern = seq.samples_per_step() * STEPS;
        let _ = fire_indices(&mut seq, pattern + 1);
        assert_eq!(seq.bpm(), BPM_MIN);
    }

    #[test]
    fn on_beats_fire_more_often_than_off_beats() {
        let mut seq = StepSequencer::new(SR, 300.0, 6);
        let mut on = 0usize;
        let mut off = 0usize;
        // Run many patterns, classifying each fired step by its index.
        for _ in 0..200 {
            for idx in 0..STEPS {
                for s in 0..seq.samples_per_step() {
                    if let Some(step) = seq.tick() {
                        assert_eq!(s, 0);
                        if step.gate {
                            if idx % 4 == 0 {
                                on += 1;
                            } else {
                                off += 1;
                            }
                        }
                        assert!((0.0..=1.0).contains(&step.scan));
                    }
                }
            }
        }
        // 4 on-beat slots at 0.9 vs 12 off-beat slots at 0.35.
        let on_rate = on as f32 / (200.0 * 4.0);
        let off_rate = off as f32 / (200.0 * 12.0);
        assert!(on_rate > 0.8, "on_rate={}", on_rate);
        assert!(off_rate < 0.45 && off_rate > 0.25, "off_rate={}", off_rate);
    }

    #[test]
    fn restart_applies_staged_tempo_immediately() {
        let mut seq = StepSequencer::new(SR, 120.0, 7);
        let _ = fire_indices(&mut seq, 500);
        seq.set_bpm(60.0);
        seq.restart();
        assert!(!seq.tempo_pending());
        assert_eq!(seq.bpm(), 60.0);
        assert_eq!(seq.samples_per_step(), 12000);
    }
}
