//! Granular processor over a short rolling history of the input.
//!
//! Each channel keeps an 8192-frame ring of recent input. Grains are spawned
//! by a phase accumulator whose rate follows density (`density * 50 + 1` Hz),
//! read backwards into the history from the write head, and are shaped by a
//! Hann window. At most [`MAX_GRAINS`] sound at once; a spawn with no free
//! slot is simply skipped.
//!
//! Chaos coupling (only when enabled):
//! - effective density = `density + chaos * 0.3` (clamped to [0, 1])
//! - effective position = `position + chaos * 20` (clamped to [0, 1]); the
//!   deliberately huge gain slams the read point between the ends of the
//!   history for any audible chaos swing
//! - 30% of grains play reversed
//! - above 0.7 effective density, 20% of grains jump an octave (×2 or ×0.5)
//!
//! The RNG is owned and seeded at construction, so a run is reproducible.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use slicebox_core::dsp::{clamp, hann, lerp};

pub const MAX_GRAINS: usize = 16;
const BUFFER_FRAMES: usize = 8192;

const REVERSE_PROB: f32 = 0.30;
const OCTAVE_PROB: f32 = 0.20;
const OCTAVE_DENSITY_GATE: f32 = 0.7;
const CHAOS_DENSITY_DEPTH: f32 = 0.3;
const CHAOS_POSITION_DEPTH: f32 = 20.0;

/// Stochastic per-grain decisions, separated out so the distributions are
/// testable without audio plumbing.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct GrainVariation {
    pub reverse: bool,
    pub pitch: f32,
}

pub(crate) fn draw_variation(
    rng: &mut SmallRng,
    chaos_active: bool,
    effective_density: f32,
) -> GrainVariation {
    let mut var = GrainVariation { reverse: false, pitch: 1.0 };
    if !chaos_active {
        return var;
    }
    if rng.gen::<f32>() < REVERSE_PROB {
        var.reverse = true;
    }
    if effective_density > OCTAVE_DENSITY_GATE && rng.gen::<f32>() < OCTAVE_PROB {
        var.pitch = if rng.gen::<bool>() { 2.0 } else { 0.5 };
    }
    var
}

#[derive(Copy, Clone, Debug, Default)]
struct Grain {
    active: bool,
    pos: f32,
    inc: f32,
    age: f32,
    length: f32,
}

pub struct GrainProcessor {
    buffer: Vec<f32>,
    write: usize,
    grains: [Grain; MAX_GRAINS],
    trigger_phase: f32,
    sample_rate: f32,
    rng: SmallRng,
    spawned: u64,

    size: f32,
    density: f32,
    position: f32,
}

impl GrainProcessor {
    pub fn new(sample_rate: f32, seed: u64) -> Self {
        Self {
            buffer: vec![0.0; BUFFER_FRAMES],
            write: 0,
            grains: [Grain::default(); MAX_GRAINS],
            trigger_phase: 0.0,
            sample_rate,
            rng: SmallRng::seed_from_u64(seed),
            spawned: 0,
            size: 0.5,
            density: 0.3,
            position: 0.5,
        }
    }

    /// Grain length control: 0..1 maps to 1..100 ms.
    pub fn set_size(&mut self, size: f32) {
        self.size = clamp(size, 0.0, 1.0);
    }

    /// Spawn-rate control: 0..1 maps to 1..51 grains per second.
    pub fn set_density(&mut self, density: f32) {
        self.density = clamp(density, 0.0, 1.0);
    }

    /// How far back into the history grains start (0 = at the write head).
    pub fn set_position(&mut self, position: f32) {
        self.position = clamp(position, 0.0, 1.0);
    }

    pub fn active_grains(&self) -> usize {
        self.grains.iter().filter(|g| g.active).count()
    }

    pub fn spawn_count(&self) -> u64 {
        self.spawned
    }

    /// Process one input sample into the wet granular signal.
    pub fn process(&mut self, input: f32, chaos_active: bool, chaos: f32) -> f32 {
        self.buffer[self.write] = input;
        self.write = (self.write + 1) % BUFFER_FRAMES;

        let effective_density = if chaos_active {
            clamp(self.density + chaos * CHAOS_DENSITY_DEPTH, 0.0, 1.0)
        } else {
            self.density
        };

        let trigger_hz = effective_density * 50.0 + 1.0;
        self.trigger_phase += trigger_hz / self.sample_rate;
        if self.trigger_phase >= 1.0 {
            self.trigger_phase -= 1.0;
            self.spawn(chaos_active, chaos, effective_density);
        }

        let mut out = 0.0;
        let mut sounding = 0u32;
        for g in &mut self.grains {
            if !g.active {
                continue;
            }
            let w = hann(g.age / g.length);
            out += Self::read_ring(&self.buffer, g.pos) * w;
            sounding += 1;

            g.pos += g.inc;
            if g.pos >= BUFFER_FRAMES as f32 {
                g.pos -= BUFFER_FRAMES as f32;
            } else if g.pos < 0.0 {
                g.pos += BUFFER_FRAMES as f32;
            }
            g.age += 1.0;
            if g.age >= g.length {
                g.active = false;
            }
        }

        if sounding > 1 {
            // Equal-power sum so stacking grains does not pump the level.
            out /= (sounding as f32).sqrt();
        }
        out
    }

    fn spawn(&mut self, chaos_active: bool, chaos: f32, effective_density: f32) {
        let Some(slot) = self.grains.iter().position(|g| !g.active) else {
            return;
        };

        let var = draw_variation(&mut self.rng, chaos_active, effective_density);

        let size_ms = self.size * 99.0 + 1.0;
        let length = clamp(
            size_ms * 0.001 * self.sample_rate,
            32.0,
            (BUFFER_FRAMES - 1) as f32,
        );

        let position = if chaos_active {
            clamp(self.position + chaos * CHAOS_POSITION_DEPTH, 0.0, 1.0)
        } else {
            self.position
        };
        let span = (BUFFER_FRAMES - 1) as f32 - length;
        let back = position * span;

        let mut pos = self.write as f32 - 1.0 - back;
        if pos < 0.0 {
            pos += BUFFER_FRAMES as f32;
        }

        self.grains[slot] = Grain {
            active: true,
            pos,
            inc: if var.reverse { -var.pitch } else { var.pitch },
            age: 0.0,
            length,
        };
        self.spawned += 1;
    }

    #[inline]
    fn read_ring(buffer: &[f32], pos: f32) -> f32 {
        let n = buffer.len();
        let i0 = pos as usize % n;
        let i1 = (i0 + 1) % n;
        lerp(buffer[i0], buffer[i1], pos - (pos as usize) as f32)
    }
}

// --------------------------------- Tests (std only) ------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    fn run(gp: &mut GrainProcessor, n: usize, amp: f32, chaos_active: bool) -> Vec<f32> {
        (0..n)
            .map(|i| {
                let x = amp * (core::f32::consts::TAU * 220.0 * i as f32 / SR).sin();
                gp.process(x, chaos_active, 0.5)
            })
            .collect()
    }

    #[test]
    fn silence_in_silence_out() {
        let mut gp = GrainProcessor::new(SR, 1);
        for _ in 0..48000 {
            assert_eq!(gp.process(0.0, false, 0.0), 0.0);
        }
    }

    #[test]
    fn output_is_finite_and_grains_bounded() {
        let mut gp = GrainProcessor::new(SR, 7);
        gp.set_density(1.0);
        gp.set_size(1.0);
        let out = run(&mut gp, 96000, 0.8, true);
        assert!(out.iter().all(|x| x.is_finite()));
        assert!(gp.active_grains() <= MAX_GRAINS);
    }

    #[test]
    fn density_raises_spawn_rate() {
        let mut sparse = GrainProcessor::new(SR, 3);
        sparse.set_density(0.0);
        let _ = run(&mut sparse, 48000, 0.5, false);

        let mut dense = GrainProcessor::new(SR, 3);
        dense.set_density(1.0);
        let _ = run(&mut dense, 48000, 0.5, false);

        // 1 Hz vs 51 Hz trigger rate over one second.
        assert!(sparse.spawn_count() <= 2);
        assert!(dense.spawn_count() >= 40, "spawned {}", dense.spawn_count());
    }

    #[test]
    fn same_seed_same_output() {
        let mut a = GrainProcessor::new(SR, 42);
        let mut b = GrainProcessor::new(SR, 42);
        a.set_density(0.9);
        b.set_density(0.9);
        let oa = run(&mut a, 24000, 0.7, true);
        let ob = run(&mut b, 24000, 0.7, true);
        assert_eq!(oa, ob);
    }

    #[test]
    fn variation_is_identity_without_chaos() {
        let mut rng = SmallRng::seed_from_u64(9);
        for _ in 0..1000 {
            let v = draw_variation(&mut rng, false, 1.0);
            assert_eq!(v, GrainVariation { reverse: false, pitch: 1.0 });
        }
    }

    #[test]
    fn reverse_probability_is_about_thirty_percent() {
        let mut rng = SmallRng::seed_from_u64(1234);
        let n = 20000;
        let reversed = (0..n)
            .filter(|_| draw_variation(&mut rng, true, 0.5).reverse)
            .count();
        let frac = reversed as f32 / n as f32;
        assert!((frac - 0.30).abs() < 0.02, "reverse fraction {}", frac);
    }

    #[test]
    fn octave_jumps_only_above_the_density_gate() {
        let mut rng = SmallRng::seed_from_u64(77);
        let n = 20000;

        let below: usize = (0..n)
            .filter(|_| draw_variation(&mut rng, true, 0.6).pitch != 1.0)
            .count();
        assert_eq!(below, 0);

        let mut shifted = 0usize;
        for _ in 0..n {
            let v = draw_variation(&mut rng, true, 0.9);
            assert!(v.pitch == 1.0 || v.pitch == 0.5 || v.pitch == 2.0);
            if v.pitch != 1.0 {
                shifted += 1;
            }
        }
        let frac = shifted as f32 / n as f32;
        assert!((frac - 0.20).abs() < 0.02, "octave fraction {}", frac);
    }

    #[test]
    fn chaos_density_boost_clamps_at_one() {
        let mut gp = GrainProcessor::new(SR, 5);
        gp.set_density(1.0);
        // chaos = 1.0 would push effective density to 1.3 without the clamp;
        // the trigger rate must stay at its 51 Hz ceiling either way.
        let _ = run(&mut gp, 48000, 0.5, true);
        assert!(gp.spawn_count() <= 60);
    }
}
