//! Engine-side chaos modulation source.
//!
//! Wraps the core Lorenz generator with the two shapes the effects understand:
//!
//! - **smooth**: the attractor runs slowly (rate control maps to 0.01..=1.0)
//!   and its output is used directly.
//! - **stepped**: the attractor runs fast (rate maps to 1.0..=10.0) but the
//!   output is sampled and held at `mapped_rate * 10` Hz, giving glitchy
//!   plateaus instead of drift.
//!
//! Output is `attractor * amount`, so it always stays within ±amount.

use slicebox_core::chaos::ChaosGenerator;
use slicebox_core::dsp::clamp;

pub struct ChaosMod {
    gen: ChaosGenerator,
    sample_rate: f32,
    rate: f32,
    amount: f32,
    stepped: bool,
    step_phase: f32,
    held: f32,
}

impl ChaosMod {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            gen: ChaosGenerator::new(),
            sample_rate,
            rate: 0.5,
            amount: 0.5,
            stepped: false,
            step_phase: 0.0,
            held: 0.0,
        }
    }

    pub fn set_rate(&mut self, rate: f32) {
        self.rate = clamp(rate, 0.0, 1.0);
    }

    pub fn set_amount(&mut self, amount: f32) {
        self.amount = clamp(amount, 0.0, 1.0);
    }

    pub fn set_stepped(&mut self, stepped: bool) {
        if stepped && !self.stepped {
            // Capture a fresh value on the next call instead of holding a
            // stale (or zero) plateau until the first step clock fires.
            self.step_phase = 1.0;
        }
        self.stepped = stepped;
    }

    /// One modulation sample in [-amount, +amount].
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.stepped {
            let mapped = 1.0 + self.rate * 9.0;
            let raw = self.gen.process(mapped) * self.amount;
            self.step_phase += mapped * 10.0 / self.sample_rate;
            if self.step_phase >= 1.0 {
                self.step_phase -= 1.0;
                self.held = raw;
            }
            self.held
        } else {
            let mapped = 0.01 + self.rate * 0.99;
            self.gen.process(mapped) * self.amount
        }
    }
}

// --------------------------------- Tests (std only) ------------------------------
