//! Lorenz-attractor chaos source.
//!
//! A single Euler-integrated Lorenz system whose x coordinate, scaled down and
//! clamped, serves as a bounded modulation signal. The parameter set here is
//! tuned for musical drift rather than textbook values: the attractor folds a
//! little slower and the output stays well inside [-1, +1] most of the time.
//!
//! Divergence guard: Euler integration at large step sizes can blow up. Any
//! non-finite coordinate, or any coordinate beyond ±100, resets the full state
//! to the seed point so the stream keeps flowing with at most a one-sample
//! discontinuity.

use crate::dsp::{clamp, m_abs};

const SIGMA: f32 = 7.5;
const RHO: f32 = 30.9;
const BETA: f32 = 1.02;

/// Seed point after reset (and at construction).
const SEED: f32 = 0.1;

/// Coordinate magnitude beyond which the state is considered diverged.
const LIMIT: f32 = 100.0;

#[derive(Copy, Clone, Debug)]
pub struct ChaosGenerator {
    x: f32,
    y: f32,
    z: f32,
}

impl Default for ChaosGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChaosGenerator {
    #[inline]
    pub fn new() -> Self {
        Self { x: SEED, y: SEED, z: SEED }
    }

    #[inline]
    pub fn reset(&mut self) {
        self.x = SEED;
        self.y = SEED;
        self.z = SEED;
    }

    /// Advance one step and return the bounded output in [-1, +1].
    ///
    /// `rate` scales the integration step (`dt = rate * 0.001`); higher rates
    /// traverse the attractor faster. Values around 0.01..=10.0 are useful.
    #[inline]
    pub fn process(&mut self, rate: f32) -> f32 {
        let dt = rate * 0.001;

        let dx = SIGMA * (self.y - self.x);
        let dy = self.x * (RHO - self.z) - self.y;
        let dz = self.x * self.y - BETA * self.z;

        self.x += dx * dt;
        self.y += dy * dt;
        self.z += dz * dt;

        if !self.is_stable() {
            self.reset();
        }

        clamp(self.x * 0.1, -1.0, 1.0)
    }

    #[inline]
    fn is_stable(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.z.is_finite()
            && m_abs(self.x) <= LIMIT
            && m_abs(self.y) <= LIMIT
            && m_abs(self.z) <= LIMIT
    }
}

// --------------------------------- Tests (std only) ------------------------------
