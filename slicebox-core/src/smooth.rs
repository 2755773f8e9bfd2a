//! Exponential parameter smoothing.
//!
//! The classic first-order lag `y += λ * (x - y)`, packaged with a clamped λ
//! so a bad control value can never freeze a parameter (λ too small) or let
//! clicks through (λ is capped at instant-ish but still finite response).

use crate::dsp::clamp;

pub const LAMBDA_MIN: f32 = 0.0001;
pub const LAMBDA_MAX: f32 = 0.1;

/// One-pole lag towards a moving target. Call [`Self::process`] once per sample.
#[derive(Copy, Clone, Debug)]
pub struct ParamSmoother {
    lambda: f32,
    current: f32,
}

impl ParamSmoother {
    #[inline]
    pub fn new(lambda: f32) -> Self {
        Self { lambda: clamp(lambda, LAMBDA_MIN, LAMBDA_MAX), current: 0.0 }
    }

    #[inline]
    pub fn set_lambda(&mut self, lambda: f32) {
        self.lambda = clamp(lambda, LAMBDA_MIN, LAMBDA_MAX);
    }

    /// Jump straight to `value`, bypassing the lag. For control-rate jumps
    /// where a discontinuity is wanted (e.g. an explicit delay-time change).
    #[inline]
    pub fn reset(&mut self, value: f32) {
        self.current = value;
    }

    #[inline]
    pub fn process(&mut self, target: f32) -> f32 {
        self.current += self.lambda * (target - self.current);
        self.current
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.current
    }
}

// --------------------------------- Tests (std only) ------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_to_target() {
        let mut s = ParamSmoother::new(0.01);
        let mut v = 0.0;
        for _ in 0..5000 {
            v = s.process(0.8);
        }
        assert!((v - 0.8).abs() < 1e-3, "v={}", v);
    }

    #[test]
    fn never_overshoots() {
        let mut s = ParamSmoother::new(0.1);
        let mut prev = 0.0;
        for _ in 0..1000 {
            let v = s.process(1.0);
            assert!(v >= prev && v <= 1.0, "prev={} v={}", prev, v);
            prev = v;
        }
    }

    #[test]
    fn lambda_is_clamped() {
        let mut s = ParamSmoother::new(50.0);
        // Even an absurd λ behaves like λ = LAMBDA_MAX: still a lag, no jump.
        let v = s.process(1.0);
        assert!((v - LAMBDA_MAX).abs() < 1e-6, "v={}", v);

        let mut s2 = ParamSmoother::new(0.0);
        // λ floors at LAMBDA_MIN, so the smoother still moves.
        let v2 = s2.process(1.0);
        assert!(v2 > 0.0);
    }

    #[test]
    fn reset_jumps_immediately() {
        let mut s = ParamSmoother::new(0.001);
        s.reset(0.25);
        assert_eq!(s.value(), 0.25);
    }
}
