//! Filters used on the effects path.
//!
//! - [`OnePole`]: raw-coefficient one-pole low-pass (`y += a * (x - y)`), also
//!   usable as a high-pass by subtracting its output from the input. Cheap
//!   enough for per-sample damping inside comb loops.
//! - [`Biquad`]: RBJ cookbook biquad, offered as low shelf / peaking / high
//!   shelf, which is all a three-band corrective EQ needs.
//!
//! All state is `f32`; filters are `Copy` so channel pairs can be built by
//! simple duplication.

use crate::dsp::{clamp, m_cos, m_exp, m_sin, m_sqrt};

// --------------------------------- One-pole ---------------------------------------

/// One-pole low-pass with a direct smoothing coefficient `a` in [0, 1].
///
/// `a = 1` tracks the input instantly; small `a` smooths heavily. Use
/// [`crate::dsp::one_pole_coeff_hz`] to derive `a` from a cutoff (note that
/// helper returns the *pole*, so pass `1.0 - pole` here).
#[derive(Copy, Clone, Debug)]
pub struct OnePole {
    a: f32,
    y: f32,
}

impl OnePole {
    #[inline]
    pub fn new(a: f32) -> Self {
        Self { a: clamp(a, 0.0, 1.0), y: 0.0 }
    }

    #[inline]
    pub fn set_coeff(&mut self, a: f32) {
        self.a = clamp(a, 0.0, 1.0);
    }

    #[inline]
    pub fn reset(&mut self) {
        self.y = 0.0;
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        self.y += self.a * (x - self.y);
        self.y
    }

    /// Last output without advancing the filter.
    #[inline]
    pub fn value(&self) -> f32 {
        self.y
    }
}

// --------------------------------- RBJ biquad --------------------------------------

/// Transfer-function coefficients for [`Biquad`], normalized so `a0 == 1`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoeffs {
    pub const IDENTITY: Self = Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 };

    /// RBJ low shelf at `f0` Hz with shelf gain `gain_db` and slope-style Q.
    pub fn low_shelf(f0: f32, sr: f32, gain_db: f32, q: f32) -> Self {
        let (a, w0, alpha) = Self::common(f0, sr, gain_db, q);
        let (cos_w0, sq) = (m_cos(w0), 2.0 * m_sqrt(a) * alpha);
        let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + sq;
        Self {
            b0: a * ((a + 1.0) - (a - 1.0) * cos_w0 + sq) / a0,
            b1: 2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0) / a0,
            b2: a * ((a + 1.0) - (a - 1.0) * cos_w0 - sq) / a0,
            a1: -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0) / a0,
            a2: ((a + 1.0) + (a - 1.0) * cos_w0 - sq) / a0,
        }
    }

    /// RBJ high shelf at `f0` Hz.
    pub fn high_shelf(f0: f32, sr: f32, gain_db: f32, q: f32) -> Self {
        let (a, w0, alpha) = Self::common(f0, sr, gain_db, q);
        let (cos_w0, sq) = (m_cos(w0), 2.0 * m_sqrt(a) * alpha);
        let a0 = (a + 1.0) - (a - 1.0) * cos_w0 + sq;
        Self {
            b0: a * ((a + 1.0) + (a - 1.0) * cos_w0 + sq) / a0,
            b1: -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0) / a0,
            b2: a * ((a + 1.0) + (a - 1.0) * cos_w0 - sq) / a0,
            a1: 2.0 * ((a - 1.0) - (a + 1.0) * cos_w0) / a0,
            a2: ((a + 1.0) - (a - 1.0) * cos_w0 - sq) / a0,
        }
    }

    /// RBJ peaking EQ at `f0` Hz.
    pub fn peaking(f0: f32, sr: f32, gain_db: f32, q: f32) -> Self {
        let (a, w0, alpha) = Self::common(f0, sr, gain_db, q);
        let cos_w0 = m_cos(w0);
        let a0 = 1.0 + alpha / a;
        Self {
            b0: (1.0 + alpha * a) / a0,
            b1: -2.0 * cos_w0 / a0,
            b2: (1.0 - alpha * a) / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha / a) / a0,
        }
    }

    #[inline]
    fn common(f0: f32, sr: f32, gain_db: f32, q: f32) -> (f32, f32, f32) {
        // A = 10^(gain_db/40) = exp(ln(10)/40 * gain_db)
        let a = m_exp(0.057_564_627_324_851_146_f32 * gain_db);
        let f = clamp(f0, 1.0, 0.49 * sr);
        let w0 = core::f32::consts::TAU * f / sr;
        let alpha = m_sin(w0) / (2.0 * q.max(0.05));
        (a, w0, alpha)
    }
}

/// Direct-form-I biquad section.
#[derive(Copy, Clone, Debug)]
pub struct Biquad {
    c: BiquadCoeffs,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    #[inline]
    pub fn new(c: BiquadCoeffs) -> Self {
        Self { c, x1: 0.0, x2: 0.0, y1: 0.0, y2: 0.0 }
    }

    /// Swap coefficients without clearing state (click-free for small moves).
    #[inline]
    pub fn set_coeffs(&mut self, c: BiquadCoeffs) {
        self.c = c;
    }

    #[inline]
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.c.b0 * x + self.c.b1 * self.x1 + self.c.b2 * self.x2
            - self.c.a1 * self.y1
            - self.c.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

// --------------------------------- Tests (std only) ------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn rms(v: &[f32]) -> f32 {
        (v.iter().map(|x| x * x).sum::<f32>() / v.len() as f32).sqrt()
    }

    fn sine(freq: f32, sr: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (core::f32::consts::TAU * freq * i as f32 / sr).sin())
            .collect()
    }

    #[test]
    fn one_pole_settles_on_dc() {
        let mut lp = OnePole::new(0.01);
        let mut y = 0.0;
        for _ in 0..5000 {
            y = lp.process(1.0);
        }
        assert!((y - 1.0).abs() < 1e-3);
    }

    #[test]
    fn identity_coeffs_pass_through() {
        let mut bq = Biquad::new(BiquadCoeffs::IDENTITY);
        for x in [0.5, -0.25, 1.0, 0.0] {
            assert_eq!(bq.process(x), x);
        }
    }

    #[test]
    fn low_shelf_cut_attenuates_low_sine() {
        let sr = 48000.0;
        let mut bq = Biquad::new(BiquadCoeffs::low_shelf(80.0, sr, -12.0, 0.707));
        let input = sine(40.0, sr, 48000);
        let out: Vec<f32> = input.iter().map(|&x| bq.process(x)).collect();
        // Skip the transient, compare steady-state energy.
        let g = rms(&out[24000..]) / rms(&input[24000..]);
        assert!(g < 0.4, "low shelf cut gain = {}", g);
    }

    #[test]
    fn low_shelf_cut_leaves_highs_alone() {
        let sr = 48000.0;
        let mut bq = Biquad::new(BiquadCoeffs::low_shelf(80.0, sr, -12.0, 0.707));
        let input = sine(4000.0, sr, 48000);
        let out: Vec<f32> = input.iter().map(|&x| bq.process(x)).collect();
        let g = rms(&out[24000..]) / rms(&input[24000..]);
        assert!((g - 1.0).abs() < 0.05, "passband gain = {}", g);
    }

    #[test]
    fn peaking_cut_attenuates_center_frequency() {
        let sr = 48000.0;
        let mut bq = Biquad::new(BiquadCoeffs::peaking(2500.0, sr, -12.0, 0.707));
        let input = sine(2500.0, sr, 48000);
        let out: Vec<f32> = input.iter().map(|&x| bq.process(x)).collect();
        let g = rms(&out[24000..]) / rms(&input[24000..]);
        assert!(g < 0.4, "peak cut gain = {}", g);
    }
}
