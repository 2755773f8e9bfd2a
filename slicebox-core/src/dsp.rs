//! Generic DSP utilities and math helpers.
//!
//! Design goals:
//! - `no_std` ready (guarded by the crate feature `no-std`)
//! - Math backend selection that works in both `std` and `no_std` contexts
//! - Optional `fast-math` approximations for hot paths
//! - Clean, side-effect free helpers that are easy to test
//!
//! Conventions:
//! - All functions are `#[inline]` where useful to help the optimizer.
//! - Argument and return domains are documented per function.

#![allow(clippy::excessive_precision)]

use core::f32::consts::PI;

use cfg_if::cfg_if;

// ----------------------------- Math backend selection -----------------------------

cfg_if! {
    // libm (C math) in no_std
    if #[cfg(feature = "no-std")] {
        #[inline] pub(crate) fn m_sin(x: f32) -> f32 { libm::sinf(x) }
        #[inline] pub(crate) fn m_cos(x: f32) -> f32 { libm::cosf(x) }
        #[inline] pub(crate) fn m_exp(x: f32) -> f32 { libm::expf(x) }
        #[inline] pub(crate) fn m_ln(x: f32) -> f32 { libm::logf(x) }
        #[inline] pub(crate) fn m_tanh(x: f32) -> f32 { libm::tanhf(x) }
        #[inline] pub(crate) fn m_sqrt(x: f32) -> f32 { libm::sqrtf(x) }
        #[inline] pub(crate) fn m_abs(x: f32) -> f32 { libm::fabsf(x) }
    // std backend
    } else {
        #[inline] pub(crate) fn m_sin(x: f32) -> f32 { x.sin() }
        #[inline] pub(crate) fn m_cos(x: f32) -> f32 { x.cos() }
        #[inline] pub(crate) fn m_exp(x: f32) -> f32 { x.exp() }
        #[inline] pub(crate) fn m_ln(x: f32) -> f32 { x.ln() }
        #[inline] pub(crate) fn m_tanh(x: f32) -> f32 { x.tanh() }
        #[inline] pub(crate) fn m_sqrt(x: f32) -> f32 { x.sqrt() }
        #[inline] pub(crate) fn m_abs(x: f32) -> f32 { x.abs() }
    }
}

// --------------------------------- Constants -------------------------------------

/// 2π (commonly useful)
pub const TAU: f32 = 2.0 * PI;

/// A very small epsilon used in denormal handling and safe divisions.
pub const EPS_SMALL: f32 = 1.0e-20;

// --------------------------------- Utilities -------------------------------------

#[inline]
pub fn clamp(x: f32, lo: f32, hi: f32) -> f32 {
    if x < lo { lo } else if x > hi { hi } else { x }
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Kill denormal/subnormal values. Returns 0.0 if |x| < EPS_SMALL.
#[inline]
pub fn kill_denormals(x: f32) -> f32 {
    if m_abs(x) < EPS_SMALL { 0.0 } else { x }
}

/// Peak amplitude of a stereo frame: max(|l|, |r|).
#[inline]
pub fn frame_peak(l: f32, r: f32) -> f32 {
    let al = m_abs(l);
    let ar = m_abs(r);
    if al > ar { al } else { ar }
}

// --------------------------------- dB / linear -----------------------------------

/// Convert dB to linear gain: lin = 10^(db/20).
#[inline]
pub fn db_to_lin(db: f32) -> f32 {
    if db <= -120.0 { 0.0 } else { m_exp(0.11512925464970229_f32 * db) } // ln(10)/20 ≈ 0.115129...
}

/// Convert linear gain to dB: db = 20*log10(lin).
#[inline]
pub fn lin_to_db(lin: f32) -> f32 {
    if lin <= EPS_SMALL { -120.0 }
    else { 8.685889638065036553_f32 * m_ln(lin) } // 20/ln(10)
}

// --------------------------------- Fast trig -------------------------------------

/// Fast sine with range reduction into [-π, π] and 5th-order minimax-style poly.
/// Max abs error ~1e-3 for musical uses when `fast-math` is enabled; falls back to exact otherwise.
#[inline]
pub fn fast_sin(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            // Range reduce to [-π, π] without making the parameter mutable in the signature.
            let mut xr = x;
            let k = (xr / TAU).round();
            xr -= k * TAU;

            // 5th-order odd polynomial: sin(x) ≈ x * (a + b x^2 + c x^4)
            let x2 = xr * xr;
            xr * (0.999_979_313_3 + x2 * (-0.166_624_432_0 + x2 * 0.008_308_978_98))
        } else {
            m_sin(x)
        }
    }
}

#[inline]
pub fn fast_cos(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            // cos(x) = sin(x + π/2)
            fast_sin(x + core::f32::consts::PI * 0.5)
        } else {
            m_cos(x)
        }
    }
}

// --------------------------------- Windows / panning ------------------------------

/// Hann window evaluated at `phase` in [0, 1]: 0.5 * (1 - cos(2π phase)).
/// Zero at both edges, unity in the middle.
#[inline]
pub fn hann(phase: f32) -> f32 {
    let p = clamp(phase, 0.0, 1.0);
    0.5 * (1.0 - fast_cos(TAU * p))
}

/// Constant-power pan gains for `pan` in [-1, +1] (-1 = hard left).
/// Returns `(gain_l, gain_r)`; both are `1/√2` at center.
#[inline]
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let angle = (clamp(pan, -1.0, 1.0) + 1.0) * 0.25 * PI;
    (fast_cos(angle), fast_sin(angle))
}

// --------------------------------- Nonlinearities --------------------------------

/// Soft clip via tanh. If `fast-math` is enabled, uses a stable rational approximation.
///
/// Approximation used when `fast-math`:
/// `tanh(x) ≈ x * (27 + x^2) / (27 + 9 x^2)`
///
/// This is smooth, monotonic, and clamps towards ±1.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    #[cfg(feature = "fast-math")]
    {
        let x2 = x * x;
        let num = x * (27.0 + x2);
        let den = 27.0 + 9.0 * x2;
        return num / den;
    }
    m_tanh(x)
}

/// Drive + soft saturation helper: `tanh(drive * x)` (or fast approx).
#[inline]
pub fn saturate(x: f32, drive: f32) -> f32 {
    soft_clip(x * drive)
}

// --------------------------------- Exponentials / smoothing ----------------------

/// One-pole smoothing coefficient for a time constant `t_ms` (milliseconds).
///
/// The discrete one-pole form: `y[n] += a * (x[n] - y[n])`
/// where `a = exp(-1/(tau * sr))` for first-order lag with time constant `tau`.
///
/// We interpret `t_ms` as the time to reach ~63% (1 - 1/e). Common for parameter smoothing.
#[inline]
pub fn one_pole_coeff_ms(t_ms: f32, sr: f32) -> f32 {
    if t_ms <= 0.0 { return 1.0; }
    let tau = t_ms * 0.001;
    m_exp(-1.0 / (tau * sr))
}

/// Convert cutoff in Hz to a simple one-pole (non-TPT) coefficient.
/// Same form as `y += a * (x - y)`. This is not exactly a bilinear-matched filter;
/// it's a lightweight "RC" style discretization.
#[inline]
pub fn one_pole_coeff_hz(cut_hz: f32, sr: f32) -> f32 {
    let fc = cut_hz.max(0.0).min(0.499 * sr);
    m_exp(-2.0 * PI * fc / sr)
}

// --------------------------------- Simple meters ---------------------------------

/// Running RMS meter (windowed via exponential smoothing). Call once per sample.
///
/// `alpha` is the smoothing factor in [0,1]; a good choice is `alpha = one_pole_coeff_ms(50, sr)`.
#[derive(Copy, Clone, Debug)]
pub struct Rms {
    pub alpha: f32,
    state: f32,
}
impl Rms {
    #[inline]
    pub fn new(alpha: f32) -> Self { Self { alpha, state: 0.0 } }

    #[inline]
    pub fn reset(&mut self) { self.state = 0.0; }

    #[inline]
    pub fn tick(&mut self, x: f32) -> f32 {
        let x2 = x * x;
        self.state += self.alpha * (x2 - self.state);
        m_sqrt(self.state)
    }
}

// --------------------------------- Tests (std only) ------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_lin_roundtrip() {
        for db in [-60.0, -20.0, -6.0, 0.0, 6.0, 12.0, 24.0] {
            let lin = db_to_lin(db);
            let back = lin_to_db(lin);
            assert!((db - back).abs() < 0.1, "db={}, back={}", db, back);
        }
    }

    #[test]
    fn clamp_orders_bounds() {
        assert_eq!(clamp(5.0, 0.0, 1.0), 1.0);
        assert_eq!(clamp(-5.0, 0.0, 1.0), 0.0);
        assert_eq!(clamp(0.25, 0.0, 1.0), 0.25);
    }

    #[test]
    fn soft_clip_is_bounded() {
        for x in [-10.0, -2.0, -1.0, 0.0, 1.0, 2.0, 10.0] {
            let y = soft_clip(x);
            assert!(y <= 1.0 + 1e-4 && y >= -1.0 - 1e-4, "x={} y={}", x, y);
        }
    }

    #[test]
    fn hann_edges_and_center() {
        assert!(hann(0.0).abs() < 1e-6);
        assert!(hann(1.0).abs() < 1e-5);
        assert!((hann(0.5) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn pan_is_constant_power() {
        for pan in [-1.0, -0.5, 0.0, 0.5, 1.0] {
            let (l, r) = pan_gains(pan);
            let p = l * l + r * r;
            assert!((p - 1.0).abs() < 1e-4, "pan={} power={}", pan, p);
        }
        let (l, r) = pan_gains(-1.0);
        assert!(l > 0.99 && r.abs() < 1e-4);
    }

    #[test]
    fn rms_decreases_to_zero() {
        let mut rms = Rms::new(one_pole_coeff_ms(10.0, 48000.0));
        let mut v = 0.0;
        for _ in 0..10000 {
            v = rms.tick(0.0);
        }
        assert!(v < 1e-3);
    }
}
