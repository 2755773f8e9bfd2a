//! Stereo delay with independent per-channel times.
//!
//! Up to two seconds per side. The read tap is smoothed, so the chaos
//! perturbation (±`chaos * 100` ms on the tap position) produces tape-style
//! pitch bends instead of clicks. Explicit time changes from the control
//! surface jump the smoother directly — a deliberate splice, not a glide.
//!
//! Feedback is capped below unity at the type level (the setter clamps), so
//! the loop always decays.

use slicebox_core::dsp::clamp;
use slicebox_core::smooth::ParamSmoother;

pub const MAX_DELAY_SECS: f32 = 2.0;
const MIN_DELAY_SECS: f32 = 0.001;
const FEEDBACK_MAX: f32 = 0.8;
const CHAOS_TIME_DEPTH: f32 = 0.1;
const TAP_LAMBDA: f32 = 0.002;

struct DelayLine {
    buf: Vec<f32>,
    write: usize,
}

impl DelayLine {
    fn new(frames: usize) -> Self {
        Self { buf: vec![0.0; frames], write: 0 }
    }

    /// Read `delay` samples behind the write head (fractional, clamped).
    #[inline]
    fn read(&self, delay: f32) -> f32 {
        let n = self.buf.len();
        let d = clamp(delay, 1.0, (n - 1) as f32);
        let pos = self.write as f32 - d;
        let pos = if pos < 0.0 { pos + n as f32 } else { pos };
        let i0 = pos as usize % n;
        let i1 = (i0 + 1) % n;
        let t = pos - (pos as usize) as f32;
        self.buf[i0] + (self.buf[i1] - self.buf[i0]) * t
    }

    #[inline]
    fn push(&mut self, x: f32) {
        self.buf[self.write] = x;
        self.write = (self.write + 1) % self.buf.len();
    }
}

pub struct StereoDelay {
    left: DelayLine,
    right: DelayLine,
    sample_rate: f32,
    time_l: f32,
    time_r: f32,
    feedback: f32,
    tap_l: ParamSmoother,
    tap_r: ParamSmoother,
}

impl StereoDelay {
    pub fn new(sample_rate: f32) -> Self {
        let frames = (sample_rate * MAX_DELAY_SECS) as usize + 2;
        let mut tap_l = ParamSmoother::new(TAP_LAMBDA);
        let mut tap_r = ParamSmoother::new(TAP_LAMBDA);
        let default = 0.25 * sample_rate;
        tap_l.reset(default);
        tap_r.reset(default * 1.5);
        Self {
            left: DelayLine::new(frames),
            right: DelayLine::new(frames),
            sample_rate,
            time_l: 0.25,
            time_r: 0.375,
            feedback: 0.3,
            tap_l,
            tap_r,
        }
    }

    pub fn set_time_l(&mut self, secs: f32) {
        let secs = clamp(secs, MIN_DELAY_SECS, MAX_DELAY_SECS);
        if secs != self.time_l {
            self.time_l = secs;
            self.tap_l.reset(secs * self.sample_rate);
        }
    }

    pub fn set_time_r(&mut self, secs: f32) {
        let secs = clamp(secs, MIN_DELAY_SECS, MAX_DELAY_SECS);
        if secs != self.time_r {
            self.time_r = secs;
            self.tap_r.reset(secs * self.sample_rate);
        }
    }

    pub fn set_feedback(&mut self, fb: f32) {
        self.feedback = clamp(fb, 0.0, FEEDBACK_MAX);
    }

    /// One stereo frame in, wet delay frame out.
    #[inline]
    pub fn process(&mut self, l: f32, r: f32, chaos_active: bool, chaos: f32) -> (f32, f32) {
        let bend = if chaos_active { chaos * CHAOS_TIME_DEPTH } else { 0.0 };
        let max = MAX_DELAY_SECS * self.sample_rate;

        let target_l = clamp((self.time_l + bend) * self.sample_rate, 1.0, max);
        let target_r = clamp((self.time_r + bend) * self.sample_rate, 1.0, max);
        let tap_l = self.tap_l.process(target_l);
        let tap_r = self.tap_r.process(target_r);

        let wet_l = self.left.read(tap_l);
        let wet_r = self.right.read(tap_r);
        self.left.push(l + wet_l * self.feedback);
        self.right.push(r + wet_r * self.feedback);
        (wet_l, wet_r)
    }
}

// --------------------------------- Tests (std only) ------------------------------
