//! Plate-ish reverb: four damped combs in parallel into two allpasses, with a
//! gentle high-pass on the tail to keep low end from piling up.
//!
//! Comb lengths are co-prime-ish sample counts tuned at 48 kHz and scaled to
//! the running rate; the right channel runs slightly longer lines for stereo
//! decorrelation. Decay maps to comb feedback (0.5..=0.985), so even maximum
//! decay is a long tail, not an oscillator.
//!
//! Chaos perturbs room size, which scales the *input* level into the comb
//! bank through a smoother — audible as the tail breathing, never as zipper
//! noise.

use slicebox_core::dsp::clamp;
use slicebox_core::filters::OnePole;
use slicebox_core::smooth::ParamSmoother;

const COMB_TUNING: [usize; 4] = [1422, 1491, 1557, 1617];
const ALLPASS_TUNING: [usize; 2] = [225, 556];
const STEREO_SPREAD: usize = 23;
const ALLPASS_GAIN: f32 = 0.5;
const CHAOS_ROOM_DEPTH: f32 = 0.3;
const ROOM_LAMBDA: f32 = 0.002;

struct Comb {
    buf: Vec<f32>,
    idx: usize,
    lp: OnePole,
}

impl Comb {
    fn new(len: usize) -> Self {
        Self { buf: vec![0.0; len.max(1)], idx: 0, lp: OnePole::new(0.5) }
    }

    #[inline]
    fn process(&mut self, x: f32, feedback: f32, damping: f32) -> f32 {
        let out = self.buf[self.idx];
        self.lp.set_coeff(damping);
        let fed = self.lp.process(out);
        self.buf[self.idx] = x + fed * feedback;
        self.idx = (self.idx + 1) % self.buf.len();
        out
    }
}

struct Allpass {
    buf: Vec<f32>,
    idx: usize,
}

impl Allpass {
    fn new(len: usize) -> Self {
        Self { buf: vec![0.0; len.max(1)], idx: 0 }
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        let delayed = self.buf[self.idx];
        let out = delayed - x;
        self.buf[self.idx] = x + delayed * ALLPASS_GAIN;
        self.idx = (self.idx + 1) % self.buf.len();
        out
    }
}

struct ReverbChannel {
    combs: [Comb; 4],
    allpasses: [Allpass; 2],
    hp: OnePole,
    hp_coeff: f32,
}

impl ReverbChannel {
    fn new(sample_rate: f32, spread: usize) -> Self {
        let scale = sample_rate / 48000.0;
        let combs = COMB_TUNING
            .map(|len| Comb::new(((len + spread) as f32 * scale) as usize));
        let allpasses = ALLPASS_TUNING
            .map(|len| Allpass::new(((len + spread) as f32 * scale) as usize));
        // ~100 Hz one-pole on the tail.
        let hp_coeff = clamp(100.0 / (sample_rate * 0.5), 0.001, 0.1);
        Self { combs, allpasses, hp: OnePole::new(hp_coeff), hp_coeff }
    }

    #[inline]
    fn process(&mut self, x: f32, feedback: f32, damping: f32) -> f32 {
        let mut acc = 0.0;
        for comb in &mut self.combs {
            acc += comb.process(x, feedback, damping);
        }
        acc *= 0.25;
        for ap in &mut self.allpasses {
            acc = ap.process(acc);
        }
        self.hp.set_coeff(self.hp_coeff);
        acc - self.hp.process(acc)
    }
}

pub struct StereoReverb {
    left: ReverbChannel,
    right: ReverbChannel,
    room: f32,
    damping: f32,
    decay: f32,
    room_smooth: ParamSmoother,
}

impl StereoReverb {
    pub fn new(sample_rate: f32) -> Self {
        let mut room_smooth = ParamSmoother::new(ROOM_LAMBDA);
        room_smooth.reset(0.5);
        Self {
            left: ReverbChannel::new(sample_rate, 0),
            right: ReverbChannel::new(sample_rate, STEREO_SPREAD),
            room: 0.5,
            damping: 0.5,
            decay: 0.5,
            room_smooth,
        }
    }

    pub fn set_room(&mut self, room: f32) {
        self.room = clamp(room, 0.0, 1.0);
    }

    pub fn set_damping(&mut self, damping: f32) {
        self.damping = clamp(damping, 0.0, 1.0);
    }

    pub fn set_decay(&mut self, decay: f32) {
        self.decay = clamp(decay, 0.0, 1.0);
    }

    /// One stereo frame in, wet reverb frame out.
    #[inline]
    pub fn process(&mut self, l: f32, r: f32, chaos_active: bool, chaos: f32) -> (f32, f32) {
        let room_target = if chaos_active {
            clamp(self.room + chaos * CHAOS_ROOM_DEPTH, 0.0, 1.0)
        } else {
            self.room
        };
        let room = self.room_smooth.process(room_target);

        // Input scaling: bigger room pushes more energy into the lines.
        let input_gain = 0.3 + room * 1.4;
        let feedback = 0.5 + self.decay * 0.485;
        // Damping control inverts into the smoothing coefficient: high
        // damping keeps less treble circulating.
        let damp_coeff = clamp(1.0 - (0.05 + self.damping * 0.9), 0.05, 0.95);

        let wet_l = self.left.process(l * input_gain, feedback, damp_coeff);
        let wet_r = self.right.process(r * input_gain, feedback, damp_coeff);
        (wet_l, wet_r)
    }
}

// --------------------------------- Tests (std only) ------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    fn tail_energy(rv: &mut StereoReverb, window: std::ops::Range<usize>) -> f32 {
        let mut acc = 0.0;
        for i in 0..window.end {
            let x = if i < 480 { 0.5 } else { 0.0 };
            let (wl, wr) = rv.process(x, x, false, 0.0);
            if i >= window.start {
                acc += wl * wl + wr * wr;
            }
        }
        acc
    }

    #[test]
    fn burst_leaves_a_tail() {
        let mut rv = StereoReverb::new(SR);
        // Energy well after the burst ended.
        let e = tail_energy(&mut rv, 24000..48000);
        assert!(e > 1e-4, "tail energy {}", e);
    }

    #[test]
    fn tail_decays_to_silence() {
        let mut rv = StereoReverb::new(SR);
        rv.set_decay(0.5);
        let late = tail_energy(&mut rv, 430000..480000);
        assert!(late < 1e-6, "late energy {}", late);
    }

    #[test]
    fn more_decay_means_longer_tail() {
        let mut short = StereoReverb::new(SR);
        short.set_decay(0.0);
        let e_short = tail_energy(&mut short, 48000..96000);

        let mut long = StereoReverb::new(SR);
        long.set_decay(1.0);
        let e_long = tail_energy(&mut long, 48000..96000);

        assert!(e_long > e_short * 2.0, "short={} long={}", e_short, e_long);
    }

    #[test]
    fn output_is_decorrelated_across_channels() {
        let mut rv = StereoReverb::new(SR);
        let mut same = true;
        for i in 0..24000 {
            let x = if i < 480 { 0.5 } else { 0.0 };
            let (wl, wr) = rv.process(x, x, false, 0.0);
            if (wl - wr).abs() > 1e-6 {
                same = false;
            }
        }
        assert!(!same, "left and right tails are identical");
    }

    #[test]
    fn stays_finite_under_chaos_and_max_settings() {
        let mut rv = StereoReverb::new(SR);
        rv.set_room(1.0);
        rv.set_decay(1.0);
        rv.set_damping(0.0);
        for i in 0..96000 {
            let x = if i % 100 == 0 { 0.9 } else { 0.0 };
            let (wl, wr) = rv.process(x, x, true, 1.0);
            assert!(wl.is_finite() && wr.is_finite());
            assert!(wl.abs() < 100.0 && wr.abs() < 100.0);
        }
    }
}
