//! Four-channel stereo mixer with mute/solo and a soft-clipped master bus.
//!
//! Channel gain runs 0..=2 (unity at 1), pan is constant-power over the
//! stereo frame, and solo wins over mute the usual way: if any channel is
//! soloed, only soloed channels pass. The master bus runs through `tanh`, so
//! the summed output is always inside ±1 no matter what the channels do.

use slicebox_core::dsp::{clamp, pan_gains, soft_clip};

use crate::params::MIXER_CHANNELS;

#[derive(Copy, Clone, Debug)]
struct Channel {
    volume: f32,
    pan: f32,
    mute: bool,
    solo: bool,
}

impl Default for Channel {
    fn default() -> Self {
        Self { volume: 1.0, pan: 0.0, mute: false, solo: false }
    }
}

pub struct Mixer {
    channels: [Channel; MIXER_CHANNELS],
    master: f32,
}

impl Mixer {
    pub fn new() -> Self {
        Self { channels: [Channel::default(); MIXER_CHANNELS], master: 1.0 }
    }

    pub fn set_volume(&mut self, ch: usize, volume: f32) {
        if let Some(c) = self.channels.get_mut(ch) {
            c.volume = clamp(volume, 0.0, 2.0);
        }
    }

    pub fn set_pan(&mut self, ch: usize, pan: f32) {
        if let Some(c) = self.channels.get_mut(ch) {
            c.pan = clamp(pan, -1.0, 1.0);
        }
    }

    pub fn set_mute(&mut self, ch: usize, mute: bool) {
        if let Some(c) = self.channels.get_mut(ch) {
            c.mute = mute;
        }
    }

    pub fn set_solo(&mut self, ch: usize, solo: bool) {
        if let Some(c) = self.channels.get_mut(ch) {
            c.solo = solo;
        }
    }

    pub fn set_master(&mut self, volume: f32) {
        self.master = clamp(volume, 0.0, 2.0);
    }

    /// Mix one frame per channel down to the stereo bus.
    #[inline]
    pub fn process(&self, inputs: &[(f32, f32); MIXER_CHANNELS]) -> (f32, f32) {
        let any_solo = self.channels.iter().any(|c| c.solo);

        let mut bus_l = 0.0;
        let mut bus_r = 0.0;
        for (c, &(l, r)) in self.channels.iter().zip(inputs.iter()) {
            let audible = if any_solo { c.solo } else { !c.mute };
            if !audible {
                continue;
            }
            let (gl, gr) = pan_gains(c.pan);
            bus_l += l * c.volume * gl;
            bus_r += r * c.volume * gr;
        }

        (soft_clip(bus_l * self.master), soft_clip(bus_r * self.master))
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

// --------------------------------- Tests (std only) ------------------------------
