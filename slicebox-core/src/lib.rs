#![cfg_attr(not(feature = "std"), no_std)]
//! Slicebox Core — no_std-ready DSP primitives for the Slicebox live-sampling engine.
//!
//! Features
//! - `std`      : (default) use the Rust standard library
//! - `no-std`   : build with `#![no_std]` and use the `libm` math backend
//! - `fast-math`: enable approximations (polys/rationals) for tanh/trig, etc.
//!
//! Modules
//! - [`dsp`]     : math backend, utils (db/lin, windows, panning, meters)
//! - [`filters`] : one-pole LP, RBJ biquad shelves/peak
//! - [`chaos`]   : Lorenz attractor modulation source with divergence guard
//! - [`smooth`]  : one-pole parameter smoothing with clamped λ
//!
//! Design
//! - No heap allocations; pure sample-by-sample primitives
//! - Bounded outputs everywhere a caller could feed them to a DAC
//! - Friendly to embedded / real-time targets

pub mod chaos;
pub mod dsp;
pub mod filters;
pub mod smooth;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::chaos::ChaosGenerator;
    pub use crate::dsp::{
        clamp, db_to_lin, frame_peak, hann, kill_denormals, lerp, lin_to_db, one_pole_coeff_hz,
        one_pole_coeff_ms, pan_gains, soft_clip, TAU,
    };
    pub use crate::filters::{Biquad, BiquadCoeffs, OnePole};
    pub use crate::smooth::ParamSmoother;
}

#[cfg(test)]
mod smoke {

    #[test]
    fn prelude_exists() {
        use crate::prelude::*;
        let _ = db_to_lin(-6.0);
        let mut gen = ChaosGenerator::new();
        let _ = gen.process(1.0);
        let mut s = ParamSmoother::new(0.01);
        let _ = s.process(0.5);
        let mut bq = Biquad::new(BiquadCoeffs::peaking(2500.0, 48000.0, -6.0, 0.707));
        let _ = bq.process(0.1);
    }
}
