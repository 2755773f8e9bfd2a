//! Three-band corrective EQ (cut only).
//!
//! Low shelf at 80 Hz, peaking band at 2.5 kHz, high shelf at 12 kHz. Gains
//! are capped at 0 dB — this stage carves space, it never boosts. Coefficients
//! are recomputed only when a gain actually moves, so the steady state costs
//! three biquads per channel and nothing else.

use slicebox_core::dsp::clamp;
use slicebox_core::filters::{Biquad, BiquadCoeffs};

const LOW_SHELF_HZ: f32 = 80.0;
const PEAK_HZ: f32 = 2500.0;
const HIGH_SHELF_HZ: f32 = 12000.0;
const BAND_Q: f32 = 0.707;

pub const EQ_GAIN_MIN_DB: f32 = -20.0;
pub const EQ_GAIN_MAX_DB: f32 = 0.0;

pub struct ThreeBandEq {
    sample_rate: f32,
    low_db: f32,
    mid_db: f32,
    high_db: f32,
    low: [Biquad; 2],
    mid: [Biquad; 2],
    high: [Biquad; 2],
}

impl ThreeBandEq {
    pub fn new(sample_rate: f32) -> Self {
        let identity = Biquad::new(BiquadCoeffs::IDENTITY);
        Self {
            sample_rate,
            low_db: 0.0,
            mid_db: 0.0,
            high_db: 0.0,
            low: [identity; 2],
            mid: [identity; 2],
            high: [identity; 2],
        }
    }

    /// Update band gains (dB, clamped to the cut-only range). Cheap when
    /// nothing changed.
    pub fn set_gains(&mut self, low_db: f32, mid_db: f32, high_db: f32) {
        let low_db = clamp(low_db, EQ_GAIN_MIN_DB, EQ_GAIN_MAX_DB);
        let mid_db = clamp(mid_db, EQ_GAIN_MIN_DB, EQ_GAIN_MAX_DB);
        let high_db = clamp(high_db, EQ_GAIN_MIN_DB, EQ_GAIN_MAX_DB);

        if low_db != self.low_db {
            self.low_db = low_db;
            let c = BiquadCoeffs::low_shelf(LOW_SHELF_HZ, self.sample_rate, low_db, BAND_Q);
            for bq in &mut self.low {
                bq.set_coeffs(c);
            }
        }
        if mid_db != self.mid_db {
            self.mid_db = mid_db;
            let c = BiquadCoeffs::peaking(PEAK_HZ, self.sample_rate, mid_db, BAND_Q);
            for bq in &mut self.mid {
                bq.set_coeffs(c);
            }
        }
        if high_db != self.high_db {
            self.high_db = high_db;
            let c = BiquadCoeffs::high_shelf(HIGH_SHELF_HZ, self.sample_rate, high_db, BAND_Q);
            for bq in &mut self.high {
                bq.set_coeffs(c);
            }
        }
    }

    #[inline]
    pub fn process(&mut self, l: f32, r: f32) -> (f32, f32) {
        let l = self.high[0].process(self.mid[0].process(self.low[0].process(l)));
        let r = self.high[1].process(self.mid[1].process(self.low[1].process(r)));
        (l, r)
    }
}

// --------------------------------- Tests (std only) ------------------------------
