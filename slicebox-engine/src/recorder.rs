//! Stereo capture buffer with onset-based slicing.
//!
//! The recorder owns a fixed stereo buffer, pre-allocated at construction.
//! While armed it appends incoming frames until either disarmed or full; on
//! stop it rescans the captured audio for onsets and publishes a slice table.
//!
//! Slicing model:
//! - The detection envelope is the raw rectified stereo peak per frame,
//!   `max(|l|, |r|)` — no smoothing, so rescanning is a pure function of the
//!   buffer and therefore idempotent.
//! - A slice starts at each upward crossing of [`ONSET_THRESHOLD`] and runs to
//!   the frame before the next onset (or the end of the recording).
//! - Slices shorter than the minimum length are merged into the following
//!   slice; a short tail is merged into the previous one. A recording whose
//!   total sliceable span is below the minimum yields zero slices.

use slicebox_core::dsp::{clamp, frame_peak, lerp};

/// Upward-crossing level that starts a new slice.
pub const ONSET_THRESHOLD: f32 = 0.05;

/// Slice table capacity; detection stops once it is full so the rescan never
/// reallocates.
const MAX_SLICES: usize = 1024;

/// One detected slice, inclusive frame range into the record buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Slice {
    pub start: usize,
    pub end: usize,
}

impl Slice {
    /// Frame count; published slices always satisfy `end >= start`.
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }
}

pub struct Recorder {
    left: Vec<f32>,
    right: Vec<f32>,
    len: usize,
    sample_rate: f32,
    recording: bool,
    full: bool,
    slices: Vec<Slice>,
}

impl Recorder {
    pub fn new(sample_rate: f32, max_secs: f32) -> Self {
        let capacity = (sample_rate * max_secs) as usize;
        Self {
            left: vec![0.0; capacity],
            right: vec![0.0; capacity],
            len: 0,
            sample_rate,
            recording: false,
            full: false,
            slices: Vec::with_capacity(MAX_SLICES),
        }
    }

    /// Arm the recorder. Discards the previous take and its slices.
    pub fn start(&mut self) {
        self.len = 0;
        self.full = false;
        self.slices.clear();
        self.recording = true;
    }

    /// Drop the take entirely: empty buffer, no slices, flags reset. Unlike
    /// [`Recorder::start`] this leaves the recorder disarmed.
    pub fn clear(&mut self) {
        self.len = 0;
        self.full = false;
        self.recording = false;
        self.slices.clear();
    }

    /// Disarm and rescan the captured audio.
    pub fn stop(&mut self, min_slice_secs: f32) {
        self.recording = false;
        self.rescan(min_slice_secs);
    }

    /// Append one frame. No-op when disarmed; sets the `full` flag (and keeps
    /// the take) when capacity is reached.
    #[inline]
    pub fn write(&mut self, l: f32, r: f32) {
        if !self.recording {
            return;
        }
        if self.len >= self.left.len() {
            self.full = true;
            return;
        }
        self.left[self.len] = l;
        self.right[self.len] = r;
        self.len += 1;
    }

    /// Recompute the slice table from the buffer contents. Pure in the buffer
    /// and `min_slice_secs`; calling it twice in a row changes nothing.
    pub fn rescan(&mut self, min_slice_secs: f32) {
        self.slices.clear();
        if self.len == 0 {
            return;
        }
        let min_samples = ((min_slice_secs * self.sample_rate) as usize).max(2);

        let mut below = true;
        let mut open: Option<usize> = None;
        for i in 0..self.len {
            let amp = frame_peak(self.left[i], self.right[i]);
            let onset = below && amp >= ONSET_THRESHOLD;
            below = amp < ONSET_THRESHOLD;
            if !onset {
                continue;
            }
            match open {
                None => open = Some(i),
                Some(start) => {
                    let end = i - 1;
                    if end + 1 - start >= min_samples && self.slices.len() < MAX_SLICES {
                        self.slices.push(Slice { start, end });
                        open = Some(i);
                    } else {
                        // Too short: fold this segment into the one that the
                        // new onset begins.
                        open = Some(start);
                    }
                }
            }
        }

        if let Some(start) = open {
            let end = self.len - 1;
            if end + 1 - start >= min_samples && self.slices.len() < MAX_SLICES {
                self.slices.push(Slice { start, end });
            } else if let Some(last) = self.slices.last_mut() {
                // Short tail joins the previous slice.
                last.end = end;
            }
        }
    }

    /// Linear-interpolated stereo read at a fractional frame position.
    /// Positions outside the take clamp to its edges; an empty take is silent.
    #[inline]
    pub fn read_lin(&self, pos: f32) -> (f32, f32) {
        if self.len == 0 {
            return (0.0, 0.0);
        }
        let max = (self.len - 1) as f32;
        let p = clamp(pos, 0.0, max);
        let i0 = p as usize;
        let i1 = (i0 + 1).min(self.len - 1);
        let t = p - i0 as f32;
        (
            lerp(self.left[i0], self.left[i1], t),
            lerp(self.right[i0], self.right[i1], t),
        )
    }

    #[inline]
    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    #[inline]
    pub fn slice_count(&self) -> usize {
        self.slices.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.full
    }
}

// --------------------------------- Tests (std only) ------------------------------
