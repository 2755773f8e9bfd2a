//! Slicebox Engine — live sampler, slice player and chaos-modulated effects.
//!
//! Crate layout:
//! - [`engine`]    : [`SliceEngine`] wiring and block processing
//! - [`params`]    : lock-free control surface shared with the audio thread
//! - [`recorder`]  : stereo capture buffer + onset slicing
//! - [`player`]    : polyphonic slice playback
//! - [`grain`]     : granular processor over recent input
//! - [`modulation`]: Lorenz chaos source with smooth/stepped shapes
//! - [`eq`], [`delay`], [`reverb`] : the effects chain
//! - [`sequencer`] : 16-step gate/scan sequencer with quantized tempo
//! - [`mixer`]     : 4-channel stereo mix bus
//!
//! The audio thread never allocates, never locks and never errors; the control
//! side talks to it exclusively through atomic parameter cells.

pub mod delay;
pub mod engine;
pub mod eq;
pub mod error;
pub mod grain;
pub mod mixer;
pub mod modulation;
pub mod params;
pub mod player;
pub mod recorder;
pub mod reverb;
pub mod sequencer;

// Re-export some commonly used items to make downstream imports ergonomic.
pub use engine::{EngineConfig, SliceEngine};
pub use error::ConfigError;
pub use params::{EngineHandle, StatusSnapshot};
pub use recorder::{Slice, ONSET_THRESHOLD};
