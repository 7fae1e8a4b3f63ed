use std::sync::Arc;

pub use crate::audio::SampleSet;
use crate::shared::FilterMode;

/// One quantized slice trigger, committed for a future output frame.
#[derive(Clone, Debug)]
pub struct TriggerParams {
    pub slice: usize,
    pub reverse: bool,
    pub stutter: bool,
    /// combined tempo * pitch playback rate, source frames per output frame
    pub rate: f64,
    /// absolute output frame the voice must start on
    pub at_frame: u64,
}

// The render engine can't decode files (that would stall the callback), so
// the control side prepares a full SampleSet and swaps it in whole with
// SetSample. Everything time-critical carries an `at_frame`; the engine
// never acts on those early, which is what makes the coarse control tick
// sample-accurate.
#[derive(Clone, Debug)]
pub enum AudioCommand {
    /// Replace the loaded sample (forward + mirror together, atomically).
    SetSample(Arc<SampleSet>),

    /// Start a slice voice at a future frame, crossfading out whatever
    /// voice is current at that moment.
    Trigger(TriggerParams),

    /// Fade the current voice to silence starting at a future frame.
    /// `at_frame: 0` means "as soon as the callback sees it".
    Release { at_frame: u64 },

    // live mix-bus parameters; these apply to audio already in flight
    SetFilter { cutoff: f32, resonance: f32, mode: FilterMode },
    SetCrushMix(f32),
    SetDelay { time_secs: f32, feedback: f32 },
    SetMasterGain(f32),
}
