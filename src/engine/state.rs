use crate::shared::{
    EngineSnapshot, FilterMode, ParamPage, QuantizeGrain, PITCH_REF_HZ, REFERENCE_BPM,
};

/// What the control side remembers about the loaded sample. The frames
/// themselves live with the render engine (and in the middle layer's Arc
/// for export); geometry questions only need these two numbers.
#[derive(Clone, Copy, Debug)]
pub struct LoadedSample {
    pub frames: usize,
    pub sample_rate: u32,
}

impl LoadedSample {
    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FilterParams {
    pub cutoff: f32,
    pub resonance: f32,
    pub mode: FilterMode,
}

impl Default for FilterParams {
    fn default() -> Self {
        // highpass parked at 20Hz = fully open
        Self {
            cutoff: 20.0,
            resonance: 0.1,
            mode: FilterMode::Highpass,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DelayParams {
    pub time_secs: f32,
    pub feedback: f32,
}

impl Default for DelayParams {
    fn default() -> Self {
        Self {
            time_secs: 0.3,
            feedback: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PitchParams {
    pub semitones: f64,
    pub fine_hz: f64,
}

impl PitchParams {
    /// The output path has no independent detune, so semitones and the
    /// fine Hz offset collapse into a single rate multiplier. Hz converts
    /// to cents against the reference frequency first.
    pub fn rate_multiplier(&self) -> f64 {
        let fine_cents = 1200.0 * ((PITCH_REF_HZ + self.fine_hz) / PITCH_REF_HZ).log2();
        let cents = self.semitones * 100.0 + fine_cents;
        (cents / 1200.0).exp2()
    }
}

/// The single source of truth on the control thread. Mutated only through
/// middle-layer operations; the UI sees owned `EngineSnapshot` clones.
#[derive(Clone, Debug)]
pub struct EngineState {
    pub loaded: Option<LoadedSample>,
    pub envelope: Option<Vec<f32>>,

    pub playing: bool,
    pub auto_mode: bool,
    pub sequence_mode: bool,

    pub active_slice: Option<usize>,
    /// control-clock time at which the active-slice feedback expires;
    /// tracks audible duration, not nominal slice duration
    pub active_clear_at: Option<f64>,

    pub bpm: f64,
    pub time_multiplier: f64,
    pub chaos: f64,
    pub quantize: QuantizeGrain,

    pub filter: FilterParams,
    pub crush_mix: f32,
    pub delay: DelayParams,
    pub master_gain: f32,
    pub pitch: PitchParams,

    pub reverse_held: bool,
    pub stutter_held: bool,

    pub sequence_text: String,
    pub sequence_position: usize,
    pub sequence_length: usize,

    // export range scratch, driven from the Trim page
    pub trim_start_secs: f64,
    pub trim_end_secs: f64,

    pub param_page: ParamPage,
    pub error: Option<String>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            loaded: None,
            envelope: None,
            playing: false,
            auto_mode: false,
            sequence_mode: false,
            active_slice: None,
            active_clear_at: None,
            bpm: 140.0,
            time_multiplier: 1.0,
            chaos: 0.0,
            quantize: QuantizeGrain::Sixteenth,
            filter: FilterParams::default(),
            crush_mix: 0.0,
            delay: DelayParams::default(),
            master_gain: 1.0,
            pitch: PitchParams::default(),
            reverse_held: false,
            stutter_held: false,
            sequence_text: String::new(),
            sequence_position: 0,
            sequence_length: 0,
            trim_start_secs: 0.0,
            trim_end_secs: 0.0,
            param_page: ParamPage::Tempo,
            error: None,
        }
    }
}

impl EngineState {
    /// One quantize step of the virtual beat clock, in seconds.
    pub fn beat_duration(&self) -> f64 {
        let effective_bpm = self.bpm * self.time_multiplier;
        let sixteenth = 60.0 / effective_bpm / 4.0;
        match self.quantize {
            QuantizeGrain::Sixteenth => sixteenth,
            QuantizeGrain::Eighth => sixteenth * 2.0,
        }
    }

    /// Source frames consumed per output frame: tempo scaling times the
    /// combined pitch multiplier.
    pub fn playback_rate(&self) -> f64 {
        let tempo = self.bpm * self.time_multiplier / REFERENCE_BPM;
        tempo * self.pitch.rate_multiplier()
    }

    /// Failures replace each other; there is exactly one current error.
    pub fn set_error(&mut self, msg: impl Into<String>) {
        self.error = Some(msg.into());
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let (knob_a_label, knob_b_label) = self.param_page.knob_labels();
        let (knob_a_value, knob_b_value) = match self.param_page {
            ParamPage::Tempo => (self.bpm, self.chaos),
            ParamPage::Filter => (self.filter.cutoff as f64, self.filter.resonance as f64),
            ParamPage::Crush => (self.crush_mix as f64, self.master_gain as f64),
            ParamPage::Delay => (self.delay.time_secs as f64, self.delay.feedback as f64),
            ParamPage::Pitch => (self.pitch.semitones, self.pitch.fine_hz),
            ParamPage::Trim => (self.trim_start_secs, self.trim_end_secs),
        };
        EngineSnapshot {
            is_loaded: self.loaded.is_some(),
            playing: self.playing,
            auto_mode: self.auto_mode,
            sequence_mode: self.sequence_mode,
            active_slice: self.active_slice,
            sequence_text: self.sequence_text.clone(),
            sequence_position: self.sequence_position,
            sequence_length: self.sequence_length,
            bpm: self.bpm,
            time_multiplier: self.time_multiplier,
            chaos: self.chaos,
            quantize: self.quantize,
            reverse_held: self.reverse_held,
            stutter_held: self.stutter_held,
            param_page: self.param_page,
            knob_a_label,
            knob_b_label,
            knob_a_value,
            knob_b_value,
            envelope: self.envelope.clone(),
            error: self.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beat_duration_tracks_tempo_and_grain() {
        let mut s = EngineState::default();
        s.bpm = 140.0;
        // 60 / 140 / 4
        assert!((s.beat_duration() - 0.10714).abs() < 1e-4);
        s.quantize = QuantizeGrain::Eighth;
        assert!((s.beat_duration() - 0.21428).abs() < 1e-4);
        s.quantize = QuantizeGrain::Sixteenth;
        s.time_multiplier = 2.0;
        assert!((s.beat_duration() - 0.05357).abs() < 1e-4);
    }

    #[test]
    fn playback_rate_is_unity_at_reference_tempo() {
        let s = EngineState::default();
        assert!((s.playback_rate() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn twelve_semitones_doubles_the_rate() {
        let mut s = EngineState::default();
        s.pitch.semitones = 12.0;
        assert!((s.playback_rate() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn fine_hz_matches_the_cents_formula() {
        let p = PitchParams {
            semitones: 0.0,
            fine_hz: 440.0, // one octave above the reference
        };
        assert!((p.rate_multiplier() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn errors_replace_rather_than_accumulate() {
        let mut s = EngineState::default();
        s.set_error("first");
        s.set_error("second");
        assert_eq!(s.error.as_deref(), Some("second"));
    }
}
