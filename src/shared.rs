// The input plan:
//
// Grid pads (one per slice):
//   1 2 3 4       //  Trigger(0..=3)
//   q w e r       //  Trigger(4..=7)
//   a s d f       //  Trigger(8..=11)
//   z x c v       //  Trigger(12..=15)
//
// Modifier buttons (lowercase = down, uppercase = up, same trick as a
// release event for terminals without the keyboard enhancement):
//   g             //  ReverseDown / ReverseUp
//   h             //  StutterDown / StutterUp
//   Space         //  ToggleAuto
//
// Pages and switches:
//   t             //  NextParamPage (Tempo, Filter, Crush, Delay, Pitch, Trim)
//   u             //  ToggleQuantize (1/16 <-> 1/8)
//   i             //  CycleTimeMult (0.5 -> 1 -> 2)
//   m             //  ToggleFilterMode (highpass <-> lowpass)
//
// Knobs:
//   [ / ]         //  KnobTurnA(-0.05 / 0.05), meaning depends on param page
//   - / =         //  KnobTurnB(-0.05 / 0.05)
//
// Sequences and export:
//   /             //  enter sequence edit (type steps, Enter plays, Esc cancels)
//   Enter         //  stop a running sequence
//   j / J         //  ExportRange keep / remove (range set on the Trim page)
//   o             //  ExportSequence (renders the current sequence text)
//
// Quit:
//   Esc           //  Quit
//
// The rendering idea: the middle layer owns all engine state, the TUI calls
// `middle.snapshot()` every frame and just draws it. Input resolves to
// semantic events here, never raw keycodes.

/// How many equal slices the loaded sample is cut into.
pub const NUM_SLICES: usize = 16;
/// The tempo the source material is assumed to be at; playback rate is
/// effective bpm over this.
pub const REFERENCE_BPM: f64 = 140.0;
/// How far ahead of the output clock the scheduler commits triggers.
pub const LOOKAHEAD_SECS: f64 = 0.05;
/// Control-loop re-arm interval.
pub const SCHEDULE_INTERVAL_MS: u64 = 25;
/// Crossfade window for voice handoff.
pub const FADE_SECS: f64 = 0.005;
/// Resolution of the amplitude envelope computed at load for the display.
pub const ENVELOPE_BUCKETS: usize = 800;
/// Reference frequency for the fine-detune (Hz -> cents) conversion.
pub const PITCH_REF_HZ: f64 = 440.0;

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    // pads
    Trigger(u8), // slice index 0-15

    // transport
    ToggleAuto,
    PlaySequence(String),
    StopSequence,

    // held modifiers
    ReverseDown,
    ReverseUp,
    StutterDown,
    StutterUp,

    // pages and switches
    NextParamPage,
    ToggleQuantize,
    CycleTimeMult,
    ToggleFilterMode,

    // knobs
    KnobTurnA(f32),
    KnobTurnB(f32),

    // export
    ExportRange { keep: bool },
    ExportSequence,

    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuantizeGrain {
    Sixteenth,
    Eighth,
}

impl QuantizeGrain {
    pub fn toggled(self) -> Self {
        match self {
            QuantizeGrain::Sixteenth => QuantizeGrain::Eighth,
            QuantizeGrain::Eighth => QuantizeGrain::Sixteenth,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            QuantizeGrain::Sixteenth => "1/16",
            QuantizeGrain::Eighth => "1/8",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    Highpass,
    Lowpass,
}

impl FilterMode {
    pub fn toggled(self) -> Self {
        match self {
            FilterMode::Highpass => FilterMode::Lowpass,
            FilterMode::Lowpass => FilterMode::Highpass,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FilterMode::Highpass => "HP",
            FilterMode::Lowpass => "LP",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamPage {
    Tempo,
    Filter,
    Crush,
    Delay,
    Pitch,
    Trim,
}

impl ParamPage {
    pub fn next(self) -> Self {
        match self {
            ParamPage::Tempo => ParamPage::Filter,
            ParamPage::Filter => ParamPage::Crush,
            ParamPage::Crush => ParamPage::Delay,
            ParamPage::Delay => ParamPage::Pitch,
            ParamPage::Pitch => ParamPage::Trim,
            ParamPage::Trim => ParamPage::Tempo,
        }
    }

    pub fn knob_labels(self) -> (&'static str, &'static str) {
        match self {
            ParamPage::Tempo => ("BPM", "CHAOS"),
            ParamPage::Filter => ("CUTOFF", "RESO"),
            ParamPage::Crush => ("CRUSH", "GAIN"),
            ParamPage::Delay => ("TIME", "FEEDBK"),
            ParamPage::Pitch => ("SEMIS", "FINE"),
            ParamPage::Trim => ("START", "END"),
        }
    }
}

/// Read-only view of the engine published to the TUI once per frame.
#[derive(Clone, Debug)]
pub struct EngineSnapshot {
    pub is_loaded: bool,
    pub playing: bool,
    pub auto_mode: bool,
    pub sequence_mode: bool,
    pub active_slice: Option<usize>,
    pub sequence_text: String,
    pub sequence_position: usize,
    pub sequence_length: usize,
    pub bpm: f64,
    pub time_multiplier: f64,
    pub chaos: f64,
    pub quantize: QuantizeGrain,
    pub reverse_held: bool,
    pub stutter_held: bool,
    pub param_page: ParamPage,
    pub knob_a_label: &'static str,
    pub knob_b_label: &'static str,
    pub knob_a_value: f64,
    pub knob_b_value: f64,
    pub envelope: Option<Vec<f32>>,
    pub error: Option<String>,
}
