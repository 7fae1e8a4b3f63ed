use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::audio::{DecodeError, OutputClock, SampleSet};
use crate::audio_api::AudioCommand;
use crate::engine::scheduler::Scheduler;
use crate::engine::sequence::SequenceProgram;
use crate::engine::state::{EngineState, LoadedSample};
use crate::export::{self, ExportError, RangeMode};
use crate::shared::{EngineSnapshot, InputEvent, ParamPage};

/// The control layer: owns all engine state and the scheduler, turns
/// semantic input events into state mutations and schedule-ahead
/// commands. The TUI above it only reads snapshots; the render engine
/// below it only receives commands.
pub struct Middle {
    pub state: EngineState,
    scheduler: Scheduler,
    rng: StdRng,
    clock: OutputClock,
    sample: Option<Arc<SampleSet>>,
}

impl Middle {
    pub fn new(clock: OutputClock) -> Self {
        Self {
            state: EngineState::default(),
            scheduler: Scheduler::new(clock.sample_rate()),
            rng: StdRng::from_entropy(),
            clock,
            sample: None,
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.state.snapshot()
    }

    /// Decode raw audio bytes and stage the swap. On failure the previous
    /// sample (if any) stays active and only the error field changes.
    pub fn load_sample_bytes(&mut self, bytes: &[u8]) -> Result<AudioCommand, DecodeError> {
        match SampleSet::decode(bytes, self.clock.sample_rate()) {
            Ok(set) => {
                let set = Arc::new(set);
                self.state.loaded = Some(LoadedSample {
                    frames: set.frame_count(),
                    sample_rate: set.sample_rate,
                });
                self.state.envelope = Some(set.envelope.clone());
                self.state.trim_start_secs = 0.0;
                self.state.trim_end_secs = set.duration_secs();
                self.state.error = None;
                self.sample = Some(set.clone());
                log::info!(
                    "loaded sample: {} frames @ {}Hz",
                    set.frame_count(),
                    set.sample_rate
                );
                Ok(AudioCommand::SetSample(set))
            }
            Err(e) => {
                self.state.set_error(e.to_string());
                Err(e)
            }
        }
    }

    pub fn load_sample_path(&mut self, path: &Path) -> anyhow::Result<AudioCommand> {
        let bytes = std::fs::read(path)?;
        Ok(self.load_sample_bytes(&bytes)?)
    }

    /// Advance the scheduler against the output clock. Called every
    /// control-loop pass; cheap when there is nothing to do.
    pub fn tick(&mut self) -> Vec<AudioCommand> {
        let mut cmds = Vec::new();
        let now = self.clock.now_secs();
        self.scheduler
            .tick(now, &mut self.state, &mut self.rng, &mut cmds);
        cmds
    }

    pub fn handle_input(&mut self, event: InputEvent) -> Vec<AudioCommand> {
        let mut cmds = Vec::new();
        match event {
            InputEvent::Trigger(slice) => self.trigger(slice as usize),
            InputEvent::ToggleAuto => self.toggle_auto(&mut cmds),
            InputEvent::PlaySequence(text) => self.play_sequence(&text, &mut cmds),
            InputEvent::StopSequence => {
                if self.state.sequence_mode {
                    self.scheduler.stop(&mut self.state, &mut cmds);
                }
            }

            InputEvent::ReverseDown => self.state.reverse_held = true,
            InputEvent::ReverseUp => self.state.reverse_held = false,
            InputEvent::StutterDown => self.state.stutter_held = true,
            InputEvent::StutterUp => self.state.stutter_held = false,

            InputEvent::NextParamPage => {
                self.state.param_page = self.state.param_page.next();
            }
            InputEvent::ToggleQuantize => {
                self.state.quantize = self.state.quantize.toggled();
            }
            InputEvent::CycleTimeMult => {
                self.state.time_multiplier = match self.state.time_multiplier {
                    m if m < 0.75 => 1.0,
                    m if m < 1.5 => 2.0,
                    _ => 0.5,
                };
            }
            InputEvent::ToggleFilterMode => {
                self.state.filter.mode = self.state.filter.mode.toggled();
                cmds.push(self.filter_cmd());
            }

            InputEvent::KnobTurnA(d) => self.knob_a(d as f64, &mut cmds),
            InputEvent::KnobTurnB(d) => self.knob_b(d as f64, &mut cmds),

            InputEvent::ExportRange { keep } => self.export_range(keep),
            InputEvent::ExportSequence => self.export_sequence(),

            InputEvent::Quit => {}
        }
        cmds
    }

    /// Manual pad hit: queue for the next quantize boundary, light the
    /// pad right away, spin the scheduler up if it was idle.
    fn trigger(&mut self, slice: usize) {
        if self.state.loaded.is_none() {
            return;
        }
        self.scheduler.queue_manual(slice);
        // immediate visual feedback, audio follows on the beat
        self.state.active_slice = Some(slice % crate::shared::NUM_SLICES);
        if !self.scheduler.is_running() {
            self.scheduler.start(self.clock.now_secs(), &mut self.state);
        }
    }

    fn toggle_auto(&mut self, cmds: &mut Vec<AudioCommand>) {
        if self.state.auto_mode {
            self.scheduler.stop(&mut self.state, cmds);
        } else {
            self.state.auto_mode = true;
            self.state.sequence_mode = false;
            if !self.scheduler.is_running() {
                self.scheduler.start(self.clock.now_secs(), &mut self.state);
            }
        }
    }

    fn play_sequence(&mut self, text: &str, cmds: &mut Vec<AudioCommand>) {
        // an in-progress sequence is fully stopped before the program is
        // swapped, so cursor and program can never disagree
        if self.state.sequence_mode {
            self.scheduler.stop(&mut self.state, cmds);
        }
        let program = SequenceProgram::compile(text);
        self.state.sequence_text = text.to_string();
        if program.is_empty() {
            return;
        }
        self.scheduler.set_program(program, &mut self.state);
        self.state.sequence_mode = true;
        self.state.auto_mode = false;
        if !self.scheduler.is_running() {
            self.scheduler.start(self.clock.now_secs(), &mut self.state);
        }
    }

    // -- knobs --

    fn knob_a(&mut self, d: f64, cmds: &mut Vec<AudioCommand>) {
        match self.state.param_page {
            ParamPage::Tempo => {
                self.state.bpm = (self.state.bpm + d * 20.0).clamp(80.0, 200.0);
            }
            ParamPage::Filter => {
                let f = &mut self.state.filter;
                f.cutoff = (f.cutoff * (d * 4.0).exp2() as f32).clamp(20.0, 20000.0);
                cmds.push(self.filter_cmd());
            }
            ParamPage::Crush => {
                self.state.crush_mix = (self.state.crush_mix + d as f32).clamp(0.0, 1.0);
                cmds.push(AudioCommand::SetCrushMix(self.state.crush_mix));
            }
            ParamPage::Delay => {
                let dl = &mut self.state.delay;
                dl.time_secs = (dl.time_secs + d as f32 * 0.5).clamp(0.05, 1.0);
                cmds.push(AudioCommand::SetDelay {
                    time_secs: dl.time_secs,
                    feedback: dl.feedback,
                });
            }
            ParamPage::Pitch => {
                self.state.pitch.semitones = (self.state.pitch.semitones + d * 20.0)
                    .round()
                    .clamp(-24.0, 24.0);
            }
            ParamPage::Trim => {
                let dur = self.loaded_duration();
                self.state.trim_start_secs =
                    (self.state.trim_start_secs + d * 4.0).clamp(0.0, dur);
            }
        }
    }

    fn knob_b(&mut self, d: f64, cmds: &mut Vec<AudioCommand>) {
        match self.state.param_page {
            ParamPage::Tempo => {
                self.state.chaos = (self.state.chaos + d).clamp(0.0, 1.0);
            }
            ParamPage::Filter => {
                let f = &mut self.state.filter;
                f.resonance = (f.resonance + d as f32).clamp(0.0, 0.95);
                cmds.push(self.filter_cmd());
            }
            ParamPage::Crush => {
                self.state.master_gain = (self.state.master_gain + d as f32).clamp(0.0, 2.0);
                cmds.push(AudioCommand::SetMasterGain(self.state.master_gain));
            }
            ParamPage::Delay => {
                let dl = &mut self.state.delay;
                dl.feedback = (dl.feedback + d as f32).clamp(0.0, 0.9);
                cmds.push(AudioCommand::SetDelay {
                    time_secs: dl.time_secs,
                    feedback: dl.feedback,
                });
            }
            ParamPage::Pitch => {
                self.state.pitch.fine_hz =
                    (self.state.pitch.fine_hz + d * 20.0).clamp(-100.0, 100.0);
            }
            ParamPage::Trim => {
                let dur = self.loaded_duration();
                self.state.trim_end_secs = (self.state.trim_end_secs + d * 4.0).clamp(0.0, dur);
            }
        }
    }

    fn filter_cmd(&self) -> AudioCommand {
        let f = self.state.filter;
        AudioCommand::SetFilter {
            cutoff: f.cutoff,
            resonance: f.resonance,
            mode: f.mode,
        }
    }

    fn loaded_duration(&self) -> f64 {
        self.state.loaded.map(|l| l.duration_secs()).unwrap_or(0.0)
    }

    // -- export --

    fn export_range(&mut self, keep: bool) {
        let Some(set) = self.sample.clone() else {
            return;
        };
        let mode = if keep { RangeMode::Keep } else { RangeMode::Remove };
        let result = export::export_range(
            &set,
            self.state.trim_start_secs,
            self.state.trim_end_secs,
            mode,
        );
        self.finish_export(result, "trim");
    }

    fn export_sequence(&mut self) {
        let Some(set) = self.sample.clone() else {
            return;
        };
        let program = SequenceProgram::compile(&self.state.sequence_text);
        let result = export::render_sequence(&set, &program, &self.state);
        self.finish_export(result, "sequence");
    }

    fn finish_export(&mut self, result: Result<Vec<u8>, ExportError>, tag: &str) {
        match result {
            Ok(bytes) => {
                let stamp = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                let name = format!("{tag}-{stamp}.wav");
                match std::fs::write(&name, &bytes) {
                    Ok(()) => log::info!("exported {name} ({} bytes)", bytes.len()),
                    Err(e) => self.state.set_error(format!("export failed: {e}")),
                }
            }
            // a degenerate range writes nothing and says nothing
            Err(ExportError::InvalidRange) => {
                log::debug!("export skipped: empty result");
            }
            Err(e) => self.state.set_error(e.to_string()),
        }
    }
}
