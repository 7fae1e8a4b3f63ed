use rand::Rng;

use crate::audio_api::{AudioCommand, TriggerParams};
use crate::shared::{LOOKAHEAD_SECS, NUM_SLICES};

use super::autogen;
use super::sequence::{SequenceProgram, Step};
use super::state::EngineState;

/// The lookahead beat scheduler.
///
/// Runs on the control thread at a coarse tick rate and never blocks:
/// every action it takes is a command stamped with a future frame, which
/// the render callback honors exactly. Per beat, the next action resolves
/// by priority: manual queue, stutter, sequence, auto mode, idle.
pub struct Scheduler {
    sample_rate: u32,
    running: bool,
    next_beat: f64,
    auto_step: usize,
    queued: Option<usize>,
    last_played: usize,
    program: SequenceProgram,
    cursor: usize,
}

impl Scheduler {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            running: false,
            next_beat: 0.0,
            auto_step: 0,
            queued: None,
            last_played: 0,
            program: SequenceProgram::default(),
            cursor: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Anchor the beat clock to "now" and reset the auto step.
    pub fn start(&mut self, now: f64, state: &mut EngineState) {
        if self.running {
            return;
        }
        self.running = true;
        self.next_beat = now;
        self.auto_step = 0;
        state.playing = true;
    }

    /// Stop scheduling, fade out the current voice, and reset all
    /// sequence bookkeeping to zero.
    pub fn stop(&mut self, state: &mut EngineState, cmds: &mut Vec<AudioCommand>) {
        if self.running {
            cmds.push(AudioCommand::Release { at_frame: 0 });
        }
        self.running = false;
        self.queued = None;
        self.cursor = 0;
        state.playing = false;
        state.auto_mode = false;
        state.sequence_mode = false;
        state.sequence_position = 0;
        state.active_slice = None;
        state.active_clear_at = None;
    }

    /// Queue a manual slice; it wins the next beat and resyncs the auto
    /// generator's position to itself.
    pub fn queue_manual(&mut self, slice: usize) {
        self.queued = Some(slice % NUM_SLICES);
    }

    /// Replace the compiled program wholesale and rewind the cursor.
    pub fn set_program(&mut self, program: SequenceProgram, state: &mut EngineState) {
        state.sequence_length = program.len();
        state.sequence_position = 0;
        self.cursor = 0;
        self.program = program;
    }

    /// One control tick: commit every beat that falls inside the
    /// lookahead window, then expire stale active-slice feedback.
    pub fn tick<R: Rng>(
        &mut self,
        now: f64,
        state: &mut EngineState,
        rng: &mut R,
        cmds: &mut Vec<AudioCommand>,
    ) {
        if self.running {
            while self.next_beat < now + LOOKAHEAD_SECS {
                let beat = self.next_beat;
                self.next_beat += state.beat_duration();
                if let Some(slice) = self.resolve(beat, state, rng, cmds) {
                    self.dispatch(slice, beat, state, cmds);
                    self.auto_step = (self.auto_step + 1) % NUM_SLICES;
                }
            }
        }

        if let Some(clear_at) = state.active_clear_at {
            if now >= clear_at {
                state.active_slice = None;
                state.active_clear_at = None;
            }
        }
    }

    fn resolve<R: Rng>(
        &mut self,
        beat: f64,
        state: &mut EngineState,
        rng: &mut R,
        cmds: &mut Vec<AudioCommand>,
    ) -> Option<usize> {
        if let Some(slice) = self.queued.take() {
            // manual trigger wins and drags the auto position with it
            self.auto_step = slice;
            return Some(slice);
        }
        if state.stutter_held {
            return Some(self.last_played);
        }
        if state.sequence_mode {
            if self.program.is_empty() {
                return None;
            }
            state.sequence_position = self.cursor;
            let step = self.program.step(self.cursor);
            self.cursor = (self.cursor + 1) % self.program.len();
            return match step {
                Step::Slice(i) => Some(i),
                Step::Rest => {
                    cmds.push(AudioCommand::Release {
                        at_frame: self.frame_at(beat),
                    });
                    state.active_slice = None;
                    state.active_clear_at = None;
                    None
                }
                Step::Hold => None,
            };
        }
        if state.auto_mode {
            return Some(autogen::next_slice(state.chaos, self.auto_step, rng));
        }
        None
    }

    fn dispatch(
        &mut self,
        slice: usize,
        beat: f64,
        state: &mut EngineState,
        cmds: &mut Vec<AudioCommand>,
    ) {
        // no sample loaded: skip the beat, the clock has already advanced
        let Some(info) = state.loaded else {
            return;
        };
        let rate = state.playback_rate();
        let stutter = state.stutter_held;
        cmds.push(AudioCommand::Trigger(TriggerParams {
            slice,
            reverse: state.reverse_held,
            stutter,
            rate,
            at_frame: self.frame_at(beat),
        }));
        self.last_played = slice;
        state.active_slice = Some(slice);

        // UI feedback expires after the audible duration, which scales
        // with the inverse of the playback rate
        let slice_secs = info.duration_secs() / NUM_SLICES as f64;
        let play_secs = if stutter { slice_secs / 2.0 } else { slice_secs };
        state.active_clear_at = Some(beat + play_secs / rate.max(1e-6));
    }

    fn frame_at(&self, secs: f64) -> u64 {
        (secs.max(0.0) * self.sample_rate as f64).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::state::LoadedSample;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn loaded_state() -> EngineState {
        let mut s = EngineState::default();
        s.loaded = Some(LoadedSample {
            frames: 44100 * 4,
            sample_rate: 44100,
        });
        s
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(99)
    }

    fn triggers(cmds: &[AudioCommand]) -> Vec<&TriggerParams> {
        cmds.iter()
            .filter_map(|c| match c {
                AudioCommand::Trigger(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    /// run ticks over a span of control time, collecting commands
    fn run(
        sched: &mut Scheduler,
        state: &mut EngineState,
        from: f64,
        to: f64,
        step: f64,
    ) -> Vec<AudioCommand> {
        let mut rng = rng();
        let mut cmds = Vec::new();
        let mut now = from;
        while now < to {
            sched.tick(now, state, &mut rng, &mut cmds);
            now += step;
        }
        cmds
    }

    #[test]
    fn idle_running_scheduler_dispatches_nothing() {
        let mut state = loaded_state();
        let mut sched = Scheduler::new(44100);
        sched.start(0.0, &mut state);
        let cmds = run(&mut sched, &mut state, 0.0, 1.0, 0.025);
        assert!(cmds.is_empty());
        assert!(state.playing);
    }

    #[test]
    fn manual_trigger_plays_on_the_next_beat_and_resyncs_auto() {
        let mut state = loaded_state();
        state.auto_mode = true;
        let mut sched = Scheduler::new(44100);
        sched.start(0.0, &mut state);
        sched.queue_manual(5);

        let cmds = run(&mut sched, &mut state, 0.0, 0.3, 0.025);
        let t = triggers(&cmds);
        assert_eq!(t[0].slice, 5);
        // chaos is zero, so the following beats continue from the manual slice
        assert_eq!(t[1].slice, 6);
        assert_eq!(t[2].slice, 7);
    }

    #[test]
    fn triggers_land_on_the_beat_grid() {
        let mut state = loaded_state();
        state.auto_mode = true;
        let mut sched = Scheduler::new(44100);
        sched.start(0.0, &mut state);
        let cmds = run(&mut sched, &mut state, 0.0, 0.5, 0.025);
        let beat_frames = state.beat_duration() * 44100.0;
        for (i, t) in triggers(&cmds).iter().enumerate() {
            let expected = (i as f64 * beat_frames).round() as i64;
            assert!((t.at_frame as i64 - expected).abs() <= 1, "beat {i} off grid");
        }
    }

    #[test]
    fn stutter_repeats_the_last_played_slice_at_half_duration() {
        let mut state = loaded_state();
        state.auto_mode = true;
        let mut sched = Scheduler::new(44100);
        sched.start(0.0, &mut state);

        // play a couple of beats normally, then hold stutter
        let cmds = run(&mut sched, &mut state, 0.0, 0.25, 0.025);
        let last = triggers(&cmds).last().unwrap().slice;
        state.stutter_held = true;
        let cmds = run(&mut sched, &mut state, 0.25, 0.5, 0.025);
        for t in triggers(&cmds) {
            assert_eq!(t.slice, last);
            assert!(t.stutter);
        }
    }

    #[test]
    fn sequence_mode_walks_the_program() {
        let mut state = loaded_state();
        state.sequence_mode = true;
        let mut sched = Scheduler::new(44100);
        sched.set_program(SequenceProgram::compile("1.-2"), &mut state);
        sched.start(0.0, &mut state);

        // four beats at 140bpm cover ~0.43s
        let cmds = run(&mut sched, &mut state, 0.0, 0.4, 0.025);
        let t = triggers(&cmds);
        assert_eq!(t.len(), 2);
        assert_eq!(t[0].slice, 0);
        assert_eq!(t[1].slice, 1);
        // the rest step stopped the voice between them
        assert!(cmds.iter().any(|c| matches!(c, AudioCommand::Release { at_frame } if *at_frame > 0)));
        // hold advanced the cursor without commands: position walked past it
        assert_eq!(state.sequence_position, 3);
    }

    #[test]
    fn empty_program_schedules_no_audio() {
        let mut state = loaded_state();
        state.sequence_mode = true;
        let mut sched = Scheduler::new(44100);
        sched.set_program(SequenceProgram::compile("??"), &mut state);
        sched.start(0.0, &mut state);
        let cmds = run(&mut sched, &mut state, 0.0, 0.5, 0.025);
        assert!(triggers(&cmds).is_empty());
        assert_eq!(state.sequence_position, 0);
    }

    #[test]
    fn stop_resets_cursor_and_flags() {
        let mut state = loaded_state();
        state.sequence_mode = true;
        let mut sched = Scheduler::new(44100);
        sched.set_program(SequenceProgram::compile("1234"), &mut state);
        sched.start(0.0, &mut state);
        let _ = run(&mut sched, &mut state, 0.0, 0.3, 0.025);
        assert!(state.sequence_position > 0);

        let mut cmds = Vec::new();
        sched.stop(&mut state, &mut cmds);
        assert!(matches!(cmds[0], AudioCommand::Release { at_frame: 0 }));
        assert!(!state.playing && !state.sequence_mode && !state.auto_mode);
        assert_eq!(state.sequence_position, 0);

        // restarting walks the program from step zero again
        state.sequence_mode = true;
        sched.start(1.0, &mut state);
        let cmds = run(&mut sched, &mut state, 1.0, 1.15, 0.025);
        assert_eq!(triggers(&cmds)[0].slice, 0);
    }

    #[test]
    fn missing_sample_skips_beats_but_keeps_time() {
        let mut state = EngineState::default(); // nothing loaded
        state.auto_mode = true;
        let mut sched = Scheduler::new(44100);
        sched.start(0.0, &mut state);
        let cmds = run(&mut sched, &mut state, 0.0, 0.5, 0.025);
        assert!(cmds.is_empty());

        // a load mid-flight picks up on the very next beat
        state.loaded = Some(LoadedSample {
            frames: 44100,
            sample_rate: 44100,
        });
        let cmds = run(&mut sched, &mut state, 0.5, 0.7, 0.025);
        assert!(!triggers(&cmds).is_empty());
    }

    #[test]
    fn active_slice_feedback_expires_after_audible_duration() {
        let mut state = loaded_state();
        state.auto_mode = true;
        let mut sched = Scheduler::new(44100);
        sched.start(0.0, &mut state);
        let mut rng = rng();
        let mut cmds = Vec::new();
        sched.tick(0.0, &mut state, &mut rng, &mut cmds);
        assert!(state.active_slice.is_some());
        let clear_at = state.active_clear_at.unwrap();
        // 4s sample, slice = 0.25s source, rate 1.0 at reference tempo
        assert!((clear_at - 0.25).abs() < 0.11); // within one beat of slice end

        sched.tick(clear_at + 0.5, &mut state, &mut rng, &mut cmds);
        // newer beats may have refreshed it; force idle and check expiry
        state.auto_mode = false;
        let far = state.active_clear_at.unwrap_or(0.0) + 1.0;
        sched.tick(far, &mut state, &mut rng, &mut cmds);
        sched.tick(far + 1.0, &mut state, &mut rng, &mut cmds);
        assert!(state.active_slice.is_none());
    }

    #[test]
    fn reverse_modifier_rides_along_on_triggers() {
        let mut state = loaded_state();
        state.auto_mode = true;
        state.reverse_held = true;
        let mut sched = Scheduler::new(44100);
        sched.start(0.0, &mut state);
        let cmds = run(&mut sched, &mut state, 0.0, 0.2, 0.025);
        assert!(triggers(&cmds).iter().all(|t| t.reverse));
    }
}
