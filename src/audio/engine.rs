use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio_api::{AudioCommand, TriggerParams};
use crate::shared::FADE_SECS;

use super::frame::StereoFrame;
use super::fx::MixBus;
use super::sample::SampleSet;
use super::voice::Voice;

const MAX_PENDING: usize = 64; // preallocated so the callback never mallocs

/// What a schedule-ahead command turns into once the callback accepts it.
#[derive(Clone, Debug)]
enum Pending {
    Trigger(TriggerParams),
    Release,
}

/// The render-side engine. Lives inside the cpal output callback, owns the
/// voices and the mix bus, and publishes its frame counter so the control
/// thread can read the output clock. Commands arrive through a bounded
/// channel drained at the top of every block; time-critical ones carry an
/// absolute frame and are held until the block that contains it.
pub struct Engine {
    sample_rate: u32,
    fade_frames: usize,
    sample: Option<Arc<SampleSet>>,
    pending: Vec<(u64, Pending)>,
    current: Option<Voice>,
    fading: Vec<Voice>,
    bus: MixBus,
    master_gain: f32,
    abs_frame: u64,
    clock: Arc<AtomicU64>,
}

impl Engine {
    pub fn new(sample_rate: u32, clock: Arc<AtomicU64>) -> Self {
        Self {
            sample_rate,
            fade_frames: (FADE_SECS * sample_rate as f64) as usize,
            sample: None,
            pending: Vec::with_capacity(MAX_PENDING),
            current: None,
            fading: Vec::with_capacity(8),
            bus: MixBus::new(sample_rate as f32),
            master_gain: 1.0,
            abs_frame: 0,
            clock,
        }
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::SetSample(set) => {
                // swap forward+mirror in one move; in-flight voices of the
                // old sample keep their own Arc until they finish
                self.sample = Some(set);
            }
            AudioCommand::Trigger(t) => self.push_pending(t.at_frame, Pending::Trigger(t)),
            AudioCommand::Release { at_frame } => {
                // a stop also revokes triggers already committed into the
                // lookahead window; they would otherwise fire full-gain
                // after the user hears silence
                self.pending
                    .retain(|(f, p)| !(*f >= at_frame && matches!(p, Pending::Trigger(_))));
                self.push_pending(at_frame, Pending::Release);
            }
            AudioCommand::SetFilter { cutoff, resonance, mode } => {
                self.bus.set_filter(cutoff, resonance, mode)
            }
            AudioCommand::SetCrushMix(mix) => self.bus.set_crush_mix(mix),
            AudioCommand::SetDelay { time_secs, feedback } => {
                self.bus.set_delay(time_secs, feedback)
            }
            AudioCommand::SetMasterGain(g) => self.master_gain = g.clamp(0.0, 2.0),
        }
    }

    fn push_pending(&mut self, at_frame: u64, p: Pending) {
        if self.pending.len() >= MAX_PENDING {
            // scheduler gone haywire; dropping the oldest beats blocking
            self.pending.remove(0);
        }
        self.pending.push((at_frame, p));
    }

    /// Fill one output block. Events fire on their exact frame within the
    /// block; the clock is published once per block.
    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        for frame in out.iter_mut() {
            self.activate_due();

            let mut mix = StereoFrame::zero();
            if let Some(set) = self.sample.clone() {
                if let Some(v) = self.current.as_mut() {
                    mix.add(v.next_frame(&set));
                    if v.is_done() {
                        self.current = None;
                    }
                }
                for v in self.fading.iter_mut() {
                    mix.add(v.next_frame(&set));
                }
                self.fading.retain(|v| !v.is_done());
            }

            *frame = self.bus.process(mix).scaled(self.master_gain);
            self.abs_frame += 1;
        }
        self.clock.store(self.abs_frame, Ordering::Release);
    }

    fn activate_due(&mut self) {
        let now = self.abs_frame;
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].0 <= now {
                let (_, p) = self.pending.remove(i);
                match p {
                    Pending::Trigger(t) => self.start_voice(t),
                    Pending::Release => self.release_current(),
                }
            } else {
                i += 1;
            }
        }
    }

    fn release_current(&mut self) {
        if let Some(mut v) = self.current.take() {
            v.release();
            self.fading.push(v);
        }
    }

    fn start_voice(&mut self, t: TriggerParams) {
        // a trigger without a loaded sample is a skipped beat, not an error
        let Some(set) = self.sample.as_ref() else {
            return;
        };
        let (start, mut len) = if t.reverse {
            set.reverse_slice_region(t.slice)
        } else {
            set.slice_region(t.slice)
        };
        if t.stutter {
            len /= 2;
        }
        if len == 0 {
            return;
        }
        self.release_current();
        self.current = Some(Voice::new(start, len, t.rate, t.reverse, self.fade_frames));
    }
}
