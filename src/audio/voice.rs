use super::frame::{lerp, StereoFrame};
use super::sample::SampleSet;

/// One in-flight playback of a buffer region.
///
/// Reverse playback reads the mirrored region of the reverse buffer
/// front-to-back, so the voice itself only ever advances forward. The
/// gain envelope ramps in over the fade window at start and, once
/// `release` is called, ramps back out over the same window; a released
/// voice that reaches zero is done and gets dropped by the engine.
#[derive(Clone, Debug)]
pub struct Voice {
    start: usize,
    len: f64,
    pos: f64,
    rate: f64,
    use_reverse: bool,
    env: f32,
    fade_step: f32,
    releasing: bool,
    done: bool,
}

impl Voice {
    pub fn new(start: usize, len: usize, rate: f64, use_reverse: bool, fade_frames: usize) -> Self {
        Self {
            start,
            len: len as f64,
            pos: 0.0,
            rate: rate.max(0.0),
            use_reverse,
            env: 0.0,
            fade_step: 1.0 / fade_frames.max(1) as f32,
            releasing: false,
            done: len == 0,
        }
    }

    /// Begin the fade-out ramp. Safe to call more than once.
    pub fn release(&mut self) {
        self.releasing = true;
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Render one output frame and advance.
    pub fn next_frame(&mut self, set: &SampleSet) -> StereoFrame {
        if self.done {
            return StereoFrame::zero();
        }
        if self.pos >= self.len {
            self.done = true;
            return StereoFrame::zero();
        }

        if self.releasing {
            self.env -= self.fade_step;
            if self.env <= 0.0 {
                self.env = 0.0;
                self.done = true;
                return StereoFrame::zero();
            }
        } else if self.env < 1.0 {
            self.env = (self.env + self.fade_step).min(1.0);
        }

        let data = if self.use_reverse {
            &set.reverse
        } else {
            &set.forward
        };

        let read = self.pos.min(self.len - 1.0);
        let i = read as usize;
        let frac = (read - i as f64) as f32;
        let idx = (self.start + i).min(data.len().saturating_sub(1));
        let s0 = data[idx];
        let s1 = data.get(idx + 1).copied().unwrap_or(s0);
        let out = StereoFrame {
            left: lerp(s0.left, s1.left, frac),
            right: lerp(s0.right, s1.right, frac),
        };

        self.pos += self.rate;
        out.scaled(self.env)
    }
}
