use super::frame::StereoFrame;
use crate::shared::FilterMode;

/// Quantization steps for the bit-reduction wet path.
const CRUSH_STEPS: f32 = 8.0;
/// Upper bound on the delay line, in seconds.
const MAX_DELAY_SECS: f32 = 2.0;

// State variable filter, one per channel with shared coefficients.
// Highpass doubles as a "fully open" bypass when the cutoff sits at 20Hz.
struct Svf {
    mode: FilterMode,
    cutoff: f32,
    resonance: f32,
    g: f32,
    k: f32,
    a1: f32,
    a2: f32,
    a3: f32,
    // per-channel integrator state
    ic1: [f32; 2],
    ic2: [f32; 2],
    sample_rate: f32,
}

impl Svf {
    fn new(sample_rate: f32) -> Self {
        let mut svf = Self {
            mode: FilterMode::Highpass,
            cutoff: 20.0,
            resonance: 0.1,
            g: 0.0,
            k: 0.0,
            a1: 0.0,
            a2: 0.0,
            a3: 0.0,
            ic1: [0.0; 2],
            ic2: [0.0; 2],
            sample_rate,
        };
        svf.recalc();
        svf
    }

    fn set(&mut self, cutoff: f32, resonance: f32, mode: FilterMode) {
        self.cutoff = cutoff.clamp(20.0, self.sample_rate * 0.49);
        self.resonance = resonance.clamp(0.0, 0.99);
        self.mode = mode;
        self.recalc();
    }

    fn recalc(&mut self) {
        self.g = (std::f32::consts::PI * self.cutoff / self.sample_rate).tan();
        self.k = 2.0 - 2.0 * self.resonance;
        self.a1 = 1.0 / (1.0 + self.g * (self.g + self.k));
        self.a2 = self.g * self.a1;
        self.a3 = self.g * self.a2;
    }

    #[inline]
    fn process_channel(&mut self, ch: usize, input: f32) -> f32 {
        let v3 = input - self.ic2[ch];
        let v1 = self.a1 * self.ic1[ch] + self.a2 * v3;
        let v2 = self.ic2[ch] + self.a2 * self.ic1[ch] + self.a3 * v3;
        self.ic1[ch] = 2.0 * v1 - self.ic1[ch];
        self.ic2[ch] = 2.0 * v2 - self.ic2[ch];
        match self.mode {
            FilterMode::Lowpass => v2,
            FilterMode::Highpass => input - self.k * v1 - v2,
        }
    }

    #[inline]
    fn process(&mut self, f: StereoFrame) -> StereoFrame {
        StereoFrame {
            left: self.process_channel(0, f.left),
            right: self.process_channel(1, f.right),
        }
    }
}

// Feedback delay with a wet tap. The feedback amount also drives the wet
// gain, matching the single dub-delay knob behaviour of the controls.
struct Delay {
    ring: Vec<StereoFrame>,
    write: usize,
    offset: usize,
    feedback: f32,
    sample_rate: f32,
}

impl Delay {
    fn new(sample_rate: f32) -> Self {
        let len = (sample_rate * MAX_DELAY_SECS) as usize;
        Self {
            ring: vec![StereoFrame::zero(); len.max(1)],
            write: 0,
            offset: (sample_rate * 0.3) as usize,
            feedback: 0.0,
            sample_rate,
        }
    }

    fn set(&mut self, time_secs: f32, feedback: f32) {
        let t = time_secs.clamp(0.001, MAX_DELAY_SECS);
        self.offset = ((self.sample_rate * t) as usize).clamp(1, self.ring.len() - 1);
        self.feedback = feedback.clamp(0.0, 0.95);
    }

    #[inline]
    fn process(&mut self, dry: StereoFrame) -> StereoFrame {
        let read = (self.write + self.ring.len() - self.offset) % self.ring.len();
        let wet = self.ring[read];
        let mut recirc = dry;
        recirc.add(wet.scaled(self.feedback));
        self.ring[self.write] = recirc;
        self.write = (self.write + 1) % self.ring.len();
        let mut out = dry;
        out.add(wet.scaled(self.feedback));
        out
    }
}

#[inline]
fn crush_sample(s: f32) -> f32 {
    (s.clamp(-1.0, 1.0) * CRUSH_STEPS).round() / CRUSH_STEPS
}

#[inline]
fn soft_clip(s: f32) -> f32 {
    s.tanh()
}

/// The continuous signal path every voice is summed into:
/// filter -> bit reduction (dry/wet) -> soft limiter -> dub delay.
/// Parameter changes land here mid-flight; nothing is deferred to the
/// next trigger.
pub struct MixBus {
    svf: Svf,
    crush_mix: f32,
    delay: Delay,
}

impl MixBus {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            svf: Svf::new(sample_rate),
            crush_mix: 0.0,
            delay: Delay::new(sample_rate),
        }
    }

    pub fn set_filter(&mut self, cutoff: f32, resonance: f32, mode: FilterMode) {
        self.svf.set(cutoff, resonance, mode);
    }

    pub fn set_crush_mix(&mut self, mix: f32) {
        self.crush_mix = mix.clamp(0.0, 1.0);
    }

    pub fn set_delay(&mut self, time_secs: f32, feedback: f32) {
        self.delay.set(time_secs, feedback);
    }

    #[inline]
    pub fn process(&mut self, f: StereoFrame) -> StereoFrame {
        let f = self.svf.process(f);
        let f = StereoFrame {
            left: super::frame::lerp(f.left, crush_sample(f.left), self.crush_mix),
            right: super::frame::lerp(f.right, crush_sample(f.right), self.crush_mix),
        };
        let f = StereoFrame {
            left: soft_clip(f.left),
            right: soft_clip(f.right),
        };
        self.delay.process(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bus_passes_audio_nearly_untouched() {
        // open highpass, no crush, no delay feedback
        let mut bus = MixBus::new(44100.0);
        let mut peak = 0.0f32;
        for i in 0..4410 {
            let s = (i as f32 * 0.05).sin() * 0.5;
            let out = bus.process(StereoFrame::mono(s));
            peak = peak.max(out.left.abs());
        }
        assert!(peak > 0.4 && peak < 0.6);
    }

    #[test]
    fn lowpass_attenuates_alternating_polarity() {
        let mut bus = MixBus::new(44100.0);
        bus.set_filter(200.0, 0.1, FilterMode::Lowpass);
        let mut peak = 0.0f32;
        for i in 0..4410 {
            // nyquist-rate alternation, way above a 200Hz cutoff
            let s = if i % 2 == 0 { 0.5 } else { -0.5 };
            let out = bus.process(StereoFrame::mono(s));
            if i > 1000 {
                peak = peak.max(out.left.abs());
            }
        }
        assert!(peak < 0.05, "lowpass left too much HF: {peak}");
    }

    #[test]
    fn full_crush_quantizes_to_step_grid() {
        let mut bus = MixBus::new(44100.0);
        bus.set_crush_mix(1.0);
        // highpass at 20Hz passes DC-ish slow signals nearly intact, so
        // the quantizer grid should show through
        let out = bus.process(StereoFrame::mono(0.37));
        let quantized = (out.left * CRUSH_STEPS).round() / CRUSH_STEPS;
        assert!((out.left - quantized).abs() < 0.05);
    }

    #[test]
    fn delay_echoes_after_the_set_time() {
        let mut bus = MixBus::new(1000.0); // 1kHz rate keeps the test small
        bus.set_delay(0.1, 0.5); // 100 frames
        let first = bus.process(StereoFrame::mono(1.0));
        let mut echo_at = None;
        for i in 1..300 {
            let out = bus.process(StereoFrame::zero());
            // the highpass rings for a few samples after the impulse, so
            // only start listening for the echo once that has died down
            if i >= 20 && out.left.abs() > 0.05 && echo_at.is_none() {
                echo_at = Some(i);
            }
        }
        assert!(first.left.abs() > 0.5);
        let echo = echo_at.expect("echo never arrived");
        assert!((90..=110).contains(&echo), "echo at {echo}");
    }
}
