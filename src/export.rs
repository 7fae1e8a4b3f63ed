use std::io::Cursor;

use crate::audio::{SampleSet, StereoFrame, Voice};
use crate::engine::sequence::{SequenceProgram, Step};
use crate::engine::state::EngineState;
use crate::shared::FADE_SECS;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("requested range produces no audio")]
    InvalidRange,
    #[error("wav encoding failed: {0}")]
    Encode(#[from] hound::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeMode {
    /// keep only the selected range
    Keep,
    /// cut the range out and join what's left
    Remove,
}

/// Encode interleaved stereo frames as a 16-bit PCM RIFF/WAVE stream.
///
/// This is a stable external interface: format tag 1, little-endian
/// interleaved samples, input clamped to [-1, 1] before quantization.
/// Quantization rounds at a 32768 scale and clamps the positive rail,
/// which keeps every decoded value within 1/32768 of the input.
pub fn encode_wav(frames: &[StereoFrame], sample_rate: u32) -> Result<Vec<u8>, ExportError> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut bytes = Vec::with_capacity(44 + frames.len() * 4);
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)?;
        for f in frames {
            writer.write_sample(quantize(f.left))?;
            writer.write_sample(quantize(f.right))?;
        }
        writer.finalize()?;
    }
    Ok(bytes)
}

fn quantize(s: f32) -> i16 {
    let scaled = (s.clamp(-1.0, 1.0) * 32768.0).round();
    scaled.clamp(-32768.0, 32767.0) as i16
}

/// Cut a time range out of the loaded sample and encode it. `Keep`
/// yields the range itself, `Remove` yields everything but the range.
/// A selection that nets zero frames is `InvalidRange`; the caller
/// writes nothing in that case.
pub fn export_range(
    set: &SampleSet,
    start_secs: f64,
    end_secs: f64,
    mode: RangeMode,
) -> Result<Vec<u8>, ExportError> {
    let sr = set.sample_rate as f64;
    let total = set.frame_count();
    let start = ((start_secs * sr).floor().max(0.0) as usize).min(total);
    let end = ((end_secs * sr).floor().max(0.0) as usize).min(total);
    if end <= start {
        return Err(ExportError::InvalidRange);
    }

    let frames: Vec<StereoFrame> = match mode {
        RangeMode::Keep => set.forward[start..end].to_vec(),
        RangeMode::Remove => {
            let mut out = Vec::with_capacity(total - (end - start));
            out.extend_from_slice(&set.forward[..start]);
            out.extend_from_slice(&set.forward[end..]);
            if out.is_empty() {
                return Err(ExportError::InvalidRange);
            }
            out
        }
    };
    encode_wav(&frames, set.sample_rate)
}

/// Render a compiled sequence offline on the same beat grid and with the
/// same voice handoff discipline the live path uses, then encode it.
/// The mix bus is not applied; the export is the dry slice arrangement.
pub fn render_sequence(
    set: &SampleSet,
    program: &SequenceProgram,
    state: &EngineState,
) -> Result<Vec<u8>, ExportError> {
    if program.is_empty() {
        return Err(ExportError::InvalidRange);
    }

    let sr = set.sample_rate as f64;
    let beat_frames = (state.beat_duration() * sr).round() as usize;
    let rate = state.playback_rate();
    let fade_frames = ((FADE_SECS * sr) as usize).max(1);

    // room for every beat plus the tail of a final slice ringing out
    let slice_frames = set.frame_count() / crate::shared::NUM_SLICES;
    let tail = (slice_frames as f64 / rate.max(1e-6)).ceil() as usize;
    let total = program.len() * beat_frames + tail;

    let mut out = vec![StereoFrame::zero(); total];
    let mut current: Option<Voice> = None;
    let mut fading: Vec<Voice> = Vec::new();

    for (frame_idx, frame) in out.iter_mut().enumerate() {
        if frame_idx % beat_frames == 0 {
            let beat = frame_idx / beat_frames;
            if beat < program.len() {
                match program.step(beat) {
                    Step::Slice(i) => {
                        if let Some(mut v) = current.take() {
                            v.release();
                            fading.push(v);
                        }
                        let (start, len) = set.slice_region(i);
                        current = Some(Voice::new(start, len, rate, false, fade_frames));
                    }
                    Step::Rest => {
                        if let Some(mut v) = current.take() {
                            v.release();
                            fading.push(v);
                        }
                    }
                    Step::Hold => {}
                }
            }
        }

        let mut mix = StereoFrame::zero();
        if let Some(v) = current.as_mut() {
            mix.add(v.next_frame(set));
            if v.is_done() {
                current = None;
            }
        }
        for v in fading.iter_mut() {
            mix.add(v.next_frame(set));
        }
        fading.retain(|v| !v.is_done());
        *frame = mix;
    }

    encode_wav(&out, set.sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::state::LoadedSample;

    fn dc_set(secs: f64, level: f32) -> SampleSet {
        let frames = (44100.0 * secs) as usize;
        SampleSet::from_frames(vec![StereoFrame::mono(level); frames], 44100).unwrap()
    }

    #[test]
    fn roundtrip_stays_within_quantization_error() {
        let frames: Vec<StereoFrame> = (0..2000)
            .map(|i| StereoFrame::mono(((i as f32) / 1000.0) - 1.0))
            .collect();
        let bytes = encode_wav(&frames, 44100).unwrap();
        let back = SampleSet::decode(&bytes, 44100).unwrap();
        assert_eq!(back.frame_count(), frames.len());
        for (a, b) in frames.iter().zip(back.forward.iter()) {
            assert!((a.left - b.left).abs() <= 1.0 / 32768.0);
            assert!((a.right - b.right).abs() <= 1.0 / 32768.0);
        }
    }

    #[test]
    fn keep_mode_yields_exactly_the_selected_frames() {
        let set = dc_set(5.0, 0.25);
        let bytes = export_range(&set, 1.0, 2.0, RangeMode::Keep).unwrap();
        let back = SampleSet::decode(&bytes, 44100).unwrap();
        assert_eq!(back.frame_count(), 44100);
    }

    #[test]
    fn remove_mode_yields_the_complement() {
        // a ramp so we can check the seam is where it should be
        let frames: Vec<StereoFrame> = (0..44100 * 5)
            .map(|i| StereoFrame::mono((i % 1000) as f32 / 2000.0))
            .collect();
        let set = SampleSet::from_frames(frames, 44100).unwrap();
        let bytes = export_range(&set, 1.0, 2.0, RangeMode::Remove).unwrap();
        let back = SampleSet::decode(&bytes, 44100).unwrap();
        assert_eq!(back.frame_count(), 44100 * 4);
        // frame 44100 of the output is original frame 88200
        let expected = set.forward[88200].left;
        assert!((back.forward[44100].left - expected).abs() <= 1.0 / 32768.0);
    }

    #[test]
    fn degenerate_ranges_are_rejected() {
        let set = dc_set(5.0, 0.25);
        assert!(matches!(
            export_range(&set, 2.0, 2.0, RangeMode::Keep),
            Err(ExportError::InvalidRange)
        ));
        assert!(matches!(
            export_range(&set, 3.0, 1.0, RangeMode::Keep),
            Err(ExportError::InvalidRange)
        ));
        // removing everything leaves nothing to write
        assert!(matches!(
            export_range(&set, 0.0, 5.0, RangeMode::Remove),
            Err(ExportError::InvalidRange)
        ));
    }

    #[test]
    fn sequence_render_places_audio_and_silence_on_the_grid() {
        let set = dc_set(4.0, 0.5);
        let mut state = EngineState::default();
        state.loaded = Some(LoadedSample {
            frames: set.frame_count(),
            sample_rate: 44100,
        });
        let program = SequenceProgram::compile("1.-2");
        let bytes = render_sequence(&set, &program, &state).unwrap();
        let back = SampleSet::decode(&bytes, 44100).unwrap();

        let beat = (state.beat_duration() * 44100.0).round() as usize;
        // mid-beat 0: slice audio present
        assert!(back.forward[beat / 2].left.abs() > 0.2);
        // mid-beat 1 (rest, after the fade window): silence
        assert!(back.forward[beat + beat / 2].left.abs() < 1.0 / 32768.0 + 1e-4);
        // mid-beat 2 (hold after a rest): still silence
        assert!(back.forward[2 * beat + beat / 2].left.abs() < 1.0 / 32768.0 + 1e-4);
        // mid-beat 3: slice 1 sounding again
        assert!(back.forward[3 * beat + beat / 2].left.abs() > 0.2);
    }

    #[test]
    fn empty_program_exports_nothing() {
        let set = dc_set(1.0, 0.5);
        let state = EngineState::default();
        assert!(matches!(
            render_sequence(&set, &SequenceProgram::compile("??"), &state),
            Err(ExportError::InvalidRange)
        ));
    }
}
