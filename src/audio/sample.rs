use std::io::Cursor;

use super::frame::StereoFrame;
use crate::shared::{ENVELOPE_BUCKETS, NUM_SLICES};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("not a readable WAV stream: {0}")]
    Malformed(#[from] hound::Error),
    #[error("sample contains no audio")]
    Empty,
}

/// Immutable interleaved-stereo PCM plus its frame-reversed mirror.
///
/// The pair is built in one shot by `decode` and handed to the render
/// engine as a single `Arc`, so readers can never observe a forward
/// buffer without its matching mirror.
#[derive(Clone, Debug)]
pub struct SampleSet {
    pub forward: Vec<StereoFrame>,
    pub reverse: Vec<StereoFrame>,
    pub sample_rate: u32,
    /// mean absolute amplitude of the left channel, fixed bucket count,
    /// produced for the waveform display collaborator
    pub envelope: Vec<f32>,
}

impl SampleSet {
    /// Decode raw WAV bytes, resampling to `target_rate` when the file
    /// rate differs. A decode failure leaves whatever sample was active
    /// before untouched; the caller simply keeps its previous `Arc`.
    pub fn decode(bytes: &[u8], target_rate: u32) -> Result<Self, DecodeError> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|x| x as f32 / max))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        let frames: Vec<StereoFrame> = match spec.channels {
            1 => samples.into_iter().map(StereoFrame::mono).collect(),
            _ => samples
                .chunks_exact(spec.channels as usize)
                .map(|c| StereoFrame {
                    left: c[0],
                    right: if c.len() > 1 { c[1] } else { c[0] },
                })
                .collect(),
        };

        let frames = if spec.sample_rate != target_rate {
            resample_linear(&frames, spec.sample_rate, target_rate)
        } else {
            frames
        };

        Self::from_frames(frames, target_rate)
    }

    /// Build a set from already-decoded frames. Used by the decoder above
    /// and directly by offline rendering tests.
    pub fn from_frames(frames: Vec<StereoFrame>, sample_rate: u32) -> Result<Self, DecodeError> {
        if frames.is_empty() {
            return Err(DecodeError::Empty);
        }
        let reverse: Vec<StereoFrame> = frames.iter().rev().copied().collect();
        let envelope = amplitude_envelope(&frames, ENVELOPE_BUCKETS);
        Ok(Self {
            forward: frames,
            reverse,
            sample_rate,
            envelope,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.forward.len()
    }

    pub fn duration_secs(&self) -> f64 {
        self.forward.len() as f64 / self.sample_rate as f64
    }

    /// Region of slice `index` in the forward buffer: `[i*F/N, (i+1)*F/N)`.
    /// Boundaries are pure fractions of the total length, nothing stored.
    pub fn slice_region(&self, index: usize) -> (usize, usize) {
        let total = self.forward.len();
        let start = index * total / NUM_SLICES;
        let end = (index + 1) * total / NUM_SLICES;
        (start, end - start)
    }

    /// Region of slice `index` in the *reverse* buffer. The mirror of
    /// forward slice `i` lives where slice `N-1-i` would: reading it
    /// forward plays slice `i` backward, not some other slice.
    pub fn reverse_slice_region(&self, index: usize) -> (usize, usize) {
        self.slice_region(NUM_SLICES - 1 - index)
    }
}

fn amplitude_envelope(frames: &[StereoFrame], buckets: usize) -> Vec<f32> {
    let step = (frames.len() / buckets).max(1);
    (0..buckets)
        .map(|i| {
            let chunk = frames.iter().skip(i * step).take(step);
            let mut sum = 0.0f32;
            let mut n = 0usize;
            for f in chunk {
                sum += f.left.abs();
                n += 1;
            }
            if n == 0 { 0.0 } else { sum / n as f32 }
        })
        .collect()
}

fn resample_linear(frames: &[StereoFrame], source_rate: u32, target_rate: u32) -> Vec<StereoFrame> {
    if source_rate == target_rate {
        return frames.to_vec();
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let out_len = (frames.len() as f64 * ratio).ceil() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        // fractional position in the source buffer
        let src_pos = i as f64 / ratio;
        let idx = src_pos.floor() as usize;
        let frac = (src_pos - idx as f64) as f32;
        if idx >= frames.len().saturating_sub(1) {
            out.push(*frames.last().unwrap_or(&StereoFrame::zero()));
        } else {
            let a = frames[idx];
            let b = frames[idx + 1];
            out.push(StereoFrame {
                left: super::frame::lerp(a.left, b.left, frac),
                right: super::frame::lerp(a.right, b.right, frac),
            });
        }
    }
    out
}
