use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

use crate::audio_api::AudioCommand;

mod engine;
mod frame;
mod fx;
mod sample;
mod voice;

pub use frame::StereoFrame;
pub use sample::{DecodeError, SampleSet};
pub use voice::Voice;

use engine::Engine;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("no default output device")]
    NoDevice,
    #[error("no usable output config: {0}")]
    NoConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("unsupported sample format {0:?} (only f32 is supported)")]
    UnsupportedFormat(cpal::SampleFormat),
    #[error("could not open output stream: {0}")]
    Stream(#[from] cpal::BuildStreamError),
    #[error("could not start output stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
}

/// Monotonic output-position clock published by the render callback.
/// This is the only render->control channel; reading it is lock-free.
#[derive(Clone)]
pub struct OutputClock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl OutputClock {
    pub fn new(frames: Arc<AtomicU64>, sample_rate: u32) -> Self {
        Self { frames, sample_rate }
    }

    pub fn now_secs(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    clock: OutputClock,
    _output_stream: cpal::Stream,
}

impl AudioHandle {
    pub fn send(&self, cmd: AudioCommand) {
        let _ = self.tx.try_send(cmd);
    }

    pub fn clock(&self) -> OutputClock {
        self.clock.clone()
    }
}

pub fn start_audio() -> Result<AudioHandle, DeviceError> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(1024);

    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(DeviceError::NoDevice)?;
    let config = device.default_output_config()?;

    let sample_rate = config.sample_rate();
    let channels = config.channels() as usize;
    log::info!(
        "output device: {} @ {}Hz, {} channels",
        device.name().unwrap_or_else(|_| "<unnamed>".into()),
        sample_rate,
        channels
    );

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let frames = Arc::new(AtomicU64::new(0));
            let output_stream =
                build_output_stream_f32(&device, &config.into(), rx, frames.clone(), channels)?;
            output_stream.play()?;

            Ok(AudioHandle {
                tx,
                clock: OutputClock::new(frames, sample_rate),
                _output_stream: output_stream,
            })
        }
        other => Err(DeviceError::UnsupportedFormat(other)),
    }
}

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    frames: Arc<AtomicU64>,
    channels: usize,
) -> Result<cpal::Stream, DeviceError> {
    let mut engine = Engine::new(config.sample_rate, frames);
    let mut scratch: Vec<StereoFrame> = Vec::new();

    let err_fn = |err| log::error!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            while let Ok(cmd) = rx.try_recv() {
                engine.handle_cmd(cmd);
            }

            let n_frames = data.len() / channels;
            if channels == 2 {
                // stereo f32 is layout-compatible with StereoFrame
                let frames: &mut [StereoFrame] = unsafe {
                    std::slice::from_raw_parts_mut(data.as_mut_ptr() as *mut StereoFrame, n_frames)
                };
                engine.render_block(frames);
            } else {
                scratch.clear();
                scratch.resize(n_frames, StereoFrame::zero());
                engine.render_block(&mut scratch);
                for (i, chunk) in data.chunks_exact_mut(channels).enumerate() {
                    if channels == 1 {
                        chunk[0] = 0.5 * (scratch[i].left + scratch[i].right);
                    } else {
                        chunk[0] = scratch[i].left;
                        chunk[1] = scratch[i].right;
                        for extra in chunk.iter_mut().skip(2) {
                            *extra = 0.0;
                        }
                    }
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
