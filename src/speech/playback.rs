//! Audio playback for synthesized speech (cpal output, rubato resampling)

use crate::{OpticaError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Stream;
use parking_lot::Mutex;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Default output device fed from a sample queue
///
/// `cpal` streams are not `Send` everywhere, so create and keep this on the
/// thread that plays audio.
pub struct AudioOutput {
    _stream: Stream,
    queue: Arc<Mutex<VecDeque<f32>>>,
    sample_rate: u32,
}

impl AudioOutput {
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| OpticaError::SpeechError("No output device available".into()))?;

        info!(
            "Using output device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let config: cpal::StreamConfig = device
            .default_output_config()
            .map_err(|e| OpticaError::SpeechError(format!("Failed to get output config: {}", e)))?
            .into();

        let channels = config.channels as usize;
        let sample_rate = config.sample_rate.0;
        let queue = Arc::new(Mutex::new(VecDeque::new()));
        let callback_queue = Arc::clone(&queue);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut queue = callback_queue.lock();
                    for frame in data.chunks_mut(channels) {
                        // Mono speech goes to every channel
                        let sample = queue.pop_front().unwrap_or(0.0);
                        frame.fill(sample);
                    }
                },
                |err| error!("Audio output stream error: {}", err),
                None,
            )
            .map_err(|e| {
                OpticaError::SpeechError(format!("Failed to build output stream: {}", e))
            })?;

        stream
            .play()
            .map_err(|e| OpticaError::SpeechError(format!("Failed to start output stream: {}", e)))?;

        Ok(Self {
            _stream: stream,
            queue,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Replace whatever is queued with `samples`
    pub fn play(&self, samples: Vec<f32>) {
        let mut queue = self.queue.lock();
        queue.clear();
        queue.extend(samples);
    }

    /// Drop queued audio
    pub fn flush(&self) {
        self.queue.lock().clear();
    }

    /// Samples not yet handed to the device
    pub fn remaining(&self) -> usize {
        self.queue.lock().len()
    }
}

/// Resample mono audio to `output_rate`
pub fn resample_mono(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
    if input_rate == output_rate || input.is_empty() {
        return Ok(input.to_vec());
    }
    if input_rate == 0 || output_rate == 0 {
        return Err(OpticaError::SpeechError(
            "Sample rates must be greater than 0".into(),
        ));
    }

    let ratio = output_rate as f64 / input_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let chunk_size = 1024;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, 1)
        .map_err(|e| OpticaError::SpeechError(format!("Failed to create resampler: {}", e)))?;

    let mut output = Vec::with_capacity((input.len() as f64 * ratio * 1.1) as usize);

    for chunk in input.chunks(chunk_size) {
        // SincFixedIn wants full chunks; the tail is zero-padded
        let mut padded = vec![0.0f32; chunk_size];
        padded[..chunk.len()].copy_from_slice(chunk);

        let processed = resampler
            .process(&[padded], None)
            .map_err(|e| OpticaError::SpeechError(format!("Resampling failed: {}", e)))?;

        let wanted = if chunk.len() < chunk_size {
            ((chunk.len() as f64) * ratio).ceil() as usize
        } else {
            processed[0].len()
        };
        output.extend_from_slice(&processed[0][..wanted.min(processed[0].len())]);
    }

    debug!(
        "Resampled {} samples ({} Hz) -> {} samples ({} Hz)",
        input.len(),
        input_rate,
        output.len(),
        output_rate
    );

    Ok(output)
}
