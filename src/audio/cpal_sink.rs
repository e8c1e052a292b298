use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use tracing::{debug, warn};

use crate::audio::{AudioBuffer, AudioError, AudioSink, EndNotifier, SoundHandle, resample_linear};

/// Plays on the host's default output device.
#[derive(Default)]
pub struct CpalSink;

struct CpalHandle {
    stream: Option<Stream>,
}

impl SoundHandle for CpalHandle {
    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            pause_stream(&stream);
        }
    }
}

/// The stream is dropped right after, so a failed pause only gets logged.
fn pause_stream(stream: &impl StreamTrait) {
    if let Err(e) = stream.pause() {
        debug!("pausing output stream failed: {e}");
    }
}

impl AudioSink for CpalSink {
    fn play(
        &mut self,
        buffer: &AudioBuffer,
        on_end: EndNotifier,
    ) -> Result<Box<dyn SoundHandle>, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let supported = device.default_output_config()?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.config();

        debug!(
            "output: rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        let samples = Arc::new(resample_linear(
            &buffer.to_mono(),
            buffer.sample_rate,
            config.sample_rate.0,
        ));

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, samples, on_end)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, samples, on_end)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, samples, on_end)?,
            other => return Err(AudioError::UnsupportedFormat(format!("{other:?}"))),
        };
        stream.play()?;

        Ok(Box::new(CpalHandle {
            stream: Some(stream),
        }))
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    samples: Arc<Vec<f32>>,
    on_end: EndNotifier,
) -> Result<Stream, AudioError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels.max(1) as usize;
    let mut position = 0usize;
    let mut on_end = Some(on_end);

    let stream = device.build_output_stream(
        config,
        move |out: &mut [T], _: &cpal::OutputCallbackInfo| {
            for frame in out.chunks_mut(channels) {
                let value = samples.get(position).copied().unwrap_or(0.0);
                position = position.saturating_add(1);
                for slot in frame.iter_mut() {
                    *slot = T::from_sample(value);
                }
            }
            if position >= samples.len() {
                if let Some(notify) = on_end.take() {
                    notify();
                }
            }
        },
        |err| warn!("audio stream error: {err}"),
        None,
    )?;
    Ok(stream)
}
