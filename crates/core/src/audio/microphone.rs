use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    BuildStreamError, PlayStreamError, SampleFormat, Stream,
};

use super::{SampleSource, SourceKind};
use crate::{DeviceError, Result};

type Shared = Arc<Mutex<VecDeque<f32>>>;

/// Live capture from the default input device.
///
/// The device callback mixes to mono and appends to a queue holding at most
/// one second of audio. Dropping the source stops the stream.
pub struct MicrophoneSource {
    queue: Shared,
    sample_rate: u32,
    _stream: Stream,
}

impl MicrophoneSource {
    pub fn open() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| DeviceError::Unavailable("no default input device".into()))?;
        let supported = device
            .default_input_config()
            .map_err(|err| DeviceError::Unavailable(err.to_string()))?;

        let sample_rate = supported.sample_rate().0;
        let channels = usize::from(supported.channels().max(1));
        let capacity = sample_rate as usize;
        let queue: Shared = Arc::new(Mutex::new(VecDeque::with_capacity(capacity)));
        let config = supported.config();

        let on_error = |err: cpal::StreamError| tracing::warn!(%err, "capture stream error");
        let stream = match supported.sample_format() {
            SampleFormat::F32 => {
                let sink = Arc::clone(&queue);
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        append_mono(&sink, data, channels, capacity, |s| s)
                    },
                    on_error,
                    None,
                )
            }
            SampleFormat::I16 => {
                let sink = Arc::clone(&queue);
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        append_mono(&sink, data, channels, capacity, |s| {
                            s as f32 / i16::MAX as f32
                        })
                    },
                    on_error,
                    None,
                )
            }
            SampleFormat::U16 => {
                let sink = Arc::clone(&queue);
                device.build_input_stream(
                    &config,
                    move |data: &[u16], _: &cpal::InputCallbackInfo| {
                        append_mono(&sink, data, channels, capacity, |s| {
                            (s as f32 - 32_768.0) / 32_768.0
                        })
                    },
                    on_error,
                    None,
                )
            }
            other => {
                let reason = format!("unsupported sample format {other}");
                return Err(DeviceError::Unavailable(reason).into());
            }
        }
        .map_err(build_error)?;

        stream.play().map_err(play_error)?;
        tracing::info!(sample_rate, channels, "capturing from default input device");

        Ok(Self {
            queue,
            sample_rate,
            _stream: stream,
        })
    }
}

impl SampleSource for MicrophoneSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Microphone
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, out: &mut [f32]) -> usize {
        let Ok(mut queue) = self.queue.lock() else {
            return 0;
        };
        let count = out.len().min(queue.len());
        for (slot, sample) in out.iter_mut().zip(queue.drain(..count)) {
            *slot = sample;
        }
        count
    }

    fn is_finished(&self) -> bool {
        false
    }
}

fn append_mono<T: Copy>(
    queue: &Shared,
    data: &[T],
    channels: usize,
    capacity: usize,
    to_f32: impl Fn(T) -> f32,
) {
    let Ok(mut queue) = queue.lock() else {
        return;
    };
    for frame in data.chunks_exact(channels) {
        let mixed = frame.iter().map(|&s| to_f32(s)).sum::<f32>() / channels as f32;
        if queue.len() == capacity {
            queue.pop_front();
        }
        queue.push_back(mixed);
    }
}

fn build_error(err: BuildStreamError) -> DeviceError {
    match err {
        BuildStreamError::BackendSpecific { ref err } if is_permission(&err.description) => {
            DeviceError::PermissionDenied
        }
        other => DeviceError::Unavailable(other.to_string()),
    }
}

fn play_error(err: PlayStreamError) -> DeviceError {
    match err {
        PlayStreamError::BackendSpecific { ref err } if is_permission(&err.description) => {
            DeviceError::PermissionDenied
        }
        other => DeviceError::Unavailable(other.to_string()),
    }
}

fn is_permission(description: &str) -> bool {
    let lowered = description.to_ascii_lowercase();
    lowered.contains("permission") || lowered.contains("denied")
}
