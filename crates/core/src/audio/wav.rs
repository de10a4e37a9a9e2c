use std::{io::Read, path::Path};

use hound::{SampleFormat, WavReader};

use super::{SampleSource, SourceKind};
use crate::{Result, VisualiserError};

/// A WAV file decoded up front and mixed down to mono.
#[derive(Debug, Clone)]
pub struct WavSource {
    samples: Vec<f32>,
    sample_rate: u32,
    position: usize,
}

impl WavSource {
    /// Decodes the whole file. Nothing is kept if any sample is unreadable.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = WavReader::open(path)?;
        let source = Self::decode(reader)?;
        tracing::debug!(
            path = %path.display(),
            samples = source.samples.len(),
            sample_rate = source.sample_rate,
            seconds = source.duration_seconds(),
            "decoded wav file"
        );
        Ok(source)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::decode(WavReader::new(reader)?)
    }

    fn decode<R: Read>(reader: WavReader<R>) -> Result<Self> {
        let spec = reader.spec();
        let channels = usize::from(spec.channels.max(1));

        let interleaved = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()?,
            SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 * scale))
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };

        let samples: Vec<f32> = interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();

        if samples.is_empty() {
            return Err(VisualiserError::Decode("file contains no samples".into()));
        }

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate.max(1),
            position: 0,
        })
    }

    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl SampleSource for WavSource {
    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, out: &mut [f32]) -> usize {
        let remaining = &self.samples[self.position..];
        let count = out.len().min(remaining.len());
        out[..count].copy_from_slice(&remaining[..count]);
        self.position += count;
        count
    }

    fn is_finished(&self) -> bool {
        self.position >= self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use hound::{WavSpec, WavWriter};

    use super::*;

    fn fixture(name: &str, spec: WavSpec, write: impl FnOnce(&mut WavWriter<std::io::BufWriter<std::fs::File>>)) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "pulse-visualiser-{}-{name}.wav",
            std::process::id()
        ));
        let mut writer = WavWriter::create(&path, spec).unwrap();
        write(&mut writer);
        writer.finalize().unwrap();
        path
    }

    #[test]
    fn stereo_int_is_mixed_to_mono() {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let path = fixture("stereo", spec, |writer| {
            for _ in 0..100 {
                writer.write_sample(16_384i16).unwrap();
                writer.write_sample(0i16).unwrap();
            }
        });

        let mut source = WavSource::open(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(source.len(), 100);
        assert_eq!(source.sample_rate(), 8_000);
        assert_eq!(source.kind(), SourceKind::File);

        let mut out = vec![0.0; 64];
        assert_eq!(source.read(&mut out), 64);
        assert!(out.iter().all(|&s| (s - 0.25).abs() < 1e-6));
        assert_eq!(source.read(&mut out), 36);
        assert!(source.is_finished());
        assert_eq!(source.read(&mut out), 0);
    }

    #[test]
    fn float_samples_pass_through() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let path = fixture("float", spec, |writer| {
            for value in [0.5f32, -0.25, 1.0] {
                writer.write_sample(value).unwrap();
            }
        });

        let mut source = WavSource::open(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let mut out = vec![0.0; 3];
        source.read(&mut out);
        assert_eq!(out, vec![0.5, -0.25, 1.0]);
    }

    #[test]
    fn empty_file_is_a_decode_error() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let path = fixture("empty", spec, |_| {});
        let err = WavSource::open(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, VisualiserError::Decode(_)));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = WavSource::from_reader(&b"definitely not a riff header"[..]).unwrap_err();
        assert!(matches!(err, VisualiserError::Decode(_)));
    }
}
