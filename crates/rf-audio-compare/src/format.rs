//! Container detection and stream construction

use crate::decoder::{decode_aiff, WavFileStream};
use crate::encoder::{AiffWriter, WavFileWriter};
use crate::quantize::BitDepth;
use crate::stream::{SampleSink, SampleStream};
use crate::{CompareError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Supported container formats, in detection order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerFormat {
    Aiff,
    Wav,
}

impl ContainerFormat {
    /// Detection order used by [`open_stream`]
    pub const DETECTION_ORDER: [ContainerFormat; 2] = [ContainerFormat::Aiff, ContainerFormat::Wav];

    /// Extension used for derived artifacts
    pub fn extension(self) -> &'static str {
        match self {
            Self::Aiff => "AIF",
            Self::Wav => "WAV",
        }
    }

    /// Check the 12-byte container preamble
    pub fn matches(self, header: &[u8]) -> bool {
        if header.len() < 12 {
            return false;
        }
        match self {
            Self::Aiff => &header[0..4] == b"FORM" && matches!(&header[8..12], b"AIFF" | b"AIFC"),
            Self::Wav => &header[0..4] == b"RIFF" && &header[8..12] == b"WAVE",
        }
    }

    /// Sniff the container of a file. `Ok(None)` if neither format matches.
    pub fn detect(path: &Path) -> Result<Option<Self>> {
        let mut header = [0u8; 12];
        let mut file = File::open(path)?;
        let mut filled = 0;
        while filled < header.len() {
            let n = file.read(&mut header[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        Ok(Self::DETECTION_ORDER
            .into_iter()
            .find(|format| format.matches(&header[..filled])))
    }

    fn open(self, path: &Path) -> Result<Box<dyn SampleStream>> {
        match self {
            Self::Aiff => Ok(Box::new(decode_aiff(path)?)),
            Self::Wav => Ok(Box::new(WavFileStream::open(path)?)),
        }
    }

    /// Create a writer for this container
    pub fn create_sink(
        self,
        path: &Path,
        channels: usize,
        bit_depth: BitDepth,
        sample_rate: u32,
    ) -> Result<Box<dyn SampleSink>> {
        match self {
            Self::Aiff => Ok(Box::new(AiffWriter::create(path, channels, bit_depth, sample_rate)?)),
            Self::Wav => Ok(Box::new(WavFileWriter::create(path, channels, bit_depth, sample_rate)?)),
        }
    }
}

impl std::fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aiff => write!(f, "AIFF"),
            Self::Wav => write!(f, "WAV"),
        }
    }
}

/// Open a file for streaming reads.
///
/// Returns `Ok(None)` when the file is missing, is not a recognized
/// container, or carries a sample format the engine does not handle.
/// Genuine I/O failures on a recognized file are errors.
pub fn open_stream<P: AsRef<Path>>(path: P) -> Result<Option<(ContainerFormat, Box<dyn SampleStream>)>> {
    let path = path.as_ref();

    if !path.is_file() {
        log::warn!("Input not found: {}", path.display());
        return Ok(None);
    }

    let Some(format) = ContainerFormat::detect(path)? else {
        log::warn!("Unrecognized container: {}", path.display());
        return Ok(None);
    };

    match format.open(path) {
        Ok(stream) => Ok(Some((format, stream))),
        Err(e @ (CompareError::UnsupportedBitDepth(_) | CompareError::Decode(_))) => {
            log::warn!("Cannot read {} as {}: {}", path.display(), format, e);
            Ok(None)
        }
        Err(CompareError::Wav(hound::Error::IoError(e))) => Err(CompareError::Io(e)),
        Err(CompareError::Wav(e)) => {
            log::warn!("Cannot read {} as {}: {}", path.display(), format, e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_matches_preamble() {
        assert!(ContainerFormat::Aiff.matches(b"FORM\0\0\0\x10AIFF"));
        assert!(ContainerFormat::Aiff.matches(b"FORM\0\0\0\x10AIFC"));
        assert!(ContainerFormat::Wav.matches(b"RIFF\0\0\0\x10WAVE"));
        assert!(!ContainerFormat::Wav.matches(b"RIFF\0\0"));
        assert!(!ContainerFormat::Aiff.matches(b"RIFF\0\0\0\x10WAVE"));
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = open_stream(temp_dir.path().join("nope.aif")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_unrecognized_file_is_not_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.txt");
        std::fs::write(&path, b"definitely not audio").unwrap();

        assert_eq!(ContainerFormat::detect(&path).unwrap(), None);
        assert!(open_stream(&path).unwrap().is_none());
    }

    #[test]
    fn test_float_wav_is_not_recognized() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("float.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.25f32).unwrap();
        writer.finalize().unwrap();

        assert!(open_stream(&path).unwrap().is_none());
    }

    #[test]
    fn test_wav_stream_reads_and_rewinds() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tone.wav");
        let mut sink = ContainerFormat::Wav
            .create_sink(&path, 2, BitDepth::Bits16, 48000)
            .unwrap();
        sink.write_frames(&[0.5, -0.5, 0.25, -0.25]).unwrap();
        sink.finalize().unwrap();

        let (format, mut stream) = open_stream(&path).unwrap().unwrap();
        assert_eq!(format, ContainerFormat::Wav);
        assert_eq!(stream.channels(), 2);
        assert_eq!(stream.bit_depth(), BitDepth::Bits16);
        assert_eq!(stream.sample_rate(), 48000);
        assert_eq!(stream.num_frames(), 2);

        let mut buf = [0.0; 4];
        assert_eq!(stream.read_frames(&mut buf).unwrap(), 2);
        assert_eq!(buf, [0.5, -0.5, 0.25, -0.25]);
        assert_eq!(stream.read_frames(&mut buf).unwrap(), 0);

        stream.rewind().unwrap();
        assert_eq!(stream.current_frame(), 0);
        assert_eq!(stream.read_frames(&mut buf[..2]).unwrap(), 1);
        assert_eq!(buf[..2], [0.5, -0.5]);
    }

    #[test]
    fn test_aiff_roundtrip_through_decoder() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tone.aif");
        let values = [0, 1, -1, 1000, -8388608, 8388607];
        {
            let mut sink = ContainerFormat::Aiff
                .create_sink(&path, 1, BitDepth::Bits24, 44100)
                .unwrap();
            let samples: Vec<f64> = values.iter().map(|&v| BitDepth::Bits24.dequantize(v)).collect();
            sink.write_frames(&samples).unwrap();
            sink.finalize().unwrap();
        }

        let (format, mut stream) = open_stream(&path).unwrap().unwrap();
        assert_eq!(format, ContainerFormat::Aiff);
        assert_eq!(stream.bit_depth(), BitDepth::Bits24);
        assert_eq!(stream.sample_rate(), 44100);
        assert_eq!(stream.num_frames(), values.len() as u64);

        let mut buf = vec![0.0; values.len()];
        stream.read_frames(&mut buf).unwrap();
        let decoded: Vec<i32> = buf.iter().map(|&s| BitDepth::Bits24.quantize(s)).collect();
        assert_eq!(decoded, values);
    }
}
