//! Container writers
//!
//! - AIFF (native): big-endian PCM, header patched on finalize
//! - WAV (via hound)

use crate::quantize::BitDepth;
use crate::stream::SampleSink;
use crate::{CompareError, Result};

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

// ═══════════════════════════════════════════════════════════════════════════════
// AIFF WRITER
// ═══════════════════════════════════════════════════════════════════════════════

/// Byte offsets of the header fields patched on finalize
const FORM_SIZE_OFFSET: u64 = 4;
const COMM_FRAMES_OFFSET: u64 = 22;
const SSND_SIZE_OFFSET: u64 = 42;
/// COMM chunk body is always 18 bytes
const COMM_CHUNK_SIZE: u32 = 18;

/// Streaming AIFF writer
pub struct AiffWriter {
    file: Option<BufWriter<File>>,
    channels: usize,
    bit_depth: BitDepth,
    frames_written: u64,
}

impl AiffWriter {
    pub fn create(path: &Path, channels: usize, bit_depth: BitDepth, sample_rate: u32) -> Result<Self> {
        let mut file = BufWriter::new(File::create(path)?);

        file.write_all(b"FORM")?;
        file.write_all(&0u32.to_be_bytes())?;
        file.write_all(b"AIFF")?;

        file.write_all(b"COMM")?;
        file.write_all(&COMM_CHUNK_SIZE.to_be_bytes())?;
        file.write_all(&(channels as u16).to_be_bytes())?;
        file.write_all(&0u32.to_be_bytes())?; // numSampleFrames, patched
        file.write_all(&(bit_depth.bits() as u16).to_be_bytes())?;
        file.write_all(&f64_to_extended(sample_rate as f64))?;

        file.write_all(b"SSND")?;
        file.write_all(&0u32.to_be_bytes())?; // chunk size, patched
        file.write_all(&0u32.to_be_bytes())?; // offset
        file.write_all(&0u32.to_be_bytes())?; // blockSize

        Ok(Self {
            file: Some(file),
            channels,
            bit_depth,
            frames_written: 0,
        })
    }

    fn finish(&mut self) -> Result<()> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };

        let data_size = self.frames_written * (self.channels * self.bit_depth.bytes()) as u64;
        let pad = data_size % 2;
        if pad != 0 {
            file.write_all(&[0])?;
        }

        let ssnd_size = 8 + data_size;
        let form_size = 4 + 8 + COMM_CHUNK_SIZE as u64 + 8 + ssnd_size + pad;
        if form_size > u32::MAX as u64 {
            return Err(CompareError::Config(format!(
                "AIFF output too large: {} bytes",
                form_size
            )));
        }

        file.seek(SeekFrom::Start(FORM_SIZE_OFFSET))?;
        file.write_all(&(form_size as u32).to_be_bytes())?;
        file.seek(SeekFrom::Start(COMM_FRAMES_OFFSET))?;
        file.write_all(&(self.frames_written as u32).to_be_bytes())?;
        file.seek(SeekFrom::Start(SSND_SIZE_OFFSET))?;
        file.write_all(&(ssnd_size as u32).to_be_bytes())?;
        file.flush()?;
        Ok(())
    }
}

impl SampleSink for AiffWriter {
    fn channels(&self) -> usize {
        self.channels
    }

    fn write_frames(&mut self, samples: &[f64]) -> Result<()> {
        let bit_depth = self.bit_depth;
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| CompareError::StreamInvariant("write after finalize".to_string()))?;

        for &sample in samples {
            let value = bit_depth.quantize(sample);
            match bit_depth {
                BitDepth::Bits8 => file.write_all(&(value as i8).to_be_bytes())?,
                BitDepth::Bits16 => file.write_all(&(value as i16).to_be_bytes())?,
                // Only 3 bytes (big-endian, MSB first)
                BitDepth::Bits24 => file.write_all(&value.to_be_bytes()[1..4])?,
            }
        }

        self.frames_written += (samples.len() / self.channels) as u64;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.finish()
    }
}

impl Drop for AiffWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::warn!("Failed to finalize AIFF output: {}", e);
        }
    }
}

/// Convert f64 to 80-bit extended precision (IEEE 754)
/// Used for sample rate in AIFF COMM chunk
fn f64_to_extended(value: f64) -> [u8; 10] {
    let mut result = [0u8; 10];

    if value == 0.0 {
        return result;
    }

    let bits = value.to_bits();
    let sign = ((bits >> 63) & 1) as u16;
    let exp = ((bits >> 52) & 0x7FF) as i32;
    let mantissa = bits & 0xFFFFFFFFFFFFF;

    let extended_exp = if exp == 0 {
        0
    } else {
        (exp - 1023 + 16383) as u16
    };
    let extended_exp_with_sign = (sign << 15) | extended_exp;

    // Explicit integer bit, then the 52 fraction bits left-aligned
    let extended_mantissa = if exp != 0 {
        0x8000000000000000u64 | (mantissa << 11)
    } else {
        mantissa << 12
    };

    result[0..2].copy_from_slice(&extended_exp_with_sign.to_be_bytes());
    result[2..10].copy_from_slice(&extended_mantissa.to_be_bytes());
    result
}

// ═══════════════════════════════════════════════════════════════════════════════
// WAV WRITER
// ═══════════════════════════════════════════════════════════════════════════════

/// WAV writer using hound
pub struct WavFileWriter {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    channels: usize,
    bit_depth: BitDepth,
}

impl WavFileWriter {
    pub fn create(path: &Path, channels: usize, bit_depth: BitDepth, sample_rate: u32) -> Result<Self> {
        let spec = hound::WavSpec {
            channels: channels as u16,
            sample_rate,
            bits_per_sample: bit_depth.bits() as u16,
            sample_format: hound::SampleFormat::Int,
        };

        Ok(Self {
            writer: Some(hound::WavWriter::create(path, spec)?),
            channels,
            bit_depth,
        })
    }
}

impl SampleSink for WavFileWriter {
    fn channels(&self) -> usize {
        self.channels
    }

    fn write_frames(&mut self, samples: &[f64]) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| CompareError::StreamInvariant("write after finalize".to_string()))?;

        for &sample in samples {
            writer.write_sample(self.bit_depth.quantize(sample))?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extended_44100() {
        // 44100 Hz as 80-bit extended: 0x400E AC44 0000 0000 0000
        assert_eq!(
            f64_to_extended(44100.0),
            [0x40, 0x0E, 0xAC, 0x44, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_aiff_header_sizes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.aif");

        let mut writer = AiffWriter::create(&path, 1, BitDepth::Bits8, 22050).unwrap();
        writer.write_frames(&[0.0, 0.5, -0.5]).unwrap();
        writer.finalize().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        // 54 header bytes, 3 data bytes, 1 pad byte
        assert_eq!(bytes.len(), 58);
        assert_eq!(&bytes[0..4], b"FORM");
        assert_eq!(u32::from_be_bytes(bytes[4..8].try_into().unwrap()), 50);
        assert_eq!(u32::from_be_bytes(bytes[22..26].try_into().unwrap()), 3);
        assert_eq!(u32::from_be_bytes(bytes[42..46].try_into().unwrap()), 11);
        assert_eq!(&bytes[54..57], &[0u8, 64, 192]);
    }

    #[test]
    fn test_wav_writer_finalize_twice_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.wav");

        let mut writer = WavFileWriter::create(&path, 2, BitDepth::Bits16, 44100).unwrap();
        writer.write_frames(&[0.5, -0.5]).unwrap();
        writer.finalize().unwrap();
        writer.finalize().unwrap();
        assert!(writer.write_frames(&[0.0, 0.0]).is_err());

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.duration(), 1);
    }
}
