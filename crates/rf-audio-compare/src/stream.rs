//! Streaming read/write contracts for PCM sample streams

use crate::quantize::BitDepth;
use crate::{CompareError, Result};

/// A finite, rewindable source of interleaved normalized samples
pub trait SampleStream {
    /// Number of channels (1 or 2)
    fn channels(&self) -> usize;

    /// Declared bit depth
    fn bit_depth(&self) -> BitDepth;

    /// Sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Index of the next frame to be read
    fn current_frame(&self) -> u64;

    /// Total frames in the stream
    fn num_frames(&self) -> u64;

    /// Read up to `buffer.len() / channels()` frames. Returns frames read, 0 at end.
    fn read_frames(&mut self, buffer: &mut [f64]) -> Result<usize>;

    /// Move the cursor back to the first frame
    fn rewind(&mut self) -> Result<()>;

    /// Duration in seconds
    fn duration(&self) -> f64 {
        self.num_frames() as f64 / self.sample_rate() as f64
    }
}

/// A destination for interleaved normalized samples
pub trait SampleSink {
    fn channels(&self) -> usize;

    /// Write whole interleaved frames
    fn write_frames(&mut self, samples: &[f64]) -> Result<()>;

    /// Flush and close out the container. Further writes are errors.
    fn finalize(&mut self) -> Result<()>;
}

/// One frame normalized to two channels
///
/// Mono frames are duplicated into both channels so every consumer can
/// process left/right uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StereoFrame(pub [f64; 2]);

impl StereoFrame {
    pub const SILENCE: Self = Self([0.0, 0.0]);

    /// Build from one interleaved frame of a mono or stereo stream
    pub fn from_interleaved(frame: &[f64]) -> Self {
        match frame {
            [mono] => Self([*mono, *mono]),
            [left, right, ..] => Self([*left, *right]),
            [] => Self::SILENCE,
        }
    }

    pub fn left(&self) -> f64 {
        self.0[0]
    }

    pub fn right(&self) -> f64 {
        self.0[1]
    }

    /// Average of both channels
    pub fn mix(&self) -> f64 {
        (self.0[0] + self.0[1]) * 0.5
    }
}

/// Discard `frames` frames through the ordinary read path.
///
/// Used only after the caller has established that the frames exist, so a
/// short read is an invariant violation.
pub fn skip_frames(stream: &mut dyn SampleStream, frames: u64) -> Result<()> {
    const CHUNK: usize = 4096;

    let channels = stream.channels();
    let mut buffer = vec![0.0; CHUNK * channels];
    let mut remaining = frames;

    while remaining > 0 {
        let want = remaining.min(CHUNK as u64) as usize;
        let read = stream.read_frames(&mut buffer[..want * channels])?;
        if read < want {
            return Err(CompareError::StreamInvariant(format!(
                "short read while skipping {} frames: stream ended at frame {}",
                frames,
                stream.current_frame()
            )));
        }
        remaining -= read as u64;
    }

    Ok(())
}

/// In-memory sample stream
#[derive(Debug, Clone)]
pub struct MemoryStream {
    samples: Vec<f64>,
    channels: usize,
    bit_depth: BitDepth,
    sample_rate: u32,
    cursor: usize,
}

impl MemoryStream {
    /// Create from interleaved samples. Trailing partial frames are dropped.
    pub fn new(samples: Vec<f64>, channels: usize, bit_depth: BitDepth, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let mut samples = samples;
        samples.truncate(samples.len() / channels * channels);
        Self {
            samples,
            channels,
            bit_depth,
            sample_rate,
            cursor: 0,
        }
    }

    /// Mono stream from fixed-point values
    pub fn from_fixed_mono(values: &[i32], bit_depth: BitDepth, sample_rate: u32) -> Self {
        let samples = values.iter().map(|&v| bit_depth.dequantize(v)).collect();
        Self::new(samples, 1, bit_depth, sample_rate)
    }

    /// Stereo stream from fixed-point `(left, right)` pairs
    pub fn from_fixed_stereo(values: &[(i32, i32)], bit_depth: BitDepth, sample_rate: u32) -> Self {
        let samples = values
            .iter()
            .flat_map(|&(l, r)| [bit_depth.dequantize(l), bit_depth.dequantize(r)])
            .collect();
        Self::new(samples, 2, bit_depth, sample_rate)
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }
}

impl SampleStream for MemoryStream {
    fn channels(&self) -> usize {
        self.channels
    }

    fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_frame(&self) -> u64 {
        (self.cursor / self.channels) as u64
    }

    fn num_frames(&self) -> u64 {
        (self.samples.len() / self.channels) as u64
    }

    fn read_frames(&mut self, buffer: &mut [f64]) -> Result<usize> {
        let available = self.samples.len() - self.cursor;
        let count = (buffer.len() / self.channels * self.channels).min(available);
        buffer[..count].copy_from_slice(&self.samples[self.cursor..self.cursor + count]);
        self.cursor += count;
        Ok(count / self.channels)
    }

    fn rewind(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }
}

/// In-memory sample sink
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub samples: Vec<f64>,
    channels: usize,
    finalized: bool,
}

impl MemorySink {
    pub fn new(channels: usize) -> Self {
        Self {
            samples: Vec::new(),
            channels,
            finalized: false,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Samples of one channel
    pub fn channel(&self, index: usize) -> Vec<f64> {
        self.samples
            .chunks_exact(self.channels)
            .map(|frame| frame[index])
            .collect()
    }
}

impl SampleSink for MemorySink {
    fn channels(&self) -> usize {
        self.channels
    }

    fn write_frames(&mut self, samples: &[f64]) -> Result<()> {
        if self.finalized {
            return Err(CompareError::StreamInvariant(
                "write after finalize".to_string(),
            ));
        }
        self.samples.extend_from_slice(samples);
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.finalized = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_frame_from_mono() {
        let frame = StereoFrame::from_interleaved(&[0.25]);
        assert_eq!(frame, StereoFrame([0.25, 0.25]));
        assert_eq!(frame.mix(), 0.25);
    }

    #[test]
    fn test_stereo_frame_from_stereo() {
        let frame = StereoFrame::from_interleaved(&[0.5, -0.5]);
        assert_eq!(frame.left(), 0.5);
        assert_eq!(frame.right(), -0.5);
        assert_eq!(frame.mix(), 0.0);
    }

    #[test]
    fn test_memory_stream_read_and_rewind() {
        let mut stream = MemoryStream::new(vec![0.1, 0.2, 0.3, 0.4, 0.5], 2, BitDepth::Bits16, 44100);
        assert_eq!(stream.num_frames(), 2);

        let mut buf = [0.0; 2];
        assert_eq!(stream.read_frames(&mut buf).unwrap(), 1);
        assert_eq!(buf, [0.1, 0.2]);
        assert_eq!(stream.current_frame(), 1);

        let mut big = [0.0; 8];
        assert_eq!(stream.read_frames(&mut big).unwrap(), 1);
        assert_eq!(stream.read_frames(&mut big).unwrap(), 0);

        stream.rewind().unwrap();
        assert_eq!(stream.current_frame(), 0);
    }

    #[test]
    fn test_skip_frames_short_read_is_invariant_violation() {
        let mut stream = MemoryStream::from_fixed_mono(&[1, 2, 3], BitDepth::Bits16, 44100);
        skip_frames(&mut stream, 2).unwrap();
        assert_eq!(stream.current_frame(), 2);

        stream.rewind().unwrap();
        let err = skip_frames(&mut stream, 4).unwrap_err();
        assert!(matches!(err, CompareError::StreamInvariant(_)));
    }

    #[test]
    fn test_memory_sink_rejects_write_after_finalize() {
        let mut sink = MemorySink::new(2);
        sink.write_frames(&[0.1, 0.2]).unwrap();
        sink.finalize().unwrap();
        assert!(sink.write_frames(&[0.0, 0.0]).is_err());
        assert_eq!(sink.channel(1), vec![0.2]);
    }
}
