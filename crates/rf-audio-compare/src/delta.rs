//! Derived artifacts for listening: difference signal and L/R audition mix

use crate::align::{position_streams, SkipCounts};
use crate::stream::{SampleSink, SampleStream, StereoFrame};
use crate::Result;
use serde::{Deserialize, Serialize};

/// Per-frame combination of the two inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Combinator {
    /// `a - b` per channel
    Delta,
    /// A's mono mix on the left, B's mono mix on the right
    Audition,
}

impl Combinator {
    pub fn combine(self, a: StereoFrame, b: StereoFrame) -> StereoFrame {
        match self {
            Self::Delta => StereoFrame([a.left() - b.left(), a.right() - b.right()]),
            Self::Audition => StereoFrame([a.mix(), b.mix()]),
        }
    }

    /// Suffix appended to B's base name for the artifact
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Delta => "DELTA",
            Self::Audition => "LRAUDITION",
        }
    }

    /// Channels written for an input with `input_channels`
    pub fn output_channels(self, input_channels: usize) -> usize {
        match self {
            Self::Delta => input_channels,
            Self::Audition => 2,
        }
    }
}

/// Streams two inputs through a [`Combinator`] into a sink
pub struct DeltaWriter {
    combinator: Combinator,
}

impl DeltaWriter {
    pub fn new(combinator: Combinator) -> Self {
        Self { combinator }
    }

    /// Write combined frames until both inputs are exhausted.
    ///
    /// An exhausted input contributes silence. Returns frames written. The
    /// sink is finalized before returning.
    pub fn write(
        &self,
        a: &mut dyn SampleStream,
        b: &mut dyn SampleStream,
        skips: SkipCounts,
        sink: &mut dyn SampleSink,
    ) -> Result<u64> {
        position_streams(a, b, skips)?;

        let out_channels = sink.channels();
        let mut buf_a = vec![0.0; a.channels()];
        let mut buf_b = vec![0.0; b.channels()];
        let mut out = vec![0.0; out_channels];
        let mut frames: u64 = 0;

        loop {
            let read_a = a.read_frames(&mut buf_a)?;
            let read_b = b.read_frames(&mut buf_b)?;
            if read_a == 0 && read_b == 0 {
                break;
            }

            let fa = if read_a == 0 {
                StereoFrame::SILENCE
            } else {
                StereoFrame::from_interleaved(&buf_a)
            };
            let fb = if read_b == 0 {
                StereoFrame::SILENCE
            } else {
                StereoFrame::from_interleaved(&buf_b)
            };

            let y = self.combinator.combine(fa, fb);
            out.copy_from_slice(&y.0[..out_channels]);
            sink.write_frames(&out)?;
            frames += 1;
        }

        sink.finalize()?;
        log::debug!("{:?} writer produced {} frames", self.combinator, frames);
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantize::BitDepth;
    use crate::stream::{MemorySink, MemoryStream};

    #[test]
    fn test_delta_combine() {
        let y = Combinator::Delta.combine(StereoFrame([0.5, 0.25]), StereoFrame([0.25, 0.5]));
        assert_eq!(y, StereoFrame([0.25, -0.25]));
    }

    #[test]
    fn test_audition_combine() {
        let y = Combinator::Audition.combine(StereoFrame([0.5, 0.25]), StereoFrame([-0.5, -0.5]));
        assert_eq!(y, StereoFrame([0.375, -0.5]));
    }

    #[test]
    fn test_shorter_input_padded_with_silence() {
        let mut a = MemoryStream::from_fixed_mono(&[10, 20, 30, 40], BitDepth::Bits16, 1000);
        let mut b = MemoryStream::from_fixed_mono(&[1, 2], BitDepth::Bits16, 1000);
        let mut sink = MemorySink::new(1);

        let frames = DeltaWriter::new(Combinator::Delta)
            .write(&mut a, &mut b, SkipCounts::none(), &mut sink)
            .unwrap();

        assert_eq!(frames, 4);
        assert!(sink.is_finalized());
        let written: Vec<i32> = sink.samples.iter().map(|&s| BitDepth::Bits16.quantize(s)).collect();
        assert_eq!(written, vec![9, 18, 30, 40]);
    }

    #[test]
    fn test_audition_of_mono_inputs_is_stereo() {
        let mut a = MemoryStream::from_fixed_mono(&[100, 200], BitDepth::Bits16, 1000);
        let mut b = MemoryStream::from_fixed_mono(&[-5, -6, -7], BitDepth::Bits16, 1000);
        let mut sink = MemorySink::new(Combinator::Audition.output_channels(1));

        DeltaWriter::new(Combinator::Audition)
            .write(&mut a, &mut b, SkipCounts::none(), &mut sink)
            .unwrap();

        let left: Vec<i32> = sink.channel(0).iter().map(|&s| BitDepth::Bits16.quantize(s)).collect();
        let right: Vec<i32> = sink.channel(1).iter().map(|&s| BitDepth::Bits16.quantize(s)).collect();
        assert_eq!(left, vec![100, 200, 0]);
        assert_eq!(right, vec![-5, -6, -7]);
    }

    #[test]
    fn test_skips_applied_before_writing() {
        let mut a = MemoryStream::from_fixed_mono(&[1, 2, 3], BitDepth::Bits16, 1000);
        let mut b = MemoryStream::from_fixed_mono(&[0, 1, 2, 3], BitDepth::Bits16, 1000);
        let mut sink = MemorySink::new(1);

        DeltaWriter::new(Combinator::Delta)
            .write(&mut a, &mut b, SkipCounts { a: 0, b: 1 }, &mut sink)
            .unwrap();

        assert!(sink.samples.iter().all(|&s| s == 0.0));
        assert_eq!(sink.samples.len(), 3);
    }
}
