//! Frame-by-frame sample comparison

use crate::align::{position_streams, SkipCounts};
use crate::drift::DriftTracker;
use crate::histogram::Histogram;
use crate::options::CompareOptions;
use crate::quantize::BitDepth;
use crate::sink::LogSink;
use crate::stream::{SampleStream, StereoFrame};
use crate::Result;
use serde::{Deserialize, Serialize};

/// One of the two compared streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// Why the comparison loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Termination {
    /// Both streams ended together
    Completed,
    /// One stream ended first; counted as a single difference
    LengthMismatch {
        longer: Side,
        frame: u64,
        remaining_seconds: f64,
    },
    /// The difference limit was exceeded at `frame` of A
    LimitExceeded { limit: u64, frame: u64 },
}

/// Result of a comparison run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Frames flagged as different (a stereo frame counts once)
    pub difference_count: u64,

    /// Magnitude histogram, present in histogram mode
    pub histogram: Option<Histogram>,

    /// Cursor of stream A when the loop stopped
    pub final_frame_a: u64,

    /// Cursor of stream B when the loop stopped
    pub final_frame_b: u64,

    pub termination: Termination,
}

impl ComparisonResult {
    pub fn is_identical(&self) -> bool {
        self.difference_count == 0
    }
}

/// Streams through two sources comparing quantized samples
pub struct SampleComparator<'a> {
    options: &'a CompareOptions,
}

impl<'a> SampleComparator<'a> {
    pub fn new(options: &'a CompareOptions) -> Self {
        Self { options }
    }

    /// Rewind both streams, discard the head skips, then compare to the end
    pub fn compare(
        &self,
        a: &mut dyn SampleStream,
        b: &mut dyn SampleStream,
        skips: SkipCounts,
        sink: &mut dyn LogSink,
    ) -> Result<ComparisonResult> {
        position_streams(a, b, skips)?;

        if a.bit_depth() != b.bit_depth() {
            warn(
                sink,
                &format!(
                    "WARNING: bit depths differ (A {}, B {}); comparing at {}",
                    a.bit_depth(),
                    b.bit_depth(),
                    a.bit_depth().lower(b.bit_depth())
                ),
            );
        }
        if a.sample_rate() != b.sample_rate() {
            warn(
                sink,
                &format!(
                    "WARNING: sample rates differ (A {} Hz, B {} Hz)",
                    a.sample_rate(),
                    b.sample_rate()
                ),
            );
        }

        let depth = a.bit_depth().lower(b.bit_depth());
        let quantum = depth.quantum();
        let tolerance = self.options.tolerance();
        let int_tolerance = (tolerance / quantum).floor() as i64;
        let limit = self.options.effective_limit();
        let channels = a.channels().max(b.channels());
        let sample_rate = a.sample_rate() as f64;

        let mut drift = DriftTracker::new(self.options.drift_tolerance_interval);
        let mut histogram = self.options.histogram.then(Histogram::new);
        let mut buf_a = vec![0.0; a.channels()];
        let mut buf_b = vec![0.0; b.channels()];
        let mut differences: u64 = 0;

        let termination = loop {
            let frame_a = a.current_frame();
            let frame_b = b.current_frame();
            let read_a = a.read_frames(&mut buf_a)?;
            let read_b = b.read_frames(&mut buf_b)?;

            if read_a == 0 && read_b == 0 {
                break Termination::Completed;
            }

            if read_a != read_b {
                differences += 1;
                let (shorter, longer, frame, remaining_seconds) = if read_a == 0 {
                    let left = b.num_frames().saturating_sub(frame_b);
                    (Side::A, Side::B, frame_a, left as f64 / b.sample_rate() as f64)
                } else {
                    let left = a.num_frames().saturating_sub(frame_a);
                    (Side::B, Side::A, frame_b, left as f64 / sample_rate)
                };
                sink.write_line(&format!(
                    "{} terminates early at frame {}; {} continues for {:.3} s",
                    shorter, frame, longer, remaining_seconds
                ));
                break Termination::LengthMismatch {
                    longer,
                    frame,
                    remaining_seconds,
                };
            }

            let fa = StereoFrame::from_interleaved(&buf_a);
            let fb = StereoFrame::from_interleaved(&buf_b);

            let mut drifts = [0i32; 2];
            let mut differs = false;
            for c in 0..channels {
                drifts[c] = drift.update(c, fa.0[c], fb.0[c]);
                let delta = fa.0[c] - fb.0[c] + quantum * drifts[c] as f64;
                if delta.abs() > tolerance {
                    differs = true;
                }
            }

            if !differs {
                continue;
            }

            differences += 1;

            match histogram.as_mut() {
                Some(histogram) => {
                    // Mono is recorded once, not per duplicated channel
                    for c in 0..channels {
                        let qa = depth.quantize(fa.0[c]) as i64;
                        let qb = depth.quantize(fb.0[c]) as i64;
                        let diff = (qa - qb).abs();
                        if diff > int_tolerance {
                            histogram.record(diff as u32);
                        }
                    }
                }
                None => sink.write_line(&format!(
                    "Difference at frame {} ({:.6} s): A={} B={} drift={}",
                    frame_a,
                    frame_a as f64 / sample_rate,
                    format_values(&fa, channels, a.bit_depth()),
                    format_values(&fb, channels, b.bit_depth()),
                    format_drift(&drifts[..channels]),
                )),
            }

            if let Some(limit) = limit {
                if differences > limit {
                    sink.write_line(&format!(
                        "Too many differences (more than {}); stopped at frame {}",
                        limit, frame_a
                    ));
                    break Termination::LimitExceeded {
                        limit,
                        frame: frame_a,
                    };
                }
            }
        };

        if let Some(histogram) = histogram.as_ref().filter(|_| differences > 0) {
            sink.write_line("Difference magnitude histogram:");
            for line in histogram.report_lines() {
                sink.write_line(&format!("  {}", line));
            }
        }

        let result = ComparisonResult {
            difference_count: differences,
            histogram,
            final_frame_a: a.current_frame(),
            final_frame_b: b.current_frame(),
            termination,
        };

        if result.is_identical() {
            sink.write_line("Files are identical");
        } else {
            sink.write_line(&format!("Files differ: {} difference(s)", differences));
        }
        log::info!(
            "Comparison finished: {} difference(s), {:?}",
            differences,
            result.termination
        );

        Ok(result)
    }
}

fn warn(sink: &mut dyn LogSink, line: &str) {
    log::warn!("{}", line);
    sink.write_line(line);
}

fn format_values(frame: &StereoFrame, channels: usize, depth: BitDepth) -> String {
    let values: Vec<String> = frame.0[..channels]
        .iter()
        .map(|&s| depth.quantize(s).to_string())
        .collect();
    format!("({})", values.join(", "))
}

fn format_drift(drifts: &[i32]) -> String {
    let values: Vec<String> = drifts.iter().map(|d| d.to_string()).collect();
    format!("({})", values.join(", "))
}
