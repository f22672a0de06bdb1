//! FFT cross-correlation alignment
//!
//! Both streams are read in windows of `W` frames (a power of two). Each
//! window pair is collapsed to mono, correlated in the frequency domain, and
//! the lag with the largest correlation magnitude becomes the candidate
//! offset. A candidate is accepted only when the runner-up magnitude is
//! clearly smaller (significance ratio below [`SIGNIFICANCE_THRESHOLD`]).

use crate::sink::LogSink;
use crate::stream::{skip_frames, SampleStream};
use crate::{CompareError, Result};
use num_complex::Complex64;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Ratios at or above this are not distinct enough to trust
pub const SIGNIFICANCE_THRESHOLD: f64 = 0.99;

/// Frames to discard from the head of each stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    pub a: u64,
    pub b: u64,
}

impl SkipCounts {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Power-of-two analysis window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentWindow {
    frames: usize,
}

impl AlignmentWindow {
    /// `next_pow2(ceil(seconds * rate))`, at least one frame
    pub fn from_duration(seconds: f64, sample_rate: u32) -> Result<Self> {
        let wanted = (seconds * sample_rate as f64).ceil();
        let wanted = if wanted.is_finite() && wanted >= 1.0 {
            wanted as usize
        } else {
            1
        };
        let frames = wanted.checked_next_power_of_two().ok_or_else(|| {
            CompareError::Config(format!(
                "alignment window of {} s at {} Hz is too large",
                seconds, sample_rate
            ))
        })?;
        Ok(Self { frames })
    }

    pub fn frames(&self) -> usize {
        self.frames
    }
}

/// Location and distinctness of the correlation maximum
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationPeak {
    /// Lag in `[0, W)` with the largest magnitude
    pub index: usize,
    /// Second-largest magnitude divided by the largest
    pub significance: f64,
}

impl CorrelationPeak {
    pub fn is_distinct(&self) -> bool {
        self.significance < SIGNIFICANCE_THRESHOLD
    }

    /// Translate the peak lag into head skips
    pub fn skips(&self, window: usize) -> SkipCounts {
        if self.index == 0 {
            SkipCounts::none()
        } else if self.index < window / 2 {
            SkipCounts {
                a: 0,
                b: self.index as u64,
            }
        } else {
            SkipCounts {
                a: (window - self.index) as u64,
                b: 0,
            }
        }
    }
}

/// Outcome of an alignment search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AlignOutcome {
    /// A distinct peak was found
    Aligned {
        skips: SkipCounts,
        significance: f64,
        frames_analyzed: u64,
    },
    /// Search bound reached without a distinct peak
    NotDistinct {
        best_significance: Option<f64>,
        frames_analyzed: u64,
    },
    /// A stream ended before a distinct peak was found
    StreamExhausted {
        best_significance: Option<f64>,
        frames_analyzed: u64,
    },
}

impl AlignOutcome {
    /// Skips to apply; failures fall back to no skip
    pub fn skips(&self) -> SkipCounts {
        match self {
            Self::Aligned { skips, .. } => *skips,
            _ => SkipCounts::none(),
        }
    }

    pub fn is_aligned(&self) -> bool {
        matches!(self, Self::Aligned { .. })
    }

    pub fn frames_analyzed(&self) -> u64 {
        match self {
            Self::Aligned {
                frames_analyzed, ..
            }
            | Self::NotDistinct {
                frames_analyzed, ..
            }
            | Self::StreamExhausted {
                frames_analyzed, ..
            } => *frames_analyzed,
        }
    }
}

/// Circular cross-correlation of two equal-length windows via FFT
pub struct Correlator {
    len: usize,
    forward: Arc<dyn RealToComplex<f64>>,
    inverse: Arc<dyn ComplexToReal<f64>>,
    spectrum_a: Vec<Complex64>,
    spectrum_b: Vec<Complex64>,
    output: Vec<f64>,
}

impl Correlator {
    pub fn new(len: usize) -> Result<Self> {
        if !len.is_power_of_two() {
            return Err(CompareError::Config(format!(
                "correlation length must be power of 2, got {}",
                len
            )));
        }

        let mut planner = RealFftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);
        let spectrum_a = forward.make_output_vec();
        let spectrum_b = forward.make_output_vec();
        let output = inverse.make_output_vec();

        Ok(Self {
            len,
            forward,
            inverse,
            spectrum_a,
            spectrum_b,
            output,
        })
    }

    /// Correlate `a` against `b`. Both buffers are used as FFT scratch.
    ///
    /// Lag `k` measures how well `b[n + k]` matches `a[n]`, so a `b` that is
    /// `a` delayed by `N` frames peaks at `k = N`.
    pub fn correlate(&mut self, a: &mut [f64], b: &mut [f64]) -> Result<CorrelationPeak> {
        if a.len() != self.len || b.len() != self.len {
            return Err(CompareError::Fft(format!(
                "expected {} frames, got {} and {}",
                self.len,
                a.len(),
                b.len()
            )));
        }

        if self.len == 1 {
            return Ok(peak_of(&[a[0] * b[0]]));
        }

        self.forward
            .process(a, &mut self.spectrum_a)
            .map_err(|e| CompareError::Fft(e.to_string()))?;
        self.forward
            .process(b, &mut self.spectrum_b)
            .map_err(|e| CompareError::Fft(e.to_string()))?;

        for (sa, sb) in self.spectrum_a.iter_mut().zip(&self.spectrum_b) {
            *sa = sa.conj() * sb;
        }

        // DC and Nyquist bins of a real signal's spectrum are real
        let last = self.spectrum_a.len() - 1;
        self.spectrum_a[0].im = 0.0;
        self.spectrum_a[last].im = 0.0;

        self.inverse
            .process(&mut self.spectrum_a, &mut self.output)
            .map_err(|e| CompareError::Fft(e.to_string()))?;

        Ok(peak_of(&self.output))
    }
}

/// Largest magnitude and runner-up ratio
fn peak_of(correlation: &[f64]) -> CorrelationPeak {
    let mut first = (0usize, f64::NEG_INFINITY);
    let mut second = f64::NEG_INFINITY;

    for (i, value) in correlation.iter().enumerate() {
        let magnitude = value.abs();
        if magnitude > first.1 {
            second = first.1;
            first = (i, magnitude);
        } else if magnitude > second {
            second = magnitude;
        }
    }

    let second = second.max(0.0);
    let significance = if first.1 > 0.0 { second / first.1 } else { 1.0 };

    CorrelationPeak {
        index: first.0,
        significance,
    }
}

/// Estimates a frame-level offset between two streams
pub struct WindowAligner {
    window_seconds: f64,
    max_seconds: Option<f64>,
}

impl WindowAligner {
    /// `max_seconds` bounds the total duration consumed by the search
    pub fn new(window_seconds: f64, max_seconds: Option<f64>) -> Self {
        Self {
            window_seconds,
            max_seconds,
        }
    }

    /// Search for a distinct correlation peak, then position both streams.
    ///
    /// Whatever the outcome, both streams are rewound and fast-forwarded by
    /// the returned skips before this returns.
    pub fn align(
        &self,
        a: &mut dyn SampleStream,
        b: &mut dyn SampleStream,
        sink: &mut dyn LogSink,
    ) -> Result<AlignOutcome> {
        let outcome = self.search(a, b)?;
        position_streams(a, b, outcome.skips())?;
        report(&outcome, a.sample_rate(), sink);
        Ok(outcome)
    }

    /// Run the correlation search without repositioning the streams
    pub fn search(&self, a: &mut dyn SampleStream, b: &mut dyn SampleStream) -> Result<AlignOutcome> {
        let sample_rate = a.sample_rate();
        let window = AlignmentWindow::from_duration(self.window_seconds, sample_rate)?.frames();
        let max_frames = self
            .max_seconds
            .map(|secs| (secs.max(0.0) * sample_rate as f64).ceil() as u64);

        // The priming pass alone needs two windows from each stream
        let available = a.num_frames().min(b.num_frames());
        if (window as u64).saturating_mul(2) > available {
            log::debug!(
                "Alignment window of {} frames exceeds stream length {}",
                window,
                available
            );
            return Ok(AlignOutcome::StreamExhausted {
                best_significance: None,
                frames_analyzed: 0,
            });
        }

        let mut correlator = Correlator::new(window)?;
        let mut raw_a = vec![0.0; window * a.channels()];
        let mut raw_b = vec![0.0; window * b.channels()];
        let mut mono_a = vec![0.0; window];
        let mut mono_b = vec![0.0; window];

        let mut frames_consumed: u64 = 0;
        let mut best: Option<f64> = None;
        let mut iteration: u64 = 0;

        loop {
            // First pass primes by discarding one window
            let pass_frames = (if iteration == 0 { 2 * window } else { window }) as u64;
            if let Some(max) = max_frames {
                if frames_consumed + pass_frames > max {
                    log::debug!("Alignment search bound of {} frames reached", max);
                    return Ok(AlignOutcome::NotDistinct {
                        best_significance: best,
                        frames_analyzed: frames_consumed,
                    });
                }
            }

            let passes = if iteration == 0 { 2 } else { 1 };
            for _ in 0..passes {
                let read_a = a.read_frames(&mut raw_a)?;
                let read_b = b.read_frames(&mut raw_b)?;
                if read_a < window || read_b < window {
                    frames_consumed += read_a.min(read_b) as u64;
                    return Ok(AlignOutcome::StreamExhausted {
                        best_significance: best,
                        frames_analyzed: frames_consumed,
                    });
                }
                frames_consumed += window as u64;
            }
            iteration += 1;

            collapse_to_mono(&raw_a, a.channels(), &mut mono_a);
            collapse_to_mono(&raw_b, b.channels(), &mut mono_b);

            let peak = correlator.correlate(&mut mono_a, &mut mono_b)?;
            log::debug!(
                "Alignment window {}: peak at lag {}, significance {:.4}",
                iteration,
                peak.index,
                peak.significance
            );

            best = Some(best.map_or(peak.significance, |s| s.min(peak.significance)));

            if peak.is_distinct() {
                return Ok(AlignOutcome::Aligned {
                    skips: peak.skips(window),
                    significance: peak.significance,
                    frames_analyzed: frames_consumed,
                });
            }
        }
    }
}

/// Sum channels per frame
fn collapse_to_mono(interleaved: &[f64], channels: usize, mono: &mut [f64]) {
    if channels == 1 {
        mono.copy_from_slice(&interleaved[..mono.len()]);
        return;
    }
    for (out, frame) in mono.iter_mut().zip(interleaved.chunks_exact(channels)) {
        *out = frame.iter().sum();
    }
}

/// Rewind both streams to their origin, then discard the head skips
pub fn position_streams(
    a: &mut dyn SampleStream,
    b: &mut dyn SampleStream,
    skips: SkipCounts,
) -> Result<()> {
    a.rewind()?;
    b.rewind()?;
    skip_frames(b, skips.b)?;
    skip_frames(a, skips.a)?;
    Ok(())
}

fn report(outcome: &AlignOutcome, sample_rate: u32, sink: &mut dyn LogSink) {
    let frames = outcome.frames_analyzed();
    let seconds = frames as f64 / sample_rate as f64;

    match outcome {
        AlignOutcome::Aligned {
            skips,
            significance,
            ..
        } => {
            sink.write_line(&format!(
                "Auto-align: analyzed {} frames ({:.3} s), significance {:.4}",
                frames, seconds, significance
            ));
            let line = if skips.b > 0 {
                format!("Auto-align: skipping {} frames at start of B", skips.b)
            } else if skips.a > 0 {
                format!("Auto-align: skipping {} frames at start of A", skips.a)
            } else {
                "Auto-align: streams already aligned, no skip".to_string()
            };
            log::info!("{}", line);
            sink.write_line(&line);
        }
        AlignOutcome::NotDistinct {
            best_significance, ..
        }
        | AlignOutcome::StreamExhausted {
            best_significance, ..
        } => {
            let reason = if matches!(outcome, AlignOutcome::NotDistinct { .. }) {
                "search limit reached"
            } else {
                "end of stream reached"
            };
            let best = best_significance
                .map(|s| format!("{:.4}", s))
                .unwrap_or_else(|| "n/a".to_string());
            let line = format!(
                "WARNING: auto-align failed ({}) after {} frames ({:.3} s); best significance {}",
                reason, frames, seconds, best
            );
            log::warn!("{}", line);
            sink.write_line(&line);
        }
    }
}
