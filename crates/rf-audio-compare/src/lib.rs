//! # rf-audio-compare
//!
//! Sample-accurate comparison of rendered audio streams.
//!
//! ## Features
//!
//! - **Auto Alignment**: FFT cross-correlation finds a frame offset between two renders
//! - **Bit-Depth Aware Tolerance**: differences below `1 / 2^sigbits` are ignored
//! - **Drift Compensation**: slow one-LSB drift is absorbed instead of reported
//! - **Histogram Mode**: log2-bucketed summary of difference magnitudes
//! - **Derived Artifacts**: difference file and L/R audition mix for listening
//!
//! ## Example
//!
//! ```rust,ignore
//! use rf_audio_compare::{Comparator, CompareOptions, LogFacadeSink};
//!
//! let options = CompareOptions::parse("sigbits=16;autoalign=0.5;histo=true")?;
//! let outcome = Comparator::new(options).compare_files("a.aif", "b.aif", &mut LogFacadeSink)?;
//!
//! if outcome.is_identical() {
//!     println!("Renders match");
//! }
//! ```

pub mod align;
pub mod compare;
pub mod comparator;
pub mod decoder;
pub mod delta;
pub mod drift;
pub mod encoder;
pub mod format;
pub mod histogram;
pub mod options;
pub mod quantize;
pub mod sink;
pub mod stream;

pub use align::{
    position_streams, AlignOutcome, AlignmentWindow, CorrelationPeak, SkipCounts, WindowAligner,
};
pub use compare::{ComparisonResult, SampleComparator, Side, Termination};
pub use comparator::{derived_path, write_artifact, CompareOutcome, Comparator};
pub use delta::{Combinator, DeltaWriter};
pub use drift::DriftTracker;
pub use format::{open_stream, ContainerFormat};
pub use histogram::Histogram;
pub use options::CompareOptions;
pub use quantize::BitDepth;
pub use sink::{CollectSink, LogFacadeSink, LogSink, NullSink};
pub use stream::{MemorySink, MemoryStream, SampleSink, SampleStream, StereoFrame};

use thiserror::Error;

/// Errors that can occur during comparison operations
#[derive(Error, Debug)]
pub enum CompareError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Failed to decode audio file: {0}")]
    Decode(String),

    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(u32),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("FFT error: {0}")]
    Fft(String),

    #[error("Stream invariant violated: {0}")]
    StreamInvariant(String),
}

pub type Result<T> = std::result::Result<T, CompareError>;

/// Compare two files with options given as an option string
pub fn compare_files(path_a: &str, path_b: &str, options: &str) -> Result<CompareOutcome> {
    let options = CompareOptions::parse(options)?;
    Comparator::new(options).compare_files(path_a, path_b, &mut NullSink)
}

/// Check if two files are identical under default options
pub fn files_identical(path_a: &str, path_b: &str) -> Result<bool> {
    Ok(compare_files(path_a, path_b, "")?.is_identical())
}
