//! Comparison orchestration: open, align, compare, write artifacts

use crate::align::{AlignOutcome, SkipCounts, WindowAligner};
use crate::compare::{ComparisonResult, SampleComparator};
use crate::delta::{Combinator, DeltaWriter};
use crate::format::{open_stream, ContainerFormat};
use crate::options::CompareOptions;
use crate::sink::LogSink;
use crate::stream::SampleStream;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Result of a comparison run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompareOutcome {
    /// An input was missing or not a readable container
    NothingToCompare { path: PathBuf },

    /// Channel counts differ; no comparison was done
    ChannelMismatch { channels_a: usize, channels_b: usize },

    /// Streams were compared
    Compared {
        alignment: Option<AlignOutcome>,
        result: ComparisonResult,
        artifacts: Vec<PathBuf>,
    },
}

impl CompareOutcome {
    pub fn is_identical(&self) -> bool {
        matches!(self, Self::Compared { result, .. } if result.is_identical())
    }

    pub fn result(&self) -> Option<&ComparisonResult> {
        match self {
            Self::Compared { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Skips that were applied (zero when not aligned)
    pub fn skips(&self) -> SkipCounts {
        match self {
            Self::Compared {
                alignment: Some(alignment),
                ..
            } => alignment.skips(),
            _ => SkipCounts::none(),
        }
    }

    pub fn artifacts(&self) -> &[PathBuf] {
        match self {
            Self::Compared { artifacts, .. } => artifacts,
            _ => &[],
        }
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        match self {
            Self::NothingToCompare { path } => {
                format!("NOT COMPARED: cannot read {}", path.display())
            }
            Self::ChannelMismatch {
                channels_a,
                channels_b,
            } => format!(
                "NOT COMPARED: channel counts differ (A {}, B {})",
                channels_a, channels_b
            ),
            Self::Compared { result, .. } if result.is_identical() => "IDENTICAL".to_string(),
            Self::Compared { result, .. } => {
                format!("DIFFERS: {} difference(s)", result.difference_count)
            }
        }
    }
}

/// Wires alignment, comparison and artifact writing together
#[derive(Debug, Clone, Default)]
pub struct Comparator {
    options: CompareOptions,
}

impl Comparator {
    pub fn new(options: CompareOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompareOptions {
        &self.options
    }

    /// Compare two files and write any requested artifacts
    pub fn compare_files<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        path_a: P,
        path_b: Q,
        sink: &mut dyn LogSink,
    ) -> Result<CompareOutcome> {
        let path_a = path_a.as_ref();
        let path_b = path_b.as_ref();

        let outcome = {
            let Some((_, mut a)) = open_stream(path_a)? else {
                return Ok(nothing_to_compare(path_a, sink));
            };
            let Some((_, mut b)) = open_stream(path_b)? else {
                return Ok(nothing_to_compare(path_b, sink));
            };
            self.compare_streams(a.as_mut(), b.as_mut(), sink)?
        };

        let (alignment, result, mut artifacts) = match outcome {
            CompareOutcome::Compared {
                alignment,
                result,
                artifacts,
            } => (alignment, result, artifacts),
            other => return Ok(other),
        };

        let skips = alignment.map(|o| o.skips()).unwrap_or_default();
        let requested = [
            (self.options.write_diff, Combinator::Delta),
            (self.options.write_audition, Combinator::Audition),
        ];
        for (_, combinator) in requested.into_iter().filter(|(wanted, _)| *wanted) {
            if let Some(path) = write_artifact(path_a, path_b, skips, combinator)? {
                sink.write_line(&format!("Wrote {}", path.display()));
                artifacts.push(path);
            }
        }

        Ok(CompareOutcome::Compared {
            alignment,
            result,
            artifacts,
        })
    }

    /// Align (if configured) and compare two open streams
    pub fn compare_streams(
        &self,
        a: &mut dyn SampleStream,
        b: &mut dyn SampleStream,
        sink: &mut dyn LogSink,
    ) -> Result<CompareOutcome> {
        if a.channels() != b.channels() {
            let line = format!(
                "Cannot compare: A has {} channel(s), B has {}",
                a.channels(),
                b.channels()
            );
            log::warn!("{}", line);
            sink.write_line(&line);
            return Ok(CompareOutcome::ChannelMismatch {
                channels_a: a.channels(),
                channels_b: b.channels(),
            });
        }

        let alignment = match self.options.auto_align_seconds {
            Some(seconds) => {
                let aligner = WindowAligner::new(seconds, self.options.align_max_seconds);
                Some(aligner.align(a, b, sink)?)
            }
            None => None,
        };
        let skips = alignment.map(|o| o.skips()).unwrap_or_default();

        let result = SampleComparator::new(&self.options).compare(a, b, skips, sink)?;

        Ok(CompareOutcome::Compared {
            alignment,
            result,
            artifacts: Vec::new(),
        })
    }
}

fn nothing_to_compare(path: &Path, sink: &mut dyn LogSink) -> CompareOutcome {
    sink.write_line(&format!(
        "Cannot open {}: missing or unrecognized format; nothing to compare",
        path.display()
    ));
    CompareOutcome::NothingToCompare {
        path: path.to_path_buf(),
    }
}

/// `<dir of B>/<stem of B>-<SUFFIX>.<EXT>`, extension from A's container
pub fn derived_path(path_b: &Path, combinator: Combinator, format: ContainerFormat) -> PathBuf {
    let stem = path_b
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!("{}-{}.{}", stem, combinator.suffix(), format.extension());
    path_b.with_file_name(name)
}

/// Reopen both inputs and write one artifact. Missing inputs produce nothing.
pub fn write_artifact(
    path_a: &Path,
    path_b: &Path,
    skips: SkipCounts,
    combinator: Combinator,
) -> Result<Option<PathBuf>> {
    let Some((format, mut a)) = open_stream(path_a)? else {
        return Ok(None);
    };
    let Some((_, mut b)) = open_stream(path_b)? else {
        return Ok(None);
    };

    let path = derived_path(path_b, combinator, format);
    let mut sink = format.create_sink(
        &path,
        combinator.output_channels(a.channels()),
        a.bit_depth(),
        a.sample_rate(),
    )?;

    DeltaWriter::new(combinator).write(a.as_mut(), b.as_mut(), skips, sink.as_mut())?;
    log::info!("Wrote {}", path.display());
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::Termination;
    use crate::quantize::BitDepth;
    use crate::sink::CollectSink;
    use crate::stream::MemoryStream;

    #[test]
    fn test_derived_path() {
        let path = derived_path(
            Path::new("/renders/take2.aif"),
            Combinator::Delta,
            ContainerFormat::Aiff,
        );
        assert_eq!(path, PathBuf::from("/renders/take2-DELTA.AIF"));

        let path = derived_path(
            Path::new("take2.wav"),
            Combinator::Audition,
            ContainerFormat::Wav,
        );
        assert_eq!(path, PathBuf::from("take2-LRAUDITION.WAV"));
    }

    #[test]
    fn test_channel_mismatch_aborts() {
        let mut a = MemoryStream::from_fixed_mono(&[1, 2, 3], BitDepth::Bits16, 1000);
        let mut b = MemoryStream::from_fixed_stereo(&[(1, 1), (2, 2)], BitDepth::Bits16, 1000);
        let mut sink = CollectSink::new();

        let outcome = Comparator::default()
            .compare_streams(&mut a, &mut b, &mut sink)
            .unwrap();

        assert_eq!(
            outcome,
            CompareOutcome::ChannelMismatch {
                channels_a: 1,
                channels_b: 2
            }
        );
        assert_eq!(a.current_frame(), 0);
        assert!(!outcome.is_identical());
        assert!(sink.contains("Cannot compare"));
    }

    #[test]
    fn test_missing_input_is_nothing_to_compare() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let a = temp_dir.path().join("a.aif");
        let b = temp_dir.path().join("b.aif");
        let mut sink = CollectSink::new();

        let outcome = Comparator::default().compare_files(&a, &b, &mut sink).unwrap();

        assert_eq!(outcome, CompareOutcome::NothingToCompare { path: a });
        assert_eq!(outcome.skips(), SkipCounts::none());
        assert!(sink.contains("nothing to compare"));
    }

    #[test]
    fn test_huge_align_window_is_rejected() {
        let mut a = MemoryStream::from_fixed_mono(&[1, 2, 3], BitDepth::Bits16, 44100);
        let mut b = a.clone();
        let options = CompareOptions::parse("autoalign=1e20").unwrap();

        let err = Comparator::new(options)
            .compare_streams(&mut a, &mut b, &mut CollectSink::new())
            .unwrap_err();

        assert!(matches!(err, crate::CompareError::Config(_)));
    }

    #[test]
    fn test_compare_streams_without_alignment() {
        let values: Vec<i32> = (0..64).collect();
        let mut a = MemoryStream::from_fixed_mono(&values, BitDepth::Bits16, 1000);
        let mut b = a.clone();

        let outcome = Comparator::new(CompareOptions::strict())
            .compare_streams(&mut a, &mut b, &mut CollectSink::new())
            .unwrap();

        assert!(outcome.is_identical());
        assert_eq!(outcome.summary(), "IDENTICAL");
        assert_eq!(outcome.result().unwrap().termination, Termination::Completed);
    }
}
