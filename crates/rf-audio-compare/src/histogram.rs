//! Log2-bucketed histogram of difference magnitudes

use serde::{Deserialize, Serialize};

pub const NUM_BUCKETS: usize = 24;

/// Bucket `i` counts magnitudes whose bit length is `i`, i.e. the range
/// `[2^(i-1), 2^i - 1]`; bucket 0 holds only zero. Magnitudes wider than the
/// last bucket are folded into it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Histogram {
    buckets: [u64; NUM_BUCKETS],
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, magnitude: u32) {
        self.buckets[Self::bucket_of(magnitude)] += 1;
    }

    pub fn bucket_of(magnitude: u32) -> usize {
        let bit_length = (u32::BITS - magnitude.leading_zeros()) as usize;
        bit_length.min(NUM_BUCKETS - 1)
    }

    /// Inclusive value range covered by bucket `index`
    pub fn bucket_range(index: usize) -> (u64, u64) {
        if index == 0 {
            (0, 0)
        } else {
            (1u64 << (index - 1), (1u64 << index) - 1)
        }
    }

    pub fn buckets(&self) -> &[u64; NUM_BUCKETS] {
        &self.buckets
    }

    pub fn total(&self) -> u64 {
        self.buckets.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Compact report: trailing empty buckets trimmed, one
    /// `[lower..upper] count` line per non-empty bucket, low to high
    pub fn report_lines(&self) -> Vec<String> {
        let used = self
            .buckets
            .iter()
            .rposition(|&count| count > 0)
            .map_or(0, |last| last + 1);

        self.buckets[..used]
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(i, count)| {
                let (lower, upper) = Self::bucket_range(i);
                format!("[{}..{}] {}", lower, upper, count)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_of() {
        assert_eq!(Histogram::bucket_of(0), 0);
        assert_eq!(Histogram::bucket_of(1), 1);
        assert_eq!(Histogram::bucket_of(2), 2);
        assert_eq!(Histogram::bucket_of(3), 2);
        assert_eq!(Histogram::bucket_of(4), 3);
        assert_eq!(Histogram::bucket_of(255), 8);
        assert_eq!(Histogram::bucket_of(1 << 24), NUM_BUCKETS - 1);
    }

    #[test]
    fn test_bucket_range() {
        assert_eq!(Histogram::bucket_range(0), (0, 0));
        assert_eq!(Histogram::bucket_range(1), (1, 1));
        assert_eq!(Histogram::bucket_range(4), (8, 15));
    }

    #[test]
    fn test_report_lines() {
        let mut histogram = Histogram::new();
        histogram.record(1);
        histogram.record(5);
        histogram.record(6);
        histogram.record(100);

        assert_eq!(histogram.total(), 4);
        assert_eq!(
            histogram.report_lines(),
            vec!["[1..1] 1", "[4..7] 2", "[64..127] 1"]
        );
    }

    #[test]
    fn test_empty_report() {
        assert!(Histogram::new().report_lines().is_empty());
    }
}
