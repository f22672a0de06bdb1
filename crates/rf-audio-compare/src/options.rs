//! Configuration for comparison runs
//!
//! Options are resolved once per invocation, either from an option string
//! (`"sigbits=16;autoalign=0.5;histo"`) or from a JSON file.

use crate::{CompareError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a comparison run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareOptions {
    /// Differences smaller than `1 / 2^significant_bits` are ignored
    pub significant_bits: u32,

    /// Window duration for auto alignment (seconds), `None` to skip
    pub auto_align_seconds: Option<f64>,

    /// Upper bound on audio consumed by the alignment search (seconds)
    pub align_max_seconds: Option<f64>,

    /// Stop after more than this many differences, `None` for unbounded
    pub difference_limit: Option<u64>,

    /// Summarize difference magnitudes instead of logging each one
    pub histogram: bool,

    /// Drift countdown interval in frames, 0 disables drift tracking
    pub drift_tolerance_interval: u32,

    /// Write `<B>-DELTA` next to input B
    pub write_diff: bool,

    /// Write `<B>-LRAUDITION` next to input B
    pub write_audition: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            significant_bits: 24,
            auto_align_seconds: None,
            align_max_seconds: Some(60.0),
            difference_limit: Some(100),
            histogram: false,
            drift_tolerance_interval: 0,
            write_diff: false,
            write_audition: false,
        }
    }
}

impl CompareOptions {
    /// Bit-exact comparison at 16 bits, report everything
    pub fn strict() -> Self {
        Self {
            significant_bits: 16,
            difference_limit: None,
            ..Default::default()
        }
    }

    /// Renderer regression runs: align, absorb drift, summarize
    pub fn render_regression() -> Self {
        Self {
            significant_bits: 16,
            auto_align_seconds: Some(0.5),
            drift_tolerance_interval: 1000,
            histogram: true,
            difference_limit: None,
            ..Default::default()
        }
    }

    /// Parse a `key=value;key=value` option string. Keys are case-insensitive.
    pub fn parse(text: &str) -> Result<Self> {
        let mut options = Self::default();

        for pair in text.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }

            let (key, value) = match pair.split_once('=') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (pair, None),
            };

            match key.to_ascii_lowercase().as_str() {
                "sigbits" => options.significant_bits = parse_number(key, value)?,
                "autoalign" => options.auto_align_seconds = Some(parse_number(key, value)?),
                "alignmax" => options.align_max_seconds = parse_optional(key, value)?,
                "limit" => options.difference_limit = parse_optional(key, value)?,
                "histo" | "histogram" => options.histogram = parse_bool(key, value)?,
                "ignoredriftunder" => options.drift_tolerance_interval = parse_number(key, value)?,
                "writediff" => options.write_diff = parse_bool(key, value)?,
                "writeaudition" => options.write_audition = parse_bool(key, value)?,
                _ => {
                    return Err(CompareError::Config(format!("unknown option '{}'", key)));
                }
            }
        }

        options.validate()?;
        Ok(options)
    }

    /// Load options from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let options: Self = serde_json::from_str(&text)
            .map_err(|e| CompareError::Config(format!("invalid JSON options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    fn validate(&self) -> Result<()> {
        if self.significant_bits == 0 || self.significant_bits > 32 {
            return Err(CompareError::Config(format!(
                "sigbits must be in 1..=32, got {}",
                self.significant_bits
            )));
        }
        if let Some(seconds) = self.auto_align_seconds {
            if !(seconds > 0.0 && seconds.is_finite()) {
                return Err(CompareError::Config(format!(
                    "autoalign must be a positive duration, got {}",
                    seconds
                )));
            }
        }
        if let Some(seconds) = self.align_max_seconds {
            if !(seconds > 0.0 && seconds.is_finite()) {
                return Err(CompareError::Config(format!(
                    "alignmax must be a positive duration or none, got {}",
                    seconds
                )));
            }
        }
        Ok(())
    }

    /// Normalized tolerance: `1 / 2^significant_bits`
    pub fn tolerance(&self) -> f64 {
        1.0 / (1u64 << self.significant_bits) as f64
    }

    /// Limit actually applied. Histogram mode always runs unbounded.
    pub fn effective_limit(&self) -> Option<u64> {
        if self.histogram {
            None
        } else {
            self.difference_limit
        }
    }

    /// Builder pattern: set significant bits
    pub fn with_significant_bits(mut self, bits: u32) -> Self {
        self.significant_bits = bits;
        self
    }

    /// Builder pattern: enable auto alignment
    pub fn with_auto_align(mut self, seconds: f64) -> Self {
        self.auto_align_seconds = Some(seconds);
        self
    }

    /// Builder pattern: set difference limit
    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.difference_limit = limit;
        self
    }

    /// Builder pattern: enable histogram mode
    pub fn with_histogram(mut self) -> Self {
        self.histogram = true;
        self
    }

    /// Builder pattern: set drift tolerance interval
    pub fn with_drift_interval(mut self, frames: u32) -> Self {
        self.drift_tolerance_interval = frames;
        self
    }

    /// Builder pattern: request derived artifacts
    pub fn with_artifacts(mut self, diff: bool, audition: bool) -> Self {
        self.write_diff = diff;
        self.write_audition = audition;
        self
    }
}

fn require<'a>(key: &str, value: Option<&'a str>) -> Result<&'a str> {
    value.ok_or_else(|| CompareError::Config(format!("option '{}' needs a value", key)))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: Option<&str>) -> Result<T> {
    let value = require(key, value)?;
    value
        .parse()
        .map_err(|_| CompareError::Config(format!("invalid value '{}' for '{}'", value, key)))
}

/// A number, or `none` for unbounded
fn parse_optional<T: std::str::FromStr>(key: &str, value: Option<&str>) -> Result<Option<T>> {
    let text = require(key, value)?;
    if text.eq_ignore_ascii_case("none") {
        Ok(None)
    } else {
        parse_number(key, Some(text)).map(Some)
    }
}

/// A bare key means true
fn parse_bool(key: &str, value: Option<&str>) -> Result<bool> {
    let Some(value) = value else {
        return Ok(true);
    };
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(CompareError::Config(format!(
            "invalid boolean '{}' for '{}'",
            value, key
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = CompareOptions::default();
        assert_eq!(options.significant_bits, 24);
        assert_eq!(options.effective_limit(), Some(100));
        assert!(options.auto_align_seconds.is_none());
    }

    #[test]
    fn test_parse_all_keys() {
        let options = CompareOptions::parse(
            "SigBits=16; autoalign=0.25; limit=5; ignoredriftunder=441; writediff=yes; WRITEAUDITION=1; alignmax=none",
        )
        .unwrap();

        assert_eq!(options.significant_bits, 16);
        assert_eq!(options.auto_align_seconds, Some(0.25));
        assert_eq!(options.difference_limit, Some(5));
        assert_eq!(options.drift_tolerance_interval, 441);
        assert!(options.write_diff);
        assert!(options.write_audition);
        assert_eq!(options.align_max_seconds, None);
    }

    #[test]
    fn test_histogram_forces_unbounded_limit() {
        let before = CompareOptions::parse("limit=5;histo=true").unwrap();
        let after = CompareOptions::parse("histogram;limit=5").unwrap();

        assert_eq!(before.effective_limit(), None);
        assert_eq!(after.effective_limit(), None);
        assert_eq!(after.difference_limit, Some(5));
    }

    #[test]
    fn test_limit_none() {
        let options = CompareOptions::parse("limit=NONE").unwrap();
        assert_eq!(options.effective_limit(), None);
    }

    #[test]
    fn test_unknown_key_is_error() {
        let err = CompareOptions::parse("sigbits=16;loudness=3").unwrap_err();
        assert!(matches!(err, CompareError::Config(_)));
    }

    #[test]
    fn test_bad_values_are_errors() {
        assert!(CompareOptions::parse("sigbits=abc").is_err());
        assert!(CompareOptions::parse("sigbits").is_err());
        assert!(CompareOptions::parse("histo=maybe").is_err());
        assert!(CompareOptions::parse("sigbits=0").is_err());
        assert!(CompareOptions::parse("autoalign=-1").is_err());
    }

    #[test]
    fn test_alignmax_must_be_positive() {
        assert!(CompareOptions::parse("alignmax=-5").is_err());
        assert!(CompareOptions::parse("alignmax=NaN").is_err());
        assert!(CompareOptions::parse("alignmax=0").is_err());
        assert!(CompareOptions::parse("alignmax=inf").is_err());
        assert_eq!(
            CompareOptions::parse("alignmax=30").unwrap().align_max_seconds,
            Some(30.0)
        );
    }

    #[test]
    fn test_json_rejects_negative_alignmax() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("options.json");
        std::fs::write(&path, r#"{ "align_max_seconds": -1.0 }"#).unwrap();

        let err = CompareOptions::from_json_file(&path).unwrap_err();
        assert!(matches!(err, CompareError::Config(_)));
    }

    #[test]
    fn test_tolerance() {
        let options = CompareOptions::default().with_significant_bits(16);
        assert_eq!(options.tolerance(), 1.0 / 65536.0);
    }

    #[test]
    fn test_json_roundtrip() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("options.json");
        let options = CompareOptions::render_regression();
        std::fs::write(&path, serde_json::to_string(&options).unwrap()).unwrap();

        assert_eq!(CompareOptions::from_json_file(&path).unwrap(), options);
    }

    #[test]
    fn test_json_partial_uses_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("options.json");
        std::fs::write(&path, r#"{ "significant_bits": 12 }"#).unwrap();

        let options = CompareOptions::from_json_file(&path).unwrap();
        assert_eq!(options.significant_bits, 12);
        assert_eq!(options.difference_limit, Some(100));
    }
}
