//! Tagged metric extraction from training logs.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use lt_types::{NamedMetricTag, TrialError, TuneError, TuneResult};
use regex::Regex;

/// Signed decimal with optional fraction and exponent.
const NUMBER_PATTERN: &str = r"([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)";

/// Metric values in the order they were requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedMetrics {
    values: Vec<(String, f64)>,
}

impl ExtractedMetrics {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn values(&self) -> Vec<f64> {
        self.values.iter().map(|(_, v)| *v).collect()
    }

    pub fn as_map(&self) -> HashMap<String, f64> {
        self.values.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Scans a log file for `<tag> [:|=] <number>` occurrences.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricExtractor;

impl MetricExtractor {
    /// Regex matching `tag` followed by an optional `:` or `=` and a number.
    pub fn pattern(tag: &str) -> TuneResult<Regex> {
        let source = format!(r"{}\s*[:=]?\s*{}", regex::escape(tag), NUMBER_PATTERN);
        Regex::new(&source)
            .map_err(|e| TuneError::Internal(format!("invalid pattern for tag '{tag}': {e}")))
    }

    /// Extract the first value of every tag. Fails with
    /// [`TrialError::MetricNotFound`] naming every tag that never appeared.
    pub fn extract<P: AsRef<Path>>(log_path: P, tags: &[NamedMetricTag]) -> TuneResult<ExtractedMetrics> {
        let path = log_path.as_ref();
        let patterns = tags
            .iter()
            .map(|t| Self::pattern(&t.metric.tag))
            .collect::<TuneResult<Vec<_>>>()?;

        let slots = Self::scan(path, &patterns);

        let missing: Vec<String> = tags
            .iter()
            .zip(&slots)
            .filter(|(_, slot)| slot.is_none())
            .map(|(t, _)| t.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(TrialError::MetricNotFound {
                tags: missing,
                path: path.display().to_string(),
            }
            .into());
        }

        let values: Vec<(String, f64)> = tags
            .iter()
            .zip(slots)
            .filter_map(|(t, slot)| slot.map(|v| (t.name.clone(), v)))
            .collect();
        tracing::info!("Extracted {:?} from {}", values, path.display());
        Ok(ExtractedMetrics { values })
    }

    /// One pass over the file. Any read failure discards everything found.
    fn scan(path: &Path, patterns: &[Regex]) -> Vec<Option<f64>> {
        let mut slots: Vec<Option<f64>> = vec![None; patterns.len()];

        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!("Cannot open log file {}: {}", path.display(), e);
                return slots;
            }
        };

        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Error reading log file {}: {}", path.display(), e);
                    return vec![None; patterns.len()];
                }
            }
            let line = String::from_utf8_lossy(&buf);

            for (slot, pattern) in slots.iter_mut().zip(patterns) {
                if slot.is_some() {
                    continue;
                }
                if let Some(value) = pattern
                    .captures(&line)
                    .and_then(|c| c.get(1))
                    .and_then(|m| m.as_str().parse::<f64>().ok())
                {
                    *slot = Some(value);
                }
            }

            if slots.iter().all(Option::is_some) {
                break;
            }
        }

        slots
    }
}
