//! Build report models.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// One batch that failed terminally during a build.
#[derive(Debug, Clone, Serialize)]
pub struct FailedBatch {
    /// Zero-based position of the batch within this run.
    pub batch_index: usize,

    /// Ids of the chunks that were not embedded.
    pub chunk_ids: Vec<String>,

    pub error_kind: ErrorKind,

    /// Human-readable description of the last error.
    pub error: String,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    /// Chunks embedded and durably stored during this run.
    pub embedded_count: u64,

    /// Chunks skipped because a previous run already completed them.
    pub skipped_count: u64,

    /// Batches that failed terminally; their chunks stay eligible for the
    /// next run.
    pub failed_batches: Vec<FailedBatch>,

    pub duration_ms: u64,

    /// True when the run stopped early at a batch boundary on request.
    pub cancelled: bool,
}

impl BuildReport {
    /// Total chunks across all failed batches.
    pub fn failed_chunk_count(&self) -> u64 {
        self.failed_batches
            .iter()
            .map(|b| b.chunk_ids.len() as u64)
            .sum()
    }

    /// True when every pending chunk was embedded and nothing was cancelled.
    pub fn is_clean(&self) -> bool {
        self.failed_batches.is_empty() && !self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_report_counters() {
        let report = BuildReport {
            embedded_count: 16,
            skipped_count: 8,
            failed_batches: vec![FailedBatch {
                batch_index: 2,
                chunk_ids: vec!["a".into(), "b".into()],
                error_kind: ErrorKind::RetriesExhausted,
                error: "rate limited".into(),
            }],
            duration_ms: 1200,
            cancelled: false,
        };
        assert_eq!(report.failed_chunk_count(), 2);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_clean_report() {
        let report = BuildReport::default();
        assert!(report.is_clean());
    }
}
