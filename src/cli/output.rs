use std::fmt::Write as FmtWrite;

use console::style;

use crate::models::{BuildReport, OutputFormat};

pub trait Formatter {
    fn format_build_report(&self, report: &BuildReport) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub embedding_url: String,
    pub embedding_model: String,
    pub vector_store_url: String,
    pub vector_store_connected: bool,
    pub vector_store_points: u64,
    pub collection: String,
    pub ledger_path: Option<String>,
    pub ledger_completed: Option<u64>,
    pub ledger_failed: Option<u64>,
    pub build_in_progress: bool,
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_build_report(&self, report: &BuildReport) -> String {
        let mut output = String::new();

        if report.cancelled {
            writeln!(output, "{}", style("Build cancelled.").yellow()).unwrap();
        } else if report.failed_batches.is_empty() {
            writeln!(output, "{}", style("Build complete.").green()).unwrap();
        } else {
            writeln!(output, "{}", style("Build finished with failures.").red()).unwrap();
        }

        writeln!(output, "  Embedded: {} chunks", report.embedded_count).unwrap();
        writeln!(
            output,
            "  Skipped:  {} chunks (already in the knowledge base)",
            report.skipped_count
        )
        .unwrap();
        writeln!(output, "  Duration: {}ms", report.duration_ms).unwrap();

        if !report.failed_batches.is_empty() {
            writeln!(
                output,
                "  Failed:   {} chunks in {} batches",
                report.failed_chunk_count(),
                report.failed_batches.len()
            )
            .unwrap();
            for batch in &report.failed_batches {
                writeln!(
                    output,
                    "    batch {} [{}]: {}",
                    batch.batch_index + 1,
                    batch.error_kind,
                    batch.error
                )
                .unwrap();
                for chunk_id in &batch.chunk_ids {
                    writeln!(output, "      {}", chunk_id).unwrap();
                }
            }
            writeln!(
                output,
                "  Re-run the build to retry the failed chunks."
            )
            .unwrap();
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        writeln!(output, "Embedding:    {}", status.embedding_url).unwrap();
        writeln!(output, "  Model:      {}", status.embedding_model).unwrap();

        let store_status = if status.vector_store_connected {
            "[CONNECTED]"
        } else {
            "[UNREACHABLE]"
        };
        writeln!(
            output,
            "Vector store: {} {}",
            status.vector_store_url, store_status
        )
        .unwrap();
        writeln!(output, "  Collection: {}", status.collection).unwrap();
        if status.vector_store_connected {
            writeln!(output, "  Points:     {}", status.vector_store_points).unwrap();
        }

        if status.build_in_progress {
            writeln!(output, "Ledger:       [LOCKED] build in progress").unwrap();
        } else if let Some(ref path) = status.ledger_path {
            writeln!(output, "Ledger:       {}", path).unwrap();
            if let Some(completed) = status.ledger_completed {
                writeln!(output, "  Completed:  {} chunks", completed).unwrap();
            }
            if let Some(failed) = status.ledger_failed
                && failed > 0
            {
                writeln!(output, "  Failed:     {} chunks", failed).unwrap();
            }
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }

    fn format_error(&self, error: &str) -> String {
        format!("{} {}", style("Error:").red().bold(), error)
    }
}

pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render(&self, json: &serde_json::Value) -> String {
        if self.pretty {
            serde_json::to_string_pretty(json).unwrap()
        } else {
            serde_json::to_string(json).unwrap()
        }
    }
}

impl Formatter for JsonFormatter {
    fn format_build_report(&self, report: &BuildReport) -> String {
        let json = serde_json::to_value(report).unwrap();
        self.render(&json)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let json = serde_json::json!({
            "embedding": {
                "url": status.embedding_url,
                "model": status.embedding_model,
            },
            "vector_store": {
                "url": status.vector_store_url,
                "connected": status.vector_store_connected,
                "collection": status.collection,
                "points": status.vector_store_points,
            },
            "ledger": {
                "path": status.ledger_path,
                "completed": status.ledger_completed,
                "failed": status.ledger_failed,
                "build_in_progress": status.build_in_progress,
            }
        });
        self.render(&json)
    }

    fn format_message(&self, message: &str) -> String {
        self.render(&serde_json::json!({"message": message}))
    }

    fn format_error(&self, error: &str) -> String {
        self.render(&serde_json::json!({"error": error}))
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
    }
}
