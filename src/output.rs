//! Report formatting for document runs.

use std::time::Duration;

use crate::cli::{OutputFormat, VerbosityLevel};
use crate::validator::{FileValidationResult, ValidationResults, ValidationStatus};

/// Formats results as text, JSON or a one-line summary
pub struct Output {
    format: OutputFormat,
    verbosity: VerbosityLevel,
    show_colors: bool,
}

impl Output {
    pub fn new(format: OutputFormat, verbosity: VerbosityLevel) -> Self {
        Self {
            format,
            verbosity,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    pub fn with_colors(mut self, show_colors: bool) -> Self {
        self.show_colors = show_colors;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    /// Render `results` in the configured format
    pub fn render(&self, results: &ValidationResults) -> serde_json::Result<String> {
        match self.format {
            OutputFormat::Human => Ok(self.format_results(results)),
            OutputFormat::Json => serde_json::to_string_pretty(results),
            OutputFormat::Summary => Ok(self.format_summary_line(results)),
        }
    }

    pub fn format_results(&self, results: &ValidationResults) -> String {
        let mut output = String::new();

        match self.verbosity {
            VerbosityLevel::Quiet => {
                for file_result in results.file_results.iter().filter(|r| !r.status.is_valid()) {
                    output.push_str(&self.format_file_result(file_result));
                    output.push('\n');
                }
            }
            VerbosityLevel::Normal | VerbosityLevel::Verbose => {
                for file_result in &results.file_results {
                    if self.verbosity == VerbosityLevel::Verbose || !file_result.status.is_valid() {
                        output.push_str(&self.format_file_result(file_result));
                        output.push('\n');
                    }
                }
                output.push_str(&self.format_summary(results));
            }
        }

        output
    }

    pub fn format_file_result(&self, result: &FileValidationResult) -> String {
        let path_display = result.path.display();
        let duration_str = format_duration(result.duration);

        match &result.status {
            ValidationStatus::Valid => {
                format!("{}  {} ({})", self.colorize("✓ VALID", "32"), path_display, duration_str)
            }
            ValidationStatus::Invalid { kind } => {
                let mut output = format!(
                    "{}  {} ({}) - {}",
                    self.colorize("✗ INVALID", "31"),
                    path_display,
                    duration_str,
                    kind
                );
                for error_detail in &result.error_details {
                    output.push_str(&format!("\n    {}", error_detail));
                }
                output
            }
            ValidationStatus::Error { message } => {
                format!(
                    "{}  {} ({}) - {}",
                    self.colorize("⚠ ERROR", "33"),
                    path_display,
                    duration_str,
                    message
                )
            }
        }
    }

    fn format_summary(&self, results: &ValidationResults) -> String {
        let mut output = String::new();
        output.push_str("Summary:\n");
        output.push_str(&format!("  Total files: {}\n", results.total_files));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Valid:", "32"),
            results.valid_files
        ));

        if results.invalid_files > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Invalid:", "31"),
                results.invalid_files
            ));
        }
        if results.error_files > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Errors:", "33"),
                results.error_files
            ));
        }

        output.push_str(&format!("  Success rate: {:.1}%\n", results.success_rate()));
        output.push_str(&format!(
            "  Duration: {}\n",
            format_duration(results.total_duration)
        ));

        if self.verbosity == VerbosityLevel::Verbose {
            output.push_str(&format!(
                "  Codecs built: {} (cache hits: {})\n",
                results.codec_stats.codecs_built, results.codec_stats.cache_hits
            ));
        }

        output
    }

    fn format_summary_line(&self, results: &ValidationResults) -> String {
        format!(
            "{} files: {} valid, {} invalid, {} errors ({})\n",
            results.total_files,
            results.valid_files,
            results.invalid_files,
            results.error_files,
            format_duration(results.total_duration)
        )
    }
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn create_test_results() -> ValidationResults {
        ValidationResults::aggregate(
            vec![
                FileValidationResult::valid(PathBuf::from("a.xml"), Duration::from_millis(3), None),
                FileValidationResult::invalid(
                    PathBuf::from("b.xml"),
                    &crate::error::CodecError::schema_mismatch("Duplicate element \"x\""),
                    Duration::from_millis(5),
                ),
            ],
            Duration::from_millis(100),
        )
    }

    #[test]
    fn test_human_output() {
        let output = Output::new(OutputFormat::Human, VerbosityLevel::Normal).with_colors(false);
        let formatted = output.render(&create_test_results()).unwrap();
        assert!(formatted.contains("Summary:"));
        assert!(formatted.contains("✗ INVALID  b.xml (5ms) - schema-mismatch"));
        assert!(formatted.contains("Duplicate element \"x\""));
        assert!(!formatted.contains("a.xml"));
        assert!(formatted.contains("Success rate: 50.0%"));
    }

    #[test]
    fn test_verbose_lists_valid_files() {
        let output = Output::new(OutputFormat::Human, VerbosityLevel::Verbose).with_colors(false);
        let formatted = output.render(&create_test_results()).unwrap();
        assert!(formatted.contains("✓ VALID  a.xml (3ms)"));
        assert!(formatted.contains("Codecs built"));
    }

    #[test]
    fn test_quiet_shows_failures_only() {
        let output = Output::new(OutputFormat::Human, VerbosityLevel::Quiet).with_colors(false);
        let formatted = output.render(&create_test_results()).unwrap();
        assert!(formatted.contains("b.xml"));
        assert!(!formatted.contains("Summary:"));
    }

    #[test]
    fn test_json_output() {
        let output = Output::new(OutputFormat::Json, VerbosityLevel::Normal);
        let json: serde_json::Value =
            serde_json::from_str(&output.render(&create_test_results()).unwrap()).unwrap();
        assert_eq!(json["total_files"], 2);
        assert_eq!(json["invalid_files"], 1);
        assert_eq!(json["file_results"][1]["status"]["Invalid"]["kind"], "schema-mismatch");
    }

    #[test]
    fn test_summary_line() {
        let output = Output::new(OutputFormat::Summary, VerbosityLevel::Normal);
        assert_eq!(
            output.render(&create_test_results()).unwrap(),
            "2 files: 1 valid, 1 invalid, 0 errors (100ms)\n"
        );
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30.0s");
    }
}
