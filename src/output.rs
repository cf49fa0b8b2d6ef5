//! Output and reporting for batch validation results.

use std::fmt::Write as _;
use std::time::Duration;

use crate::cli::VerbosityLevel;
use crate::config::OutputFormatConfig;
use crate::report::{Section, Severity};
use crate::validator::{
    FileValidationResult, PerformanceMetrics, ValidationResults, ValidationStatus,
};

/// Formats [`ValidationResults`] for the terminal or for machines
pub struct Output {
    verbosity: VerbosityLevel,
    format: OutputFormatConfig,
    show_colors: bool,
}

impl Output {
    pub fn new(verbosity: VerbosityLevel, format: OutputFormatConfig) -> Self {
        Self {
            verbosity,
            format,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    pub fn without_colors(mut self) -> Self {
        self.show_colors = false;
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
            OutputFormatConfig::Json => serde_json::to_string_pretty(results),
            OutputFormatConfig::Summary => Ok(self.format_one_line(results)),
            OutputFormatConfig::Human => Ok(self.format_results(results)),
        }
    }

    pub fn format_results(&self, results: &ValidationResults) -> String {
        let mut output = String::new();

        if self.verbosity == VerbosityLevel::Quiet {
            if results.has_errors() {
                let _ = writeln!(
                    output,
                    "Errors: {} Invalid: {}",
                    results.error_files, results.invalid_files
                );
            }
            return output;
        }

        for file_result in &results.file_results {
            if self.verbosity == VerbosityLevel::Verbose || !file_result.status.is_valid() {
                output.push_str(&self.format_file_result(file_result));
                output.push('\n');
            }
        }

        output.push_str(&self.format_summary(results));
        output
    }

    pub fn format_file_result(&self, result: &FileValidationResult) -> String {
        let path_display = result.path.display();
        let duration_str = format_duration(result.duration);
        let declaration = result
            .declaration
            .as_deref()
            .map(|d| format!(" [{}]", d))
            .unwrap_or_default();

        let mut output = match &result.status {
            ValidationStatus::Valid => format!(
                "{}  {}{} ({})",
                self.colorize("✓ VALID", "32"),
                path_display,
                declaration,
                duration_str
            ),
            ValidationStatus::Invalid { error_count } => format!(
                "{}  {}{} ({}) - {} error{}",
                self.colorize("✗ INVALID", "31"),
                path_display,
                declaration,
                duration_str,
                error_count,
                if *error_count == 1 { "" } else { "s" }
            ),
            ValidationStatus::Error { message } => format!(
                "{}  {} ({}) - {}",
                self.colorize("⚠ ERROR", "33"),
                path_display,
                duration_str,
                message
            ),
            ValidationStatus::Skipped { reason } => format!(
                "{}  {} ({}) - {}",
                self.colorize("- SKIPPED", "36"),
                path_display,
                duration_str,
                reason
            ),
        };

        match (&result.report, self.verbosity) {
            (Some(report), VerbosityLevel::Verbose) => {
                for section in &report.sections {
                    self.format_section(&mut output, section, 1);
                }
            }
            (Some(_), _) => {
                for detail in &result.error_details {
                    let _ = write!(output, "\n    {}", detail);
                }
            }
            _ => {}
        }

        output
    }

    fn format_section(&self, output: &mut String, section: &Section, depth: usize) {
        let indent = "  ".repeat(depth * 2);
        let title = section.title.as_deref().unwrap_or("(untitled)");
        let _ = write!(output, "\n{}{} [{}]", indent, title, section.flag());

        for assertion in &section.assertions {
            let severity = match assertion.severity {
                Severity::Ok => self.colorize("OK", "32"),
                Severity::Warning => self.colorize("WARNING", "33"),
                Severity::Error | Severity::Fatal => {
                    self.colorize(&assertion.severity.to_string(), "31")
                }
            };
            let _ = write!(
                output,
                "\n{}  {} {}: {}",
                indent, severity, assertion.identifier, assertion.message
            );
            if let Some(location) = &assertion.location {
                let _ = write!(output, " (at {})", location);
            }
        }

        for nested in &section.sections {
            self.format_section(output, nested, depth + 1);
        }
    }

    fn format_summary(&self, results: &ValidationResults) -> String {
        let mut output = String::new();
        output.push_str("Validation Summary:\n");
        let _ = writeln!(output, "  Total files: {}", results.total_files);
        let _ = writeln!(
            output,
            "  {} {}",
            self.colorize("Valid:", "32"),
            results.valid_files
        );

        for (label, count, color) in [
            ("Invalid:", results.invalid_files, "31"),
            ("Errors:", results.error_files, "33"),
            ("Skipped:", results.skipped_files, "36"),
        ] {
            if count > 0 {
                let _ = writeln!(output, "  {} {}", self.colorize(label, color), count);
            }
        }

        let _ = writeln!(output, "  Success rate: {:.1}%", results.success_rate());
        let _ = writeln!(
            output,
            "  Duration: {}",
            format_duration(results.performance_metrics.total_duration)
        );

        if self.verbosity == VerbosityLevel::Verbose {
            output.push_str(&format_performance_metrics(&results.performance_metrics));
            if !results.declarations_used.is_empty() {
                let _ = writeln!(
                    output,
                    "  Declarations: {}",
                    results.declarations_used.join(", ")
                );
            }
        }

        output
    }

    fn format_one_line(&self, results: &ValidationResults) -> String {
        format!(
            "{} files: {} valid, {} invalid, {} errors, {} skipped ({})\n",
            results.total_files,
            results.valid_files,
            results.invalid_files,
            results.error_files,
            results.skipped_files,
            format_duration(results.performance_metrics.total_duration)
        )
    }
}

fn format_performance_metrics(metrics: &PerformanceMetrics) -> String {
    let mut output = String::new();
    output.push_str("\nPerformance Metrics:\n");
    let _ = writeln!(
        output,
        "  Throughput: {:.1} files/sec",
        metrics.throughput_files_per_second
    );
    let _ = writeln!(
        output,
        "  Concurrent validations: {}",
        metrics.concurrent_validations
    );
    let _ = writeln!(
        output,
        "  Configurations loaded: {} (hits {}, misses {})",
        metrics.configuration_cache.entry_count,
        metrics.configuration_cache.hits,
        metrics.configuration_cache.misses
    );
    output
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
