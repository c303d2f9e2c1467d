use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use docref::{Diagnostic, DiagnosticKind, Directory, Report, Severity, Validation};
use tracing::instrument;

use super::terminal::{Palette, Style};

#[derive(Debug, Default, Parser)]
#[command(about = "Check includes and cross-references across the corpus")]
pub struct Check {
    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,

    /// Suppress all output except fatal errors
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Jsonl,
    Summary,
}

const INCLUDE_KINDS: [DiagnosticKind; 3] = [
    DiagnosticKind::CircularInclude,
    DiagnosticKind::MissingIncludeRange,
    DiagnosticKind::MissingIncludeTarget,
];

const ANCHOR_KINDS: [DiagnosticKind; 2] = [
    DiagnosticKind::DuplicateAnchor,
    DiagnosticKind::UnreferencedAnchor,
];

const REFERENCE_KINDS: [DiagnosticKind; 3] = [
    DiagnosticKind::UnresolvedReference,
    DiagnosticKind::UnknownRole,
    DiagnosticKind::UnreachableTarget,
];

/// Exit status when a fatal diagnostic was reported.
const FATAL_STATUS: u8 = 2;

impl Check {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<ExitCode> {
        let directory = Directory::new(root).load()?;
        let validation = directory.validate();
        let documents = directory.corpus().len();
        let palette = Palette::detect();

        let output = match self.output {
            OutputFormat::Table if self.quiet => fatal_lines(&validation.report, palette),
            OutputFormat::Table => table(&validation, documents, palette),
            OutputFormat::Jsonl => jsonl(&validation.report, documents)?,
            OutputFormat::Summary => summary_line(&validation.report),
        };
        print!("{output}");

        Ok(ExitCode::from(exit_status(&validation.report)))
    }
}

fn exit_status(report: &Report) -> u8 {
    if report.has_fatal() {
        FATAL_STATUS
    } else {
        0
    }
}

fn table(validation: &Validation, documents: usize, palette: Palette) -> String {
    let report = &validation.report;
    let references: usize = validation.resolved.references.values().map(Vec::len).sum();

    let mut lines = vec![format!("Checking {documents} documents..."), String::new()];
    lines.push(check_line(
        report,
        "Includes:  ",
        &INCLUDE_KINDS,
        &format!(
            "{} top-level documents expanded",
            validation.resolved.expanded.len()
        ),
        palette,
    ));
    lines.push(check_line(
        report,
        "Anchors:   ",
        &ANCHOR_KINDS,
        "No duplicate anchors",
        palette,
    ));
    lines.push(check_line(
        report,
        "References:",
        &REFERENCE_KINDS,
        &format!("{references} references, all resolved"),
        palette,
    ));
    lines.push(String::new());

    if report.diagnostics().is_empty() {
        lines.push(palette.paint(Style::Success, "No problems found"));
        return join_lines(lines);
    }

    lines.extend(
        report
            .diagnostics()
            .iter()
            .map(|diagnostic| diagnostic_line(diagnostic, palette)),
    );

    let summary = format!(
        "Summary: {} fatal errors, {} warnings",
        report.fatal_count(),
        report.warning_count()
    );
    let style = if report.has_fatal() {
        Style::Error
    } else {
        Style::Warning
    };
    lines.push(String::new());
    lines.push(palette.paint(style, &summary));
    join_lines(lines)
}

fn fatal_lines(report: &Report, palette: Palette) -> String {
    join_lines(
        report
            .diagnostics()
            .iter()
            .filter(|d| d.severity == Severity::Fatal)
            .map(|d| diagnostic_line(d, palette))
            .collect(),
    )
}

/// One JSON object per diagnostic, then a summary record.
fn jsonl(report: &Report, documents: usize) -> serde_json::Result<String> {
    let mut output = String::new();
    for diagnostic in report.diagnostics() {
        output.push_str(&serde_json::to_string(diagnostic)?);
        output.push('\n');
    }

    let summary = serde_json::json!({
        "summary": {
            "documents": documents,
            "fatal": report.fatal_count(),
            "warnings": report.warning_count(),
        }
    });
    output.push_str(&summary.to_string());
    output.push('\n');
    Ok(output)
}

fn summary_line(report: &Report) -> String {
    format!(
        "fatal={} warnings={}\n",
        report.fatal_count(),
        report.warning_count()
    )
}

fn check_line(
    report: &Report,
    name: &str,
    kinds: &[DiagnosticKind],
    healthy: &str,
    palette: Palette,
) -> String {
    let count = kinds
        .iter()
        .map(|&kind| report.of_kind(kind).count())
        .sum::<usize>();
    if count == 0 {
        format!("✓ {name} {healthy}")
    } else {
        palette.paint(Style::Warning, &format!("✗ {name} {count} issues found"))
    }
}

fn diagnostic_line(diagnostic: &Diagnostic, palette: Palette) -> String {
    let detail = format!("[{} at {}]", diagnostic.kind.as_str(), diagnostic.location);
    format!(
        "{}: {} {}",
        palette.severity(diagnostic.severity),
        diagnostic.message,
        palette.paint(Style::Dim, &detail)
    )
}

fn join_lines(lines: Vec<String>) -> String {
    lines.into_iter().map(|line| line + "\n").collect()
}

#[cfg(test)]
mod tests {
    use docref::{validate, Config, Corpus};
    use tempfile::tempdir;

    use super::*;

    fn validation(sources: &[(&str, &str)]) -> Validation {
        let corpus = Corpus::from_sources(sources.iter().copied());
        validate(&corpus, &Config::default())
    }

    #[test]
    fn warnings_alone_exit_successfully() {
        let validation = validation(&[("x", "See :ref:`missing`.\n")]);
        assert_eq!(exit_status(&validation.report), 0);
    }

    #[test]
    fn fatal_errors_exit_with_status_two() {
        let validation = validation(&[
            ("a", ".. include:: /b.txt\n"),
            ("b", ".. include:: /a.txt\n"),
        ]);
        assert_eq!(exit_status(&validation.report), FATAL_STATUS);
    }

    #[test]
    fn jsonl_has_one_record_per_diagnostic_then_a_summary() {
        let validation = validation(&[
            ("x", "See :ref:`missing`.\n\n.. include:: /gone.txt\n"),
            ("y", "See :ref:`also-missing`.\n"),
        ]);
        let output = jsonl(&validation.report, 2).unwrap();
        let records: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["kind"], "missing-include-target");
        assert_eq!(records[0]["severity"], "fatal");
        assert_eq!(records[1]["kind"], "unresolved-reference");
        assert_eq!(records[1]["location"]["document"], "y");
        assert_eq!(
            records[2],
            serde_json::json!({"summary": {"documents": 2, "fatal": 1, "warnings": 1}})
        );
    }

    #[test]
    fn summary_counts_fatal_errors_and_warnings() {
        let validation = validation(&[("x", ":ref:`one` :ref:`two`\n")]);
        assert_eq!(summary_line(&validation.report), "fatal=0 warnings=2\n");
    }

    #[test]
    fn table_lists_checks_and_diagnostics() {
        let validation = validation(&[("x", "See :ref:`missing`.\n")]);
        let output = table(&validation, 1, Palette::plain());

        assert!(output.starts_with("Checking 1 documents...\n"));
        assert!(output.contains("✓ Includes:   1 top-level documents expanded\n"));
        assert!(output.contains("✓ Anchors:    No duplicate anchors\n"));
        assert!(output.contains("✗ References: 1 issues found\n"));
        assert!(output.contains(
            "warning: unresolved ref reference to 'missing' [unresolved-reference at x:1]\n"
        ));
        assert!(output.ends_with("Summary: 0 fatal errors, 1 warnings\n"));
    }

    #[test]
    fn clean_table_reports_no_problems() {
        let validation = validation(&[("x", ".. _y:\n\nSee :ref:`y`.\n")]);
        let output = table(&validation, 1, Palette::plain());
        assert!(output.ends_with("\nNo problems found\n"));
    }

    #[test]
    fn quiet_output_keeps_only_fatal_errors() {
        let validation = validation(&[("x", "See :ref:`missing`.\n\n.. include:: /gone.txt\n")]);
        let output = fatal_lines(&validation.report, Palette::plain());
        assert_eq!(output.lines().count(), 1);
        assert!(output.starts_with("error: "));
    }

    #[test]
    fn check_run_reads_the_corpus_from_disk() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        std::fs::write(root.join("index.txt"), "See :ref:`missing`.\n").unwrap();

        let check = Check {
            output: OutputFormat::Summary,
            quiet: false,
        };
        let status = check.run(root).expect("check command should succeed");
        assert_eq!(status, ExitCode::SUCCESS);
    }
}
