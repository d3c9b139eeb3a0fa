//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use folio_dedup::{DedupReport, DuplicateGroup};
use folio_domain::RelationKind;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format a dedup report.
    pub fn format_report(&self, report: &DedupReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(report.to_json_pretty()?),
            OutputFormat::Table => Ok(self.format_report_table(report)),
            OutputFormat::Quiet => Ok(self.format_report_quiet(report)),
        }
    }

    /// Format the report as tables, one per duplicate group.
    fn format_report_table(&self, report: &DedupReport) -> String {
        let mut sections = Vec::new();

        for group in report.duplicate_groups() {
            sections.push(self.group_table(group));
        }
        if sections.is_empty() {
            sections.push(self.colorize("No duplicates found.", "yellow"));
        }

        if !report.skipped.is_empty() {
            let mut builder = Builder::default();
            builder.push_record(["Skipped", "Reason", "Detail"]);
            for skipped in &report.skipped {
                builder.push_record([skipped.archive_id.as_str(), skipped.reason.as_str(), skipped.detail.as_str()]);
            }
            let mut table = builder.build();
            table
                .with(Style::rounded())
                .with(Modify::new(Rows::first()).with(Alignment::center()));
            sections.push(table.to_string());
        }

        sections.push(self.summary(report));
        sections.join("\n\n")
    }

    fn group_table(&self, group: &DuplicateGroup) -> String {
        let heading = match &group.deciding_criterion {
            Some(deciding) => format!("Group {} (kept by {})", group.maximal_id, deciding),
            None => format!("Group {}", group.maximal_id),
        };

        let mut builder = Builder::default();
        builder.push_record(["Archive", "Relation", "Confidence", "Rank", "Pages", "Size", "Action"]);
        for member in &group.members {
            let relation = match member.relation {
                RelationKind::Equal => "equal",
                RelationKind::Lesser => "lesser",
            };
            let action = if member.keep_recommended {
                self.colorize("keep", "green")
            } else {
                self.colorize("remove", "red")
            };
            builder.push_record([
                member.archive_id.to_string(),
                relation.to_string(),
                format!("{:.3}", member.confidence),
                member.rank.to_string(),
                member.page_count.to_string(),
                format_bytes(member.file_size),
                action,
            ]);
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));

        format!("{}\n{}", self.colorize(&heading, "cyan"), table)
    }

    fn summary(&self, report: &DedupReport) -> String {
        let removable = report.removable().len();
        let line = format!(
            "{} group(s) with duplicates, {} unique archive(s), {} removable ({}), {} skipped",
            report.duplicate_groups().count(),
            report.unique_ids().len(),
            removable,
            format_bytes(report.reclaimable_bytes()),
            report.skipped.len()
        );

        if report.is_partial() {
            let stats = &report.stats;
            let warning = format!(
                "Job {}: {} of {} candidate pair(s) were not examined",
                report.completion.as_str(),
                stats.pairs_unexamined,
                stats.pairs_total
            );
            format!("{}\n{}", line, self.warning(&warning))
        } else {
            line
        }
    }

    /// Format the report in quiet mode (removable IDs only).
    fn format_report_quiet(&self, report: &DedupReport) -> String {
        let ids: Vec<&str> = report.removable().into_iter().map(|id| id.as_str()).collect();
        ids.join("\n")
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            _ => text.to_string(),
        }
    }
}

/// Human-readable byte count.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
