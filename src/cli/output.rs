//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationReport;
use crate::construct::StackManifest;
use crate::deployer::{DeployResult, DeployStatus, DestroyResult, ResourceError};
use crate::planner::{DiffResult, DiffType};
use crate::state::StateFile;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Manifest entry row for table display.
#[derive(Tabled)]
struct ManifestRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Import")]
    physical_id: String,
}

/// Diff row for table display.
#[derive(Tabled)]
struct DiffRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Remote Id")]
    physical_id: String,
}

/// Deploy or destroy outcome row for table display.
#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Remote Id")]
    physical_id: String,
}

/// Tracked resource row for table display.
#[derive(Tabled)]
struct StateRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Remote Id")]
    physical_id: String,
    #[tabled(rename = "Hash")]
    hash: String,
    #[tabled(rename = "Last Deployed")]
    last_deployed: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn to_json(value: &impl Serialize) -> String {
        serde_json::to_string_pretty(value).unwrap_or_default()
    }

    /// Formats a synthesized manifest.
    #[must_use]
    pub fn format_manifest(&self, manifest: &StackManifest) -> String {
        match self.format {
            OutputFormat::Json => Self::to_json(manifest),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = writeln!(
                    output,
                    "\nStack {} ({} resources)\n",
                    manifest.stack_id.bold(),
                    manifest.resources.len()
                );

                let rows: Vec<ManifestRow> = manifest
                    .resources
                    .iter()
                    .enumerate()
                    .map(|(i, entry)| ManifestRow {
                        index: i + 1,
                        id: entry.id.clone(),
                        kind: entry.kind.to_string(),
                        path: Self::truncate(&entry.path, 48),
                        physical_id: entry.physical_id.clone().unwrap_or_default(),
                    })
                    .collect();

                if !rows.is_empty() {
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }
                output
            }
        }
    }

    /// Formats a diff result.
    #[must_use]
    pub fn format_diff(&self, diff: &DiffResult, detailed: bool) -> String {
        match self.format {
            OutputFormat::Json => Self::to_json(diff),
            OutputFormat::Text => Self::format_diff_text(diff, detailed),
        }
    }

    fn format_diff_text(diff: &DiffResult, detailed: bool) -> String {
        let mut output = String::new();

        if diff.has_changes() {
            let rows: Vec<DiffRow> = diff
                .diffs
                .iter()
                .map(|d| DiffRow {
                    action: Self::format_diff_type(d.diff_type),
                    resource: d.id.clone(),
                    kind: d.kind.to_string(),
                    physical_id: d.physical_id.clone().unwrap_or_default(),
                })
                .collect();
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        } else if diff.errors.is_empty() {
            let _ = writeln!(
                output,
                "{} No changes required - billing resources are up to date.",
                "✓".green()
            );
        }

        if detailed {
            for d in diff.actionable_diffs() {
                let _ = writeln!(output, "\n{} {}", "~".yellow(), d);
                match d.patch() {
                    Some(patch) => {
                        for line in patch.lines() {
                            let _ = writeln!(output, "   {}", Self::color_patch_line(line));
                        }
                    }
                    None => {
                        for line in d.desired.lines() {
                            let _ = writeln!(output, "   {}", format!("+ {line}").green());
                        }
                    }
                }
            }
        }

        Self::write_errors(&mut output, &diff.errors);

        let _ = writeln!(
            output,
            "\nDiff: {} to create, {} to change, {} unchanged",
            diff.creates.to_string().green(),
            diff.updates.to_string().yellow(),
            diff.unchanged
        );
        output
    }

    /// Formats a deploy result.
    #[must_use]
    pub fn format_deploy(&self, result: &DeployResult) -> String {
        match self.format {
            OutputFormat::Json => Self::to_json(result),
            OutputFormat::Text => {
                let mut output = Self::status_line(result.is_success(), "Deploy");

                let rows: Vec<OutcomeRow> = result
                    .deployed
                    .iter()
                    .map(|d| {
                        let mut physical_id = d.physical_id.clone().unwrap_or_default();
                        if let Some(previous) = &d.previous_physical_id {
                            let _ = write!(physical_id, " (replaces {previous})");
                        }
                        OutcomeRow {
                            resource: d.id.clone(),
                            kind: d.kind.to_string(),
                            status: Self::format_deploy_status(d.status),
                            physical_id,
                        }
                    })
                    .collect();
                if !rows.is_empty() {
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }

                Self::write_errors(&mut output, &result.errors);
                Self::write_warnings(&mut output, &result.warnings);
                output
            }
        }
    }

    /// Formats a destroy result.
    #[must_use]
    pub fn format_destroy(&self, result: &DestroyResult) -> String {
        match self.format {
            OutputFormat::Json => Self::to_json(result),
            OutputFormat::Text => {
                let mut output = Self::status_line(result.is_success(), "Destroy");

                let rows: Vec<OutcomeRow> = result
                    .destroyed
                    .iter()
                    .map(|d| OutcomeRow {
                        resource: d.id.clone(),
                        kind: d.kind.to_string(),
                        status: match &d.physical_id {
                            Some(_) => d.status.to_string().red().to_string(),
                            None => "absent".dimmed().to_string(),
                        },
                        physical_id: d.physical_id.clone().unwrap_or_default(),
                    })
                    .collect();
                if !rows.is_empty() {
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }

                Self::write_errors(&mut output, &result.errors);
                Self::write_warnings(&mut output, &result.warnings);
                output
            }
        }
    }

    /// Formats the state file.
    #[must_use]
    pub fn format_state(&self, state: &StateFile) -> String {
        match self.format {
            OutputFormat::Json => Self::to_json(state),
            OutputFormat::Text => {
                if state.stacks.is_empty() {
                    return String::from("No resources tracked.\n");
                }

                let mut output = String::new();
                let _ = writeln!(output, "\nState version: {}", state.version);

                for (stack_id, stack) in &state.stacks {
                    let _ = writeln!(
                        output,
                        "\nStack {} ({} resources)",
                        stack_id.bold(),
                        stack.resources.len()
                    );
                    let rows: Vec<StateRow> = stack
                        .resources
                        .values()
                        .map(|r| StateRow {
                            resource: r.logical_id.clone(),
                            kind: r.kind.to_string(),
                            physical_id: r.physical_id.clone(),
                            hash: r.properties_hash.chars().take(8).collect(),
                            last_deployed: r.last_deployed_at.format("%Y-%m-%d %H:%M").to_string(),
                        })
                        .collect();
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }
                output
            }
        }
    }

    /// Formats lint findings. Empty when there are none.
    #[must_use]
    pub fn format_lint(&self, report: &ValidationReport) -> String {
        if report.is_clean() || self.format == OutputFormat::Json {
            return String::new();
        }
        let mut output = String::new();
        for warning in &report.warnings {
            let _ = writeln!(
                output,
                "{} {}: {}",
                "⚠".yellow(),
                warning.path,
                warning.message
            );
        }
        output
    }

    fn status_line(success: bool, operation: &str) -> String {
        if success {
            format!("{} {operation} successful\n\n", "✓".green())
        } else {
            format!("{} {operation} finished with errors\n\n", "✗".red())
        }
    }

    fn write_errors(output: &mut String, errors: &[ResourceError]) {
        if errors.is_empty() {
            return;
        }
        let _ = write!(output, "\n{} Errors:\n", "✗".red());
        for error in errors {
            let _ = writeln!(output, "   - {} ({}): {}", error.id, error.kind, error.error);
        }
    }

    fn write_warnings(output: &mut String, warnings: &[String]) {
        if warnings.is_empty() {
            return;
        }
        let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
        for warning in warnings {
            let _ = writeln!(output, "   - {warning}");
        }
    }

    /// Formats a diff type with color.
    fn format_diff_type(diff_type: DiffType) -> String {
        match diff_type {
            DiffType::Create => "+create".green().to_string(),
            DiffType::Update => "~change".yellow().to_string(),
            DiffType::NoChange => "unchanged".dimmed().to_string(),
        }
    }

    /// Formats a deploy status with color.
    fn format_deploy_status(status: DeployStatus) -> String {
        match status {
            DeployStatus::Created => "created".green().to_string(),
            DeployStatus::Updated => "updated".yellow().to_string(),
            DeployStatus::Unchanged => "unchanged".dimmed().to_string(),
        }
    }

    fn color_patch_line(line: &str) -> String {
        if line.starts_with("+ ") || line.starts_with("+++") {
            line.green().to_string()
        } else if line.starts_with("- ") || line.starts_with("---") {
            line.red().to_string()
        } else {
            line.to_string()
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        self.message("success", &"✓".green().to_string(), message)
    }

    /// Formats an error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        self.message("error", &"✗".red().to_string(), message)
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        self.message("warning", &"⚠".yellow().to_string(), message)
    }

    fn message(&self, status: &str, symbol: &str, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                Self::to_json(&serde_json::json!({ "status": status, "message": message }))
            }
            OutputFormat::Text => format!("{symbol} {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::ResourceKind;
    use crate::deployer::DeployedResource;
    use serde_json::Value;

    fn deploy_result() -> DeployResult {
        DeployResult {
            stack_id: String::from("Billing"),
            deployed: vec![DeployedResource {
                id: String::from("ProMonthly"),
                kind: ResourceKind::Price,
                physical_id: Some(String::from("price_new")),
                status: DeployStatus::Created,
                previous_physical_id: Some(String::from("price_old")),
            }],
            errors: vec![ResourceError {
                id: String::from("Pro"),
                kind: ResourceKind::Product,
                error: String::from("boom"),
            }],
            warnings: vec![String::from("Failed to save state: disk full")],
        }
    }

    #[test]
    fn test_deploy_text_lists_outcomes_errors_and_warnings() {
        let text = OutputFormatter::new(OutputFormat::Text).format_deploy(&deploy_result());

        assert!(text.contains("ProMonthly"));
        assert!(text.contains("replaces price_old"));
        assert!(text.contains("boom"));
        assert!(text.contains("disk full"));
    }

    #[test]
    fn test_deploy_json_is_parseable() {
        let json = OutputFormatter::new(OutputFormat::Json).format_deploy(&deploy_result());
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["deployed"][0]["physicalId"], "price_new");
        assert_eq!(value["errors"][0]["id"], "Pro");
    }

    #[test]
    fn test_empty_state_text() {
        let text = OutputFormatter::new(OutputFormat::Text).format_state(&StateFile::default());
        assert_eq!(text, "No resources tracked.\n");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("ééééééééééé", 6), "ééé...");
    }

    #[test]
    fn test_json_message() {
        let json = OutputFormatter::new(OutputFormat::Json).success("done");
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "success");
    }
}
