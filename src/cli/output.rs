//! Output formatting for the ad-hoc runner
//!
//! Human mode prints one `host | STATUS => {json}` block per host, the way
//! Ansible's minimal callback does. JSON mode prints a single object keyed
//! by host name once every host has finished.

use colored::{ColoredString, Colorize};
use iis_site::modules::{Diff, ModuleOutput, ModuleStatus};
use indexmap::IndexMap;
use similar::{ChangeTag, TextDiff};
use std::fmt::Write;

/// Final result for one host
#[derive(Debug, Clone)]
pub struct HostResult {
    pub host: String,
    pub output: ModuleOutput,
}

/// Output formatter for the human and JSON modes
pub struct OutputFormatter {
    use_color: bool,
    json_mode: bool,
    diff_mode: bool,
}

impl OutputFormatter {
    pub fn new(use_color: bool, json_mode: bool, diff_mode: bool) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();
        Self {
            use_color,
            json_mode,
            diff_mode,
        }
    }

    pub fn is_json(&self) -> bool {
        self.json_mode
    }

    fn paint(&self, text: &str, status: ModuleStatus) -> String {
        if !self.use_color {
            return text.to_string();
        }
        let colored: ColoredString = match status {
            ModuleStatus::Changed => text.yellow(),
            ModuleStatus::Ok => text.green(),
            ModuleStatus::Failed => text.red().bold(),
        };
        colored.to_string()
    }

    /// Render the results of every host.
    pub fn render_results(&self, results: &[HostResult]) -> String {
        if self.json_mode {
            let by_host: IndexMap<&str, &ModuleOutput> = results
                .iter()
                .map(|r| (r.host.as_str(), &r.output))
                .collect();
            return serde_json::to_string_pretty(&by_host).unwrap_or_else(|_| "{}".to_string());
        }

        let mut out = String::new();
        for result in results {
            out.push_str(&self.render_host(result));
        }
        out
    }

    /// Render a single host block in human mode.
    pub fn render_host(&self, result: &HostResult) -> String {
        let status = result.output.status();
        let label = match status {
            ModuleStatus::Changed => "CHANGED",
            ModuleStatus::Ok => "SUCCESS",
            ModuleStatus::Failed => "FAILED!",
        };

        let body = serde_json::to_string_pretty(&result.output)
            .unwrap_or_else(|_| format!("{{\"msg\": {:?}}}", result.output.msg));

        let mut out = String::new();
        if self.diff_mode {
            if let Some(diff) = result.output.diff.as_ref().filter(|d| !d.is_empty()) {
                out.push_str(&self.render_diff(diff, &result.host));
            }
        }
        let _ = writeln!(
            out,
            "{}",
            self.paint(&format!("{} | {} => {}", result.host, label, body), status)
        );
        out
    }

    /// Unified before/after diff of a site's state.
    pub fn render_diff(&self, diff: &Diff, host: &str) -> String {
        let text_diff = TextDiff::from_lines(&diff.before, &diff.after);
        let mut out = String::new();

        let header = format!("--- before: {}\n+++ after: {}", host, host);
        if self.use_color {
            let _ = writeln!(out, "{}", header.bold());
        } else {
            let _ = writeln!(out, "{}", header);
        }

        for change in text_diff.iter_all_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => "-",
                ChangeTag::Insert => "+",
                ChangeTag::Equal => " ",
            };
            let line = format!("{}{}", sign, change.to_string_lossy().trim_end_matches('\n'));
            let line = match (self.use_color, change.tag()) {
                (true, ChangeTag::Delete) => line.red().to_string(),
                (true, ChangeTag::Insert) => line.green().to_string(),
                _ => line,
            };
            let _ = writeln!(out, "{}", line);
        }
        out
    }

    /// Print an error that stopped the run before any host was contacted.
    pub fn error(&self, message: &str) {
        if self.use_color {
            eprintln!("{} {}", "ERROR!".red().bold(), message);
        } else {
            eprintln!("ERROR! {}", message);
        }
    }
}
