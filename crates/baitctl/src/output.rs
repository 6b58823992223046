//! Output formatting - plain ASCII, color only on a terminal

use bait_shared::{HealthResponse, Severity, VerdictResponse};
use owo_colors::OwoColorize;
use std::io::IsTerminal;

const SEPARATOR: &str = "------------------------------------------------------------";

/// Color when stdout is a terminal and NO_COLOR is unset.
pub fn use_color() -> bool {
    std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

fn severity_tag(severity: Severity, color: bool) -> String {
    let tag = format!("[{}]", severity.to_string().to_uppercase());
    if !color {
        return tag;
    }
    match severity {
        Severity::High => tag.bright_red().bold().to_string(),
        Severity::Medium => tag.yellow().bold().to_string(),
        Severity::Low => tag.cyan().to_string(),
        Severity::None => tag.bright_green().to_string(),
    }
}

/// Verdict with its severity, score and every stage outcome.
pub fn render_verdict(verdict: &VerdictResponse, color: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}  {} (score {}, {} branch)\n",
        severity_tag(verdict.severity, color),
        verdict.severity.label(),
        verdict.score,
        verdict.branch
    ));
    out.push('\n');
    out.push_str(&verdict.conclusion);
    out.push_str("\n\n");
    out.push_str(SEPARATOR);
    out.push('\n');

    for step in &verdict.steps {
        let line = format!("  {:<20} {:<16} +{}", step.stage.as_str(), step.outcome, step.delta);
        if color && step.delta == 0 {
            out.push_str(&line.dimmed().to_string());
        } else {
            out.push_str(&line);
        }
        out.push('\n');
    }
    out.push_str(&format!("  request {}", verdict.request_id));
    out
}

pub fn render_health(health: &HealthResponse, server: &str) -> String {
    format!(
        "baitd {} at {}: {} (up {})",
        health.version,
        server,
        health.status,
        format_uptime(health.uptime_secs)
    )
}

fn format_uptime(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {}m", h, m)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{}s", s)
    }
}

/// Display an error
pub fn display_error(message: &str) {
    if std::io::stderr().is_terminal() {
        eprintln!("[ERROR] {}", message.red());
    } else {
        eprintln!("[ERROR] {}", message);
    }
}
