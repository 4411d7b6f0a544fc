pub mod build;
pub mod destroy;
pub mod generate;
pub mod info;
pub mod init;
pub mod list;
pub mod logs;
pub mod shell;
pub mod start;
pub mod status;
pub mod stop;
pub mod templates;

use indicatif::{ProgressBar, ProgressStyle};
use labforge_core::LabReport;
use labforge_schema::AccessEntry;
use labforge_store::{LabStatus, LabsLayout, LabsLock};
use std::path::Path;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    pb.set_style(style);
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn finish(pb: &ProgressBar, msg: String) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(msg);
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✗ {msg}"));
}

pub fn colorize_state(state: LabStatus) -> String {
    use console::Style;
    let text = state.to_string();
    match state {
        LabStatus::Running => Style::new().green().apply_to(text).to_string(),
        LabStatus::Stopped => Style::new().yellow().apply_to(text).to_string(),
        LabStatus::Error => Style::new().red().apply_to(text).to_string(),
        LabStatus::Building => Style::new().blue().apply_to(text).to_string(),
        LabStatus::Destroyed => Style::new().dim().apply_to(text).to_string(),
    }
}

/// Exclusive lock on the labs root for commands that allocate or free
/// subnets.
pub fn lock_labs(labs_dir: &Path) -> Result<LabsLock, String> {
    LabsLock::acquire(&LabsLayout::new(labs_dir)).map_err(|e| e.to_string())
}

/// `label: url (user:pass)`, leaving out whatever is missing.
pub fn format_access(entry: &AccessEntry) -> String {
    let mut out = format!("{}: {}", entry.label, entry.url);
    if let Some(creds) = &entry.credentials {
        out.push_str(&format!(
            " ({}:{})",
            creds.username.as_deref().unwrap_or(""),
            creds.password.as_deref().unwrap_or("")
        ));
    }
    out
}

/// Plain-text access table shared by `build` and `info`.
pub fn print_access_table(report: &LabReport) {
    use console::style;
    println!(
        "{}",
        style(format!("Access Info - {}", report.record.lab_id)).bold()
    );
    println!("{:<20} {:<16} {:<24} ACCESS", "SERVICE", "IP", "PORTS");
    for svc in &report.services {
        let ports = if svc.ports.is_empty() {
            "-".to_owned()
        } else {
            svc.ports.join(", ")
        };
        let access: Vec<String> = svc.access.iter().map(format_access).collect();
        println!(
            "{:<20} {:<16} {:<24} {}",
            svc.name,
            svc.address.as_deref().unwrap_or("-"),
            ports,
            access.join("; ")
        );
    }
}

pub fn print_warnings(warnings: &[String]) {
    for w in warnings {
        eprintln!("{} {w}", console::style("warning:").yellow());
    }
}
