//! Status lines for the operator
//!
//! Everything goes to stderr: once the entry point runs as a child it
//! shares our stdout.

use console::{style, StyledObject, Term};
use gantry_core::{SessionState, WrapperConfig};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

fn line(marker: StyledObject<&str>, msg: &str) {
    // A closed stderr is not worth failing startup over
    let _ = Term::stderr().write_line(&format!("{} {}", marker, msg));
}

pub fn success(msg: &str) {
    line(style("✓").green().bold(), msg);
}

pub fn error(msg: &str) {
    line(style("✗").red().bold(), msg);
}

pub fn warning(msg: &str) {
    line(style("⚠").yellow().bold(), msg);
}

pub fn info(msg: &str) {
    line(style("ℹ").blue().bold(), msg);
}

pub fn header(msg: &str) {
    let _ = Term::stderr().write_line(&format!("\n{}", style(msg).bold().underlined()));
}

pub fn kv(key: &str, value: &str) {
    let _ = Term::stderr().write_line(&format!("  {}: {}", style(key).dim(), value));
}

/// Summary printed right before the entry point is launched
pub fn banner(config: &WrapperConfig, session: &SessionState) {
    header("Gantry");
    kv("Project", config.projectname.as_deref().unwrap_or("-"));
    kv("Address", &config.address);
    kv("Profile", &config.title);
    kv(
        "Version",
        session
            .profile
            .as_ref()
            .map(|p| p.version_or_unknown())
            .unwrap_or("unknown"),
    );
    kv("Connection", &session.connection.to_string());
}

/// Spinner for a step the operator waits on
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
    let style = ProgressStyle::with_template("{spinner:.blue} {msg} {elapsed:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
