//! CLI progress display utilities
//!
//! Step indicators, emojis and per-item progress bars for batch runs.

use std::time::Duration;

use console::{Emoji, style};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};

use crate::operations::{BatchReport, Outcome};
use crate::progress::Progress;

// =============================================================================
// Emoji Constants (with ASCII fallbacks for terminals without emoji support)
// =============================================================================

/// Magnifying glass - for unpacking
pub static LOOKING_GLASS: Emoji<'_, '_> = Emoji("🔍 ", "");
/// Package - for repacking
pub static PACKAGE: Emoji<'_, '_> = Emoji("📦 ", "");
/// Key - for regulation files
pub static KEY: Emoji<'_, '_> = Emoji("🔑 ", "");
/// Sparkles - for completion
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");
/// Warning sign - for items that need attention
pub static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "! ");

/// Print a step indicator: `[1/3] 📦 Message...`
pub fn print_step(current: usize, total: usize, emoji: Emoji, msg: &str) {
    println!(
        "{} {}{}",
        style(format!("[{current}/{total}]")).bold().dim(),
        emoji,
        msg
    );
}

/// Print completion message: `✨ Done in 2s`
pub fn print_done(elapsed: Duration) {
    println!("{} Done in {}", SPARKLE, HumanDuration(elapsed));
}

/// Print one item's outcome under its step line.
pub fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Failed(_) => println!("      {}{}", WARNING, style(outcome).red()),
        Outcome::Unrecognized { .. } => println!("      {}{}", WARNING, style(outcome).yellow()),
        Outcome::Regulation {
            reversible: false, ..
        } => println!("      {}{}", KEY, style(outcome).yellow()),
        _ => println!("      {}", style(outcome).green()),
    }
}

/// Print the items that failed or were skipped.
pub fn print_summary(report: &BatchReport) {
    if !report.needs_attention() {
        return;
    }
    println!(
        "{}{} of {} item(s) need attention:",
        WARNING,
        report.fail_count(),
        report.items.len()
    );
    for item in report.problems() {
        println!("  {}: {}", item.path.display(), item.outcome);
    }
}

/// Progress bar style for determinate progress
///
/// Format: `Writing entries [████████░░░░░░░░] 50/100`
///
/// # Panics
/// Panics if the template string is invalid (this is a compile-time constant).
#[must_use]
pub fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
        .expect("valid template")
}

/// Create a hidden-until-updated bar for one item
#[must_use]
pub fn item_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(bar_style());
    pb
}

/// Mirror a library progress update onto `pb`.
pub fn update_bar(pb: &ProgressBar, progress: &Progress) {
    pb.set_length(progress.total as u64);
    pb.set_position(progress.current as u64);
    pb.set_message(progress.phase.as_str());
}
