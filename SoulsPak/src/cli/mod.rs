//! SoulsPak CLI - drag-and-drop style unpack/repack
//!
//! Every file argument is unpacked next to itself and every directory
//! argument is repacked, in order.

pub mod progress;

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

use clap::{CommandFactory, Parser};
use console::{Term, style};
use indicatif::ProgressBar;

use crate::config::Settings;
use crate::operations::{BatchReport, Session, SessionOptions};
use crate::regulation;
use crate::utils::TraversalPolicy;
use progress::{KEY, LOOKING_GLASS, PACKAGE};

#[derive(Parser, Debug)]
#[command(name = "soulspak", version)]
#[command(about = "SoulsPak: unpack and repack FromSoftware archives", long_about = None)]
struct Cli {
    /// Files to unpack and directories to repack
    paths: Vec<PathBuf>,

    /// Answer yes to every confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Oodle library (or folder containing it) for DCX_KRAK files
    #[arg(long, value_name = "PATH")]
    oodle: Option<PathBuf>,

    /// Reject entry names starting with `..` instead of folding them
    #[arg(long)]
    strict: bool,

    /// Overwrite repack outputs without keeping a .bak
    #[arg(long)]
    no_backup: bool,

    /// Exit without waiting for a key press
    #[arg(long)]
    no_pause: bool,

    /// Show debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn session_options(&self, settings: &Settings) -> SessionOptions {
        let mut options = SessionOptions::from_settings(settings);
        if let Some(path) = &self.oodle {
            options = options.with_oodle_path(Some(path.clone()));
        }
        if self.strict {
            options = options.with_traversal(TraversalPolicy::Strict);
        }
        if self.no_backup {
            options = options.with_backup(false);
        }
        if self.yes {
            options = options.with_assume_yes(true);
        }
        options
    }

    fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }
}

/// Run the SoulsPak CLI
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if cli.paths.is_empty() {
        Cli::command().print_help()?;
        println!();
        if !cli.no_pause {
            pause("Press any key to exit...");
        }
        return Ok(());
    }

    let settings = Settings::load();
    let active_bar = Rc::new(RefCell::new(ProgressBar::hidden()));
    let session = Session::new(cli.session_options(&settings))
        .with_confirm(prompt_over(Rc::clone(&active_bar), confirm));

    let started = Instant::now();
    let total = cli.paths.len();
    let mut report = BatchReport::new();
    for (index, path) in cli.paths.iter().enumerate() {
        print_item_step(index + 1, total, path);
        let pb = progress::item_bar();
        active_bar.replace(pb.clone());
        let outcome = session.process(path, &|p| progress::update_bar(&pb, p));
        pb.finish_and_clear();
        progress::print_outcome(&outcome);
        report.push(path, outcome);
    }

    progress::print_summary(&report);
    progress::print_done(started.elapsed());

    if report.needs_attention() {
        if !cli.no_pause {
            pause("Press any key to exit...");
        }
        anyhow::bail!("{} of {total} item(s) need attention", report.fail_count());
    }
    Ok(())
}

fn print_item_step(current: usize, total: usize, path: &Path) {
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    let (emoji, verb) = if path.is_dir() {
        (PACKAGE, "Repacking")
    } else {
        (LOOKING_GLASS, "Unpacking")
    };
    let emoji = if regulation::routes_file(&name) || regulation::routes_dir(&name) {
        KEY
    } else {
        emoji
    };
    progress::print_step(current, total, emoji, &format!("{verb} {name}..."));
}

/// Wrap `ask` so the current item's bar is suspended while the question is shown.
fn prompt_over(
    bar: Rc<RefCell<ProgressBar>>,
    ask: impl Fn(&str) -> bool + 'static,
) -> impl Fn(&str) -> bool + 'static {
    move |question| {
        let pb = bar.borrow().clone();
        pb.suspend(|| ask(question))
    }
}

/// Ask a y/N question on the terminal. Non-interactive runs answer no.
fn confirm(question: &str) -> bool {
    let term = Term::stderr();
    if !term.is_term() {
        tracing::warn!("{question} (no terminal, answering no; pass --yes to continue)");
        return false;
    }
    if term
        .write_line(&format!("{} {question} [y/N]", style("?").yellow().bold()))
        .is_err()
    {
        return false;
    }
    matches!(term.read_char(), Ok('y' | 'Y'))
}

fn pause(message: &str) {
    let term = Term::stdout();
    if term.is_term() && term.write_line(message).is_ok() {
        // Any key, including one we cannot decode, ends the pause.
        let _ = term.read_key();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = Cli::try_parse_from([
            "soulspak",
            "--strict",
            "--no-backup",
            "-y",
            "--oodle",
            "/opt/oodle",
            "regulation.bin",
        ])
        .unwrap();
        let options = cli.session_options(&Settings::default());
        assert_eq!(options.traversal, TraversalPolicy::Strict);
        assert!(!options.backup);
        assert!(options.assume_yes);
        assert_eq!(options.oodle_path, Some(PathBuf::from("/opt/oodle")));
        assert_eq!(cli.paths, vec![PathBuf::from("regulation.bin")]);
    }

    #[test]
    fn test_settings_survive_without_flags() {
        let settings = Settings {
            backup: false,
            traversal: TraversalPolicy::Strict,
            ..Settings::default()
        };
        let cli = Cli::try_parse_from(["soulspak", "a.bnd"]).unwrap();
        let options = cli.session_options(&settings);
        assert!(!options.backup);
        assert_eq!(options.traversal, TraversalPolicy::Strict);
        assert_eq!(cli.log_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_prompt_goes_through_the_active_bar() {
        let bar = Rc::new(RefCell::new(ProgressBar::hidden()));
        let asked = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&asked);
        let prompt = prompt_over(Rc::clone(&bar), move |question| {
            log.borrow_mut().push(question.to_string());
            question.ends_with('?')
        });

        bar.replace(progress::item_bar());
        assert!(prompt("Repack anyway?"));
        bar.replace(progress::item_bar());
        assert!(!prompt("no question mark"));
        assert_eq!(*asked.borrow(), vec!["Repack anyway?", "no question mark"]);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["soulspak", "-v", "-q"]).is_err());
    }
}
