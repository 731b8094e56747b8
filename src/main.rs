mod builds;
mod catalog;
mod commands;
mod core;
mod scan;
mod source;
mod ui;

use clap::{ArgAction, Parser, Subcommand};
use core::error::{ScanError, print_error};
use scan::report::ReportFormat;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Find components whose sources changed since their last build
#[derive(Parser)]
#[command(name = "scan-sources")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(styles = get_styles())]
struct Cli {
  /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
  #[arg(short, long, action = ArgAction::Count, global = true)]
  verbose: u8,

  /// Path to scan.toml (searched for in the current directory by default)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Decide which components need a rebuild and report why
  Scan {
    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    format: ReportFormat,
    /// Shorthand for --format yaml
    #[arg(long, conflicts_with = "format")]
    yaml: bool,
    /// Reconcile public upstreams into private mirrors before scanning
    #[arg(long)]
    rebase_priv: bool,
    /// With --rebase-priv: report what would be reconciled, without merging or pushing
    #[arg(long, requires = "rebase_priv")]
    dry_run: bool,
    /// Kubeconfig for the CI cluster; enables RHCOS status
    #[arg(long)]
    ci_kubeconfig: Option<PathBuf>,
    /// Show progress bars on stderr
    #[arg(long)]
    progress: bool,
  },

  /// List the components of the group with their dependency edges
  Components {
    /// Output in JSON format
    #[arg(long)]
    json: bool,
  },
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

/// Logs go to stderr so the report on stdout stays machine-readable
fn init_tracing(verbose: u8) {
  let level = match verbose {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("scan_sources={level}")));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .init();
}

fn main() {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let root = match std::env::current_dir() {
    Ok(dir) => dir,
    Err(e) => {
      eprintln!("Error: Failed to get current directory: {}", e);
      std::process::exit(1);
    }
  };

  // Config and catalog are loaded once and shared by every phase
  let ctx = match core::context::ScanContext::build(&root, cli.config.as_deref()) {
    Ok(ctx) => ctx,
    Err(e) => handle_error(e),
  };

  let result = match cli.command {
    Commands::Scan {
      format,
      yaml,
      rebase_priv,
      dry_run,
      ci_kubeconfig,
      progress,
    } => commands::run_scan(
      &ctx,
      commands::ScanArgs {
        format: if yaml { ReportFormat::Yaml } else { format },
        rebase_priv,
        dry_run,
        ci_kubeconfig,
        progress,
      },
    ),
    Commands::Components { json } => commands::run_components(&ctx, json),
  };

  if let Err(err) = result {
    handle_error(err);
  }
}

fn handle_error(err: ScanError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}
