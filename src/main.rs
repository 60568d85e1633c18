/// reclass: prototype-to-class conversion for legacy JavaScript corpora.
///
/// Walks a source tree, rewrites every recognized prototype-era class
/// pattern into ES class syntax, re-validates each result with a full parse,
/// and writes converted files to a destination tree. Files it cannot convert
/// are reported and left out of the destination.
///
/// Commands:
/// - convert: full run, writing results and copying overrides
/// - check: dry run, report which files would convert cleanly
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use reclass::config::ConvertConfig;
use reclass::runner::{self, RunOptions};

#[derive(Parser)]
#[command(name = "reclass")]
#[command(about = "Rewrites legacy prototype-based JavaScript into ES class syntax", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a source tree and write results to a destination tree
    Convert {
        /// Directory containing the legacy sources
        #[arg(short, long)]
        src: PathBuf,

        /// Directory converted files are written to
        #[arg(short, long)]
        dest: PathBuf,

        /// Directory of override files copied verbatim after conversion
        #[arg(long)]
        overrides: Option<PathBuf>,

        /// Glob restricting which files are converted (e.g. "core/**")
        #[arg(short, long)]
        filter: Option<String>,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of worker threads (defaults to CPU count)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Optional log file path for debug logging
        #[arg(short, long)]
        log: Option<PathBuf>,
    },

    /// Validate that a source tree converts cleanly without writing anything
    Check {
        /// Directory containing the legacy sources
        #[arg(short, long)]
        src: PathBuf,

        /// Glob restricting which files are checked (e.g. "core/**")
        #[arg(short, long)]
        filter: Option<String>,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of worker threads (defaults to CPU count)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Optional log file path for debug logging
        #[arg(short, long)]
        log: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = match &cli.command {
        Commands::Convert { log, .. } => log.clone(),
        Commands::Check { log, .. } => log.clone(),
    };
    init_logging(log_path.as_ref())?;

    let options = match cli.command {
        Commands::Convert {
            src,
            dest,
            overrides,
            filter,
            config,
            threads,
            log: _,
        } => build_options(src, Some(dest), overrides, filter, config, threads)?,
        Commands::Check {
            src,
            filter,
            config,
            threads,
            log: _,
        } => build_options(src, None, None, filter, config, threads)?,
    };

    let summary = runner::run(&options)?;
    println!(
        "{} converted, {} failed, {} skipped",
        summary.converted, summary.failed, summary.skipped
    );
    if summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn build_options(
    src: PathBuf,
    dest: Option<PathBuf>,
    overrides: Option<PathBuf>,
    filter: Option<String>,
    config_path: Option<PathBuf>,
    threads: Option<usize>,
) -> Result<RunOptions> {
    let mut config = match config_path {
        Some(path) => ConvertConfig::load(&path)?,
        None => ConvertConfig::default(),
    };
    if filter.is_some() {
        config.include = filter;
    }
    Ok(RunOptions {
        source_root: src,
        dest_root: dest,
        overrides,
        config,
        threads,
    })
}

/// Initialize logging with optional file output.
fn init_logging(log_path: Option<&PathBuf>) -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    if let Some(log_file) = log_path {
        // With a log file: info+ to file, warn+ to stderr.
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        let file_appender = tracing_appender::rolling::never(
            log_file
                .parent()
                .unwrap_or_else(|| std::path::Path::new(".")),
            log_file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("reclass.log"),
        );

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(file_appender.and(std::io::stderr.with_max_level(tracing::Level::WARN)))
            .init();
    } else {
        // No log file: warn+ to stderr only (unless RUST_LOG overrides).
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }

    Ok(())
}
