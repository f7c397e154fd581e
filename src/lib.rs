//! dgcatalog - Durable Video Catalog
//!
//! Registers a year/month/day/project media tree into a SQLite catalog,
//! groups files by a sampled BLAKE3 fingerprint, and deduplicates them by
//! moving one copy into a hash-sharded store and replacing the others with
//! relative symbolic links.

pub mod actions;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod dedupe;
pub mod error;
pub mod logging;
pub mod progress;
pub mod report;
pub mod scanner;

use std::fs;

use anyhow::{Context, Result};

use crate::catalog::{Catalog, CatalogOptions};
use crate::cli::{CatalogArgs, Cli, Commands, DedupeArgs, ReportArgs, ScanArgs};
use crate::config::Config;
use crate::dedupe::{DedupeConfig, Deduplicator};
use crate::error::ExitCode;
use crate::progress::Progress;
use crate::report::Report;
use crate::scanner::{ScanConfig, Scanner};

/// Run the parsed command line.
///
/// # Errors
///
/// Returns an error when configuration is invalid, the catalog cannot be
/// opened, or a run aborts. Per-file problems are reported through the
/// returned [`ExitCode`] instead.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    let config = Config::load(cli.config.as_deref())?;
    let catalog = open_catalog(cli.command.catalog_args(), &config)?;

    let code = match &cli.command {
        Commands::Scan(args) => handle_scan(&catalog, &config, args, cli.quiet)?,
        Commands::Dedupe(args) => handle_dedupe(&catalog, &config, args, cli.quiet)?,
        Commands::Report(args) => handle_report(&catalog, args)?,
        Commands::Stats(_) => handle_stats(&catalog)?,
    };
    catalog.close();
    Ok(code)
}

fn open_catalog(args: &CatalogArgs, config: &Config) -> Result<Catalog> {
    let options = CatalogOptions::new(&args.root)
        .with_consolidation_root(
            args.consolidation_root
                .clone()
                .or_else(|| config.consolidation_root.clone()),
        )
        .with_catalog_path(args.catalog_path.clone().or_else(|| config.catalog_path.clone()))
        .with_retry(config.retry.policy());
    Catalog::initialize(options)
        .with_context(|| format!("cannot open catalog for {}", args.root.display()))
}

fn handle_scan(catalog: &Catalog, config: &Config, args: &ScanArgs, quiet: bool) -> Result<ExitCode> {
    let progress = Progress::new(quiet);
    let scan_config = ScanConfig {
        skip_hash: args.skip_hash || config.skip_hash,
        video_extensions: config.video_extensions.clone(),
    };
    let summary = Scanner::new(catalog, scan_config)
        .with_progress(&progress)
        .scan(args.subfolder.as_deref())
        .context("scan failed")?;
    catalog
        .statistics()
        .refresh()
        .context("cannot refresh statistics")?;

    if !quiet {
        println!(
            "Scanned {} project(s): {} file(s) seen, {} added, {} already cataloged, {} hashed",
            summary.projects,
            summary.files_seen,
            summary.files_added,
            summary.files_skipped,
            summary.files_hashed
        );
    }
    if summary.errors.is_empty() {
        return Ok(ExitCode::Success);
    }
    for err in summary.errors.iter().take(config.error_display_limit) {
        eprintln!("  - {err}");
    }
    Ok(ExitCode::PartialSuccess)
}

fn handle_dedupe(
    catalog: &Catalog,
    config: &Config,
    args: &DedupeArgs,
    quiet: bool,
) -> Result<ExitCode> {
    let progress = Progress::new(quiet);
    let dedupe_config = DedupeConfig {
        dry_run: args.dry_run,
        max_link_depth: config.max_link_depth,
        assume_yes: args.yes,
    };
    let summary = Deduplicator::new(catalog, dedupe_config)
        .with_progress(&progress)
        .run()
        .context("deduplication aborted")?;

    print!("{}", summary.render(config.error_display_limit));
    if !args.dry_run {
        catalog
            .statistics()
            .refresh()
            .context("cannot refresh statistics")?;
    }
    Ok(summary.exit_code())
}

fn handle_report(catalog: &Catalog, args: &ReportArgs) -> Result<ExitCode> {
    catalog
        .statistics()
        .refresh()
        .context("cannot refresh statistics")?;
    let text = Report::collect(catalog)
        .context("cannot read catalog")?
        .render();

    match &args.output {
        Some(path) => {
            fs::write(path, text)
                .with_context(|| format!("cannot write report to {}", path.display()))?;
            log::info!("Report written to {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(ExitCode::Success)
}

fn handle_stats(catalog: &Catalog) -> Result<ExitCode> {
    let stats = catalog.statistics();
    stats.refresh().context("cannot refresh statistics")?;
    for stat in stats.list().context("cannot read statistics")? {
        println!("{:<24} {}", stat.name, stat.value);
    }
    Ok(ExitCode::Success)
}
