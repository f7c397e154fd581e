//! Command-line interface definitions for dgcatalog.
//!
//! Global options (verbosity, config file, JSON errors) apply to every
//! subcommand.
//!
//! # Example
//!
//! ```bash
//! # Register a media tree
//! dgcatalog scan /media
//!
//! # Preview, then run, deduplication
//! dgcatalog dedupe /media --dry-run
//! dgcatalog dedupe /media --yes
//!
//! # Markdown report
//! dgcatalog report /media -o report.md
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Durable video catalog with content-based consolidation.
///
/// Scans a year/month/day/project media tree into a SQLite catalog, then
/// moves each distinct file into a hash-sharded store and replaces
/// duplicates with relative symbolic links.
#[derive(Debug, Parser)]
#[command(name = "dgcatalog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (default: dgcatalog.toml in the config directory)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Print fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Register video files under a media root into the catalog
    Scan(ScanArgs),
    /// Consolidate files and replace duplicates with symbolic links
    Dedupe(DedupeArgs),
    /// Print or write a Markdown catalog report
    Report(ReportArgs),
    /// Refresh and print catalog statistics
    Stats(StatsArgs),
}

/// Location of the media tree and its catalog.
#[derive(Debug, Args)]
pub struct CatalogArgs {
    /// Media root laid out as <year>/<month>/<month_day>/<project>
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Directory holding .dg_consolidation (default: ROOT)
    #[arg(long, value_name = "PATH")]
    pub consolidation_root: Option<PathBuf>,

    /// Catalog database file (default: .dg_consolidation/dg_catalog.db)
    #[arg(long = "catalog", value_name = "PATH")]
    pub catalog_path: Option<PathBuf>,
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// Only scan one month, given as <year>/<month>
    #[arg(long, value_name = "YEAR/MONTH")]
    pub subfolder: Option<PathBuf>,

    /// Register files without computing fingerprints
    #[arg(long)]
    pub skip_hash: bool,
}

/// Arguments for the dedupe subcommand.
#[derive(Debug, Args)]
pub struct DedupeArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// Show what would happen without changing files or the catalog
    #[arg(long)]
    pub dry_run: bool,

    /// Continue without asking when disk space looks insufficient
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Arguments for the report subcommand.
#[derive(Debug, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Arguments for the stats subcommand.
#[derive(Debug, Args)]
pub struct StatsArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,
}

impl Commands {
    /// Catalog location shared by every subcommand.
    #[must_use]
    pub fn catalog_args(&self) -> &CatalogArgs {
        match self {
            Self::Scan(args) => &args.catalog,
            Self::Dedupe(args) => &args.catalog,
            Self::Report(args) => &args.catalog,
            Self::Stats(args) => &args.catalog,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parse_scan_basic() {
        let cli = Cli::try_parse_from(["dgcatalog", "scan", "/media"]).unwrap();
        let Commands::Scan(args) = &cli.command else {
            panic!("expected scan");
        };
        assert_eq!(args.catalog.root, PathBuf::from("/media"));
        assert!(args.subfolder.is_none());
        assert!(!args.skip_hash);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_cli_parse_scan_with_options() {
        let cli = Cli::try_parse_from([
            "dgcatalog",
            "-vv",
            "scan",
            "/media",
            "--subfolder",
            "2024/01",
            "--skip-hash",
            "--consolidation-root",
            "/store",
            "--catalog",
            "/db/catalog.db",
        ])
        .unwrap();
        let Commands::Scan(args) = &cli.command else {
            panic!("expected scan");
        };
        assert_eq!(cli.verbose, 2);
        assert_eq!(args.subfolder, Some(PathBuf::from("2024/01")));
        assert!(args.skip_hash);
        assert_eq!(args.catalog.consolidation_root, Some(PathBuf::from("/store")));
        assert_eq!(args.catalog.catalog_path, Some(PathBuf::from("/db/catalog.db")));
    }

    #[test]
    fn test_cli_parse_dedupe() {
        let cli =
            Cli::try_parse_from(["dgcatalog", "dedupe", "/media", "--dry-run", "-y", "--json-errors"])
                .unwrap();
        let Commands::Dedupe(args) = &cli.command else {
            panic!("expected dedupe");
        };
        assert!(args.dry_run);
        assert!(args.yes);
        assert!(cli.json_errors);
        assert_eq!(cli.command.catalog_args().root, PathBuf::from("/media"));
    }

    #[test]
    fn test_cli_parse_report_output() {
        let cli = Cli::try_parse_from(["dgcatalog", "report", "/media", "-o", "r.md"]).unwrap();
        let Commands::Report(args) = &cli.command else {
            panic!("expected report");
        };
        assert_eq!(args.output, Some(PathBuf::from("r.md")));
    }

    #[test]
    fn test_cli_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["dgcatalog", "-q", "-v", "stats", "/media"]).is_err());
    }

    #[test]
    fn test_cli_missing_root() {
        assert!(Cli::try_parse_from(["dgcatalog", "scan"]).is_err());
    }

    #[test]
    fn test_cli_config_is_global() {
        let cli =
            Cli::try_parse_from(["dgcatalog", "stats", "/media", "--config", "/etc/dg.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/dg.toml")));
    }
}
