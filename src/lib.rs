//! mediadedupe - catalog-driven media deduplication
//!
//! Reads media records from a catalog database, groups them under an
//! equivalence profile (same song, same extractor id, same title, same
//! duration, or byte-identical content), keeps the best-ranked file of each
//! group, and removes the rest: to the system trash, permanently, or through
//! a user command. Removed records are marked deleted in the catalog.

pub mod actions;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod hasher;
pub mod logging;
pub mod output;
pub mod progress;
pub mod signal;

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};

use crate::catalog::{RecordFilter, SqliteCatalog};
use crate::cli::{Cli, Commands, DedupeArgs, HashArgs, InitConfigArgs, OutputFormat};
use crate::config::Config;
use crate::duplicates::{parse_sort_keys, DedupeEngine, RunOptions, SimilarityConfig};
use crate::error::ExitCode;
use crate::hasher::{hash_to_hex, Hasher};
use crate::output::{CsvOutput, JsonOutput, TextOutput};
use crate::progress::{Progress, ProgressCallback};

/// Run the command described by `cli`.
///
/// # Errors
///
/// Returns an error for invalid configuration, an unreadable catalog, or an
/// interrupted run. Per-file failures are reported in the exit code instead.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    if cli.no_color {
        yansi::disable();
    }

    let config = Config::load(cli.config.as_deref())?;
    log::debug!("Configuration: {:?}", config);

    match cli.command {
        Commands::Dedupe(args) => run_dedupe(args, &config, cli.quiet),
        Commands::Hash(args) => run_hash(&args),
        Commands::InitConfig(args) => run_init_config(&args, &config, cli.config.as_deref()),
    }
}

/// Merge CLI flags over the loaded configuration.
///
/// # Errors
///
/// Returns `ConfigError` for an unknown sort column.
pub fn build_run_options(args: &DedupeArgs, config: &Config) -> anyhow::Result<RunOptions> {
    let sort = if args.sort.is_empty() {
        &config.sort
    } else {
        &args.sort
    };

    let filter = RecordFilter {
        min_size: args.min_size,
        max_size: args.max_size,
        include: args.include.clone(),
        exclude: args.exclude.clone(),
        limit: args.limit,
    };
    let similarity = SimilarityConfig::default()
        .with_basename(args.basename)
        .with_dirname(args.dirname)
        .with_min_ratio(
            args.min_similarity_ratio
                .unwrap_or(config.min_similarity_ratio),
        );

    Ok(RunOptions {
        profile: args.profile(),
        filter,
        similarity,
        sort_keys: parse_sort_keys(sort)?,
        dedupe_command: args
            .dedupe_cmd
            .clone()
            .or_else(|| config.dedupe_command.clone()),
        use_trash: config.use_trash && !args.no_trash,
        dry_run: args.dry_run,
        io_threads: args.io_threads.unwrap_or(config.io_threads),
        ..RunOptions::default()
    })
}

fn run_dedupe(args: DedupeArgs, config: &Config, quiet: bool) -> anyhow::Result<ExitCode> {
    let mut options = build_run_options(&args, config)?;
    options.validate()?;

    let Some(database) = args.database.as_ref().or(config.database.as_ref()) else {
        bail!("no catalog database given (pass DATABASE or set `database` in the config file)");
    };
    if !database.exists() {
        bail!("catalog database not found: {}", database.display());
    }

    let handler = signal::install_handler()?;
    options.shutdown_flag = Some(handler.get_flag());
    if !quiet && !args.no_progress {
        let progress: Arc<dyn ProgressCallback> = Arc::new(Progress::new(false));
        options.progress_callback = Some(progress);
    }

    let catalog = SqliteCatalog::open(database)
        .with_context(|| format!("failed to open catalog {}", database.display()))?;

    log::info!(
        "Deduplicating {} ({}{})",
        database.display(),
        args.profile().map_or("none", |p| p.name()),
        if options.dry_run { ", dry run" } else { "" }
    );
    let report = DedupeEngine::new(options).run(&catalog)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.output {
        OutputFormat::Text => TextOutput::new(&report).write_to(&mut out)?,
        OutputFormat::Json => JsonOutput::new(&report).write_to(&mut out, true)?,
        OutputFormat::Csv => CsvOutput::new(&report).write_to(&mut out)?,
    }
    out.flush()?;

    Ok(report.exit_code())
}

fn run_hash(args: &HashArgs) -> anyhow::Result<ExitCode> {
    let hasher = Hasher::new();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut failed = 0usize;

    for path in &args.files {
        let digests = hasher
            .sample_hash(path)
            .and_then(|sample| Ok((sample, hasher.full_hash(path)?)));
        match digests {
            Ok((sample, full)) => writeln!(
                out,
                "{}  {}  {}",
                hash_to_hex(&sample),
                hash_to_hex(&full),
                path.display()
            )?,
            Err(e) => {
                log::warn!("{e}");
                failed += 1;
            }
        }
    }

    Ok(if failed == 0 {
        ExitCode::Success
    } else {
        ExitCode::GeneralError
    })
}

fn run_init_config(
    args: &InitConfigArgs,
    config: &Config,
    path: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => Config::default_path().context("no configuration directory on this platform")?,
    };
    if path.exists() && !args.force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    config.save(&path)?;
    log::info!("Wrote configuration to {}", path.display());
    Ok(ExitCode::Success)
}
