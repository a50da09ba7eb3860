//! Backscraper CLI
//!
//! Local driver for the backfill engine: streams records to the console or
//! a JSON Lines file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use backscraper::{
    engine::Backfill,
    error::{AppError, Result},
    models::Config,
    site::PortalSite,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// backscraper - Court record backfill engine
#[derive(Parser, Debug)]
#[command(
    name = "backscraper",
    version,
    about = "Backfills court opinion records from capped, date-ordered search portals"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Backfill all records in a date range
    Backfill {
        /// Start of the range (YYYY-MM-DD, inclusive)
        #[arg(long)]
        start: NaiveDate,

        /// End of the range (YYYY-MM-DD, inclusive)
        #[arg(long)]
        end: NaiveDate,

        /// Court scopes to search (default: every scope in the config)
        #[arg(long = "scope")]
        scopes: Vec<String>,

        /// Stop after this many records
        #[arg(long)]
        limit: Option<usize>,

        /// Write records as JSON Lines to this file instead of the console
        #[arg(long)]
        output: Option<PathBuf>,

        /// Dump every raw response into this directory
        #[arg(long)]
        dump_responses: Option<PathBuf>,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);

    match cli.command {
        Command::Backfill {
            start,
            end,
            scopes,
            limit,
            output,
            dump_responses,
        } => {
            config.validate()?;

            let scopes = if scopes.is_empty() {
                config.scopes.iter().map(|s| s.code.clone()).collect()
            } else {
                for code in &scopes {
                    if config.scope_name(code).is_none() {
                        log::warn!("Scope '{}' is not listed in the config", code);
                    }
                }
                scopes
            };

            let config = Arc::new(config);
            let site = Arc::new(PortalSite::new(&config.portal)?);

            let mut backfill = Backfill::new(Arc::clone(&config), site);
            if let Some(dir) = dump_responses {
                backfill = backfill.with_audit_dir(dir);
            }

            let mut writer = match &output {
                Some(path) => Some(BufWriter::new(File::create(path)?)),
                None => None,
            };

            let mut stream = backfill.stream(start, end, &scopes)?;
            let cancel = stream.cancel_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("Interrupt received; stopping backfill");
                    cancel.cancel();
                }
            });

            let mut count = 0usize;
            while let Some(record) = stream.recv().await {
                match &mut writer {
                    Some(writer) => {
                        let line = serde_json::to_string(&record)?;
                        writeln!(writer, "{line}")?;
                    }
                    None => {
                        log::info!(
                            "[{}] {} ({})",
                            record.scope,
                            record.identifier,
                            record
                                .filed_date
                                .map_or_else(|| "no date".to_string(), |d| d.to_string())
                        );
                    }
                }

                count += 1;
                if limit.is_some_and(|limit| count >= limit) {
                    log::info!("Record limit ({count}) reached; stopping");
                    break;
                }
            }

            if let Some(writer) = &mut writer {
                writer.flush()?;
            }
            log::info!("Backfill finished: {count} records");
            if let Some(path) = output {
                log::info!("Records written to {}", path.display());
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK ({} scopes defined)", config.scopes.len());

            if let Err(e) = PortalSite::new(&config.portal) {
                log::error!("Portal selector check failed: {}", e);
                return Err(AppError::config("Invalid portal selectors"));
            }
            log::info!("✓ Portal selectors parse");

            log::info!("All validations passed!");
        }
    }

    Ok(())
}
