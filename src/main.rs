//! record-loader CLI - Main entry point

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing::error;

use record_loader::commands::{self, ImportOptions};
use record_loader::config::AppConfig;
use record_loader::export::ExportFormat;
use record_loader::filter::FilterSpec;
use record_loader::logging::{init_logging, LogLevel};
use record_loader::model::Record;
use record_loader::state::AppState;
use record_loader::streaming::{parse_date, ImportProgress};
use record_loader::AppError;

#[derive(Parser, Debug)]
#[command(name = "record-loader")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Database file (defaults to RECORD_LOADER_DB or the platform data dir)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Records per insert call during import
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a `;`-delimited file
    Import {
        file: PathBuf,
    },

    /// Inspect a file without importing it
    Check {
        file: PathBuf,
    },

    /// Print stored records
    Query {
        #[command(flatten)]
        filters: FilterArgs,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Export stored records to a file
    Export {
        out: PathBuf,

        /// Output format (inferred from the OUT extension when omitted)
        #[arg(long, value_enum)]
        format: Option<ExportFormatArg>,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Delete every stored record
    Clear {
        /// Confirm the irreversible wipe
        #[arg(long)]
        yes: bool,
    },

    /// Print the number of stored records
    Count,
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Earliest record date (inclusive)
    #[arg(long, value_parser = parse_date_arg)]
    from: Option<NaiveDate>,

    /// Latest record date (inclusive)
    #[arg(long, value_parser = parse_date_arg)]
    to: Option<NaiveDate>,

    #[arg(long)]
    first_name: Option<String>,

    #[arg(long)]
    last_name: Option<String>,

    #[arg(long)]
    sur_name: Option<String>,

    #[arg(long)]
    city: Option<String>,

    #[arg(long)]
    country: Option<String>,
}

impl From<FilterArgs> for FilterSpec {
    fn from(args: FilterArgs) -> Self {
        FilterSpec {
            date_from: args.from,
            date_to: args.to,
            first_name: args.first_name,
            last_name: args.last_name,
            sur_name: args.sur_name,
            city: args.city,
            country: args.country,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ExportFormatArg {
    Xlsx,
    Xml,
    Csv,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Xlsx => ExportFormat::Xlsx,
            ExportFormatArg::Xml => ExportFormat::Xml,
            ExportFormatArg::Csv => ExportFormat::Delimited,
        }
    }
}

fn parse_date_arg(raw: &str) -> Result<NaiveDate, String> {
    parse_date(raw).ok_or_else(|| format!("invalid date {:?}, expected YYYY-MM-DD", raw))
}

#[tokio::main]
async fn main() {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!(error = %e, "Command failed");
        match e.downcast_ref::<AppError>() {
            Some(app_error) => {
                let presentation = app_error.to_presentation();
                eprintln!("{}: {}", presentation.title, presentation.message);
                if let Some(action) = presentation.action {
                    eprintln!("  {}", action);
                }
            }
            None => eprintln!("Error: {:#}", e),
        }
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::from_env().context("Invalid configuration")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.chunk_size = chunk_size;
    }
    if cli.verbose {
        config.log.level = LogLevel::Debug;
    }

    init_logging(&config.log)?;

    let state = AppState::open(config).await?;

    match cli.command {
        Command::Import { file } => import(&state, file).await,
        Command::Check { file } => {
            let report = commands::check_source(&state, &file).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Query { filters, format } => {
            let records = commands::apply_filter(&state, &filters.into()).await?;
            match format {
                OutputFormat::Table => print_table(&records),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
            }
            Ok(())
        }
        Command::Export {
            format,
            out,
            filters,
        } => {
            let format = match format {
                Some(arg) => arg.into(),
                None => ExportFormat::from_path(&out).with_context(|| {
                    format!("Cannot infer export format from {}; pass --format", out.display())
                })?,
            };
            let outcome = commands::export_records(&state, &filters.into(), &out, format).await?;
            println!(
                "Exported {} records to {}",
                outcome.records,
                outcome.path.display()
            );
            Ok(())
        }
        Command::Clear { yes } => {
            if !yes {
                bail!("Refusing to delete all records without --yes");
            }
            let removed = commands::clear_database(&state).await?;
            println!("Deleted {} records", removed);
            Ok(())
        }
        Command::Count => {
            println!("{}", commands::count_records(&state).await?);
            Ok(())
        }
    }
}

async fn import(state: &AppState, file: PathBuf) -> Result<()> {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}% {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let (tx, mut rx) = mpsc::unbounded_channel::<ImportProgress>();
    let committed_pb = pb.clone();
    let progress_task = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            committed_pb.set_message(format!("{} records committed", progress.committed));
        }
    });

    let read_pb = pb.clone();
    let options = ImportOptions {
        progress: Some(tx),
        read_progress: Some(Box::new(move |percent| read_pb.set_position(percent as u64))),
        ..ImportOptions::default()
    };

    // Ctrl-C cancels the run between chunks, including before the first one
    let cancel = options.cancel.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let result = commands::import_file(state, &file, options).await;
    signal_task.abort();
    let _ = progress_task.await;

    match result {
        Ok(summary) => {
            pb.finish_and_clear();
            println!(
                "Imported {} records in {} chunks ({} malformed lines skipped)",
                summary.committed, summary.chunks, summary.skipped
            );
            Ok(())
        }
        Err(e) => {
            pb.abandon();
            Err(e.into())
        }
    }
}

fn print_table(records: &[Record]) {
    println!(
        "{:>8}  {:<10}  {:<16}  {:<16}  {:<16}  {:<16}  {:<16}",
        "ID", "Date", "FirstName", "LastName", "SurName", "City", "Country"
    );
    for r in records {
        println!(
            "{:>8}  {:<10}  {:<16}  {:<16}  {:<16}  {:<16}  {:<16}",
            r.id,
            r.date_text(),
            r.first_name,
            r.last_name,
            r.sur_name,
            r.city,
            r.country
        );
    }
    println!("{} records", records.len());
}
