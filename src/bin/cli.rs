use clap::{Parser, Subcommand, ValueEnum};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use aipdrift::{AuditEngine, AuditTableRow, ChangeSet, ChangeSetMerger, ConsoleBuilder, IntegrityUploader, ItemId};
use aipdrift::{LedgerWriter, PackageOrchestrator, ProjectMetadata, SourceCredentials, SourceSession, StoreCredentials};
use aipdrift::{AuditRecord, SwiftStore, UploadOptions, UploadRecord, UploadValidator};
use aipdrift::error::{AipDriftError, StoreError};
use aipdrift::package::DEFAULT_SETTINGS;
use tabled::{Table, settings::Style};

#[derive(Parser)]
#[command(name = "aipdrift")]
#[command(about = "Preserve changed repository items as archival packages and audit them against object storage")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Source repository base URL
    #[arg(short, long, env = "AIPDRIFT_SERVER")]
    server: String,

    /// Directory holding the archival packages
    #[arg(long, env = "BAGGER_OUTPUT_DIR")]
    aip_dir: PathBuf,

    /// Object storage container
    #[arg(short, long, default_value = "cwrc_test")]
    container: String,

    /// Project metadata attached to uploaded objects (YAML)
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// Also write error-level log lines to this file
    #[arg(long)]
    error_log: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, upload, and validate packages for changed items
    Preserve {
        /// Upload ledger (CSV)
        #[arg(short, long)]
        output: PathBuf,

        /// Only items changed since this date
        #[arg(short, long)]
        date: Option<String>,

        /// Package builder application directory
        #[arg(long, env = "BAGGER_APP_DIR")]
        bagger_app_dir: PathBuf,

        /// Builder settings file, relative to the builder directory
        #[arg(long, default_value = DEFAULT_SETTINGS)]
        settings: String,

        /// Process only this item, ignoring --date
        #[arg(long)]
        force_single_node: Option<String>,

        /// Upload files larger than this many bytes in segments
        #[arg(long)]
        segment_size: Option<u64>,
    },

    /// Cross-check source, packages, and storage
    Audit {
        /// Audit ledger (CSV)
        #[arg(short, long)]
        output: PathBuf,

        /// Only items changed since this date
        #[arg(short, long)]
        date: Option<String>,

        /// Summary format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Check that changed items are present in storage with current timestamps
    Validate {
        /// Only items changed since this date
        #[arg(short, long)]
        date: Option<String>,

        /// Check only this item
        #[arg(long)]
        force_single_node: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.error_log.as_deref()) {
        print_error(e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool, error_log: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let filter = if verbose {
        EnvFilter::new("aipdrift=debug,info")
    } else {
        EnvFilter::new("aipdrift=info,warn")
    };

    let error_layer = match error_log {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false)
                    .with_filter(LevelFilter::ERROR),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_filter(filter))
        .with(error_layer)
        .init();
    Ok(())
}

fn print_error(err: Box<dyn std::error::Error>) {
    if let Some(AipDriftError::Store(store_err)) = err.downcast_ref::<AipDriftError>() {
        print_store_error(store_err);
        return;
    }

    eprintln!("\x1b[31m✗ Error:\x1b[0m {}", err);
}

fn print_store_error(err: &StoreError) {
    eprintln!("\n\x1b[31m✗ Object Store Error [{}]\x1b[0m", err.error_code());
    eprintln!("  {}", err);
    eprintln!("\n\x1b[33mSuggestion:\x1b[0m");
    for line in err.suggestion().lines() {
        eprintln!("  {}", line);
    }
    eprintln!();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let credentials = SourceCredentials::from_env()?;
    let session = SourceSession::login(&cli.server, &credentials).await?;

    match cli.command {
        Commands::Preserve { ref output, ref date, ref bagger_app_dir, ref settings, ref force_single_node, segment_size } => {
            let changes = discover(&session, date.as_deref(), force_single_node.as_deref()).await?;
            cmd_preserve(&cli, &changes, output, bagger_app_dir, settings, segment_size).await?;
        }

        Commands::Audit { ref output, ref date, format } => {
            cmd_audit(&cli, &session, output, date.as_deref(), format).await?;
        }

        Commands::Validate { ref date, ref force_single_node } => {
            let changes = discover(&session, date.as_deref(), force_single_node.as_deref()).await?;
            cmd_validate(&cli, &changes).await?;
        }
    }

    Ok(())
}

async fn discover(session: &SourceSession, date: Option<&str>, single: Option<&str>) -> Result<ChangeSet, Box<dyn std::error::Error>> {
    let changes = match single.map(str::trim).filter(|s| !s.is_empty()) {
        Some(id) => ChangeSetMerger::resolve_single(session, &ItemId::new(id)).await?,
        None => ChangeSetMerger::discover(session, date).await?,
    };
    info!(items = changes.len(), "change set ready");
    Ok(changes)
}

async fn connect_store(segment_size: Option<u64>) -> Result<SwiftStore, Box<dyn std::error::Error>> {
    let credentials = StoreCredentials::from_env()?;
    Ok(SwiftStore::connect(&credentials).await?.with_segment_size(segment_size))
}

fn load_metadata(path: Option<&Path>) -> Result<ProjectMetadata, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(ProjectMetadata::load(path)?),
        None => Ok(ProjectMetadata::default()),
    }
}

async fn cmd_preserve(
    cli: &Cli,
    changes: &ChangeSet,
    output: &Path,
    bagger_app_dir: &Path,
    settings: &str,
    segment_size: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    if changes.is_empty() {
        println!("✓ No changed items");
        return Ok(());
    }

    info!("Create AIPs");
    let builder = ConsoleBuilder::islandora_bagger(bagger_app_dir, settings);
    let builds = PackageOrchestrator::new(&builder).build_all(changes).await;
    for failure in &builds.failures {
        warn!(id = %failure.id, reason = %failure.reason, "no package produced");
    }

    info!("Upload AIPs");
    let store = connect_store(segment_size).await?;
    let options = UploadOptions {
        container: cli.container.clone(),
        uploaded_by: std::env::var(aipdrift::config::STORE_USER_ENV).unwrap_or_default(),
        metadata: load_metadata(cli.metadata.as_deref())?,
        segment_size,
    };

    let mut ledger: LedgerWriter<UploadRecord> = LedgerWriter::create(output)?;
    let uploaded = IntegrityUploader::new(&store, options).upload_all(changes, &cli.aip_dir, &mut ledger).await;
    let rows = ledger.finish()?;
    let uploaded = uploaded?;

    info!("Validate Upload");
    let validation = UploadValidator::new(&store, cli.container.as_str()).validate(changes).await;

    println!("\nPreservation Summary:");
    println!("  ✓ {} built", builds.built.len());
    if !builds.is_clean() {
        println!("  ✗ {} build failures", builds.failures.len());
    }
    println!("  ✓ {} uploaded and verified ({} ledger rows in {})", uploaded.uploaded_count(), rows, output.display());
    if uploaded.skipped_count() > 0 {
        println!("  ○ {} without a package", uploaded.skipped_count());
    }
    if validation.is_clean() {
        println!("  ✓ {} validated", validation.checked);
    } else {
        println!("  ⚠ {} validation findings", validation.findings.len());
    }

    Ok(())
}

async fn cmd_audit(
    cli: &Cli,
    session: &SourceSession,
    output: &Path,
    date: Option<&str>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = connect_store(None).await?;
    let engine = AuditEngine::new(&store, cli.container.as_str(), &cli.aip_dir);

    let mut ledger: LedgerWriter<AuditRecord> = LedgerWriter::create(output)?;
    let report = engine.run(session, date, &mut ledger).await;
    ledger.finish()?;
    let report = report?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report.summary())?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            println!("\nAudit Report ({})\n", output.display());

            if report.has_findings() {
                let rows: Vec<AuditTableRow> = report.table_rows();
                let mut table = Table::new(rows);
                table.with(Style::markdown());
                println!("{}\n", table);
            }

            println!("Summary:");
            for count in report.summary() {
                println!("  {} {}", count.count, count.status);
            }
            if !report.has_findings() {
                println!("  ✓ all {} items consistent", report.total());
            }
        }
    }

    Ok(())
}

async fn cmd_validate(cli: &Cli, changes: &ChangeSet) -> Result<(), Box<dyn std::error::Error>> {
    let store = connect_store(None).await?;
    let report = UploadValidator::new(&store, cli.container.as_str()).validate(changes).await;

    if report.is_clean() {
        println!("✓ {} objects validated", report.checked);
        return Ok(());
    }

    for finding in &report.findings {
        println!("  \x1b[31m✗\x1b[0m {} {}: {} {}", finding.id, finding.object, finding.kind.as_str(), finding.detail);
    }
    println!("\n{} of {} objects have findings", report.findings.len(), report.checked);
    Ok(())
}
