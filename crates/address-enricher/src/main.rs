//! CLI entry point for the address enricher.

use anyhow::{Context, Result, anyhow, bail};
use address_enricher::credentials::{
    CREDENTIAL_KEY, EnvSecretStore, FileSecretStore, LayeredSecretStore, SecretStore,
};
use address_enricher::mapper::{self, PartialMapping};
use address_enricher::reporting::{ResultWriter, RunReport, output_file_name};
use address_enricher::{EnrichmentConfig, Orchestrator, PreviewStats, Session, csv, planner};
use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[cfg(feature = "ai")]
use address_enricher::ai::{OpenAiConfig, OpenAiExtractor};
#[cfg(feature = "keyring")]
use address_enricher::credentials::KeyringSecretStore;

const DEFAULT_STORE_PATH: &str = ".address-enricher/secrets.json";

/// Where the API key is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    /// Operating system keychain
    Keyring,
    /// JSON file (see --store-path)
    File,
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Fill in Kecamatan and Kelurahan columns of an address CSV using an LLM",
    long_about = "Reads a CSV with a conversation_id column, sends the address column in \
                  batches to an OpenAI-compatible chat endpoint and writes the enriched CSV.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  OPENAI_API_KEY    Used when no key has been saved with `set-key`\n  \
                  RUST_LOG          Overrides --log-level\n\n\
                  EXAMPLES:\n  \
                  # Save the API key once\n  \
                  address-enricher set-key sk-...\n\n  \
                  # Enrich with auto-detected columns\n  \
                  address-enricher enrich -i data.csv\n\n  \
                  # Preview batches without calling the API\n  \
                  address-enricher enrich -i data.csv --dry-run"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings, errors and final result)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Credential store backend
    #[arg(long, value_enum, global = true, default_value = "keyring")]
    store: StoreKind,

    /// Path of the credential file when --store file is used
    #[arg(long, global = true, default_value = DEFAULT_STORE_PATH)]
    store_path: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Save the API key (reads one line from stdin when KEY is omitted)
    SetKey {
        /// The API key
        key: Option<String>,
    },
    /// Delete the saved API key
    ClearKey,
    /// Enrich a CSV file
    Enrich(EnrichArgs),
}

#[derive(Args, Debug)]
struct EnrichArgs {
    /// Path to the CSV file to enrich (must end in .csv)
    #[arg(short, long)]
    input: PathBuf,

    /// Address column (overrides detection)
    #[arg(long)]
    address: Option<String>,

    /// District (kecamatan) column (overrides detection)
    #[arg(long)]
    district: Option<String>,

    /// Sub-district (kelurahan/desa) column (overrides detection)
    #[arg(long)]
    subdistrict: Option<String>,

    /// Output directory for the enriched CSV and report
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Addresses per API request
    #[arg(long, default_value = "10")]
    batch_size: usize,

    /// Pause between batches in milliseconds
    #[arg(long, default_value = "1000")]
    delay_ms: u64,

    /// Retries per failed batch (exponential backoff)
    #[arg(long, default_value = "0")]
    retries: u32,

    /// Required identifier column
    #[arg(long, default_value = "conversation_id")]
    id_column: String,

    /// Chat model
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "60")]
    timeout_secs: u64,

    /// Show mapping and planned batches without calling the API
    #[arg(long)]
    dry_run: bool,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all progress logs; only outputs the final JSON report.
    #[arg(long)]
    json: bool,

    /// Write a JSON report next to the enriched CSV
    #[arg(short = 'r', long)]
    emit_report: bool,
}

impl EnrichArgs {
    fn overrides(&self) -> PartialMapping {
        PartialMapping {
            address: self.address.clone(),
            district: self.district.clone(),
            subdistrict: self.subdistrict.clone(),
        }
    }

    fn config(&self) -> Result<EnrichmentConfig> {
        Ok(EnrichmentConfig::builder()
            .batch_size(self.batch_size)
            .inter_batch_delay_ms(self.delay_ms)
            .max_retries(self.retries)
            .identifier_column(&self.id_column)
            .output_dir(&self.output)
            .build()?)
    }
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env before logging so RUST_LOG from the file applies
    dotenv().ok();

    let json_output = matches!(&cli.command, Command::Enrich(args) if args.json);
    init_logging(&cli.log_level, cli.quiet, json_output);

    let store = open_store(cli.store, &cli.store_path);

    match &cli.command {
        Command::SetKey { key } => set_key(store.as_ref(), key.as_deref()),
        Command::ClearKey => {
            store.delete(CREDENTIAL_KEY)?;
            println!("API key removed from {} store", store.name());
            Ok(())
        }
        Command::Enrich(args) => {
            if args.dry_run {
                return run_dry_run(args);
            }
            let store = Arc::new(LayeredSecretStore::new(store, Arc::new(EnvSecretStore::new())));
            run_enrich(args, store, cli.quiet)
        }
    }
}

fn open_store(kind: StoreKind, path: &Path) -> Arc<dyn SecretStore> {
    match kind {
        #[cfg(feature = "keyring")]
        StoreKind::Keyring => {
            if !KeyringSecretStore::persists_until_deleted() {
                warn!("Keychain backend does not persist across restarts; consider --store file");
            }
            Arc::new(KeyringSecretStore::default())
        }
        #[cfg(not(feature = "keyring"))]
        StoreKind::Keyring => {
            warn!("Keyring support not compiled in, using file store at {}", path.display());
            Arc::new(FileSecretStore::new(path))
        }
        StoreKind::File => Arc::new(FileSecretStore::new(path)),
    }
}

fn set_key(store: &dyn SecretStore, key: Option<&str>) -> Result<()> {
    let key = match key {
        Some(key) => key.to_string(),
        None => {
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("Failed to read API key from stdin")?;
            line
        }
    };

    store.set(CREDENTIAL_KEY, &key)?;
    println!("API key saved to {} store", store.name());
    Ok(())
}

fn read_input(path: &Path) -> Result<(String, String)> {
    if !path.exists() {
        bail!("Input file not found: {}", path.display());
    }
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("Invalid input path: {}", path.display()))?
        .to_string();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok((file_name, text))
}

/// Run dry-run mode - show what would happen without calling the API
///
/// Uses `println!` for user-facing output so it is visible at any log level.
fn run_dry_run(args: &EnrichArgs) -> Result<()> {
    let config = args.config()?;
    let (file_name, text) = read_input(&args.input)?;
    let dataset = csv::load_upload(&file_name, &text, &config.identifier_column)?;

    println!("\n{}", "=".repeat(80));
    println!("DRY RUN - Preview of enrichment");
    println!("{}\n", "=".repeat(80));

    println!("DATASET OVERVIEW");
    println!("{}", "-".repeat(40));
    println!("  File: {}", args.input.display());
    println!("  Rows: {}", dataset.len());
    println!("  Columns: {}", dataset.headers.join(", "));
    println!();

    println!("COLUMN MAPPING");
    println!("{}", "-".repeat(40));
    let detected = mapper::detect(&dataset.headers);
    let overrides = args.overrides();
    for (label, detected, manual) in [
        ("Address", &detected.address, &overrides.address),
        ("District", &detected.district, &overrides.district),
        ("Sub-district", &detected.subdistrict, &overrides.subdistrict),
    ] {
        match (manual, detected) {
            (Some(column), _) => println!("  {:<14} {} (user-specified)", label, column),
            (None, Some(column)) => println!("  {:<14} {} (detected)", label, column),
            (None, None) => println!("  {:<14} <not found>", label),
        }
    }
    println!();

    let mapping = match mapper::resolve(&dataset.headers, &detected, &overrides) {
        Ok(mapping) => mapping,
        Err(e) => {
            println!("  Cannot continue: {}", e);
            println!("  Use --address, --district or --subdistrict to choose columns.");
            return Err(e.into());
        }
    };

    let batches = planner::plan(
        &dataset.rows,
        &mapping,
        &config.identifier_column,
        config.batch_size,
    );
    let stats = PreviewStats {
        total_rows: dataset.len(),
        valid_addresses: batches.iter().map(|b| b.len()).sum(),
        total_batches: batches.len(),
    };
    print_preview(&stats, &config);

    println!("PLANNED BATCHES");
    println!("{}", "-".repeat(40));
    for batch in batches.iter().take(20) {
        let first = batch.records.first().map(|r| r.id.as_str()).unwrap_or("");
        let last = batch.records.last().map(|r| r.id.as_str()).unwrap_or("");
        println!("  Batch {:>3}: {:>3} addresses ({} .. {})", batch.index, batch.len(), first, last);
    }
    if batches.len() > 20 {
        println!("  ... and {} more batches", batches.len() - 20);
    }
    println!();

    println!("OUTPUT FILES (will be created)");
    println!("{}", "-".repeat(40));
    let name = output_file_name(&config.output_prefix, Local::now().date_naive());
    println!("  - {}", config.output_dir.join(name).display());
    println!();

    println!("{}", "=".repeat(80));
    println!("To execute this enrichment, run without --dry-run");
    println!("{}", "=".repeat(80));
    Ok(())
}

fn print_preview(stats: &PreviewStats, config: &EnrichmentConfig) {
    println!("PREVIEW");
    println!("{}", "-".repeat(40));
    println!("  Total rows: {}", stats.total_rows);
    println!("  Valid addresses: {}", stats.valid_addresses);
    println!(
        "  Skipped (blank address): {}",
        stats.total_rows - stats.valid_addresses
    );
    println!(
        "  Batches: {} of up to {}, {}ms apart",
        stats.total_batches, config.batch_size, config.inter_batch_delay_ms
    );
    println!();
}

#[cfg(feature = "ai")]
fn build_orchestrator(
    args: &EnrichArgs,
    config: EnrichmentConfig,
    api_key: &str,
    quiet: bool,
) -> Result<Orchestrator> {
    let client_config = OpenAiConfig::builder()
        .model(&args.model)
        .timeout_secs(args.timeout_secs)
        .build();
    let extractor = Arc::new(OpenAiExtractor::with_config(api_key, client_config)?);

    let mut builder = Orchestrator::builder().config(config).extractor(extractor);

    if !quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!("[{:.0}%] {}", update.percent(), update.message);
        });
    }

    Ok(builder.build()?)
}

#[cfg(not(feature = "ai"))]
fn build_orchestrator(
    _args: &EnrichArgs,
    _config: EnrichmentConfig,
    _api_key: &str,
    _quiet: bool,
) -> Result<Orchestrator> {
    bail!("AI support not compiled in. Rebuild with --features ai, or use --dry-run.")
}

fn run_enrich(args: &EnrichArgs, store: Arc<dyn SecretStore>, quiet: bool) -> Result<()> {
    let config = args.config()?;
    let mut session = Session::with_config(store, config.clone())?;

    let api_key = session
        .credential()
        .map(str::to_string)
        .ok_or_else(|| {
            anyhow!("No API key configured. Run `address-enricher set-key` or set OPENAI_API_KEY.")
        })?;

    let (file_name, text) = read_input(&args.input)?;
    info!("Loading dataset from: {}", args.input.display());
    session.upload(&file_name, &text)?;
    debug!("Detected mapping: {:?}", session.detected_mapping());

    session.confirm_mapping(&args.overrides())?;
    let stats = session.preview()?;
    info!(
        "{} rows, {} with an address, {} batches",
        stats.total_rows, stats.valid_addresses, stats.total_batches
    );

    let orchestrator = build_orchestrator(args, config.clone(), &api_key, quiet)?;
    session.process(&orchestrator)?;

    let summary = session.summary()?;
    let (outcome, mapping) = match (session.outcome(), session.mapping()) {
        (Some(outcome), Some(mapping)) => (outcome, mapping),
        _ => bail!("Enrichment finished without a result"),
    };

    let writer = ResultWriter::new(&config.output_dir, &config.output_prefix);
    let csv_path = writer.write_csv(&outcome.dataset)?;

    let report = RunReport::from_outcome(outcome, mapping)
        .with_input_file(args.input.display().to_string())
        .with_output_file(csv_path.display().to_string())
        .with_model(Some(args.model.as_str()));

    if args.emit_report {
        let report_path = writer.write_report(&report)?;
        info!("Report written to: {}", report_path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.failed_batches > 0 {
        warn!(
            "{} of {} batches failed; their rows were left blank",
            report.failed_batches, report.total_batches
        );
    }
    debug!("Summary: {:?}", summary);
    print_human_readable_summary(&report, &stats);
    Ok(())
}

/// Print a human-readable summary of the run.
fn print_human_readable_summary(report: &RunReport, stats: &PreviewStats) {
    let summary = &report.summary;

    println!();
    println!("{}", "=".repeat(80));
    println!("ENRICHMENT COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!(
        "Input:  {} ({} rows)",
        report.input_file.as_deref().unwrap_or("-"),
        stats.total_rows
    );
    if let Some(ref output_file) = report.output_file {
        println!("Output: {}", output_file);
    }
    println!();

    println!("Results:");
    println!("  Total rows: {}", summary.total);
    println!("  Enriched: {}", summary.enriched_count);
    println!("  Success rate: {}%", summary.success_rate);
    println!("  Duration: {}ms", report.duration_ms);
    println!(
        "  Batches: {} completed, {} failed, {} not run",
        report.completed_batches, report.failed_batches, report.pending_batches
    );
    println!();

    let errors = report.batch_errors();
    if !errors.is_empty() {
        println!("Failed batches:");
        for error in &errors {
            println!("  ! {}", error);
        }
        println!();
    }

    println!("Use --json for machine-readable output");
    println!("Use --emit-report to save detailed JSON report");
    println!("{}", "=".repeat(80));
}
