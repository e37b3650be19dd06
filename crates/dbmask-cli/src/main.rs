mod mssql;
mod registry;
mod settings;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use dbmask_config::{ConfigError, config_json_schema, load_config};
use dbmask_core::{Database, DbError, TableName, redact_connection_string};
use dbmask_engine::{
    AutoConfirm, ConfirmGate, DeterministicCache, MaskingEngine, MaskingError, MaskingReport,
    SqlScratchStore, SqlServerTarget, TableStatus,
};
use mssql::SqlServerConnection;
use registry::{
    RegistryError, RunContext, RunPaths, init_console_logging, init_run_logging, start_run,
    write_report,
};
use settings::{OptionOverrides, SettingsError, load_settings};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("database error: {0}")]
    Database(#[from] DbError),
    #[error(transparent)]
    Masking(#[from] MaskingError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("{failed} table(s) failed, see {}", .report.display())]
    TablesFailed { failed: usize, report: PathBuf },
}

#[derive(Parser, Debug)]
#[command(name = "dbmask", version, about = "Mask SQL Server databases in place")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mask a database according to a configuration file.
    Mask(MaskArgs),
    /// Validate a configuration file without connecting.
    Validate(ValidateArgs),
    /// Print the JSON Schema for configuration files.
    Schema(SchemaArgs),
}

#[derive(Args, Debug)]
struct MaskArgs {
    /// Masking configuration (JSON).
    #[arg(long, short = 'c')]
    config: PathBuf,
    /// ADO.NET connection string.
    #[arg(long, env = "DBMASK_CONNECTION", hide_env_values = true)]
    conn: Option<String>,
    /// Settings file; defaults to ./dbmask.toml when present.
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Output directory for runs.
    #[arg(long)]
    run_dir: Option<PathBuf>,
    /// Rows per UPDATE batch.
    #[arg(long)]
    batch_size: Option<usize>,
    /// Retry budget for unique value generation.
    #[arg(long)]
    retry: Option<u64>,
    /// Every Nth nullable value becomes NULL (0 disables).
    #[arg(long)]
    modulus_factor: Option<u64>,
    /// Command timeout in seconds.
    #[arg(long)]
    command_timeout: Option<u64>,
    /// Pad generated text to the declared column length.
    #[arg(long, default_value_t = false)]
    exact_length: bool,
    /// Generator locale (en_US, pt_BR, fr_FR).
    #[arg(long)]
    locale: Option<String>,
    /// Seed for reproducible output.
    #[arg(long)]
    seed: Option<u64>,
    /// Database that hosts the dictionary scratch table.
    #[arg(long)]
    scratch_database: Option<String>,
    /// Dictionary CSV to load before masking (repeatable).
    #[arg(long = "import-dictionary", value_name = "CSV")]
    import_dictionary: Vec<PathBuf>,
    /// Directory that receives <database>.dictionary.csv.
    #[arg(long = "export-dictionary", value_name = "DIR")]
    export_dictionary: Option<PathBuf>,
    /// Mask every table without asking.
    #[arg(long, short = 'y', default_value_t = false)]
    yes: bool,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Masking configuration (JSON).
    #[arg(long, short = 'c')]
    config: PathBuf,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Write the schema here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Mask(args) => run_mask(args),
        Command::Validate(args) => run_validate(args),
        Command::Schema(args) => run_schema(args),
    }
}

fn run_mask(args: MaskArgs) -> Result<(), CliError> {
    let settings = load_settings(args.settings.as_deref())?;
    let conn = args
        .conn
        .or(settings.connection)
        .ok_or_else(|| CliError::InvalidArgs("connection string is required".to_string()))?;
    let run_dir = args
        .run_dir
        .or(settings.run_dir)
        .unwrap_or_else(|| PathBuf::from("runs"));

    let mut options = settings.masking;
    OptionOverrides {
        batch_size: args.batch_size,
        retry: args.retry,
        modulus_factor: args.modulus_factor,
        command_timeout_secs: args.command_timeout,
        exact_length: args.exact_length,
        locale: args.locale,
        seed: args.seed,
        scratch_database: args.scratch_database,
        dictionary_import: args.import_dictionary,
        dictionary_export_dir: args.export_dictionary,
    }
    .apply(&mut options);

    let validated = load_config(&args.config)?;
    let config = validated.config;

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        database: config.database.clone(),
        config_path: args.config.clone(),
        run_dir,
        options: options.clone(),
        connection: redact_connection_string(&conn),
    };
    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path)?;

    tracing::info!(event = "run_started", run_id = %run_id, database = %config.database);
    for warning in &validated.warnings {
        tracing::warn!(code = %warning.code, path = %warning.path, "{}", warning.message);
    }

    let timer = Instant::now();
    let engine = MaskingEngine::new(options.clone())?.with_run_id(run_id);

    let db = SqlServerConnection::connect(&conn, options.command_timeout_secs)?;
    if !db.database_name().eq_ignore_ascii_case(&config.database) {
        return Err(CliError::InvalidArgs(format!(
            "connected to database '{}' but the configuration targets '{}'",
            db.database_name(),
            config.database
        )));
    }

    let names = engine.scaffold_names(db.database_name());
    let target = SqlServerTarget::new(&db);
    let store = SqlScratchStore::new(&db, options.scratch_database.clone(), names.dictionary_table);
    let mut cache = DeterministicCache::new(store);

    let outcome = if args.yes {
        engine.run(&config, &target, &mut cache, &mut AutoConfirm)
    } else {
        engine.run(&config, &target, &mut cache, &mut PromptConfirm)
    };

    let report = match outcome {
        Ok(report) => report,
        Err(err) => {
            if let Some(report) = err.report() {
                write_report(&run_paths, report)?;
            }
            tracing::error!(event = "run_finished", status = "aborted", error = %err);
            return Err(err.into());
        }
    };
    write_report(&run_paths, &report)?;
    summarize(&report, &run_paths);

    let duration_ms = timer.elapsed().as_millis();
    let failed = report.count(TableStatus::Failed);
    tracing::info!(
        event = "run_finished",
        status = if failed == 0 { "success" } else { "partial" },
        duration_ms = duration_ms
    );

    if failed > 0 {
        return Err(CliError::TablesFailed {
            failed,
            report: run_paths.report_path,
        });
    }
    Ok(())
}

fn summarize(report: &MaskingReport, paths: &RunPaths) {
    for table in &report.tables {
        tracing::info!(
            event = "table_summary",
            table = %format!("{}.{}", table.schema, table.table),
            status = ?table.status,
            rows = table.rows_processed,
            elapsed_ms = table.elapsed_ms
        );
    }
    tracing::info!(
        event = "report_written",
        path = %paths.report_path.display(),
        successful = report.count(TableStatus::Successful),
        skipped = report.count(TableStatus::Skipped),
        failed = report.count(TableStatus::Failed)
    );
}

/// Asks on stdin before each table; anything but `y`/`yes` declines.
struct PromptConfirm;

impl ConfirmGate for PromptConfirm {
    fn confirm(&mut self, table: &TableName) -> bool {
        let mut stderr = io::stderr();
        if write!(stderr, "Mask table {table}? [y/N] ").is_err() || stderr.flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

fn run_validate(args: ValidateArgs) -> Result<(), CliError> {
    init_console_logging()?;
    match load_config(&args.config) {
        Ok(validated) => {
            for warning in &validated.warnings {
                tracing::warn!(code = %warning.code, path = %warning.path, "{}", warning.message);
            }
            tracing::info!(
                event = "config_valid",
                database = %validated.config.database,
                tables = validated.config.tables.len(),
                warnings = validated.warnings.len()
            );
            Ok(())
        }
        Err(ConfigError::Invalid(report)) => {
            for issue in report.errors.iter().chain(report.warnings.iter()) {
                tracing::error!(
                    code = %issue.code,
                    path = %issue.path,
                    hint = issue.hint.as_deref().unwrap_or(""),
                    "{}",
                    issue.message
                );
            }
            Err(CliError::Config(ConfigError::Invalid(report)))
        }
        Err(err) => Err(err.into()),
    }
}

fn run_schema(args: SchemaArgs) -> Result<(), CliError> {
    let schema = serde_json::to_string_pretty(&config_json_schema())?;
    match args.out {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, schema)?;
        }
        None => println!("{schema}"),
    }
    Ok(())
}
