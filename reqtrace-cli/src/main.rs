//! reqtrace - requirement coverage for protocol conformance test suites
//!
//! Command-line front end for the reqtrace-core library: loads requirement
//! tables and test logs, runs the coverage analysis and prints the result
//! for people or tools.

use std::{
    path::{
        Path,
        PathBuf,
    },
    process,
};

use anyhow::{
    Context,
    Result,
    bail,
};
use clap::{
    Args,
    Parser,
    Subcommand,
};
use colored::Colorize;
use reqtrace_core::{
    AnalysisConfig,
    CONFIG_FILE,
    CoverageAnalyzer,
    config::SAMPLE_CONFIG,
    evidence::SAMPLE_LOG,
    find_config,
    requirements::RequirementsFile,
};
use tracing::{
    Level,
    debug,
    info,
};
use tracing_subscriber::{
    EnvFilter,
    FmtSubscriber,
};

mod formatters;

use formatters::OutputFormat;

/// Exit code when `--fail-on-errors` is set and errors were recorded
const EXIT_RECORDED_ERRORS: i32 = 2;

/// Requirement coverage analysis for protocol conformance test suites
#[derive(Parser)]
#[command(name = "reqtrace")]
#[command(
    version,
    about = "Requirement coverage analysis for protocol conformance test suites",
    long_about = "
Requirement coverage analysis for protocol conformance test suites

Examples:
  reqtrace init --dir ./demo
  reqtrace analyze --config ./demo/reqtrace.toml
  reqtrace analyze --table requirements.toml --log logs/ --prefix MS-XYZ_
  reqtrace check --table requirements.toml --output json

Output Formats:
  --output human        Human-readable with colors (default)
  --output json         JSON report for tooling
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Output format for results
    #[arg(long, global = true, value_enum, default_value = "human")]
    output: OutputFormatArg,

    /// Log level (overridden by REQTRACE_LOG)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

/// Available output formats
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OutputFormatArg {
    /// Human-readable format with colors (default)
    Human,
    /// JSON format for tooling
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(format: OutputFormatArg) -> Self {
        match format {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

/// Where tables come from and how they are classified
#[derive(Args, Debug, Default)]
struct InputArgs {
    /// Configuration file (default: nearest reqtrace.toml)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Requirement table file or directory (repeatable)
    #[arg(long = "table", short = 't')]
    tables: Vec<PathBuf>,

    /// Prefix used to complete abbreviated requirement IDs
    #[arg(long)]
    prefix: Option<String>,

    /// Only keep requirements with these delta values (comma-separated)
    #[arg(long, value_delimiter = ',')]
    delta: Option<Vec<String>>,

    /// Ignore the scope column
    #[arg(long)]
    no_scope_check: bool,
}

/// Available subcommands
#[derive(Subcommand)]
enum Commands {
    /// Compute requirement coverage from test logs
    Analyze {
        #[command(flatten)]
        input: InputArgs,

        /// Test log file or directory (repeatable)
        #[arg(long = "log", short = 'l')]
        logs: Vec<PathBuf>,

        /// Exit with status 2 when any error finding is recorded
        #[arg(long)]
        fail_on_errors: bool,
    },

    /// Validate requirement tables and derivations without logs
    Check {
        #[command(flatten)]
        input: InputArgs,

        /// Exit with status 2 when any error finding is recorded
        #[arg(long)]
        fail_on_errors: bool,
    },

    /// Write a sample configuration, table and log
    Init {
        /// Target directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,

        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output_format: OutputFormat = cli.output.into();

    init_tracing(&cli, output_format)?;
    colored::control::set_override(should_use_colors(output_format));

    match cli.command {
        Commands::Analyze {
            ref input,
            ref logs,
            fail_on_errors,
        } => cmd_analyze(input, logs, fail_on_errors, output_format, cli.verbose),
        Commands::Check {
            ref input,
            fail_on_errors,
        } => cmd_check(input, fail_on_errors, output_format, cli.verbose),
        Commands::Init { ref dir, force } => cmd_init(dir, force, output_format),
    }
}

/// Install the global tracing subscriber; JSON output keeps logging silent
fn init_tracing(cli: &Cli, output_format: OutputFormat) -> Result<()> {
    if output_format == OutputFormat::Json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::ERROR)
            .with_writer(std::io::empty)
            .without_time()
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("Failed to set silent tracing subscriber")?;
        return Ok(());
    }

    let level = if cli.verbose { "debug" } else { cli.log_level.as_str() };
    let filter = EnvFilter::try_from_env("REQTRACE_LOG").unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global default tracing subscriber")
}

fn should_use_colors(output_format: OutputFormat) -> bool {
    match output_format {
        OutputFormat::Human => atty::is(atty::Stream::Stdout),
        OutputFormat::Json => false,
    }
}

/// Load the configuration file (explicit or discovered) and apply flags
fn resolve_config(input: &InputArgs) -> Result<AnalysisConfig> {
    let path = match &input.config {
        Some(path) => Some(path.clone()),
        None => {
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            find_config(&cwd)
        },
    };

    let mut config = match path {
        Some(path) => {
            debug!("Using configuration {}", path.display());
            AnalysisConfig::load(&path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?
        },
        None => AnalysisConfig::default(),
    };

    if !input.tables.is_empty() {
        config.input.tables = input.tables.clone();
    }
    if let Some(prefix) = &input.prefix {
        config.scope.requirement_prefix = prefix.clone();
    }
    if let Some(delta) = &input.delta {
        config.scope.delta = Some(delta.clone());
    }
    if input.no_scope_check {
        config.scope.check_scope = false;
    }
    config.scope.validate().context("Invalid scope configuration")?;

    if config.input.tables.is_empty() {
        bail!("No requirement tables given; pass --table or set input.tables in {CONFIG_FILE}");
    }
    Ok(config)
}

fn cmd_analyze(
    input: &InputArgs,
    logs: &[PathBuf],
    fail_on_errors: bool,
    output_format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let mut config = resolve_config(input)?;
    if !logs.is_empty() {
        config.input.logs = logs.to_vec();
    }

    let analyzer = CoverageAnalyzer::from_config(&config).context("Failed to prepare coverage analysis")?;
    let report = analyzer
        .analyze_logs(&config.input.logs)
        .context("Coverage analysis failed")?;

    println!("{}", output_format.render_report(&report, verbose)?);

    if fail_on_errors && report.has_errors() {
        process::exit(EXIT_RECORDED_ERRORS);
    }
    Ok(())
}

fn cmd_check(input: &InputArgs, fail_on_errors: bool, output_format: OutputFormat, verbose: bool) -> Result<()> {
    let config = resolve_config(input)?;
    let analyzer = CoverageAnalyzer::from_config(&config).context("Requirement tables are invalid")?;
    let collection = analyzer.check();

    info!(
        requirements = analyzer.table().len(),
        derivations = analyzer.graph().edge_count(),
        "Checked requirement tables"
    );
    println!("{}", output_format.render_collection(&collection, verbose)?);

    if fail_on_errors && collection.has_errors() {
        process::exit(EXIT_RECORDED_ERRORS);
    }
    Ok(())
}

fn cmd_init(dir: &Path, force: bool, output_format: OutputFormat) -> Result<()> {
    let logs_dir = dir.join("logs");
    std::fs::create_dir_all(&logs_dir)
        .with_context(|| format!("Failed to create {}", logs_dir.display()))?;

    let config_path = dir.join(CONFIG_FILE);
    let table_path = dir.join("requirements.toml");
    let log_path = logs_dir.join("sample.log");

    for path in [&config_path, &table_path, &log_path] {
        if path.exists() && !force {
            bail!("{} already exists; use --force to overwrite", path.display());
        }
    }

    std::fs::write(&config_path, SAMPLE_CONFIG)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    RequirementsFile::init_sample(&table_path)
        .with_context(|| format!("Failed to write {}", table_path.display()))?;
    std::fs::write(&log_path, SAMPLE_LOG)
        .with_context(|| format!("Failed to write {}", log_path.display()))?;

    match output_format {
        OutputFormat::Json => {
            let created = serde_json::json!({
                "config": config_path,
                "table": table_path,
                "log": log_path,
            });
            println!("{}", serde_json::to_string_pretty(&created)?);
        },
        OutputFormat::Human => {
            println!("{} Created {}", "✓".bright_green(), config_path.display());
            println!("{} Created {}", "✓".bright_green(), table_path.display());
            println!("{} Created {}", "✓".bright_green(), log_path.display());
            println!("Run `reqtrace analyze --config {}` to try it.", config_path.display());
        },
    }
    Ok(())
}
