//! HSES CLI - Command-line interface for behavioral risk scoring
//!
//! Commands:
//! - score: Score requests from a file (batch mode)
//! - run: Score NDJSON requests from stdin (streaming mode)
//! - bounds: Print signal bounds (seed, configured, or loaded)
//! - doctor: Diagnose configuration and bounds health

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hses_score::{
    BoundsTable, ScoreError, ScoreProcessor, ScoreReport, ScoreRequest, ScoringConfig, Signal,
    HSES_VERSION, PRODUCER_NAME,
};

/// Environment variable holding the log filter
const ENV_LOG_FILTER: &str = "HSES_LOG";

/// HSES - behavioral risk scoring from telemetry signals
#[derive(Parser)]
#[command(name = "hses")]
#[command(version = HSES_VERSION)]
#[command(about = "Score behavioral telemetry into a contextual risk score", long_about = None)]
struct Cli {
    /// Scoring config (TOML). Falls back to $HSES_CONFIG, then config/hses.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score requests from a file (batch mode)
    Score {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Load bounds from file
        #[arg(long)]
        load_bounds: Option<PathBuf>,

        /// Save bounds to file after processing
        #[arg(long)]
        save_bounds: Option<PathBuf>,
    },

    /// Score NDJSON requests from stdin (streaming mode)
    Run {
        /// Load bounds from file
        #[arg(long)]
        load_bounds: Option<PathBuf>,

        /// Save bounds to file on exit
        #[arg(long)]
        save_bounds: Option<PathBuf>,

        /// Buffer output instead of flushing after each record
        #[arg(long = "no-flush", action = ArgAction::SetFalse)]
        flush: bool,
    },

    /// Print signal bounds
    Bounds {
        /// Show bounds from a saved file instead of the seeds
        #[arg(long)]
        load_bounds: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and bounds health
    Doctor {
        /// Check bounds file
        #[arg(long)]
        bounds: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one request per line)
    Ndjson,
    /// A single request object or a JSON array of requests
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one report per line)
    Ndjson,
    /// JSON array of reports
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr so stdout stays machine-readable
fn init_tracing() {
    let filter = EnvFilter::try_from_env(ENV_LOG_FILTER)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<(), HsesCliError> {
    match cli.command {
        Commands::Score {
            input,
            output,
            input_format,
            output_format,
            load_bounds,
            save_bounds,
        } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_score(
                config,
                &input,
                &output,
                input_format,
                output_format,
                load_bounds.as_deref(),
                save_bounds.as_deref(),
            )
        }

        Commands::Run {
            load_bounds,
            save_bounds,
            flush,
        } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_run(config, load_bounds.as_deref(), save_bounds.as_deref(), flush)
        }

        Commands::Bounds { load_bounds, json } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_bounds(config, load_bounds.as_deref(), json)
        }

        Commands::Doctor { bounds, json } => cmd_doctor(cli.config.as_deref(), bounds.as_deref(), json),
    }
}

fn load_config(path: Option<&Path>) -> Result<ScoringConfig, HsesCliError> {
    let config = match path {
        Some(p) => ScoringConfig::from_path(p)?,
        None => ScoringConfig::load_default()?,
    };
    Ok(config)
}

fn build_processor(
    config: ScoringConfig,
    load_bounds: Option<&Path>,
) -> Result<ScoreProcessor, HsesCliError> {
    let processor = ScoreProcessor::with_config(config)?;
    if let Some(bounds_path) = load_bounds {
        let bounds_json = fs::read_to_string(bounds_path)?;
        processor.load_bounds(&bounds_json)?;
        info!(path = %bounds_path.display(), "loaded signal bounds");
    }
    Ok(processor)
}

fn save_processor_bounds(processor: &ScoreProcessor, path: Option<&Path>) -> Result<(), HsesCliError> {
    if let Some(bounds_path) = path {
        let bounds_json = processor.save_bounds()?;
        fs::write(bounds_path, bounds_json)?;
        info!(path = %bounds_path.display(), "saved signal bounds");
    }
    Ok(())
}

fn cmd_score(
    config: ScoringConfig,
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    load_bounds: Option<&Path>,
    save_bounds: Option<&Path>,
) -> Result<(), HsesCliError> {
    let input_data = read_input(input)?;

    let requests = match input_format {
        InputFormat::Ndjson => parse_ndjson(&input_data)?,
        InputFormat::Json => parse_json(&input_data)?,
    };

    if requests.is_empty() {
        return Err(HsesCliError::NoRequests);
    }

    let processor = build_processor(config, load_bounds)?;

    let (reports, failure) = score_batch(&processor, &requests);
    debug!(count = reports.len(), "scored batch");

    // Bounds widened by requests ahead of a failure are still persisted
    save_processor_bounds(&processor, save_bounds)?;
    if let Some(e) = failure {
        return Err(e.into());
    }

    let output_data = format_output(&reports, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

/// Score requests in order, stopping at the first failure.
///
/// Each request may widen bounds for the ones after it.
fn score_batch(
    processor: &ScoreProcessor,
    requests: &[ScoreRequest],
) -> (Vec<ScoreReport>, Option<ScoreError>) {
    let mut reports = Vec::with_capacity(requests.len());
    for request in requests {
        match processor.score(request) {
            Ok(report) => reports.push(report),
            Err(e) => return (reports, Some(e)),
        }
    }
    (reports, None)
}

fn cmd_run(
    config: ScoringConfig,
    load_bounds: Option<&Path>,
    save_bounds: Option<&Path>,
    flush: bool,
) -> Result<(), HsesCliError> {
    let processor = build_processor(config, load_bounds)?;

    let result = stream_requests(&processor, flush);
    save_processor_bounds(&processor, save_bounds)?;
    result
}

fn stream_requests(processor: &ScoreProcessor, flush: bool) -> Result<(), HsesCliError> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let request: ScoreRequest = serde_json::from_str(trimmed).map_err(|e| {
            HsesCliError::ParseError(format!("Failed to parse request on line {}: {}", index + 1, e))
        })?;

        let report = processor.score(&request)?;
        writeln!(stdout, "{}", serde_json::to_string(&report)?)?;
        if flush {
            stdout.flush()?;
        }
    }

    stdout.flush()?;
    Ok(())
}

fn cmd_bounds(
    config: ScoringConfig,
    load_bounds: Option<&Path>,
    json: bool,
) -> Result<(), HsesCliError> {
    let table = match load_bounds {
        Some(path) => BoundsTable::from_json(&fs::read_to_string(path)?)?,
        None => config.bounds_table()?,
    };

    if json {
        let rows: Vec<BoundsRow> = table
            .iter()
            .map(|(signal, bounds)| BoundsRow {
                signal: signal.name().to_string(),
                min: bounds.min,
                max: bounds.max,
                weight: config.weight(signal),
                direction: signal.direction(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!("Signal Bounds");
        println!("=============");
        for (signal, bounds) in table.iter() {
            println!(
                "  {:<38} min {:>10.2}  max {:>10.2}  weight {:.2}",
                signal.name(),
                bounds.min,
                bounds.max,
                config.weight(signal)
            );
        }
        println!();
        println!("Environments:");
        let environments = config.environment_table();
        for (code, factor) in environments.iter() {
            println!("  {:<6} {:.2}", code, factor);
        }
        println!("  (other) {:.2}", environments.default_factor());
    }

    Ok(())
}

fn cmd_doctor(
    config_path: Option<&Path>,
    bounds: Option<&Path>,
    json: bool,
) -> Result<(), HsesCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "hses_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("HSES version {}", HSES_VERSION),
    });

    checks.push(DoctorCheck {
        name: "signal_registry".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} known signals", Signal::ALL.len()),
    });

    // Check config
    match load_config(config_path) {
        Ok(config) => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "Config valid ({} weight overrides, {} bound overrides)",
                config.weights.len(),
                config.bounds.len()
            ),
        }),
        Err(e) => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: format!("Invalid config: {}", CliError::from(e).message),
        }),
    }

    // Check bounds file if provided
    if let Some(bounds_path) = bounds {
        if bounds_path.exists() {
            match fs::read_to_string(bounds_path) {
                Ok(content) => match BoundsTable::from_json(&content) {
                    Ok(table) => {
                        let widened = table
                            .iter()
                            .filter(|(signal, b)| (b.min, b.max) != signal.seed_bounds())
                            .count();
                        checks.push(DoctorCheck {
                            name: "bounds".to_string(),
                            status: CheckStatus::Ok,
                            message: format!(
                                "Bounds file valid ({} of {} signals moved from seed)",
                                widened,
                                table.len()
                            ),
                        });
                    }
                    Err(e) => checks.push(DoctorCheck {
                        name: "bounds".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Invalid bounds file: {}", e),
                    }),
                },
                Err(e) => checks.push(DoctorCheck {
                    name: "bounds".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read bounds file: {}", e),
                }),
            }
        } else {
            checks.push(DoctorCheck {
                name: "bounds".to_string(),
                status: CheckStatus::Warning,
                message: "Bounds file does not exist".to_string(),
            });
        }
    }

    // Check stdin is available (for streaming mode)
    let stdin_message = if atty::is(atty::Stream::Stdin) {
        "stdin is a TTY (interactive mode)"
    } else {
        "stdin is a pipe (streaming mode ready)"
    };
    checks.push(DoctorCheck {
        name: "stdin".to_string(),
        status: CheckStatus::Ok,
        message: stdin_message.to_string(),
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: HSES_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("HSES Doctor Report");
        println!("==================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(HsesCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn read_input(input: &Path) -> Result<String, HsesCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn parse_ndjson(data: &str) -> Result<Vec<ScoreRequest>, HsesCliError> {
    data.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line.trim()).map_err(|e| {
                HsesCliError::ParseError(format!("Failed to parse request on line {}: {}", index + 1, e))
            })
        })
        .collect()
}

fn parse_json(data: &str) -> Result<Vec<ScoreRequest>, HsesCliError> {
    let value: serde_json::Value = serde_json::from_str(data)?;
    if value.is_array() {
        Ok(serde_json::from_value(value)?)
    } else {
        Ok(vec![serde_json::from_value(value)?])
    }
}

fn format_output(reports: &[ScoreReport], format: &OutputFormat) -> Result<String, HsesCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for report in reports {
                lines.push(serde_json::to_string(report)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(reports)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(reports)?),
    }
}

// Error types

#[derive(Debug)]
enum HsesCliError {
    Io(io::Error),
    Score(ScoreError),
    Json(serde_json::Error),
    NoRequests,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for HsesCliError {
    fn from(e: io::Error) -> Self {
        HsesCliError::Io(e)
    }
}

impl From<ScoreError> for HsesCliError {
    fn from(e: ScoreError) -> Self {
        HsesCliError::Score(e)
    }
}

impl From<serde_json::Error> for HsesCliError {
    fn from(e: serde_json::Error) -> Self {
        HsesCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<HsesCliError> for CliError {
    fn from(e: HsesCliError) -> Self {
        match e {
            HsesCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            HsesCliError::Score(e) => {
                let hint = match &e {
                    ScoreError::InvalidTimeOfDay(_) => "time_of_day must be HH:MM (24-hour)",
                    ScoreError::InvalidSessionLength(_) => {
                        "session_length must be a non-negative number of minutes"
                    }
                    ScoreError::UnknownSignal(_)
                    | ScoreError::InvalidBounds { .. }
                    | ScoreError::ConfigError(_)
                    | ScoreError::TomlError(_) => "Run 'hses doctor' to check the configuration",
                    _ => "Ensure requests carry a signals object of numeric values",
                };
                CliError {
                    code: "SCORE_ERROR".to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            HsesCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            HsesCliError::NoRequests => CliError {
                code: "NO_REQUESTS".to_string(),
                message: "No score requests found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            HsesCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            HsesCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct BoundsRow {
    signal: String,
    min: f64,
    max: f64,
    weight: f64,
    direction: hses_score::RiskDirection,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
