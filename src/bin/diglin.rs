//! DigLin CLI - Command-line interface for DigLin feature extraction
//!
//! Commands:
//! - responses: Build the response-level table of one template
//! - exercises: Build the exercise-level table
//! - validate: Validate exercise documents
//! - columns: Print the column order of a table

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use diglin_features::schema::{Exercise, ExerciseAdapter};
use diglin_features::{
    BatchReport, DerivationScope, ExerciseSource, ExtractionConfig, Extractor, InMemorySource,
    TableEncoder, TemplateKind, DIGLIN_VERSION,
};

/// DigLin - feature extraction for language-learning exercise logs
#[derive(Parser)]
#[command(name = "diglin")]
#[command(author = "DigLin Research")]
#[command(version = DIGLIN_VERSION)]
#[command(about = "Turn exercise event logs into analysis-ready tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the response-level table of one template
    Responses {
        /// Template whose audio rules and columns apply
        #[arg(short, long)]
        template: Option<TemplateKind>,

        #[command(flatten)]
        run: RunOptions,
    },

    /// Build the exercise-level table
    Exercises {
        #[command(flatten)]
        run: RunOptions,
    },

    /// Validate exercise documents
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the column order of a table
    Columns {
        /// Response table of this template
        #[arg(short, long, conflicts_with = "exercise", required_unless_present = "exercise")]
        template: Option<TemplateKind>,

        /// Exercise table
        #[arg(long)]
        exercise: bool,
    },
}

#[derive(Args)]
struct RunOptions {
    /// Input file path (use - for stdin)
    #[arg(short, long)]
    input: PathBuf,

    /// Output file path (use - for stdout)
    #[arg(short, long, default_value = "-")]
    output: PathBuf,

    /// Input format
    #[arg(long, default_value = "ndjson")]
    input_format: InputFormat,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Parallel participant workers
    #[arg(long)]
    workers: Option<usize>,

    /// Where sequence-sensitive derivations restart (participant or exercise)
    #[arg(long)]
    scope: Option<DerivationScope>,

    /// Substring the application id must contain
    #[arg(long)]
    filter: Option<String>,

    /// Only process these participants (repeatable)
    #[arg(long = "participant")]
    participants: Vec<String>,

    /// Fail when any participant could not be processed
    #[arg(long)]
    strict: bool,
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one exercise document per line)
    Ndjson,
    /// JSON array of exercise documents
    Json,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "diglin=info,diglin_features=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<(), DiglinCliError> {
    match cli.command {
        Commands::Responses { template, run } => cmd_responses(template, &run),
        Commands::Exercises { run } => cmd_exercises(&run),
        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),
        Commands::Columns { template, exercise } => cmd_columns(template, exercise),
    }
}

fn cmd_responses(template: Option<TemplateKind>, run: &RunOptions) -> Result<(), DiglinCliError> {
    let mut config = load_config(run)?;
    if template.is_some() {
        config.template = template;
    }
    let extractor = Extractor::new(config)?;
    let source = load_source(&run.input, &run.input_format)?;
    let participants = select_participants(&source, &run.participants)?;

    let report = extractor.response_table(&source, &participants)?;
    finish(report, &run.output, run.strict)
}

fn cmd_exercises(run: &RunOptions) -> Result<(), DiglinCliError> {
    let extractor = Extractor::new(load_config(run)?)?;
    let source = load_source(&run.input, &run.input_format)?;
    let participants = select_participants(&source, &run.participants)?;

    let report = extractor.exercise_table(&source, &participants)?;
    finish(report, &run.output, run.strict)
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), DiglinCliError> {
    let exercises = read_exercises(input, &input_format)?;
    let results = ExerciseAdapter::validate_documents(&exercises);

    let report = ValidationReport {
        total_documents: exercises.len(),
        valid_documents: exercises.len() - results.len(),
        invalid_documents: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                exercise_id: r.exercise_id.clone(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total documents:   {}", report.total_documents);
        println!("Valid documents:   {}", report.valid_documents);
        println!("Invalid documents: {}", report.invalid_documents);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Exercise {} (index {}): {}",
                    err.exercise_id.as_deref().unwrap_or("unknown"),
                    err.index,
                    err.error
                );
            }
        }
    }

    if report.invalid_documents > 0 {
        Err(DiglinCliError::ValidationFailed(report.invalid_documents))
    } else {
        Ok(())
    }
}

fn cmd_columns(template: Option<TemplateKind>, exercise: bool) -> Result<(), DiglinCliError> {
    let columns = match template {
        Some(template) if !exercise => TableEncoder::response_columns(template),
        _ => TableEncoder::exercise_columns(),
    };
    for column in columns {
        println!("{}\t{:?}", column.name, column.kind);
    }
    Ok(())
}

// Helper functions

fn load_config(run: &RunOptions) -> Result<ExtractionConfig, DiglinCliError> {
    let mut config = match &run.config {
        Some(path) => ExtractionConfig::from_file(path)?,
        None => ExtractionConfig::default(),
    };
    if let Some(workers) = run.workers {
        config.workers = workers;
    }
    if let Some(scope) = run.scope {
        config.scope = scope;
    }
    if run.filter.is_some() {
        config.application_filter = run.filter.clone();
    }
    Ok(config)
}

fn read_input(input: &Path) -> Result<String, DiglinCliError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            return Err(DiglinCliError::InteractiveInput);
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_exercises(input: &Path, format: &InputFormat) -> Result<Vec<Exercise>, DiglinCliError> {
    let data = read_input(input)?;
    let exercises = match format {
        InputFormat::Ndjson => ExerciseAdapter::parse_ndjson(&data)?,
        InputFormat::Json => ExerciseAdapter::parse_array(&data)?,
    };
    if exercises.is_empty() {
        return Err(DiglinCliError::NoDocuments);
    }
    Ok(exercises)
}

fn load_source(input: &Path, format: &InputFormat) -> Result<InMemorySource, DiglinCliError> {
    let exercises = read_exercises(input, format)?;
    tracing::info!(documents = exercises.len(), "loaded exercise documents");
    Ok(InMemorySource::new(exercises))
}

fn select_participants(
    source: &InMemorySource,
    requested: &[String],
) -> Result<Vec<String>, DiglinCliError> {
    let known = source.participants()?;
    if requested.is_empty() {
        return Ok(known);
    }
    match requested.iter().find(|p| !known.contains(p)) {
        Some(unknown) => Err(DiglinCliError::UnknownParticipant(unknown.clone())),
        None => Ok(requested.to_vec()),
    }
}

fn finish(report: BatchReport, output: &Path, strict: bool) -> Result<(), DiglinCliError> {
    if output.to_string_lossy() == "-" {
        report.table.write_csv(io::stdout().lock())?;
    } else {
        report.table.write_csv(BufWriter::new(File::create(output)?))?;
    }

    if strict && !report.is_complete() {
        return Err(DiglinCliError::ParticipantsFailed(report.failures.len()));
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum DiglinCliError {
    Io(io::Error),
    Compute(diglin_features::ComputeError),
    Json(serde_json::Error),
    NoDocuments,
    InteractiveInput,
    UnknownParticipant(String),
    ValidationFailed(usize),
    ParticipantsFailed(usize),
}

impl From<io::Error> for DiglinCliError {
    fn from(e: io::Error) -> Self {
        DiglinCliError::Io(e)
    }
}

impl From<diglin_features::ComputeError> for DiglinCliError {
    fn from(e: diglin_features::ComputeError) -> Self {
        DiglinCliError::Compute(e)
    }
}

impl From<serde_json::Error> for DiglinCliError {
    fn from(e: serde_json::Error) -> Self {
        DiglinCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<DiglinCliError> for CliError {
    fn from(e: DiglinCliError) -> Self {
        use diglin_features::ComputeError;

        match e {
            DiglinCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            DiglinCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::ConfigError(_) => {
                        ("CONFIG_ERROR", "Check the configuration file and flags")
                    }
                    ComputeError::UnclassifiableAction { .. } => (
                        "UNCLASSIFIABLE_ACTION",
                        "Check that --template matches the exercises' application ids",
                    ),
                    ComputeError::IoError(_) => ("IO_ERROR", "Check file paths and permissions"),
                    ComputeError::TableError(_) | ComputeError::CsvError(_) => {
                        ("TABLE_ERROR", "Check the output destination")
                    }
                    _ => (
                        "PARSE_ERROR",
                        "Ensure input is an export of exercise documents",
                    ),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            DiglinCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            DiglinCliError::NoDocuments => CliError {
                code: "NO_DOCUMENTS".to_string(),
                message: "No exercise documents found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            DiglinCliError::InteractiveInput => CliError {
                code: "INTERACTIVE_INPUT".to_string(),
                message: "Refusing to read exercise documents from a terminal".to_string(),
                hint: Some("Pipe an export into stdin or pass --input <file>".to_string()),
            },
            DiglinCliError::UnknownParticipant(participant) => CliError {
                code: "UNKNOWN_PARTICIPANT".to_string(),
                message: format!("No exercises found for participant {}", participant),
                hint: Some("Check the participant ids in the export".to_string()),
            },
            DiglinCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} documents failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            DiglinCliError::ParticipantsFailed(count) => CliError {
                code: "PARTICIPANTS_FAILED".to_string(),
                message: format!("{} participants could not be processed", count),
                hint: Some("Run without --strict to keep the partial table; see the log for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_documents: usize,
    valid_documents: usize,
    invalid_documents: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    exercise_id: Option<String>,
    error: String,
}
