//! Affinity CLI - Command-line interface for the vertical affinity engine
//!
//! Commands:
//! - score: Merge domain frames, score a cohort and write predictions
//! - evaluate: Compare a scored table against observed purchases
//! - check: Validate a feature frame against the feature schema
//! - schema: Print the feature schema for a configuration

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use vertical_affinity::adapters::{
    parse_digital_events, read_frame, write_evaluation_csv, write_scored_csv, write_scored_ndjson,
    CsvAdapter,
};
use vertical_affinity::features::{merge_digital_features, DigitalEventAggregator};
use vertical_affinity::monitor::DistributionMonitor;
use vertical_affinity::{
    AffinityConfig, AffinityError, AffinityPipeline, Evaluator, FeatureFrame, MemberId,
    PipelineInputs, RatioMetric, ReportEncoder, Roster, AFFINITY_VERSION, SCHEMA_VERSION,
};

/// Affinity - score member interest in product verticals
#[derive(Parser)]
#[command(name = "affinity")]
#[command(version = AFFINITY_VERSION)]
#[command(about = "Score member affinity toward product verticals", long_about = None)]
struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a cohort from per-domain frames
    Score {
        /// Member roster (CSV or NDJSON with the member id column)
        #[arg(long)]
        roster: PathBuf,

        /// Digital behavior frame keyed by the digital join column
        #[arg(long, conflicts_with = "digital_events")]
        digital: Option<PathBuf>,

        /// Raw digital events (JSON or NDJSON) to aggregate instead of --digital
        #[arg(long)]
        digital_events: Option<PathBuf>,

        /// Navigation click counts outer-joined onto the aggregated events
        #[arg(long, requires = "digital_events")]
        navigation: Option<PathBuf>,

        /// Reference date for days-since features (defaults to today, UTC)
        #[arg(long)]
        reference_date: Option<NaiveDate>,

        /// Community activity frame
        #[arg(long)]
        activity: PathBuf,

        /// RFM frame
        #[arg(long)]
        rfm: PathBuf,

        /// Validation frame with <vertical>_purchase and <vertical>_sales_share
        #[arg(long)]
        validation: Option<PathBuf>,

        /// File of member ids to exclude, one per line
        #[arg(long)]
        exclude: Option<PathBuf>,

        /// Scored table output path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Scored table format
        #[arg(long, default_value = "csv")]
        output_format: OutputFormat,

        /// Write the JSON run report to this path
        #[arg(long)]
        report: Option<PathBuf>,

        /// Write the evaluation table as CSV to this path
        #[arg(long)]
        evaluation_output: Option<PathBuf>,
    },

    /// Evaluate a previously written scored CSV
    Evaluate {
        /// Scored table (CSV with Predicted_Vertical)
        #[arg(long)]
        scored: PathBuf,

        /// Validation frame
        #[arg(long)]
        validation: PathBuf,

        /// Ratio used to order the printed table
        #[arg(long, default_value = "cvr")]
        sort_by: SortMetric,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a merged feature frame against the schema
    Check {
        /// Feature frame (CSV or NDJSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the feature schema
    Schema {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Comma-separated values with a header row
    Csv,
    /// Newline-delimited JSON (one member per line)
    Ndjson,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortMetric {
    Cvr,
    Purchase,
    SalesShare,
}

impl From<SortMetric> for RatioMetric {
    fn from(metric: SortMetric) -> Self {
        match metric {
            SortMetric::Cvr => RatioMetric::Cvr,
            SortMetric::Purchase => RatioMetric::Purchase,
            SortMetric::SalesShare => RatioMetric::SalesShare,
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let error = CliError::from(e);
            let json =
                serde_json::to_string(&error).unwrap_or_else(|_| "Unknown error".to_string());
            eprintln!("{json}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), AffinityCliError> {
    let config = match &cli.config {
        Some(path) => AffinityConfig::from_path(path)?,
        None => AffinityConfig::default(),
    };

    match cli.command {
        Commands::Score {
            roster,
            digital,
            digital_events,
            navigation,
            reference_date,
            activity,
            rfm,
            validation,
            exclude,
            output,
            output_format,
            report,
            evaluation_output,
        } => cmd_score(
            config,
            ScorePaths {
                roster,
                digital: DigitalSource::new(digital, digital_events, navigation, reference_date),
                activity,
                rfm,
                validation,
                exclude,
            },
            &output,
            output_format,
            report.as_deref(),
            evaluation_output.as_deref(),
        ),

        Commands::Evaluate {
            scored,
            validation,
            sort_by,
            json,
        } => cmd_evaluate(&config, &scored, &validation, sort_by, json),

        Commands::Check { input, json } => cmd_check(config, &input, json),

        Commands::Schema { json } => cmd_schema(&config, json),
    }
}

enum DigitalSource {
    Frame(PathBuf),
    Events {
        events: PathBuf,
        navigation: Option<PathBuf>,
        reference_date: NaiveDate,
    },
    Absent,
}

impl DigitalSource {
    fn new(
        frame: Option<PathBuf>,
        events: Option<PathBuf>,
        navigation: Option<PathBuf>,
        reference_date: Option<NaiveDate>,
    ) -> Self {
        match (frame, events) {
            (Some(path), _) => DigitalSource::Frame(path),
            (None, Some(events)) => DigitalSource::Events {
                events,
                navigation,
                reference_date: reference_date.unwrap_or_else(|| Utc::now().date_naive()),
            },
            (None, None) => DigitalSource::Absent,
        }
    }

    fn load(&self, config: &AffinityConfig) -> Result<FeatureFrame, AffinityCliError> {
        match self {
            DigitalSource::Frame(path) => Ok(read_frame(path, &config.digital_join_column)?),
            DigitalSource::Events {
                events,
                navigation,
                reference_date,
            } => {
                let events = parse_digital_events(&fs::read_to_string(events)?)?;
                let aggregator = DigitalEventAggregator::new(
                    config.feature_verticals.clone(),
                    *reference_date,
                    config.recency_sentinel,
                );
                let frame = aggregator.aggregate(&events)?;
                info!("Aggregated {} digital events into {} accounts", events.len(), frame.len());
                match navigation {
                    Some(path) => {
                        let navigation = read_frame(path, &config.digital_join_column)?;
                        Ok(merge_digital_features(&frame, &navigation)?)
                    }
                    None => Ok(frame),
                }
            }
            DigitalSource::Absent => {
                warn!("No digital behavior provided, digital features will be imputed");
                Ok(FeatureFrame::from_members(Vec::new())?)
            }
        }
    }
}

struct ScorePaths {
    roster: PathBuf,
    digital: DigitalSource,
    activity: PathBuf,
    rfm: PathBuf,
    validation: Option<PathBuf>,
    exclude: Option<PathBuf>,
}

fn cmd_score(
    config: AffinityConfig,
    paths: ScorePaths,
    output: &Path,
    output_format: OutputFormat,
    report: Option<&Path>,
    evaluation_output: Option<&Path>,
) -> Result<(), AffinityCliError> {
    let id_column = config.member_id_column.clone();

    let roster = Roster::from_frame(&read_frame(&paths.roster, &id_column)?);
    let inputs = PipelineInputs {
        roster,
        excluded: match &paths.exclude {
            Some(path) => read_exclusions(path, &id_column)?,
            None => HashSet::new(),
        },
        digital: paths.digital.load(&config)?,
        activity: read_frame(&paths.activity, &id_column)?,
        rfm: read_frame(&paths.rfm, &id_column)?,
        validation: paths
            .validation
            .as_deref()
            .map(|path| read_frame(path, &id_column))
            .transpose()?,
    };

    let pipeline = AffinityPipeline::new(config)?;
    let result = pipeline.run(&inputs)?;
    DistributionMonitor::log_report(&result.distribution);

    let mut buffer = Vec::new();
    match output_format {
        OutputFormat::Csv => write_scored_csv(&result.scored, &id_column, &mut buffer)?,
        OutputFormat::Ndjson => write_scored_ndjson(&result.scored, &id_column, &mut buffer)?,
    }
    write_output(output, &buffer)?;

    if let (Some(path), Some(table)) = (evaluation_output, &result.evaluation) {
        let mut buffer = Vec::new();
        write_evaluation_csv(table, &mut buffer)?;
        fs::write(path, buffer)?;
    }

    if let Some(path) = report {
        let json = ReportEncoder::new().encode_to_json(pipeline.config(), &result)?;
        fs::write(path, json)?;
        info!("Wrote run report to {}", path.display());
    }

    Ok(())
}

fn cmd_evaluate(
    config: &AffinityConfig,
    scored: &Path,
    validation: &Path,
    sort_by: SortMetric,
    json: bool,
) -> Result<(), AffinityCliError> {
    let raw = fs::read_to_string(scored)?;
    let scored = CsvAdapter.parse_scored(&raw, &config.member_id_column, &config.target_verticals)?;
    let validation = read_frame(validation, &config.member_id_column)?;
    let table = Evaluator::evaluate(&scored, &validation, &config.target_verticals)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    let mut buffer = Vec::new();
    write_evaluation_csv(&table, &mut buffer)?;
    io::stdout().write_all(&buffer)?;

    println!();
    println!("Sorted by {} ratio:", sort_label(sort_by));
    for row in table.sorted_by(sort_by.into()) {
        let ratio = match sort_by {
            SortMetric::Cvr => row.cvr_ratio,
            SortMetric::Purchase => row.purchase_ratio,
            SortMetric::SalesShare => row.sales_share_ratio,
        };
        println!(
            "  {:<12} {}",
            row.vertical.as_str(),
            ratio.map_or_else(|| "NaN".to_string(), |r| format!("{r:.4}"))
        );
    }
    Ok(())
}

fn cmd_check(config: AffinityConfig, input: &Path, json: bool) -> Result<(), AffinityCliError> {
    let frame = read_frame(input, &config.member_id_column)?;
    let pipeline = AffinityPipeline::new(config)?;
    let report = pipeline.schema().validate(&frame);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Schema: {}", report.schema_version);
        println!("Members: {}", frame.len());
        println!("Missing columns: {}", report.missing.len());
        for name in &report.missing {
            println!("  - {name}");
        }
        println!("Unclassified columns: {}", report.unclassified.len());
        for name in &report.unclassified {
            println!("  - {name}");
        }
    }

    if report.is_complete() {
        Ok(())
    } else {
        Err(AffinityCliError::SchemaIncomplete(report.missing.len()))
    }
}

fn cmd_schema(config: &AffinityConfig, json: bool) -> Result<(), AffinityCliError> {
    let schema = config.schema();
    let columns: Vec<SchemaColumn> = schema
        .columns()
        .into_iter()
        .map(|key| SchemaColumn {
            score_column: key.score_column_name(),
            column: key.column_name(),
            dimension: key.dimension.key().to_string(),
            vertical: key.vertical.to_string(),
            polarity: format!("{:?}", key.polarity()).to_lowercase(),
            weight: config.weights.get(key.dimension),
        })
        .collect();

    if json {
        let listing = SchemaListing {
            schema_version: SCHEMA_VERSION.to_string(),
            columns,
        };
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        println!("Feature Schema: {SCHEMA_VERSION}");
        println!();
        for column in &columns {
            let weight = column.weight.map_or_else(|| "-".to_string(), |w| w.to_string());
            println!("  {:<36} {:<9} weight {}", column.column, column.polarity, weight);
        }
    }
    Ok(())
}

// Helper functions

fn sort_label(metric: SortMetric) -> &'static str {
    match metric {
        SortMetric::Cvr => "CVR",
        SortMetric::Purchase => "purchase",
        SortMetric::SalesShare => "sales share",
    }
}

fn write_output(output: &Path, data: &[u8]) -> Result<(), AffinityCliError> {
    if output.to_string_lossy() == "-" {
        io::stdout().write_all(data)?;
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

/// One id per line; a header equal to the id column name is skipped
fn read_exclusions(path: &Path, id_column: &str) -> Result<HashSet<MemberId>, AffinityCliError> {
    let raw = fs::read_to_string(path)?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != id_column)
        .map(MemberId::new)
        .collect())
}

#[derive(serde::Serialize)]
struct SchemaListing {
    schema_version: String,
    columns: Vec<SchemaColumn>,
}

#[derive(serde::Serialize)]
struct SchemaColumn {
    column: String,
    score_column: String,
    dimension: String,
    vertical: String,
    polarity: String,
    weight: Option<f64>,
}

// Error types

#[derive(Debug)]
enum AffinityCliError {
    Io(io::Error),
    Engine(AffinityError),
    Json(serde_json::Error),
    SchemaIncomplete(usize),
}

impl From<io::Error> for AffinityCliError {
    fn from(e: io::Error) -> Self {
        AffinityCliError::Io(e)
    }
}

impl From<AffinityError> for AffinityCliError {
    fn from(e: AffinityError) -> Self {
        AffinityCliError::Engine(e)
    }
}

impl From<serde_json::Error> for AffinityCliError {
    fn from(e: serde_json::Error) -> Self {
        AffinityCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<AffinityCliError> for CliError {
    fn from(e: AffinityCliError) -> Self {
        match e {
            AffinityCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            AffinityCliError::Engine(AffinityError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'affinity schema' to list recognized dimensions".to_string()),
            },
            AffinityCliError::Engine(e @ AffinityError::MissingColumns(_)) => CliError {
                code: "SCHEMA_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'affinity check' or disable strict_schema".to_string()),
            },
            AffinityCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(
                    "Check that input frames have unique ids and numeric feature columns"
                        .to_string(),
                ),
            },
            AffinityCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            AffinityCliError::SchemaIncomplete(count) => CliError {
                code: "SCHEMA_INCOMPLETE".to_string(),
                message: format!("{count} schema columns are missing"),
                hint: Some(
                    "Missing columns are skipped when scoring unless strict_schema is set"
                        .to_string(),
                ),
            },
        }
    }
}
