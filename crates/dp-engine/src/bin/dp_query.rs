//! DP Query CLI Tool
//!
//! Run differentially private aggregates over a JSON dataset.
//!
//! Usage:
//!   dp-query generate --rows <n> --attributes <k> [--seed <label>]
//!   dp-query run <dataset> --kind <sum|count|mean> --attribute <i> --epsilon <e>
//!   dp-query session <dataset> --queries <file> [--budget <total>]
//!   dp-query local-mean <dataset> --attribute <i> --p <p>
//!   dp-query compose --epsilon <e> --k <queries>

use clap::{Parser, Subcommand, ValueEnum};
use dp_engine::logging::{init_logging, DEFAULT_LOG_LEVEL};
use dp_engine::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "dp-query")]
#[command(version = "0.1.0")]
#[command(about = "Differentially private aggregate queries with budget accounting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: json or compact
    #[arg(short, long, default_value = "json")]
    format: String,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,
}

/// Session settings shared by the query subcommands
#[derive(clap::Args)]
struct SessionArgs {
    /// Engine config file (JSON); other session flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Total epsilon budget for the session
    #[arg(short, long)]
    budget: Option<f64>,

    /// Label for reproducible noise (OS entropy if omitted)
    #[arg(long)]
    seed: Option<String>,

    /// Zero-fill attributes outside the schema instead of failing
    #[arg(long)]
    lenient: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Sum,
    Count,
    Mean,
}

impl From<KindArg> for AggregateKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Sum => AggregateKind::Sum,
            KindArg::Count => AggregateKind::Count,
            KindArg::Mean => AggregateKind::Mean,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a synthetic dataset
    Generate {
        /// Number of records
        #[arg(short, long, default_value = "100")]
        rows: usize,

        /// Attributes per record
        #[arg(short, long, default_value = "3")]
        attributes: usize,

        /// Lower bound of generated values
        #[arg(long, default_value = "0.0")]
        low: f64,

        /// Upper bound of generated values
        #[arg(long, default_value = "1.0")]
        high: f64,

        /// Seed label for the generator
        #[arg(long, default_value = "synthetic-v1")]
        seed: String,
    },

    /// Answer one aggregate query
    Run {
        /// Dataset file (JSON)
        dataset: PathBuf,

        #[arg(short, long, value_enum)]
        kind: KindArg,

        #[arg(short, long)]
        attribute: usize,

        #[arg(short, long)]
        epsilon: f64,

        #[arg(short, long, default_value = "1.0")]
        sensitivity: f64,

        /// Clamp contributions to ±bound instead of ±sensitivity
        #[arg(long)]
        clip_bound: Option<f64>,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Answer a list of queries against one budget
    Session {
        /// Dataset file (JSON)
        dataset: PathBuf,

        /// JSON array of {"kind", "attribute", "epsilon", "sensitivity"?, "clip_bound"?}
        #[arg(short, long)]
        queries: PathBuf,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Randomized-response mean estimate (not charged to the budget)
    LocalMean {
        /// Dataset file (JSON)
        dataset: PathBuf,

        #[arg(short, long)]
        attribute: usize,

        /// Probability of reporting the true value
        #[arg(short, long)]
        p: f64,

        #[arg(long, default_value = "0.0")]
        low: f64,

        #[arg(long, default_value = "1.0")]
        high: f64,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Compare basic and advanced composition for k queries
    Compose {
        #[arg(short, long)]
        epsilon: f64,

        #[arg(short, long)]
        k: usize,

        #[arg(short, long, default_value = "1e-6")]
        delta_prime: f64,
    },
}

#[derive(serde::Serialize)]
struct SessionEntry {
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<QueryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(serde::Serialize)]
struct SessionReport {
    entries: Vec<SessionEntry>,
    ledger: LedgerSnapshot,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let result: serde_json::Value = match cli.command {
        Commands::Generate { rows, attributes, low, high, seed } => {
            let dataset = generate_dataset(rows, attributes, low, high, &seed)?;
            serde_json::to_value(dataset)?
        }
        Commands::Run { dataset, kind, attribute, epsilon, sensitivity, clip_bound, session } => {
            let dataset = load_dataset(&dataset)?;
            let engine = build_engine(&session)?;
            let spec = QuerySpec {
                kind: kind.into(),
                attribute,
                epsilon,
                sensitivity,
                clip_bound,
            };
            let result = engine.run(&spec.build()?, &dataset)?;
            serde_json::json!({
                "result": result,
                "ledger": engine.snapshot(),
            })
        }
        Commands::Session { dataset, queries, session } => {
            let dataset = load_dataset(&dataset)?;
            let engine = build_engine(&session)?;
            let specs: Vec<QuerySpec> = serde_json::from_str(&fs::read_to_string(&queries)?)?;
            let report = run_session(&engine, &specs, &dataset);
            serde_json::to_value(report)?
        }
        Commands::LocalMean { dataset, attribute, p, low, high, session } => {
            let dataset = load_dataset(&dataset)?;
            let engine = build_engine(&session)?;
            let query = LocalMeanQuery::new(attribute, p, low, high)?;
            serde_json::to_value(engine.local_randomized_mean(&query, &dataset)?)?
        }
        Commands::Compose { epsilon, k, delta_prime } => {
            serde_json::to_value(compare_compositions(epsilon, k, delta_prime))?
        }
    };

    let output_str = match cli.format.as_str() {
        "compact" => serde_json::to_string(&result)?,
        _ => serde_json::to_string_pretty(&result)?,
    };

    if let Some(output_path) = cli.output {
        fs::write(&output_path, &output_str)?;
        eprintln!("Output written to: {}", output_path.display());
    } else {
        println!("{}", output_str);
    }

    Ok(())
}

fn load_dataset(path: &Path) -> Result<Dataset, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    Ok(Dataset::from_json_str(&content)?)
}

fn build_engine(args: &SessionArgs) -> Result<QueryEngine, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::new(args.budget.unwrap_or(1.0)),
    };
    if let Some(budget) = args.budget {
        config.total_epsilon = budget;
    }
    if let Some(seed) = &args.seed {
        config.seed = Some(seed.clone());
    }
    if args.lenient {
        config.schema_policy = SchemaPolicy::Lenient;
    }
    Ok(QueryEngine::from_config(&config)?)
}

/// Run queries in order; failures are recorded and the session continues
fn run_session(engine: &QueryEngine, specs: &[QuerySpec], dataset: &Dataset) -> SessionReport {
    let entries = specs
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            let outcome = spec
                .build()
                .map_err(EngineError::from)
                .and_then(|query| engine.run(&query, dataset));
            match outcome {
                Ok(result) => SessionEntry { index, result: Some(result), error: None },
                Err(e) => SessionEntry { index, result: None, error: Some(e.to_string()) },
            }
        })
        .collect();

    SessionReport {
        entries,
        ledger: engine.snapshot(),
    }
}

fn generate_dataset(
    rows: usize,
    attributes: usize,
    low: f64,
    high: f64,
    seed: &str,
) -> Result<Dataset, Box<dyn std::error::Error>> {
    validation::validate_domain(low, high)?;
    let mut rng = ChaCha8Rng::from_seed(*Seed::from_string(seed).as_bytes());
    let records = (0..rows)
        .map(|i| {
            let values = (0..attributes).map(|_| rng.gen_range(low..high)).collect();
            Record::new(format!("row-{:05}", i), values)
        })
        .collect();
    Ok(Dataset::with_width(attributes, records)?)
}
