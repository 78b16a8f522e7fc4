use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spm_decomposition::config::DEFAULT_PERIOD;
use spm_decomposition::report::{
    program_rows_table, rounded_program_rows, rounded_tax_gap, tax_gap_table,
};
use spm_decomposition::{
    compute_program_effects, compute_tax_gap, CsvSampleLoader, DecompositionConfig,
    DecompositionPipeline, FrameSimulation,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full decomposition and print the summary, optionally exporting JSON/Markdown
    Run(RunArgs),
    /// Print the poverty effect of every program for one sample
    Programs(SampleArgs),
    /// Print computed versus reported federal tax by income decile for one sample
    TaxGap(SampleArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Directory of the raw sample (person.csv, spm_unit.csv, tax_unit.csv)
    #[arg(long)]
    raw: Option<String>,

    /// Directory of the enhanced sample
    #[arg(long)]
    enhanced: Option<String>,

    /// JSON file with configuration overrides
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tax year
    #[arg(long)]
    period: Option<u32>,

    /// Published child poverty rate the waterfall starts from
    #[arg(long)]
    benchmark: Option<f64>,

    /// Locator of one region sample, with {state} standing for the region code
    #[arg(long)]
    states_template: Option<String>,

    /// A comma-separated list of region codes
    #[arg(long, value_delimiter = ',')]
    states: Option<Vec<String>>,

    /// Skip the per-region section
    #[arg(long)]
    skip_states: bool,

    /// Path to export results as JSON
    #[arg(long)]
    output_json: Option<PathBuf>,

    /// Path to export results as Markdown
    #[arg(long)]
    output_markdown: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct SampleArgs {
    /// Directory of the sample
    #[arg(short, long)]
    data: PathBuf,

    /// Tax year
    #[arg(long, default_value_t = DEFAULT_PERIOD)]
    period: u32,
}

/// Defaults, then the config file, then flags.
fn load_config(args: &RunArgs) -> Result<DecompositionConfig> {
    let mut config = match &args.config {
        Some(path) => DecompositionConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => DecompositionConfig::default(),
    };
    if let Some(raw) = &args.raw {
        config.raw_dataset = raw.clone();
    }
    if let Some(enhanced) = &args.enhanced {
        config.enhanced_dataset = enhanced.clone();
    }
    if let Some(period) = args.period {
        config.period = period;
    }
    if let Some(benchmark) = args.benchmark {
        config.benchmark_rate = benchmark;
    }
    if let Some(template) = &args.states_template {
        config.state_dataset_template = template.clone();
    }
    if let Some(states) = &args.states {
        config.states = states.clone();
    }
    if args.skip_states {
        config.skip_states = true;
    }
    config.validate()?;
    Ok(config)
}

fn run_decomposition(args: RunArgs) -> Result<()> {
    let config = load_config(&args)?;
    let loader = CsvSampleLoader::new(config.period);
    let results = DecompositionPipeline::new(config, Box::new(loader)).run()?;
    results.summary();
    if let Some(path) = args.output_json {
        let json = results.to_json().context("serializing results to JSON")?;
        std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    }
    if let Some(path) = args.output_markdown {
        std::fs::write(&path, results.to_markdown())
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

fn run_programs(args: SampleArgs) -> Result<()> {
    let sim = FrameSimulation::from_csv_dir(&args.data, args.period)?;
    let outcomes = compute_program_effects(&sim, args.period)?;
    println!("Program Effects on SPM Poverty ({})", args.period);
    println!("{}", program_rows_table(&rounded_program_rows(&outcomes)));
    Ok(())
}

fn run_tax_gap(args: SampleArgs) -> Result<()> {
    let sim = FrameSimulation::from_csv_dir(&args.data, args.period)?;
    let deciles = compute_tax_gap(&sim, args.period)?;
    println!("Federal Tax Gap by Income Decile ({})", args.period);
    println!("{}", tax_gap_table(&rounded_tax_gap(&deciles)));
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => run_decomposition(args),
        Commands::Programs(args) => run_programs(args),
        Commands::TaxGap(args) => run_tax_gap(args),
    };
    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
