//! Command-line entry point.
//!
//! ```text
//! filterbench suite [--only STEP]...   run the standard suite, then aggregate
//! filterbench aggregate                summarise reports already on disk
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use filterbench::display::{eprint_suite_report, eprint_summary};
use filterbench::report::DirectorySink;
use filterbench::{
    HarnessConfig, InProcessExecutor, LocalEngineFactory, PlanContext, ReportAggregator,
    SuiteOrchestrator, default_suite, write_summary,
};
use filterbench_core::{BenchResult, TokioTimeProvider};

#[derive(Debug, Parser)]
#[command(name = "filterbench", version, about)]
struct Cli {
    /// JSON configuration file; flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory reports are written to and read from.
    #[arg(long, global = true)]
    report_dir: Option<PathBuf>,

    /// Dataset seed.
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Rows in the standard datasets.
    #[arg(long, global = true)]
    rows: Option<usize>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the benchmark suite against the in-process engine, then aggregate.
    Suite {
        /// Run only these steps, in the order given.
        #[arg(long)]
        only: Vec<String>,
    },
    /// Aggregate existing reports into summary.json.
    Aggregate,
}

impl Cli {
    fn harness_config(&self) -> BenchResult<HarnessConfig> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::from_json_file(path)?,
            None => HarnessConfig::default(),
        };
        if let Some(dir) = &self.report_dir {
            config.report_dir = dir.clone();
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(rows) = self.rows {
            config.rows = rows;
        }
        config.validate()?;
        Ok(config)
    }
}

fn aggregate(config: &HarnessConfig) -> BenchResult<()> {
    let rows = ReportAggregator::new(config.keep_baselines).aggregate_dir(&config.report_dir)?;
    write_summary(&config.report_dir, &rows)?;
    eprint_summary(&rows);
    Ok(())
}

async fn run_suite(config: &HarnessConfig, only: Vec<String>) -> BenchResult<()> {
    let time = TokioTimeProvider::new();
    let factory = LocalEngineFactory::new();
    let ctx = PlanContext::new(&factory, time.clone(), config.seed)
        .idle_timeout(config.idle_timeout())
        .engine_config(config.engine_config())
        .abort_on_first_failure(config.abort_on_first_failure);
    let sink = DirectorySink::new(&config.report_dir)?;
    let mut executor = InProcessExecutor::new(ctx, sink).plans(default_suite(config)?);

    let steps = if only.is_empty() {
        executor.step_names()
    } else {
        only
    };
    let report = SuiteOrchestrator::new(time)
        .steps(steps)
        .step_timeout(config.step_timeout())
        .cleanup_grace(config.idle_timeout())
        .run(&mut executor)
        .await?;
    eprint_suite_report(&report);
    aggregate(config)
}

async fn run(cli: Cli) -> BenchResult<()> {
    let config = cli.harness_config()?;
    match cli.command {
        Command::Suite { only } => run_suite(&config, only).await,
        Command::Aggregate => aggregate(&config),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("filterbench: failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{}", err);
            eprintln!("filterbench: {err}");
            ExitCode::FAILURE
        }
    }
}
