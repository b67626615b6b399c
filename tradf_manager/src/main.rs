use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradf_manager::commands::{self, optimize::Dump, Inputs};

#[derive(Parser)]
#[command(name = "tradf")]
#[command(about = "TRADF - latency-budget scheduling for timed dataflow graphs")]
#[command(version = "0.1.0")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct InputArgs {
    /// TRADF graph description (*.tradf.json)
    graph: PathBuf,

    /// Network delay description (host -> host -> distribution)
    #[arg(short = 'n', long = "network", value_name = "FILE")]
    network: PathBuf,

    /// Scheduler configuration (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,
}

impl From<InputArgs> for Inputs {
    fn from(args: InputArgs) -> Self {
        Inputs {
            graph: args.graph,
            network: args.network,
            config: args.config,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize the schedule for one latency/period ratio
    Optimize {
        #[command(flatten)]
        inputs: InputArgs,

        /// Ratio between the tightest (0) and loosest (1) constraints
        rho: f64,

        /// Directory receiving baseline/ and optimized/ graphs
        #[arg(short = 'o', long = "out-dir", default_value = commands::DEFAULT_OUT_DIR)]
        out_dir: PathBuf,

        /// Do not write the baseline graph
        #[arg(long = "no-baseline")]
        no_baseline: bool,

        /// Do not write the optimized graph
        #[arg(long = "no-optimized")]
        no_optimized: bool,
    },

    /// Optimize at several ratios and report the SNR gain
    Sweep {
        #[command(flatten)]
        inputs: InputArgs,

        /// Ratios to evaluate (default: 0.25 0.5 0.75 1.0)
        #[arg(short = 'r', long = "rho", num_args = 1..)]
        rhos: Vec<f64>,
    },

    /// Generate a randomly allocated schedule
    Random {
        #[command(flatten)]
        inputs: InputArgs,

        /// Ratio (picked uniformly in [0.1, 0.9] if omitted)
        rho: Option<f64>,

        /// Output file
        #[arg(short = 'o', long = "output", default_value = "graphs/scheduled/random.tradf.json")]
        output: PathBuf,
    },

    /// Evaluate given start times
    Manual {
        #[command(flatten)]
        inputs: InputArgs,

        /// Period, e.g. 10ms
        #[arg(short = 'p', long = "period")]
        period: String,

        /// JSON object mapping actor names to start times
        #[arg(short = 's', long = "start-times", value_name = "FILE")]
        start_times: PathBuf,

        /// Write the scheduled graph here
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradf=info,tradf_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run_command(cli.command) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Optimize {
            inputs,
            rho,
            out_dir,
            no_baseline,
            no_optimized,
        } => commands::optimize::run_optimize(
            &inputs.into(),
            rho,
            &out_dir,
            Dump {
                baseline: !no_baseline,
                optimized: !no_optimized,
            },
        ),

        Commands::Sweep { inputs, rhos } => {
            let rhos = if rhos.is_empty() {
                commands::sweep::DEFAULT_RHOS.to_vec()
            } else {
                rhos
            };
            commands::sweep::run_sweep(&inputs.into(), &rhos)
        }

        Commands::Random {
            inputs,
            rho,
            output,
        } => commands::random::run_random(&inputs.into(), rho, &output),

        Commands::Manual {
            inputs,
            period,
            start_times,
            output,
        } => commands::manual::run_manual(&inputs.into(), &period, &start_times, output.as_deref()),
    }
}
