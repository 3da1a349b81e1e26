// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use cmd::commands::{RunOptions, SuiteOverrides, cleanup_command, results_command, run_command, suite_command};
use cmd::common::{StoreContext, StrategyChoice};
use diagnostics::*;
use tablestore::CONNECTION_ENV;

#[derive(Parser, Debug)]
#[command(author, version, about = "Partitioned batch ingestion benchmark", long_about = None)]
#[command(name = "tablebench")]
struct Cli {
    /// Storage target: `memory:`, `file:<dir>`, a directory, or `UseDevelopmentStorage=true`
    #[arg(long, global = true, env = CONNECTION_ENV)]
    connection: Option<String>,

    /// Log debug detail to stderr (overrides TABLEBENCH_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Time one ingestion run
    Run(RunArgs),
    /// Run every combination of batch sizes, partition counts and strategies
    Suite(SuiteArgs),
    /// Show stored results
    Results {
        /// Only this run (timestamp as printed by `suite`)
        #[arg(long)]
        run: Option<String>,
    },
    /// Delete every benchmark table, keeping stored results
    Cleanup,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Number of records to ingest
    #[arg(long, default_value_t = 1000)]
    records: u64,

    /// Operations per transaction (1-100)
    #[arg(long, default_value_t = 100)]
    batch_size: usize,

    /// Partition modulo
    #[arg(long, default_value_t = 10)]
    partitions: u64,

    #[arg(long, value_enum, default_value_t = StrategyChoice::Sequential)]
    strategy: StrategyChoice,

    /// Concurrent flush limit
    #[arg(long, default_value_t = 8)]
    max_in_flight: usize,

    /// Append the result to the results table
    #[arg(long)]
    export: bool,

    /// Keep the run's table afterwards
    #[arg(long)]
    keep: bool,
}

#[derive(Args, Debug)]
struct SuiteArgs {
    /// YAML suite description; flags below override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    records: Option<u64>,

    /// Comma-separated, e.g. 10,50,100
    #[arg(long, value_delimiter = ',')]
    batch_sizes: Option<Vec<usize>>,

    /// Comma-separated, e.g. 1,10
    #[arg(long, value_delimiter = ',')]
    partition_counts: Option<Vec<u64>>,

    /// Comma-separated, e.g. sequential,concurrent
    #[arg(long, value_enum, value_delimiter = ',')]
    strategies: Option<Vec<StrategyChoice>>,

    #[arg(long)]
    max_in_flight: Option<usize>,

    /// Do not write results to the results table
    #[arg(long)]
    no_export: bool,

    /// Keep each run's table afterwards
    #[arg(long)]
    keep: bool,
}

impl SuiteArgs {
    fn overrides(&self) -> SuiteOverrides {
        SuiteOverrides {
            records: self.records,
            batch_sizes: self.batch_sizes.clone(),
            partition_counts: self.partition_counts.clone(),
            strategies: self
                .strategies
                .as_ref()
                .map(|choices| choices.iter().copied().map(Into::into).collect()),
            max_in_flight: self.max_in_flight,
            no_export: self.no_export,
            keep: self.keep,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        diagnostics::init_with(Verbosity::Debug);
    } else {
        diagnostics::init_diagnostics();
    }

    let ctx = StoreContext::resolve(cli.connection.as_deref())?;
    debug!("Using {target}", target: ctx.connection().to_string());
    let store = ctx.open().await?;

    match cli.command {
        Commands::Run(args) => {
            let options = RunOptions {
                records: args.records,
                batch_size: args.batch_size,
                partitions: args.partitions,
                strategy: args.strategy.into(),
                max_in_flight: args.max_in_flight,
                export: args.export,
                keep: args.keep,
            };
            _ = run_command(&store, &options).await?;
        }
        Commands::Suite(args) => {
            let config = args.overrides().resolve(args.config.as_deref())?;
            _ = suite_command(&store, &config).await?;
        }
        Commands::Results { run } => {
            _ = results_command(&store, run.as_deref()).await?;
        }
        Commands::Cleanup => {
            _ = cleanup_command(&store).await?;
        }
    }
    Ok(())
}
