mod config;
mod dataset;
mod simulation;

use anyhow::{Context, Result};
use clap::Parser;
use config::ExperimentConfig;
use netfl_coordinator::{FlClient, LocalBackend, RoundCoordinator, ServerEvaluator};
use netfl_data_provider::ClientPartition;
use netfl_logging::{init_logging, log_file_path, LogOutput};
use netfl_metrics::{ResourceSampler, SysinfoProbe};
use netfl_topology::Topology;
use simulation::NearestCentroid;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tracing::{error, info, Level};

const SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[allow(clippy::large_enum_variant)]
#[derive(Parser, Debug)]
enum Commands {
    /// Check the experiment config and its topology without running anything.
    ValidateConfig {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Print the validated topology.
    Topology {
        #[command(flatten)]
        common: CommonArgs,

        /// Print the description handed to the execution backend, as JSON.
        #[clap(long)]
        json: bool,
    },
    /// Print every client's partition.
    Partition {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Run the experiment with every client simulated in this process.
    Run {
        #[command(flatten)]
        common: CommonArgs,

        /// Where to write the metrics report. Defaults to `results/<name>.json`.
        #[clap(long)]
        report: Option<PathBuf>,
    },
    // Prints the help, optionally as markdown. Used for docs generation.
    #[clap(hide = true)]
    PrintAllHelp {
        #[arg(long, required = true)]
        markdown: bool,
    },
}

#[derive(Parser, Debug, Clone)]
struct CommonArgs {
    /// Path to the experiment TOML
    #[clap(long)]
    config: PathBuf,

    #[clap(long, value_enum, default_value_t = LogOutput::Console)]
    log_output: LogOutput,

    #[clap(long, default_value_t = Level::INFO)]
    log_level: Level,

    /// Also write logs to `<dir>/netfl_<timestamp>.log`
    #[clap(long)]
    log_dir: Option<PathBuf>,
}

impl CommonArgs {
    fn init_logging(&self) -> Result<()> {
        init_logging(
            self.log_output,
            self.log_level,
            self.log_dir.as_deref().map(|dir| log_file_path(dir, "netfl")),
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::ValidateConfig { common } => {
            common.init_logging()?;
            match ExperimentConfig::load(&common.config).and_then(|c| c.validate()) {
                Ok(topology) => info!(
                    clients = topology.num_clients(),
                    budget = %topology.total_budget(),
                    "Configs are OK!"
                ),
                Err(error) => error!("Error found in config: {error:#}"),
            }
        }
        Commands::Topology { common, json } => {
            common.init_logging()?;
            let config = ExperimentConfig::load(&common.config)?;
            let topology = config.validate()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&topology)?);
            } else {
                println!("{}", topology.summary());
            }
        }
        Commands::Partition { common } => {
            common.init_logging()?;
            let config = ExperimentConfig::load(&common.config)?;
            let topology = config.validate()?;
            print_partitions(&config, &topology)?;
        }
        Commands::Run { common, report } => {
            common.init_logging()?;
            let config = ExperimentConfig::load(&common.config)?;
            let topology = config.validate()?;
            let report = report.unwrap_or_else(|| {
                Path::new("results").join(format!("{}.json", config.name))
            });
            run(config, topology, &report).await?;
        }
        Commands::PrintAllHelp { markdown } => {
            // This is a required argument for the time being.
            assert!(markdown);

            let () = clap_markdown::print_help_markdown::<Args>();
        }
    }

    Ok(())
}

fn print_partitions(config: &ExperimentConfig, topology: &Topology) -> Result<()> {
    let data = config.dataset.generate(config.train.seed)?;
    let dataset = data.train.descriptor();
    let assignment =
        config
            .partitioner
            .assign(&dataset, config.train.num_partitions(), config.train.seed)?;

    println!(
        "{} partitioner, {} examples over {} partitions",
        config.partitioner.name(),
        dataset.len(),
        assignment.num_partitions()
    );
    for client_id in topology.client_ids() {
        let partition = ClientPartition::split(
            &assignment,
            client_id,
            config.train.test_size,
            config.train.seed,
            config.train.shuffle,
        )?;
        let histogram = assignment.class_histogram(client_id, &dataset)?;
        let device = topology
            .device(client_id)
            .map(|d| d.name.as_str())
            .unwrap_or("?");
        println!(
            "client {client_id} ({device}): train={} test={} classes={histogram:?}",
            partition.train.len(),
            partition.test.len(),
        );
    }
    Ok(())
}

async fn run(config: ExperimentConfig, topology: Topology, report_path: &Path) -> Result<()> {
    info!(experiment = config.name.as_str(), "Starting experiment\n{}", topology.summary());

    let data = config.dataset.generate(config.train.seed)?;
    let assignment = config.partitioner.assign(
        &data.train.descriptor(),
        config.train.num_partitions(),
        config.train.seed,
    )?;
    let train = Arc::new(data.train);
    let test = Arc::new(data.test);
    let num_classes = config.dataset.num_classes;
    let work_ms = config.dataset.work_ms_per_example;

    let mut clients = Vec::with_capacity(topology.num_clients());
    for client_id in topology.client_ids() {
        let device = topology
            .device(client_id)
            .with_context(|| format!("no device for client {client_id}"))?;
        let partition = ClientPartition::split(
            &assignment,
            client_id,
            config.train.test_size,
            config.train.seed,
            config.train.shuffle,
        )?;
        info!(
            client_id = client_id.0,
            device = device.name.as_str(),
            compute_units = device.budget.compute_units,
            train = partition.train.len(),
            test = partition.test.len(),
            "Created client"
        );
        let primitive =
            NearestCentroid::new(train.clone(), num_classes, work_ms, device.budget.compute_units);
        clients.push(
            FlClient::new(partition, primitive)
                .with_sampler(ResourceSampler::new(SysinfoProbe::new()?, SAMPLE_INTERVAL)),
        );
    }

    let server = topology.server();
    let evaluator = ServerEvaluator::new(
        NearestCentroid::new(test.clone(), num_classes, work_ms, server.budget.compute_units),
        (0..test.len()).collect(),
    );
    let backend = Arc::new(LocalBackend::new(clients, evaluator));

    let mut coordinator = RoundCoordinator::new(
        config.name.clone(),
        config.train.clone(),
        backend,
        NearestCentroid::initial_parameters(num_classes, config.dataset.num_features),
    )?;
    let outcome = coordinator.run().await.map(|history| history.len());

    // whatever rounds completed are still worth keeping
    coordinator
        .report()
        .write_json(report_path)
        .with_context(|| format!("failed to write metrics report to {report_path:?}"))?;

    let rounds = outcome?;
    let report = coordinator.report();
    info!(
        rounds,
        average_train_time = report.average_train_time(),
        average_exchange_time = report.average_exchange_time(),
        final_accuracy = report
            .rounds
            .values()
            .last()
            .and_then(|r| r.evaluate.as_ref())
            .map(|e| e.accuracy),
        "Experiment complete"
    );
    Ok(())
}
