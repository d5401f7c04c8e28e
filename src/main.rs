use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use prince::algorithms::{self, mergesort, pagerank, shortest_path, totalcount, wordcount};
use prince::configuration::get_configuration;
use prince::job::Driver;
use prince::storage::{LocalStorage, Storage};
use prince::telemetry::init_tracing;
use prince::worker::{run_worker, WorkerTask};

#[derive(Parser)]
#[command(name = "prince", version, about = "Map/reduce jobs and iterative algorithms on one machine")]
struct Cli {
    /// Directory that input and output names are relative to.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Write errors of failed jobs to the first unused <TRACE><N>.
    #[arg(long)]
    trace: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Count the occurrences of every word.
    Wordcount { input: String, output: String },
    /// Count all items of a data set.
    Totalcount { input: String, output: String },
    /// Single-source shortest paths with unit weights.
    Dijkstra {
        /// Graph file: each line is a node id followed by the ids it points to.
        graph: String,
        source: String,
        /// Exclusive upper bound on round numbers.
        iteration_max: Option<usize>,
        /// Round to start from, to restart a stopped run.
        #[arg(default_value_t = 1)]
        iteration_start: usize,
    },
    /// PageRank with a uniform initial distribution.
    Pagerank {
        graph: String,
        /// Basename of the output files.
        output: String,
        /// Damping factor within (0,1); 0.85 is usual.
        damping: f64,
        /// Change below which the ranks are considered stable.
        precision: f64,
        iteration_max: Option<usize>,
        #[arg(default_value_t = 1)]
        iteration_start: usize,
        /// `quadratic` (sum of squared changes) or `relative` (largest relative change).
        #[arg(long, default_value = "quadratic")]
        norm: pagerank::Norm,
    },
    /// Merge sort of integers.
    Mergesort { input: String, output: String },
    /// Run one map or reduce task over stdin/stdout.
    Worker {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Bad arguments print the usage and are not a failure.
            let _ = e.print();
            return Ok(());
        }
    };
    init_tracing()?;

    let params = get_configuration().context("Failed to read configuration")?;
    let registry = algorithms::registry();
    let storage = LocalStorage::new(&cli.root);
    let mut driver = Driver::new(storage.clone(), params);
    if let Some(t) = &cli.trace {
        driver = driver.with_trace(t);
    }

    match cli.command {
        Command::Wordcount { input, output } => {
            let (report, text) = wordcount::count_words(&driver, &registry, &input, &output)?;
            eprintln!("{}", report);
            print!("{}", text);
        }
        Command::Totalcount { input, output } => {
            let total = totalcount::count_items(&driver, &registry, &input, &output)?;
            println!("Total items: {}", total);
        }
        Command::Dijkstra {
            graph,
            source,
            iteration_max,
            iteration_start,
        } => {
            let (outcome, distances) = shortest_path::shortest_paths(
                &driver,
                &registry,
                &graph,
                &source,
                iteration_start,
                iteration_max,
            )?;
            println!("rounds: {} ({:?})", outcome.rounds, outcome.reason);
            for (node, d) in distances {
                println!("{}\t{}", node, d);
            }
        }
        Command::Pagerank {
            graph,
            output,
            damping,
            precision,
            iteration_max,
            iteration_start,
            norm,
        } => {
            let graph = storage.locate(&graph);
            let mut alg = pagerank::PageRank::new(
                &registry,
                &graph.to_string_lossy(),
                &output,
                damping,
                precision,
                norm,
            )?;
            let (outcome, ranks) = pagerank::pagerank(&driver, &mut alg, iteration_start, iteration_max)?;
            println!("rounds: {} ({:?})", outcome.rounds, outcome.reason);
            for (node, rank) in ranks {
                println!("{}\t{}", node, rank);
            }
        }
        Command::Mergesort { input, output } => {
            let outcome = mergesort::merge_sort(&driver, &registry, &input, &output)?;
            println!(
                "rounds: {}, sorted numbers in {}_sorted",
                outcome.rounds, output
            );
        }
        Command::Worker { args } => {
            let mut task = WorkerTask::from_args(&args).context("Bad worker arguments")?;
            if task.trace.is_none() {
                task.trace = cli.trace.clone();
            }
            run_worker(&task, &registry, &storage, io::stdin().lock(), io::stdout().lock())?;
        }
    }
    Ok(())
}
