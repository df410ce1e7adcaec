//! Branch-and-Bound TSP Solver - Command Line Interface
//!
//! Solves, generates, analyzes and benchmarks small TSP instances.

use bnb_tsp_solver::benchmark::{Benchmark, BenchmarkConfig};
use bnb_tsp_solver::graph::Graph;
use bnb_tsp_solver::solver::{BranchAndBoundSolver, CancellationToken, LowerBound, SolverConfig, Termination};
use bnb_tsp_solver::Result;

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "bnb-tsp-solver")]
#[command(version = "1.0")]
#[command(about = "Exact branch-and-bound solver for small TSP instances")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve an instance file or a random graph
    Solve {
        /// Path to a JSON instance file
        #[arg(short, long, required_unless_present = "random")]
        instance: Option<PathBuf>,

        /// Solve a random graph with this many nodes instead
        #[arg(short, long, conflicts_with = "instance")]
        random: Option<usize>,

        /// Edge probability of the random graph
        #[arg(long, default_value = "1.0")]
        density: f64,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Lower bound used for pruning
        #[arg(short, long, value_enum, default_value = "reduced-cost")]
        bound: Bound,

        /// Time limit in seconds
        #[arg(short, long)]
        time_limit: Option<f64>,

        /// Output result to file (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Generate a random instance file
    Generate {
        /// Number of nodes
        #[arg(short, long, default_value = "6")]
        nodes: usize,

        /// Edge probability
        #[arg(long, default_value = "1.0")]
        density: f64,

        #[arg(long, default_value = "1")]
        min_weight: u64,

        #[arg(long, default_value = "100")]
        max_weight: u64,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Output instance file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Analyze an instance
    Analyze {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,
    },

    /// Run benchmarks on random graphs
    Benchmark {
        /// Graph sizes, comma separated
        #[arg(long, value_delimiter = ',', default_value = "6,8,10")]
        sizes: Vec<usize>,

        /// Instances per size
        #[arg(short, long, default_value = "5")]
        runs: usize,

        /// Edge probability
        #[arg(long, default_value = "1.0")]
        density: f64,

        /// Seed of the first instance
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Bounds to compare, comma separated
        #[arg(short, long, value_enum, value_delimiter = ',', default_value = "reduced-cost,admissible")]
        bounds: Vec<Bound>,

        /// Time limit per solve
        #[arg(short, long, default_value = "60")]
        time_limit: f64,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Solve instances one at a time
        #[arg(long)]
        sequential: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Bound {
    /// Cheapest edge per unvisited node plus closing edge (heuristic)
    ReducedCost,
    /// Bound that never overestimates (exact)
    Admissible,
    /// Exhaustive search without pruning
    None,
}

impl From<Bound> for LowerBound {
    fn from(bound: Bound) -> Self {
        match bound {
            Bound::ReducedCost => LowerBound::ReducedCost,
            Bound::Admissible => LowerBound::Admissible,
            Bound::None => LowerBound::None,
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Solve { instance, random, density, seed, bound, time_limit, output, verbose } => {
            solve_instance(instance, random, density, seed, bound.into(), time_limit, output, verbose)
        }

        Commands::Generate { nodes, density, min_weight, max_weight, seed, output } => {
            generate_instance(nodes, density, min_weight, max_weight, seed, &output)
        }

        Commands::Analyze { instance } => analyze_instance(&instance),

        Commands::Benchmark { sizes, runs, density, seed, bounds, time_limit, output, sequential } => {
            let config = BenchmarkConfig {
                sizes,
                runs,
                edge_probability: density,
                seed,
                bounds: bounds.into_iter().map(LowerBound::from).collect(),
                time_limit: Some(time_limit),
                parallel: !sequential,
                output_dir: output.to_string_lossy().to_string(),
                ..Default::default()
            };
            run_benchmark(config)
        }
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_or_generate(instance: Option<PathBuf>, random: Option<usize>, density: f64, seed: u64) -> Result<Graph> {
    match (instance, random) {
        (Some(path), _) => {
            println!("Loading instance from {:?}...", path);
            Graph::from_file(&path)
        }
        (None, Some(n)) => {
            println!("Generating random graph (n={}, density={}, seed={})...", n, density, seed);
            Ok(Graph::random_sparse(n, density, bnb_tsp_solver::graph::DEFAULT_WEIGHT_RANGE, seed)
                .with_name(format!("random-n{}-s{}", n, seed)))
        }
        (None, None) => Ok(Graph::random_complete(6, bnb_tsp_solver::graph::DEFAULT_WEIGHT_RANGE, seed)),
    }
}

#[allow(clippy::too_many_arguments)]
fn solve_instance(
    instance: Option<PathBuf>,
    random: Option<usize>,
    density: f64,
    seed: u64,
    bound: LowerBound,
    time_limit: Option<f64>,
    output: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let graph = load_or_generate(instance, random, density, seed)?;

    if verbose {
        println!("{}", graph.statistics());
    }

    let token = CancellationToken::new();
    let handler_token = token.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        log::warn!("Could not install Ctrl-C handler: {}", e);
    }

    let solver = BranchAndBoundSolver::new(SolverConfig {
        bound,
        time_limit,
        cancellation: Some(token),
    });

    println!("Solving {} nodes with {:?} bound...", graph.node_count(), bound);
    let result = solver.solve_detailed(&graph)?;

    println!("\n========== Results ==========");
    match &result.tour {
        Some(tour) => {
            println!("Cost: {}", tour.cost);
            println!("Tour: {}", tour);
        }
        None if result.termination == Termination::Exhausted => println!("No Hamiltonian cycle exists"),
        None => println!("No cycle found before the search stopped"),
    }
    println!("Termination: {:?}", result.termination);
    println!("Proven optimal: {}", result.is_proven_optimal());
    println!("Time: {:.4}s", result.statistics.elapsed);

    if verbose {
        println!("Branches explored: {}", result.statistics.branches_explored);
        println!("Branches pruned: {}", result.statistics.branches_pruned);
        println!("Complete tours: {}", result.statistics.complete_tours);
        println!("Incumbents: {:?}", result.statistics.incumbent_history);
    }

    if let Some(out_path) = output {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(&out_path, json)?;
        println!("\nResult saved to {:?}", out_path);
    }

    Ok(())
}

fn generate_instance(nodes: usize, density: f64, min_weight: u64, max_weight: u64, seed: u64, output: &Path) -> Result<()> {
    let name = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let graph = Graph::random_sparse(nodes, density, min_weight..=max_weight.max(min_weight), seed).with_name(name);
    graph.save(output)?;
    println!("Instance with {} nodes and {} edges saved to {:?}", nodes, graph.edge_count(), output);
    Ok(())
}

fn analyze_instance(path: &Path) -> Result<()> {
    let graph = Graph::from_file(path)?;
    let stats = graph.statistics();

    println!("========== Instance Analysis ==========\n");
    println!("{}", stats);

    if !stats.may_have_cycle() {
        println!("No Hamiltonian cycle possible (a node has degree < 2)");
        return Ok(());
    }

    let heuristic = BranchAndBoundSolver::with_bound(LowerBound::ReducedCost).solve_detailed(&graph)?;
    let exact = BranchAndBoundSolver::with_bound(LowerBound::Admissible).solve_detailed(&graph)?;

    let cost = |r: &bnb_tsp_solver::ExactResult| r.tour.as_ref().map_or_else(|| "-".to_string(), |t| t.cost.to_string());
    println!("Bound Comparison:");
    println!(
        "  Reduced cost: {} ({} branches, {:.4}s)",
        cost(&heuristic),
        heuristic.statistics.branches_explored,
        heuristic.statistics.elapsed
    );
    println!(
        "  Admissible:   {} ({} branches, {:.4}s)",
        cost(&exact),
        exact.statistics.branches_explored,
        exact.statistics.elapsed
    );
    Ok(())
}

fn run_benchmark(config: BenchmarkConfig) -> Result<()> {
    let output = PathBuf::from(&config.output_dir);
    std::fs::create_dir_all(&output)?;

    let mut benchmark = Benchmark::new(config);
    println!(
        "Benchmarking sizes {:?} with {} runs each...",
        benchmark.config().sizes,
        benchmark.config().runs
    );

    let progress = ProgressBar::new(benchmark.total_solves() as u64);
    progress.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} solves")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    benchmark.run(|| progress.inc(1))?;
    progress.finish();

    let results_path = output.join("results.csv");
    benchmark.export_to_csv(&results_path)?;
    println!("\nResults exported to {:?}", results_path);

    let stats_path = output.join("statistics.csv");
    benchmark.export_statistics_csv(&stats_path)?;
    println!("Statistics exported to {:?}", stats_path);

    let report = benchmark.generate_report();
    println!("\n{}", report);

    let report_path = output.join("report.txt");
    std::fs::write(&report_path, &report)?;
    println!("Report saved to {:?}", report_path);
    Ok(())
}
