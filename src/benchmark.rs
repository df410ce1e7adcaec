//! Benchmarking and experimentation module.
//!
//! Generates batches of random graphs, solves each of them with every
//! configured lower bound, and aggregates the search statistics. Instances
//! are solved in parallel: each solve owns its search state while the graphs
//! are shared read-only.

use crate::error::Result;
use crate::graph::{Cost, Graph};
use crate::solver::{BranchAndBoundSolver, LowerBound, SolverConfig, Termination};

use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

/// Result of solving one instance with one bound
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    /// Instance name
    pub instance: String,
    /// Number of nodes
    pub node_count: usize,
    /// Number of finite edges
    pub edge_count: usize,
    /// Pruning bound used
    pub bound: LowerBound,
    /// Tour cost, empty if no cycle was found
    pub cost: Option<Cost>,
    pub termination: Termination,
    pub branches_explored: u64,
    pub branches_pruned: u64,
    /// Computation time in seconds
    pub time: f64,
    /// Gap to the best cost any bound found on this instance, in percent
    pub gap_to_best: Option<f64>,
}

/// Aggregated statistics for one (size, bound) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundStatistics {
    pub node_count: usize,
    pub bound: LowerBound,
    /// Number of instances run
    pub num_instances: usize,
    /// Instances where a tour was found
    pub num_solved: usize,
    pub avg_cost: f64,
    pub avg_time: f64,
    pub std_time: f64,
    pub max_time: f64,
    pub avg_explored: f64,
    pub avg_pruned: f64,
    /// Average gap to best known, over solved instances
    pub avg_gap: Option<f64>,
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Graph sizes to generate
    pub sizes: Vec<usize>,
    /// Instances per size
    pub runs: usize,
    /// Probability that an edge exists
    pub edge_probability: f64,
    pub min_weight: u64,
    pub max_weight: u64,
    /// Seed of the first instance; instance `k` uses `seed + k`
    pub seed: u64,
    /// Bounds to compare
    pub bounds: Vec<LowerBound>,
    /// Time limit per solve in seconds
    pub time_limit: Option<f64>,
    /// Solve instances in parallel
    pub parallel: bool,
    /// Output directory
    pub output_dir: String,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            sizes: vec![6, 8, 10],
            runs: 5,
            edge_probability: 1.0,
            min_weight: 1,
            max_weight: 100,
            seed: 42,
            bounds: vec![LowerBound::ReducedCost, LowerBound::Admissible],
            time_limit: Some(60.0),
            parallel: true,
            output_dir: "results".to_string(),
        }
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    results: Vec<BenchmarkRecord>,
    best_known: HashMap<String, Cost>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark {
            config,
            results: Vec::new(),
            best_known: HashMap::new(),
        }
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Number of solves `run` will perform
    pub fn total_solves(&self) -> usize {
        self.config.sizes.len() * self.config.runs * self.config.bounds.len()
    }

    /// Random instances described by the configuration, in size order
    pub fn generate_instances(&self) -> Vec<Graph> {
        let weights = self.config.min_weight..=self.config.max_weight.max(self.config.min_weight);
        let mut instances = Vec::with_capacity(self.config.sizes.len() * self.config.runs);
        for &size in &self.config.sizes {
            for run in 0..self.config.runs {
                let seed = self.config.seed + run as u64;
                let graph = Graph::random_sparse(size, self.config.edge_probability, weights.clone(), seed)
                    .with_name(format!("n{}-s{}", size, seed));
                instances.push(graph);
            }
        }
        instances
    }

    /// Solve one instance with one bound
    pub fn run_instance(&self, graph: &Graph, bound: LowerBound) -> Result<BenchmarkRecord> {
        let solver = BranchAndBoundSolver::new(SolverConfig {
            bound,
            time_limit: self.config.time_limit,
            cancellation: None,
        });
        let result = solver.solve_detailed(graph)?;
        Ok(BenchmarkRecord {
            instance: graph.name().to_string(),
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            bound,
            cost: result.tour.map(|t| t.cost),
            termination: result.termination,
            branches_explored: result.statistics.branches_explored,
            branches_pruned: result.statistics.branches_pruned,
            time: result.statistics.elapsed,
            gap_to_best: None,
        })
    }

    /// Generate and solve every instance with every bound. `on_solved` is
    /// called once per finished solve, possibly from worker threads.
    pub fn run<F>(&mut self, on_solved: F) -> Result<()>
    where
        F: Fn() + Sync,
    {
        let instances = self.generate_instances();
        let jobs: Vec<(&Graph, LowerBound)> = instances
            .iter()
            .flat_map(|g| self.config.bounds.iter().map(move |&b| (g, b)))
            .collect();

        let solve = |&(graph, bound): &(&Graph, LowerBound)| {
            let record = self.run_instance(graph, bound);
            on_solved();
            record
        };
        let records: Vec<BenchmarkRecord> = if self.config.parallel {
            jobs.par_iter().map(solve).collect::<Result<_>>()?
        } else {
            jobs.iter().map(solve).collect::<Result<_>>()?
        };

        for record in records {
            self.record_result(record);
        }
        self.update_gaps();
        Ok(())
    }

    fn record_result(&mut self, record: BenchmarkRecord) {
        match record.cost {
            Some(cost) => {
                let best = self.best_known.entry(record.instance.clone()).or_insert(cost);
                *best = (*best).min(cost);
            }
            None if record.termination == Termination::Exhausted => {
                log::warn!("Instance {} has no Hamiltonian cycle", record.instance);
            }
            None => {}
        }
        self.results.push(record);
    }

    fn update_gaps(&mut self) {
        for record in &mut self.results {
            if let (Some(cost), Some(&best)) = (record.cost, self.best_known.get(&record.instance)) {
                record.gap_to_best = Some(if best == 0 {
                    0.0
                } else {
                    (cost - best) as f64 / best as f64 * 100.0
                });
            }
        }
    }

    /// Compute statistics for each size and bound
    pub fn compute_statistics(&self) -> Vec<BoundStatistics> {
        let mut groups: HashMap<(usize, LowerBound), Vec<&BenchmarkRecord>> = HashMap::new();
        for record in &self.results {
            groups.entry((record.node_count, record.bound)).or_default().push(record);
        }

        let mut statistics: Vec<BoundStatistics> = groups
            .into_iter()
            .map(|((node_count, bound), records)| {
                let costs: Vec<f64> = records.iter().filter_map(|r| r.cost).map(|c| c as f64).collect();
                let times: Vec<f64> = records.iter().map(|r| r.time).collect();
                let gaps: Vec<f64> = records.iter().filter_map(|r| r.gap_to_best).collect();
                let explored: Vec<f64> = records.iter().map(|r| r.branches_explored as f64).collect();
                let pruned: Vec<f64> = records.iter().map(|r| r.branches_pruned as f64).collect();

                BoundStatistics {
                    node_count,
                    bound,
                    num_instances: records.len(),
                    num_solved: costs.len(),
                    avg_cost: mean_or_zero(&costs),
                    avg_time: mean_or_zero(&times),
                    std_time: if times.len() > 1 { times.iter().std_dev() } else { 0.0 },
                    max_time: times.iter().cloned().fold(0.0, f64::max),
                    avg_explored: mean_or_zero(&explored),
                    avg_pruned: mean_or_zero(&pruned),
                    avg_gap: if gaps.is_empty() { None } else { Some(gaps.iter().mean()) },
                }
            })
            .collect();

        statistics.sort_by_key(|s| (s.node_count, s.bound != LowerBound::ReducedCost, s.bound == LowerBound::None));
        statistics
    }

    /// Export results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for result in &self.results {
            writer.serialize(result)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Export statistics to CSV
    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for stat in self.compute_statistics() {
            writer.serialize(stat)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("     Branch-and-Bound TSP Benchmark\n");
        report.push_str("========================================\n");
        report.push_str(&format!("Generated: {}\n\n", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")));

        report.push_str("Bound Performance Summary:\n");
        report.push_str("-".repeat(88).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:>5} {:<12} {:>8} {:>12} {:>12} {:>12} {:>10} {:>10}\n",
            "n", "Bound", "Solved", "Avg Cost", "Explored", "Pruned", "Avg Gap%", "Avg Time"
        ));
        report.push_str("-".repeat(88).as_str());
        report.push('\n');

        for stat in self.compute_statistics() {
            let gap_str = stat
                .avg_gap
                .map(|g| format!("{:.2}%", g))
                .unwrap_or_else(|| "-".to_string());

            report.push_str(&format!(
                "{:>5} {:<12} {:>8} {:>12.2} {:>12.0} {:>12.0} {:>10} {:>10.4}\n",
                stat.node_count,
                format!("{:?}", stat.bound),
                format!("{}/{}", stat.num_solved, stat.num_instances),
                stat.avg_cost,
                stat.avg_explored,
                stat.avg_pruned,
                gap_str,
                stat.avg_time
            ));
        }

        report.push_str("-".repeat(88).as_str());
        report.push('\n');

        let mut slowest: Vec<&BenchmarkRecord> = self.results.iter().collect();
        slowest.sort_by_key(|r| std::cmp::Reverse(OrderedFloat(r.time)));
        report.push_str("\nSlowest Solves:\n");
        for record in slowest.iter().take(5) {
            report.push_str(&format!(
                "  {} ({:?}): {:.4}s, {} branches\n",
                record.instance, record.bound, record.time, record.branches_explored
            ));
        }

        let suboptimal = self
            .results
            .iter()
            .filter(|r| r.gap_to_best.is_some_and(|g| g > 0.0))
            .count();
        report.push_str(&format!("\nSolves above best known cost: {}\n", suboptimal));

        report
    }

    /// Get all results
    pub fn results(&self) -> &[BenchmarkRecord] {
        &self.results
    }

    /// Get best known costs per instance
    pub fn best_known(&self) -> &HashMap<String, Cost> {
        &self.best_known
    }
}

fn mean_or_zero(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().mean()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn small_config() -> BenchmarkConfig {
        BenchmarkConfig {
            sizes: vec![4, 6],
            runs: 3,
            bounds: vec![LowerBound::ReducedCost, LowerBound::Admissible, LowerBound::None],
            time_limit: None,
            ..Default::default()
        }
    }

    #[test]
    fn test_benchmark_config() {
        let config = BenchmarkConfig::default();
        assert_eq!(config.runs, 5);
        assert!(config.parallel);
    }

    #[test]
    fn test_generate_instances() {
        let benchmark = Benchmark::new(small_config());
        let instances = benchmark.generate_instances();
        assert_eq!(instances.len(), 6);
        assert_eq!(instances[0].name(), "n4-s42");
        assert_eq!(instances[5].node_count(), 6);
        assert_eq!(benchmark.total_solves(), 18);
    }

    #[test]
    fn test_run_records_every_solve() {
        let mut benchmark = Benchmark::new(small_config());
        let solved = AtomicUsize::new(0);
        benchmark.run(|| {
            solved.fetch_add(1, Ordering::Relaxed);
        }).unwrap();

        assert_eq!(solved.load(Ordering::Relaxed), 18);
        assert_eq!(benchmark.results().len(), 18);
        assert_eq!(benchmark.best_known().len(), 6);

        for record in benchmark.results() {
            assert!(record.cost.is_some());
            if record.bound != LowerBound::ReducedCost {
                assert_eq!(record.gap_to_best, Some(0.0));
            }
        }

        let stats = benchmark.compute_statistics();
        assert_eq!(stats.len(), 6);
        assert_eq!(stats[0].node_count, 4);
        assert_eq!(stats[0].bound, LowerBound::ReducedCost);
        assert!(stats.iter().all(|s| s.num_solved == 3));

        let none = stats.iter().find(|s| s.node_count == 6 && s.bound == LowerBound::None).unwrap();
        assert_eq!(none.avg_pruned, 0.0);

        let report = benchmark.generate_report();
        assert!(report.contains("Bound Performance Summary"));
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let mut parallel = Benchmark::new(small_config());
        parallel.run(|| {}).unwrap();
        let mut sequential = Benchmark::new(BenchmarkConfig { parallel: false, ..small_config() });
        sequential.run(|| {}).unwrap();

        let costs = |b: &Benchmark| b.results().iter().map(|r| r.cost).collect::<Vec<_>>();
        assert_eq!(costs(&parallel), costs(&sequential));
    }

    #[test]
    fn test_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let mut benchmark = Benchmark::new(small_config());
        benchmark.run(|| {}).unwrap();

        let results_path = dir.path().join("results.csv");
        benchmark.export_to_csv(&results_path).unwrap();
        let content = std::fs::read_to_string(&results_path).unwrap();
        assert!(content.starts_with("instance,node_count,edge_count,bound,cost"));
        assert_eq!(content.lines().count(), 19);

        let stats_path = dir.path().join("statistics.csv");
        benchmark.export_statistics_csv(&stats_path).unwrap();
        assert_eq!(std::fs::read_to_string(&stats_path).unwrap().lines().count(), 7);
    }
}
