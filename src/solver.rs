//! Exact branch-and-bound solver for the TSP.
//!
//! The search is a depth-first enumeration of tours rooted at node 0. Nodes
//! are tried in increasing index order; after each extension a lower bound on
//! the remaining cost is added to the partial cost and the branch is pruned
//! when it cannot beat the incumbent. All search state lives in a
//! [`SearchState`] owned by a single `solve` call, so independent solves can
//! run concurrently over the same read-only [`Graph`].

use crate::error::{Result, TspError};
use crate::graph::{Cost, Graph};
use crate::solution::Tour;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Lower bound used to prune partial tours.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LowerBound {
    /// Sum of the cheapest edge of every unvisited node plus the edge closing
    /// the current node back to the root. Absent edges contribute nothing.
    ///
    /// This is a pruning heuristic, not a proven bound: the closing edge can
    /// exceed the edge actually used to leave the current node, so on some
    /// graphs the optimal tour is pruned and a slightly worse one returned.
    #[default]
    ReducedCost,
    /// Cheapest edge leaving the current node towards an unvisited node (or
    /// the root once all are visited), plus for every unvisited node its
    /// cheapest edge towards another unvisited node or the root. Never
    /// overestimates, so the result is optimal.
    Admissible,
    /// No pruning at all.
    None,
}

/// Shared flag used to abort a running search from another thread.
///
/// ```
/// use bnb_tsp_solver::graph::Graph;
/// use bnb_tsp_solver::solver::{BranchAndBoundSolver, CancellationToken, SolverConfig, Termination};
///
/// let token = CancellationToken::new();
/// let solver = BranchAndBoundSolver::new(SolverConfig {
///     cancellation: Some(token.clone()),
///     ..Default::default()
/// });
/// assert!(solver.config().cancellation.is_some());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// let result = solver.solve_detailed(&Graph::random_complete(5, 1..=100, 7)).unwrap();
/// assert_eq!(result.termination, Termination::Cancelled);
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A token that has not been cancelled yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every search holding a clone of this token to stop at its next
    /// branch iteration. Cannot be undone.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether `cancel` was called on this token or any of its clones.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Solver configuration
#[derive(Debug, Clone, Default)]
pub struct SolverConfig {
    /// Pruning bound
    pub bound: LowerBound,
    /// Time limit in seconds (`None` = unlimited)
    pub time_limit: Option<f64>,
    /// Checked at the top of every branch iteration
    pub cancellation: Option<CancellationToken>,
}

/// Why the search stopped.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Every branch was either explored or pruned.
    Exhausted,
    Cancelled,
    TimeLimit,
}

/// Counters collected during one search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStatistics {
    /// Partial tours that were extended by one node
    pub branches_explored: u64,
    /// Extensions rejected by the bound
    pub branches_pruned: u64,
    /// Complete cycles evaluated against the incumbent
    pub complete_tours: u64,
    /// Cost of every improving tour, in the order found
    pub incumbent_history: Vec<Cost>,
    /// Wall-clock time in seconds
    pub elapsed: f64,
}

/// Result of a detailed solve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExactResult {
    /// Best tour found, `None` if no cycle was found
    pub tour: Option<Tour>,
    pub termination: Termination,
    pub bound: LowerBound,
    pub statistics: SearchStatistics,
}

impl ExactResult {
    /// Whether the tour is guaranteed optimal: the search ran to completion
    /// with a bound that never overestimates.
    pub fn is_proven_optimal(&self) -> bool {
        self.tour.is_some()
            && self.termination == Termination::Exhausted
            && self.bound != LowerBound::ReducedCost
    }

    pub fn into_tour(self) -> Result<Tour> {
        match (self.tour, self.termination) {
            (Some(tour), _) => Ok(tour),
            (None, Termination::Exhausted) => Err(TspError::NoCycleFound),
            (None, _) => Err(TspError::SearchInterrupted),
        }
    }
}

/// Per-solve mutable state.
///
/// Invariants: `path` starts at the root, holds no duplicate and
/// `visited[v]` is true exactly for the nodes in `path`. `best_cost` is
/// `None` until the first complete cycle and never increases afterwards.
#[derive(Debug)]
struct SearchState {
    visited: Vec<bool>,
    path: Vec<usize>,
    best_cost: Option<Cost>,
    best_path: Vec<usize>,
    statistics: SearchStatistics,
}

impl SearchState {
    fn new(node_count: usize) -> Self {
        let mut visited = vec![false; node_count];
        visited[0] = true;
        let mut path = Vec::with_capacity(node_count);
        path.push(0);
        SearchState {
            visited,
            path,
            best_cost: None,
            best_path: Vec::new(),
            statistics: SearchStatistics::default(),
        }
    }

    fn push(&mut self, node: usize) {
        self.visited[node] = true;
        self.path.push(node);
    }

    fn pop(&mut self) {
        if let Some(node) = self.path.pop() {
            self.visited[node] = false;
        }
    }
}

/// Depth-first branch-and-bound search over one graph.
struct Search<'a> {
    graph: &'a Graph,
    config: &'a SolverConfig,
    start: Instant,
    state: SearchState,
    stopped: Option<Termination>,
    /// Cancel once this many branches were explored.
    #[cfg(test)]
    cancel_after: Option<u64>,
}

impl<'a> Search<'a> {
    fn new(graph: &'a Graph, config: &'a SolverConfig) -> Self {
        Search {
            graph,
            config,
            start: Instant::now(),
            state: SearchState::new(graph.node_count()),
            stopped: None,
            #[cfg(test)]
            cancel_after: None,
        }
    }

    fn should_stop(&mut self) -> bool {
        if self.stopped.is_some() {
            return true;
        }
        #[cfg(test)]
        if self.cancel_after.is_some_and(|limit| self.state.statistics.branches_explored >= limit) {
            self.stopped = Some(Termination::Cancelled);
            return true;
        }
        if self.config.cancellation.as_ref().is_some_and(|t| t.is_cancelled()) {
            self.stopped = Some(Termination::Cancelled);
        } else if self
            .config
            .time_limit
            .is_some_and(|limit| self.start.elapsed().as_secs_f64() >= limit)
        {
            self.stopped = Some(Termination::TimeLimit);
        }
        self.stopped.is_some()
    }

    /// Whether a (partial) cost is strictly below the incumbent. Everything
    /// beats a missing incumbent.
    fn beats_incumbent(&self, cost: Cost) -> bool {
        self.state.best_cost.map_or(true, |best| cost < best)
    }

    fn extend(&mut self, node: usize, depth: usize, cost: Cost) {
        let n = self.graph.node_count();

        if depth == n {
            if let Some(back) = self.graph.at(node, 0).cost() {
                self.state.statistics.complete_tours += 1;
                let total = cost + back;
                if self.beats_incumbent(total) {
                    log::debug!("New incumbent {} via {:?}", total, self.state.path);
                    self.state.best_cost = Some(total);
                    self.state.best_path = self.state.path.clone();
                    self.state.statistics.incumbent_history.push(total);
                }
            }
            return;
        }

        for i in 0..n {
            if self.should_stop() {
                return;
            }
            if self.state.visited[i] {
                continue;
            }
            let Some(w) = self.graph.at(node, i).cost() else {
                continue;
            };

            self.state.push(i);
            self.state.statistics.branches_explored += 1;

            let new_cost = cost + w;
            let promising = match self.config.bound {
                LowerBound::ReducedCost => self.beats_incumbent(new_cost + self.reduced_cost_bound(i)),
                LowerBound::Admissible => self
                    .admissible_bound(i)
                    .is_some_and(|bound| self.beats_incumbent(new_cost + bound)),
                LowerBound::None => true,
            };

            if promising {
                self.extend(i, depth + 1, new_cost);
            } else {
                self.state.statistics.branches_pruned += 1;
            }

            self.state.pop();
        }
    }

    /// Estimated cost still needed to close a tour whose last node is
    /// `current`. Absent edges contribute nothing.
    fn reduced_cost_bound(&self, current: usize) -> Cost {
        let graph = self.graph;
        let n = graph.node_count();

        let cheapest_edges: Cost = (0..n)
            .filter(|&u| !self.state.visited[u])
            .filter_map(|u| (0..n).filter(|&j| j != u).filter_map(|j| graph.at(u, j).cost()).min())
            .sum();
        cheapest_edges + graph.at(current, 0).cost().unwrap_or(0)
    }

    /// Bound that never overestimates the cost of closing the tour; `None`
    /// when the partial tour cannot be completed.
    fn admissible_bound(&self, current: usize) -> Option<Cost> {
        let graph = self.graph;
        let visited = &self.state.visited;
        let n = graph.node_count();
        let is_target = |j: usize| !visited[j] || j == 0;

        let leave = if visited.iter().all(|&v| v) {
            graph.at(current, 0).cost()
        } else {
            (0..n)
                .filter(|&j| !visited[j])
                .filter_map(|j| graph.at(current, j).cost())
                .min()
        };

        let mut bound = leave?;
        for u in (0..n).filter(|&u| !visited[u]) {
            bound += (0..n)
                .filter(|&j| j != u && is_target(j))
                .filter_map(|j| graph.at(u, j).cost())
                .min()?;
        }
        Some(bound)
    }

    /// Turn the finished (or stopped) search into its result.
    fn finish(self) -> ExactResult {
        debug_assert_eq!(self.state.path, vec![0]);
        debug_assert_eq!(self.state.visited.iter().filter(|&&v| v).count(), 1);

        let termination = self.stopped.unwrap_or(Termination::Exhausted);
        let mut statistics = self.state.statistics;
        statistics.elapsed = self.start.elapsed().as_secs_f64();

        let best_path = self.state.best_path;
        let tour = self.state.best_cost.map(|cost| Tour::new(cost, best_path));

        match (&tour, termination) {
            (_, Termination::Cancelled) => log::warn!("Search cancelled after {} branches", statistics.branches_explored),
            (_, Termination::TimeLimit) => log::warn!("Search hit its time limit after {:.3}s", statistics.elapsed),
            (None, Termination::Exhausted) => {
                log::debug!("No Hamiltonian cycle in {}-node graph", self.graph.node_count())
            }
            _ => {}
        }
        log::info!(
            "Search finished: cost={} explored={} pruned={} time={:.4}s",
            tour.as_ref().map_or_else(|| "-".to_string(), |t| t.cost.to_string()),
            statistics.branches_explored,
            statistics.branches_pruned,
            statistics.elapsed
        );

        ExactResult {
            tour,
            termination,
            bound: self.config.bound,
            statistics,
        }
    }
}

/// Branch-and-bound TSP solver
#[derive(Debug, Clone, Default)]
pub struct BranchAndBoundSolver {
    config: SolverConfig,
}

impl BranchAndBoundSolver {
    /// Create a solver that runs every search with `config`.
    pub fn new(config: SolverConfig) -> Self {
        BranchAndBoundSolver { config }
    }

    /// Solver with the given bound, no time limit and no cancellation token.
    pub fn with_bound(bound: LowerBound) -> Self {
        Self::new(SolverConfig { bound, ..Default::default() })
    }

    /// Configuration used by every call to `solve`.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Minimum-cost Hamiltonian cycle rooted at node 0.
    ///
    /// Fails with `NoCycleFound` when no cycle through all nodes exists,
    /// `EmptyGraph` on a graph without nodes and `SearchInterrupted` when the
    /// search was stopped before any cycle was found.
    pub fn solve(&self, graph: &Graph) -> Result<Tour> {
        self.solve_detailed(graph)?.into_tour()
    }

    /// Run the search and report the best tour with search statistics.
    pub fn solve_detailed(&self, graph: &Graph) -> Result<ExactResult> {
        let n = graph.node_count();
        if n == 0 {
            return Err(TspError::EmptyGraph);
        }
        if n == 1 {
            return Ok(ExactResult {
                tour: Some(Tour::single_node()),
                termination: Termination::Exhausted,
                bound: self.config.bound,
                statistics: SearchStatistics::default(),
            });
        }

        log::debug!("Solving {} nodes with {:?} bound", n, self.config.bound);
        let mut search = Search::new(graph, &self.config);
        search.extend(0, 1, 0);
        Ok(search.finish())
    }
}

/// Solve with the default configuration.
pub fn solve(graph: &Graph) -> Result<Tour> {
    BranchAndBoundSolver::default().solve(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Weight;

    fn from_edges(n: usize, edges: &[(usize, usize, i64)]) -> Graph {
        let mut graph = Graph::new(n);
        for &(a, b, w) in edges {
            graph.set_weight(a, b, w).unwrap();
        }
        graph
    }

    fn four_city() -> Graph {
        from_edges(
            4,
            &[(0, 1, 10), (0, 2, 15), (0, 3, 20), (1, 2, 35), (1, 3, 25), (2, 3, 30)],
        )
    }

    /// Graph on which the reduced-cost bound prunes the optimal tour.
    fn bound_counterexample() -> Graph {
        from_edges(
            7,
            &[
                (0, 2, 51), (0, 3, 48), (0, 4, 56), (0, 5, 19), (0, 6, 45),
                (1, 2, 45), (1, 3, 43), (1, 4, 10), (1, 5, 78), (1, 6, 50),
                (2, 3, 7), (2, 4, 44), (2, 5, 50),
                (3, 4, 40),
                (4, 5, 46), (4, 6, 16),
                (5, 6, 8),
            ],
        )
    }

    #[test]
    fn test_single_node() {
        let tour = solve(&Graph::new(1)).unwrap();
        assert_eq!(tour, Tour::single_node());
    }

    #[test]
    fn test_empty_graph() {
        assert!(matches!(solve(&Graph::new(0)), Err(TspError::EmptyGraph)));
    }

    #[test]
    fn test_two_nodes_round_trip() {
        let graph = from_edges(2, &[(0, 1, 7)]);
        let tour = solve(&graph).unwrap();
        assert_eq!(tour.cost, 14);
        assert_eq!(tour.path, vec![0, 1]);
    }

    #[test]
    fn test_four_city_instance() {
        let graph = four_city();
        let tour = solve(&graph).unwrap();
        assert_eq!(tour.cost, 80);
        assert_eq!(tour.path, vec![0, 1, 3, 2]);
        assert!(tour.is_valid_for(&graph));
    }

    #[test]
    fn test_single_cycle_found() {
        // Only the ring 0-3-1-4-2-0 exists.
        let graph = from_edges(5, &[(0, 3, 4), (3, 1, 7), (1, 4, 2), (4, 2, 9), (2, 0, 5)]);
        for bound in [LowerBound::ReducedCost, LowerBound::Admissible, LowerBound::None] {
            let tour = BranchAndBoundSolver::with_bound(bound).solve(&graph).unwrap();
            assert_eq!(tour.cost, 27);
            assert_eq!(tour.path, vec![0, 2, 4, 1, 3]);
        }
    }

    #[test]
    fn test_no_cycle() {
        let graph = from_edges(5, &[(0, 1, 1), (1, 2, 1), (2, 3, 1), (3, 4, 1)]);
        assert!(matches!(solve(&graph), Err(TspError::NoCycleFound)));
    }

    #[test]
    fn test_added_node() {
        let mut graph = four_city();
        let new = graph.add_node();
        assert!(matches!(solve(&graph), Err(TspError::NoCycleFound)));

        graph.set_weight(new, 1, 5).unwrap();
        graph.set_weight(new, 2, 5).unwrap();
        let tour = solve(&graph).unwrap();
        assert!(tour.path.contains(&new));
        assert!(tour.is_valid_for(&graph));
    }

    #[test]
    fn test_ties_keep_first_tour() {
        let graph = Graph::create(5, |_, _| Weight::Finite(3)).unwrap();
        let tour = solve(&graph).unwrap();
        assert_eq!(tour.cost, 15);
        assert_eq!(tour.path, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_reduced_cost_bound_is_heuristic() {
        let graph = bound_counterexample();

        let heuristic = solve(&graph).unwrap();
        assert_eq!(heuristic.cost, 154);
        assert_eq!(heuristic.path, vec![0, 2, 3, 1, 4, 6, 5]);

        let exact = BranchAndBoundSolver::with_bound(LowerBound::Admissible).solve(&graph).unwrap();
        assert_eq!(exact.cost, 153);
        assert_eq!(exact.path, vec![0, 3, 2, 1, 4, 6, 5]);

        let exhaustive = BranchAndBoundSolver::with_bound(LowerBound::None).solve(&graph).unwrap();
        assert_eq!(exhaustive.cost, 153);
    }

    #[test]
    fn test_exhaustive_statistics() {
        let graph = Graph::random_complete(5, 1..=100, 11);
        let result = BranchAndBoundSolver::with_bound(LowerBound::None).solve_detailed(&graph).unwrap();
        assert_eq!(result.termination, Termination::Exhausted);
        assert_eq!(result.statistics.branches_explored, 4 + 12 + 24 + 24);
        assert_eq!(result.statistics.branches_pruned, 0);
        assert_eq!(result.statistics.complete_tours, 24);
        assert!(result.is_proven_optimal());
    }

    #[test]
    fn test_incumbent_history_decreases() {
        let graph = Graph::random_complete(8, 1..=100, 5);
        let result = BranchAndBoundSolver::default().solve_detailed(&graph).unwrap();
        let history = &result.statistics.incumbent_history;
        assert!(!history.is_empty());
        assert!(history.windows(2).all(|w| w[1] < w[0]));
        assert_eq!(Some(history[history.len() - 1]), result.tour.as_ref().map(|t| t.cost));
        assert!(!result.is_proven_optimal());
    }

    #[test]
    fn test_idempotent_and_read_only() {
        let graph = Graph::random_sparse(8, 0.7, 1..=100, 9);
        let before = graph.clone();
        let first = solve(&graph);
        let second = solve(&graph);
        assert_eq!(graph, before);
        match (first, second) {
            (Ok(a), Ok(b)) => assert_eq!(a, b),
            (Err(TspError::NoCycleFound), Err(TspError::NoCycleFound)) => {}
            other => panic!("solves disagree: {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_search() {
        let token = CancellationToken::new();
        token.cancel();
        let solver = BranchAndBoundSolver::new(SolverConfig {
            cancellation: Some(token),
            ..Default::default()
        });
        let graph = Graph::random_complete(6, 1..=100, 1);
        let result = solver.solve_detailed(&graph).unwrap();
        assert_eq!(result.termination, Termination::Cancelled);
        assert!(result.tour.is_none());
        assert_eq!(result.statistics.branches_explored, 0);
        assert!(matches!(solver.solve(&graph), Err(TspError::SearchInterrupted)));
    }

    #[test]
    fn test_cancelled_after_incumbent() {
        let graph = Graph::random_complete(8, 1..=100, 3);
        let config = SolverConfig::default();
        let mut search = Search::new(&graph, &config);
        search.cancel_after = Some(20);
        search.extend(0, 1, 0);

        assert_eq!(search.state.path, vec![0]);
        assert_eq!(search.state.visited.iter().filter(|&&v| v).count(), 1);
        assert_eq!(search.state.statistics.branches_explored, 20);

        let result = search.finish();
        assert_eq!(result.termination, Termination::Cancelled);
        assert!(!result.is_proven_optimal());
        let tour = result.tour.clone().unwrap();
        assert!(tour.is_valid_for(&graph));
        assert_eq!(result.statistics.incumbent_history.last(), Some(&tour.cost));
        assert_eq!(result.into_tour().unwrap(), tour);
    }

    #[test]
    fn test_weights_beyond_i64_sum() {
        let big = i64::MAX as u64;
        let mut graph = Graph::new(3);
        for (a, b) in [(0, 1), (1, 2), (2, 0)] {
            graph.set_weight(a, b, i64::MAX).unwrap();
        }
        for bound in [LowerBound::ReducedCost, LowerBound::Admissible, LowerBound::None] {
            let tour = BranchAndBoundSolver::with_bound(bound).solve(&graph).unwrap();
            assert_eq!(tour.cost, 3 * big as Cost);
            assert_eq!(tour.path, vec![0, 1, 2]);
            assert!(tour.is_valid_for(&graph));
        }

        let graph = Graph::create(4, |_, _| Weight::Finite(u64::MAX)).unwrap();
        let tour = solve(&graph).unwrap();
        assert_eq!(tour.cost, 4 * u64::MAX as Cost);
    }

    #[test]
    fn test_time_limit() {
        let solver = BranchAndBoundSolver::new(SolverConfig {
            time_limit: Some(0.0),
            ..Default::default()
        });
        let result = solver.solve_detailed(&Graph::random_complete(6, 1..=100, 1)).unwrap();
        assert_eq!(result.termination, Termination::TimeLimit);
        assert!(!result.is_proven_optimal());
    }

    #[test]
    fn test_parallel_independent_solves() {
        let graphs: Vec<Graph> = (0..4).map(|s| Graph::random_complete(7, 1..=100, s)).collect();
        let sequential: Vec<Cost> = graphs.iter().map(|g| solve(g).unwrap().cost).collect();
        let parallel: Vec<Cost> = std::thread::scope(|scope| {
            let handles: Vec<_> = graphs.iter().map(|g| scope.spawn(move || solve(g).unwrap().cost)).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(sequential, parallel);
    }
}
