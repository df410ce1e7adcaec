//! Branch-and-Bound TSP Solver Library
//!
//! Computes a minimum-cost Hamiltonian cycle over a small weighted undirected
//! graph with a depth-first branch-and-bound search.
//!
//! # Features
//!
//! - Dense symmetric graph store with a tagged "no edge" sentinel
//! - Branch-and-bound search rooted at node 0 with pluggable lower bounds
//! - Cooperative cancellation and time limits
//! - Random instance generation, JSON instance files
//! - Parallel benchmarking with CSV export
//!
//! # Example
//!
//! ```
//! use bnb_tsp_solver::graph::Graph;
//! use bnb_tsp_solver::solver::solve;
//!
//! let mut graph = Graph::new(4);
//! graph.set_weight(0, 1, 10).unwrap();
//! graph.set_weight(0, 2, 15).unwrap();
//! graph.set_weight(0, 3, 20).unwrap();
//! graph.set_weight(1, 2, 35).unwrap();
//! graph.set_weight(1, 3, 25).unwrap();
//! graph.set_weight(2, 3, 30).unwrap();
//!
//! let tour = solve(&graph).unwrap();
//! assert_eq!(tour.cost, 80);
//! ```

pub mod error;
pub mod graph;
pub mod solution;
pub mod solver;
pub mod benchmark;

pub use error::{Result, TspError};
pub use graph::{Cost, Graph, Weight};
pub use solution::Tour;
pub use solver::{BranchAndBoundSolver, ExactResult, LowerBound, SolverConfig};
