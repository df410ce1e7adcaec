//! Error type shared by the graph store, the solver and the tooling around them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TspError {
    /// A graph was requested with a negative number of nodes.
    #[error("Invalid graph size: {0} (node count must be non-negative)")]
    InvalidSize(i64),

    /// A node index outside `[0, node_count)` was used.
    #[error("Node index {index} is out of range for a graph of {node_count} nodes.")]
    OutOfRange { index: usize, node_count: usize },

    /// Edge weights must be non-negative.
    #[error("Invalid edge weight: {0} (weights must be non-negative)")]
    InvalidWeight(i64),

    /// The search completed without finding any Hamiltonian cycle.
    #[error("No Hamiltonian cycle exists through all nodes")]
    NoCycleFound,

    /// The search was cancelled or hit its time limit before finding a cycle.
    #[error("Search interrupted before a Hamiltonian cycle was found")]
    SearchInterrupted,

    #[error("Cannot solve a graph without nodes")]
    EmptyGraph,

    #[error("Invalid instance: {0}")]
    InvalidInstance(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, TspError>;
