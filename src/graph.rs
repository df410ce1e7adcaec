//! Weighted undirected graph store.
//!
//! The graph is kept as a dense symmetric adjacency matrix of [`Weight`]s,
//! sized exactly `node_count x node_count`. Absent edges (and the diagonal)
//! hold [`Weight::Infinite`]. Instances can be generated randomly or loaded
//! from / saved to JSON edge-list files.

use crate::error::{Result, TspError};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::ops::RangeInclusive;
use std::path::Path;

/// Tour and search costs. Wide enough that summing `u64` edge weights over
/// any graph that fits in memory cannot overflow.
pub type Cost = u128;

/// Default weight range of randomly generated edges.
pub const DEFAULT_WEIGHT_RANGE: RangeInclusive<u64> = 1..=100;

/// Cost of an edge, or the absence of one.
///
/// Variant order matters: every `Finite` value compares below `Infinite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weight {
    Finite(u64),
    Infinite,
}

impl Weight {
    #[inline]
    pub fn is_finite(self) -> bool {
        matches!(self, Weight::Finite(_))
    }

    /// The finite value, if any.
    #[inline]
    pub fn finite(self) -> Option<u64> {
        match self {
            Weight::Finite(w) => Some(w),
            Weight::Infinite => None,
        }
    }

    /// The finite value widened to a [`Cost`].
    #[inline]
    pub fn cost(self) -> Option<Cost> {
        self.finite().map(Cost::from)
    }
}

impl From<u64> for Weight {
    fn from(w: u64) -> Self {
        Weight::Finite(w)
    }
}

impl std::fmt::Display for Weight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Weight::Finite(w) => write!(f, "{}", w),
            Weight::Infinite => write!(f, "inf"),
        }
    }
}

/// Dense weighted undirected graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    name: String,
    node_count: usize,
    weights: Vec<Vec<Weight>>,
}

impl Graph {
    /// Graph with `node_count` nodes and no edges.
    pub fn new(node_count: usize) -> Self {
        Graph {
            name: String::new(),
            node_count,
            weights: vec![vec![Weight::Infinite; node_count]; node_count],
        }
    }

    /// Build a graph whose edge `{i, j}` gets `weight_fn(i, j)`.
    ///
    /// `weight_fn` is called once per unordered pair with `i < j`, and the
    /// returned weight is stored in both directions so the matrix stays
    /// symmetric whatever policy the caller implements.
    pub fn create<F>(node_count: i64, mut weight_fn: F) -> Result<Self>
    where
        F: FnMut(usize, usize) -> Weight,
    {
        let n = usize::try_from(node_count).map_err(|_| TspError::InvalidSize(node_count))?;
        let mut graph = Graph::new(n);
        for i in 0..n {
            for j in i + 1..n {
                let w = weight_fn(i, j);
                graph.weights[i][j] = w;
                graph.weights[j][i] = w;
            }
        }
        Ok(graph)
    }

    /// Complete graph with uniform random integer weights, deterministic in `seed`.
    pub fn random_complete(node_count: usize, weights: RangeInclusive<u64>, seed: u64) -> Self {
        Self::random_sparse(node_count, 1.0, weights, seed)
    }

    /// Random graph where every edge exists with probability `edge_probability`.
    ///
    /// A NaN probability yields no edges; a reversed weight range collapses
    /// to its start.
    pub fn random_sparse(
        node_count: usize,
        edge_probability: f64,
        weights: RangeInclusive<u64>,
        seed: u64,
    ) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let p = if edge_probability.is_nan() { 0.0 } else { edge_probability.clamp(0.0, 1.0) };
        let (low, high) = (*weights.start(), *weights.end());
        let weights = low..=high.max(low);
        let mut graph = Graph::new(node_count);
        for i in 0..node_count {
            for j in i + 1..node_count {
                if rng.gen_bool(p) {
                    let w = Weight::Finite(rng.gen_range(weights.clone()));
                    graph.weights[i][j] = w;
                    graph.weights[j][i] = w;
                }
            }
        }
        graph
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Append a node with no incident edges and return its index.
    pub fn add_node(&mut self) -> usize {
        for row in &mut self.weights {
            row.push(Weight::Infinite);
        }
        self.node_count += 1;
        self.weights.push(vec![Weight::Infinite; self.node_count]);
        self.node_count - 1
    }

    /// Weight of the edge between `i` and `j`.
    pub fn weight(&self, i: usize, j: usize) -> Result<Weight> {
        self.check_index(i)?;
        self.check_index(j)?;
        Ok(self.weights[i][j])
    }

    /// Set the weight of edge `{i, j}` in both directions.
    pub fn set_weight(&mut self, i: usize, j: usize, w: i64) -> Result<()> {
        self.check_index(i)?;
        self.check_index(j)?;
        let w = u64::try_from(w).map_err(|_| TspError::InvalidWeight(w))?;
        self.weights[i][j] = Weight::Finite(w);
        self.weights[j][i] = Weight::Finite(w);
        Ok(())
    }

    /// Remove edge `{i, j}`.
    pub fn remove_edge(&mut self, i: usize, j: usize) -> Result<()> {
        self.check_index(i)?;
        self.check_index(j)?;
        self.weights[i][j] = Weight::Infinite;
        self.weights[j][i] = Weight::Infinite;
        Ok(())
    }

    /// Unchecked lookup for hot loops; callers guarantee both indices are in range.
    #[inline]
    pub(crate) fn at(&self, i: usize, j: usize) -> Weight {
        self.weights[i][j]
    }

    /// Finite edges incident to `i`, in increasing neighbor order.
    pub fn neighbors(&self, i: usize) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.weights[i]
            .iter()
            .enumerate()
            .filter(move |&(j, _)| j != i)
            .filter_map(|(j, w)| w.finite().map(|w| (j, w)))
    }

    pub fn degree(&self, i: usize) -> usize {
        self.neighbors(i).count()
    }

    /// Number of undirected finite edges.
    pub fn edge_count(&self) -> usize {
        (0..self.node_count)
            .map(|i| self.neighbors(i).filter(|&(j, _)| j > i).count())
            .sum()
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.node_count {
            Ok(())
        } else {
            Err(TspError::OutOfRange { index, node_count: self.node_count })
        }
    }

    /// Load a graph from a JSON edge-list file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        let data: GraphFile = serde_json::from_reader(BufReader::new(file))?;

        let mut graph = Graph::new(data.node_count);
        for edge in &data.edges {
            if edge.from >= data.node_count || edge.to >= data.node_count {
                return Err(TspError::InvalidInstance(format!(
                    "edge {}-{} references a node outside 0..{}",
                    edge.from, edge.to, data.node_count
                )));
            }
            if edge.from == edge.to {
                return Err(TspError::InvalidInstance(format!("self-loop on node {}", edge.from)));
            }
            graph.weights[edge.from][edge.to] = Weight::Finite(edge.weight);
            graph.weights[edge.to][edge.from] = Weight::Finite(edge.weight);
        }

        let name = if data.name.is_empty() {
            path.as_ref()
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            data.name
        };
        Ok(graph.with_name(name))
    }

    /// Write the graph as a JSON edge-list file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let edges = (0..self.node_count)
            .flat_map(|i| {
                self.neighbors(i)
                    .filter(move |&(j, _)| j > i)
                    .map(move |(j, weight)| EdgeRecord { from: i, to: j, weight })
            })
            .collect();
        let data = GraphFile {
            name: self.name.clone(),
            node_count: self.node_count,
            edges,
        };
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &data)?;
        Ok(())
    }

    /// Get statistics about the graph
    pub fn statistics(&self) -> GraphStatistics {
        let weights: Vec<u64> = (0..self.node_count)
            .flat_map(|i| self.neighbors(i).filter(move |&(j, _)| j > i).map(|(_, w)| w))
            .collect();
        let degrees: Vec<usize> = (0..self.node_count).map(|i| self.degree(i)).collect();

        let possible = self.node_count * self.node_count.saturating_sub(1) / 2;
        let density = if possible == 0 { 0.0 } else { weights.len() as f64 / possible as f64 };
        let avg_weight = if weights.is_empty() {
            0.0
        } else {
            weights.iter().sum::<u64>() as f64 / weights.len() as f64
        };

        GraphStatistics {
            name: self.name.clone(),
            node_count: self.node_count,
            edge_count: weights.len(),
            density,
            min_weight: weights.iter().copied().min(),
            avg_weight,
            max_weight: weights.iter().copied().max(),
            isolated_nodes: degrees.iter().filter(|&&d| d == 0).count(),
            min_degree: degrees.iter().copied().min().unwrap_or(0),
        }
    }
}

/// On-disk representation of a graph.
#[derive(Debug, Serialize, Deserialize)]
struct GraphFile {
    #[serde(default)]
    name: String,
    node_count: usize,
    #[serde(default)]
    edges: Vec<EdgeRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EdgeRecord {
    from: usize,
    to: usize,
    weight: u64,
}

/// Statistics about a graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub name: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub density: f64,
    pub min_weight: Option<u64>,
    pub avg_weight: f64,
    pub max_weight: Option<u64>,
    pub isolated_nodes: usize,
    pub min_degree: usize,
}

impl GraphStatistics {
    /// Cheap necessary condition for a Hamiltonian cycle.
    pub fn may_have_cycle(&self) -> bool {
        match self.node_count {
            0 => false,
            1 => true,
            2 => self.edge_count == 1,
            _ => self.min_degree >= 2,
        }
    }
}

impl std::fmt::Display for GraphStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let opt = |w: Option<u64>| w.map_or_else(|| "-".to_string(), |w| w.to_string());
        writeln!(f, "Graph: {}", if self.name.is_empty() { "<unnamed>" } else { self.name.as_str() })?;
        writeln!(f, "  Nodes: {}", self.node_count)?;
        writeln!(f, "  Edges: {} (density {:.2})", self.edge_count, self.density)?;
        writeln!(f, "  Min weight: {}", opt(self.min_weight))?;
        writeln!(f, "  Avg weight: {:.2}", self.avg_weight)?;
        writeln!(f, "  Max weight: {}", opt(self.max_weight))?;
        writeln!(f, "  Isolated nodes: {}", self.isolated_nodes)?;
        writeln!(f, "  Min degree: {}", self.min_degree)
    }
}
