//! Tour representation for TSP results.
//!
//! A [`Tour`] is the immutable result of a solve: the cycle cost and the node
//! sequence starting at the root, implicitly closed back to it.

use crate::graph::{Cost, Graph};
use serde::{Deserialize, Serialize};

/// Represents a Hamiltonian cycle rooted at node 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tour {
    /// Total cycle cost, including the closing edge back to the root
    pub cost: Cost,
    /// Visiting order, starting at node 0 and not repeating it at the end
    pub path: Vec<usize>,
}

impl Tour {
    pub fn new(cost: Cost, path: Vec<usize>) -> Self {
        Tour { cost, path }
    }

    /// The trivial tour of a one-node graph.
    pub fn single_node() -> Self {
        Tour { cost: 0, path: vec![0] }
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// Edges of the closed cycle, including the one back to the root.
    /// A one-node tour has no edges.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        if self.path.len() < 2 {
            return Vec::new();
        }
        self.path
            .iter()
            .zip(self.path.iter().cycle().skip(1))
            .map(|(&a, &b)| (a, b))
            .collect()
    }

    /// Recompute the cycle cost from the graph; `None` if an edge is
    /// missing or an index is out of range.
    pub fn recompute_cost(&self, graph: &Graph) -> Option<Cost> {
        self.edges().into_iter().try_fold(0, |acc: Cost, (a, b)| {
            Some(acc + graph.weight(a, b).ok()?.cost()?)
        })
    }

    /// Check that the tour starts at the root and visits every node exactly once.
    pub fn is_hamiltonian(&self, node_count: usize) -> bool {
        if self.path.len() != node_count || self.path.first() != Some(&0) {
            return false;
        }
        let mut seen = vec![false; node_count];
        for &node in &self.path {
            if node >= node_count || seen[node] {
                return false;
            }
            seen[node] = true;
        }
        true
    }

    /// A tour is valid for `graph` if it is Hamiltonian and its stored cost
    /// matches the sum of its edges.
    pub fn is_valid_for(&self, graph: &Graph) -> bool {
        self.is_hamiltonian(graph.node_count())
            && self.recompute_cost(graph) == Some(self.cost)
    }

    /// Get the position of a node in the tour
    pub fn position(&self, node: usize) -> Option<usize> {
        self.path.iter().position(|&n| n == node)
    }

    /// Get the successor of a node in the tour (circular)
    pub fn successor(&self, node: usize) -> Option<usize> {
        self.position(node).map(|pos| self.path[(pos + 1) % self.path.len()])
    }
}

impl std::fmt::Display for Tour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let nodes: Vec<String> = self.path.iter().map(|n| n.to_string()).collect();
        write!(f, "{} -> 0 (cost {})", nodes.join(" -> "), self.cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Weight;

    fn square() -> Graph {
        let mut graph = Graph::new(4);
        graph.set_weight(0, 1, 1).unwrap();
        graph.set_weight(1, 2, 2).unwrap();
        graph.set_weight(2, 3, 3).unwrap();
        graph.set_weight(3, 0, 4).unwrap();
        graph
    }

    #[test]
    fn test_edges_are_closed() {
        let tour = Tour::new(10, vec![0, 1, 2, 3]);
        assert_eq!(tour.edges(), vec![(0, 1), (1, 2), (2, 3), (3, 0)]);
        assert!(Tour::single_node().edges().is_empty());
        assert_eq!(Tour::new(6, vec![0, 1]).edges(), vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn test_validation() {
        let graph = square();
        assert!(Tour::new(10, vec![0, 1, 2, 3]).is_valid_for(&graph));
        assert!(!Tour::new(11, vec![0, 1, 2, 3]).is_valid_for(&graph));
        // 1-3 is not an edge
        assert_eq!(Tour::new(0, vec![0, 1, 3, 2]).recompute_cost(&graph), None);
        assert!(!Tour::new(10, vec![1, 0, 2, 3]).is_hamiltonian(4));
        assert!(!Tour::new(10, vec![0, 1, 1, 3]).is_hamiltonian(4));
        assert!(!Tour::new(10, vec![0, 1, 2]).is_hamiltonian(4));
    }

    #[test]
    fn test_cost_beyond_u64() {
        let graph = Graph::create(3, |_, _| Weight::Finite(u64::MAX)).unwrap();
        let cost = 3 * u64::MAX as Cost;
        assert_eq!(Tour::new(0, vec![0, 1, 2]).recompute_cost(&graph), Some(cost));
        assert!(Tour::new(cost, vec![0, 1, 2]).is_valid_for(&graph));
    }

    #[test]
    fn test_successor_and_display() {
        let tour = Tour::new(10, vec![0, 1, 2, 3]);
        assert_eq!(tour.successor(3), Some(0));
        assert_eq!(tour.successor(1), Some(2));
        assert_eq!(tour.successor(9), None);
        assert_eq!(tour.to_string(), "0 -> 1 -> 2 -> 3 -> 0 (cost 10)");
    }
}
