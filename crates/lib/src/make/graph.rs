//! Rule dependency graph.
//!
//! Nodes are rule indices; an edge runs from the rule producing a prerequisite
//! to the rule consuming it.

use std::collections::{HashMap, HashSet};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};

use super::MakeError;
use crate::path::BuildPath;

pub struct RuleGraph {
  graph: DiGraph<usize, ()>,
  nodes: Vec<NodeIndex>,
}

impl RuleGraph {
  /// Build the graph from each rule's prerequisites.
  ///
  /// `prereqs[i]` lists rule `i`'s prerequisites. A build-path prerequisite
  /// must either be produced by a rule in `producers` or already exist
  /// according to `exists`.
  pub fn new(
    prereqs: &[Vec<BuildPath>],
    producers: &HashMap<BuildPath, usize>,
    exists: impl Fn(&BuildPath) -> bool,
  ) -> Result<Self, MakeError> {
    let mut graph = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..prereqs.len()).map(|i| graph.add_node(i)).collect();

    for (dependent, paths) in prereqs.iter().enumerate() {
      for path in paths.iter().filter(|p| p.is_build()) {
        match producers.get(path) {
          Some(&producer) => {
            graph.add_edge(nodes[producer], nodes[dependent], ());
          }
          None if exists(path) => {}
          None => return Err(MakeError::NoRule(path.clone())),
        }
      }
    }

    let rule_graph = Self { graph, nodes };
    rule_graph.verify_acyclic()?;
    Ok(rule_graph)
  }

  fn verify_acyclic(&self) -> Result<(), MakeError> {
    toposort(&self.graph, None).map_err(|_| MakeError::CycleDetected)?;
    Ok(())
  }

  /// The goal rule and everything it transitively depends on, dependencies
  /// first.
  pub fn plan(&self, goal: usize) -> Result<Vec<usize>, MakeError> {
    let reversed = Reversed(&self.graph);
    let mut dfs = Dfs::new(reversed, self.nodes[goal]);
    let mut needed = HashSet::new();
    while let Some(idx) = dfs.next(reversed) {
      needed.insert(idx);
    }

    let sorted = toposort(&self.graph, None).map_err(|_| MakeError::CycleDetected)?;
    Ok(
      sorted
        .into_iter()
        .filter(|idx| needed.contains(idx))
        .map(|idx| self.graph[idx])
        .collect(),
    )
  }

  /// Rules that directly produce a prerequisite of `rule`.
  pub fn dependencies(&self, rule: usize) -> Vec<usize> {
    self
      .graph
      .neighbors_directed(self.nodes[rule], Direction::Incoming)
      .map(|idx| self.graph[idx])
      .collect()
  }
}
