//! `extends` dependency graph built on `petgraph`.
//!
//! Each node is one service of one manifest file; an edge points from a
//! service to the service it extends. Edges are only added if they keep
//! the graph acyclic, which is how `extends` cycles are detected.

use std::collections::HashMap;

use corral_common::error::{CorralError, Result};
use petgraph::graph::{DiGraph, NodeIndex};

/// Graph of `extends` relations between services.
#[derive(Debug, Default)]
pub struct ExtendsGraph {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl ExtendsGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the node for `label`, adding it if needed.
    pub fn add_service(&mut self, label: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(label) {
            return idx;
        }
        let idx = self.graph.add_node(label.to_string());
        let _ = self.nodes.insert(label.to_string(), idx);
        idx
    }

    /// Records that `child` extends `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::ExtendsCycle`] if `parent` already reaches
    /// `child`, with the chain starting and ending at `child`.
    pub fn add_extends(&mut self, child: NodeIndex, parent: NodeIndex) -> Result<()> {
        if petgraph::algo::has_path_connecting(&self.graph, parent, child, None) {
            let path = petgraph::algo::astar(&self.graph, parent, |n| n == child, |_| 0, |_| 0)
                .map(|(_, path)| path)
                .unwrap_or_default();
            let chain = std::iter::once(child)
                .chain(path)
                .filter_map(|idx| self.graph.node_weight(idx).cloned())
                .collect();
            return Err(CorralError::ExtendsCycle { chain });
        }
        let _ = self.graph.update_edge(child, parent, ());
        Ok(())
    }

    /// Number of services seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// True when no service was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_chain_is_accepted() {
        let mut graph = ExtendsGraph::new();
        let web = graph.add_service("web");
        let base = graph.add_service("base");
        let root = graph.add_service("root");
        graph.add_extends(web, base).expect("web extends base");
        graph.add_extends(base, root).expect("base extends root");
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn diamond_is_accepted() {
        let mut graph = ExtendsGraph::new();
        let a = graph.add_service("a");
        let b = graph.add_service("b");
        let c = graph.add_service("c");
        graph.add_extends(a, c).expect("a extends c");
        graph.add_extends(b, c).expect("b extends c");
    }

    #[test]
    fn same_label_reuses_node() {
        let mut graph = ExtendsGraph::new();
        let first = graph.add_service("web");
        let second = graph.add_service("web");
        assert_eq!(first, second);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn self_extends_is_a_cycle() {
        let mut graph = ExtendsGraph::new();
        let web = graph.add_service("web");
        let err = graph.add_extends(web, web).unwrap_err();
        assert_eq!(err.to_string(), "extends cycle detected: web -> web");
    }

    #[test]
    fn three_node_cycle_names_the_chain() {
        let mut graph = ExtendsGraph::new();
        let a = graph.add_service("a");
        let b = graph.add_service("b");
        let c = graph.add_service("c");
        graph.add_extends(a, b).expect("a extends b");
        graph.add_extends(b, c).expect("b extends c");
        let err = graph.add_extends(c, a).unwrap_err();
        match err {
            CorralError::ExtendsCycle { chain } => assert_eq!(chain, ["c", "a", "b", "c"]),
            other => panic!("unexpected error: {other}"),
        }
    }
}
