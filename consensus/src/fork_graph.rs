//! Export of a fork database slice as a graph, with Graphviz DOT rendering.

use std::fmt::Write;

use dpos_types::BlockId;
use serde::{Deserialize, Serialize};

use crate::fork_db::ForkDatabase;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkNode {
    pub block_id: BlockId,
    pub block_num: u32,
    pub is_known: bool,
    pub is_linked: bool,
    pub is_included: bool,
    pub is_valid: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkGraph {
    pub nodes: Vec<ForkNode>,
    /// `(previous, block)` pairs.
    pub edges: Vec<(BlockId, BlockId)>,
}

impl ForkGraph {
    /// Nodes numbered `first..=last` and the edges between them.
    pub fn build(db: &ForkDatabase, first: u32, last: u32) -> Self {
        let entries = db.range(first, last);
        let nodes: Vec<ForkNode> = entries
            .iter()
            .map(|e| ForkNode {
                block_id: e.block_id,
                block_num: e.block_num,
                is_known: e.is_known,
                is_linked: e.is_linked,
                is_included: e.is_included,
                is_valid: e.is_valid,
            })
            .collect();
        let edges = entries
            .iter()
            .flat_map(|e| {
                e.next_blocks
                    .iter()
                    .filter(|child| db.get(child).is_some_and(|c| c.block_num <= last))
                    .map(|child| (e.block_id, *child))
            })
            .collect();
        Self { nodes, edges }
    }

    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph forks {\n  rankdir=LR;\n");
        for node in &self.nodes {
            let (color, style) = match (node.is_included, node.is_valid, node.is_known) {
                (true, _, _) => ("green", "solid"),
                (_, Some(false), _) => ("red", "solid"),
                (_, _, false) => ("gray", "dashed"),
                _ => ("black", "solid"),
            };
            let _ = writeln!(
                dot,
                "  \"{}\" [label=\"#{} {}\" color={} style={}];",
                node.block_id,
                node.block_num,
                short(&node.block_id),
                color,
                style
            );
        }
        for (from, to) in &self.edges {
            let _ = writeln!(dot, "  \"{}\" -> \"{}\";", from, to);
        }
        dot.push_str("}\n");
        dot
    }
}

fn short(id: &BlockId) -> String {
    id.to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> BlockId {
        BlockId::new([n; 32])
    }

    #[test]
    fn graph_of_a_fork() {
        let mut db = ForkDatabase::new();
        db.insert(id(1), BlockId::ZERO, 1);
        db.insert(id(2), id(1), 2);
        db.insert(id(12), id(1), 2);
        db.set_included(&id(1), true);
        db.set_included(&id(2), true);
        db.mark_invalid(&id(12), "wrong delegate");

        let graph = ForkGraph::build(&db, 1, 2);
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 2);
        assert!(graph.edges.contains(&(id(1), id(12))));

        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph forks {"));
        assert!(dot.contains("color=red"));
        assert!(dot.contains(&format!("\"{}\" -> \"{}\"", id(1), id(2))));
    }

    #[test]
    fn graph_is_cut_at_last() {
        let mut db = ForkDatabase::new();
        db.insert(id(1), BlockId::ZERO, 1);
        db.insert(id(2), id(1), 2);
        let graph = ForkGraph::build(&db, 0, 1);
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges, vec![(BlockId::ZERO, id(1))]);
    }
}
