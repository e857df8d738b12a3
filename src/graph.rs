//! Adjacency-list view of the link topology and breadth-first routing.
//!
//! Paths are shortest by hop count. Edge weights are carried along for
//! latency estimates but do not influence the search. Neighbours are
//! explored in edge-insertion order, so ties resolve the same way on
//! every run.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;

use crate::entity::{EntityId, Link};

/// Undirected weighted graph over entity ids.
#[derive(Debug, Clone, Default)]
pub struct AdjacencyGraph {
    adjacency: BTreeMap<EntityId, Vec<(EntityId, f64)>>,
}

impl AdjacencyGraph {
    pub fn new() -> Self {
        AdjacencyGraph {
            adjacency: BTreeMap::new(),
        }
    }

    /// Build the graph from a set of links, in iteration order.
    pub fn from_links<'a>(links: impl IntoIterator<Item = &'a Link>) -> Self {
        let mut graph = AdjacencyGraph::new();
        for link in links {
            let (a, b) = link.endpoints();
            graph.add_edge(a, b, link.latency());
        }
        graph
    }

    /// Append `u → v` and `v → u`.
    pub fn add_edge(&mut self, u: EntityId, v: EntityId, weight: f64) {
        self.adjacency.entry(u).or_default().push((v, weight));
        self.adjacency.entry(v).or_default().push((u, weight));
    }

    pub fn neighbors(&self, u: EntityId) -> &[(EntityId, f64)] {
        self.adjacency.get(&u).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum::<usize>() / 2
    }

    /// First hop on a shortest path from `src` to `dst`.
    ///
    /// `None` when no path exists or `src == dst`.
    pub fn next_hop(&self, src: EntityId, dst: EntityId) -> Option<EntityId> {
        self.next_hop_where(src, dst, |_| true)
    }

    /// [`AdjacencyGraph::next_hop`] restricted to vertices accepted by `routable`.
    pub fn next_hop_where<F>(&self, src: EntityId, dst: EntityId, routable: F) -> Option<EntityId>
    where
        F: Fn(EntityId) -> bool,
    {
        let path = self.shortest_path_where(src, dst, routable)?;
        path.get(1).copied()
    }

    /// Full hop-count-shortest path, both endpoints included.
    ///
    /// `src == dst` yields the single-vertex path.
    pub fn shortest_path(&self, src: EntityId, dst: EntityId) -> Option<Vec<EntityId>> {
        self.shortest_path_where(src, dst, |_| true)
    }

    /// Breadth-first search over a frontier of partial paths.
    ///
    /// Stops the moment `dst` is generated. Vertices rejected by `routable`
    /// are never entered; `src` and `dst` must both be accepted.
    pub fn shortest_path_where<F>(&self, src: EntityId, dst: EntityId, routable: F) -> Option<Vec<EntityId>>
    where
        F: Fn(EntityId) -> bool,
    {
        if !routable(src) || !routable(dst) {
            debug!(%src, %dst, "route endpoint is not routable");
            return None;
        }
        if src == dst {
            return Some(vec![src]);
        }

        let mut visited = BTreeSet::from([src]);
        let mut frontier: VecDeque<Vec<EntityId>> = VecDeque::from([vec![src]]);
        while let Some(path) = frontier.pop_front() {
            let Some(&tail) = path.last() else { continue };
            for &(next, _) in self.neighbors(tail) {
                if !routable(next) || !visited.insert(next) {
                    continue;
                }
                let mut extended = path.clone();
                extended.push(next);
                if next == dst {
                    return Some(extended);
                }
                frontier.push_back(extended);
            }
        }

        debug!(%src, %dst, "no path");
        None
    }

    /// Sum of edge weights along `path`, taking the first edge between each pair.
    pub fn path_weight(&self, path: &[EntityId]) -> Option<f64> {
        let mut total = 0.0;
        for pair in path.windows(2) {
            let (_, w) = self
                .neighbors(pair[0])
                .iter()
                .find(|(v, _)| *v == pair[1])?;
            total += w;
        }
        Some(total)
    }
}
