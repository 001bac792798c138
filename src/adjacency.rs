//! CSR adjacency compilation
//!
//! Converts a link list into flat neighbor arrays plus per-node offsets so that a
//! kernel worker for node `i` can walk its neighbors as one contiguous run:
//!
//! ```text
//! adjacency[offsets[i] .. offsets[i] + degrees[i]]
//! ```
//!
//! Undirected graphs produce one merged run per node. Directed graphs produce two
//! independent structures: the incoming run (sources of links targeting `i`) and
//! the outgoing run (targets of links leaving `i`). Within a run, neighbors appear
//! in link-list order, so compiling the same graph twice yields identical arrays.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::LayoutResult;
use crate::graph::{Graph, Link};

/// How links are interpreted when building adjacency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TopologyMode {
    /// Each link joins both endpoints; one merged neighbor run per node
    #[default]
    Undirected,
    /// Links point from source to target; separate in/out runs per node
    Directed,
}

/// One compressed sparse row structure
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Csr {
    /// Neighbor indices, grouped by node in node-index order
    pub adjacency: Vec<u32>,
    /// Exclusive prefix sum of `degrees`; `offsets.len() == node_count`
    pub offsets: Vec<u32>,
    /// Neighbor count per node
    pub degrees: Vec<u32>,
}

impl Csr {
    /// Build from `(owner, neighbor)` pairs.
    ///
    /// Degrees are counted first, offsets come from a prefix sum, then a cursor per
    /// node places each neighbor. Pairs are placed in iteration order.
    fn from_pairs<I>(node_count: usize, pairs: I) -> Self
    where
        I: Iterator<Item = (u32, u32)> + Clone,
    {
        let mut degrees = vec![0u32; node_count];
        for (owner, _) in pairs.clone() {
            degrees[owner as usize] += 1;
        }

        let mut offsets = Vec::with_capacity(node_count);
        let mut running = 0u32;
        for &degree in &degrees {
            offsets.push(running);
            running += degree;
        }

        let mut adjacency = vec![0u32; running as usize];
        let mut cursor = offsets.clone();
        for (owner, neighbor) in pairs {
            let slot = &mut cursor[owner as usize];
            adjacency[*slot as usize] = neighbor;
            *slot += 1;
        }

        Self {
            adjacency,
            offsets,
            degrees,
        }
    }

    pub fn node_count(&self) -> usize {
        self.offsets.len()
    }

    /// The neighbor run of node `index`
    pub fn neighbors(&self, index: usize) -> &[u32] {
        let start = self.offsets[index] as usize;
        &self.adjacency[start..start + self.degrees[index] as usize]
    }
}

/// Compiled adjacency for one topology mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Adjacency {
    Undirected(Csr),
    Directed { incoming: Csr, outgoing: Csr },
}

impl Adjacency {
    /// Validate the graph's links and compile adjacency for `mode`.
    ///
    /// Fails with [`crate::LayoutError::Topology`] if any endpoint is out of range;
    /// nothing is built in that case.
    pub fn compile(graph: &Graph, mode: TopologyMode) -> LayoutResult<Self> {
        graph.validate()?;
        Ok(Self::from_links(&graph.links, graph.node_count(), mode))
    }

    /// Compile from links already known to be in range
    fn from_links(links: &[Link], node_count: usize, mode: TopologyMode) -> Self {
        match mode {
            TopologyMode::Undirected => {
                // Per link: source goes into target's run, then target into source's run
                let pairs = links
                    .iter()
                    .flat_map(|l| [(l.target, l.source), (l.source, l.target)]);
                Adjacency::Undirected(Csr::from_pairs(node_count, pairs))
            }
            TopologyMode::Directed => {
                let incoming = links.iter().map(|l| (l.target, l.source));
                let outgoing = links.iter().map(|l| (l.source, l.target));
                Adjacency::Directed {
                    incoming: Csr::from_pairs(node_count, incoming),
                    outgoing: Csr::from_pairs(node_count, outgoing),
                }
            }
        }
    }

    pub fn mode(&self) -> TopologyMode {
        match self {
            Adjacency::Undirected(_) => TopologyMode::Undirected,
            Adjacency::Directed { .. } => TopologyMode::Directed,
        }
    }

    /// The structure bound to the kernel's incoming slot (the merged one when undirected)
    pub fn primary(&self) -> &Csr {
        match self {
            Adjacency::Undirected(csr) => csr,
            Adjacency::Directed { incoming, .. } => incoming,
        }
    }

    /// The outgoing structure, present only for directed graphs
    pub fn outgoing(&self) -> Option<&Csr> {
        match self {
            Adjacency::Undirected(_) => None,
            Adjacency::Directed { outgoing, .. } => Some(outgoing),
        }
    }

    /// `(in_degree, out_degree)` of node `index` as stored in the node buffer
    pub fn degree_pair(&self, index: usize) -> (u32, u32) {
        match self {
            Adjacency::Undirected(csr) => (csr.degrees[index], csr.degrees[index]),
            Adjacency::Directed { incoming, outgoing } => {
                (incoming.degrees[index], outgoing.degrees[index])
            }
        }
    }

    /// Write the computed degree counters back into the graph's node records
    pub fn record_degrees(&self, graph: &mut Graph) {
        for (index, node) in graph.nodes.iter_mut().enumerate() {
            match self {
                Adjacency::Undirected(csr) => {
                    node.degree = csr.degrees[index];
                    node.in_degree = 0;
                    node.out_degree = 0;
                }
                Adjacency::Directed { incoming, outgoing } => {
                    node.in_degree = incoming.degrees[index];
                    node.out_degree = outgoing.degrees[index];
                    node.degree = node.in_degree + node.out_degree;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LayoutError;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn path_graph() -> Graph {
        Graph::with_node_count(3, vec![Link::new(0, 1), Link::new(1, 2)])
    }

    /// Neighbors of `node` found by scanning the link list directly
    fn scanned_neighbors(links: &[Link], node: u32, mode: TopologyMode, incoming: bool) -> Vec<u32> {
        let mut found = Vec::new();
        for l in links {
            match mode {
                TopologyMode::Undirected => {
                    if l.target == node {
                        found.push(l.source);
                    }
                    if l.source == node {
                        found.push(l.target);
                    }
                }
                TopologyMode::Directed if incoming => {
                    if l.target == node {
                        found.push(l.source);
                    }
                }
                TopologyMode::Directed => {
                    if l.source == node {
                        found.push(l.target);
                    }
                }
            }
        }
        found.sort_unstable();
        found
    }

    fn random_graph(rng: &mut StdRng, node_count: usize, link_count: usize) -> Graph {
        let links = (0..link_count)
            .map(|_| {
                Link::new(
                    rng.random_range(0..node_count as u32),
                    rng.random_range(0..node_count as u32),
                )
            })
            .collect();
        Graph::with_node_count(node_count, links)
    }

    fn assert_csr_invariants(csr: &Csr, node_count: usize) {
        assert_eq!(csr.offsets.len(), node_count);
        assert_eq!(csr.degrees.len(), node_count);
        assert!(csr.offsets.windows(2).all(|w| w[0] <= w[1]));
        if let (Some(&last_offset), Some(&last_degree)) = (csr.offsets.last(), csr.degrees.last()) {
            assert_eq!((last_offset + last_degree) as usize, csr.adjacency.len());
        }
        for i in 1..node_count {
            assert_eq!(csr.offsets[i], csr.offsets[i - 1] + csr.degrees[i - 1]);
        }
    }

    #[test]
    fn undirected_path_matches_worked_example() {
        let adjacency = Adjacency::compile(&path_graph(), TopologyMode::Undirected).unwrap();
        let csr = adjacency.primary();

        insta::assert_snapshot!(format!("{:?}", csr.degrees), @"[1, 2, 1]");
        insta::assert_snapshot!(format!("{:?}", csr.offsets), @"[0, 1, 3]");
        insta::assert_snapshot!(format!("{:?}", csr.adjacency), @"[1, 0, 2, 1]");
        assert!(adjacency.outgoing().is_none());
    }

    #[test]
    fn directed_path_splits_roles() {
        let adjacency = Adjacency::compile(&path_graph(), TopologyMode::Directed).unwrap();
        let Adjacency::Directed { incoming, outgoing } = &adjacency else {
            panic!("Expected directed adjacency");
        };

        assert_eq!(incoming.degrees, vec![0, 1, 1]);
        assert_eq!(outgoing.degrees, vec![1, 1, 0]);
        assert_eq!(incoming.offsets, vec![0, 0, 1]);
        assert_eq!(outgoing.offsets, vec![0, 1, 2]);
        insta::assert_snapshot!(format!("{:?}", incoming.adjacency), @"[0, 1]");
        insta::assert_snapshot!(format!("{:?}", outgoing.adjacency), @"[1, 2]");
    }

    #[test]
    fn run_order_follows_link_order() {
        let graph = Graph::with_node_count(
            4,
            vec![Link::new(3, 0), Link::new(1, 0), Link::new(0, 2)],
        );
        let adjacency = Adjacency::compile(&graph, TopologyMode::Undirected).unwrap();
        assert_eq!(adjacency.primary().neighbors(0), &[3, 1, 2]);
    }

    #[test]
    fn self_loops_and_parallel_links_are_kept() {
        let graph = Graph::with_node_count(
            2,
            vec![Link::new(0, 0), Link::new(0, 1), Link::new(0, 1)],
        );

        let undirected = Adjacency::compile(&graph, TopologyMode::Undirected).unwrap();
        assert_eq!(undirected.primary().neighbors(0), &[0, 0, 1, 1]);
        assert_eq!(undirected.primary().neighbors(1), &[0, 0]);
        assert_eq!(undirected.primary().adjacency.len(), 2 * graph.link_count());

        let directed = Adjacency::compile(&graph, TopologyMode::Directed).unwrap();
        assert_eq!(directed.primary().neighbors(0), &[0]);
        assert_eq!(directed.outgoing().unwrap().neighbors(0), &[0, 1, 1]);
    }

    #[test]
    fn empty_inputs_compile_to_empty_arrays() {
        for mode in [TopologyMode::Undirected, TopologyMode::Directed] {
            let adjacency = Adjacency::compile(&Graph::default(), mode).unwrap();
            assert!(adjacency.primary().adjacency.is_empty());
            assert!(adjacency.primary().offsets.is_empty());

            let isolated = Graph::with_node_count(3, vec![]);
            let adjacency = Adjacency::compile(&isolated, mode).unwrap();
            assert!(adjacency.primary().adjacency.is_empty());
            assert_eq!(adjacency.primary().offsets, vec![0, 0, 0]);
            assert!(adjacency.primary().neighbors(2).is_empty());
        }
    }

    #[test]
    fn out_of_range_endpoint_is_rejected() {
        let graph = Graph::with_node_count(2, vec![Link::new(0, 1), Link::new(2, 0)]);
        let result = Adjacency::compile(&graph, TopologyMode::Directed);
        assert!(matches!(
            result,
            Err(LayoutError::Topology {
                link: 1,
                endpoint: 2,
                ..
            })
        ));
    }

    #[test]
    fn compiling_twice_is_identical() {
        let mut rng = StdRng::seed_from_u64(7);
        let graph = random_graph(&mut rng, 40, 120);
        for mode in [TopologyMode::Undirected, TopologyMode::Directed] {
            let first = Adjacency::compile(&graph, mode).unwrap();
            let second = Adjacency::compile(&graph, mode).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn runs_match_link_scan_on_random_graphs() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let node_count = rng.random_range(1..30);
            let link_count = rng.random_range(0..80);
            let graph = random_graph(&mut rng, node_count, link_count);

            let undirected = Adjacency::compile(&graph, TopologyMode::Undirected).unwrap();
            let csr = undirected.primary();
            assert_csr_invariants(csr, node_count);
            assert_eq!(csr.adjacency.len(), 2 * link_count);
            for i in 0..node_count {
                let mut run = csr.neighbors(i).to_vec();
                run.sort_unstable();
                assert_eq!(
                    run,
                    scanned_neighbors(&graph.links, i as u32, TopologyMode::Undirected, true)
                );
            }

            let directed = Adjacency::compile(&graph, TopologyMode::Directed).unwrap();
            let Adjacency::Directed { incoming, outgoing } = &directed else {
                panic!("Expected directed adjacency");
            };
            for (csr, is_incoming) in [(incoming, true), (outgoing, false)] {
                assert_csr_invariants(csr, node_count);
                assert_eq!(csr.adjacency.len(), link_count);
                for i in 0..node_count {
                    let mut run = csr.neighbors(i).to_vec();
                    run.sort_unstable();
                    assert_eq!(
                        run,
                        scanned_neighbors(&graph.links, i as u32, TopologyMode::Directed, is_incoming)
                    );
                }
            }
        }
    }

    #[test]
    fn record_degrees_updates_nodes() {
        let mut graph = path_graph();

        Adjacency::compile(&graph, TopologyMode::Directed)
            .unwrap()
            .record_degrees(&mut graph);
        let pairs: Vec<_> = graph.nodes.iter().map(|n| (n.in_degree, n.out_degree)).collect();
        assert_eq!(pairs, vec![(0, 1), (1, 1), (1, 0)]);

        Adjacency::compile(&graph, TopologyMode::Undirected)
            .unwrap()
            .record_degrees(&mut graph);
        let degrees: Vec<_> = graph.nodes.iter().map(|n| n.degree).collect();
        assert_eq!(degrees, vec![1, 2, 1]);
    }

    #[test]
    fn degree_pair_duplicates_merged_degree() {
        let adjacency = Adjacency::compile(&path_graph(), TopologyMode::Undirected).unwrap();
        assert_eq!(adjacency.degree_pair(1), (2, 2));
        assert_eq!(adjacency.mode(), TopologyMode::Undirected);
    }
}
