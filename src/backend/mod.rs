//! Compute backends for the force simulation
//!
//! A backend owns the device-resident buffers for one graph and runs one
//! simulation step per call. The same kernel math runs on the host
//! ([`CpuBackend`], a rayon parallel-for over node indices) or, with the `gpu`
//! feature, on a wgpu device ([`crate::gpu::GpuSimulation`]).

mod cpu;

pub use cpu::CpuBackend;

use rand::Rng;

use crate::adjacency::{Adjacency, TopologyMode};
use crate::error::LayoutResult;
use crate::gpu::{GpuLink, GpuNode, SimulationUniforms};
use crate::graph::Graph;
use crate::kernel::KernelTopology;
use crate::layout;

/// Everything uploaded for one graph: node state, links and adjacency.
///
/// Built completely on the host before any backend sees it, so a failed load
/// never leaves a backend half-populated.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphBuffers {
    pub nodes: Vec<GpuNode>,
    pub links: Vec<GpuLink>,
    /// Incoming runs (directed) or merged runs (undirected)
    pub in_adjacency: Vec<u32>,
    pub in_offsets: Vec<u32>,
    /// Outgoing runs; empty for undirected graphs
    pub out_adjacency: Vec<u32>,
    pub out_offsets: Vec<u32>,
    pub mode: TopologyMode,
}

impl GraphBuffers {
    /// Assemble buffers from a validated graph and its compiled adjacency, placing
    /// nodes on the initial spiral.
    pub fn build<R: Rng>(
        graph: &Graph,
        adjacency: &Adjacency,
        node_scale: f32,
        rng: &mut R,
    ) -> Self {
        let mut nodes: Vec<GpuNode> = (0..graph.node_count())
            .map(|index| {
                let (in_degree, out_degree) = adjacency.degree_pair(index);
                GpuNode::default().with_degrees(in_degree, out_degree)
            })
            .collect();
        layout::initialize(&mut nodes, node_scale, rng);

        let links = graph
            .links
            .iter()
            .map(|l| GpuLink::new(l.source, l.target))
            .collect();

        let primary = adjacency.primary();
        let (out_adjacency, out_offsets) = adjacency
            .outgoing()
            .map(|csr| (csr.adjacency.clone(), csr.offsets.clone()))
            .unwrap_or_default();

        Self {
            nodes,
            links,
            in_adjacency: primary.adjacency.clone(),
            in_offsets: primary.offsets.clone(),
            out_adjacency,
            out_offsets,
            mode: adjacency.mode(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Borrow the adjacency arrays in the layout the kernel expects
    pub fn topology(&self) -> KernelTopology<'_> {
        KernelTopology {
            in_adjacency: &self.in_adjacency,
            in_offsets: &self.in_offsets,
            out_adjacency: &self.out_adjacency,
            out_offsets: &self.out_offsets,
        }
    }
}

/// A device that can hold one graph's buffers and step the simulation
pub trait ForceBackend {
    /// Short name for logs (e.g., "cpu", "gpu")
    fn name(&self) -> &'static str;

    /// Replace all buffers with `buffers`.
    ///
    /// Previous buffers are released as part of the swap. On error the backend
    /// keeps its previous graph.
    fn load(&mut self, buffers: GraphBuffers) -> LayoutResult<()>;

    /// Run one force pass followed by one integration pass.
    ///
    /// Does nothing when no graph is loaded.
    fn step(&mut self, uniforms: &SimulationUniforms);

    /// Copy the current node state back to the host
    fn read_nodes(&mut self) -> LayoutResult<Vec<GpuNode>>;

    fn node_count(&self) -> usize;

    fn link_count(&self) -> usize;
}

impl<B: ForceBackend + ?Sized> ForceBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn load(&mut self, buffers: GraphBuffers) -> LayoutResult<()> {
        (**self).load(buffers)
    }

    fn step(&mut self, uniforms: &SimulationUniforms) {
        (**self).step(uniforms)
    }

    fn read_nodes(&mut self) -> LayoutResult<Vec<GpuNode>> {
        (**self).read_nodes()
    }

    fn node_count(&self) -> usize {
        (**self).node_count()
    }

    fn link_count(&self) -> usize {
        (**self).link_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Link;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn path_graph() -> Graph {
        Graph::with_node_count(3, vec![Link::new(0, 1), Link::new(1, 2)])
    }

    #[test]
    fn undirected_buffers_store_merged_degree_twice() {
        let graph = path_graph();
        let adjacency = Adjacency::compile(&graph, TopologyMode::Undirected).unwrap();
        let buffers = GraphBuffers::build(&graph, &adjacency, 0.1, &mut StdRng::seed_from_u64(0));

        assert_eq!(buffers.in_adjacency, vec![1, 0, 2, 1]);
        assert_eq!(buffers.in_offsets, vec![0, 1, 3]);
        assert!(buffers.out_adjacency.is_empty());
        assert!(buffers.out_offsets.is_empty());
        let degrees: Vec<_> = buffers
            .nodes
            .iter()
            .map(|n| (n.in_degree, n.out_degree))
            .collect();
        assert_eq!(degrees, vec![(1, 1), (2, 2), (1, 1)]);
        assert_eq!(buffers.links[1], GpuLink::new(1, 2));
    }

    #[test]
    fn directed_buffers_carry_both_runs() {
        let graph = path_graph();
        let adjacency = Adjacency::compile(&graph, TopologyMode::Directed).unwrap();
        let buffers = GraphBuffers::build(&graph, &adjacency, 0.1, &mut StdRng::seed_from_u64(0));

        assert_eq!(buffers.mode, TopologyMode::Directed);
        assert_eq!(buffers.in_adjacency, vec![0, 1]);
        assert_eq!(buffers.out_adjacency, vec![1, 2]);
        assert_eq!(buffers.out_offsets, vec![0, 1, 2]);
        assert_eq!(buffers.nodes[0].in_degree, 0);
        assert_eq!(buffers.nodes[0].out_degree, 1);
    }

    #[test]
    fn nodes_start_on_the_spiral_at_rest() {
        let graph = Graph::with_node_count(10, vec![]);
        let adjacency = Adjacency::compile(&graph, TopologyMode::Undirected).unwrap();
        let buffers = GraphBuffers::build(&graph, &adjacency, 0.5, &mut StdRng::seed_from_u64(4));

        for (index, node) in buffers.nodes.iter().enumerate() {
            let [sx, sy] = layout::spiral_point(index, 0.5);
            assert!((node.position[0] - sx).abs() <= layout::JITTER + 1e-6);
            assert!((node.position[1] - sy).abs() <= layout::JITTER + 1e-6);
            assert_eq!(node.velocity, [0.0, 0.0]);
        }
    }
}
