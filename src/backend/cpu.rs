//! Host backend: the force kernel as a rayon parallel-for over node indices

use rayon::prelude::*;
use tracing::debug;

use super::{ForceBackend, GraphBuffers};
use crate::error::LayoutResult;
use crate::gpu::{GpuNode, SimulationUniforms};
use crate::kernel;

/// Runs the simulation on the host thread pool.
///
/// The force pass collects one force per node from an immutable view of the
/// node array. Only after every force is known does the integration pass take
/// the array mutably, one worker per slot. The first parallel pass joins before
/// the second starts; that join is the barrier between the two phases.
#[derive(Debug, Default)]
pub struct CpuBackend {
    buffers: Option<GraphBuffers>,
    forces: Vec<[f32; 2]>,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The loaded buffers, if any
    pub fn buffers(&self) -> Option<&GraphBuffers> {
        self.buffers.as_ref()
    }
}

impl ForceBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn load(&mut self, buffers: GraphBuffers) -> LayoutResult<()> {
        debug!(
            nodes = buffers.node_count(),
            links = buffers.link_count(),
            "uploading graph to host backend"
        );
        self.forces = vec![[0.0, 0.0]; buffers.node_count()];
        self.buffers = Some(buffers);
        Ok(())
    }

    fn step(&mut self, uniforms: &SimulationUniforms) {
        let Some(buffers) = self.buffers.as_mut() else {
            return;
        };

        {
            let nodes = &buffers.nodes;
            let topology = buffers.topology();
            self.forces
                .par_iter_mut()
                .enumerate()
                .for_each(|(index, force)| {
                    *force = kernel::node_force(index, nodes, &topology, uniforms);
                });
        }

        buffers
            .nodes
            .par_iter_mut()
            .zip(self.forces.par_iter())
            .for_each(|(node, force)| kernel::integrate(node, *force, uniforms));
    }

    fn read_nodes(&mut self) -> LayoutResult<Vec<GpuNode>> {
        Ok(self
            .buffers
            .as_ref()
            .map(|b| b.nodes.clone())
            .unwrap_or_default())
    }

    fn node_count(&self) -> usize {
        self.buffers.as_ref().map_or(0, GraphBuffers::node_count)
    }

    fn link_count(&self) -> usize {
        self.buffers.as_ref().map_or(0, GraphBuffers::link_count)
    }
}
