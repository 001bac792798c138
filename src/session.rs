//! Host loop: owns one backend and drives it frame by frame
//!
//! A [`Session`] is the single owner of the loaded graph. Loading is
//! all-or-nothing: the new graph is read, validated, compiled and placed on
//! the host first, then handed to the backend in one swap. Any failure along
//! the way leaves the previous graph running untouched.

use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, info};

use crate::adjacency::{Adjacency, TopologyMode};
use crate::backend::{ForceBackend, GraphBuffers};
use crate::error::LayoutResult;
use crate::gpu::GpuNode;
use crate::graph::Graph;
use crate::io::FormatRegistry;
use crate::params::SimulationParams;

/// Steps between speed checks in [`Session::run_until_settled`]
const SETTLE_CHECK_INTERVAL: usize = 10;

/// Snapshot of the running simulation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LayoutStats {
    pub nodes: usize,
    pub links: usize,
    /// Frames stepped since the current graph was loaded
    pub frames: u64,
    pub mean_speed: f32,
    pub max_speed: f32,
    /// `(min, max)` corners of the node bounding box; `None` for an empty graph
    pub bounds: Option<([f32; 2], [f32; 2])>,
}

impl LayoutStats {
    fn from_nodes(nodes: &[GpuNode], links: usize, frames: u64) -> Self {
        let mut stats = Self {
            nodes: nodes.len(),
            links,
            frames,
            ..Self::default()
        };
        let Some(first) = nodes.first() else {
            return stats;
        };

        let (mut min, mut max) = (first.position, first.position);
        let mut total = 0.0;
        for node in nodes {
            let speed = node.speed();
            total += speed;
            stats.max_speed = stats.max_speed.max(speed);
            for axis in 0..2 {
                min[axis] = min[axis].min(node.position[axis]);
                max[axis] = max[axis].max(node.position[axis]);
            }
        }
        stats.mean_speed = total / nodes.len() as f32;
        stats.bounds = Some((min, max));
        stats
    }
}

/// A loaded graph plus the backend simulating it
pub struct Session<B: ForceBackend> {
    backend: B,
    params: SimulationParams,
    mode: TopologyMode,
    registry: FormatRegistry,
    rng: StdRng,
    graph: Option<Graph>,
    source: Option<PathBuf>,
    frames: u64,
}

impl<B: ForceBackend> Session<B> {
    pub fn new(backend: B, mode: TopologyMode, params: SimulationParams) -> Self {
        Self {
            backend,
            params: params.clamped(),
            mode,
            registry: FormatRegistry::with_defaults(),
            rng: StdRng::from_os_rng(),
            graph: None,
            source: None,
            frames: 0,
        }
    }

    /// Make the initial jitter reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn mode(&self) -> TopologyMode {
        self.mode
    }

    /// Path of the last successfully loaded graph file
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// The loaded graph as read, with degree counters filled in
    pub fn graph(&self) -> Option<&Graph> {
        self.graph.as_ref()
    }

    /// Replace the parameters. Takes effect on the next frame; never fails.
    pub fn set_params(&mut self, params: SimulationParams) {
        self.params = params.clamped();
        debug!(params = ?self.params, "parameters updated");
    }

    /// Read a graph file and load it
    pub fn load_path(&mut self, path: &Path) -> LayoutResult<()> {
        let graph = self.registry.read_graph(path)?;
        self.load_graph(graph)?;
        self.source = Some(path.to_path_buf());
        Ok(())
    }

    /// Load the last source file again.
    ///
    /// Does nothing if no file has been loaded yet.
    pub fn reload(&mut self) -> LayoutResult<()> {
        let Some(path) = self.source.clone() else {
            debug!("reload requested with no source file");
            return Ok(());
        };
        info!(path = %path.display(), "reloading graph");
        self.load_path(&path)
    }

    /// Compile and upload an in-memory graph, replacing the current one
    pub fn load_graph(&mut self, mut graph: Graph) -> LayoutResult<()> {
        let adjacency = Adjacency::compile(&graph, self.mode)?;
        adjacency.record_degrees(&mut graph);
        let buffers =
            GraphBuffers::build(&graph, &adjacency, self.params.node_scale, &mut self.rng);

        self.backend.load(buffers)?;

        info!(
            backend = self.backend.name(),
            nodes = graph.node_count(),
            links = graph.link_count(),
            mode = ?self.mode,
            "graph loaded"
        );
        self.graph = Some(graph);
        self.frames = 0;
        Ok(())
    }

    /// Push this frame's uniforms and run exactly one step
    pub fn frame(&mut self, delta_time: f32) {
        let uniforms = self.params.uniforms(
            delta_time,
            self.backend.node_count(),
            self.backend.link_count(),
            self.mode,
        );
        self.backend.step(&uniforms);
        self.frames += 1;
    }

    /// Run `steps` frames at a fixed `delta_time`
    pub fn run(&mut self, steps: usize, delta_time: f32) {
        for _ in 0..steps {
            self.frame(delta_time);
        }
    }

    /// Step until the mean node speed falls below `threshold` or `max_steps`
    /// frames have run. Returns the number of frames stepped.
    pub fn run_until_settled(
        &mut self,
        max_steps: usize,
        threshold: f32,
        delta_time: f32,
    ) -> LayoutResult<usize> {
        let mut steps = 0;
        while steps < max_steps {
            let batch = SETTLE_CHECK_INTERVAL.min(max_steps - steps);
            self.run(batch, delta_time);
            steps += batch;

            let stats = self.stats()?;
            if stats.mean_speed < threshold {
                debug!(steps, mean_speed = stats.mean_speed, "layout settled");
                break;
            }
        }
        Ok(steps)
    }

    /// Current node state from the backend
    pub fn nodes(&mut self) -> LayoutResult<Vec<GpuNode>> {
        self.backend.read_nodes()
    }

    pub fn stats(&mut self) -> LayoutResult<LayoutStats> {
        let nodes = self.backend.read_nodes()?;
        Ok(LayoutStats::from_nodes(
            &nodes,
            self.backend.link_count(),
            self.frames,
        ))
    }

    /// The loaded graph with simulated positions written back
    pub fn laid_out_graph(&mut self) -> LayoutResult<Option<Graph>> {
        let Some(graph) = self.graph.as_ref() else {
            return Ok(None);
        };
        let mut graph = graph.clone();
        let nodes = self.backend.read_nodes()?;
        graph.apply_layout(&nodes);
        Ok(Some(graph))
    }
}
