//! Packed buffer types for the force simulation and rendering
//!
//! These types are uploaded directly to device buffers and are also the working
//! state of the host backend. All are repr(C) and Pod so a slice can be cast to
//! bytes without copying.

use bytemuck::{Pod, Zeroable};

/// `SimulationUniforms::integrator` value for the velocity scheme
pub const INTEGRATOR_VELOCITY: u32 = 0;

/// `SimulationUniforms::integrator` value for the Verlet scheme
pub const INTEGRATOR_VERLET: u32 = 1;

/// A node in the force simulation.
///
/// Layout matches the WGSL `Node` struct (40 bytes, 8-byte aligned).
/// Undirected graphs store the merged degree in both counters.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct GpuNode {
    pub position: [f32; 2],
    /// Position before the most recent step
    pub last_position: [f32; 2],
    /// Length per second under either scheme
    pub velocity: [f32; 2],
    /// Summed force from the most recent force pass
    pub acceleration: [f32; 2],
    pub in_degree: u32,
    pub out_degree: u32,
}

impl GpuNode {
    /// Create a node at rest at the given position
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            position: [x, y],
            last_position: [x, y],
            ..Self::default()
        }
    }

    pub fn with_degrees(mut self, in_degree: u32, out_degree: u32) -> Self {
        self.in_degree = in_degree;
        self.out_degree = out_degree;
        self
    }

    /// Length of the velocity vector
    pub fn speed(&self) -> f32 {
        let [vx, vy] = self.velocity;
        (vx * vx + vy * vy).sqrt()
    }
}

/// A link between two node indices.
///
/// Layout matches the WGSL `Link` struct (8 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct GpuLink {
    pub source: u32,
    pub target: u32,
}

impl GpuLink {
    pub fn new(source: u32, target: u32) -> Self {
        Self { source, target }
    }
}

/// Per-frame simulation parameters passed to the kernel as uniforms
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct SimulationUniforms {
    pub repulsion_strength: f32,
    pub attraction_strength: f32,
    /// Per-step velocity multiplier in [0, 1]
    pub damping: f32,
    pub gravity: f32,
    /// Distance floor applied before any division
    pub min_distance: f32,
    /// Spring rest length
    pub min_length: f32,
    /// Frame time in seconds
    pub delta_time: f32,
    pub node_count: u32,
    pub link_count: u32,
    /// 1 when separate in/out adjacency runs are bound
    pub directed: u32,
    /// `INTEGRATOR_VELOCITY` or `INTEGRATOR_VERLET`
    pub integrator: u32,
    /// Longest distance a node may move in one step
    pub max_displacement: f32,
}

/// View transform for the 2D renderer.
///
/// Layout matches the WGSL `View` struct.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ViewUniforms {
    /// World-space point at the center of the frame
    pub center: [f32; 2],
    /// World-to-clip scale per axis (zoom, corrected for aspect ratio)
    pub scale: [f32; 2],
    pub node_size: f32,
    pub link_thickness: f32,
    pub _padding: [f32; 2],
}

impl Default for ViewUniforms {
    fn default() -> Self {
        Self {
            center: [0.0, 0.0],
            scale: [1.0, 1.0],
            node_size: 0.1,
            link_thickness: 0.05,
            _padding: [0.0; 2],
        }
    }
}
