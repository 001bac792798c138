//! forcelayout - Force-directed 2D graph layout.
//!
//! A graph file is read into a [`Graph`], its links are compiled into CSR
//! adjacency, nodes are seeded on a golden-angle spiral, and a two-phase force
//! kernel (repulsion, spring attraction, gravity, then integration) runs once
//! per frame on a [`ForceBackend`]: the host thread pool by default, or a wgpu
//! device with the `gpu` feature.

pub mod adjacency;
pub mod backend;
pub mod error;
pub mod gpu;
pub mod graph;
pub mod io;
pub mod kernel;
pub mod layout;
pub mod params;
pub mod session;

pub use adjacency::{Adjacency, Csr, TopologyMode};
pub use backend::{CpuBackend, ForceBackend, GraphBuffers};
pub use error::{LayoutError, LayoutResult};
pub use graph::{Graph, Link, Node, Vec2};
pub use io::{FormatRegistry, TextFormat};
pub use params::{IntegratorKind, SimulationParams};
pub use session::{LayoutStats, Session};
