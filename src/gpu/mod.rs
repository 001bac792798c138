//! Device-side pieces of the force simulation
//!
//! The packed buffer types and WGSL sources are always compiled: the host
//! backend works on the same [`GpuNode`] layout, and the shader text is
//! testable without a device. The wgpu compute simulation and the offscreen
//! renderer need the `gpu` feature.
//!
//! # Example
//!
//! ```rust,ignore
//! use forcelayout::backend::{ForceBackend, GraphBuffers};
//! use forcelayout::gpu::GpuSimulation;
//!
//! let mut sim = GpuSimulation::new()?;
//! sim.load(buffers)?;
//! for _ in 0..500 {
//!     sim.step(&uniforms);
//! }
//! let nodes = sim.read_nodes()?;
//! ```

pub mod ppm;
pub mod render_shaders;
pub mod shaders;
mod types;
pub mod view;

#[cfg(feature = "gpu")]
mod renderer;
#[cfg(feature = "gpu")]
mod simulation;

pub use ppm::{encode_ppm, write_ppm};
pub use shaders::{WORKGROUP_SIZE, force_kernel_shader};
pub use types::{
    GpuLink, GpuNode, INTEGRATOR_VELOCITY, INTEGRATOR_VERLET, SimulationUniforms, ViewUniforms,
};
pub use view::View2D;

#[cfg(feature = "gpu")]
pub use renderer::{GpuRenderer, RenderConfig};
#[cfg(feature = "gpu")]
pub use simulation::GpuSimulation;
