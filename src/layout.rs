//! Initial node placement on a golden-angle spiral
//!
//! Node `i` sits at radius `sqrt(i) * node_scale` and angle `i * π(3 − √5)`,
//! plus uniform jitter in `[-JITTER, JITTER)` on each axis. The jitter keeps
//! coincident nodes from starting the simulation at zero distance.

use std::f32::consts::PI;

use rand::Rng;

use crate::gpu::GpuNode;

/// Maximum jitter added to each coordinate
pub const JITTER: f32 = 0.1;

/// The golden angle in radians
pub fn golden_angle() -> f32 {
    PI * (3.0 - 5.0_f32.sqrt())
}

/// Spiral position of node `index`, without jitter
pub fn spiral_point(index: usize, node_scale: f32) -> [f32; 2] {
    let radius = (index as f32).sqrt() * node_scale;
    let angle = index as f32 * golden_angle();
    [radius * angle.cos(), radius * angle.sin()]
}

/// Place every node on the spiral and reset its integrator state.
///
/// `last_position` is set equal to `position` and velocity/acceleration are
/// zeroed, so both integration schemes start at rest.
pub fn initialize<R: Rng>(nodes: &mut [GpuNode], node_scale: f32, rng: &mut R) {
    for (index, node) in nodes.iter_mut().enumerate() {
        let [x, y] = spiral_point(index, node_scale);
        let position = [
            x + rng.random_range(-JITTER..JITTER),
            y + rng.random_range(-JITTER..JITTER),
        ];
        node.position = position;
        node.last_position = position;
        node.velocity = [0.0, 0.0];
        node.acceleration = [0.0, 0.0];
    }
}
