//! Per-node force and integration math
//!
//! These functions are the host-side twin of the WGSL kernels in
//! [`crate::gpu::shaders`]; both must produce the same step for the same input.
//!
//! A step has two phases separated by a barrier:
//!
//! 1. [`node_force`] reads the positions of the settled snapshot and returns the
//!    summed force on one node. It writes nothing shared.
//! 2. [`integrate`] consumes that force and advances one node's own slot.
//!
//! Neighbor indices are trusted here. The adjacency compiler guarantees every
//! index is below the node count before buffers are ever built.

use crate::gpu::{GpuNode, INTEGRATOR_VERLET, SimulationUniforms};

/// Read-only adjacency buffers as bound to the kernel.
///
/// For undirected graphs the merged structure sits in the incoming slot and the
/// outgoing slot is ignored.
#[derive(Debug, Clone, Copy)]
pub struct KernelTopology<'a> {
    pub in_adjacency: &'a [u32],
    pub in_offsets: &'a [u32],
    pub out_adjacency: &'a [u32],
    pub out_offsets: &'a [u32],
}

#[inline]
fn add(a: [f32; 2], b: [f32; 2]) -> [f32; 2] {
    [a[0] + b[0], a[1] + b[1]]
}

#[inline]
fn sub(a: [f32; 2], b: [f32; 2]) -> [f32; 2] {
    [a[0] - b[0], a[1] - b[1]]
}

#[inline]
fn scale(a: [f32; 2], s: f32) -> [f32; 2] {
    [a[0] * s, a[1] * s]
}

#[inline]
fn dot(a: [f32; 2], b: [f32; 2]) -> f32 {
    a[0] * b[0] + a[1] * b[1]
}

/// Inverse-square push of `position` away from `other`.
///
/// The squared distance is floored at `min_distance²`, so the magnitude never
/// exceeds `repulsion_strength / min_distance²`.
pub fn repulsion(position: [f32; 2], other: [f32; 2], uniforms: &SimulationUniforms) -> [f32; 2] {
    let delta = sub(position, other);
    let min_sq = uniforms.min_distance * uniforms.min_distance;
    let dist_sq = dot(delta, delta).max(min_sq);
    scale(delta, uniforms.repulsion_strength / (dist_sq * dist_sq.sqrt()))
}

/// Spring pull of `position` toward `neighbor` with rest length `min_length`
pub fn attraction(
    position: [f32; 2],
    neighbor: [f32; 2],
    uniforms: &SimulationUniforms,
) -> [f32; 2] {
    let delta = sub(neighbor, position);
    let dist = dot(delta, delta).sqrt().max(uniforms.min_distance);
    scale(
        delta,
        uniforms.attraction_strength * (dist - uniforms.min_length) / dist,
    )
}

/// Pull toward the origin proportional to distance from it
pub fn gravity(position: [f32; 2], uniforms: &SimulationUniforms) -> [f32; 2] {
    scale(position, -uniforms.gravity)
}

fn neighbor_run<'a>(adjacency: &'a [u32], offsets: &[u32], index: usize, degree: u32) -> &'a [u32] {
    let start = offsets[index] as usize;
    &adjacency[start..start + degree as usize]
}

/// Phase 1: total force on node `index` given the snapshot `nodes`
pub fn node_force(
    index: usize,
    nodes: &[GpuNode],
    topology: &KernelTopology<'_>,
    uniforms: &SimulationUniforms,
) -> [f32; 2] {
    let node = &nodes[index];
    let position = node.position;
    let mut force = [0.0, 0.0];

    for (j, other) in nodes.iter().enumerate() {
        if j != index {
            force = add(force, repulsion(position, other.position, uniforms));
        }
    }

    let incoming = neighbor_run(
        topology.in_adjacency,
        topology.in_offsets,
        index,
        node.in_degree,
    );
    for &j in incoming {
        force = add(force, attraction(position, nodes[j as usize].position, uniforms));
    }

    if uniforms.directed != 0 {
        let outgoing = neighbor_run(
            topology.out_adjacency,
            topology.out_offsets,
            index,
            node.out_degree,
        );
        for &j in outgoing {
            force = add(force, attraction(position, nodes[j as usize].position, uniforms));
        }
    }

    add(force, gravity(position, uniforms))
}

/// Bound one step's displacement to `max_len`.
///
/// A non-finite step becomes zero so the node stays where it was. The flag is
/// set when the step was changed.
fn limit_step(step: [f32; 2], max_len: f32) -> ([f32; 2], bool) {
    let len = dot(step, step).sqrt();
    if !len.is_finite() {
        ([0.0, 0.0], true)
    } else if len > max_len {
        (scale(step, max_len / len), true)
    } else {
        (step, false)
    }
}

/// Phase 2: advance one node given its phase-1 force.
///
/// Both schemes leave `velocity` in length per second, so speeds compare
/// across integrators. `delta_time` is not clamped, but each step moves a
/// node at most `max_displacement`.
pub fn integrate(node: &mut GpuNode, force: [f32; 2], uniforms: &SimulationUniforms) {
    let dt = uniforms.delta_time;
    let previous = node.position;
    node.acceleration = force;

    let verlet = uniforms.integrator == INTEGRATOR_VERLET;
    let step = if verlet {
        let implicit = scale(sub(previous, node.last_position), uniforms.damping);
        add(implicit, scale(force, dt * dt))
    } else {
        node.velocity = scale(add(node.velocity, scale(force, dt)), uniforms.damping);
        scale(node.velocity, dt)
    };

    let (step, limited) = limit_step(step, uniforms.max_displacement);
    node.position = add(previous, step);
    if verlet || limited {
        node.velocity = if dt > 0.0 {
            scale(step, 1.0 / dt)
        } else {
            [0.0, 0.0]
        };
    }
    node.last_position = previous;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::INTEGRATOR_VELOCITY;

    fn uniforms() -> SimulationUniforms {
        SimulationUniforms {
            repulsion_strength: 0.01,
            attraction_strength: 1.0,
            damping: 0.9,
            gravity: 0.0,
            min_distance: 0.05,
            min_length: 0.0,
            delta_time: 0.1,
            integrator: INTEGRATOR_VELOCITY,
            max_displacement: 10.0,
            ..SimulationUniforms::default()
        }
    }

    fn length(v: [f32; 2]) -> f32 {
        dot(v, v).sqrt()
    }

    #[test]
    fn repulsion_pushes_apart() {
        let force = repulsion([1.0, 0.0], [0.0, 0.0], &uniforms());
        assert!(force[0] > 0.0);
        assert_eq!(force[1], 0.0);
        assert!((force[0] - 0.01).abs() < 1e-6);
    }

    #[test]
    fn repulsion_is_finite_at_zero_distance() {
        let u = uniforms();
        let coincident = repulsion([0.3, 0.3], [0.3, 0.3], &u);
        assert_eq!(coincident, [0.0, 0.0]);

        let bound = u.repulsion_strength / (u.min_distance * u.min_distance);
        for gap in [1e-3_f32, 1e-6, 1e-9, 1e-20] {
            let force = repulsion([gap, 0.0], [0.0, 0.0], &u);
            assert!(force[0].is_finite());
            assert!(length(force) <= bound * 1.0001, "gap {gap}: {force:?}");
        }
    }

    #[test]
    fn attraction_is_a_spring_around_rest_length() {
        let u = SimulationUniforms {
            min_length: 1.0,
            ..uniforms()
        };
        let stretched = attraction([0.0, 0.0], [3.0, 0.0], &u);
        assert!((stretched[0] - 2.0).abs() < 1e-6);

        let compressed = attraction([0.0, 0.0], [0.5, 0.0], &u);
        assert!(compressed[0] < 0.0, "spring should push when compressed");

        let coincident = attraction([1.0, 1.0], [1.0, 1.0], &u);
        assert_eq!(coincident, [0.0, 0.0]);
    }

    #[test]
    fn gravity_points_at_origin() {
        let u = SimulationUniforms {
            gravity: 0.5,
            ..uniforms()
        };
        assert_eq!(gravity([2.0, -4.0], &u), [-1.0, 2.0]);
    }

    #[test]
    fn node_force_walks_only_the_incoming_run_when_undirected() {
        // 0 - 1 linked, 2 isolated far away; no repulsion
        let nodes = vec![
            GpuNode::at(0.0, 0.0).with_degrees(1, 1),
            GpuNode::at(2.0, 0.0).with_degrees(1, 1),
            GpuNode::at(0.0, 100.0),
        ];
        let topology = KernelTopology {
            in_adjacency: &[1, 0],
            in_offsets: &[0, 1, 2],
            out_adjacency: &[1, 0],
            out_offsets: &[0, 1, 2],
        };
        let u = SimulationUniforms {
            repulsion_strength: 0.0,
            ..uniforms()
        };

        let f0 = node_force(0, &nodes, &topology, &u);
        assert!((f0[0] - 2.0).abs() < 1e-6);
        assert_eq!(node_force(2, &nodes, &topology, &u), [0.0, 0.0]);

        let directed = SimulationUniforms { directed: 1, ..u };
        let f0 = node_force(0, &nodes, &topology, &directed);
        assert!((f0[0] - 4.0).abs() < 1e-6, "directed walks both runs");
    }

    #[test]
    fn velocity_integration_applies_force_then_damping() {
        let u = uniforms();
        let mut node = GpuNode::at(0.0, 0.0);
        integrate(&mut node, [10.0, 0.0], &u);

        // v = (0 + 10·0.1)·0.9 = 0.9; p = 0.9·0.1
        assert!((node.velocity[0] - 0.9).abs() < 1e-6);
        assert!((node.position[0] - 0.09).abs() < 1e-6);
        assert_eq!(node.last_position, [0.0, 0.0]);
        assert_eq!(node.acceleration, [10.0, 0.0]);
    }

    #[test]
    fn verlet_integration_uses_implicit_velocity() {
        let u = SimulationUniforms {
            integrator: INTEGRATOR_VERLET,
            ..uniforms()
        };
        let mut node = GpuNode::at(1.0, 0.0);
        node.last_position = [0.0, 0.0];

        integrate(&mut node, [0.0, 0.0], &u);

        assert!((node.position[0] - 1.9).abs() < 1e-6);
        assert_eq!(node.last_position, [1.0, 0.0]);
        // 0.9 moved over dt = 0.1
        assert!((node.velocity[0] - 9.0).abs() < 1e-4);
    }

    #[test]
    fn both_integrators_report_speed_per_second() {
        for dt in [0.016_f32, 0.1] {
            let mut speeds = Vec::new();
            for integrator in [INTEGRATOR_VELOCITY, INTEGRATOR_VERLET] {
                let u = SimulationUniforms {
                    integrator,
                    damping: 1.0,
                    delta_time: dt,
                    ..uniforms()
                };
                let mut node = GpuNode::at(0.0, 0.0);
                integrate(&mut node, [0.08, 0.0], &u);
                speeds.push(node.speed());
            }
            // Starting from rest both schemes move F·dt per second
            for speed in &speeds {
                assert!((speed - 0.08 * dt).abs() < 1e-6, "dt {dt}: {speeds:?}");
            }
        }
    }

    #[test]
    fn displacement_is_capped_per_step() {
        for integrator in [INTEGRATOR_VELOCITY, INTEGRATOR_VERLET] {
            let u = SimulationUniforms {
                integrator,
                delta_time: 50.0,
                max_displacement: 0.5,
                ..uniforms()
            };
            let mut node = GpuNode::at(1.0, 1.0);
            integrate(&mut node, [3.0, 4.0], &u);

            let moved = length(sub(node.position, [1.0, 1.0]));
            assert!((moved - 0.5).abs() < 1e-5, "integrator {integrator}: {moved}");
            assert!((node.position[0] - 1.3).abs() < 1e-5);
            assert!((node.speed() - 0.5 / 50.0).abs() < 1e-6);
        }
    }

    #[test]
    fn non_finite_step_leaves_node_in_place() {
        for integrator in [INTEGRATOR_VELOCITY, INTEGRATOR_VERLET] {
            let u = SimulationUniforms {
                integrator,
                ..uniforms()
            };
            let mut node = GpuNode::at(2.0, -1.0);
            integrate(&mut node, [f32::INFINITY, f32::NAN], &u);

            assert_eq!(node.position, [2.0, -1.0]);
            assert_eq!(node.velocity, [0.0, 0.0]);
        }
    }

    #[test]
    fn motion_decays_geometrically_without_forces() {
        for integrator in [INTEGRATOR_VELOCITY, INTEGRATOR_VERLET] {
            let u = SimulationUniforms {
                integrator,
                ..uniforms()
            };
            let mut node = GpuNode::at(0.0, 0.0);
            node.velocity = [1.0, -1.0];
            node.last_position = [-0.1, 0.1];

            let mut previous_speed = f32::INFINITY;
            for _ in 0..200 {
                integrate(&mut node, [0.0, 0.0], &u);
                let speed = node.speed();
                assert!(speed <= previous_speed);
                previous_speed = speed;
            }
            assert!(previous_speed < 1e-6, "integrator {integrator}: {previous_speed}");
            assert!(node.position.iter().all(|c| c.is_finite()));
        }
    }

    #[test]
    fn damping_of_one_preserves_velocity() {
        let u = SimulationUniforms {
            damping: 1.0,
            ..uniforms()
        };
        let mut node = GpuNode::at(0.0, 0.0);
        node.velocity = [1.0, 0.0];
        for _ in 0..10 {
            integrate(&mut node, [0.0, 0.0], &u);
        }
        assert_eq!(node.velocity, [1.0, 0.0]);
        assert!((node.position[0] - 1.0).abs() < 1e-5);
    }
}
