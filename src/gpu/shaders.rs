//! WGSL compute shaders for the force simulation
//!
//! One worker per node. `node_force` reads positions and writes only the
//! worker's own `acceleration`; `integrate` reads and writes only the worker's
//! own slot. The two entry points run as separate compute passes, so every
//! force is computed from the same settled snapshot.
//!
//! The math mirrors [`crate::kernel`] line for line.

/// Threads per workgroup for both entry points
pub const WORKGROUP_SIZE: u32 = 256;

/// Common type definitions and bindings
pub const TYPES: &str = r#"
struct Node {
    position: vec2<f32>,
    last_position: vec2<f32>,
    velocity: vec2<f32>,
    acceleration: vec2<f32>,
    in_degree: u32,
    out_degree: u32,
}

struct Uniforms {
    repulsion_strength: f32,
    attraction_strength: f32,
    damping: f32,
    gravity: f32,
    min_distance: f32,
    min_length: f32,
    delta_time: f32,
    node_count: u32,
    link_count: u32,
    directed: u32,
    integrator: u32,
    max_displacement: f32,
}

@group(0) @binding(0) var<storage, read_write> nodes: array<Node>;
@group(0) @binding(1) var<storage, read> in_adjacency: array<u32>;
@group(0) @binding(2) var<storage, read> in_offsets: array<u32>;
@group(0) @binding(3) var<storage, read> out_adjacency: array<u32>;
@group(0) @binding(4) var<storage, read> out_offsets: array<u32>;
@group(0) @binding(5) var<uniform> uniforms: Uniforms;
"#;

/// Force pass: repulsion from every other node, springs along the adjacency
/// runs, gravity toward the origin
pub const NODE_FORCE: &str = r#"
fn repulsion(position: vec2<f32>, other: vec2<f32>) -> vec2<f32> {
    let delta = position - other;
    // Floor before dividing so coincident nodes give a finite (zero) force
    let min_sq = uniforms.min_distance * uniforms.min_distance;
    let dist_sq = max(dot(delta, delta), min_sq);
    return delta * (uniforms.repulsion_strength / (dist_sq * sqrt(dist_sq)));
}

fn attraction(position: vec2<f32>, neighbor: vec2<f32>) -> vec2<f32> {
    let delta = neighbor - position;
    let dist = max(sqrt(dot(delta, delta)), uniforms.min_distance);
    return delta * (uniforms.attraction_strength * (dist - uniforms.min_length) / dist);
}

@compute @workgroup_size(256)
fn node_force(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let node_idx = global_id.x;
    if (node_idx >= uniforms.node_count) {
        return;
    }

    let position = nodes[node_idx].position;
    var force = vec2<f32>(0.0, 0.0);

    for (var j = 0u; j < uniforms.node_count; j++) {
        if (j == node_idx) {
            continue;
        }
        force += repulsion(position, nodes[j].position);
    }

    let in_start = in_offsets[node_idx];
    let in_end = in_start + nodes[node_idx].in_degree;
    for (var k = in_start; k < in_end; k++) {
        force += attraction(position, nodes[in_adjacency[k]].position);
    }

    if (uniforms.directed != 0u) {
        let out_start = out_offsets[node_idx];
        let out_end = out_start + nodes[node_idx].out_degree;
        for (var k = out_start; k < out_end; k++) {
            force += attraction(position, nodes[out_adjacency[k]].position);
        }
    }

    force += position * -uniforms.gravity;

    nodes[node_idx].acceleration = force;
}
"#;

/// Integration pass: velocity (integrator 0) or Verlet (integrator 1)
pub const INTEGRATE: &str = r#"
const F32_MAX: f32 = 3.40282347e38;

@compute @workgroup_size(256)
fn integrate(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let node_idx = global_id.x;
    if (node_idx >= uniforms.node_count) {
        return;
    }

    var node = nodes[node_idx];
    let dt = uniforms.delta_time;
    let previous = node.position;
    let force = node.acceleration;
    let verlet = uniforms.integrator == 1u;

    var step: vec2<f32>;
    if (verlet) {
        let implicit = (previous - node.last_position) * uniforms.damping;
        step = implicit + force * (dt * dt);
    } else {
        node.velocity = (node.velocity + force * dt) * uniforms.damping;
        step = node.velocity * dt;
    }

    // A non-finite step leaves the node in place; a long one is shortened
    let len = length(step);
    var limited = false;
    if (!(len <= F32_MAX)) {
        step = vec2<f32>(0.0, 0.0);
        limited = true;
    } else if (len > uniforms.max_displacement) {
        step = step * (uniforms.max_displacement / len);
        limited = true;
    }

    node.position = previous + step;
    if (verlet || limited) {
        if (dt > 0.0) {
            node.velocity = step / dt;
        } else {
            node.velocity = vec2<f32>(0.0, 0.0);
        }
    }
    node.last_position = previous;

    nodes[node_idx] = node;
}
"#;

/// Complete module with both entry points
pub fn force_kernel_shader() -> String {
    format!("{}\n{}\n{}", TYPES, NODE_FORCE, INTEGRATE)
}
