//! WGSL render shaders for 2D graph drawing
//!
//! Nodes and links are drawn as instanced quads. The vertex shaders read the
//! simulation's node and link storage buffers directly, so a frame needs no
//! host copy of the positions.

/// Vertices per instanced quad (two triangles)
pub const QUAD_VERTICES: u32 = 6;

/// View uniform and storage bindings shared by both shaders
pub const VIEW_BINDINGS: &str = r#"
struct View {
    center: vec2<f32>,
    scale: vec2<f32>,
    node_size: f32,
    link_thickness: f32,
    _padding: vec2<f32>,
}

struct Node {
    position: vec2<f32>,
    last_position: vec2<f32>,
    velocity: vec2<f32>,
    acceleration: vec2<f32>,
    in_degree: u32,
    out_degree: u32,
}

struct Link {
    source: u32,
    target: u32,
}

@group(0) @binding(0) var<uniform> view: View;
@group(0) @binding(1) var<storage, read> nodes: array<Node>;
@group(0) @binding(2) var<storage, read> links: array<Link>;

fn to_clip(world: vec2<f32>) -> vec4<f32> {
    return vec4<f32>((world - view.center) * view.scale, 0.0, 1.0);
}

// Corner of a unit quad spanning [-1, 1]^2, two triangles
fn quad_corner(vertex_idx: u32) -> vec2<f32> {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, 1.0),
    );
    return corners[vertex_idx];
}
"#;

/// Node quads, discarded outside the inscribed disc
pub const NODE_SHADER: &str = r#"
struct NodeOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) local: vec2<f32>,
}

@vertex
fn vs_node(
    @builtin(vertex_index) vertex_idx: u32,
    @builtin(instance_index) instance_idx: u32,
) -> NodeOutput {
    var out: NodeOutput;
    let corner = quad_corner(vertex_idx);
    let world = nodes[instance_idx].position + corner * view.node_size;
    out.clip_position = to_clip(world);
    out.local = corner;
    return out;
}

@fragment
fn fs_node(in: NodeOutput) -> @location(0) vec4<f32> {
    if (dot(in.local, in.local) > 1.0) {
        discard;
    }
    return vec4<f32>(0.95, 0.55, 0.2, 1.0);
}
"#;

/// Link quads of constant world-space width
pub const LINK_SHADER: &str = r#"
@vertex
fn vs_link(
    @builtin(vertex_index) vertex_idx: u32,
    @builtin(instance_index) instance_idx: u32,
) -> @builtin(position) vec4<f32> {
    let link = links[instance_idx];
    let start = nodes[link.source].position;
    let end = nodes[link.target].position;

    let along = end - start;
    let len = length(along);
    var normal = vec2<f32>(0.0, 1.0);
    if (len > 0.0) {
        normal = vec2<f32>(-along.y, along.x) / len;
    }

    let corner = quad_corner(vertex_idx);
    let t = corner.x * 0.5 + 0.5;
    let world = start + along * t + normal * (corner.y * 0.5 * view.link_thickness);
    return to_clip(world);
}

@fragment
fn fs_link() -> @location(0) vec4<f32> {
    return vec4<f32>(0.6, 0.6, 0.65, 1.0);
}
"#;

/// Complete node shader source
pub fn node_shader() -> String {
    format!("{}\n{}", VIEW_BINDINGS, NODE_SHADER)
}

/// Complete link shader source
pub fn link_shader() -> String {
    format!("{}\n{}", VIEW_BINDINGS, LINK_SHADER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_shader_entry_points() {
        let shader = node_shader();
        assert!(shader.contains("fn vs_node"));
        assert!(shader.contains("fn fs_node"));
        assert!(shader.contains("discard"));
    }

    #[test]
    fn test_link_shader_entry_points() {
        let shader = link_shader();
        assert!(shader.contains("fn vs_link"));
        assert!(shader.contains("fn fs_link"));
    }

    #[test]
    fn test_shaders_read_simulation_buffers() {
        for shader in [node_shader(), link_shader()] {
            assert!(shader.contains("var<storage, read> nodes"));
            assert!(shader.contains("@group(0) @binding(0) var<uniform> view"));
        }
    }

    #[test]
    fn test_quad_table_matches_vertex_count() {
        let table = format!("array<vec2<f32>, {}>", QUAD_VERTICES);
        assert!(VIEW_BINDINGS.contains(&table));
    }
}
