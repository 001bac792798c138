//! 2D view transform for graph drawing
//!
//! Maps world coordinates to clip space with a center point and a uniform
//! zoom, corrected for the target's aspect ratio. Fixed per frame; there is
//! no interactive pan or zoom.

use super::types::{GpuNode, ViewUniforms};

/// Smallest accepted zoom
pub const MIN_ZOOM: f32 = 1e-6;

/// Fraction of the frame left empty around a fitted graph
const FIT_MARGIN: f32 = 0.1;

/// Orthographic 2D view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct View2D {
    /// World-space point at the center of the frame
    pub center: [f32; 2],
    /// Clip-space units per world unit along the shorter axis
    pub zoom: f32,
    /// Width / height of the target
    pub aspect: f32,
    /// Node disc radius in world units
    pub node_size: f32,
    /// Link quad width in world units
    pub link_thickness: f32,
}

impl View2D {
    pub fn new(aspect: f32) -> Self {
        let defaults = ViewUniforms::default();
        Self {
            center: [0.0, 0.0],
            zoom: 1.0,
            aspect: if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 },
            node_size: defaults.node_size,
            link_thickness: defaults.link_thickness,
        }
    }

    /// Center on the nodes' bounding box and zoom so all of it is visible
    pub fn fit(mut self, nodes: &[GpuNode]) -> Self {
        let Some(first) = nodes.first() else {
            return self;
        };
        let (mut min, mut max) = (first.position, first.position);
        for node in nodes {
            for axis in 0..2 {
                min[axis] = min[axis].min(node.position[axis]);
                max[axis] = max[axis].max(node.position[axis]);
            }
        }

        self.center = [(min[0] + max[0]) * 0.5, (min[1] + max[1]) * 0.5];

        // Half extents padded by the disc radius so edge nodes stay whole
        let half_w = (max[0] - min[0]) * 0.5 + self.node_size;
        let half_h = (max[1] - min[1]) * 0.5 + self.node_size;
        let needed = (half_w / self.aspect.max(1.0)).max(half_h * self.aspect.min(1.0));
        if needed > 0.0 && needed.is_finite() {
            self.zoom = ((1.0 - FIT_MARGIN) / needed).max(MIN_ZOOM);
        }
        self
    }

    /// Uniform block for the render shaders
    pub fn uniforms(&self) -> ViewUniforms {
        let zoom = self.zoom.max(MIN_ZOOM);
        let (sx, sy) = if self.aspect >= 1.0 {
            (zoom / self.aspect, zoom)
        } else {
            (zoom, zoom * self.aspect)
        };
        ViewUniforms {
            center: self.center,
            scale: [sx, sy],
            node_size: self.node_size,
            link_thickness: self.link_thickness,
            _padding: [0.0; 2],
        }
    }

    /// Clip-space position of a world point
    pub fn project(&self, world: [f32; 2]) -> [f32; 2] {
        let u = self.uniforms();
        [
            (world[0] - u.center[0]) * u.scale[0],
            (world[1] - u.center[1]) * u.scale[1],
        ]
    }
}

impl Default for View2D {
    fn default() -> Self {
        Self::new(1.0)
    }
}
