//! In-memory graph model
//!
//! A graph is a node array plus a link list. Array position is the canonical node
//! identity: every link endpoint and every adjacency entry is an index into
//! [`Graph::nodes`]. The `id` field is carried along as a display label only.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{LayoutError, LayoutResult};
use crate::gpu::GpuNode;

/// A 2D vector as it appears in graph files.
///
/// Deserializes from either `{"x": 1.0, "y": 2.0}` or `[1.0, 2.0]`,
/// and always serializes as an object.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<[f32; 2]> for Vec2 {
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Vec2> for [f32; 2] {
    fn from(v: Vec2) -> Self {
        [v.x, v.y]
    }
}

impl<'de> Deserialize<'de> for Vec2 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Object { x: f32, y: f32 },
            Array([f32; 2]),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Object { x, y } => Vec2 { x, y },
            Repr::Array(xy) => xy.into(),
        })
    }
}

/// A node record.
///
/// Position and integrator fields present in a source file are ignored by the
/// simulation; the layout initializer overwrites them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Display label; equals the node's array index in well-formed files
    pub id: u32,
    #[serde(default)]
    pub position: Vec2,
    #[serde(default)]
    pub last_position: Vec2,
    #[serde(default)]
    pub velocity: Vec2,
    #[serde(default)]
    pub acceleration: Vec2,
    /// Merged degree (undirected) or in + out (directed)
    #[serde(default)]
    pub degree: u32,
    #[serde(default)]
    pub in_degree: u32,
    #[serde(default)]
    pub out_degree: u32,
}

impl Node {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

/// A link between two node indices. Self-loops and parallel links are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub source: u32,
    pub target: u32,
}

impl Link {
    pub fn new(source: u32, target: u32) -> Self {
        Self { source, target }
    }
}

/// Nodes and links as loaded from a source file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Graph {
    pub fn new(nodes: Vec<Node>, links: Vec<Link>) -> Self {
        Self { nodes, links }
    }

    /// Build a graph whose nodes are labelled `0..node_count`
    pub fn with_node_count(node_count: usize, links: Vec<Link>) -> Self {
        let nodes = (0..node_count as u32).map(Node::new).collect();
        Self { nodes, links }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Check that every link endpoint indexes into the node array.
    ///
    /// Reports the first offending link in link-list order.
    pub fn validate(&self) -> LayoutResult<()> {
        let node_count = self.node_count();
        for (index, link) in self.links.iter().enumerate() {
            for endpoint in [link.source, link.target] {
                if endpoint as usize >= node_count {
                    return Err(LayoutError::Topology {
                        link: index,
                        endpoint,
                        node_count,
                    });
                }
            }
        }
        Ok(())
    }

    /// Copy simulated state back into the node records.
    ///
    /// `state` must be the node buffer produced for this graph (same length,
    /// same order).
    pub fn apply_layout(&mut self, state: &[GpuNode]) {
        for (node, gpu) in self.nodes.iter_mut().zip(state) {
            node.position = gpu.position.into();
            node.last_position = gpu.last_position.into();
            node.velocity = gpu.velocity.into();
            node.acceleration = gpu.acceleration.into();
        }
    }
}
