//! Simulation parameters
//!
//! Parameters may change every frame without a reload. They are clamped into
//! their safe ranges whenever they enter the system, so the kernel never sees a
//! value that could produce a non-finite force.

use std::fs;
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::adjacency::TopologyMode;
use crate::error::LayoutResult;
use crate::gpu::{INTEGRATOR_VELOCITY, INTEGRATOR_VERLET, SimulationUniforms};
use crate::io::TextFormat;

/// Smallest distance floor the kernel will accept
pub const MIN_DISTANCE_FLOOR: f32 = 1e-4;

pub const DEFAULT_REPULSION_STRENGTH: f32 = 0.01;
pub const DEFAULT_ATTRACTION_STRENGTH: f32 = 1.0;
pub const DEFAULT_DAMPING: f32 = 0.995;
pub const DEFAULT_GRAVITY: f32 = 0.1;
pub const DEFAULT_MIN_DISTANCE: f32 = 0.05;
pub const DEFAULT_MIN_LENGTH: f32 = 0.05;
pub const DEFAULT_NODE_SCALE: f32 = 0.1;
pub const DEFAULT_MAX_DISPLACEMENT: f32 = 1.0;

/// Largest per-step displacement accepted; keeps positions far from overflow
pub const MAX_DISPLACEMENT_CEILING: f32 = 1e6;

/// Integration scheme used by the kernel's second phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IntegratorKind {
    /// `v = (v + F·dt)·damping; p += v·dt`
    Velocity,
    /// Implicit velocity from `position − last_position`, damped each step
    #[default]
    Verlet,
}

impl IntegratorKind {
    fn flag(self) -> u32 {
        match self {
            IntegratorKind::Velocity => INTEGRATOR_VELOCITY,
            IntegratorKind::Verlet => INTEGRATOR_VERLET,
        }
    }
}

/// Tunable simulation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub repulsion_strength: f32,
    pub attraction_strength: f32,
    /// Per-step velocity multiplier; 1 disables decay
    pub damping: f32,
    pub gravity: f32,
    /// Distance floor applied before dividing by a distance
    pub min_distance: f32,
    /// Spring rest length
    pub min_length: f32,
    /// Spacing of the initial spiral
    pub node_scale: f32,
    /// Longest distance a node may move in one step, whatever the frame time
    pub max_displacement: f32,
    pub integrator: IntegratorKind,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            repulsion_strength: DEFAULT_REPULSION_STRENGTH,
            attraction_strength: DEFAULT_ATTRACTION_STRENGTH,
            damping: DEFAULT_DAMPING,
            gravity: DEFAULT_GRAVITY,
            min_distance: DEFAULT_MIN_DISTANCE,
            min_length: DEFAULT_MIN_LENGTH,
            node_scale: DEFAULT_NODE_SCALE,
            max_displacement: DEFAULT_MAX_DISPLACEMENT,
            integrator: IntegratorKind::default(),
        }
    }
}

/// Replace non-finite values with `fallback`, then clamp to `[min, max]`
fn sanitize(value: f32, fallback: f32, min: f32, max: f32) -> f32 {
    let value = if value.is_finite() { value } else { fallback };
    value.clamp(min, max)
}

impl SimulationParams {
    /// Load parameters from a JSON or YAML file. Missing fields take defaults.
    pub fn load(path: &Path) -> LayoutResult<Self> {
        let format = TextFormat::from_path(path)?;
        let content = fs::read_to_string(path)?;
        let params: Self = format.deserialize(&content)?;
        Ok(params.clamped())
    }

    /// Copy with every field forced into its safe range
    pub fn clamped(self) -> Self {
        let defaults = Self::default();
        Self {
            repulsion_strength: sanitize(
                self.repulsion_strength,
                defaults.repulsion_strength,
                0.0,
                f32::MAX,
            ),
            attraction_strength: sanitize(
                self.attraction_strength,
                defaults.attraction_strength,
                0.0,
                f32::MAX,
            ),
            damping: sanitize(self.damping, defaults.damping, 0.0, 1.0),
            gravity: sanitize(self.gravity, defaults.gravity, 0.0, f32::MAX),
            min_distance: sanitize(
                self.min_distance,
                defaults.min_distance,
                MIN_DISTANCE_FLOOR,
                f32::MAX,
            ),
            min_length: sanitize(self.min_length, defaults.min_length, 0.0, f32::MAX),
            node_scale: sanitize(self.node_scale, defaults.node_scale, 0.0, f32::MAX),
            max_displacement: sanitize(
                self.max_displacement,
                defaults.max_displacement,
                MIN_DISTANCE_FLOOR,
                MAX_DISPLACEMENT_CEILING,
            ),
            integrator: self.integrator,
        }
    }

    /// Build the per-frame uniform block.
    ///
    /// `delta_time` is made finite and non-negative but is otherwise passed through;
    /// large frame times are not sub-stepped.
    pub fn uniforms(
        &self,
        delta_time: f32,
        node_count: usize,
        link_count: usize,
        mode: TopologyMode,
    ) -> SimulationUniforms {
        let params = self.clamped();
        SimulationUniforms {
            repulsion_strength: params.repulsion_strength,
            attraction_strength: params.attraction_strength,
            damping: params.damping,
            gravity: params.gravity,
            min_distance: params.min_distance,
            min_length: params.min_length,
            delta_time: sanitize(delta_time, 0.0, 0.0, f32::MAX),
            node_count: node_count as u32,
            link_count: link_count as u32,
            directed: u32::from(mode == TopologyMode::Directed),
            integrator: params.integrator.flag(),
            max_displacement: params.max_displacement,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LayoutError;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_already_clamped() {
        let params = SimulationParams::default();
        assert_eq!(params, params.clamped());
    }

    #[test]
    fn clamping_fixes_out_of_range_values() {
        let params = SimulationParams {
            repulsion_strength: -1.0,
            attraction_strength: f32::NAN,
            damping: 1.5,
            gravity: f32::INFINITY,
            min_distance: 0.0,
            min_length: -3.0,
            node_scale: -0.1,
            max_displacement: f32::INFINITY,
            integrator: IntegratorKind::Velocity,
        }
        .clamped();

        assert_eq!(params.repulsion_strength, 0.0);
        assert_eq!(params.attraction_strength, DEFAULT_ATTRACTION_STRENGTH);
        assert_eq!(params.damping, 1.0);
        assert_eq!(params.gravity, DEFAULT_GRAVITY);
        assert_eq!(params.min_distance, MIN_DISTANCE_FLOOR);
        assert_eq!(params.min_length, 0.0);
        assert_eq!(params.node_scale, 0.0);
        assert_eq!(params.max_displacement, DEFAULT_MAX_DISPLACEMENT);
        assert_eq!(params.integrator, IntegratorKind::Velocity);

        let zero_step = SimulationParams {
            max_displacement: 0.0,
            ..SimulationParams::default()
        };
        assert_eq!(zero_step.clamped().max_displacement, MIN_DISTANCE_FLOOR);
    }

    #[test]
    fn uniforms_carry_counts_and_flags() {
        let params = SimulationParams {
            integrator: IntegratorKind::Velocity,
            ..SimulationParams::default()
        };
        let uniforms = params.uniforms(0.016, 10, 12, TopologyMode::Directed);
        assert_eq!(uniforms.node_count, 10);
        assert_eq!(uniforms.link_count, 12);
        assert_eq!(uniforms.directed, 1);
        assert_eq!(uniforms.integrator, INTEGRATOR_VELOCITY);
        assert_eq!(uniforms.delta_time, 0.016);
        assert_eq!(uniforms.max_displacement, DEFAULT_MAX_DISPLACEMENT);

        let undirected = SimulationParams::default().uniforms(0.0, 1, 0, TopologyMode::Undirected);
        assert_eq!(undirected.directed, 0);
        assert_eq!(undirected.integrator, INTEGRATOR_VERLET);
    }

    #[test]
    fn delta_time_is_finite_but_unbounded() {
        let params = SimulationParams::default();
        let mode = TopologyMode::Undirected;
        assert_eq!(params.uniforms(-1.0, 0, 0, mode).delta_time, 0.0);
        assert_eq!(params.uniforms(f32::NAN, 0, 0, mode).delta_time, 0.0);
        assert_eq!(params.uniforms(250.0, 0, 0, mode).delta_time, 250.0);
    }

    #[test]
    fn load_yaml_with_partial_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("params.yaml");
        fs::write(&path, "repulsion_strength: 0.05\nintegrator: velocity\ndamping: 2.0\n").unwrap();

        let params = SimulationParams::load(&path).unwrap();
        assert_eq!(params.repulsion_strength, 0.05);
        assert_eq!(params.integrator, IntegratorKind::Velocity);
        assert_eq!(params.damping, 1.0);
        assert_eq!(params.gravity, DEFAULT_GRAVITY);
    }

    #[test]
    fn load_json_and_reject_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let json = dir.path().join("params.json");
        fs::write(&json, r#"{"gravity": 0.5}"#).unwrap();
        assert_eq!(SimulationParams::load(&json).unwrap().gravity, 0.5);

        let toml = dir.path().join("params.toml");
        fs::write(&toml, "gravity = 0.5").unwrap();
        assert!(matches!(
            SimulationParams::load(&toml),
            Err(LayoutError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn malformed_params_file_is_a_deserialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("params.json");
        fs::write(&path, r#"{"gravity": "strong"}"#).unwrap();
        assert!(matches!(
            SimulationParams::load(&path),
            Err(LayoutError::Deserialization(_))
        ));
    }
}
