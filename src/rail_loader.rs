use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::rail::Rail;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RailFileFormat {
    pub name: String,
    pub nodes: Vec<RailNodeSpec>,
    #[serde(default)]
    pub closed_loop: bool,
    /// Catmull-Rom samples per authored segment; 0 or 1 keeps the nodes as-is.
    #[serde(default)]
    pub points_per_segment: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RailNodeSpec {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl From<RailNodeSpec> for Vec3 {
    fn from(node: RailNodeSpec) -> Self {
        Vec3::new(node.x, node.y, node.z)
    }
}

#[derive(Debug, Error)]
pub enum RailLoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub struct RailLoader;

impl RailLoader {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Rail, RailLoadError> {
        let content = fs::read_to_string(path)?;
        Self::load_from_string(&content)
    }

    /// Parse a rail from JSON (content starting with `{`) or YAML.
    pub fn load_from_string(content: &str) -> Result<Rail, RailLoadError> {
        let rail_file: RailFileFormat = if content.trim_start().starts_with('{') {
            serde_json::from_str(content)
                .map_err(|e| RailLoadError::Parse(format!("JSON parse error: {}", e)))?
        } else {
            serde_yaml::from_str(content)
                .map_err(|e| RailLoadError::Parse(format!("YAML parse error: {}", e)))?
        };

        Self::validate(&rail_file)?;
        Ok(Self::build_rail(rail_file))
    }

    fn validate(rail: &RailFileFormat) -> Result<(), RailLoadError> {
        if rail.nodes.len() < 2 {
            return Err(RailLoadError::InvalidData(
                "Rail must have at least 2 nodes".to_string(),
            ));
        }

        if let Some(i) = rail
            .nodes
            .iter()
            .position(|n| !Vec3::from(*n).is_finite())
        {
            return Err(RailLoadError::InvalidData(format!(
                "Node {} has a non-finite coordinate",
                i
            )));
        }

        Ok(())
    }

    fn build_rail(rail_file: RailFileFormat) -> Rail {
        let nodes: Vec<Vec3> = rail_file.nodes.iter().map(|n| Vec3::from(*n)).collect();
        let positions = if rail_file.points_per_segment > 1 {
            SplineInterpolator::interpolate(&nodes, rail_file.closed_loop, rail_file.points_per_segment)
        } else {
            nodes
        };
        debug!(
            "Built rail '{}' with {} nodes (loop: {})",
            rail_file.name,
            positions.len(),
            rail_file.closed_loop
        );
        Rail::new(positions, rail_file.closed_loop).with_name(rail_file.name)
    }
}

/// Densifies a coarse node list with a uniform Catmull-Rom spline through it.
pub struct SplineInterpolator;

impl SplineInterpolator {
    pub fn interpolate(nodes: &[Vec3], closed_loop: bool, points_per_segment: usize) -> Vec<Vec3> {
        let n = nodes.len();
        if n < 2 || points_per_segment < 2 {
            return nodes.to_vec();
        }

        let segments = if closed_loop { n } else { n - 1 };
        let mut points = Vec::with_capacity(segments * points_per_segment + 1);

        for i in 0..segments {
            let p0 = if closed_loop {
                nodes[(i + n - 1) % n]
            } else {
                nodes[i.saturating_sub(1)]
            };
            let p1 = nodes[i];
            let p2 = nodes[(i + 1) % n];
            let p3 = if closed_loop {
                nodes[(i + 2) % n]
            } else {
                nodes[(i + 2).min(n - 1)]
            };

            for j in 0..points_per_segment {
                let t = j as f32 / points_per_segment as f32;
                points.push(Self::catmull_rom_point(p0, p1, p2, p3, t));
            }
        }

        if !closed_loop {
            points.push(nodes[n - 1]);
        }
        points
    }

    fn catmull_rom_point(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, t: f32) -> Vec3 {
        let t2 = t * t;
        let t3 = t2 * t;

        0.5 * ((2.0 * p1)
            + (-p0 + p2) * t
            + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
            + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
    }
}
