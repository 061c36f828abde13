//! Rail geometry: an ordered node list approximating a spline.
//!
//! Nodes live in one contiguous `Vec` and are addressed by index. Segment `i`
//! runs from node `i` to node `i + 1`; a looped rail has an extra closing
//! segment from the last node back to the first. Every query on a rail with no
//! nodes returns `None`.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Segment lengths below this are treated as zero when projecting.
const DEGENERATE_SEGMENT: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RailNode {
    pub position: Vec3,
    /// Distance along the rail from node 0.
    pub arclength: f32,
}

/// Result of projecting a world point onto the rail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RailProjection {
    pub segment: usize,
    /// Distance from the segment's start node to `position`.
    pub offset: f32,
    pub position: Vec3,
    /// Distance along the rail from node 0 to `position`.
    pub arclength: f32,
    pub distance_squared: f32,
}

/// Position and unit direction of travel at some point on the rail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RailSample {
    pub position: Vec3,
    pub direction: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rail {
    name: String,
    nodes: Vec<RailNode>,
    looped: bool,
    total_length: f32,
    max_spacing: f32,
}

impl Rail {
    pub fn new(positions: impl IntoIterator<Item = Vec3>, looped: bool) -> Self {
        let mut nodes: Vec<RailNode> = Vec::new();
        let mut cumulative = 0.0;
        for position in positions {
            if let Some(prev) = nodes.last() {
                cumulative += prev.position.distance(position);
            }
            nodes.push(RailNode {
                position,
                arclength: cumulative,
            });
        }

        let closing = match (nodes.first(), nodes.last()) {
            (Some(first), Some(last)) if looped && nodes.len() > 1 => {
                last.position.distance(first.position)
            }
            _ => 0.0,
        };

        let max_spacing = nodes
            .windows(2)
            .map(|pair| pair[1].arclength - pair[0].arclength)
            .fold(closing, f32::max);

        Self {
            name: "rail".to_string(),
            nodes,
            looped,
            total_length: cumulative + closing,
            max_spacing,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn total_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// A rail with no nodes is inactive; trackers skip their update on it.
    pub fn is_active(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn is_looped(&self) -> bool {
        self.looped
    }

    pub fn total_length(&self) -> f32 {
        self.total_length
    }

    pub fn nodes(&self) -> &[RailNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&RailNode> {
        self.nodes.get(index)
    }

    pub fn segment_count(&self) -> usize {
        match self.nodes.len() {
            0 | 1 => 0,
            n if self.looped => n,
            n => n - 1,
        }
    }

    /// Node index at the far end of `segment`.
    pub fn segment_end(&self, segment: usize) -> usize {
        if segment + 1 >= self.nodes.len() {
            0
        } else {
            segment + 1
        }
    }

    pub fn segment_length(&self, segment: usize) -> f32 {
        if segment >= self.segment_count() {
            return 0.0;
        }
        let end = self.segment_end(segment);
        if end == 0 {
            self.total_length - self.nodes[segment].arclength
        } else {
            self.nodes[end].arclength - self.nodes[segment].arclength
        }
    }

    /// Largest distance between two connected nodes.
    pub fn max_node_spacing(&self) -> f32 {
        self.max_spacing
    }

    /// A windowed hit this far from `point` may sit on a neighbouring stretch of
    /// rail (a hairpin's other leg) while the true nearest point lies elsewhere.
    fn needs_global_search(&self, local: &RailProjection) -> bool {
        local.distance_squared > self.max_spacing * self.max_spacing
    }

    /// Position `offset` units along `segment` from its start node.
    /// The offset is clamped to the segment.
    pub fn point_on_segment(&self, segment: usize, offset: f32) -> Option<Vec3> {
        let start = self.nodes.get(segment)?;
        if segment >= self.segment_count() {
            return Some(start.position);
        }
        let end = &self.nodes[self.segment_end(segment)];
        let length = self.segment_length(segment);
        if length <= DEGENERATE_SEGMENT {
            return Some(start.position);
        }
        let u = (offset / length).clamp(0.0, 1.0);
        Some(start.position.lerp(end.position, u))
    }

    /// Unit direction of travel along `segment`, zero for a degenerate one.
    pub fn segment_direction(&self, segment: usize) -> Vec3 {
        if segment >= self.segment_count() {
            return Vec3::ZERO;
        }
        let start = self.nodes[segment].position;
        let end = self.nodes[self.segment_end(segment)].position;
        (end - start).normalize_or_zero()
    }

    /// World position of the node nearest to `point`.
    pub fn get_nearest_node(&self, point: Vec3) -> Option<Vec3> {
        self.nearest_node_index(point).map(|i| self.nodes[i].position)
    }

    pub fn nearest_node_index(&self, point: Vec3) -> Option<usize> {
        self.nodes
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.position
                    .distance_squared(point)
                    .total_cmp(&b.position.distance_squared(point))
            })
            .map(|(i, _)| i)
    }

    /// Project `point` onto every segment and keep the closest hit.
    pub fn get_closest_point_on_rail_spline(&self, point: Vec3) -> Option<RailProjection> {
        if self.segment_count() == 0 {
            return self.single_node_projection(point);
        }
        self.best_projection(0..self.segment_count(), point)
    }

    /// Like [`Rail::get_closest_point_on_rail_spline`], but only segments within
    /// `window` of `segment_hint` are examined first. The search falls back to
    /// the whole rail when the best hit lies on the edge of that window, or is
    /// further from `point` than the widest node spacing.
    pub fn closest_point_near(
        &self,
        point: Vec3,
        segment_hint: usize,
        window: usize,
    ) -> Option<RailProjection> {
        let count = self.segment_count();
        if count == 0 {
            return self.single_node_projection(point);
        }
        let hint = segment_hint.min(count - 1);

        if self.looped {
            if 2 * window + 1 >= count {
                return self.get_closest_point_on_rail_spline(point);
            }
            let first = hint + count - window;
            let segments = (first..=first + 2 * window).map(|s| s % count);
            let best = self.best_projection(segments, point)?;
            let lower = first % count;
            let upper = (first + 2 * window) % count;
            if best.segment == lower
                || best.segment == upper
                || self.needs_global_search(&best)
            {
                return self.get_closest_point_on_rail_spline(point);
            }
            return Some(best);
        }

        let lower = hint.saturating_sub(window);
        let upper = (hint + window).min(count - 1);
        let best = self.best_projection(lower..=upper, point)?;
        let open_below = lower > 0 && best.segment == lower;
        let open_above = upper < count - 1 && best.segment == upper;
        if open_below || open_above || self.needs_global_search(&best) {
            return self.get_closest_point_on_rail_spline(point);
        }
        Some(best)
    }

    /// Position at distance `s` from node 0. Wraps on looped rails, clamps to
    /// the ends on open ones.
    pub fn position_at_arclength(&self, s: f32) -> Option<Vec3> {
        self.sample_at_arclength(s).map(|sample| sample.position)
    }

    pub fn sample_at_arclength(&self, s: f32) -> Option<RailSample> {
        let first = self.nodes.first()?;
        let count = self.segment_count();
        if count == 0 || !s.is_finite() {
            return Some(RailSample {
                position: first.position,
                direction: self.segment_direction(0),
            });
        }

        let s = if self.looped && self.total_length > 0.0 {
            s.rem_euclid(self.total_length)
        } else {
            s.clamp(0.0, self.total_length)
        };

        let segment = self
            .nodes
            .partition_point(|n| n.arclength <= s)
            .saturating_sub(1)
            .min(count - 1);
        let offset = s - self.nodes[segment].arclength;
        let position = self.point_on_segment(segment, offset)?;
        Some(RailSample {
            position,
            direction: self.segment_direction(segment),
        })
    }

    fn project_onto_segment(&self, segment: usize, point: Vec3) -> RailProjection {
        let start = &self.nodes[segment];
        let end = &self.nodes[self.segment_end(segment)];
        let ab = end.position - start.position;
        let length_squared = ab.length_squared();

        let u = if length_squared <= DEGENERATE_SEGMENT * DEGENERATE_SEGMENT {
            0.0
        } else {
            ((point - start.position).dot(ab) / length_squared).clamp(0.0, 1.0)
        };
        let position = start.position + ab * u;
        let offset = u * self.segment_length(segment);

        RailProjection {
            segment,
            offset,
            position,
            arclength: start.arclength + offset,
            distance_squared: position.distance_squared(point),
        }
    }

    fn best_projection(
        &self,
        segments: impl Iterator<Item = usize>,
        point: Vec3,
    ) -> Option<RailProjection> {
        segments
            .map(|s| self.project_onto_segment(s, point))
            .min_by(|a, b| a.distance_squared.total_cmp(&b.distance_squared))
    }

    fn single_node_projection(&self, point: Vec3) -> Option<RailProjection> {
        let node = self.nodes.first()?;
        Some(RailProjection {
            segment: 0,
            offset: 0.0,
            position: node.position,
            arclength: 0.0,
            distance_squared: node.position.distance_squared(point),
        })
    }
}
