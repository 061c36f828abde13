//! Persistent position on a rail.
//!
//! A [`NodeTraversalTracker`] remembers which segment it sits on and how far
//! along it, so per-frame updates only search the segments around the last
//! known location instead of the whole rail.

use glam::Vec3;
use std::sync::Arc;

use crate::rail::{Rail, RailProjection};

/// Segments examined on each side of the current one before falling back to a
/// full search.
pub const SEARCH_WINDOW: usize = 4;

#[derive(Debug, Clone)]
pub struct NodeTraversalTracker {
    rail: Arc<Rail>,
    index: usize,
    /// Distance from node `index` along segment `index`.
    offset: f32,
}

impl NodeTraversalTracker {
    /// Snap to the rail point nearest `start_point`. `None` if the rail has no nodes.
    pub fn new(rail: Arc<Rail>, start_point: Vec3) -> Option<Self> {
        let projection = rail.get_closest_point_on_rail_spline(start_point)?;
        let mut tracker = Self {
            rail,
            index: 0,
            offset: 0.0,
        };
        tracker.anchor(&projection);
        Some(tracker)
    }

    /// Anchor exactly on node `index`.
    pub fn at_node(rail: Arc<Rail>, index: usize) -> Option<Self> {
        if index >= rail.total_nodes() {
            return None;
        }
        let count = rail.segment_count();
        // the last node of an open rail is the far end of the last segment
        let (index, offset) = if count == 0 {
            (0, 0.0)
        } else if index >= count {
            (count - 1, rail.segment_length(count - 1))
        } else {
            (index, 0.0)
        };
        Some(Self {
            rail,
            index,
            offset,
        })
    }

    pub fn rail(&self) -> &Arc<Rail> {
        &self.rail
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Distance along the rail from node 0 to the tracked point.
    pub fn arclength(&self) -> f32 {
        self.rail
            .node(self.index)
            .map(|n| n.arclength + self.offset)
            .unwrap_or(0.0)
    }

    /// Hard snap to the rail point nearest `target`.
    pub fn update(&mut self, target: Vec3) {
        if let Some(projection) = self.rail.closest_point_near(target, self.index, SEARCH_WINDOW) {
            self.anchor(&projection);
        }
    }

    /// Move a fraction `factor` of the way toward the rail point nearest `target`.
    ///
    /// `factor` is clamped to `[0, 1]`: 0 leaves the tracker untouched and 1 is
    /// the same as [`NodeTraversalTracker::update`]. On looped rails the tracker
    /// moves the short way round.
    pub fn update_lerped(&mut self, target: Vec3, factor: f32) {
        let factor = if factor.is_nan() { 0.0 } else { factor.clamp(0.0, 1.0) };
        if factor == 0.0 {
            return;
        }
        let Some(projection) = self.rail.closest_point_near(target, self.index, SEARCH_WINDOW)
        else {
            return;
        };
        if factor == 1.0 {
            self.anchor(&projection);
            return;
        }

        let mut delta = projection.arclength - self.arclength();
        if self.rail.is_looped() {
            let total = self.rail.total_length();
            if delta > total * 0.5 {
                delta -= total;
            } else if delta < -total * 0.5 {
                delta += total;
            }
        }
        let (index, offset) = self.walk(delta * factor);
        self.index = index;
        self.offset = offset;
    }

    /// World position `signed_t` units along the rail from the tracked point:
    /// forward for positive values, backward for negative ones.
    pub fn get_world_position(&self, signed_t: f32) -> Vec3 {
        let (index, offset) = self.walk(signed_t);
        self.rail
            .point_on_segment(index, offset)
            .unwrap_or(Vec3::ZERO)
    }

    /// Project `point` onto the rail, searching near the tracked segment first.
    pub fn get_closest_point_on_rail_spline(&self, point: Vec3) -> Vec3 {
        self.rail
            .closest_point_near(point, self.index, SEARCH_WINDOW)
            .map(|p| p.position)
            .unwrap_or_else(|| self.get_world_position(0.0))
    }

    fn anchor(&mut self, projection: &RailProjection) {
        self.index = projection.segment;
        self.offset = projection.offset;
    }

    /// Resolve a signed distance from the tracked point to `(segment, offset)`
    /// by stepping segment to segment.
    fn walk(&self, distance: f32) -> (usize, f32) {
        let rail = &self.rail;
        let count = rail.segment_count();
        if count == 0 {
            return (0, 0.0);
        }
        if !distance.is_finite() {
            return (self.index, self.offset);
        }

        let looped = rail.is_looped();
        let mut index = self.index;
        let mut offset = self.offset + distance;

        if looped {
            let total = rail.total_length();
            if total <= 0.0 {
                return (index, 0.0);
            }
            // whole laps do not change the position
            offset %= total;
        }

        while offset > rail.segment_length(index) {
            if !looped && index == count - 1 {
                offset = rail.segment_length(index);
                break;
            }
            offset -= rail.segment_length(index);
            index = (index + 1) % count;
        }

        while offset < 0.0 {
            if !looped && index == 0 {
                offset = 0.0;
                break;
            }
            index = if index == 0 { count - 1 } else { index - 1 };
            offset += rail.segment_length(index);
        }

        (index, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn straight_rail() -> Arc<Rail> {
        Arc::new(Rail::new(
            [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(20.0, 0.0, 0.0),
                Vec3::new(30.0, 0.0, 0.0),
            ],
            false,
        ))
    }

    fn ring(nodes: usize, radius: f32) -> Arc<Rail> {
        Arc::new(Rail::new(
            (0..nodes).map(|i| {
                let a = i as f32 / nodes as f32 * std::f32::consts::TAU;
                Vec3::new(a.cos() * radius, 0.0, a.sin() * radius)
            }),
            true,
        ))
    }

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-3
    }

    #[test]
    fn test_world_position_from_node() {
        let tracker = NodeTraversalTracker::at_node(straight_rail(), 1).unwrap();
        assert!(close(tracker.get_world_position(5.0), Vec3::new(15.0, 0.0, 0.0)));
        assert!(close(tracker.get_world_position(-7.0), Vec3::new(3.0, 0.0, 0.0)));
        assert!(close(tracker.get_world_position(0.0), Vec3::new(10.0, 0.0, 0.0)));
    }

    #[test]
    fn test_world_position_clamps_on_open_rail() {
        let tracker = NodeTraversalTracker::at_node(straight_rail(), 1).unwrap();
        assert!(close(tracker.get_world_position(500.0), Vec3::new(30.0, 0.0, 0.0)));
        assert!(close(tracker.get_world_position(-100.0), Vec3::ZERO));
    }

    #[test]
    fn test_world_position_wraps_on_loop() {
        let rail = Arc::new(Rail::new(
            [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 10.0),
                Vec3::new(0.0, 0.0, 10.0),
            ],
            true,
        ));
        let tracker = NodeTraversalTracker::at_node(rail, 0).unwrap();
        assert!(close(tracker.get_world_position(-5.0), Vec3::new(0.0, 0.0, 5.0)));
        assert!(close(tracker.get_world_position(45.0), Vec3::new(5.0, 0.0, 0.0)));
        assert!(close(tracker.get_world_position(-125.0), Vec3::new(0.0, 0.0, 5.0)));
    }

    #[test]
    fn test_update_snaps_to_projection() {
        let mut tracker = NodeTraversalTracker::new(straight_rail(), Vec3::ZERO).unwrap();
        tracker.update(Vec3::new(22.5, 4.0, 1.0));
        assert!(close(tracker.get_world_position(0.0), Vec3::new(22.5, 0.0, 0.0)));
        assert!((tracker.arclength() - 22.5).abs() < 1e-4);
    }

    #[test]
    fn test_update_lerped_endpoints() {
        let rail = straight_rail();
        let base = NodeTraversalTracker::new(rail, Vec3::new(2.0, 0.0, 0.0)).unwrap();
        let target = Vec3::new(26.0, 1.0, 0.0);

        let mut untouched = base.clone();
        untouched.update_lerped(target, 0.0);
        assert_eq!(untouched.index(), base.index());
        assert_eq!(untouched.offset(), base.offset());

        let mut full = base.clone();
        full.update_lerped(target, 1.0);
        let mut snapped = base.clone();
        snapped.update(target);
        assert_eq!(full.index(), snapped.index());
        assert_eq!(full.offset(), snapped.offset());

        let mut half = base.clone();
        half.update_lerped(target, 0.5);
        assert!((half.arclength() - 14.0).abs() < 1e-4);
    }

    #[test]
    fn test_update_lerped_takes_short_way_round() {
        let rail = ring(40, 50.0);
        let total = rail.total_length();
        let start = rail.position_at_arclength(total - 5.0).unwrap();
        let mut tracker = NodeTraversalTracker::new(rail.clone(), start).unwrap();
        let target = rail.position_at_arclength(5.0).unwrap();
        tracker.update_lerped(target, 0.5);
        // crossed the seam forward instead of running back round the ring
        assert!(tracker.arclength() < 1.0 || tracker.arclength() > total - 1.0);
    }

    #[test]
    fn test_update_jumps_across_hairpin() {
        let rail = Arc::new(Rail::new(
            (0..=10)
                .map(|i| Vec3::new(i as f32 * 10.0, 0.0, 0.0))
                .chain([Vec3::new(100.0, 0.0, 10.0), Vec3::new(100.0, 0.0, 20.0)])
                .chain((0..=10).rev().map(|i| Vec3::new(i as f32 * 10.0, 0.0, 30.0))),
            false,
        ));
        let mut tracker = NodeTraversalTracker::new(rail.clone(), Vec3::ZERO).unwrap();
        let target = Vec3::new(5.0, 0.0, 30.0);
        tracker.update(target);

        let landed = tracker.get_world_position(0.0);
        assert!(landed.distance(target) <= rail.max_node_spacing());
        assert!(close(landed, target));
        // on the return leg, near the far end of the rail
        assert!(tracker.arclength() > rail.total_length() - 10.0);
    }

    #[test]
    fn test_closest_point_anchored_locally() {
        let tracker = NodeTraversalTracker::at_node(straight_rail(), 2).unwrap();
        let p = tracker.get_closest_point_on_rail_spline(Vec3::new(4.0, 9.0, 0.0));
        assert!(close(p, Vec3::new(4.0, 0.0, 0.0)));
    }

    #[test]
    fn test_inactive_rail() {
        let rail = Arc::new(Rail::new(Vec::new(), false));
        assert!(NodeTraversalTracker::new(rail.clone(), Vec3::ZERO).is_none());
        assert!(NodeTraversalTracker::at_node(rail, 0).is_none());
    }

    proptest! {
        #[test]
        fn prop_update_lands_within_node_spacing(
            x in -20.0f32..320.0,
            y in -0.5f32..0.5,
            z in -0.5f32..0.5,
        ) {
            let rail = Arc::new(Rail::new(
                (0..31).map(|i| Vec3::new(i as f32 * 10.0, (i % 3) as f32 * 0.25, 0.0)),
                false,
            ));
            let mut tracker = NodeTraversalTracker::new(rail.clone(), Vec3::ZERO).unwrap();
            let p = Vec3::new(x.clamp(0.0, 300.0), y, z);
            tracker.update(p);
            prop_assert!(tracker.get_world_position(0.0).distance(p) <= rail.max_node_spacing());
        }

        #[test]
        fn prop_world_position_round_trips(t in -150.0f32..150.0, start in 0usize..40) {
            let rail = ring(40, 50.0);
            let tracker = NodeTraversalTracker::at_node(rail, start).unwrap();
            let p = tracker.get_world_position(t);
            let back = tracker.get_closest_point_on_rail_spline(p);
            prop_assert!(p.distance(back) < 1e-3);
        }
    }
}
