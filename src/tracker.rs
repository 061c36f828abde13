//! Generic per-frame rail tracking loop.
//!
//! [`RailObjectTracker`] owns a transform, a [`NodeTraversalTracker`] and a
//! [`TrackerHooks`] strategy. Every frame it
//! 1. asks the hooks for a focus point (keeping the last one if there is none),
//! 2. advances its rail reference toward that focus,
//! 3. moves toward the hooks' lag point plus offset,
//! 4. turns toward the hooks' look target,
//! 5. notifies any registered [`FrameObserver`]s.
//!
//! It must run after all game-logic updates for the frame have committed actor
//! positions, otherwise it frames last frame's state.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::context::{average_eligible_position, RaceContext};
use crate::math::{look_rotation, SmoothingMode, Transform};
use crate::rail::Rail;
use crate::traversal::NodeTraversalTracker;

/// Recoverable conditions hit while updating a tracker. None of them stop the
/// frame loop; they are reported alongside the frame result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingFault {
    #[error("rail is unset or has no nodes")]
    InactiveRail,
    #[error("no focus point this frame, keeping the previous one")]
    NoFocusPoint,
    #[error("leader and trailing actor coincide or hazard distance is zero")]
    DegenerateRaceSpread,
    #[error("no trailing actor to look at, using the look-ahead point")]
    MissingLookTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameOutcome {
    Updated,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub outcome: FrameOutcome,
    pub transform: Transform,
    pub look_target: Option<Vec3>,
    pub faults: Vec<TrackingFault>,
}

impl FrameReport {
    fn skipped(transform: Transform) -> Self {
        Self {
            outcome: FrameOutcome::Skipped,
            transform,
            look_target: None,
            faults: Vec::new(),
        }
    }

    pub fn note(&mut self, fault: TrackingFault) {
        if !self.faults.contains(&fault) {
            self.faults.push(fault);
        }
    }

    pub fn has(&self, fault: TrackingFault) -> bool {
        self.faults.contains(&fault)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// Rail distance the object trails behind its focus point.
    pub follow_offset_t: f32,
    /// Rail distance ahead of the focus point used for look targets.
    pub look_forward_offset_t: f32,
    pub move_lerp_speed: f32,
    pub look_lerp_speed: f32,
    pub smoothing: SmoothingMode,
    /// Hard-snap the rail reference to the focus every frame instead of easing it.
    pub force_snap: bool,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            follow_offset_t: 100.0,
            look_forward_offset_t: 4.0,
            move_lerp_speed: 4.0,
            look_lerp_speed: 3.5,
            smoothing: SmoothingMode::FrameLinear,
            force_snap: true,
        }
    }
}

/// Read-only tracker state handed to the hooks, plus the report being built.
pub struct TrackerFrame<'a> {
    pub traversal: &'a NodeTraversalTracker,
    pub transform: &'a Transform,
    pub settings: &'a TrackerSettings,
    pub base_follow_point: Vec3,
    pub delta_seconds: f32,
    report: &'a mut FrameReport,
}

impl TrackerFrame<'_> {
    pub fn rail(&self) -> &Rail {
        self.traversal.rail()
    }

    pub fn note(&mut self, fault: TrackingFault) {
        self.report.note(fault);
    }
}

/// The four points where a concrete tracker specialises the loop.
pub trait TrackerHooks {
    /// Where on the rail the object should follow. `None` keeps last frame's point.
    fn determine_base_focus_point(&mut self, ctx: &dyn RaceContext) -> Option<Vec3>;

    /// Position goal before [`TrackerHooks::final_position_offset`] is added.
    fn lagging_point(&mut self, frame: &mut TrackerFrame<'_>, _ctx: &dyn RaceContext) -> Vec3 {
        default_lagging_point(frame)
    }

    fn final_position_offset(
        &mut self,
        _frame: &mut TrackerFrame<'_>,
        _ctx: &dyn RaceContext,
    ) -> Vec3 {
        Vec3::ZERO
    }

    fn where_to_look(&mut self, frame: &mut TrackerFrame<'_>, ctx: &dyn RaceContext) -> Vec3 {
        default_where_to_look(frame, ctx)
    }
}

/// Rail position `follow_offset_t` behind the tracked rail point.
pub fn default_lagging_point(frame: &TrackerFrame<'_>) -> Vec3 {
    frame
        .traversal
        .get_world_position(-frame.settings.follow_offset_t)
}

/// Midpoint of the leader and the trailing actor, projected onto the rail near
/// the tracked segment. Without a leader, a point just ahead of the lag position.
pub fn default_where_to_look(frame: &TrackerFrame<'_>, ctx: &dyn RaceContext) -> Vec3 {
    match ctx.leading_actor() {
        Some(leader) => {
            let trailing = ctx.trailing_actor().unwrap_or(leader);
            let midpoint = (leader.position + trailing.position) * 0.5;
            frame.traversal.get_closest_point_on_rail_spline(midpoint)
        }
        None => frame
            .traversal
            .get_world_position(-frame.settings.follow_offset_t + 1.0),
    }
}

/// Follows the average position of the eligible actors with the default lag,
/// offset and look behaviour.
#[derive(Debug, Clone, Copy, Default)]
pub struct FocusAverageHooks;

impl TrackerHooks for FocusAverageHooks {
    fn determine_base_focus_point(&mut self, ctx: &dyn RaceContext) -> Option<Vec3> {
        average_eligible_position(ctx)
    }
}

/// Told once per frame when the tracker has finished moving.
pub trait FrameObserver {
    fn on_position_integrated(&mut self, transform: &Transform);
}

impl<F: FnMut(&Transform)> FrameObserver for F {
    fn on_position_integrated(&mut self, transform: &Transform) {
        self(transform)
    }
}

pub struct RailObjectTracker<H> {
    rail: Option<Arc<Rail>>,
    traversal: Option<NodeTraversalTracker>,
    base_follow_point: Vec3,
    previous_position: Vec3,
    transform: Transform,
    settings: TrackerSettings,
    hooks: H,
    observers: Vec<Box<dyn FrameObserver>>,
}

impl<H: TrackerHooks> RailObjectTracker<H> {
    pub fn new(rail: Option<Arc<Rail>>, settings: TrackerSettings, hooks: H) -> Self {
        Self {
            rail,
            traversal: None,
            base_follow_point: Vec3::ZERO,
            previous_position: Vec3::ZERO,
            transform: Transform::default(),
            settings,
            hooks,
            observers: Vec::new(),
        }
    }

    pub fn rail(&self) -> Option<&Arc<Rail>> {
        self.rail.as_ref()
    }

    /// Swap the rail. The rail reference is re-seeded on the next update.
    pub fn set_rail(&mut self, rail: Option<Arc<Rail>>) {
        self.rail = rail;
        self.traversal = None;
    }

    pub fn traversal(&self) -> Option<&NodeTraversalTracker> {
        self.traversal.as_ref()
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    pub fn base_follow_point(&self) -> Vec3 {
        self.base_follow_point
    }

    pub fn previous_position(&self) -> Vec3 {
        self.previous_position
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut TrackerSettings {
        &mut self.settings
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    pub fn add_observer(&mut self, observer: impl FrameObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn active_rail(&self) -> Option<Arc<Rail>> {
        self.rail.as_ref().filter(|r| r.is_active()).cloned()
    }

    /// Refresh the focus point and place the object at its start position.
    pub fn on_round_start(
        &mut self,
        ctx: &dyn RaceContext,
        start_point: Vec3,
    ) -> Result<(), TrackingFault> {
        if let Some(focus) = self.hooks.determine_base_focus_point(ctx) {
            self.base_follow_point = focus;
        }
        self.set_start_position(ctx, start_point)
    }

    /// Re-seed the rail reference at `start_point`, jump to the lag position
    /// behind it and face the look target immediately.
    pub fn set_start_position(
        &mut self,
        ctx: &dyn RaceContext,
        start_point: Vec3,
    ) -> Result<(), TrackingFault> {
        let rail = self.active_rail().ok_or(TrackingFault::InactiveRail)?;
        let traversal =
            NodeTraversalTracker::new(rail, start_point).ok_or(TrackingFault::InactiveRail)?;

        self.transform.position = traversal.get_world_position(-self.settings.follow_offset_t);
        let mut report = FrameReport::skipped(self.transform);
        let look = {
            let mut frame = TrackerFrame {
                traversal: &traversal,
                transform: &self.transform,
                settings: &self.settings,
                base_follow_point: self.base_follow_point,
                delta_seconds: 0.0,
                report: &mut report,
            };
            self.hooks.where_to_look(&mut frame, ctx)
        };
        if let Some(rotation) = look_rotation(look - self.transform.position, Vec3::Y) {
            self.transform.rotation = rotation;
        }

        self.traversal = Some(traversal);
        self.previous_position = self.transform.position;
        debug!(
            "Tracker placed at {:?}, looking at {:?}",
            self.transform.position, look
        );
        Ok(())
    }

    /// Run one frame: refresh the focus point, then move and rotate.
    pub fn late_update(&mut self, ctx: &dyn RaceContext, delta_seconds: f32) -> FrameReport {
        if self.active_rail().is_none() {
            trace!("Rail inactive, skipping tracker update");
            let mut report = FrameReport::skipped(self.transform);
            report.note(TrackingFault::InactiveRail);
            return report;
        }

        let mut report = FrameReport::skipped(self.transform);
        match self.hooks.determine_base_focus_point(ctx) {
            Some(focus) => self.base_follow_point = focus,
            None => {
                debug!(
                    "No focus point, holding previous {:?}",
                    self.base_follow_point
                );
                report.note(TrackingFault::NoFocusPoint);
            }
        }

        let force_snap = self.settings.force_snap;
        self.integrate(self.base_follow_point, force_snap, ctx, delta_seconds, report)
    }

    /// Move the object with respect to `focus_point` and the rail.
    ///
    /// With `force_snap` the rail reference jumps straight to the focus point;
    /// otherwise it eases toward it at `move_lerp_speed`.
    pub fn update_position(
        &mut self,
        focus_point: Vec3,
        force_snap: bool,
        ctx: &dyn RaceContext,
        delta_seconds: f32,
    ) -> FrameReport {
        let report = FrameReport::skipped(self.transform);
        self.integrate(focus_point, force_snap, ctx, delta_seconds, report)
    }

    fn integrate(
        &mut self,
        focus_point: Vec3,
        force_snap: bool,
        ctx: &dyn RaceContext,
        delta_seconds: f32,
        mut report: FrameReport,
    ) -> FrameReport {
        let Some(rail) = self.active_rail() else {
            report.note(TrackingFault::InactiveRail);
            return report;
        };

        let stale = self
            .traversal
            .as_ref()
            .map_or(true, |t| !Arc::ptr_eq(t.rail(), &rail));
        if stale {
            self.traversal = NodeTraversalTracker::new(rail, focus_point);
        }
        let Some(traversal) = self.traversal.as_mut() else {
            report.note(TrackingFault::InactiveRail);
            return report;
        };

        let smoothing = self.settings.smoothing;
        let move_factor = smoothing.factor(self.settings.move_lerp_speed, delta_seconds);
        let look_factor = smoothing.factor(self.settings.look_lerp_speed, delta_seconds);

        if force_snap {
            traversal.update(focus_point);
        } else {
            traversal.update_lerped(focus_point, move_factor);
        }
        let traversal = &*traversal;

        let goal = {
            let mut frame = TrackerFrame {
                traversal,
                transform: &self.transform,
                settings: &self.settings,
                base_follow_point: focus_point,
                delta_seconds,
                report: &mut report,
            };
            let lag = self.hooks.lagging_point(&mut frame, ctx);
            lag + self.hooks.final_position_offset(&mut frame, ctx)
        };

        self.previous_position = self.transform.position;
        if goal.is_finite() {
            self.transform.position = self.transform.position.lerp(goal, move_factor);
        } else {
            warn!("Non-finite tracker goal {:?}, holding position", goal);
        }

        let look = {
            let mut frame = TrackerFrame {
                traversal,
                transform: &self.transform,
                settings: &self.settings,
                base_follow_point: focus_point,
                delta_seconds,
                report: &mut report,
            };
            self.hooks.where_to_look(&mut frame, ctx)
        };

        let to_look = look - self.transform.position;
        if to_look != Vec3::ZERO && to_look.is_finite() {
            if let Some(target) = look_rotation(to_look, Vec3::Y) {
                self.transform.rotation = slerp(self.transform.rotation, target, look_factor);
            }
        }

        for observer in &mut self.observers {
            observer.on_position_integrated(&self.transform);
        }

        report.outcome = FrameOutcome::Updated;
        report.transform = self.transform;
        report.look_target = Some(look);
        report
    }
}

fn slerp(from: Quat, to: Quat, t: f32) -> Quat {
    from.slerp(to, t).normalize()
}
