//! Race-aware pursuit camera built on [`RailObjectTracker`].
//!
//! The camera reacts to how spread out the field is: the further the trailing
//! actor has fallen back toward the chasing hazard, the more it pulls back,
//! rises and looks ahead. Each of those responses is an independent [`Curve`]
//! keyed by the race-spread fraction from
//! [`CameraHooks::last_player_wall_percentage`].

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::RigConfig;
use crate::context::{average_eligible_position, ActorId, GamePhase, RaceContext, TrackedActor};
use crate::curve::Curve;
use crate::math::{clerp, clerp_vec3};
use crate::rail::Rail;
use crate::tracker::{
    FrameReport, RailObjectTracker, TrackerFrame, TrackerHooks, TrackerSettings, TrackingFault,
};

/// Sway profile used when the camera follows a single fixed target.
pub const SINGLE_SUBJECT_MAX_X_SWAY: f32 = 2.0;
pub const SINGLE_SUBJECT_SWAY_SENSITIVITY: f32 = 0.8;
pub const SINGLE_SUBJECT_EXTRA_LOOK_AHEAD: f32 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Extra trailing distance added at full race spread.
    pub add_follow_offset_t: f32,
    /// Extra look-ahead distance added at full race spread.
    pub add_look_forward_offset_t: f32,
    pub base_camera_height: f32,
    /// Extra height added at full race spread.
    pub max_camera_height: f32,
    pub camera_sway: bool,
    pub max_x_sway: f32,
    pub sway_sensitivity: f32,
    /// Rail distance added to both probe points of the sway check.
    pub extra_look_ahead: f32,
    /// Lateral deviation below which sway relaxes back to zero.
    pub sway_deadzone: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            add_follow_offset_t: 15.0,
            add_look_forward_offset_t: 20.0,
            base_camera_height: 5.0,
            max_camera_height: 25.0,
            camera_sway: true,
            max_x_sway: 25.0,
            sway_sensitivity: 2.0,
            extra_look_ahead: 45.0,
            sway_deadzone: 2.0,
        }
    }
}

/// Response curves, all keyed by race-spread fraction.
///
/// t = 0: the field is bunched up near the leader; t = 1: the trailing actor
/// is at the hazard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraCurves {
    pub follow_offset: Curve,
    pub height_offset: Curve,
    pub look_ahead_offset: Curve,
}

#[derive(Debug, Clone)]
pub struct CameraHooks {
    target: Option<ActorId>,
    settings: CameraSettings,
    curves: CameraCurves,
    current_sway: f32,
}

impl CameraHooks {
    pub fn new(settings: CameraSettings, curves: CameraCurves, target: Option<ActorId>) -> Self {
        Self {
            target,
            settings,
            curves,
            current_sway: 0.0,
        }
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    pub fn curves(&self) -> &CameraCurves {
        &self.curves
    }

    pub fn target(&self) -> Option<ActorId> {
        self.target
    }

    pub fn current_sway(&self) -> f32 {
        self.current_sway
    }

    fn furthest<'a>(&self, ctx: &'a dyn RaceContext) -> Option<&'a TrackedActor> {
        match self.target {
            Some(id) => ctx.actor(id),
            None => ctx.leading_actor(),
        }
    }

    fn losing<'a>(&self, ctx: &'a dyn RaceContext) -> Option<&'a TrackedActor> {
        match self.target {
            Some(id) => ctx.actor(id),
            None => ctx.trailing_actor(),
        }
    }

    fn focus(&self, ctx: &dyn RaceContext) -> Option<Vec3> {
        match self.target {
            Some(id) => ctx.actor(id).map(|a| a.position),
            None => average_eligible_position(ctx),
        }
    }

    /// How far the trailing actor has dropped back toward the chasing hazard:
    /// `dist(leader, last) / dist(leader, hazard)`.
    ///
    /// 0 when there is no hazard, when leader and last are the same actor, or
    /// when either distance is zero. May exceed 1 once the last actor is
    /// further from the leader than the hazard is.
    pub fn last_player_wall_percentage(&self, ctx: &dyn RaceContext) -> f32 {
        self.race_spread(ctx).0
    }

    fn race_spread(&self, ctx: &dyn RaceContext) -> (f32, Option<TrackingFault>) {
        let Some(hazard) = ctx.chasing_hazard_position() else {
            return (0.0, None);
        };
        let (Some(first), Some(last)) = (self.furthest(ctx), self.losing(ctx)) else {
            return (0.0, None);
        };
        if first.id == last.id {
            return (0.0, Some(TrackingFault::DegenerateRaceSpread));
        }

        let first_to_wall = first.position.distance(hazard);
        let first_to_last = first.position.distance(last.position);
        if first_to_last == 0.0 || first_to_wall == 0.0 {
            return (0.0, Some(TrackingFault::DegenerateRaceSpread));
        }

        let spread = first_to_last / first_to_wall;
        if spread.is_finite() {
            (spread, None)
        } else {
            (0.0, Some(TrackingFault::DegenerateRaceSpread))
        }
    }

    fn noted_spread(&self, frame: &mut TrackerFrame<'_>, ctx: &dyn RaceContext) -> f32 {
        let (spread, fault) = self.race_spread(ctx);
        if let Some(fault) = fault {
            frame.note(fault);
        }
        spread
    }

    /// Signed rail offset of the camera position, negative = behind the focus.
    pub fn current_offset_t(&self, tracker: &TrackerSettings, ctx: &dyn RaceContext) -> f32 {
        self.offset_t_for(tracker, self.last_player_wall_percentage(ctx))
    }

    /// Signed rail offset of the look-ahead point.
    pub fn current_look_offset_t(&self, tracker: &TrackerSettings, ctx: &dyn RaceContext) -> f32 {
        self.look_offset_t_for(tracker, self.last_player_wall_percentage(ctx))
    }

    fn offset_t_for(&self, tracker: &TrackerSettings, spread: f32) -> f32 {
        clerp(
            -tracker.follow_offset_t,
            -tracker.follow_offset_t - self.settings.add_follow_offset_t,
            &self.curves.follow_offset,
            spread,
        )
    }

    fn look_offset_t_for(&self, tracker: &TrackerSettings, spread: f32) -> f32 {
        clerp(
            tracker.look_forward_offset_t,
            tracker.look_forward_offset_t + self.settings.add_look_forward_offset_t,
            &self.curves.look_ahead_offset,
            spread,
        )
    }

    fn height_for(&self, spread: f32) -> f32 {
        clerp(
            self.settings.base_camera_height,
            self.settings.base_camera_height + self.settings.max_camera_height,
            &self.curves.height_offset,
            spread,
        )
    }

    /// Ease `current_sway` toward its goal for this frame and return it.
    fn step_sway(&mut self, frame: &TrackerFrame<'_>, ctx: &dyn RaceContext, spread: f32) -> f32 {
        let traversal = frame.traversal;
        let world_delta = match self.target.and_then(|id| ctx.actor(id)) {
            Some(target) => {
                traversal.get_closest_point_on_rail_spline(target.position)
                    - traversal.get_world_position(0.0)
            }
            None => {
                let extra = self.settings.extra_look_ahead;
                let ahead = self.look_offset_t_for(frame.settings, spread) + extra;
                let behind = self.offset_t_for(frame.settings, spread) + extra;
                traversal.get_world_position(ahead) - traversal.get_world_position(behind)
            }
        };
        let lateral = frame.transform.inverse_transform_direction(world_delta).x;

        let max = self.settings.max_x_sway;
        let rate = self.settings.sway_sensitivity * frame.delta_seconds;
        if lateral.abs() > self.settings.sway_deadzone {
            let goal = if lateral > 0.0 { -max } else { max };
            self.current_sway = clerp(self.current_sway, goal, &self.curves.follow_offset, rate)
                .clamp(-max, max);
        } else {
            self.current_sway = clerp(self.current_sway, 0.0, &self.curves.follow_offset, rate);
        }
        self.current_sway
    }

    fn reset_for_round(&mut self) {
        self.current_sway = 0.0;
        if self.target.is_some() {
            self.settings.max_x_sway = SINGLE_SUBJECT_MAX_X_SWAY;
            self.settings.sway_sensitivity = SINGLE_SUBJECT_SWAY_SENSITIVITY;
            self.settings.extra_look_ahead = SINGLE_SUBJECT_EXTRA_LOOK_AHEAD;
        }
    }
}

impl TrackerHooks for CameraHooks {
    fn determine_base_focus_point(&mut self, ctx: &dyn RaceContext) -> Option<Vec3> {
        self.focus(ctx)
    }

    fn lagging_point(&mut self, frame: &mut TrackerFrame<'_>, ctx: &dyn RaceContext) -> Vec3 {
        let spread = self.noted_spread(frame, ctx);
        let offset_t = self.offset_t_for(frame.settings, spread);
        frame.traversal.get_world_position(offset_t)
    }

    fn final_position_offset(
        &mut self,
        frame: &mut TrackerFrame<'_>,
        ctx: &dyn RaceContext,
    ) -> Vec3 {
        let spread = self.noted_spread(frame, ctx);
        let mut offset = Vec3::Y * self.height_for(spread);

        if self.settings.camera_sway && ctx.game_phase() == GamePhase::Round {
            let sway = self.step_sway(frame, ctx, spread);
            offset += frame.transform.right() * sway;
        }
        offset
    }

    fn where_to_look(&mut self, frame: &mut TrackerFrame<'_>, ctx: &dyn RaceContext) -> Vec3 {
        let spread = self.noted_spread(frame, ctx);
        let traversal = frame.traversal;
        let look_t = self.look_offset_t_for(frame.settings, spread);
        let look_ahead =
            traversal.get_closest_point_on_rail_spline(traversal.get_world_position(look_t));

        let Some(focus) = self.focus(ctx) else {
            return traversal.get_world_position(frame.settings.look_forward_offset_t);
        };
        match self.losing(ctx) {
            Some(last) => clerp_vec3(
                look_ahead,
                (focus + last.position) * 0.5,
                &self.curves.height_offset,
                spread,
            ),
            None => {
                debug!("No trailing actor, looking at the rail ahead");
                frame.note(TrackingFault::MissingLookTarget);
                look_ahead
            }
        }
    }
}

/// Pursuit camera: a [`RailObjectTracker`] driven by [`CameraHooks`].
pub struct RailFollowingCamera {
    tracker: RailObjectTracker<CameraHooks>,
}

impl RailFollowingCamera {
    pub fn new(
        rail: Option<Arc<Rail>>,
        tracker_settings: TrackerSettings,
        camera_settings: CameraSettings,
        curves: CameraCurves,
        target: Option<ActorId>,
    ) -> Self {
        let hooks = CameraHooks::new(camera_settings, curves, target);
        Self {
            tracker: RailObjectTracker::new(rail, tracker_settings, hooks),
        }
    }

    pub fn from_config(config: &RigConfig, rail: Option<Arc<Rail>>, target: Option<ActorId>) -> Self {
        Self::new(
            rail,
            config.tracker.clone(),
            config.camera.clone(),
            config.curves.clone(),
            target,
        )
    }

    pub fn tracker(&self) -> &RailObjectTracker<CameraHooks> {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut RailObjectTracker<CameraHooks> {
        &mut self.tracker
    }

    pub fn hooks(&self) -> &CameraHooks {
        self.tracker.hooks()
    }

    /// Reset sway, apply the single-subject profile if a target is set, then
    /// place the camera behind `start_point`.
    pub fn on_round_start(
        &mut self,
        ctx: &dyn RaceContext,
        start_point: Vec3,
    ) -> Result<(), TrackingFault> {
        self.tracker.hooks_mut().reset_for_round();
        self.tracker.on_round_start(ctx, start_point)?;
        info!(
            "Camera ready at {:?} (single subject: {})",
            self.tracker.transform().position,
            self.hooks().target.is_some()
        );
        Ok(())
    }

    pub fn set_start_position(
        &mut self,
        ctx: &dyn RaceContext,
        start_point: Vec3,
    ) -> Result<(), TrackingFault> {
        self.tracker.set_start_position(ctx, start_point)
    }

    pub fn late_update(&mut self, ctx: &dyn RaceContext, delta_seconds: f32) -> FrameReport {
        self.tracker.late_update(ctx, delta_seconds)
    }

    pub fn update_position(
        &mut self,
        focus_point: Vec3,
        force_snap: bool,
        ctx: &dyn RaceContext,
        delta_seconds: f32,
    ) -> FrameReport {
        self.tracker
            .update_position(focus_point, force_snap, ctx, delta_seconds)
    }

    pub fn last_player_wall_percentage(&self, ctx: &dyn RaceContext) -> f32 {
        self.hooks().last_player_wall_percentage(ctx)
    }

    pub fn camera_sway(&self) -> bool {
        self.hooks().settings.camera_sway
    }

    pub fn set_camera_sway(&mut self, enabled: bool) {
        self.tracker.hooks_mut().settings.camera_sway = enabled;
    }

    pub fn toggle_camera_sway(&mut self) -> bool {
        let enabled = !self.camera_sway();
        self.set_camera_sway(enabled);
        debug!("Camera sway {}", if enabled { "on" } else { "off" });
        enabled
    }
}
