use glam::Vec3;
use proptest::prelude::*;
use std::sync::Arc;

use railcam::camera::{CameraCurves, CameraSettings, RailFollowingCamera};
use railcam::context::{GamePhase, RaceContext, RaceSnapshot, TrackedActor};
use railcam::rail::Rail;
use railcam::tracker::{FrameOutcome, TrackerSettings, TrackingFault};
use railcam::traversal::NodeTraversalTracker;

const DT: f32 = 1.0 / 60.0;

fn straight_rail(length: f32, spacing: f32) -> Arc<Rail> {
    let count = (length / spacing) as usize;
    Arc::new(Rail::new(
        (0..=count).map(|i| Vec3::new(0.0, 0.0, i as f32 * spacing)),
        false,
    ))
}

fn actor(name: &str, position: Vec3, progress: f32) -> TrackedActor {
    TrackedActor::new(name, position, progress)
}

fn camera(rail: Arc<Rail>, camera_settings: CameraSettings) -> RailFollowingCamera {
    RailFollowingCamera::new(
        Some(rail),
        TrackerSettings::default(),
        camera_settings,
        CameraCurves::default(),
        None,
    )
}

#[test]
fn test_world_position_from_anchored_node() {
    let rail = Arc::new(Rail::new(
        [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(20.0, 0.0, 0.0),
            Vec3::new(30.0, 0.0, 0.0),
        ],
        false,
    ));
    let traversal = NodeTraversalTracker::at_node(rail, 1).unwrap();
    assert_eq!(traversal.get_world_position(0.0), Vec3::new(10.0, 0.0, 0.0));
    assert_eq!(traversal.get_world_position(5.0), Vec3::new(15.0, 0.0, 0.0));
    assert_eq!(traversal.get_world_position(-5.0), Vec3::new(5.0, 0.0, 0.0));
}

#[test]
fn test_race_spread_drives_follow_offset() {
    let rail = straight_rail(400.0, 10.0);
    let ctx = RaceSnapshot::new(
        vec![
            actor("Leader", Vec3::new(0.0, 0.0, 0.0), 0.9),
            actor("Last", Vec3::new(50.0, 0.0, 0.0), 0.2),
        ],
        Some(Vec3::new(100.0, 0.0, 0.0)),
        GamePhase::Round,
    );

    let cam = camera(rail, CameraSettings::default());
    assert!((cam.last_player_wall_percentage(&ctx) - 0.5).abs() < 1e-6);

    let tracker_settings = TrackerSettings::default();
    let offset = cam.hooks().current_offset_t(&tracker_settings, &ctx);
    // halfway between -100 and -115
    assert!((offset + 107.5).abs() < 1e-4);
    let look = cam.hooks().current_look_offset_t(&tracker_settings, &ctx);
    assert!((look - 14.0).abs() < 1e-4);
}

#[test]
fn test_sway_disabled_never_moves_sideways() {
    let rail = straight_rail(400.0, 10.0);
    let settings = CameraSettings {
        camera_sway: false,
        ..CameraSettings::default()
    };
    let mut cam = camera(rail, settings);

    let frame_ctx = |i: usize| {
        // the field swings wildly from side to side
        let side = if i % 2 == 0 { 40.0 } else { -40.0 };
        RaceSnapshot::new(
            vec![
                actor("A", Vec3::new(side, 0.0, 200.0 + i as f32 * 0.1), 0.6),
                actor("B", Vec3::new(-side * 0.5, 0.0, 180.0), 0.4),
            ],
            Some(Vec3::new(0.0, 0.0, 120.0)),
            GamePhase::Round,
        )
    };

    cam.on_round_start(&frame_ctx(0), Vec3::new(0.0, 0.0, 200.0))
        .unwrap();
    for i in 0..240 {
        let report = cam.late_update(&frame_ctx(i), DT);
        assert_eq!(report.outcome, FrameOutcome::Updated);
        assert_eq!(report.transform.position.x, 0.0);
        assert_eq!(cam.hooks().current_sway(), 0.0);
    }
}

#[test]
fn test_sway_leans_into_corner() {
    // north for 200 units, then east
    let rail = Arc::new(Rail::new(
        (0..=20)
            .map(|i| Vec3::new(0.0, 0.0, i as f32 * 10.0))
            .chain((1..=20).map(|i| Vec3::new(i as f32 * 10.0, 0.0, 200.0))),
        false,
    ));
    let ctx = RaceSnapshot::new(
        vec![actor("Solo", Vec3::new(50.0, 0.0, 200.0), 0.6)],
        None,
        GamePhase::Round,
    );

    let mut swaying = camera(rail.clone(), CameraSettings::default());
    swaying.on_round_start(&ctx, Vec3::new(50.0, 0.0, 200.0)).unwrap();
    for _ in 0..30 {
        swaying.late_update(&ctx, DT);
    }
    // the rail ahead bends right, so the camera swings left
    assert!(swaying.hooks().current_sway() < -0.5);

    let mut steady = camera(
        rail,
        CameraSettings {
            camera_sway: false,
            ..CameraSettings::default()
        },
    );
    steady.on_round_start(&ctx, Vec3::new(50.0, 0.0, 200.0)).unwrap();
    for _ in 0..30 {
        steady.late_update(&ctx, DT);
    }
    assert_eq!(steady.hooks().current_sway(), 0.0);
}

#[test]
fn test_no_eligible_actors_keeps_previous_focus() {
    let rail = straight_rail(400.0, 10.0);
    let mut cam = camera(rail, CameraSettings::default());

    let racing = RaceSnapshot::new(
        vec![actor("Solo", Vec3::new(0.0, 0.0, 150.0), 0.4)],
        None,
        GamePhase::Round,
    );
    cam.on_round_start(&racing, Vec3::new(0.0, 0.0, 150.0)).unwrap();
    cam.late_update(&racing, DT);
    let before = cam.tracker().base_follow_point();
    assert_eq!(before, Vec3::new(0.0, 0.0, 150.0));

    let mut gone = racing.clone();
    gone.actors[0].alive = false;
    let report = cam.late_update(&gone, DT);
    assert!(report.has(TrackingFault::NoFocusPoint));
    assert_eq!(cam.tracker().base_follow_point(), before);
    // nobody to frame, so the camera looks just ahead on the rail
    let look = report.look_target.unwrap();
    assert!((look - Vec3::new(0.0, 0.0, 154.0)).length() < 1e-3);
    assert!(report.transform.position.is_finite());
}

#[test]
fn test_lone_actor_with_hazard_is_degenerate_spread() {
    let rail = straight_rail(400.0, 10.0);
    let mut cam = camera(rail, CameraSettings::default());
    let ctx = RaceSnapshot::new(
        vec![actor("Solo", Vec3::new(0.0, 0.0, 150.0), 0.4)],
        Some(Vec3::new(0.0, 0.0, 80.0)),
        GamePhase::Round,
    );
    cam.on_round_start(&ctx, Vec3::new(0.0, 0.0, 150.0)).unwrap();

    let report = cam.late_update(&ctx, DT);
    assert_eq!(report.outcome, FrameOutcome::Updated);
    assert!(report.has(TrackingFault::DegenerateRaceSpread));
    assert_eq!(cam.last_player_wall_percentage(&ctx), 0.0);
    assert!(report.transform.position.is_finite());
}

/// A race whose ranking never yields a trailing actor.
struct NoTrailer(RaceSnapshot);

impl RaceContext for NoTrailer {
    fn actors(&self) -> &[TrackedActor] {
        self.0.actors()
    }

    fn game_phase(&self) -> GamePhase {
        self.0.game_phase()
    }

    fn chasing_hazard_position(&self) -> Option<Vec3> {
        self.0.chasing_hazard_position()
    }

    fn trailing_actor(&self) -> Option<&TrackedActor> {
        None
    }
}

#[test]
fn test_missing_trailer_looks_down_the_rail() {
    let rail = straight_rail(400.0, 10.0);
    let mut cam = camera(rail, CameraSettings::default());
    let ctx = NoTrailer(RaceSnapshot::new(
        vec![actor("Solo", Vec3::new(0.0, 0.0, 200.0), 0.5)],
        None,
        GamePhase::Round,
    ));
    assert!(ctx.leading_actor().is_some());
    cam.on_round_start(&ctx, Vec3::new(0.0, 0.0, 200.0)).unwrap();

    let report = cam.late_update(&ctx, DT);
    assert_eq!(report.outcome, FrameOutcome::Updated);
    assert!(report.has(TrackingFault::MissingLookTarget));
    assert!(!report.has(TrackingFault::NoFocusPoint));
    // look_forward_offset_t ahead of the focus
    let look = report.look_target.unwrap();
    assert!((look - Vec3::new(0.0, 0.0, 204.0)).length() < 1e-3);
}

#[test]
fn test_camera_settles_behind_stationary_field() {
    let rail = straight_rail(400.0, 10.0);
    let settings = CameraSettings {
        camera_sway: false,
        ..CameraSettings::default()
    };
    let mut cam = camera(rail, settings);
    let ctx = RaceSnapshot::new(
        vec![
            actor("Front", Vec3::new(0.0, 0.0, 210.0), 0.55),
            actor("Back", Vec3::new(0.0, 0.0, 190.0), 0.45),
        ],
        None,
        GamePhase::Round,
    );

    cam.on_round_start(&ctx, Vec3::new(0.0, 0.0, 60.0)).unwrap();
    for _ in 0..600 {
        cam.late_update(&ctx, DT);
    }

    let transform = *cam.tracker().transform();
    let goal = Vec3::new(0.0, 5.0, 100.0);
    assert!((transform.position - goal).length() < 1e-2);

    let expected_forward = (Vec3::new(0.0, 0.0, 204.0) - goal).normalize();
    assert!(transform.forward().dot(expected_forward) > 0.999);
}

#[test]
fn test_inactive_rail_reports_and_holds() {
    let mut cam = RailFollowingCamera::new(
        None,
        TrackerSettings::default(),
        CameraSettings::default(),
        CameraCurves::default(),
        None,
    );
    let ctx = RaceSnapshot::default();
    assert_eq!(
        cam.on_round_start(&ctx, Vec3::ZERO),
        Err(TrackingFault::InactiveRail)
    );
    let report = cam.late_update(&ctx, DT);
    assert_eq!(report.outcome, FrameOutcome::Skipped);
    assert!(report.has(TrackingFault::InactiveRail));
}

proptest! {
    #[test]
    fn prop_camera_stays_finite(
        xs in prop::collection::vec(-60.0f32..60.0, 0..5),
        zs in prop::collection::vec(0.0f32..400.0, 5),
        hazard_z in prop::option::of(0.0f32..400.0),
        dt in 0.0f32..0.2,
    ) {
        let rail = straight_rail(400.0, 10.0);
        let mut cam = camera(rail, CameraSettings::default());
        let actors: Vec<TrackedActor> = xs
            .iter()
            .zip(&zs)
            .enumerate()
            .map(|(i, (x, z))| actor(&format!("P{}", i), Vec3::new(*x, 0.0, *z), *z / 400.0))
            .collect();
        let ctx = RaceSnapshot::new(
            actors,
            hazard_z.map(|z| Vec3::new(0.0, 0.0, z)),
            GamePhase::Round,
        );

        let _ = cam.on_round_start(&ctx, Vec3::new(0.0, 0.0, 200.0));
        for _ in 0..30 {
            let report = cam.late_update(&ctx, dt);
            prop_assert!(report.transform.position.is_finite());
            prop_assert!(report.transform.rotation.is_finite());
            prop_assert!(report.transform.rotation.is_normalized());
        }
    }
}
