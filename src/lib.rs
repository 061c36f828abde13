//! Rail-constrained object tracking for race cameras.
//!
//! A [`RailObjectTracker`] keeps an object on a precomputed [`Rail`], trailing a
//! focus point and facing a look target every frame. [`RailFollowingCamera`]
//! specialises it for a pursuit camera that widens its framing as the field
//! spreads out ahead of a chasing hazard.

pub mod camera;
pub mod config;
pub mod context;
pub mod curve;
pub mod math;
pub mod rail;
pub mod rail_loader;
pub mod scenario;
pub mod tracker;
pub mod traversal;

pub use camera::{CameraCurves, CameraHooks, CameraSettings, RailFollowingCamera};
pub use config::{ConfigError, RigConfig};
pub use context::{ActorId, GamePhase, RaceContext, RaceSnapshot, TrackedActor};
pub use curve::{Curve, CurveError, EaseStyle, Keyframe};
pub use math::{SmoothingMode, Transform};
pub use rail::{Rail, RailNode, RailProjection};
pub use rail_loader::{RailLoadError, RailLoader};
pub use scenario::{Scenario, ScenarioError, ScenarioRun};
pub use tracker::{
    FocusAverageHooks, FrameOutcome, FrameReport, RailObjectTracker, TrackerFrame, TrackerHooks,
    TrackerSettings, TrackingFault,
};
pub use traversal::NodeTraversalTracker;
