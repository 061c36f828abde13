//! Scripted races for driving a camera rig without a game attached.
//!
//! Actors travel along the rail at constant speed once the intro ends; a
//! chasing hazard eliminates anyone it catches.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::context::{ActorId, GamePhase, RaceSnapshot, TrackedActor};
use crate::rail::Rail;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedActor {
    pub name: String,
    #[serde(default)]
    pub start_distance: f32,
    /// World units per second along the rail.
    pub speed: f32,
    #[serde(default)]
    pub lateral_offset: f32,
    #[serde(default)]
    pub weave_amplitude: f32,
    #[serde(default = "default_weave_period")]
    pub weave_period_seconds: f32,
}

fn default_weave_period() -> f32 {
    4.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedHazard {
    #[serde(default)]
    pub start_distance: f32,
    pub speed: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub intro_seconds: f32,
    pub actors: Vec<ScriptedActor>,
    #[serde(default)]
    pub hazard: Option<ScriptedHazard>,
}

impl Scenario {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let content = fs::read_to_string(path)?;
        Self::load_from_str(&content)
    }

    pub fn load_from_str(content: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = if content.trim_start().starts_with('{') {
            serde_json::from_str(content)
                .map_err(|e| ScenarioError::Parse(format!("JSON parse error: {}", e)))?
        } else {
            serde_yaml::from_str(content)
                .map_err(|e| ScenarioError::Parse(format!("YAML parse error: {}", e)))?
        };
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<(), ScenarioError> {
        if !self.intro_seconds.is_finite() || self.intro_seconds < 0.0 {
            return Err(ScenarioError::InvalidData(
                "intro_seconds must be a non-negative number".to_string(),
            ));
        }
        for actor in &self.actors {
            let values = [
                actor.start_distance,
                actor.speed,
                actor.lateral_offset,
                actor.weave_amplitude,
                actor.weave_period_seconds,
            ];
            if values.iter().any(|v| !v.is_finite()) {
                return Err(ScenarioError::InvalidData(format!(
                    "Actor '{}' has a non-finite value",
                    actor.name
                )));
            }
        }
        if let Some(hazard) = &self.hazard {
            if !hazard.start_distance.is_finite() || !hazard.speed.is_finite() {
                return Err(ScenarioError::InvalidData(
                    "Hazard has a non-finite value".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct ActorState {
    id: ActorId,
    distance: f32,
    alive: bool,
}

/// A scenario being played back on a concrete rail.
pub struct ScenarioRun {
    scenario: Scenario,
    rail: Arc<Rail>,
    states: Vec<ActorState>,
    hazard_distance: Option<f32>,
    elapsed: f32,
    snapshot: RaceSnapshot,
}

impl ScenarioRun {
    pub fn new(scenario: Scenario, rail: Arc<Rail>) -> Self {
        let states = scenario
            .actors
            .iter()
            .map(|a| ActorState {
                id: uuid::Uuid::new_v4(),
                distance: a.start_distance,
                alive: true,
            })
            .collect();
        let hazard_distance = scenario.hazard.as_ref().map(|h| h.start_distance);
        let mut run = Self {
            scenario,
            rail,
            states,
            hazard_distance,
            elapsed: 0.0,
            snapshot: RaceSnapshot::default(),
        };
        run.snapshot = run.build_snapshot();
        run
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn actor_ids(&self) -> Vec<ActorId> {
        self.states.iter().map(|s| s.id).collect()
    }

    pub fn actor_id(&self, name: &str) -> Option<ActorId> {
        self.scenario
            .actors
            .iter()
            .zip(&self.states)
            .find(|(a, _)| a.name == name)
            .map(|(_, s)| s.id)
    }

    pub fn phase(&self) -> GamePhase {
        if self.elapsed < self.scenario.intro_seconds {
            GamePhase::RoundIntro
        } else {
            GamePhase::Round
        }
    }

    /// Rail point under the furthest actor, or the rail start when there are
    /// no actors.
    pub fn start_point(&self) -> Vec3 {
        let distance = self
            .states
            .iter()
            .map(|s| s.distance)
            .max_by(f32::total_cmp)
            .unwrap_or(0.0);
        self.rail
            .position_at_arclength(distance)
            .unwrap_or(Vec3::ZERO)
    }

    pub fn snapshot(&self) -> &RaceSnapshot {
        &self.snapshot
    }

    /// Advance the race by `dt` seconds and return the new frame's context.
    pub fn step(&mut self, dt: f32) -> &RaceSnapshot {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let was_intro = self.phase() == GamePhase::RoundIntro;
        self.elapsed += dt;

        if self.phase() == GamePhase::Round {
            // only the part of this step after the intro counts as racing
            let racing = if was_intro {
                self.elapsed - self.scenario.intro_seconds
            } else {
                dt
            };
            if was_intro {
                info!("Round started after {:.2}s", self.scenario.intro_seconds);
            }
            self.advance(racing);
        }

        self.snapshot = self.build_snapshot();
        &self.snapshot
    }

    fn advance(&mut self, dt: f32) {
        for (actor, state) in self.scenario.actors.iter().zip(&mut self.states) {
            if state.alive {
                state.distance += actor.speed * dt;
            }
        }

        let Some(hazard) = &self.scenario.hazard else {
            return;
        };
        let hazard_distance = self.hazard_distance.unwrap_or(hazard.start_distance) + hazard.speed * dt;
        self.hazard_distance = Some(hazard_distance);

        for (actor, state) in self.scenario.actors.iter().zip(&mut self.states) {
            if state.alive && hazard_distance >= state.distance {
                state.alive = false;
                debug!("{} caught by the hazard at {:.1}", actor.name, state.distance);
            }
        }
    }

    fn build_snapshot(&self) -> RaceSnapshot {
        let total = self.rail.total_length();
        let actors = self
            .scenario
            .actors
            .iter()
            .zip(&self.states)
            .map(|(actor, state)| {
                let position = self.actor_position(actor, state.distance);
                TrackedActor {
                    id: state.id,
                    name: actor.name.clone(),
                    position,
                    race_progress: if total > 0.0 { state.distance / total } else { 0.0 },
                    alive: state.alive,
                    active: true,
                    above_track: true,
                }
            })
            .collect();
        let hazard = self
            .hazard_distance
            .and_then(|d| self.rail.position_at_arclength(d));

        RaceSnapshot::new(actors, hazard, self.phase())
    }

    fn actor_position(&self, actor: &ScriptedActor, distance: f32) -> Vec3 {
        let Some(sample) = self.rail.sample_at_arclength(distance) else {
            return Vec3::ZERO;
        };
        let side = Vec3::Y.cross(sample.direction).normalize_or_zero();
        let weave = if actor.weave_period_seconds > 0.0 {
            actor.weave_amplitude
                * (self.elapsed * std::f32::consts::TAU / actor.weave_period_seconds).sin()
        } else {
            0.0
        };
        sample.position + side * (actor.lateral_offset + weave)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RaceContext;

    fn straight_rail() -> Arc<Rail> {
        Arc::new(Rail::new(
            (0..=10).map(|i| Vec3::new(0.0, 0.0, i as f32 * 10.0)),
            false,
        ))
    }

    fn two_runners() -> Scenario {
        Scenario {
            intro_seconds: 1.0,
            actors: vec![
                ScriptedActor {
                    name: "Fast".to_string(),
                    start_distance: 10.0,
                    speed: 10.0,
                    lateral_offset: 0.0,
                    weave_amplitude: 0.0,
                    weave_period_seconds: 4.0,
                },
                ScriptedActor {
                    name: "Slow".to_string(),
                    start_distance: 10.0,
                    speed: 2.0,
                    lateral_offset: 1.5,
                    weave_amplitude: 0.0,
                    weave_period_seconds: 4.0,
                },
            ],
            hazard: Some(ScriptedHazard {
                start_distance: 0.0,
                speed: 5.0,
            }),
        }
    }

    #[test]
    fn test_intro_holds_everyone_still() {
        let mut run = ScenarioRun::new(two_runners(), straight_rail());
        let snap = run.step(0.5).clone();
        assert_eq!(snap.phase, GamePhase::RoundIntro);
        assert_eq!(snap.actors[0].position, Vec3::new(0.0, 0.0, 10.0));
        assert_eq!(snap.hazard, Some(Vec3::ZERO));
    }

    #[test]
    fn test_actors_advance_after_intro() {
        let mut run = ScenarioRun::new(two_runners(), straight_rail());
        let snap = run.step(2.0).clone();
        assert_eq!(snap.phase, GamePhase::Round);
        // one second of racing
        assert!((snap.actors[0].position.z - 20.0).abs() < 1e-4);
        assert!((snap.actors[0].race_progress - 0.2).abs() < 1e-5);
        assert_eq!(snap.leading_actor().unwrap().name, "Fast");
    }

    #[test]
    fn test_lateral_offset_is_sideways() {
        let run = ScenarioRun::new(two_runners(), straight_rail());
        let slow = &run.snapshot().actors[1];
        assert!((slow.position - Vec3::new(1.5, 0.0, 10.0)).length() < 1e-5);
    }

    #[test]
    fn test_hazard_eliminates_slow_actor() {
        let mut run = ScenarioRun::new(two_runners(), straight_rail());
        run.step(1.0);
        for _ in 0..60 {
            run.step(0.1);
        }
        let snap = run.snapshot();
        assert!(snap.actors[0].alive);
        assert!(!snap.actors[1].alive);
        assert_eq!(snap.trailing_actor().unwrap().name, "Fast");
    }

    #[test]
    fn test_ids_are_stable() {
        let mut run = ScenarioRun::new(two_runners(), straight_rail());
        let ids = run.actor_ids();
        run.step(3.0);
        assert_eq!(run.snapshot().actors[1].id, ids[1]);
        assert_eq!(run.actor_id("Slow"), Some(ids[1]));
        assert_eq!(run.actor_id("Nobody"), None);
    }

    #[test]
    fn test_start_point_is_leader() {
        let run = ScenarioRun::new(two_runners(), straight_rail());
        assert_eq!(run.start_point(), Vec3::new(0.0, 0.0, 10.0));

        let empty = Scenario {
            intro_seconds: 0.0,
            actors: vec![],
            hazard: None,
        };
        let run = ScenarioRun::new(empty, straight_rail());
        assert_eq!(run.start_point(), Vec3::ZERO);
    }

    #[test]
    fn test_load_yaml_scenario() {
        let yaml = r#"
intro_seconds: 2.0
actors:
  - name: Red
    speed: 12.0
  - name: Blue
    start_distance: 5.0
    speed: 11.0
    weave_amplitude: 1.0
hazard:
  speed: 9.0
"#;
        let scenario = Scenario::load_from_str(yaml).unwrap();
        assert_eq!(scenario.actors.len(), 2);
        assert_eq!(scenario.actors[1].weave_period_seconds, 4.0);
        assert_eq!(scenario.hazard.unwrap().start_distance, 0.0);
    }

    #[test]
    fn test_rejects_negative_intro() {
        let json = r#"{"intro_seconds": -1.0, "actors": []}"#;
        assert!(matches!(
            Scenario::load_from_str(json),
            Err(ScenarioError::InvalidData(_))
        ));
    }
}
