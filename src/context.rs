//! The narrow view of the surrounding game that trackers consume.
//!
//! Everything a tracker needs to know about competitors, the chasing hazard and
//! the round phase comes through [`RaceContext`]. [`RaceSnapshot`] is a plain
//! data implementation, filled in once per frame by whoever owns the game state.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use uuid::Uuid;

pub type ActorId = Uuid;

#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
pub enum GamePhase {
    /// Pre-round introduction; every actor counts as eligible so trackers can
    /// frame the grid before anyone is racing.
    #[default]
    RoundIntro = 0,
    Round = 1,
    RoundEnd = 2,
    Paused = 3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedActor {
    pub id: ActorId,
    pub name: String,
    pub position: Vec3,
    /// Fraction of the race completed; used for leader/trailer ranking.
    pub race_progress: f32,
    pub alive: bool,
    pub active: bool,
    pub above_track: bool,
}

impl TrackedActor {
    pub fn new(name: impl Into<String>, position: Vec3, race_progress: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            position,
            race_progress,
            alive: true,
            active: true,
            above_track: true,
        }
    }
}

pub trait RaceContext {
    fn actors(&self) -> &[TrackedActor];

    fn game_phase(&self) -> GamePhase;

    fn chasing_hazard_position(&self) -> Option<Vec3>;

    fn actor(&self, id: ActorId) -> Option<&TrackedActor> {
        self.actors().iter().find(|a| a.id == id)
    }

    fn is_eligible(&self, actor: &TrackedActor) -> bool {
        (actor.alive && actor.active && actor.above_track)
            || self.game_phase() == GamePhase::RoundIntro
    }

    /// Eligible actor furthest along the race.
    fn leading_actor(&self) -> Option<&TrackedActor> {
        self.actors()
            .iter()
            .filter(|a| self.is_eligible(a))
            .max_by(|a, b| a.race_progress.total_cmp(&b.race_progress))
    }

    /// Eligible actor furthest behind.
    fn trailing_actor(&self) -> Option<&TrackedActor> {
        self.actors()
            .iter()
            .filter(|a| self.is_eligible(a))
            .min_by(|a, b| a.race_progress.total_cmp(&b.race_progress))
    }
}

/// Average position of every eligible actor, `None` when nobody qualifies.
pub fn average_eligible_position(ctx: &dyn RaceContext) -> Option<Vec3> {
    let (sum, count) = ctx
        .actors()
        .iter()
        .filter(|a| ctx.is_eligible(a))
        .fold((Vec3::ZERO, 0usize), |(sum, count), a| (sum + a.position, count + 1));

    if count == 0 {
        return None;
    }
    Some(sum / count as f32)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaceSnapshot {
    pub actors: Vec<TrackedActor>,
    pub hazard: Option<Vec3>,
    pub phase: GamePhase,
}

impl RaceSnapshot {
    pub fn new(actors: Vec<TrackedActor>, hazard: Option<Vec3>, phase: GamePhase) -> Self {
        Self {
            actors,
            hazard,
            phase,
        }
    }
}

impl RaceContext for RaceSnapshot {
    fn actors(&self) -> &[TrackedActor] {
        &self.actors
    }

    fn game_phase(&self) -> GamePhase {
        self.phase
    }

    fn chasing_hazard_position(&self) -> Option<Vec3> {
        self.hazard
    }
}
