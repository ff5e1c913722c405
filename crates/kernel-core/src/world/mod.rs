//! Sandbox world: a bounded cube grid with actors, loose items and a tick
//! loop that drives the task runtime.
//!
//! `WorldState` is the collaborator programs see through `WorldQuery` and
//! `ActorCapabilities`. `SandboxWorld` pairs it with a `TaskRuntime` and owns
//! the clock.

use std::collections::{BTreeMap, BTreeSet};

use contracts::{ActorId, Cube, EngineConfig, GroupId, Item, TaskEvent, TaskId, Terrain};
use tracing::debug;

use crate::runtime::TaskRuntime;
use crate::task::TaskFactory;
use crate::view::{ActorCapabilities, WorldQuery};

mod activity;
mod commands;
mod init;
mod step;


pub use step::StepMetrics;

/// Slack applied when comparing accumulated tick time against durations.
const TIME_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Actors
// ---------------------------------------------------------------------------

/// Multi-tick activity an actor is carrying out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activity {
    Idle,
    Moving { target: Cube, credit: f64 },
    Working { target: Cube, remaining: f64 },
    Following { target: ActorId, credit: f64 },
    Attacking { target: ActorId, remaining: f64 },
}

impl Activity {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Moving { .. } => "moving",
            Self::Working { .. } => "working",
            Self::Following { .. } => "following",
            Self::Attacking { .. } => "attacking",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActorState {
    pub group: GroupId,
    pub position: Cube,
    pub alive: bool,
    pub carrying: Option<Item>,
    pub activity: Activity,
}

// ---------------------------------------------------------------------------
// WorldState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WorldState {
    config: EngineConfig,
    terrain: BTreeMap<Cube, Terrain>,
    logs: BTreeSet<Cube>,
    boulders: BTreeSet<Cube>,
    actors: BTreeMap<ActorId, ActorState>,
}

impl WorldState {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            terrain: BTreeMap::new(),
            logs: BTreeSet::new(),
            boulders: BTreeSet::new(),
            actors: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn actor(&self, actor: ActorId) -> Option<&ActorState> {
        self.actors.get(&actor)
    }

    pub fn actors(&self) -> impl Iterator<Item = (ActorId, &ActorState)> {
        self.actors.iter().map(|(id, state)| (*id, state))
    }

    /// Living actors in ascending id order.
    pub fn living_actors(&self) -> Vec<ActorId> {
        self.actors
            .iter()
            .filter(|(_, state)| state.alive)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn logs(&self) -> &BTreeSet<Cube> {
        &self.logs
    }

    pub fn boulders(&self) -> &BTreeSet<Cube> {
        &self.boulders
    }

    pub(crate) fn clear_activity(&mut self, actor: ActorId) {
        if let Some(state) = self.actors.get_mut(&actor) {
            state.activity = Activity::Idle;
        }
    }

    fn set_activity(&mut self, actor: ActorId, activity: Activity) {
        match self.actors.get_mut(&actor) {
            Some(state) if state.alive => {
                debug!(%actor, activity = activity.label(), "activity started");
                state.activity = activity;
            }
            _ => debug!(%actor, "activity request for an absent actor ignored"),
        }
    }
}

impl WorldQuery for WorldState {
    fn in_bounds(&self, cube: Cube) -> bool {
        self.config.contains(&cube)
    }

    fn terrain(&self, cube: Cube) -> Terrain {
        self.terrain.get(&cube).copied().unwrap_or_default()
    }

    fn has_log(&self, cube: Cube) -> bool {
        self.logs.contains(&cube)
    }

    fn has_boulder(&self, cube: Cube) -> bool {
        self.boulders.contains(&cube)
    }

    fn actors_at(&self, cube: Cube) -> Vec<ActorId> {
        self.actors
            .iter()
            .filter(|(_, state)| state.alive && state.position == cube)
            .map(|(id, _)| *id)
            .collect()
    }

    fn actor_position(&self, actor: ActorId) -> Option<Cube> {
        self.actors
            .get(&actor)
            .filter(|state| state.alive)
            .map(|state| state.position)
    }

    fn actor_group(&self, actor: ActorId) -> Option<GroupId> {
        self.actors.get(&actor).map(|state| state.group)
    }

    fn is_alive(&self, actor: ActorId) -> bool {
        self.actors.get(&actor).is_some_and(|state| state.alive)
    }

    fn is_carrying(&self, actor: ActorId) -> bool {
        self.actors
            .get(&actor)
            .is_some_and(|state| state.carrying.is_some())
    }
}

impl ActorCapabilities for WorldState {
    fn start_move_to(&mut self, actor: ActorId, target: Cube) {
        self.set_activity(actor, Activity::Moving { target, credit: 0.0 });
    }

    fn start_work(&mut self, actor: ActorId, target: Cube) {
        let remaining = self.config.timings.work_seconds;
        self.set_activity(actor, Activity::Working { target, remaining });
    }

    fn start_follow(&mut self, actor: ActorId, target: ActorId) {
        self.set_activity(actor, Activity::Following { target, credit: 0.0 });
    }

    fn start_attack(&mut self, actor: ActorId, target: ActorId) {
        let remaining = self.config.timings.attack_seconds;
        self.set_activity(actor, Activity::Attacking { target, remaining });
    }

    fn is_activity_finished(&self, actor: ActorId) -> bool {
        self.actors
            .get(&actor)
            .map_or(true, |state| state.activity.is_idle())
    }
}

// ---------------------------------------------------------------------------
// SandboxWorld
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SandboxWorld {
    state: WorldState,
    runtime: TaskRuntime,
    groups: BTreeSet<GroupId>,
    factory: TaskFactory,
    tick: u64,
}

impl SandboxWorld {
    pub fn state(&self) -> &WorldState {
        &self.state
    }

    pub fn runtime(&self) -> &TaskRuntime {
        &self.runtime
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn groups(&self) -> &BTreeSet<GroupId> {
        &self.groups
    }

    pub fn events(&self) -> &[TaskEvent] {
        self.runtime.events()
    }

    pub fn drain_events(&mut self) -> Vec<TaskEvent> {
        self.runtime.drain_events()
    }

    pub fn current_task(&self, actor: ActorId) -> Option<TaskId> {
        self.runtime.current_task(actor)
    }

    pub fn actor_position(&self, actor: ActorId) -> Option<Cube> {
        self.state.actor(actor).map(|state| state.position)
    }
}
