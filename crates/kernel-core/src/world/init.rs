use tracing::info;

use super::*;
use crate::error::WorldError;
use crate::program::Program;
use crate::script::Scenario;

impl SandboxWorld {
    pub fn new(config: EngineConfig) -> Self {
        let runtime = TaskRuntime::new(config.max_steps_per_tick);
        Self {
            state: WorldState::new(config),
            runtime,
            groups: BTreeSet::new(),
            factory: TaskFactory::new(),
            tick: 0,
        }
    }

    /// Build a world from a scenario document. Fails on the first invalid
    /// entry.
    pub fn from_scenario(scenario: &Scenario) -> Result<Self, WorldError> {
        let mut world = Self::new(scenario.config.clone());
        for patch in &scenario.terrain {
            world.set_terrain(patch.cube, patch.terrain)?;
        }
        for cube in &scenario.logs {
            world.place_log(*cube)?;
        }
        for cube in &scenario.boulders {
            world.place_boulder(*cube)?;
        }
        for group in &scenario.groups {
            world.add_group(*group);
        }
        for actor in &scenario.actors {
            world.spawn_actor(actor.id, actor.group, actor.position)?;
            world.set_carrying(actor.id, actor.carrying)?;
        }
        for spec in &scenario.tasks {
            let program = spec.program.build()?;
            let (first, rest) = spec
                .groups
                .split_first()
                .ok_or_else(|| WorldError::NoGroups(spec.name.clone()))?;
            let ids = world.create_tasks(*first, &spec.name, spec.priority, program, &spec.targets)?;
            for group in rest {
                for id in &ids {
                    world.share_task(*group, *id)?;
                }
            }
        }
        info!(
            actors = scenario.actors.len(),
            tasks = world.runtime.board().len(),
            "scenario loaded"
        );
        Ok(world)
    }

    /// Register a group and its scheduler. Adding a known group is a no-op.
    pub fn add_group(&mut self, group: GroupId) {
        if self.groups.insert(group) {
            self.runtime.register_group(group);
        }
    }

    pub fn spawn_actor(&mut self, actor: ActorId, group: GroupId, position: Cube) -> Result<(), WorldError> {
        self.check_group(group)?;
        self.check_bounds(position)?;
        if self.state.actors.contains_key(&actor) {
            return Err(WorldError::DuplicateActor(actor));
        }
        self.state.actors.insert(
            actor,
            ActorState {
                group,
                position,
                alive: true,
                carrying: None,
                activity: Activity::Idle,
            },
        );
        Ok(())
    }

    pub fn set_carrying(&mut self, actor: ActorId, item: Option<Item>) -> Result<(), WorldError> {
        let state = self
            .state
            .actors
            .get_mut(&actor)
            .ok_or(WorldError::UnknownActor(actor))?;
        state.carrying = item;
        Ok(())
    }

    pub fn set_terrain(&mut self, cube: Cube, terrain: Terrain) -> Result<(), WorldError> {
        self.check_bounds(cube)?;
        if terrain == Terrain::Air {
            self.state.terrain.remove(&cube);
        } else {
            self.state.terrain.insert(cube, terrain);
        }
        Ok(())
    }

    pub fn place_log(&mut self, cube: Cube) -> Result<(), WorldError> {
        self.check_bounds(cube)?;
        self.state.logs.insert(cube);
        Ok(())
    }

    pub fn place_boulder(&mut self, cube: Cube) -> Result<(), WorldError> {
        self.check_bounds(cube)?;
        self.state.boulders.insert(cube);
        Ok(())
    }

    /// Turn a program into tasks through the world's factory and schedule
    /// them in `group`.
    pub fn create_tasks(
        &mut self,
        group: GroupId,
        name: &str,
        priority: i64,
        program: Program,
        targets: &[Cube],
    ) -> Result<Vec<TaskId>, WorldError> {
        self.check_group(group)?;
        let tasks = self.factory.create_tasks(name, priority, program, targets)?;
        let mut ids = Vec::with_capacity(tasks.len());
        for task in tasks {
            ids.push(self.add_task(group, task)?);
        }
        Ok(ids)
    }

    /// Allocate an unused task id, for callers building `Task`s themselves.
    pub fn next_task_id(&mut self) -> TaskId {
        self.factory.allocate()
    }

    pub(super) fn check_bounds(&self, cube: Cube) -> Result<(), WorldError> {
        if self.state.in_bounds(cube) {
            Ok(())
        } else {
            Err(WorldError::OutOfBounds(cube))
        }
    }

    pub(super) fn check_group(&self, group: GroupId) -> Result<(), WorldError> {
        if self.groups.contains(&group) {
            Ok(())
        } else {
            Err(WorldError::UnknownGroup(group))
        }
    }
}
