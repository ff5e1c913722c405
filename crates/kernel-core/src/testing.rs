//! In-memory host for unit tests: a bounded grid plus actors whose activities
//! finish only when a test says so.

use std::collections::{BTreeMap, BTreeSet};

use contracts::{ActorId, Cube, GroupId, Terrain};

use crate::view::{ActorCapabilities, WorldQuery};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    MoveTo(ActorId, Cube),
    Work(ActorId, Cube),
    Follow(ActorId, ActorId),
    Attack(ActorId, ActorId),
}

#[derive(Debug, Clone)]
struct GridActor {
    group: GroupId,
    position: Cube,
    alive: bool,
    carrying: bool,
    busy: bool,
}

#[derive(Debug, Clone)]
pub struct GridWorld {
    size: [i32; 3],
    terrain: BTreeMap<Cube, Terrain>,
    logs: BTreeSet<Cube>,
    boulders: BTreeSet<Cube>,
    actors: BTreeMap<ActorId, GridActor>,
    pub requests: Vec<Request>,
}

impl GridWorld {
    pub fn new(size: [i32; 3]) -> Self {
        Self {
            size,
            terrain: BTreeMap::new(),
            logs: BTreeSet::new(),
            boulders: BTreeSet::new(),
            actors: BTreeMap::new(),
            requests: Vec::new(),
        }
    }

    pub fn add_actor(&mut self, id: ActorId, group: GroupId, position: Cube) {
        self.actors.insert(
            id,
            GridActor {
                group,
                position,
                alive: true,
                carrying: false,
                busy: false,
            },
        );
    }

    pub fn set_terrain(&mut self, cube: Cube, terrain: Terrain) {
        self.terrain.insert(cube, terrain);
    }

    pub fn place_log(&mut self, cube: Cube) {
        self.logs.insert(cube);
    }

    pub fn set_carrying(&mut self, id: ActorId, carrying: bool) {
        if let Some(actor) = self.actors.get_mut(&id) {
            actor.carrying = carrying;
        }
    }

    pub fn kill(&mut self, id: ActorId) {
        if let Some(actor) = self.actors.get_mut(&id) {
            actor.alive = false;
        }
    }

    pub fn finish_activity(&mut self, id: ActorId) {
        if let Some(actor) = self.actors.get_mut(&id) {
            actor.busy = false;
        }
    }

    fn begin(&mut self, id: ActorId, request: Request) {
        if let Some(actor) = self.actors.get_mut(&id) {
            actor.busy = true;
        }
        self.requests.push(request);
    }
}

impl WorldQuery for GridWorld {
    fn in_bounds(&self, cube: Cube) -> bool {
        let [sx, sy, sz] = self.size;
        (0..sx).contains(&cube.x) && (0..sy).contains(&cube.y) && (0..sz).contains(&cube.z)
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
            .filter(|(_, actor)| actor.alive && actor.position == cube)
            .map(|(id, _)| *id)
            .collect()
    }

    fn actor_position(&self, actor: ActorId) -> Option<Cube> {
        self.actors
            .get(&actor)
            .filter(|actor| actor.alive)
            .map(|actor| actor.position)
    }

    fn actor_group(&self, actor: ActorId) -> Option<GroupId> {
        self.actors.get(&actor).map(|actor| actor.group)
    }

    fn is_alive(&self, actor: ActorId) -> bool {
        self.actors.get(&actor).is_some_and(|actor| actor.alive)
    }

    fn is_carrying(&self, actor: ActorId) -> bool {
        self.actors.get(&actor).is_some_and(|actor| actor.carrying)
    }
}

impl ActorCapabilities for GridWorld {
    fn start_move_to(&mut self, actor: ActorId, target: Cube) {
        self.begin(actor, Request::MoveTo(actor, target));
    }

    fn start_work(&mut self, actor: ActorId, target: Cube) {
        self.begin(actor, Request::Work(actor, target));
    }

    fn start_follow(&mut self, actor: ActorId, target: ActorId) {
        self.begin(actor, Request::Follow(actor, target));
    }

    fn start_attack(&mut self, actor: ActorId, target: ActorId) {
        self.begin(actor, Request::Attack(actor, target));
    }

    fn is_activity_finished(&self, actor: ActorId) -> bool {
        self.actors.get(&actor).map_or(true, |actor| !actor.busy)
    }
}
