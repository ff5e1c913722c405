//! Collaborator seams: the read-only world queries expressions evaluate
//! against, and the capability interface action statements drive.

use contracts::{ActorId, Cube, GroupId, Terrain};

// ---------------------------------------------------------------------------
// World-query abstraction
// ---------------------------------------------------------------------------

/// Read-only view of the world needed by expression evaluation.
pub trait WorldQuery {
    fn in_bounds(&self, cube: Cube) -> bool;

    /// Terrain of an in-bounds cube. Callers check `in_bounds` first.
    fn terrain(&self, cube: Cube) -> Terrain;

    fn has_log(&self, cube: Cube) -> bool;

    fn has_boulder(&self, cube: Cube) -> bool;

    /// Living actors occupying `cube`, in ascending id order.
    fn actors_at(&self, cube: Cube) -> Vec<ActorId>;

    fn actor_position(&self, actor: ActorId) -> Option<Cube>;

    fn actor_group(&self, actor: ActorId) -> Option<GroupId>;

    fn is_alive(&self, actor: ActorId) -> bool;

    fn is_carrying(&self, actor: ActorId) -> bool;

    /// Out-of-bounds cubes count as solid.
    fn is_solid(&self, cube: Cube) -> bool {
        !self.in_bounds(cube) || self.terrain(cube).is_solid()
    }

    fn is_passable(&self, cube: Cube) -> bool {
        self.in_bounds(cube) && !self.terrain(cube).is_solid()
    }

    fn is_workshop(&self, cube: Cube) -> bool {
        self.in_bounds(cube) && self.terrain(cube) == Terrain::Workshop
    }
}

// ---------------------------------------------------------------------------
// Actor capabilities
// ---------------------------------------------------------------------------

/// Multi-tick activities an actor can be asked to perform.
///
/// Each `start_*` call begins a new activity and replaces whatever the actor
/// was doing. Completion is reported through `is_activity_finished`, which the
/// executor polls once per tick.
pub trait ActorCapabilities {
    fn start_move_to(&mut self, actor: ActorId, target: Cube);

    fn start_work(&mut self, actor: ActorId, target: Cube);

    fn start_follow(&mut self, actor: ActorId, target: ActorId);

    fn start_attack(&mut self, actor: ActorId, target: ActorId);

    fn is_activity_finished(&self, actor: ActorId) -> bool;
}

/// Everything an executor needs from its surroundings.
pub trait TaskHost: WorldQuery + ActorCapabilities {}

impl<T: WorldQuery + ActorCapabilities> TaskHost for T {}
