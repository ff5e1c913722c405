use tracing::debug;

use super::*;

/// Result of advancing one actor's activity by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ActivityUpdate {
    /// Still running, or nothing was running.
    Unchanged,
    Finished,
}

impl ActivityUpdate {
    pub(super) fn finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl WorldState {
    pub(super) fn advance_activity(&mut self, actor: ActorId, dt: f64) -> ActivityUpdate {
        let Some(activity) = self
            .actors
            .get(&actor)
            .filter(|state| state.alive)
            .map(|state| state.activity)
        else {
            return ActivityUpdate::Unchanged;
        };
        match activity {
            Activity::Idle => ActivityUpdate::Unchanged,
            Activity::Moving { target, credit } => self.advance_move(actor, target, credit + dt),
            Activity::Following { target, credit } => {
                self.advance_follow(actor, target, credit + dt)
            }
            Activity::Working { target, remaining } => {
                let remaining = remaining - dt;
                if remaining > TIME_EPSILON {
                    self.replace_activity(actor, Activity::Working { target, remaining });
                    return ActivityUpdate::Unchanged;
                }
                self.apply_work(actor, target);
                self.replace_activity(actor, Activity::Idle);
                ActivityUpdate::Finished
            }
            // Combat is not resolved; an attack only takes time.
            Activity::Attacking { target, remaining } => {
                let remaining = remaining - dt;
                if remaining > TIME_EPSILON {
                    self.replace_activity(actor, Activity::Attacking { target, remaining });
                    return ActivityUpdate::Unchanged;
                }
                debug!(%actor, %target, "attack finished");
                self.replace_activity(actor, Activity::Idle);
                ActivityUpdate::Finished
            }
        }
    }

    // -----------------------------------------------------------------------
    // Movement
    // -----------------------------------------------------------------------

    fn advance_move(&mut self, actor: ActorId, target: Cube, credit: f64) -> ActivityUpdate {
        let Some(start) = self.actor_position(actor) else {
            return ActivityUpdate::Unchanged;
        };
        let (position, credit, arrived) = self.walk(start, credit, |position| position == target, target);
        self.set_position(actor, position);
        if arrived {
            self.replace_activity(actor, Activity::Idle);
            return ActivityUpdate::Finished;
        }
        self.replace_activity(actor, Activity::Moving { target, credit });
        ActivityUpdate::Unchanged
    }

    fn advance_follow(&mut self, actor: ActorId, target: ActorId, credit: f64) -> ActivityUpdate {
        let (Some(start), Some(goal)) = (self.actor_position(actor), self.actor_position(target))
        else {
            debug!(%actor, %target, "follow target gone");
            self.replace_activity(actor, Activity::Idle);
            return ActivityUpdate::Finished;
        };
        let (position, credit, arrived) =
            self.walk(start, credit, |position| position.is_adjacent_to(&goal), goal);
        self.set_position(actor, position);
        if arrived {
            self.replace_activity(actor, Activity::Idle);
            return ActivityUpdate::Finished;
        }
        self.replace_activity(actor, Activity::Following { target, credit });
        ActivityUpdate::Unchanged
    }

    /// Spend step credit walking from `start` towards `goal` one cube at a
    /// time. Returns the reached cube, the leftover credit and whether the
    /// walk is over, either because `done` holds or the next cube is blocked.
    fn walk<F>(&self, start: Cube, mut credit: f64, done: F, goal: Cube) -> (Cube, f64, bool)
    where
        F: Fn(Cube) -> bool,
    {
        let per_cube = self.config.timings.move_seconds_per_cube.max(0.0);
        let mut position = start;
        loop {
            if done(position) {
                return (position, credit, true);
            }
            if credit + TIME_EPSILON < per_cube {
                return (position, credit, false);
            }
            let next = position.step_towards(&goal);
            if !self.is_passable(next) {
                debug!(from = %position, blocked = %next, "walk blocked");
                return (position, credit, true);
            }
            position = next;
            credit -= per_cube;
        }
    }

    // -----------------------------------------------------------------------
    // Work effects
    // -----------------------------------------------------------------------

    /// Carried item: drop it. Otherwise pick up a boulder, then a log.
    /// Otherwise rock breaks into a boulder and a tree is felled into a log.
    fn apply_work(&mut self, actor: ActorId, target: Cube) {
        let Some(state) = self.actors.get(&actor) else {
            return;
        };
        if !state.position.is_adjacent_to(&target) || !self.in_bounds(target) {
            debug!(%actor, %target, "work target out of reach");
            return;
        }

        if let Some(item) = state.carrying {
            let spot = if self.is_passable(target) {
                target
            } else {
                state.position
            };
            match item {
                Item::Log => self.logs.insert(spot),
                Item::Boulder => self.boulders.insert(spot),
            };
            self.set_carrying(actor, None);
            debug!(%actor, %item, at = %spot, "item dropped");
            return;
        }

        if self.boulders.remove(&target) {
            self.set_carrying(actor, Some(Item::Boulder));
        } else if self.logs.remove(&target) {
            self.set_carrying(actor, Some(Item::Log));
        } else {
            match self.terrain(target) {
                Terrain::Rock => {
                    self.terrain.remove(&target);
                    self.boulders.insert(target);
                }
                Terrain::Tree => {
                    self.terrain.remove(&target);
                    self.logs.insert(target);
                }
                _ => debug!(%actor, %target, "nothing to work on"),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Field updates
    // -----------------------------------------------------------------------

    pub(super) fn kill(&mut self, actor: ActorId) -> bool {
        match self.actors.get_mut(&actor) {
            Some(state) if state.alive => {
                state.alive = false;
                state.activity = Activity::Idle;
                true
            }
            _ => false,
        }
    }

    fn replace_activity(&mut self, actor: ActorId, activity: Activity) {
        if let Some(state) = self.actors.get_mut(&actor) {
            state.activity = activity;
        }
    }

    fn set_position(&mut self, actor: ActorId, position: Cube) {
        if let Some(state) = self.actors.get_mut(&actor) {
            state.position = position;
        }
    }

    fn set_carrying(&mut self, actor: ActorId, item: Option<Item>) {
        if let Some(state) = self.actors.get_mut(&actor) {
            state.carrying = item;
        }
    }
}
