use tracing::info;

use super::*;
use crate::error::WorldError;
use crate::task::Task;

impl SandboxWorld {
    pub fn add_task(&mut self, group: GroupId, task: Task) -> Result<TaskId, WorldError> {
        self.check_group(group)?;
        self.factory.reserve_through(task.id());
        Ok(self.runtime.add_task(group, task)?)
    }

    /// Schedule a task that already exists in another group as well.
    pub fn share_task(&mut self, group: GroupId, task: TaskId) -> Result<(), WorldError> {
        self.check_group(group)?;
        Ok(self.runtime.schedule_existing(group, task)?)
    }

    /// Put `replacement` in the scheduling slot of `original`. An actor
    /// running the original is stopped and becomes idle.
    pub fn replace_task(
        &mut self,
        group: GroupId,
        original: TaskId,
        replacement: Task,
    ) -> Result<TaskId, WorldError> {
        self.check_group(group)?;
        let id = replacement.id();
        self.factory.reserve_through(id);
        if let Some(actor) = self.runtime.replace_task(group, original, replacement)? {
            self.state.clear_activity(actor);
        }
        Ok(id)
    }

    pub fn remove_task(&mut self, group: GroupId, task: TaskId) -> Result<(), WorldError> {
        self.check_group(group)?;
        if let Some(actor) = self.runtime.remove_task(group, task)? {
            self.state.clear_activity(actor);
        }
        Ok(())
    }

    /// Stop whatever the actor is doing. Its task, if any, goes back to the
    /// schedulers with no progress kept.
    pub fn interrupt(&mut self, actor: ActorId) -> Result<Option<TaskId>, WorldError> {
        if self.state.actor(actor).is_none() {
            return Err(WorldError::UnknownActor(actor));
        }
        self.state.clear_activity(actor);
        Ok(self.runtime.interrupt(actor))
    }

    pub fn kill_actor(&mut self, actor: ActorId) -> Result<(), WorldError> {
        if self.state.actor(actor).is_none() {
            return Err(WorldError::UnknownActor(actor));
        }
        if self.state.kill(actor) {
            info!(%actor, "actor killed");
            self.runtime.interrupt(actor);
        }
        Ok(())
    }
}
