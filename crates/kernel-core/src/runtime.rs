//! Glue between schedulers and executors.
//!
//! `TaskRuntime` owns the task board, one scheduler per group and the live
//! executor of every busy actor. All task lifecycle transitions go through
//! here so each one is recorded as a `TaskEvent`.

use std::collections::BTreeMap;

use contracts::{ActorId, GroupId, TaskEvent, TaskEventType, TaskId};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, warn};

use crate::error::{EvaluationError, SchedulingError};
use crate::executor::{ExecutionOutcome, ProgramExecutor};
use crate::scheduler::Scheduler;
use crate::task::{Task, TaskBoard};
use crate::view::TaskHost;

/// What one `run_actor` / `settle_actor` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The actor has no task.
    Idle,
    Running(TaskId),
    Completed(TaskId),
    /// The executor was discarded and the task returned to the scheduler.
    Failed(TaskId, EvaluationError),
}

#[derive(Debug, Clone)]
struct Running {
    task: TaskId,
    executor: ProgramExecutor,
}

#[derive(Debug, Clone)]
pub struct TaskRuntime {
    board: TaskBoard,
    schedulers: BTreeMap<GroupId, Scheduler>,
    running: BTreeMap<ActorId, Running>,
    events: Vec<TaskEvent>,
    max_steps_per_tick: u32,
    tick: u64,
    sequence_in_tick: u64,
}

impl TaskRuntime {
    pub fn new(max_steps_per_tick: u32) -> Self {
        Self {
            board: TaskBoard::new(),
            schedulers: BTreeMap::new(),
            running: BTreeMap::new(),
            events: Vec::new(),
            max_steps_per_tick,
            tick: 0,
            sequence_in_tick: 0,
        }
    }

    /// Stamp events recorded from now on with `tick`.
    pub fn begin_tick(&mut self, tick: u64) {
        self.tick = tick;
        self.sequence_in_tick = 0;
    }

    /// Returns false when the group already had a scheduler.
    pub fn register_group(&mut self, group: GroupId) -> bool {
        if self.schedulers.contains_key(&group) {
            return false;
        }
        self.schedulers.insert(group, Scheduler::new(group));
        true
    }

    // -----------------------------------------------------------------------
    // Scheduler surface
    // -----------------------------------------------------------------------

    /// Put a new task on the board and into `group`'s scheduler.
    pub fn add_task(&mut self, group: GroupId, task: Task) -> Result<TaskId, SchedulingError> {
        let id = task.id();
        let scheduler = self
            .schedulers
            .get_mut(&group)
            .ok_or(SchedulingError::UnknownGroup(group))?;
        if self.board.contains(id) {
            return Err(SchedulingError::DuplicateTask { task: id, group });
        }
        self.board.insert(task);
        scheduler.add_task(&mut self.board, id)?;
        self.record(
            TaskEventType::TaskScheduled,
            id,
            None,
            Some(json!({ "group": group })),
        );
        Ok(id)
    }

    /// Share a task already on the board with another group.
    pub fn schedule_existing(&mut self, group: GroupId, task: TaskId) -> Result<(), SchedulingError> {
        let scheduler = self
            .schedulers
            .get_mut(&group)
            .ok_or(SchedulingError::UnknownGroup(group))?;
        scheduler.add_task(&mut self.board, task)?;
        self.record(
            TaskEventType::TaskScheduled,
            task,
            None,
            Some(json!({ "group": group })),
        );
        Ok(())
    }

    /// Remove `task` from `group`. A task left in no scheduler is dropped from
    /// the board and its executor, if any, is discarded.
    ///
    /// Returns the actor that was executing the dropped task.
    pub fn remove_task(
        &mut self,
        group: GroupId,
        task: TaskId,
    ) -> Result<Option<ActorId>, SchedulingError> {
        let scheduler = self
            .schedulers
            .get_mut(&group)
            .ok_or(SchedulingError::UnknownGroup(group))?;
        scheduler.remove_task(&mut self.board, task)?;
        self.record(
            TaskEventType::TaskRemoved,
            task,
            None,
            Some(json!({ "group": group })),
        );
        Ok(self.drop_if_orphaned(task))
    }

    /// Swap `original` for the new task `replacement` in `group`, keeping the
    /// original's slot. An executing original is stopped first.
    ///
    /// Returns the actor that was executing the original.
    pub fn replace_task(
        &mut self,
        group: GroupId,
        original: TaskId,
        replacement: Task,
    ) -> Result<Option<ActorId>, SchedulingError> {
        let replacement_id = replacement.id();
        let scheduler = self
            .schedulers
            .get(&group)
            .ok_or(SchedulingError::UnknownGroup(group))?;
        if !scheduler.contains_task(original) {
            return Err(SchedulingError::UnknownTask {
                task: original,
                group,
            });
        }
        if scheduler.contains_task(replacement_id) || self.board.contains(replacement_id) {
            return Err(SchedulingError::DuplicateTask {
                task: replacement_id,
                group,
            });
        }

        let stopped = self.executing_actor(original);
        if let Some(actor) = stopped {
            self.discard(actor);
        }
        self.board.insert(replacement);
        if let Some(scheduler) = self.schedulers.get_mut(&group) {
            scheduler.replace(&mut self.board, original, replacement_id)?;
        }
        self.record(
            TaskEventType::TaskReplaced,
            original,
            stopped,
            Some(json!({ "group": group, "replacement": replacement_id })),
        );
        self.drop_if_orphaned(original);
        Ok(stopped)
    }

    /// Give an idle actor the best task of its group.
    ///
    /// Returns the task the actor is now running, which is its current task if
    /// it already had one.
    pub fn assign_idle(&mut self, actor: ActorId, group: GroupId) -> Option<TaskId> {
        if let Some(running) = self.running.get(&actor) {
            return Some(running.task);
        }
        let scheduler = self.schedulers.get(&group)?;
        let task = scheduler.assign(&mut self.board, actor, |_| true)?;
        let executor = ProgramExecutor::new(self.board.get(task)?, self.max_steps_per_tick);
        self.running.insert(actor, Running { task, executor });
        info!(%actor, %group, %task, "task assigned");
        self.record(
            TaskEventType::TaskAssigned,
            task,
            Some(actor),
            Some(json!({ "group": group })),
        );
        Some(task)
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Run the actor's executor for one tick with allowance `dt`.
    pub fn run_actor<H: TaskHost + ?Sized>(&mut self, host: &mut H, actor: ActorId, dt: f64) -> TickOutcome {
        let Some(mut running) = self.running.remove(&actor) else {
            return TickOutcome::Idle;
        };
        let result = running.executor.execute(host, actor, dt);
        for value in running.executor.take_output() {
            self.record(
                TaskEventType::TaskPrinted,
                running.task,
                Some(actor),
                Some(json!({ "value": value })),
            );
        }

        match result {
            Ok(ExecutionOutcome::Suspended) => {
                let task = running.task;
                self.running.insert(actor, running);
                TickOutcome::Running(task)
            }
            Ok(ExecutionOutcome::Completed) => {
                let task = running.task;
                if let Some(entry) = self.board.get_mut(task) {
                    entry.complete();
                }
                info!(%actor, %task, "task completed");
                self.record(TaskEventType::TaskCompleted, task, Some(actor), None);
                TickOutcome::Completed(task)
            }
            Err(error) => {
                let task = running.task;
                if let Some(entry) = self.board.get_mut(task) {
                    entry.release();
                }
                warn!(%actor, %task, %error, "task failed, returning it to the scheduler");
                self.record(
                    TaskEventType::TaskFailed,
                    task,
                    Some(actor),
                    Some(json!({ "error": error.to_string() })),
                );
                TickOutcome::Failed(task, error)
            }
        }
    }

    /// Zero-allowance pass: lets a finished activity retire its leaf in the
    /// same tick without starting a new one.
    pub fn settle_actor<H: TaskHost + ?Sized>(&mut self, host: &mut H, actor: ActorId) -> TickOutcome {
        self.run_actor(host, actor, 0.0)
    }

    /// Stop the actor's task and hand it back to its schedulers. No progress
    /// is kept.
    pub fn interrupt(&mut self, actor: ActorId) -> Option<TaskId> {
        let task = self.discard(actor)?;
        self.record(TaskEventType::TaskInterrupted, task, Some(actor), None);
        Some(task)
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn current_task(&self, actor: ActorId) -> Option<TaskId> {
        self.running.get(&actor).map(|running| running.task)
    }

    pub fn executor(&self, actor: ActorId) -> Option<&ProgramExecutor> {
        self.running.get(&actor).map(|running| &running.executor)
    }

    pub fn task(&self, task: TaskId) -> Option<&Task> {
        self.board.get(task)
    }

    pub fn board(&self) -> &TaskBoard {
        &self.board
    }

    pub fn scheduler(&self, group: GroupId) -> Option<&Scheduler> {
        self.schedulers.get(&group)
    }

    pub fn events(&self) -> &[TaskEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<TaskEvent> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn executing_actor(&self, task: TaskId) -> Option<ActorId> {
        self.running
            .iter()
            .find(|(_, running)| running.task == task)
            .map(|(actor, _)| *actor)
    }

    fn discard(&mut self, actor: ActorId) -> Option<TaskId> {
        let running = self.running.remove(&actor)?;
        if let Some(task) = self.board.get_mut(running.task) {
            task.release();
        }
        debug!(%actor, task = %running.task, "executor discarded");
        Some(running.task)
    }

    fn drop_if_orphaned(&mut self, task: TaskId) -> Option<ActorId> {
        let orphaned = self
            .board
            .get(task)
            .is_some_and(|entry| entry.schedulers().is_empty());
        if !orphaned {
            return None;
        }
        let stopped = self.executing_actor(task);
        if let Some(actor) = stopped {
            self.interrupt(actor);
        }
        self.board.remove(task);
        stopped
    }

    fn record(
        &mut self,
        event_type: TaskEventType,
        task_id: TaskId,
        actor_id: Option<ActorId>,
        details: Option<JsonValue>,
    ) {
        let task_name = self
            .board
            .get(task_id)
            .map(|task| task.name().to_string())
            .unwrap_or_default();
        self.events.push(TaskEvent {
            tick: self.tick,
            sequence_in_tick: self.sequence_in_tick,
            task_id,
            task_name,
            actor_id,
            event_type,
            details,
        });
        self.sequence_in_tick = self.sequence_in_tick.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{BoolExpr, PositionExpr};
    use crate::program::{Program, ProgramBuilder};
    use crate::testing::GridWorld;
    use contracts::{Cube, Progress, TaskStatus, Value};

    const GROUP: GroupId = GroupId(1);
    const ACTOR: ActorId = ActorId(1);

    fn walk(x: i32) -> Program {
        let mut b = ProgramBuilder::new();
        let go = b.move_to(PositionExpr::at(x, 0, 0));
        b.finish(go).expect("built")
    }

    fn task(id: u64, priority: i64, program: Program) -> Task {
        Task::new(TaskId(id), format!("task-{id}"), priority, program).expect("task")
    }

    fn setup() -> (TaskRuntime, GridWorld) {
        let mut runtime = TaskRuntime::new(1_000);
        runtime.register_group(GROUP);
        let mut world = GridWorld::new([8, 8, 8]);
        world.add_actor(ACTOR, GROUP, Cube::new(0, 0, 0));
        (runtime, world)
    }

    fn event_types(runtime: &TaskRuntime) -> Vec<TaskEventType> {
        runtime.events().iter().map(|event| event.event_type).collect()
    }

    #[test]
    fn assigned_task_runs_to_completion() {
        let (mut runtime, mut world) = setup();
        runtime.add_task(GROUP, task(1, 0, walk(3))).expect("added");

        assert_eq!(runtime.assign_idle(ACTOR, GROUP), Some(TaskId(1)));
        assert_eq!(
            runtime.task(TaskId(1)).map(Task::status),
            Some(TaskStatus::AssignedTo(ACTOR))
        );
        assert_eq!(runtime.run_actor(&mut world, ACTOR, 0.1), TickOutcome::Running(TaskId(1)));

        world.finish_activity(ACTOR);
        assert_eq!(runtime.settle_actor(&mut world, ACTOR), TickOutcome::Completed(TaskId(1)));
        assert_eq!(runtime.current_task(ACTOR), None);
        assert!(runtime.task(TaskId(1)).is_some_and(Task::is_completed));
        assert_eq!(runtime.run_actor(&mut world, ACTOR, 0.1), TickOutcome::Idle);
        assert_eq!(
            event_types(&runtime),
            vec![
                TaskEventType::TaskScheduled,
                TaskEventType::TaskAssigned,
                TaskEventType::TaskCompleted
            ]
        );
    }

    #[test]
    fn interrupt_returns_the_task_without_progress() {
        let (mut runtime, mut world) = setup();
        runtime.add_task(GROUP, task(1, 0, walk(3))).expect("added");
        runtime.assign_idle(ACTOR, GROUP);
        runtime.run_actor(&mut world, ACTOR, 0.1);
        let root = runtime.task(TaskId(1)).expect("task").program().root();
        assert_eq!(runtime.executor(ACTOR).map(|e| e.progress(root)), Some(Progress::Active));

        assert_eq!(runtime.interrupt(ACTOR), Some(TaskId(1)));
        assert!(runtime.task(TaskId(1)).is_some_and(Task::is_unassigned));
        assert!(runtime.executor(ACTOR).is_none());

        runtime.assign_idle(ACTOR, GROUP);
        assert_eq!(
            runtime.executor(ACTOR).map(|e| e.progress(root)),
            Some(Progress::NotStarted)
        );
    }

    #[test]
    fn evaluation_failure_releases_the_task() {
        let (mut runtime, mut world) = setup();
        let mut b = ProgramBuilder::new();
        let go = b.move_to(PositionExpr::Log);
        runtime
            .add_task(GROUP, task(1, 0, b.finish(go).expect("built")))
            .expect("added");
        runtime.assign_idle(ACTOR, GROUP);

        let outcome = runtime.run_actor(&mut world, ACTOR, 0.1);
        assert!(matches!(outcome, TickOutcome::Failed(TaskId(1), EvaluationError::NoMatch { .. })));
        assert!(runtime.task(TaskId(1)).is_some_and(Task::is_unassigned));
        assert_eq!(runtime.current_task(ACTOR), None);
        assert_eq!(event_types(&runtime).last(), Some(&TaskEventType::TaskFailed));
    }

    #[test]
    fn prints_become_events() {
        let (mut runtime, mut world) = setup();
        let mut b = ProgramBuilder::new();
        let show = b.print(BoolExpr::Literal(true));
        runtime
            .add_task(GROUP, task(1, 0, b.finish(show).expect("built")))
            .expect("added");
        runtime.assign_idle(ACTOR, GROUP);
        runtime.run_actor(&mut world, ACTOR, 0.1);

        let printed = runtime
            .events()
            .iter()
            .find(|event| event.event_type == TaskEventType::TaskPrinted)
            .expect("print event");
        let expected = serde_json::to_value(Value::Boolean(true)).expect("json");
        assert_eq!(printed.details, Some(json!({ "value": expected })));
    }

    #[test]
    fn replacing_a_running_task_stops_its_actor() {
        let (mut runtime, mut world) = setup();
        runtime.add_task(GROUP, task(1, 0, walk(3))).expect("added");
        runtime.add_task(GROUP, task(2, 0, walk(4))).expect("added");
        runtime.assign_idle(ACTOR, GROUP);
        runtime.run_actor(&mut world, ACTOR, 0.1);

        let stopped = runtime
            .replace_task(GROUP, TaskId(1), task(3, 0, walk(5)))
            .expect("replaced");
        assert_eq!(stopped, Some(ACTOR));
        assert!(runtime.task(TaskId(1)).is_none());
        assert_eq!(
            runtime.scheduler(GROUP).map(Scheduler::task_ids),
            Some(vec![TaskId(3), TaskId(2)])
        );
        assert_eq!(runtime.assign_idle(ACTOR, GROUP), Some(TaskId(3)));
    }

    #[test]
    fn shared_task_survives_removal_from_one_group() {
        let (mut runtime, _) = setup();
        runtime.register_group(GroupId(2));
        runtime.add_task(GROUP, task(1, 0, walk(3))).expect("added");
        runtime.schedule_existing(GroupId(2), TaskId(1)).expect("shared");

        runtime.remove_task(GROUP, TaskId(1)).expect("removed");
        assert!(runtime.task(TaskId(1)).is_some());
        runtime.remove_task(GroupId(2), TaskId(1)).expect("removed");
        assert!(runtime.task(TaskId(1)).is_none());
    }

    #[test]
    fn unknown_group_is_an_error() {
        let (mut runtime, _) = setup();
        assert_eq!(
            runtime.add_task(GroupId(9), task(1, 0, walk(1))),
            Err(SchedulingError::UnknownGroup(GroupId(9)))
        );
        assert!(runtime.task(TaskId(1)).is_none());
    }
}
