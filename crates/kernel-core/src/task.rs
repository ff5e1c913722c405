//! Tasks: named, prioritized programs plus their assignment bookkeeping.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use contracts::{ActorId, Cube, GroupId, TaskId, TaskStatus};

use crate::error::FormationError;
use crate::formation;
use crate::program::Program;

#[derive(Debug, Clone)]
pub struct Task {
    id: TaskId,
    name: String,
    /// Higher is more urgent.
    priority: i64,
    program: Arc<Program>,
    selected: Option<Cube>,
    status: TaskStatus,
    schedulers: BTreeSet<GroupId>,
}

impl Task {
    /// Build a task for a program that does not read the selected cube.
    pub fn new(
        id: TaskId,
        name: impl Into<String>,
        priority: i64,
        program: Program,
    ) -> Result<Self, FormationError> {
        formation::check(&program)?;
        if program.uses_selected() {
            return Err(FormationError::MissingSelection);
        }
        Ok(Self::checked(id, name.into(), priority, Arc::new(program), None))
    }

    /// Build a task bound to one target cube.
    pub fn with_selection(
        id: TaskId,
        name: impl Into<String>,
        priority: i64,
        program: Program,
        selected: Cube,
    ) -> Result<Self, FormationError> {
        formation::check(&program)?;
        Ok(Self::checked(
            id,
            name.into(),
            priority,
            Arc::new(program),
            Some(selected),
        ))
    }

    fn checked(
        id: TaskId,
        name: String,
        priority: i64,
        program: Arc<Program>,
        selected: Option<Cube>,
    ) -> Self {
        Self {
            id,
            name,
            priority,
            program,
            selected,
            status: TaskStatus::Unassigned,
            schedulers: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    pub fn selected(&self) -> Option<Cube> {
        self.selected
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn is_unassigned(&self) -> bool {
        self.status == TaskStatus::Unassigned
    }

    pub fn assignee(&self) -> Option<ActorId> {
        self.status.assignee()
    }

    /// Groups whose schedulers hold this task.
    pub fn schedulers(&self) -> &BTreeSet<GroupId> {
        &self.schedulers
    }

    pub(crate) fn assign_to(&mut self, actor: ActorId) {
        self.status = TaskStatus::AssignedTo(actor);
    }

    pub(crate) fn release(&mut self) {
        if !self.is_completed() {
            self.status = TaskStatus::Unassigned;
        }
    }

    pub(crate) fn complete(&mut self) {
        self.status = TaskStatus::Completed;
    }

    pub(crate) fn join(&mut self, group: GroupId) {
        self.schedulers.insert(group);
    }

    pub(crate) fn leave(&mut self, group: GroupId) {
        self.schedulers.remove(&group);
    }
}

// ---------------------------------------------------------------------------
// TaskFactory
// ---------------------------------------------------------------------------

/// Turns built programs into tasks with fresh ids.
#[derive(Debug, Clone)]
pub struct TaskFactory {
    next_id: u64,
}

impl Default for TaskFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskFactory {
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    pub fn starting_at(first_id: u64) -> Self {
        Self { next_id: first_id }
    }

    /// One task per target cube when the program reads the selected cube,
    /// otherwise a single task and `targets` is ignored.
    ///
    /// The program is checked once; all produced tasks share it.
    pub fn create_tasks(
        &mut self,
        name: &str,
        priority: i64,
        program: Program,
        targets: &[Cube],
    ) -> Result<Vec<Task>, FormationError> {
        formation::check(&program)?;
        let program = Arc::new(program);

        if !program.uses_selected() {
            let id = self.allocate();
            return Ok(vec![Task::checked(
                id,
                name.to_string(),
                priority,
                program,
                None,
            )]);
        }

        if targets.is_empty() {
            return Err(FormationError::MissingSelection);
        }

        Ok(targets
            .iter()
            .map(|cube| {
                let id = self.allocate();
                Task::checked(
                    id,
                    name.to_string(),
                    priority,
                    Arc::clone(&program),
                    Some(*cube),
                )
            })
            .collect())
    }

    /// Never hand out `id` or anything below it again.
    pub fn reserve_through(&mut self, id: TaskId) {
        self.next_id = self.next_id.max(id.0.saturating_add(1));
    }

    pub(crate) fn allocate(&mut self) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        id
    }
}

// ---------------------------------------------------------------------------
// TaskBoard
// ---------------------------------------------------------------------------

/// Registry of every task known to the schedulers of a world.
#[derive(Debug, Clone, Default)]
pub struct TaskBoard {
    tasks: BTreeMap<TaskId, Task>,
}

impl TaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, task: Task) {
        self.tasks.insert(task.id(), task);
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(&id)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    pub(crate) fn remove(&mut self, id: TaskId) -> Option<Task> {
        self.tasks.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
