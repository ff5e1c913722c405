//! Per-group task scheduler.
//!
//! A `Scheduler` holds an ordered list of task ids for one group. Tasks
//! themselves live on the shared `TaskBoard`, so the same task can sit in the
//! schedulers of several groups while its assignment state stays in one
//! place.

use contracts::{ActorId, GroupId, TaskId};

use crate::error::SchedulingError;
use crate::task::{Task, TaskBoard};

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// Ordering key of one member task.
/// Ordering: (priority DESC, sequence ASC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    task: TaskId,
    priority: i64,
    sequence: u64,
}

impl Entry {
    fn precedes(&self, other: &Entry) -> bool {
        self.priority > other.priority
            || (self.priority == other.priority && self.sequence < other.sequence)
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Scheduler {
    group: GroupId,
    /// Kept sorted so iteration never has to re-sort.
    entries: Vec<Entry>,
    next_sequence: u64,
}

impl Scheduler {
    pub fn new(group: GroupId) -> Self {
        Self {
            group,
            entries: Vec::new(),
            next_sequence: 0,
        }
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    /// Add a task that is already on `board`.
    pub fn add_task(&mut self, board: &mut TaskBoard, task: TaskId) -> Result<(), SchedulingError> {
        if self.contains_task(task) {
            return Err(SchedulingError::DuplicateTask {
                task,
                group: self.group,
            });
        }
        let Some(member) = board.get_mut(task) else {
            return Err(self.unknown(task));
        };
        member.join(self.group);
        let entry = Entry {
            task,
            priority: member.priority(),
            sequence: self.next_sequence,
        };
        self.next_sequence = self.next_sequence.saturating_add(1);
        self.insert_sorted(entry);
        Ok(())
    }

    /// Drop `task` from this scheduler. The task stays on the board.
    pub fn remove_task(
        &mut self,
        board: &mut TaskBoard,
        task: TaskId,
    ) -> Result<(), SchedulingError> {
        let index = self.position(task).ok_or_else(|| self.unknown(task))?;
        self.entries.remove(index);
        if let Some(member) = board.get_mut(task) {
            member.leave(self.group);
        }
        Ok(())
    }

    /// Put `replacement` in the slot `original` occupied.
    ///
    /// The replacement inherits the original's ordering key. On error the
    /// scheduler and the board are left untouched.
    pub fn replace(
        &mut self,
        board: &mut TaskBoard,
        original: TaskId,
        replacement: TaskId,
    ) -> Result<(), SchedulingError> {
        let index = self.position(original).ok_or_else(|| self.unknown(original))?;
        if self.contains_task(replacement) {
            return Err(SchedulingError::DuplicateTask {
                task: replacement,
                group: self.group,
            });
        }
        if !board.contains(replacement) {
            return Err(self.unknown(replacement));
        }

        self.entries[index].task = replacement;
        if let Some(member) = board.get_mut(original) {
            member.leave(self.group);
        }
        if let Some(member) = board.get_mut(replacement) {
            member.join(self.group);
        }
        Ok(())
    }

    pub fn contains_task(&self, task: TaskId) -> bool {
        self.position(task).is_some()
    }

    pub fn contains_tasks(&self, tasks: &[TaskId]) -> bool {
        tasks.iter().all(|task| self.contains_task(*task))
    }

    /// Every member in iteration order, completed ones included.
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.entries.iter().map(|entry| entry.task).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Non-completed members, highest priority first, ties in insertion
    /// order. Status is read from `board` as the iterator advances.
    pub fn tasks_by_descending_priority<'a>(
        &'a self,
        board: &'a TaskBoard,
    ) -> impl Iterator<Item = &'a Task> + 'a {
        self.entries
            .iter()
            .filter_map(move |entry| board.get(entry.task))
            .filter(|task| !task.is_completed())
    }

    /// Hand the first unassigned member accepted by `eligible` to `actor`.
    pub fn assign<F>(&self, board: &mut TaskBoard, actor: ActorId, mut eligible: F) -> Option<TaskId>
    where
        F: FnMut(&Task) -> bool,
    {
        let chosen = self
            .tasks_by_descending_priority(board)
            .find(|task| task.is_unassigned() && eligible(task))
            .map(Task::id)?;
        board.get_mut(chosen)?.assign_to(actor);
        Some(chosen)
    }

    fn position(&self, task: TaskId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.task == task)
    }

    fn insert_sorted(&mut self, entry: Entry) {
        let index = self
            .entries
            .iter()
            .position(|existing| entry.precedes(existing))
            .unwrap_or(self.entries.len());
        self.entries.insert(index, entry);
    }

    fn unknown(&self, task: TaskId) -> SchedulingError {
        SchedulingError::UnknownTask {
            task,
            group: self.group,
        }
    }
}
