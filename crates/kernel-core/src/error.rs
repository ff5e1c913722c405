//! Error taxonomy for task construction, evaluation and scheduling.

use contracts::{ActorId, Cube, GroupId, ScanTarget, TaskId, ValueKind};
use thiserror::Error;

use crate::program::StatementId;

/// Static defect in a program; the task is rejected before it can be scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormationError {
    #[error("break {0} is not enclosed by a while loop")]
    UnboundBreak(StatementId),
    #[error("sequence {0} has no statements")]
    EmptySequence(StatementId),
    #[error("condition of {statement} must be boolean, found {found}")]
    IllTypedCondition {
        statement: StatementId,
        found: ValueKind,
    },
    #[error("statement {0} is attached to more than one parent")]
    SharedStatement(StatementId),
    #[error("statement {0} does not belong to this program")]
    UnknownStatement(StatementId),
    #[error("program reads the selected cube but no target cubes were given")]
    MissingSelection,
}

/// Runtime failure while evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("variable `{0}` is not bound")]
    UnboundVariable(String),
    #[error("variable `{name}` holds a {found} value, expected {expected}")]
    VariableKind {
        name: String,
        expected: ValueKind,
        found: ValueKind,
    },
    #[error("no cube with a {target} reachable from {origin}")]
    NoMatch { target: ScanTarget, origin: Cube },
    #[error("{0} is not present in the world")]
    UnknownActor(ActorId),
    #[error("task has no selected cube")]
    NoSelection,
    #[error("no passable cube next to {0}")]
    NoAdjacentCube(Cube),
}

/// Invalid scheduler operation; nothing was mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulingError {
    #[error("{task} is not scheduled in {group}")]
    UnknownTask { task: TaskId, group: GroupId },
    #[error("{task} is already scheduled in {group}")]
    DuplicateTask { task: TaskId, group: GroupId },
    #[error("{0} has no scheduler")]
    UnknownGroup(GroupId),
}

/// Sandbox world setup and command failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    #[error("{0} lies outside the world")]
    OutOfBounds(Cube),
    #[error("{0} does not exist")]
    UnknownGroup(GroupId),
    #[error("{0} does not exist")]
    UnknownActor(ActorId),
    #[error("{0} already exists")]
    DuplicateActor(ActorId),
    #[error("task `{0}` names no group to schedule it in")]
    NoGroups(String),
    #[error(transparent)]
    Formation(#[from] FormationError),
    #[error(transparent)]
    Scheduling(#[from] SchedulingError),
}
