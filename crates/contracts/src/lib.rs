//! v1 cross-boundary contracts for the task scripting kernel, its sandbox world and the CLI.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub const SCHEMA_VERSION_V1: &str = "1.0";

// ---------------------------------------------------------------------------
// Cubes
// ---------------------------------------------------------------------------

/// Integer world coordinate of a single cube.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub struct Cube {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Cube {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Largest per-axis distance; the number of steps between two cubes when
    /// diagonal moves are allowed.
    pub fn chebyshev_distance(&self, other: &Cube) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        let dz = self.z.abs_diff(other.z);
        dx.max(dy).max(dz)
    }

    /// True when `other` is the same cube or one of its 26 neighbours.
    pub fn is_adjacent_to(&self, other: &Cube) -> bool {
        self.chebyshev_distance(other) <= 1
    }

    /// The 26 neighbouring cubes, ordered by dx, then dy, then dz (each -1..=1).
    pub fn neighbours(&self) -> impl Iterator<Item = Cube> + '_ {
        (-1..=1).flat_map(move |dx| {
            (-1..=1).flat_map(move |dy| {
                (-1..=1).filter_map(move |dz| {
                    if dx == 0 && dy == 0 && dz == 0 {
                        None
                    } else {
                        Some(Cube::new(self.x + dx, self.y + dy, self.z + dz))
                    }
                })
            })
        })
    }

    /// One Chebyshev step from `self` towards `target`.
    pub fn step_towards(&self, target: &Cube) -> Cube {
        Cube::new(
            self.x + (target.x - self.x).signum(),
            self.y + (target.y - self.y).signum(),
            self.z + (target.z - self.z).signum(),
        )
    }
}

impl fmt::Display for Cube {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(transparent)]
pub struct ActorId(pub u64);

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(transparent)]
pub struct GroupId(pub u64);

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor:{}", self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group:{}", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Script values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Boolean,
    Position,
    Actor,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Boolean => "boolean",
            Self::Position => "position",
            Self::Actor => "actor",
        };
        f.write_str(label)
    }
}

/// Result of evaluating a script expression.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Boolean(bool),
    Position(Cube),
    Actor(ActorId),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Position(_) => ValueKind::Position,
            Self::Actor(_) => ValueKind::Actor,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Position(cube) => write!(f, "{cube}"),
            Self::Actor(actor) => write!(f, "{actor}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Execution and assignment state
// ---------------------------------------------------------------------------

/// Progress of one statement instance inside a running program.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Progress {
    #[default]
    NotStarted,
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "state", content = "actor", rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Unassigned,
    AssignedTo(ActorId),
    Completed,
}

impl TaskStatus {
    pub fn assignee(&self) -> Option<ActorId> {
        match self {
            Self::AssignedTo(actor) => Some(*actor),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// World vocabulary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    #[default]
    Air,
    Rock,
    Tree,
    Workshop,
}

impl Terrain {
    pub fn is_solid(&self) -> bool {
        matches!(self, Self::Rock | Self::Tree)
    }
}

/// Loose item lying on a cube or carried by an actor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Item {
    Log,
    Boulder,
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Log => f.write_str("log"),
            Self::Boulder => f.write_str("boulder"),
        }
    }
}

/// Predicate tested against each cube by the nearest-match scan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanTarget {
    Log,
    Boulder,
    Workshop,
    AnyActor,
    FactionMate,
    NonFactionMate,
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Log => "log",
            Self::Boulder => "boulder",
            Self::Workshop => "workshop",
            Self::AnyActor => "any actor",
            Self::FactionMate => "faction mate",
            Self::NonFactionMate => "non-faction mate",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Durations used by the sandbox world for the four action leaves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ActivityTimings {
    pub move_seconds_per_cube: f64,
    pub work_seconds: f64,
    pub attack_seconds: f64,
}

impl Default for ActivityTimings {
    fn default() -> Self {
        Self {
            move_seconds_per_cube: 0.5,
            work_seconds: 2.0,
            attack_seconds: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub schema_version: String,
    /// Extent of the world along x, y and z; valid cubes are `0..size`.
    pub world_size: [u32; 3],
    /// Dispatch steps a single `execute` call may take before suspending.
    pub max_steps_per_tick: u32,
    pub timings: ActivityTimings,
}

impl EngineConfig {
    pub fn contains(&self, cube: &Cube) -> bool {
        let [sx, sy, sz] = self.world_size;
        in_extent(cube.x, sx) && in_extent(cube.y, sy) && in_extent(cube.z, sz)
    }
}

fn in_extent(coordinate: i32, extent: u32) -> bool {
    coordinate >= 0 && (coordinate as i64) < i64::from(extent)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            world_size: [16, 16, 16],
            max_steps_per_tick: 10_000,
            timings: ActivityTimings::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Task events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskEventType {
    TaskScheduled,
    TaskAssigned,
    TaskCompleted,
    TaskFailed,
    TaskInterrupted,
    TaskReplaced,
    TaskRemoved,
    TaskPrinted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskEvent {
    pub tick: u64,
    pub sequence_in_tick: u64,
    pub task_id: TaskId,
    pub task_name: String,
    pub actor_id: Option<ActorId>,
    pub event_type: TaskEventType,
    pub details: Option<JsonValue>,
}

impl fmt::Display for TaskEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick={} seq={} {:?} {} ({})",
            self.tick, self.sequence_in_tick, self.event_type, self.task_id, self.task_name
        )?;
        if let Some(actor) = self.actor_id {
            write!(f, " by {actor}")?;
        }
        if let Some(details) = &self.details {
            write!(f, " {details}")?;
        }
        Ok(())
    }
}
