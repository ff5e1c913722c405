//! Serde documents for programs and sandbox scenarios.
//!
//! A `ScriptNode` is the nested, JSON-friendly form of a statement tree. It is
//! lowered into the arena form through `ProgramBuilder`, so every document
//! goes through the same parent bookkeeping and formation checks as programs
//! built in code.

use contracts::{ActorId, Cube, EngineConfig, GroupId, Item, Terrain};
use serde::{Deserialize, Serialize};

use crate::error::FormationError;
use crate::expression::{ActorExpr, Expr, PositionExpr};
use crate::program::{Program, ProgramBuilder, StatementId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptNode {
    Sequence {
        body: Vec<ScriptNode>,
    },
    If {
        condition: Expr,
        then: Box<ScriptNode>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        otherwise: Option<Box<ScriptNode>>,
    },
    While {
        condition: Expr,
        body: Box<ScriptNode>,
    },
    Assign {
        variable: String,
        value: Expr,
    },
    Break,
    MoveTo {
        target: PositionExpr,
    },
    Work {
        target: PositionExpr,
    },
    Follow {
        target: ActorExpr,
    },
    Attack {
        target: ActorExpr,
    },
    Print {
        value: Expr,
    },
    NoOp,
}

impl ScriptNode {
    /// Lower the document into a sealed program.
    ///
    /// Only structural checks run here; `formation::check` runs when the
    /// program is turned into a task.
    pub fn build(&self) -> Result<Program, FormationError> {
        let mut builder = ProgramBuilder::new();
        let root = self.lower(&mut builder);
        builder.finish(root)
    }

    fn lower(&self, b: &mut ProgramBuilder) -> StatementId {
        match self {
            Self::Sequence { body } => {
                let children = body.iter().map(|node| node.lower(b)).collect();
                b.sequence(children)
            }
            Self::If {
                condition,
                then,
                otherwise,
            } => {
                let then_branch = then.lower(b);
                let else_branch = otherwise.as_ref().map(|node| node.lower(b));
                b.if_then(condition.clone(), then_branch, else_branch)
            }
            Self::While { condition, body } => {
                let body = body.lower(b);
                b.while_loop(condition.clone(), body)
            }
            Self::Assign { variable, value } => b.assign(variable.clone(), value.clone()),
            Self::Break => b.break_loop(),
            Self::MoveTo { target } => b.move_to(target.clone()),
            Self::Work { target } => b.work(target.clone()),
            Self::Follow { target } => b.follow(target.clone()),
            Self::Attack { target } => b.attack(target.clone()),
            Self::Print { value } => b.print(value.clone()),
            Self::NoOp => b.no_op(),
        }
    }
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainPatch {
    pub cube: Cube,
    pub terrain: Terrain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorSpec {
    pub id: ActorId,
    pub group: GroupId,
    pub position: Cube,
    #[serde(default)]
    pub carrying: Option<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    /// Groups whose schedulers receive the task; the first one creates it.
    pub groups: Vec<GroupId>,
    #[serde(default)]
    pub priority: i64,
    /// Target cubes for programs that read the selected cube.
    #[serde(default)]
    pub targets: Vec<Cube>,
    pub program: ScriptNode,
}

/// Everything needed to set up a sandbox run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: EngineConfig,
    #[serde(default)]
    pub terrain: Vec<TerrainPatch>,
    #[serde(default)]
    pub logs: Vec<Cube>,
    #[serde(default)]
    pub boulders: Vec<Cube>,
    #[serde(default)]
    pub groups: Vec<GroupId>,
    #[serde(default)]
    pub actors: Vec<ActorSpec>,
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default = "default_ticks")]
    pub ticks: u64,
}

fn default_dt() -> f64 {
    0.1
}

fn default_ticks() -> u64 {
    50
}

impl Scenario {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
