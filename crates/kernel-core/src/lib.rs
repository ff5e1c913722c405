//! Task scripting kernel: expression evaluation, a resumable statement
//! executor, per-group task schedulers and a sandbox world that drives them
//! tick by tick.

pub mod error;
pub mod evaluate;
pub mod executor;
pub mod expression;
pub mod formation;
pub mod program;
pub mod runtime;
pub mod scan;
pub mod scheduler;
pub mod script;
pub mod task;
pub mod view;
pub mod world;

#[cfg(test)]
mod testing;

pub use error::{EvaluationError, FormationError, SchedulingError, WorldError};
pub use evaluate::{evaluate, EvalContext, Environment};
pub use executor::{ExecutionOutcome, ProgramExecutor};
pub use expression::{ActorExpr, BoolExpr, Expr, PositionExpr};
pub use program::{Program, ProgramBuilder, Statement, StatementId};
pub use runtime::{TaskRuntime, TickOutcome};
pub use scheduler::Scheduler;
pub use script::{ActorSpec, Scenario, ScriptNode, TaskSpec, TerrainPatch};
pub use task::{Task, TaskBoard, TaskFactory};
pub use view::{ActorCapabilities, TaskHost, WorldQuery};
pub use world::{Activity, ActorState, SandboxWorld, StepMetrics, WorldState};
