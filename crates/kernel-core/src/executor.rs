//! Resumable program execution for one (actor, task) pair.
//!
//! The executor keeps an explicit call stack of frames from the root down to
//! the statement currently running. A call to `execute` resumes at the top of
//! that stack, so a program spread over many ticks never re-walks finished
//! statements. Composite and simple statements take no time; an action leaf
//! holds the rest of the tick's allowance until the actor reports that the
//! activity it started has finished.

use std::sync::Arc;

use contracts::{ActorId, Cube, Progress, Value};
use tracing::{debug, info, warn};

use crate::error::EvaluationError;
use crate::evaluate::{EvalContext, Environment};
use crate::expression::Expr;
use crate::program::{Program, Statement, StatementId};
use crate::task::Task;
use crate::view::TaskHost;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The program still has work left; call `execute` again next tick.
    Suspended,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Sequence { id: StatementId, next: usize },
    /// `entered` is set once the condition was evaluated and a branch pushed.
    If { id: StatementId, entered: bool },
    /// `in_body` caches a true condition until the body completes.
    While { id: StatementId, in_body: bool },
    Action { id: StatementId, started: bool },
    Simple { id: StatementId },
}

impl Frame {
    fn id(&self) -> StatementId {
        match self {
            Self::Sequence { id, .. }
            | Self::If { id, .. }
            | Self::While { id, .. }
            | Self::Action { id, .. }
            | Self::Simple { id } => *id,
        }
    }
}

enum Step {
    Continue,
    Yield,
}

#[derive(Debug, Clone)]
pub struct ProgramExecutor {
    program: Arc<Program>,
    selected: Option<Cube>,
    env: Environment,
    progress: Vec<Progress>,
    stack: Vec<Frame>,
    allowance: f64,
    max_steps_per_tick: u32,
    output: Vec<Value>,
    finished: bool,
}

impl ProgramExecutor {
    pub fn new(task: &Task, max_steps_per_tick: u32) -> Self {
        let program = Arc::clone(task.program());
        let progress = vec![Progress::NotStarted; program.len()];
        Self {
            program,
            selected: task.selected(),
            env: Environment::new(),
            progress,
            stack: Vec::new(),
            allowance: 0.0,
            max_steps_per_tick: max_steps_per_tick.max(1),
            output: Vec::new(),
            finished: false,
        }
    }

    /// Run the program for one tick with an allowance of `dt` seconds.
    ///
    /// Returns `Completed` once the root statement has completed; later calls
    /// keep returning `Completed` without touching the host.
    pub fn execute<H: TaskHost + ?Sized>(
        &mut self,
        host: &mut H,
        actor: ActorId,
        dt: f64,
    ) -> Result<ExecutionOutcome, EvaluationError> {
        if self.finished {
            return Ok(ExecutionOutcome::Completed);
        }
        self.allowance = dt.max(0.0);
        if self.stack.is_empty() {
            self.enter(self.program.root());
        }

        let mut steps = 0_u32;
        while let Some(frame) = self.stack.last().copied() {
            if steps >= self.max_steps_per_tick {
                warn!(
                    %actor,
                    steps,
                    statement = %frame.id(),
                    "step limit reached, suspending until next tick"
                );
                return Ok(ExecutionOutcome::Suspended);
            }
            steps += 1;
            if let Step::Yield = self.step(host, actor, frame)? {
                return Ok(ExecutionOutcome::Suspended);
            }
        }

        self.finished = true;
        Ok(ExecutionOutcome::Completed)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Statements on the call stack, root first.
    pub fn call_stack(&self) -> Vec<StatementId> {
        self.stack.iter().map(Frame::id).collect()
    }

    pub fn progress(&self, id: StatementId) -> Progress {
        self.progress.get(id.0).copied().unwrap_or_default()
    }

    pub fn variable(&self, name: &str) -> Option<Value> {
        self.env.get(name).copied()
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn remaining_allowance(&self) -> f64 {
        self.allowance
    }

    /// Values printed since the last call.
    pub fn take_output(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.output)
    }

    fn step<H: TaskHost + ?Sized>(
        &mut self,
        host: &mut H,
        actor: ActorId,
        frame: Frame,
    ) -> Result<Step, EvaluationError> {
        let program = Arc::clone(&self.program);
        let Some(statement) = program.statement(frame.id()) else {
            self.complete_top();
            return Ok(Step::Continue);
        };

        match (frame, statement) {
            (Frame::Sequence { next, .. }, Statement::Sequence(children)) => {
                match children.get(next) {
                    Some(child) => {
                        self.replace_top(Frame::Sequence {
                            id: frame.id(),
                            next: next + 1,
                        });
                        self.enter(*child);
                    }
                    None => self.complete_top(),
                }
            }
            (
                Frame::If { entered: false, id },
                Statement::If {
                    condition,
                    then_branch,
                    else_branch,
                },
            ) => {
                let branch = if self.condition(&*host, actor, condition)? {
                    Some(*then_branch)
                } else {
                    *else_branch
                };
                match branch {
                    Some(branch) => {
                        self.replace_top(Frame::If { id, entered: true });
                        self.enter(branch);
                    }
                    None => self.complete_top(),
                }
            }
            (Frame::If { entered: true, .. }, _) => self.complete_top(),
            (Frame::While { in_body: false, id }, Statement::While { condition, body }) => {
                if self.condition(&*host, actor, condition)? {
                    for nested in program.subtree(*body) {
                        self.set_progress(nested, Progress::NotStarted);
                    }
                    self.replace_top(Frame::While { id, in_body: true });
                    self.enter(*body);
                } else {
                    self.complete_top();
                }
            }
            (Frame::While { in_body: true, id }, _) => {
                self.replace_top(Frame::While { id, in_body: false });
            }
            (Frame::Action { started: false, id }, _) => {
                if self.allowance <= 0.0 {
                    return Ok(Step::Yield);
                }
                self.start_action(host, actor, id, statement)?;
                self.set_progress(id, Progress::Active);
                self.replace_top(Frame::Action { id, started: true });
                self.allowance = 0.0;
                return Ok(Step::Yield);
            }
            (Frame::Action { started: true, .. }, _) => {
                if !host.is_activity_finished(actor) {
                    self.allowance = 0.0;
                    return Ok(Step::Yield);
                }
                self.complete_top();
            }
            (Frame::Simple { .. }, Statement::Assign { variable, value }) => {
                let value = self.context(&*host, actor).evaluate(value)?;
                self.env.insert(variable.clone(), value);
                self.complete_top();
            }
            (Frame::Simple { .. }, Statement::Print(expr)) => {
                let value = self.context(&*host, actor).evaluate(expr)?;
                info!(%actor, %value, "task print");
                self.output.push(value);
                self.complete_top();
            }
            (Frame::Simple { .. }, Statement::Break) => self.unwind_break(),
            _ => self.complete_top(),
        }
        Ok(Step::Continue)
    }

    fn start_action<H: TaskHost + ?Sized>(
        &self,
        host: &mut H,
        actor: ActorId,
        id: StatementId,
        statement: &Statement,
    ) -> Result<(), EvaluationError> {
        let ctx = self.context(&*host, actor);
        match statement {
            Statement::MoveTo(target) => {
                let cube = ctx.position(target)?;
                debug!(%actor, statement = %id, target = %cube, "start move");
                host.start_move_to(actor, cube);
            }
            Statement::Work(target) => {
                let cube = ctx.position(target)?;
                debug!(%actor, statement = %id, target = %cube, "start work");
                host.start_work(actor, cube);
            }
            Statement::Follow(target) => {
                let other = ctx.actor(target)?;
                debug!(%actor, statement = %id, target = %other, "start follow");
                host.start_follow(actor, other);
            }
            Statement::Attack(target) => {
                let other = ctx.actor(target)?;
                debug!(%actor, statement = %id, target = %other, "start attack");
                host.start_attack(actor, other);
            }
            _ => {}
        }
        Ok(())
    }

    fn context<'a, H: TaskHost + ?Sized>(&'a self, host: &'a H, actor: ActorId) -> EvalContext<'a, H> {
        EvalContext::new(host, actor, &self.env, self.selected)
    }

    fn condition<H: TaskHost + ?Sized>(
        &self,
        host: &H,
        actor: ActorId,
        condition: &Expr,
    ) -> Result<bool, EvaluationError> {
        let value = self.context(host, actor).evaluate(condition)?;
        Ok(value == Value::Boolean(true))
    }

    fn enter(&mut self, id: StatementId) {
        let frame = match self.program.statement(id) {
            Some(Statement::Sequence(_)) => Frame::Sequence { id, next: 0 },
            Some(Statement::If { .. }) => Frame::If { id, entered: false },
            Some(Statement::While { .. }) => Frame::While { id, in_body: false },
            Some(statement) if statement.is_action() => Frame::Action { id, started: false },
            _ => Frame::Simple { id },
        };
        // An action leaf stays NotStarted until its request is issued.
        if !matches!(frame, Frame::Action { .. }) {
            self.set_progress(id, Progress::Active);
        }
        self.stack.push(frame);
    }

    fn replace_top(&mut self, frame: Frame) {
        if let Some(top) = self.stack.last_mut() {
            *top = frame;
        }
    }

    fn complete_top(&mut self) {
        if let Some(frame) = self.stack.pop() {
            self.set_progress(frame.id(), Progress::Completed);
        }
    }

    /// Pop frames up to and including the nearest enclosing `While`.
    ///
    /// The call stack mirrors the chain of enclosing statements, so the
    /// nearest `While` frame is the nearest lexically enclosing loop.
    fn unwind_break(&mut self) {
        while let Some(frame) = self.stack.pop() {
            self.set_progress(frame.id(), Progress::Completed);
            if let Frame::While { .. } = frame {
                return;
            }
        }
        debug_assert!(false, "break outside of a while loop passed formation checks");
    }

    fn set_progress(&mut self, id: StatementId, progress: Progress) {
        if let Some(slot) = self.progress.get_mut(id.0) {
            *slot = progress;
        }
    }
}
