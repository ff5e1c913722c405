//! Expression evaluation.
//!
//! Evaluation is pure: it reads the world through `WorldQuery` and the task
//! environment, never mutates either, and always finishes within the call.

use std::collections::BTreeMap;

use contracts::{ActorId, Cube, ScanTarget, Value, ValueKind};

use crate::error::EvaluationError;
use crate::expression::{ActorExpr, BoolExpr, Expr, PositionExpr};
use crate::scan::nearest_match;
use crate::view::WorldQuery;

/// Task-scoped variable bindings.
pub type Environment = BTreeMap<String, Value>;

/// Everything an expression may observe: the world, the executing actor, the
/// task's variables and the cube the task was created for.
pub struct EvalContext<'a, W: WorldQuery + ?Sized> {
    pub world: &'a W,
    pub actor: ActorId,
    pub env: &'a Environment,
    pub selected: Option<Cube>,
}

impl<'a, W: WorldQuery + ?Sized> EvalContext<'a, W> {
    pub fn new(world: &'a W, actor: ActorId, env: &'a Environment, selected: Option<Cube>) -> Self {
        Self {
            world,
            actor,
            env,
            selected,
        }
    }

    pub fn evaluate(&self, expr: &Expr) -> Result<Value, EvaluationError> {
        match expr {
            Expr::Bool(inner) => self.boolean(inner).map(Value::Boolean),
            Expr::Position(inner) => self.position(inner).map(Value::Position),
            Expr::Actor(inner) => self.actor(inner).map(Value::Actor),
        }
    }

    pub fn boolean(&self, expr: &BoolExpr) -> Result<bool, EvaluationError> {
        match expr {
            BoolExpr::Literal(value) => Ok(*value),
            BoolExpr::Not(inner) => Ok(!self.boolean(inner)?),
            BoolExpr::And(left, right) => Ok(self.boolean(left)? && self.boolean(right)?),
            BoolExpr::Or(left, right) => Ok(self.boolean(left)? || self.boolean(right)?),
            BoolExpr::IsSolid(position) => Ok(self.world.is_solid(self.position(position)?)),
            BoolExpr::IsPassable(position) => {
                Ok(self.world.is_passable(self.position(position)?))
            }
            BoolExpr::IsFriend(other) => {
                let other = self.actor(other)?;
                Ok(self.group_of(self.actor)? == self.group_of(other)?)
            }
            BoolExpr::IsEnemy(other) => {
                let other = self.actor(other)?;
                Ok(self.group_of(self.actor)? != self.group_of(other)?)
            }
            BoolExpr::IsAlive(other) => {
                let other = self.actor(other)?;
                Ok(self.world.is_alive(other))
            }
            BoolExpr::CarriesItem(other) => {
                let other = self.actor(other)?;
                if !self.world.is_alive(other) {
                    return Err(EvaluationError::UnknownActor(other));
                }
                Ok(self.world.is_carrying(other))
            }
            BoolExpr::Variable(name) => match self.read(name, ValueKind::Boolean)? {
                Value::Boolean(value) => Ok(value),
                other => Err(self.kind_mismatch(name, ValueKind::Boolean, other)),
            },
        }
    }

    pub fn position(&self, expr: &PositionExpr) -> Result<Cube, EvaluationError> {
        match expr {
            PositionExpr::Literal(cube) => Ok(*cube),
            PositionExpr::Here => self.here(),
            PositionExpr::Selected => self.selected.ok_or(EvaluationError::NoSelection),
            PositionExpr::Log => self.scan_cube(ScanTarget::Log),
            PositionExpr::Boulder => self.scan_cube(ScanTarget::Boulder),
            PositionExpr::Workshop => self.scan_cube(ScanTarget::Workshop),
            PositionExpr::NextTo(inner) => {
                let centre = self.position(inner)?;
                let found = centre
                    .neighbours()
                    .find(|cube| self.world.is_passable(*cube));
                found.ok_or(EvaluationError::NoAdjacentCube(centre))
            }
            PositionExpr::PositionOf(actor) => {
                let actor = self.actor(actor)?;
                self.world
                    .actor_position(actor)
                    .ok_or(EvaluationError::UnknownActor(actor))
            }
            PositionExpr::Variable(name) => match self.read(name, ValueKind::Position)? {
                Value::Position(cube) => Ok(cube),
                other => Err(self.kind_mismatch(name, ValueKind::Position, other)),
            },
        }
    }

    pub fn actor(&self, expr: &ActorExpr) -> Result<ActorId, EvaluationError> {
        match expr {
            ActorExpr::This => Ok(self.actor),
            ActorExpr::Any => self.scan_actor(ScanTarget::AnyActor),
            ActorExpr::Friend => self.scan_actor(ScanTarget::FactionMate),
            ActorExpr::Enemy => self.scan_actor(ScanTarget::NonFactionMate),
            ActorExpr::Variable(name) => match self.read(name, ValueKind::Actor)? {
                Value::Actor(actor) => Ok(actor),
                other => Err(self.kind_mismatch(name, ValueKind::Actor, other)),
            },
        }
    }

    fn here(&self) -> Result<Cube, EvaluationError> {
        self.world
            .actor_position(self.actor)
            .ok_or(EvaluationError::UnknownActor(self.actor))
    }

    fn group_of(&self, actor: ActorId) -> Result<contracts::GroupId, EvaluationError> {
        self.world
            .actor_group(actor)
            .ok_or(EvaluationError::UnknownActor(actor))
    }

    fn read(&self, name: &str, expected: ValueKind) -> Result<Value, EvaluationError> {
        let value = self
            .env
            .get(name)
            .copied()
            .ok_or_else(|| EvaluationError::UnboundVariable(name.to_string()))?;
        if value.kind() != expected {
            return Err(self.kind_mismatch(name, expected, value));
        }
        Ok(value)
    }

    fn kind_mismatch(&self, name: &str, expected: ValueKind, found: Value) -> EvaluationError {
        EvaluationError::VariableKind {
            name: name.to_string(),
            expected,
            found: found.kind(),
        }
    }

    fn scan_cube(&self, target: ScanTarget) -> Result<Cube, EvaluationError> {
        let origin = self.here()?;
        nearest_match(self.world, origin, |cube| self.cube_matches(target, cube))
            .ok_or(EvaluationError::NoMatch { target, origin })
    }

    fn scan_actor(&self, target: ScanTarget) -> Result<ActorId, EvaluationError> {
        let origin = self.here()?;
        let cube = nearest_match(self.world, origin, |cube| self.cube_matches(target, cube))
            .ok_or(EvaluationError::NoMatch { target, origin })?;
        self.candidates_at(target, cube)
            .next()
            .ok_or(EvaluationError::NoMatch { target, origin })
    }

    fn cube_matches(&self, target: ScanTarget, cube: Cube) -> bool {
        match target {
            ScanTarget::Log => self.world.has_log(cube),
            ScanTarget::Boulder => self.world.has_boulder(cube),
            ScanTarget::Workshop => self.world.is_workshop(cube),
            ScanTarget::AnyActor | ScanTarget::FactionMate | ScanTarget::NonFactionMate => {
                self.candidates_at(target, cube).next().is_some()
            }
        }
    }

    /// Other living actors at `cube` that satisfy an actor scan target.
    fn candidates_at(&self, target: ScanTarget, cube: Cube) -> impl Iterator<Item = ActorId> + '_ {
        let own_group = self.world.actor_group(self.actor);
        self.world
            .actors_at(cube)
            .into_iter()
            .filter(move |other| *other != self.actor && self.world.is_alive(*other))
            .filter(move |other| {
                let group = self.world.actor_group(*other);
                match target {
                    ScanTarget::FactionMate => own_group.is_some() && group == own_group,
                    ScanTarget::NonFactionMate => group != own_group,
                    _ => true,
                }
            })
    }
}

/// Evaluate `expr` on behalf of `actor`.
pub fn evaluate<W: WorldQuery + ?Sized>(
    expr: &Expr,
    world: &W,
    actor: ActorId,
    env: &Environment,
    selected: Option<Cube>,
) -> Result<Value, EvaluationError> {
    EvalContext::new(world, actor, env, selected).evaluate(expr)
}
