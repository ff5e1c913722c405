//! Expression nodes of the task language.
//!
//! Expressions are split by the kind of value they produce. Each category is a
//! closed enum, so the evaluator can match exhaustively and a condition's kind
//! is known without evaluating it.

use contracts::{Cube, ScanTarget, ValueKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoolExpr {
    Literal(bool),
    Not(Box<BoolExpr>),
    And(Box<BoolExpr>, Box<BoolExpr>),
    Or(Box<BoolExpr>, Box<BoolExpr>),
    IsSolid(PositionExpr),
    IsPassable(PositionExpr),
    IsFriend(ActorExpr),
    IsEnemy(ActorExpr),
    IsAlive(ActorExpr),
    CarriesItem(ActorExpr),
    Variable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionExpr {
    Literal(Cube),
    /// Cube of the executing actor.
    Here,
    /// Target cube the task was created for.
    Selected,
    Log,
    Boulder,
    Workshop,
    NextTo(Box<PositionExpr>),
    PositionOf(Box<ActorExpr>),
    Variable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorExpr {
    /// The executing actor.
    This,
    Friend,
    Enemy,
    Any,
    Variable(String),
}

/// Expression of any kind, as accepted by assignments, prints and conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Bool(BoolExpr),
    Position(PositionExpr),
    Actor(ActorExpr),
}

impl Expr {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Boolean,
            Self::Position(_) => ValueKind::Position,
            Self::Actor(_) => ValueKind::Actor,
        }
    }

    pub fn uses_selected(&self) -> bool {
        match self {
            Self::Bool(expr) => expr.uses_selected(),
            Self::Position(expr) => expr.uses_selected(),
            Self::Actor(_) => false,
        }
    }
}

impl BoolExpr {
    pub fn not(inner: BoolExpr) -> Self {
        Self::Not(Box::new(inner))
    }

    pub fn and(left: BoolExpr, right: BoolExpr) -> Self {
        Self::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: BoolExpr, right: BoolExpr) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    pub fn uses_selected(&self) -> bool {
        match self {
            Self::Literal(_) | Self::Variable(_) => false,
            Self::Not(inner) => inner.uses_selected(),
            Self::And(left, right) | Self::Or(left, right) => {
                left.uses_selected() || right.uses_selected()
            }
            Self::IsSolid(position) | Self::IsPassable(position) => position.uses_selected(),
            Self::IsFriend(_) | Self::IsEnemy(_) | Self::IsAlive(_) | Self::CarriesItem(_) => false,
        }
    }
}

impl PositionExpr {
    pub fn at(x: i32, y: i32, z: i32) -> Self {
        Self::Literal(Cube::new(x, y, z))
    }

    pub fn next_to(inner: PositionExpr) -> Self {
        Self::NextTo(Box::new(inner))
    }

    pub fn position_of(actor: ActorExpr) -> Self {
        Self::PositionOf(Box::new(actor))
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// Scan predicate behind the nearest-match variants.
    pub fn scan_target(&self) -> Option<ScanTarget> {
        match self {
            Self::Log => Some(ScanTarget::Log),
            Self::Boulder => Some(ScanTarget::Boulder),
            Self::Workshop => Some(ScanTarget::Workshop),
            _ => None,
        }
    }

    pub fn uses_selected(&self) -> bool {
        match self {
            Self::Selected => true,
            Self::NextTo(inner) => inner.uses_selected(),
            _ => false,
        }
    }
}

impl ActorExpr {
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    pub fn scan_target(&self) -> Option<ScanTarget> {
        match self {
            Self::Any => Some(ScanTarget::AnyActor),
            Self::Friend => Some(ScanTarget::FactionMate),
            Self::Enemy => Some(ScanTarget::NonFactionMate),
            Self::This | Self::Variable(_) => None,
        }
    }
}

impl From<BoolExpr> for Expr {
    fn from(value: BoolExpr) -> Self {
        Self::Bool(value)
    }
}

impl From<PositionExpr> for Expr {
    fn from(value: PositionExpr) -> Self {
        Self::Position(value)
    }
}

impl From<ActorExpr> for Expr {
    fn from(value: ActorExpr) -> Self {
        Self::Actor(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_static() {
        assert_eq!(Expr::from(BoolExpr::Literal(true)).kind(), ValueKind::Boolean);
        assert_eq!(Expr::from(PositionExpr::Here).kind(), ValueKind::Position);
        assert_eq!(Expr::from(ActorExpr::variable("x")).kind(), ValueKind::Actor);
    }

    #[test]
    fn selected_is_found_through_nesting() {
        let nested = BoolExpr::and(
            BoolExpr::Literal(true),
            BoolExpr::IsPassable(PositionExpr::next_to(PositionExpr::Selected)),
        );
        assert!(nested.uses_selected());
        assert!(!BoolExpr::IsPassable(PositionExpr::Here).uses_selected());
    }

    #[test]
    fn deserializes_external_tags() {
        let parsed: Expr = serde_json::from_str(
            r#"{"bool":{"and":[{"literal":true},{"is_passable":{"literal":{"x":1,"y":2,"z":3}}}]}}"#,
        )
        .expect("expression json");
        assert_eq!(
            parsed,
            Expr::Bool(BoolExpr::and(
                BoolExpr::Literal(true),
                BoolExpr::IsPassable(PositionExpr::at(1, 2, 3)),
            ))
        );
        let here: PositionExpr = serde_json::from_str(r#""here""#).expect("unit variant");
        assert_eq!(here, PositionExpr::Here);
    }
}
