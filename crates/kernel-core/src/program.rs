//! Statement trees stored in an arena.
//!
//! Every statement records the arena index of its lexically enclosing
//! statement. The index is assigned once, when the enclosing statement is
//! built, and never changes afterwards. Per-run progress is not stored here;
//! it belongs to the executor running the program.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FormationError;
use crate::expression::{ActorExpr, Expr, PositionExpr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatementId(pub usize);

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "statement#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Sequence(Vec<StatementId>),
    If {
        condition: Expr,
        then_branch: StatementId,
        else_branch: Option<StatementId>,
    },
    While {
        condition: Expr,
        body: StatementId,
    },
    Assign {
        variable: String,
        value: Expr,
    },
    Break,
    MoveTo(PositionExpr),
    Work(PositionExpr),
    Follow(ActorExpr),
    Attack(ActorExpr),
    Print(Expr),
    NoOp,
}

impl Statement {
    /// Direct children in execution order.
    pub fn children(&self) -> Vec<StatementId> {
        match self {
            Self::Sequence(children) => children.clone(),
            Self::If {
                then_branch,
                else_branch,
                ..
            } => std::iter::once(*then_branch).chain(*else_branch).collect(),
            Self::While { body, .. } => vec![*body],
            _ => Vec::new(),
        }
    }

    /// Leaves whose work is carried out by the actor over several ticks.
    pub fn is_action(&self) -> bool {
        matches!(
            self,
            Self::MoveTo(_) | Self::Work(_) | Self::Follow(_) | Self::Attack(_)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Sequence(_) => "sequence",
            Self::If { .. } => "if",
            Self::While { .. } => "while",
            Self::Assign { .. } => "assign",
            Self::Break => "break",
            Self::MoveTo(_) => "move_to",
            Self::Work(_) => "work",
            Self::Follow(_) => "follow",
            Self::Attack(_) => "attack",
            Self::Print(_) => "print",
            Self::NoOp => "no_op",
        }
    }

    fn uses_selected(&self) -> bool {
        match self {
            Self::If { condition, .. } | Self::While { condition, .. } => {
                condition.uses_selected()
            }
            Self::Assign { value, .. } | Self::Print(value) => value.uses_selected(),
            Self::MoveTo(position) | Self::Work(position) => position.uses_selected(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    parent: Option<StatementId>,
    statement: Statement,
}

/// An immutable statement tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    nodes: Vec<Node>,
    root: StatementId,
}

impl Program {
    pub fn root(&self) -> StatementId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn statement(&self, id: StatementId) -> Option<&Statement> {
        self.nodes.get(id.0).map(|node| &node.statement)
    }

    /// Lexically enclosing statement; `None` for the root.
    pub fn parent(&self, id: StatementId) -> Option<StatementId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    /// Enclosing statements from the direct parent up to the root.
    pub fn ancestors(&self, id: StatementId) -> impl Iterator<Item = StatementId> + '_ {
        std::iter::successors(self.parent(id), move |current| self.parent(*current))
    }

    /// `id` and everything nested inside it, in pre-order.
    pub fn subtree(&self, id: StatementId) -> Vec<StatementId> {
        let mut out = Vec::new();
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            out.push(current);
            if let Some(statement) = self.statement(current) {
                pending.extend(statement.children().into_iter().rev());
            }
        }
        out
    }

    /// True when any expression in the tree reads the task's selected cube.
    pub fn uses_selected(&self) -> bool {
        self.subtree(self.root).into_iter().any(|id| {
            self.statement(id)
                .map(Statement::uses_selected)
                .unwrap_or(false)
        })
    }
}

// ---------------------------------------------------------------------------
// ProgramBuilder
// ---------------------------------------------------------------------------

/// Bottom-up builder: children are created first and handed to the statement
/// that encloses them, which fixes their parent index.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    nodes: Vec<Node>,
    defect: Option<FormationError>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sequence(&mut self, children: Vec<StatementId>) -> StatementId {
        self.push_composite(Statement::Sequence(children))
    }

    pub fn if_then(
        &mut self,
        condition: impl Into<Expr>,
        then_branch: StatementId,
        else_branch: Option<StatementId>,
    ) -> StatementId {
        self.push_composite(Statement::If {
            condition: condition.into(),
            then_branch,
            else_branch,
        })
    }

    pub fn while_loop(&mut self, condition: impl Into<Expr>, body: StatementId) -> StatementId {
        self.push_composite(Statement::While {
            condition: condition.into(),
            body,
        })
    }

    pub fn assign(&mut self, variable: impl Into<String>, value: impl Into<Expr>) -> StatementId {
        self.push(Statement::Assign {
            variable: variable.into(),
            value: value.into(),
        })
    }

    pub fn break_loop(&mut self) -> StatementId {
        self.push(Statement::Break)
    }

    pub fn move_to(&mut self, target: PositionExpr) -> StatementId {
        self.push(Statement::MoveTo(target))
    }

    pub fn work(&mut self, target: PositionExpr) -> StatementId {
        self.push(Statement::Work(target))
    }

    pub fn follow(&mut self, target: ActorExpr) -> StatementId {
        self.push(Statement::Follow(target))
    }

    pub fn attack(&mut self, target: ActorExpr) -> StatementId {
        self.push(Statement::Attack(target))
    }

    pub fn print(&mut self, value: impl Into<Expr>) -> StatementId {
        self.push(Statement::Print(value.into()))
    }

    pub fn no_op(&mut self) -> StatementId {
        self.push(Statement::NoOp)
    }

    /// Seal the tree under `root`.
    ///
    /// Fails when a statement was handed to two parents, when an id does not
    /// come from this builder, or when `root` is itself nested somewhere.
    pub fn finish(self, root: StatementId) -> Result<Program, FormationError> {
        if let Some(defect) = self.defect {
            return Err(defect);
        }
        let Some(node) = self.nodes.get(root.0) else {
            return Err(FormationError::UnknownStatement(root));
        };
        if node.parent.is_some() {
            return Err(FormationError::SharedStatement(root));
        }
        Ok(Program {
            nodes: self.nodes,
            root,
        })
    }

    fn push(&mut self, statement: Statement) -> StatementId {
        let id = StatementId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            statement,
        });
        id
    }

    fn push_composite(&mut self, statement: Statement) -> StatementId {
        let children = statement.children();
        let id = self.push(statement);
        for child in children {
            self.adopt(id, child);
        }
        id
    }

    fn adopt(&mut self, parent: StatementId, child: StatementId) {
        if self.defect.is_some() {
            return;
        }
        match self.nodes.get_mut(child.0) {
            None => self.defect = Some(FormationError::UnknownStatement(child)),
            Some(node) if child == parent || node.parent.is_some() => {
                self.defect = Some(FormationError::SharedStatement(child))
            }
            Some(node) => node.parent = Some(parent),
        }
    }
}
