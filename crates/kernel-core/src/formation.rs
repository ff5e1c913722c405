//! Static well-formedness checks, run once before a task can be scheduled.

use contracts::ValueKind;

use crate::error::FormationError;
use crate::program::{Program, Statement};

/// Check every statement reachable from the root.
///
/// - a `Break` must have a `While` among its enclosing statements;
/// - a `Sequence` must have at least one child;
/// - `If` and `While` conditions must be boolean.
pub fn check(program: &Program) -> Result<(), FormationError> {
    for id in program.subtree(program.root()) {
        let statement = program
            .statement(id)
            .ok_or(FormationError::UnknownStatement(id))?;
        match statement {
            Statement::Break => {
                let enclosed = program
                    .ancestors(id)
                    .any(|ancestor| matches!(program.statement(ancestor), Some(Statement::While { .. })));
                if !enclosed {
                    return Err(FormationError::UnboundBreak(id));
                }
            }
            Statement::Sequence(children) if children.is_empty() => {
                return Err(FormationError::EmptySequence(id));
            }
            Statement::If { condition, .. } | Statement::While { condition, .. } => {
                let found = condition.kind();
                if found != ValueKind::Boolean {
                    return Err(FormationError::IllTypedCondition {
                        statement: id,
                        found,
                    });
                }
            }
            _ => {}
        }
    }
    Ok(())
}
