//! Per-group solver context.

use crate::encoder::{ConstraintSet, VariableSpec};
use crate::solver::{Solver, SolverError, VarId};

/// A solver loaded with one conflict group's constraint set.
///
/// Owns its solver exclusively. Dropping the context drops every variable
/// and constraint of the group.
#[derive(Debug)]
pub struct SolverContext<S> {
    solver: S,
    variables: Vec<(VariableSpec, VarId)>,
}

impl<S: Solver> SolverContext<S> {
    /// Declares every variable of `set` in `solver` and asserts its
    /// constraints.
    pub fn build(mut solver: S, set: &ConstraintSet) -> Result<Self, SolverError> {
        let mut variables = Vec::with_capacity(set.variables().len());
        for spec in set.variables() {
            let id = solver.declare(&spec.name, spec.sort)?;
            variables.push((spec.clone(), id));
        }

        let ids: Vec<VarId> = variables.iter().map(|(_, id)| *id).collect();
        for constraint in set.constraints() {
            solver.assert_constraint(&constraint.remap(&ids)?)?;
        }

        Ok(Self { solver, variables })
    }

    /// Declared variables with their solver handles, in declaration order.
    pub fn variables(&self) -> &[(VariableSpec, VarId)] {
        &self.variables
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut S {
        &mut self.solver
    }
}
