//! Solver abstraction.
//!
//! Defines the `Solver` trait the analysis drives. The trait follows the
//! SMT-LIB push/pop model: implementations keep an assertion stack that
//! `push`/`pop` save and restore, and support minimizing or maximizing a
//! single variable under the current assertions.
//!
//! [`IntervalSolver`] is the bundled backend. It decides every constraint
//! that mentions exactly one variable, which covers everything the
//! constraint encoder produces.

mod interval;

use std::fmt::{self, Display};

use thiserror::Error;

pub use interval::{IntervalSet, IntervalSolver};

// ============================================================================
// Variables and Sorts
// ============================================================================

/// Handle to a variable declared in a solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(usize);

impl VarId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the declaration index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Value domain of a declared variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sort {
    /// Signed 64-bit integer.
    Int,
    /// Unsigned fixed-width integer, `0..=2^width - 1`.
    BitVec(u8),
}

impl Sort {
    /// Widest supported bit-vector.
    pub const MAX_BITVEC_WIDTH: u8 = 62;

    /// Inclusive value range of the sort.
    pub fn range(self) -> (i64, i64) {
        match self {
            Self::Int => (i64::MIN, i64::MAX),
            Self::BitVec(width) => (0, (1_i64 << width) - 1),
        }
    }

    /// Number of values in the sort, for bit-vectors.
    pub fn cardinality(self) -> Option<u64> {
        match self {
            Self::Int => None,
            Self::BitVec(width) => Some(1_u64 << width),
        }
    }
}

impl Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "Int"),
            Self::BitVec(width) => write!(f, "BitVec({width})"),
        }
    }
}

// ============================================================================
// Constraints
// ============================================================================

/// Comparison operator between a variable and a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
        };
        write!(f, "{symbol}")
    }
}

/// A boolean constraint over declared variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// `var op value`
    Compare { var: VarId, op: CmpOp, value: i64 },
    Not(Box<Constraint>),
    /// All sub-constraints hold. Empty is true.
    And(Vec<Constraint>),
    /// At least one sub-constraint holds. Empty is false.
    Or(Vec<Constraint>),
}

impl Constraint {
    pub fn compare(var: VarId, op: CmpOp, value: i64) -> Self {
        Self::Compare { var, op, value }
    }

    pub fn gt(var: VarId, value: i64) -> Self {
        Self::compare(var, CmpOp::Gt, value)
    }

    pub fn lt(var: VarId, value: i64) -> Self {
        Self::compare(var, CmpOp::Lt, value)
    }

    pub fn eq(var: VarId, value: i64) -> Self {
        Self::compare(var, CmpOp::Eq, value)
    }

    pub fn ne(var: VarId, value: i64) -> Self {
        Self::compare(var, CmpOp::Ne, value)
    }

    /// `var == v1 || var == v2 || ...`
    pub fn any_of(var: VarId, values: impl IntoIterator<Item = i64>) -> Self {
        Self::Or(values.into_iter().map(|v| Self::eq(var, v)).collect())
    }

    /// Distinct variables mentioned by the constraint, in ascending order.
    pub fn variables(&self) -> Vec<VarId> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars.sort_unstable();
        vars.dedup();
        vars
    }

    fn collect_variables(&self, out: &mut Vec<VarId>) {
        match self {
            Self::Compare { var, .. } => out.push(*var),
            Self::Not(inner) => inner.collect_variables(out),
            Self::And(parts) | Self::Or(parts) => {
                for part in parts {
                    part.collect_variables(out);
                }
            }
        }
    }

    /// Rewrites variable handles through `ids`, where a handle's index
    /// selects its replacement.
    pub fn remap(&self, ids: &[VarId]) -> Result<Self, SolverError> {
        Ok(match self {
            Self::Compare { var, op, value } => Self::Compare {
                var: *ids
                    .get(var.index())
                    .ok_or(SolverError::UnknownVariable(*var))?,
                op: *op,
                value: *value,
            },
            Self::Not(inner) => Self::Not(Box::new(inner.remap(ids)?)),
            Self::And(parts) => Self::And(
                parts
                    .iter()
                    .map(|p| p.remap(ids))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Or(parts) => Self::Or(
                parts
                    .iter()
                    .map(|p| p.remap(ids))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare { var, op, value } => write!(f, "{var} {op} {value}"),
            Self::Not(inner) => write!(f, "!({inner})"),
            Self::And(parts) => write_joined(f, parts, " && ", "true"),
            Self::Or(parts) => write_joined(f, parts, " || ", "false"),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    parts: &[Constraint],
    separator: &str,
    empty: &str,
) -> fmt::Result {
    if parts.is_empty() {
        return write!(f, "{empty}");
    }
    write!(f, "(")?;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            write!(f, "{separator}")?;
        }
        write!(f, "{part}")?;
    }
    write!(f, ")")
}

// ============================================================================
// Results
// ============================================================================

/// Result of a satisfiability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatResult {
    /// The asserted constraints have at least one satisfying assignment.
    Sat,
    /// The asserted constraints are unsatisfiable.
    Unsat,
    /// The solver could not determine satisfiability.
    Unknown,
}

/// A satisfying assignment, indexed by variable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    values: Vec<i64>,
}

impl Model {
    pub fn new(values: Vec<i64>) -> Self {
        Self { values }
    }

    /// Value assigned to `var`, if the variable exists.
    pub fn get(&self, var: VarId) -> Option<i64> {
        self.values.get(var.index()).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Optimal value of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    Finite(i64),
    /// The variable can grow (or shrink) without limit.
    Unbounded,
}

// ============================================================================
// Errors
// ============================================================================

/// Failure of the solving capability itself (as opposed to an UNSAT answer).
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("Unknown variable {0}")]
    UnknownVariable(VarId),

    #[error("Invalid sort: {0}")]
    InvalidSort(String),

    #[error("Unsupported constraint: {0}")]
    Unsupported(String),

    #[error("No model available: the last check was not satisfiable")]
    NoModel,

    #[error("Checkpoint stack is empty")]
    EmptyCheckpointStack,

    #[error("Satisfiability could not be decided")]
    Undecided,

    #[error("Enumeration exceeded its bound of {limit} values")]
    EnumerationLimit { limit: usize },

    #[error("Solver backend failure: {0}")]
    Backend(String),
}

// ============================================================================
// Solver Trait
// ============================================================================

/// Abstract solver interface.
///
/// Declarations and assertions made after a `push` are discarded by the
/// matching `pop`.
pub trait Solver {
    /// Declare a fresh variable.
    fn declare(&mut self, name: &str, sort: Sort) -> Result<VarId, SolverError>;
    /// Assert a constraint in the current scope.
    fn assert_constraint(&mut self, constraint: &Constraint) -> Result<(), SolverError>;
    /// Check satisfiability of all asserted constraints.
    fn check(&mut self) -> Result<SatResult, SolverError>;
    /// Return a satisfying assignment. Only valid after a `Sat` check.
    fn model(&self) -> Result<Model, SolverError>;
    /// Least feasible value of `var`, or `None` if the assertions are unsatisfiable.
    fn minimize(&mut self, var: VarId) -> Result<Option<Objective>, SolverError>;
    /// Greatest feasible value of `var`, or `None` if the assertions are unsatisfiable.
    fn maximize(&mut self, var: VarId) -> Result<Option<Objective>, SolverError>;
    /// Push a new assertion scope.
    fn push(&mut self);
    /// Pop the most recent assertion scope.
    fn pop(&mut self) -> Result<(), SolverError>;
}

/// Produces a fresh, empty solver for every conflict group.
pub trait SolverFactory {
    type Solver: Solver;

    fn create(&self) -> Self::Solver;
}

impl<S, F> SolverFactory for F
where
    S: Solver,
    F: Fn() -> S,
{
    type Solver = S;

    fn create(&self) -> S {
        self()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_ranges() {
        assert_eq!(Sort::BitVec(16).range(), (0, 65_535));
        assert_eq!(Sort::BitVec(16).cardinality(), Some(65_536));
        assert_eq!(Sort::Int.range(), (i64::MIN, i64::MAX));
        assert_eq!(Sort::Int.cardinality(), None);
    }

    #[test]
    fn variables_are_deduplicated() {
        let a = VarId::new(3);
        let b = VarId::new(1);
        let c = Constraint::And(vec![
            Constraint::gt(a, 0),
            Constraint::Not(Box::new(Constraint::any_of(b, [1, 2]))),
            Constraint::lt(a, 9),
        ]);
        assert_eq!(c.variables(), vec![b, a]);
    }

    #[test]
    fn remap_rewrites_every_handle() {
        let c = Constraint::Or(vec![Constraint::eq(VarId::new(0), 1), Constraint::ne(VarId::new(1), 2)]);
        let remapped = c.remap(&[VarId::new(10), VarId::new(11)]).unwrap();
        assert_eq!(remapped.variables(), vec![VarId::new(10), VarId::new(11)]);

        let err = Constraint::gt(VarId::new(5), 0).remap(&[VarId::new(0)]);
        assert!(matches!(err, Err(SolverError::UnknownVariable(_))));
    }

    #[test]
    fn display_is_readable() {
        let c = Constraint::And(vec![
            Constraint::gt(VarId::new(0), -200),
            Constraint::any_of(VarId::new(1), [1, 2]),
        ]);
        assert_eq!(c.to_string(), "(v0 > -200 && (v1 == 1 || v1 == 2))");
        assert_eq!(Constraint::Or(vec![]).to_string(), "false");
    }

    #[test]
    fn model_lookup() {
        let model = Model::new(vec![4, 9]);
        assert_eq!(model.get(VarId::new(1)), Some(9));
        assert_eq!(model.get(VarId::new(2)), None);
        assert_eq!(model.len(), 2);
    }
}
