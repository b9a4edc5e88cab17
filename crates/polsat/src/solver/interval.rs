//! Exact interval solver for single-variable constraints.
//!
//! Every variable's feasible set is tracked as a sorted list of disjoint,
//! non-adjacent inclusive intervals, starting at the full range of its
//! sort. Asserting a constraint intersects the set of the one variable it
//! mentions with the values that satisfy it. A conjunction of such
//! constraints is satisfiable iff no feasible set is empty, so `check`,
//! `model` and optimization are all exact.
//!
//! Constraints that relate two or more variables are rejected with
//! [`SolverError::Unsupported`].

use tracing::trace;

use super::{CmpOp, Constraint, Model, Objective, SatResult, Solver, SolverError, Sort, VarId};

// ============================================================================
// Interval Set
// ============================================================================

/// A set of integers stored as disjoint, non-adjacent inclusive intervals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalSet {
    intervals: Vec<(i64, i64)>,
}

impl IntervalSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// All integers in `lo..=hi`. Empty if `lo > hi`.
    pub fn range(lo: i64, hi: i64) -> Self {
        if lo > hi {
            Self::empty()
        } else {
            Self {
                intervals: vec![(lo, hi)],
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn min(&self) -> Option<i64> {
        self.intervals.first().map(|(lo, _)| *lo)
    }

    pub fn max(&self) -> Option<i64> {
        self.intervals.last().map(|(_, hi)| *hi)
    }

    pub fn contains(&self, value: i64) -> bool {
        self.intervals
            .iter()
            .any(|(lo, hi)| *lo <= value && value <= *hi)
    }

    /// Number of integers in the set.
    pub fn count(&self) -> u128 {
        self.intervals
            .iter()
            .map(|(lo, hi)| (i128::from(*hi) - i128::from(*lo) + 1) as u128)
            .sum()
    }

    pub fn intervals(&self) -> &[(i64, i64)] {
        &self.intervals
    }

    pub fn intersect(&self, other: &IntervalSet) -> IntervalSet {
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.intervals.len() && j < other.intervals.len() {
            let (a_lo, a_hi) = self.intervals[i];
            let (b_lo, b_hi) = other.intervals[j];
            let lo = a_lo.max(b_lo);
            let hi = a_hi.min(b_hi);
            if lo <= hi {
                out.push((lo, hi));
            }
            if a_hi < b_hi {
                i += 1;
            } else {
                j += 1;
            }
        }
        IntervalSet { intervals: out }
    }

    pub fn union(&self, other: &IntervalSet) -> IntervalSet {
        let mut all: Vec<(i64, i64)> = self
            .intervals
            .iter()
            .chain(other.intervals.iter())
            .copied()
            .collect();
        all.sort_unstable();

        let mut out: Vec<(i64, i64)> = Vec::with_capacity(all.len());
        for (lo, hi) in all {
            match out.last_mut() {
                // Overlapping or adjacent: merge
                Some((_, last_hi)) if i128::from(lo) <= i128::from(*last_hi) + 1 => {
                    *last_hi = (*last_hi).max(hi);
                }
                _ => out.push((lo, hi)),
            }
        }
        IntervalSet { intervals: out }
    }

    /// Values of `lo..=hi` that are not in the set.
    pub fn complement_within(&self, lo: i64, hi: i64) -> IntervalSet {
        let mut out = Vec::new();
        let mut cursor = i128::from(lo);
        let end = i128::from(hi);
        for (a, b) in self.intervals.iter().map(|(a, b)| (i128::from(*a), i128::from(*b))) {
            if b < cursor {
                continue;
            }
            if a > end {
                break;
            }
            if a > cursor {
                out.push((cursor as i64, (a - 1) as i64));
            }
            cursor = b + 1;
        }
        if cursor <= end {
            out.push((cursor as i64, end as i64));
        }
        IntervalSet { intervals: out }
    }

    /// Removes a single value.
    pub fn remove(&self, value: i64) -> IntervalSet {
        let mut out = Vec::with_capacity(self.intervals.len() + 1);
        for &(lo, hi) in &self.intervals {
            if value < lo || value > hi {
                out.push((lo, hi));
                continue;
            }
            if lo < value {
                out.push((lo, value - 1));
            }
            if value < hi {
                out.push((value + 1, hi));
            }
        }
        IntervalSet { intervals: out }
    }
}

/// Values of `lo..=hi` satisfying `x op value`.
fn comparison_set(op: CmpOp, value: i64, lo: i64, hi: i64) -> IntervalSet {
    let full = IntervalSet::range(lo, hi);
    let v = i128::from(value);
    let (a, b) = match op {
        CmpOp::Gt => (v + 1, i128::from(hi)),
        CmpOp::Ge => (v, i128::from(hi)),
        CmpOp::Lt => (i128::from(lo), v - 1),
        CmpOp::Le => (i128::from(lo), v),
        CmpOp::Eq => (v, v),
        CmpOp::Ne => return full.remove(value),
    };
    let a = a.max(i128::from(lo));
    let b = b.min(i128::from(hi));
    if a > b {
        IntervalSet::empty()
    } else {
        // Both endpoints were clamped into an i64 range
        IntervalSet::range(a as i64, b as i64)
    }
}

/// Values of `lo..=hi` satisfying a constraint that mentions one variable.
fn feasible_set(constraint: &Constraint, lo: i64, hi: i64) -> IntervalSet {
    match constraint {
        Constraint::Compare { op, value, .. } => comparison_set(*op, *value, lo, hi),
        Constraint::Not(inner) => feasible_set(inner, lo, hi).complement_within(lo, hi),
        Constraint::And(parts) => parts
            .iter()
            .fold(IntervalSet::range(lo, hi), |acc, part| {
                acc.intersect(&feasible_set(part, lo, hi))
            }),
        Constraint::Or(parts) => parts.iter().fold(IntervalSet::empty(), |acc, part| {
            acc.union(&feasible_set(part, lo, hi))
        }),
    }
}

/// Truth value of a constraint that mentions no variable.
fn constant_value(constraint: &Constraint) -> bool {
    match constraint {
        // Unreachable for variable-free constraints
        Constraint::Compare { .. } => true,
        Constraint::Not(inner) => !constant_value(inner),
        Constraint::And(parts) => parts.iter().all(constant_value),
        Constraint::Or(parts) => parts.iter().any(constant_value),
    }
}

// ============================================================================
// Interval Solver
// ============================================================================

#[derive(Debug, Clone)]
struct Checkpoint {
    declared: usize,
    domains: Vec<IntervalSet>,
    contradiction: bool,
    assertions: usize,
}

/// Solver over per-variable interval sets.
#[derive(Debug, Default)]
pub struct IntervalSolver {
    names: Vec<String>,
    sorts: Vec<Sort>,
    domains: Vec<IntervalSet>,
    /// A variable-free constraint evaluated to false.
    contradiction: bool,
    assertions: usize,
    checkpoints: Vec<Checkpoint>,
    last_check: Option<SatResult>,
}

impl IntervalSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current feasible set of a variable.
    pub fn domain(&self, var: VarId) -> Option<&IntervalSet> {
        self.domains.get(var.index())
    }

    /// Name a variable was declared with.
    pub fn name(&self, var: VarId) -> Option<&str> {
        self.names.get(var.index()).map(String::as_str)
    }

    /// Number of constraints asserted in all open scopes.
    pub fn assertion_count(&self) -> usize {
        self.assertions
    }

    fn is_feasible(&self) -> bool {
        !self.contradiction && self.domains.iter().all(|d| !d.is_empty())
    }

    fn checked(&self, var: VarId) -> Result<usize, SolverError> {
        let index = var.index();
        if index < self.domains.len() {
            Ok(index)
        } else {
            Err(SolverError::UnknownVariable(var))
        }
    }
}

impl Solver for IntervalSolver {
    fn declare(&mut self, name: &str, sort: Sort) -> Result<VarId, SolverError> {
        if let Sort::BitVec(width) = sort {
            if width == 0 || width > Sort::MAX_BITVEC_WIDTH {
                return Err(SolverError::InvalidSort(format!(
                    "bit-vector width {width} outside 1..={}",
                    Sort::MAX_BITVEC_WIDTH
                )));
            }
        }
        let (lo, hi) = sort.range();
        let id = VarId::new(self.domains.len());
        self.names.push(name.to_string());
        self.sorts.push(sort);
        self.domains.push(IntervalSet::range(lo, hi));
        self.last_check = None;
        Ok(id)
    }

    fn assert_constraint(&mut self, constraint: &Constraint) -> Result<(), SolverError> {
        let vars = constraint.variables();
        match vars.as_slice() {
            [] => {
                if !constant_value(constraint) {
                    self.contradiction = true;
                }
            }
            [var] => {
                let index = self.checked(*var)?;
                let (lo, hi) = self.sorts[index].range();
                let allowed = feasible_set(constraint, lo, hi);
                self.domains[index] = self.domains[index].intersect(&allowed);
                trace!(
                    var = %self.names[index],
                    constraint = %constraint,
                    remaining = %self.domains[index].count(),
                    "Asserted constraint"
                );
            }
            _ => {
                return Err(SolverError::Unsupported(format!(
                    "constraint relates {} variables: {constraint}",
                    vars.len()
                )));
            }
        }
        self.assertions += 1;
        self.last_check = None;
        Ok(())
    }

    fn check(&mut self) -> Result<SatResult, SolverError> {
        let result = if self.is_feasible() {
            SatResult::Sat
        } else {
            SatResult::Unsat
        };
        self.last_check = Some(result);
        Ok(result)
    }

    fn model(&self) -> Result<Model, SolverError> {
        if self.last_check != Some(SatResult::Sat) {
            return Err(SolverError::NoModel);
        }
        let values = self
            .domains
            .iter()
            .map(|d| d.min().ok_or(SolverError::NoModel))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Model::new(values))
    }

    fn minimize(&mut self, var: VarId) -> Result<Option<Objective>, SolverError> {
        let index = self.checked(var)?;
        if !self.is_feasible() {
            return Ok(None);
        }
        let (lo, _) = self.sorts[index].range();
        Ok(self.domains[index].min().map(|min| {
            if self.sorts[index] == Sort::Int && min == lo {
                Objective::Unbounded
            } else {
                Objective::Finite(min)
            }
        }))
    }

    fn maximize(&mut self, var: VarId) -> Result<Option<Objective>, SolverError> {
        let index = self.checked(var)?;
        if !self.is_feasible() {
            return Ok(None);
        }
        let (_, hi) = self.sorts[index].range();
        Ok(self.domains[index].max().map(|max| {
            if self.sorts[index] == Sort::Int && max == hi {
                Objective::Unbounded
            } else {
                Objective::Finite(max)
            }
        }))
    }

    fn push(&mut self) {
        self.checkpoints.push(Checkpoint {
            declared: self.domains.len(),
            domains: self.domains.clone(),
            contradiction: self.contradiction,
            assertions: self.assertions,
        });
    }

    fn pop(&mut self) -> Result<(), SolverError> {
        let checkpoint = self
            .checkpoints
            .pop()
            .ok_or(SolverError::EmptyCheckpointStack)?;
        self.names.truncate(checkpoint.declared);
        self.sorts.truncate(checkpoint.declared);
        self.domains = checkpoint.domains;
        self.contradiction = checkpoint.contradiction;
        self.assertions = checkpoint.assertions;
        self.last_check = None;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn int_var(solver: &mut IntervalSolver) -> VarId {
        solver.declare("x", Sort::Int).unwrap()
    }

    #[test]
    fn empty_solver_is_sat() {
        let mut solver = IntervalSolver::new();
        assert_eq!(solver.check().unwrap(), SatResult::Sat);
        assert!(solver.model().unwrap().is_empty());
    }

    #[test]
    fn strict_bounds_exclude_endpoints() {
        let mut solver = IntervalSolver::new();
        let x = int_var(&mut solver);
        solver.assert_constraint(&Constraint::gt(x, -200)).unwrap();
        solver.assert_constraint(&Constraint::lt(x, 200)).unwrap();
        solver.assert_constraint(&Constraint::gt(x, -199)).unwrap();
        solver.assert_constraint(&Constraint::lt(x, 199)).unwrap();

        assert_eq!(solver.check().unwrap(), SatResult::Sat);
        assert_eq!(solver.minimize(x).unwrap(), Some(Objective::Finite(-198)));
        assert_eq!(solver.maximize(x).unwrap(), Some(Objective::Finite(198)));
    }

    #[test]
    fn disjoint_ranges_are_unsat() {
        let mut solver = IntervalSolver::new();
        let x = int_var(&mut solver);
        for c in [
            Constraint::gt(x, 0),
            Constraint::lt(x, 10),
            Constraint::gt(x, 20),
            Constraint::lt(x, 30),
        ] {
            solver.assert_constraint(&c).unwrap();
        }
        assert_eq!(solver.check().unwrap(), SatResult::Unsat);
        assert_eq!(solver.minimize(x).unwrap(), None);
        assert!(matches!(solver.model(), Err(SolverError::NoModel)));
    }

    #[test]
    fn adjacent_strict_bounds_are_unsat() {
        // 4 < x < 5 has no integer solution
        let mut solver = IntervalSolver::new();
        let x = int_var(&mut solver);
        solver.assert_constraint(&Constraint::gt(x, 4)).unwrap();
        solver.assert_constraint(&Constraint::lt(x, 5)).unwrap();
        assert_eq!(solver.check().unwrap(), SatResult::Unsat);
    }

    #[test]
    fn one_sided_int_is_unbounded() {
        let mut solver = IntervalSolver::new();
        let t = int_var(&mut solver);
        solver.assert_constraint(&Constraint::gt(t, 1_000)).unwrap();
        assert_eq!(solver.minimize(t).unwrap(), Some(Objective::Finite(1_001)));
        assert_eq!(solver.maximize(t).unwrap(), Some(Objective::Unbounded));
    }

    #[test]
    fn bitvec_extremes_are_finite() {
        let mut solver = IntervalSolver::new();
        let u = solver.declare("users_1", Sort::BitVec(16)).unwrap();
        assert_eq!(solver.minimize(u).unwrap(), Some(Objective::Finite(0)));
        assert_eq!(solver.maximize(u).unwrap(), Some(Objective::Finite(65_535)));
    }

    #[test]
    fn membership_disjunctions_intersect() {
        let mut solver = IntervalSolver::new();
        let u = solver.declare("users_1", Sort::BitVec(16)).unwrap();
        solver.assert_constraint(&Constraint::any_of(u, [1, 2, 3])).unwrap();
        solver.assert_constraint(&Constraint::any_of(u, [2, 3, 4])).unwrap();

        assert_eq!(solver.check().unwrap(), SatResult::Sat);
        assert_eq!(solver.domain(u).unwrap().intervals(), &[(2, 3)]);
        assert_eq!(solver.model().unwrap().get(u), Some(2));
    }

    #[test]
    fn bitvec_values_outside_domain_never_match() {
        let mut solver = IntervalSolver::new();
        let u = solver.declare("users_1", Sort::BitVec(16)).unwrap();
        solver.assert_constraint(&Constraint::eq(u, 70_000)).unwrap();
        assert_eq!(solver.check().unwrap(), SatResult::Unsat);
    }

    #[test]
    fn push_pop_restores_assertions_and_declarations() {
        let mut solver = IntervalSolver::new();
        let x = int_var(&mut solver);
        solver.assert_constraint(&Constraint::gt(x, 0)).unwrap();

        solver.push();
        solver.assert_constraint(&Constraint::lt(x, 0)).unwrap();
        let y = solver.declare("y", Sort::Int).unwrap();
        assert_eq!(solver.check().unwrap(), SatResult::Unsat);
        solver.pop().unwrap();

        assert_eq!(solver.check().unwrap(), SatResult::Sat);
        assert_eq!(solver.assertion_count(), 1);
        assert!(solver.domain(y).is_none());
        assert!(matches!(solver.pop(), Err(SolverError::EmptyCheckpointStack)));
    }

    #[test]
    fn multi_variable_constraints_are_rejected() {
        let mut solver = IntervalSolver::new();
        let x = int_var(&mut solver);
        let y = solver.declare("y", Sort::Int).unwrap();
        let c = Constraint::Or(vec![Constraint::gt(x, 0), Constraint::gt(y, 0)]);
        assert!(matches!(
            solver.assert_constraint(&c),
            Err(SolverError::Unsupported(_))
        ));
        assert_eq!(solver.assertion_count(), 0);
    }

    #[test]
    fn constant_constraints() {
        let mut solver = IntervalSolver::new();
        solver.assert_constraint(&Constraint::And(vec![])).unwrap();
        assert_eq!(solver.check().unwrap(), SatResult::Sat);
        solver.assert_constraint(&Constraint::Or(vec![])).unwrap();
        assert_eq!(solver.check().unwrap(), SatResult::Unsat);
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let mut solver = IntervalSolver::new();
        assert!(matches!(
            solver.assert_constraint(&Constraint::gt(VarId::new(3), 0)),
            Err(SolverError::UnknownVariable(_))
        ));
        assert!(matches!(
            solver.minimize(VarId::new(0)),
            Err(SolverError::UnknownVariable(_))
        ));
    }

    #[test_case(0; "zero width")]
    #[test_case(63; "too wide")]
    fn invalid_bitvec_width(width: u8) {
        let mut solver = IntervalSolver::new();
        assert!(matches!(
            solver.declare("b", Sort::BitVec(width)),
            Err(SolverError::InvalidSort(_))
        ));
    }

    #[test_case(CmpOp::Gt, 5, 6, 10; "greater than")]
    #[test_case(CmpOp::Ge, 5, 5, 10; "greater or equal")]
    #[test_case(CmpOp::Lt, 5, 0, 4; "less than")]
    #[test_case(CmpOp::Le, 5, 0, 5; "less or equal")]
    #[test_case(CmpOp::Eq, 5, 5, 5; "equal")]
    fn comparison_against_small_domain(op: CmpOp, value: i64, lo: i64, hi: i64) {
        assert_eq!(comparison_set(op, value, 0, 10), IntervalSet::range(lo, hi));
    }

    #[test]
    fn comparison_at_int_extremes_does_not_overflow() {
        assert!(comparison_set(CmpOp::Gt, i64::MAX, i64::MIN, i64::MAX).is_empty());
        assert!(comparison_set(CmpOp::Lt, i64::MIN, i64::MIN, i64::MAX).is_empty());
        assert_eq!(
            comparison_set(CmpOp::Ne, 0, -1, 1).intervals(),
            &[(-1, -1), (1, 1)]
        );
    }

    #[test]
    fn negation_complements_within_sort() {
        let mut solver = IntervalSolver::new();
        let u = solver.declare("g", Sort::BitVec(4)).unwrap();
        solver
            .assert_constraint(&Constraint::Not(Box::new(Constraint::any_of(u, [0, 1, 15]))))
            .unwrap();
        assert_eq!(solver.domain(u).unwrap().intervals(), &[(2, 14)]);
    }

    #[test]
    fn interval_set_operations() {
        let a = IntervalSet::range(0, 10).remove(5);
        assert_eq!(a.intervals(), &[(0, 4), (6, 10)]);
        assert_eq!(a.count(), 10);
        assert!(!a.contains(5));

        let b = a.union(&IntervalSet::range(5, 5));
        assert_eq!(b.intervals(), &[(0, 10)]);

        let c = a.intersect(&IntervalSet::range(3, 7));
        assert_eq!(c.intervals(), &[(3, 4), (6, 7)]);

        assert_eq!(c.complement_within(0, 10).intervals(), &[(0, 2), (5, 5), (8, 10)]);
        assert_eq!(IntervalSet::range(i64::MIN, i64::MAX).count(), 1_u128 << 64);
    }

    proptest! {
        #[test]
        fn interval_set_matches_membership(
            values in prop::collection::vec(-30_i64..30, 0..20),
            other in prop::collection::vec(-30_i64..30, 0..20),
            probe in -40_i64..40,
        ) {
            let a = values.iter().fold(IntervalSet::empty(), |s, v| s.union(&IntervalSet::range(*v, *v)));
            let b = other.iter().fold(IntervalSet::empty(), |s, v| s.union(&IntervalSet::range(*v, *v)));

            prop_assert_eq!(a.contains(probe), values.contains(&probe));
            prop_assert_eq!(a.intersect(&b).contains(probe), values.contains(&probe) && other.contains(&probe));
            prop_assert_eq!(a.union(&b).contains(probe), values.contains(&probe) || other.contains(&probe));
            prop_assert_eq!(
                a.complement_within(-35, 35).contains(probe),
                (-35..=35).contains(&probe) && !values.contains(&probe)
            );
            prop_assert_eq!(a.remove(probe).contains(probe), false);
        }

        #[test]
        fn strict_range_optimum(lo in -1_000_i64..1_000, width in 2_i64..500) {
            let hi = lo + width;
            let mut solver = IntervalSolver::new();
            let x = solver.declare("x", Sort::Int).unwrap();
            solver.assert_constraint(&Constraint::gt(x, lo)).unwrap();
            solver.assert_constraint(&Constraint::lt(x, hi)).unwrap();
            prop_assert_eq!(solver.minimize(x).unwrap(), Some(Objective::Finite(lo + 1)));
            prop_assert_eq!(solver.maximize(x).unwrap(), Some(Objective::Finite(hi - 1)));
        }
    }
}
