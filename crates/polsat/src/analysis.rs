//! Conflict analysis.
//!
//! The [`Analyzer`] takes the records of one policy document through the
//! whole pipeline: group by key, and for every group with more than one
//! record encode it, load a fresh solver, check satisfiability and, when
//! satisfiable, resolve every variable:
//!
//! - user and group selectors are enumerated by asking for a model,
//!   recording the selector's value and blocking it with `var != value`
//!   until the solver answers UNSAT;
//! - time and attribute value are minimized and maximized.
//!
//! Each variable is resolved inside its own checkpoint, so blocking
//! constraints never leak into the next variable. A failing group is
//! recorded in the report and never stops the other groups.

use std::fmt::{self, Display};
use std::path::PathBuf;
use std::time::Instant;

use polsat_types::{GroupKey, IdentityId, PolicyRecord, format_timestamp, timestamp_from_epoch};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context::SolverContext;
use crate::encoder::{DomainKind, VarRole, encode};
use crate::error::{AnalysisError, Result};
use crate::grouping::{ConflictGroup, group};
use crate::identity::IdentityRegistry;
use crate::solver::{
    Constraint, IntervalSolver, Objective, SatResult, Solver, SolverError, SolverFactory, VarId,
};

/// Default bound on enumerated values per variable: the 16-bit selector
/// domain size.
pub const DEFAULT_ENUMERATION_LIMIT: usize = 1 << 16;

// ============================================================================
// Report Types
// ============================================================================

/// One end of a resolved range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint<T> {
    At(T),
    Unbounded,
}

impl<T: Display> Display for Endpoint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(value) => write!(f, "{value}"),
            Self::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// A user or group the conflicting policies jointly apply to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedIdentity {
    pub id: IdentityId,
    /// `None` if the id was never registered.
    pub name: Option<String>,
}

/// Feasible values of one variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedValues {
    /// Inclusive range of the shared attribute value.
    Range {
        min: Endpoint<i64>,
        max: Endpoint<i64>,
    },
    /// Inclusive UTC window in which every policy is valid.
    TimeWindow {
        earliest: Endpoint<String>,
        latest: Endpoint<String>,
    },
    /// Every identity satisfying all membership constraints, ascending.
    Identities { members: Vec<ResolvedIdentity> },
    /// No policy of the group restricts this selector: every value of the
    /// 16-bit domain, `0..=65535`, is feasible.
    Unrestricted,
}

impl Display for ResolvedValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Range { min, max } => write!(f, "[{min}, {max}]"),
            Self::TimeWindow { earliest, latest } => write!(f, "[{earliest}, {latest}]"),
            Self::Identities { members } => {
                let names: Vec<String> = members
                    .iter()
                    .map(|m| m.name.clone().unwrap_or_else(|| format!("#{}", m.id)))
                    .collect();
                write!(f, "{{{}}}", names.join(", "))
            }
            Self::Unrestricted => write!(f, "unrestricted"),
        }
    }
}

/// Resolved values of one declared variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Declared variable name.
    pub variable: String,
    pub role: VarRole,
    pub values: ResolvedValues,
}

/// Outcome of analyzing one conflict group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// The policies can hold together under the listed resolutions.
    Resolvable { resolutions: Vec<Resolution> },
    /// No assignment satisfies every policy of the group.
    Unresolvable,
    /// Encoding or solving failed. The message names the cause.
    Failed { error: String },
}

impl Verdict {
    pub fn is_resolvable(&self) -> bool {
        matches!(self, Self::Resolvable { .. })
    }

    /// Returns the resolution of the variable with `role`, if any.
    pub fn resolution(&self, role: VarRole) -> Option<&Resolution> {
        match self {
            Self::Resolvable { resolutions } => resolutions.iter().find(|r| r.role == role),
            Self::Unresolvable | Self::Failed { .. } => None,
        }
    }
}

/// Analysis of one conflict group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    /// Position of the group among the document's conflict groups.
    pub ordinal: usize,
    pub key: GroupKey,
    pub record_count: usize,
    pub verdict: Verdict,
    pub elapsed_secs: f64,
}

/// Analysis of one policy document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisReport {
    /// Document the records came from, if any.
    pub source: Option<PathBuf>,
    /// Records in the document.
    pub record_count: usize,
    /// Distinct grouping keys in the document.
    pub group_count: usize,
    /// Reports of the conflict groups, in first-appearance order.
    pub groups: Vec<GroupReport>,
    /// Records belonging to conflict groups.
    pub conflicted_records: usize,
    pub elapsed_secs: f64,
}

impl AnalysisReport {
    /// Returns the report with its source document set.
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn has_conflicts(&self) -> bool {
        self.conflicted_records > 0
    }

    /// Number of groups with the given outcome.
    pub fn count(&self, predicate: impl Fn(&Verdict) -> bool) -> usize {
        self.groups.iter().filter(|g| predicate(&g.verdict)).count()
    }

    /// `elapsedSeconds,conflictedRecordCount`, for documents with conflicts.
    pub fn summary_line(&self) -> Option<String> {
        self.has_conflicts()
            .then(|| format!("{},{}", self.elapsed_secs, self.conflicted_records))
    }
}

// ============================================================================
// Analyzer
// ============================================================================

/// Drives a [`SolverFactory`] over conflict groups.
#[derive(Debug, Clone)]
pub struct Analyzer<F> {
    factory: F,
    enumeration_limit: usize,
}

impl Default for Analyzer<fn() -> IntervalSolver> {
    fn default() -> Self {
        Self::new(IntervalSolver::new as fn() -> IntervalSolver)
    }
}

impl<F: SolverFactory> Analyzer<F> {
    /// Creates an analyzer that builds one solver per conflict group.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            enumeration_limit: DEFAULT_ENUMERATION_LIMIT,
        }
    }

    /// Sets the bound on enumerated values per selector.
    pub fn with_enumeration_limit(mut self, limit: usize) -> Self {
        self.enumeration_limit = limit;
        self
    }

    pub fn enumeration_limit(&self) -> usize {
        self.enumeration_limit
    }

    /// Groups `records` and analyzes every conflict group.
    ///
    /// Groups with a single record are counted but never reach a solver.
    pub fn analyze(&self, records: Vec<PolicyRecord>, registry: &IdentityRegistry) -> AnalysisReport {
        let start = Instant::now();
        let record_count = records.len();
        let groups = group(records);
        let group_count = groups.len();

        let reports: Vec<GroupReport> = groups
            .iter()
            .filter(|g| g.is_conflict())
            .enumerate()
            .map(|(ordinal, g)| self.analyze_group(g, ordinal, registry))
            .collect();
        let conflicted_records = reports.iter().map(|r| r.record_count).sum();

        let report = AnalysisReport {
            source: None,
            record_count,
            group_count,
            groups: reports,
            conflicted_records,
            elapsed_secs: start.elapsed().as_secs_f64(),
        };
        info!(
            records = record_count,
            groups = group_count,
            conflicts = report.groups.len(),
            conflicted_records,
            "Analyzed policy records"
        );
        report
    }

    /// Analyzes a single group. Failures end up in the verdict.
    pub fn analyze_group(
        &self,
        group: &ConflictGroup,
        ordinal: usize,
        registry: &IdentityRegistry,
    ) -> GroupReport {
        let start = Instant::now();
        let verdict = match self.resolve_group(group, ordinal, registry) {
            Ok(verdict) => verdict,
            Err(error) => {
                warn!(group = %group.key(), %error, "Conflict group analysis failed");
                Verdict::Failed {
                    error: error.to_string(),
                }
            }
        };
        let elapsed_secs = start.elapsed().as_secs_f64();
        debug!(
            group = %group.key(),
            ordinal,
            records = group.len(),
            resolvable = verdict.is_resolvable(),
            elapsed_secs,
            "Conflict group analyzed"
        );

        GroupReport {
            ordinal,
            key: group.key().clone(),
            record_count: group.len(),
            verdict,
            elapsed_secs,
        }
    }

    fn resolve_group(
        &self,
        group: &ConflictGroup,
        ordinal: usize,
        registry: &IdentityRegistry,
    ) -> Result<Verdict> {
        let key = group.key();
        let set = encode(group, ordinal).map_err(|source| AnalysisError::ConstraintEncoding {
            group: key.clone(),
            source,
        })?;
        let solver_failed = |source| AnalysisError::SolverInvocation {
            group: key.clone(),
            source,
        };

        let mut ctx = SolverContext::build(self.factory.create(), &set).map_err(solver_failed)?;
        match ctx.solver_mut().check().map_err(solver_failed)? {
            SatResult::Sat => {}
            SatResult::Unsat => return Ok(Verdict::Unresolvable),
            SatResult::Unknown => return Err(solver_failed(SolverError::Undecided)),
        }

        let variables = ctx.variables().to_vec();
        let mut resolutions = Vec::with_capacity(variables.len());
        for (index, (spec, var)) in variables.into_iter().enumerate() {
            let values = if spec.role.domain_kind() == DomainKind::Discrete
                && !set.is_constrained(VarId::new(index))
            {
                ResolvedValues::Unrestricted
            } else {
                let solver = ctx.solver_mut();
                solver.push();
                let resolved = self.resolve_variable(solver, spec.role, var, registry);
                solver.pop().map_err(solver_failed)?;
                resolved.map_err(solver_failed)?
            };
            debug!(group = %key, variable = %spec.name, values = %values, "Resolved variable");
            resolutions.push(Resolution {
                variable: spec.name,
                role: spec.role,
                values,
            });
        }

        Ok(Verdict::Resolvable { resolutions })
    }

    fn resolve_variable(
        &self,
        solver: &mut F::Solver,
        role: VarRole,
        var: VarId,
        registry: &IdentityRegistry,
    ) -> std::result::Result<ResolvedValues, SolverError> {
        match role {
            VarRole::User | VarRole::Group => {
                let members = self
                    .enumerate(solver, var)?
                    .into_iter()
                    .map(|value| {
                        let id = IdentityId::try_from(value).map_err(|_| {
                            SolverError::Backend(format!("selector value {value} out of range"))
                        })?;
                        Ok(ResolvedIdentity {
                            id,
                            name: registry.name_of(id).ok().map(str::to_string),
                        })
                    })
                    .collect::<std::result::Result<Vec<_>, SolverError>>()?;
                Ok(ResolvedValues::Identities { members })
            }
            VarRole::Time => {
                let (min, max) = optimize(solver, var)?;
                Ok(ResolvedValues::TimeWindow {
                    earliest: time_endpoint(min),
                    latest: time_endpoint(max),
                })
            }
            VarRole::Value => {
                let (min, max) = optimize(solver, var)?;
                Ok(ResolvedValues::Range {
                    min: value_endpoint(min),
                    max: value_endpoint(max),
                })
            }
        }
    }

    /// Collects every feasible value of `var` by blocking each model value
    /// in turn.
    fn enumerate(
        &self,
        solver: &mut F::Solver,
        var: VarId,
    ) -> std::result::Result<Vec<i64>, SolverError> {
        let mut values = Vec::new();
        loop {
            match solver.check()? {
                SatResult::Sat => {}
                SatResult::Unsat => return Ok(values),
                SatResult::Unknown => return Err(SolverError::Undecided),
            }
            if values.len() >= self.enumeration_limit {
                return Err(SolverError::EnumerationLimit {
                    limit: self.enumeration_limit,
                });
            }
            let value = solver
                .model()?
                .get(var)
                .ok_or(SolverError::UnknownVariable(var))?;
            values.push(value);
            solver.assert_constraint(&Constraint::ne(var, value))?;
        }
    }
}

/// Minimizes, restores the checkpoint, then maximizes `var`.
///
/// Expects the caller to have pushed a checkpoint.
fn optimize<S: Solver>(
    solver: &mut S,
    var: VarId,
) -> std::result::Result<(Objective, Objective), SolverError> {
    let min = solver.minimize(var)?.ok_or(SolverError::NoModel)?;
    solver.pop()?;
    solver.push();
    let max = solver.maximize(var)?.ok_or(SolverError::NoModel)?;
    Ok((min, max))
}

fn value_endpoint(objective: Objective) -> Endpoint<i64> {
    match objective {
        Objective::Finite(value) => Endpoint::At(value),
        Objective::Unbounded => Endpoint::Unbounded,
    }
}

fn time_endpoint(objective: Objective) -> Endpoint<String> {
    match objective {
        Objective::Finite(seconds) => Endpoint::At(
            timestamp_from_epoch(seconds)
                .map_or_else(|| format!("@{seconds}"), |ts| format_timestamp(&ts)),
        ),
        Objective::Unbounded => Endpoint::Unbounded,
    }
}

// ============================================================================
// Tests
// ============================================================================
