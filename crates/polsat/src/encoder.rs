//! Constraint encoding.
//!
//! Turns one conflict group into a [`ConstraintSet`]: the shared variables
//! every member policy constrains, and one constraint per policy bound,
//! validity time and identity list. The set is built completely before a
//! solver sees it, so a malformed record fails the group without leaving a
//! half-built solver behind.
//!
//! Variables are declared in a fixed order (users, groups, time, value) and
//! carry a [`VarRole`] tag. Nothing downstream inspects variable names.

use polsat_types::{RuleKind, parse_timestamp};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::grouping::ConflictGroup;
use crate::solver::{Constraint, Sort, VarId};

/// Width of the user and group selectors.
pub const SELECTOR_WIDTH: u8 = 16;

// ============================================================================
// Variables
// ============================================================================

/// What a declared variable stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VarRole {
    /// The user the conflicting policies jointly apply to.
    User,
    /// The group the conflicting policies jointly apply to.
    Group,
    /// Epoch seconds at which all policies are valid.
    Time,
    /// The shared numeric attribute of a comparator group.
    Value,
}

impl VarRole {
    pub fn domain_kind(self) -> DomainKind {
        match self {
            Self::User | Self::Group => DomainKind::Discrete,
            Self::Time | Self::Value => DomainKind::Numeric,
        }
    }

    pub fn sort(self) -> Sort {
        match self.domain_kind() {
            DomainKind::Discrete => Sort::BitVec(SELECTOR_WIDTH),
            DomainKind::Numeric => Sort::Int,
        }
    }
}

impl std::fmt::Display for VarRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Time => "time",
            Self::Value => "value",
        };
        write!(f, "{name}")
    }
}

/// How a variable's feasible values are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainKind {
    /// Every feasible value is enumerated.
    Discrete,
    /// Only the feasible range is reported.
    Numeric,
}

/// A variable to declare, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableSpec {
    pub name: String,
    pub role: VarRole,
    pub sort: Sort,
}

impl VariableSpec {
    fn new(name: String, role: VarRole) -> Self {
        Self {
            name,
            role,
            sort: role.sort(),
        }
    }
}

/// Variables and constraints of one conflict group.
///
/// Constraints refer to variables through [`VarId`]s whose index is the
/// variable's position in [`ConstraintSet::variables`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintSet {
    variables: Vec<VariableSpec>,
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    pub fn variables(&self) -> &[VariableSpec] {
        &self.variables
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Local id of the variable with `role`, if declared.
    pub fn find(&self, role: VarRole) -> Option<VarId> {
        self.variables
            .iter()
            .position(|v| v.role == role)
            .map(VarId::new)
    }

    /// Returns true if at least one constraint mentions `var`.
    pub fn is_constrained(&self, var: VarId) -> bool {
        self.constraints
            .iter()
            .any(|c| c.variables().contains(&var))
    }

    fn declare(&mut self, name: String, role: VarRole) -> VarId {
        self.variables.push(VariableSpec::new(name, role));
        VarId::new(self.variables.len() - 1)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// A record of the group cannot be expressed as constraints.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("record {record} has invalid validity time '{value}': {source}")]
    InvalidTimestamp {
        record: usize,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

// ============================================================================
// Encoding
// ============================================================================

/// Encodes a conflict group. `ordinal` scopes the variable names.
pub fn encode(group: &ConflictGroup, ordinal: usize) -> Result<ConstraintSet, EncodeError> {
    let key = group.key();
    let mut set = ConstraintSet::default();

    let users = set.declare(format!("users_{ordinal}"), VarRole::User);
    let groups = set.declare(format!("groups_{ordinal}"), VarRole::Group);
    let time = set.declare(format!("time_{ordinal}"), VarRole::Time);
    let value = (key.rule == RuleKind::Comparator).then(|| {
        set.declare(
            format!("{}_{}_{ordinal}", key.attribute_type, key.vendor),
            VarRole::Value,
        )
    });

    for (index, record) in group.records().iter().enumerate() {
        if let (Some(bounds), Some(value)) = (record.rule.bounds(), value) {
            if let Some(min) = bounds.min {
                set.constraints.push(Constraint::gt(value, min));
            }
            if let Some(max) = bounds.max {
                set.constraints.push(Constraint::lt(value, max));
            }
        }

        if let Some(text) = &record.valid_from {
            let ts = parse_timestamp(text).map_err(|source| EncodeError::InvalidTimestamp {
                record: index,
                value: text.clone(),
                source,
            })?;
            set.constraints.push(Constraint::gt(time, ts.timestamp()));
        }

        if !record.users.is_empty() {
            set.constraints.push(Constraint::any_of(
                users,
                record.users.iter().map(|id| i64::from(*id)),
            ));
        }
        if !record.groups.is_empty() {
            set.constraints.push(Constraint::any_of(
                groups,
                record.groups.iter().map(|id| i64::from(*id)),
            ));
        }
    }

    debug!(
        group = %key,
        ordinal,
        variables = set.variables.len(),
        constraints = set.constraints.len(),
        "Encoded conflict group"
    );
    Ok(set)
}
