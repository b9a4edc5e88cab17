//! # polsat
//!
//! Conflict detection and resolution for attribute-based access-control
//! policies.
//!
//! Policies that govern the same (rule kind, attribute type, vendor) tuple
//! may contradict each other. `polsat` groups them, encodes each group as
//! constraints over shared variables and asks a solver whether the group
//! can hold at once. When it can, the analysis reports:
//!
//! - **Value ranges** - the inclusive range a comparator attribute may take
//! - **Time windows** - when every policy of the group is valid
//! - **Identities** - the users and groups every policy applies to
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                              polsat                              │
//! │  ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────────┐   │
//! │  │ Registry │ → │ Grouping │ → │ Encoder  │ → │   Analyzer   │   │
//! │  │(name→id) │   │  (key)   │   │(vars+cs) │   │(check/enum/  │   │
//! │  └──────────┘   └──────────┘   └──────────┘   │  optimize)   │   │
//! │                                               └──────┬───────┘   │
//! │                                                      ↓           │
//! │                                               ┌──────────────┐   │
//! │                                               │    Solver    │   │
//! │                                               │  (generic)   │   │
//! │                                               └──────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use polsat::{Analyzer, IdentityRegistry};
//! use polsat_types::{Bounds, PolicyRecord, Rule};
//!
//! let registry = IdentityRegistry::new();
//! let report = Analyzer::default().analyze(
//!     vec![
//!         PolicyRecord::new(Rule::Comparator(Bounds::new(-200, 200)), "temperature", "Google"),
//!         PolicyRecord::new(Rule::Comparator(Bounds::new(-199, 199)), "temperature", "Google"),
//!     ],
//!     &registry,
//! );
//! // temperature_Google_0 in [-198, 198]
//! ```
//!
//! # Modules
//!
//! - **Pipeline**: [`IdentityRegistry`], [`group`], [`encode`], [`Analyzer`]
//! - **Runs**: [`BatchRunner`], [`SummaryLog`]
//! - **Solving**: [`solver::Solver`], [`solver::IntervalSolver`]

mod analysis;
mod batch;
mod context;
mod encoder;
mod error;
mod grouping;
mod identity;
pub mod solver;
mod summary;

pub use analysis::{
    AnalysisReport, Analyzer, DEFAULT_ENUMERATION_LIMIT, Endpoint, GroupReport, Resolution,
    ResolvedIdentity, ResolvedValues, Verdict,
};
pub use batch::{BatchReport, BatchRunner, DEFAULT_EXTENSION, FileOutcome, sequence_number};
pub use context::SolverContext;
pub use encoder::{
    ConstraintSet, DomainKind, EncodeError, SELECTOR_WIDTH, VarRole, VariableSpec, encode,
};
pub use error::{AnalysisError, Result};
pub use grouping::{ConflictGroup, group};
pub use identity::IdentityRegistry;
pub use summary::SummaryLog;

// Re-export the policy model
pub use polsat_types::{
    Bounds, GroupKey, IdentityId, PolicyRecord, Rule, RuleKind, format_timestamp,
    parse_timestamp,
};
