//! Synthetic conflicted policy files.
//!
//! Documents are built from three templates (a temperature comparator, an
//! altitude comparator and a password access rule). Policies are emitted in
//! rounds of three. Each round moves the validity time forward by a week and
//! narrows the comparator range by one on each side, so every pair of
//! generated comparators overlaps. Each policy's identity lists always
//! contain `user3`, `user4`, `groupC` and `groupX`, which keeps every
//! generated conflict group satisfiable.

use std::fmt::Write as _;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use polsat_types::{format_timestamp, parse_timestamp};
use quick_xml::escape::escape;
use rand::Rng;
use tracing::{debug, info};

use crate::error::GenerateError;

const USERS: [&str; 6] = ["user1", "user2", "user3", "user4", "user5", "user6"];
const GROUPS: [&str; 6] = ["groupA", "groupB", "groupC", "groupX", "groupY", "groupZ"];

/// Identities present in every generated policy.
const FIXED_USERS: [&str; 2] = ["user3", "user4"];
const FIXED_GROUPS: [&str; 2] = ["groupC", "groupX"];

/// Random identity picks per policy, inclusive.
const PICKS: RangeInclusive<usize> = 3..=6;

/// Time shift between rounds.
const ROUND_SHIFT_DAYS: i64 = 7;

struct Template {
    comparator: bool,
    description: &'static str,
    attribute_type: &'static str,
    vendor: &'static str,
}

const TEMPLATES: [Template; 3] = [
    Template {
        comparator: true,
        description: "in degrees Celsius",
        attribute_type: "temperature",
        vendor: "Google",
    },
    Template {
        comparator: true,
        description: "altitude in meters",
        attribute_type: "altitude",
        vendor: "DJI",
    },
    Template {
        comparator: false,
        description: "Access to car Fuel Level readings",
        attribute_type: "password",
        vendor: "Latas",
    },
];

// ============================================================================
// Options
// ============================================================================

/// Starting point of a generated document.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Exclusive lower bound of the first round's comparators.
    pub start_min: i64,
    /// Exclusive upper bound of the first round's comparators.
    pub start_max: i64,
    /// Validity time of the first round.
    pub start_time: DateTime<Utc>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            start_min: -200,
            start_max: 200,
            // 2006-07-16T23:30:30 UTC
            start_time: DateTime::from_timestamp(1_153_092_630, 0).unwrap_or_default(),
        }
    }
}

impl GeneratorOptions {
    /// Builds options from configuration values, validating the timestamp.
    pub fn from_parts(start_min: i64, start_max: i64, start_time: &str) -> Result<Self, GenerateError> {
        let start_time = parse_timestamp(start_time).map_err(|e| {
            GenerateError::InvalidOptions(format!("start time '{start_time}': {e}"))
        })?;
        if start_min >= start_max {
            return Err(GenerateError::InvalidOptions(format!(
                "start range ({start_min}, {start_max}) is empty"
            )));
        }
        Ok(Self {
            start_min,
            start_max,
            start_time,
        })
    }
}

// ============================================================================
// Generation
// ============================================================================

/// Renders a document with exactly `policy_count` policies.
pub fn generate_document<R: Rng + ?Sized>(
    policy_count: usize,
    options: &GeneratorOptions,
    rng: &mut R,
) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<policyFile>\n");

    let mut time = options.start_time;
    let mut min = options.start_min;
    let mut max = options.start_max;

    for _ in 0..policy_count / TEMPLATES.len() {
        let users = pick_identities(&USERS, &FIXED_USERS, rng);
        let groups = pick_identities(&GROUPS, &FIXED_GROUPS, rng);
        for template in &TEMPLATES {
            render_policy(&mut out, template, min, max, &time, &users, &groups);
        }
        time += Duration::days(ROUND_SHIFT_DAYS);
        min += 1;
        max -= 1;
    }

    let users = pick_identities(&USERS, &FIXED_USERS, rng);
    let groups = pick_identities(&GROUPS, &FIXED_GROUPS, rng);
    for template in TEMPLATES.iter().take(policy_count % TEMPLATES.len()) {
        render_policy(&mut out, template, min, max, &time, &users, &groups);
    }

    out.push_str("</policyFile>\n");
    out
}

/// File name used for the document with `policy_count` policies.
pub fn policy_file_name(policy_count: usize) -> String {
    format!("outputPolicy{policy_count}.xml")
}

/// Writes one document per policy count in `counts` into `dir`.
///
/// Creates `dir` if needed. Returns the written paths in count order.
pub fn write_policy_files<R: Rng + ?Sized>(
    dir: &Path,
    counts: RangeInclusive<usize>,
    options: &GeneratorOptions,
    rng: &mut R,
) -> Result<Vec<PathBuf>, GenerateError> {
    std::fs::create_dir_all(dir).map_err(|source| GenerateError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    for count in counts {
        let path = dir.join(policy_file_name(count));
        let document = generate_document(count, options, rng);
        std::fs::write(&path, document).map_err(|source| GenerateError::Write {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), policies = count, "Wrote policy file");
        written.push(path);
    }

    info!(files = written.len(), dir = %dir.display(), "Generated policy files");
    Ok(written)
}

/// Picks 3..=6 random names (with repeats) plus the fixed names, deduplicated.
fn pick_identities<R: Rng + ?Sized>(pool: &[&str], fixed: &[&str], rng: &mut R) -> Vec<String> {
    let picks = rng.gen_range(PICKS);
    let mut names: Vec<String> = Vec::with_capacity(picks + fixed.len());
    let random = (0..picks).map(|_| pool[rng.gen_range(0..pool.len())]);
    for name in random.chain(fixed.iter().copied()) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

fn render_policy(
    out: &mut String,
    template: &Template,
    min: i64,
    max: i64,
    time: &DateTime<Utc>,
    users: &[String],
    groups: &[String],
) {
    out.push_str("  <policy>\n");
    if template.comparator {
        let _ = writeln!(out, "    <rule min=\"{min}\" max=\"{max}\">comparator</rule>");
    } else {
        out.push_str("    <rule>access</rule>\n");
    }
    let _ = writeln!(out, "    <desc>{}</desc>", escape(template.description));
    out.push_str("    <attributes>\n");
    let _ = writeln!(out, "      <type>{}</type>", escape(template.attribute_type));
    let _ = writeln!(out, "      <vendor>{}</vendor>", escape(template.vendor));
    let _ = writeln!(out, "      <time>{}</time>", format_timestamp(time));
    let _ = writeln!(out, "      <user>{}</user>", escape(&users.join(",")));
    let _ = writeln!(out, "      <group>{}</group>", escape(&groups.join(",")));
    out.push_str("    </attributes>\n");
    out.push_str("  </policy>\n");
}

// ============================================================================
// Tests
// ============================================================================
