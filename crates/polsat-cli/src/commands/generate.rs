//! Generate command - write synthetic conflicted policy documents.

use std::ops::RangeInclusive;
use std::path::Path;

use anyhow::{Context, Result};
use polsat_config::PolsatConfig;
use polsat_document::{GeneratorOptions, write_policy_files};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::style::{create_spinner, finish_and_clear, finish_error, print_hint, print_success};

pub fn run(
    config: &PolsatConfig,
    counts: RangeInclusive<usize>,
    output: &Path,
    seed: Option<u64>,
) -> Result<()> {
    if counts.is_empty() {
        anyhow::bail!(
            "Empty policy count range {}..={}",
            counts.start(),
            counts.end()
        );
    }

    let options = GeneratorOptions::from_parts(
        config.generator.start_min,
        config.generator.start_max,
        &config.generator.start_time,
    )?;
    let mut rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

    let sp = create_spinner(&format!(
        "Writing {} policy documents to {}...",
        counts.clone().count(),
        output.display()
    ));
    match write_policy_files(output, counts, &options, &mut rng) {
        Ok(written) => {
            finish_and_clear(&sp);
            print_success(&format!(
                "Wrote {} policy documents to {}",
                written.len(),
                output.display()
            ));
            print_hint(&format!("Analyze them with: polsat analyze {}", output.display()));
            Ok(())
        }
        Err(e) => {
            finish_error(&sp, "Policy generation failed");
            Err(e).context("Failed to write policy documents")
        }
    }
}
