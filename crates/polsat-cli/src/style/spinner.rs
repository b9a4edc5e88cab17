//! Progress helpers using indicatif.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const SPINNER: &[&str] = &["◐ ", "◓ ", "◑ ", "◒ "];

/// Creates a spinner with a message.
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();

    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(SPINNER)
            .template("{spinner:.cyan} {msg}")
            .expect("invalid spinner template"),
    );

    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));

    pb
}

/// Creates a bar counting analyzed files.
pub fn create_progress(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);

    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:30.cyan/blue} {pos}/{len} {msg}")
            .expect("invalid progress template")
            .progress_chars("█▓░"),
    );

    pb
}

/// Finishes a spinner with an error message.
pub fn finish_error(pb: &ProgressBar, msg: &str) {
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{prefix} {msg}")
            .expect("invalid spinner template"),
    );
    pb.set_prefix("✗");
    pb.finish_with_message(msg.to_string());
}

/// Finishes a progress indicator and clears it from the terminal.
pub fn finish_and_clear(pb: &ProgressBar) {
    pb.finish_and_clear();
}
