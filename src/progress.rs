//! Spinner shown while the engine talks to the network or runs steps.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(100);

/// Start a spinner with `msg`. Hidden when `visible` is false, so callers
/// can use the same code path for `--quiet` and `--json`.
pub fn spinner(msg: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(TICK);
    pb
}

/// Remove the spinner line.
pub fn finish_clear(pb: &ProgressBar) {
    pb.finish_and_clear();
}
