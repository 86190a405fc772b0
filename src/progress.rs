//! Progress reporting with indicatif.
//!
//! The pipeline reports through [`ProgressCallback`]; [`Progress`] renders it
//! as one terminal bar per phase. Phases run one after another:
//! `sample_hash`, `full_hash`, then `delete`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Receives progress updates from the pipeline.
///
/// Hashing phases call `on_progress` and `on_item_completed` from worker
/// threads, hence `Send + Sync`.
pub trait ProgressCallback: Send + Sync {
    /// A phase with `total` items starts.
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Item `current` (1-based) is being processed.
    fn on_progress(&self, current: usize, path: &str);

    /// An item of `bytes` size finished.
    fn on_item_completed(&self, _bytes: u64) {}

    /// A phase completes.
    fn on_phase_end(&self, phase: &str);

    /// Free-form status message.
    fn on_message(&self, _message: &str) {}
}

/// Terminal progress bars.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").field("quiet", &self.quiet).finish()
    }
}

impl Progress {
    /// Create a reporter; `quiet` suppresses all output.
    ///
    /// ```
    /// use mediadedupe::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }

    fn bar(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn style(phase: &str) -> ProgressStyle {
        let template = match phase {
            "full_hash" => {
                "[{elapsed_precise}] [{bar:40.green/blue}] {pos}/{len} {per_sec} {msg}"
            }
            "delete" => "[{elapsed_precise}] [{bar:40.red/blue}] {pos}/{len} {msg}",
            _ => "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        };
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█>-")
    }
}

fn phase_label(phase: &str) -> &str {
    match phase {
        "sample_hash" => "Sampling",
        "full_hash" => "Verifying",
        "delete" => "Removing",
        other => other,
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }
        let pb = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
        pb.set_style(Self::style(phase));
        pb.set_message(phase_label(phase).to_string());
        if let Some(old) = self.bar().replace(pb) {
            old.finish_and_clear();
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if let Some(ref pb) = *self.bar() {
            pb.set_position(current as u64);
            pb.set_message(truncate_path(path, 40));
        }
    }

    fn on_phase_end(&self, phase: &str) {
        if let Some(pb) = self.bar().take() {
            pb.finish_with_message(format!("{} complete", phase_label(phase)));
        }
    }

    fn on_message(&self, message: &str) {
        if let Some(ref pb) = *self.bar() {
            pb.set_message(message.to_string());
        }
    }
}

/// Shorten a path for display, keeping the file name.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let count = name.chars().count();
    if count + 4 > max_len {
        let tail: String = name.chars().skip(count + 3 - max_len).collect();
        return format!("...{tail}");
    }
    format!(".../{name}")
}
