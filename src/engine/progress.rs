//! Progress bar utilities for executor stages

use kdam::{Animation, Bar, BarExt};
use std::sync::{Arc, Mutex};

use crate::pipeline::{ExecutorProgress, ProgressHook};

// Progress bar type alias
pub type ProgressBar = Arc<Mutex<Bar>>;

/// Bar for handler calls. The total grows as the executor admits entries.
pub fn create_progress_bar(desc: &'static str) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = 0,
        desc = desc,
        animation = Animation::Classic,
        position = 0,
        unit = " calls"
    )))
}

/// Force a refresh of the bar (e.g. final state after the run).
pub fn refresh_bar(pb: &ProgressBar) {
    if let Ok(mut bar) = pb.try_lock() {
        let _ = bar.refresh();
    }
}

/// Uses try_lock so executor threads never block on the bar; a skipped update catches up later.
fn show_progress(pb: &ProgressBar, progress: ExecutorProgress) {
    if let Ok(mut bar) = pb.try_lock() {
        bar.total = progress.admitted;
        let _ = bar.update_to(progress.completed);
    }
}

/// Executor progress hook that drives `pb`.
pub fn executor_progress_hook(pb: &ProgressBar) -> ProgressHook {
    let pb = Arc::clone(pb);
    Arc::new(move |progress: ExecutorProgress| show_progress(&pb, progress))
}
