use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::models::state::PlaybackState;

/// Playback progress: `(elapsed_secs, total_secs)`.
///
/// Fires on the playback worker thread after every block written.
pub type PlaybackProgressCallback = Arc<dyn Fn(f64, f64) + Send + Sync + 'static>;

/// Capture progress: `elapsed_secs`.
///
/// Fires on the capture worker thread after every block read.
pub type CaptureProgressCallback = Arc<dyn Fn(f64) + Send + Sync + 'static>;

/// Fires once when a playback worker exits on its own, with the final state.
pub type FinishedCallback = Arc<dyn Fn(&PlaybackState) + Send + Sync + 'static>;

/// Run a collaborator callback, logging instead of unwinding into the worker.
pub(crate) fn invoke_guarded<F: FnOnce()>(what: &str, f: F) {
    if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
        log::error!("{} callback panicked", what);
    }
}
