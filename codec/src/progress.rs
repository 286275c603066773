//! Report progress of long-running operations and let the caller cancel them.

use std::{
    ops::ControlFlow,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};
use tracing::trace;

/// Progress callback.
///
/// Receives a fraction in `[0, 1]`. Returning [ControlFlow::Break] asks the operation to stop
/// scheduling further work.
pub type Progress<'a> = dyn Fn(f64) -> ControlFlow<()> + Sync + 'a;

/// Minimum increase between two reports (except the final one).
const STEP: f64 = 0.01;

struct State {
    done: usize,
    reported: f64,
}

/// Tracks completed units of work across threads and reports monotonically increasing progress.
///
/// Intermediate reports are strictly below `1.0`; [Tracker::finish] reports exactly `1.0`.
pub struct Tracker<'a> {
    progress: Option<&'a Progress<'a>>,
    total: usize,
    state: Mutex<State>,
    cancelled: AtomicBool,
}

impl<'a> Tracker<'a> {
    pub fn new(progress: Option<&'a Progress<'a>>, total: usize) -> Self {
        Self {
            progress,
            total,
            state: Mutex::new(State {
                done: 0,
                reported: 0.0,
            }),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Stop scheduling further work, as if the callback had returned [ControlFlow::Break].
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether the callback asked to stop or [Tracker::cancel] was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Units of work recorded so far.
    pub fn done(&self) -> usize {
        self.state.lock().map(|s| s.done).unwrap_or(0)
    }

    /// Record `units` of completed work.
    pub fn advance(&self, units: usize) -> ControlFlow<()> {
        // Reporting under the lock keeps reports ordered across threads
        let Ok(mut state) = self.state.lock() else {
            return ControlFlow::Continue(());
        };
        state.done += units;
        let Some(progress) = self.progress else {
            return ControlFlow::Continue(());
        };
        if self.total == 0 {
            return ControlFlow::Continue(());
        }
        let fraction = (state.done as f64 / self.total as f64).min(1.0 - f64::EPSILON);
        if fraction - state.reported < STEP {
            return ControlFlow::Continue(());
        }
        state.reported = fraction;
        trace!(fraction, done = state.done, "progress");
        let flow = progress(fraction);
        if flow.is_break() {
            self.cancel();
        }
        flow
    }

    /// Report completion.
    pub fn finish(&self) {
        if let Some(progress) = self.progress {
            if let Ok(mut state) = self.state.lock() {
                state.reported = 1.0;
                let _ = progress(1.0);
            }
        }
    }
}
