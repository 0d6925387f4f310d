//! Background housekeeping: periodic flush, fsync, and checkpointing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::warn;

use crate::Error;

use super::WalShared;

/// Periodic sync task paired with each log instance.
///
/// Ticks every `sync_interval`, takes the log lock, and performs a
/// checkpointed sync. Errors are logged and retried on the next tick.
pub(crate) struct Housekeeper {
    state: Arc<HousekeeperState>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

struct HousekeeperState {
    /// Whether the thread should shut down.
    shutdown: AtomicBool,
    /// Mutex paired with the tick condvar.
    tick_mutex: Mutex<()>,
    /// Condition variable used as an interruptible timer.
    tick_cond: Condvar,
}

impl Housekeeper {
    /// Spawn the housekeeping thread for the given log.
    pub(crate) fn start(shared: Arc<WalShared>) -> Self {
        let state = Arc::new(HousekeeperState {
            shutdown: AtomicBool::new(false),
            tick_mutex: Mutex::new(()),
            tick_cond: Condvar::new(),
        });

        let thread_state = Arc::clone(&state);
        let interval = shared.options.sync_interval;

        let handle = thread::Builder::new()
            .name("walog-housekeeper".to_string())
            .spawn(move || loop {
                {
                    let mut guard = thread_state.tick_mutex.lock();
                    if thread_state.shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    thread_state.tick_cond.wait_for(&mut guard, interval);
                }

                if thread_state.shutdown.load(Ordering::SeqCst) {
                    break;
                }

                if let Err(e) = shared.sync(true) {
                    if !matches!(e, Error::WalClosed) {
                        warn!(error = %e, "periodic wal sync failed");
                    }
                }
            })
            .expect("Failed to spawn housekeeper thread");

        Self {
            state,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Signal shutdown, wake the thread, and wait for it to exit.
    ///
    /// Idempotent; later calls are no-ops.
    pub(crate) fn stop(&self) {
        self.state.shutdown.store(true, Ordering::SeqCst);

        {
            let _guard = self.state.tick_mutex.lock();
            self.state.tick_cond.notify_all();
        }

        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}
