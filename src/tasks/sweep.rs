//! Expiration Sweep Task
//!
//! Background thread that periodically removes expired entries from the
//! in-memory backend, so space held by entries nobody re-reads is reclaimed.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{CacheCounters, MemoryState};

/// Handle to a running sweep thread.
#[derive(Debug)]
pub struct SweepHandle {
    stop_tx: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

impl SweepHandle {
    /// Signals the sweep loop to exit and waits for it.
    pub fn shutdown(self) {
        // A send error only means the loop already exited.
        let _ = self.stop_tx.send(());
        if self.thread.join().is_err() {
            warn!("Expiration sweep thread panicked");
        }
    }
}

/// Spawns a thread that sweeps expired entries every `interval`.
///
/// The thread sleeps on the stop channel between runs, so a stop signal (or
/// the handle being dropped) ends it without waiting out the interval. Each
/// run takes the state's write lock for the duration of one pass.
///
/// # Arguments
/// * `state` - Shared memory backend state
/// * `counters` - Counters to record expirations on
/// * `interval` - Time between sweeps
pub fn spawn_sweep_task(
    state: Arc<RwLock<MemoryState>>,
    counters: Arc<CacheCounters>,
    interval: Duration,
) -> std::io::Result<SweepHandle> {
    let (stop_tx, stop_rx) = mpsc::channel::<()>();

    let thread = thread::Builder::new()
        .name("cache-sweep".to_string())
        .spawn(move || {
            info!(
                "Starting expiration sweep with interval of {} seconds",
                interval.as_secs_f64()
            );

            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }

                let (removed, freed) = state.write().purge_expired(Utc::now());
                counters.record_expirations(removed as u64);

                if removed > 0 {
                    info!(
                        "Expiration sweep: removed {} entries, freed {} bytes",
                        removed, freed
                    );
                } else {
                    debug!("Expiration sweep: no expired entries found");
                }
            }

            debug!("Expiration sweep stopped");
        })?;

    Ok(SweepHandle { stop_tx, thread })
}
