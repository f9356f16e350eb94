//! Thread drivers for sources and front-end queues.
//!
//! [`spawn_source`] runs one source on its own thread, calling `spin()` until
//! its stop flag is raised. Several sources may share one flag to stop
//! together. [`run_consumer_loop`] is the matching receive loop for a
//! front-end draining a [`ChannelConsumer`](super::ChannelConsumer).
//!
//! Shutdown order: raise the sources' stop flag, join every source, then
//! drop the last consumer handle. The front-end loop returns once the
//! channel is disconnected and empty, so nothing sent is left unhandled.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use crate::config::IngestionConfig;

use super::observation::ObservationPtr;
use super::source::RawDataSource;

/// Lifecycle of a driven source. Teardown belongs to the owner of the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// `spin()` not yet called, or the loop has exited.
    Idle,
    /// `spin()` is being called repeatedly.
    Spinning,
}

/// Handle to a source thread.
///
/// Dropping the handle detaches the thread; call [`stop`](Self::stop) and
/// [`join`](Self::join) to tear it down.
pub struct SourceHandle {
    label: String,
    stop: Arc<AtomicBool>,
    spinning: Arc<AtomicBool>,
    spins: Arc<AtomicU64>,
    thread: Option<JoinHandle<u64>>,
}

impl SourceHandle {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> SourceState {
        if self.spinning.load(Ordering::SeqCst) {
            SourceState::Spinning
        } else {
            SourceState::Idle
        }
    }

    /// Whether the source thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Number of completed `spin()` calls so far.
    pub fn spin_count(&self) -> u64 {
        self.spins.load(Ordering::SeqCst)
    }

    /// Raise the stop flag (shared with any sibling using the same flag).
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Wait for the thread to exit. Returns the total number of spins.
    ///
    /// Does not raise the stop flag itself.
    pub fn join(mut self) -> Result<u64> {
        let thread = self
            .thread
            .take()
            .ok_or_else(|| anyhow!("source '{}' already joined", self.label))?;
        thread
            .join()
            .map_err(|_| anyhow!("source '{}' thread panicked", self.label))
    }
}

impl std::fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceHandle")
            .field("label", &self.label)
            .field("state", &self.state())
            .field("spins", &self.spin_count())
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Run `source` on a new thread until `stop` is raised.
///
/// `spin()` is called back to back, or at most once per `config.spin_period()`
/// when that is non-zero. A failing `spin()` is logged and the loop goes on.
pub fn spawn_source<S>(
    mut source: S,
    config: &IngestionConfig,
    stop: Arc<AtomicBool>,
) -> Result<SourceHandle>
where
    S: RawDataSource + 'static,
{
    let label = source.label().to_string();
    let period = config.spin_period();
    let spinning = Arc::new(AtomicBool::new(false));
    let spins = Arc::new(AtomicU64::new(0));

    let thread = {
        let thread_label = label.clone();
        let stop = Arc::clone(&stop);
        let spinning = Arc::clone(&spinning);
        let spins = Arc::clone(&spins);

        thread::Builder::new()
            .name(format!("source-{label}"))
            .spawn(move || {
                let label = thread_label;
                info!("Source '{}' thread started", label);
                let mut count = 0u64;

                while !stop.load(Ordering::SeqCst) {
                    spinning.store(true, Ordering::SeqCst);
                    let started = Instant::now();

                    if let Err(err) = source.spin() {
                        warn!("Source '{}' spin failed: {:#}", label, err);
                    }
                    count += 1;
                    spins.store(count, Ordering::SeqCst);

                    pace(period, started);
                }

                spinning.store(false, Ordering::SeqCst);
                info!("Source '{}' thread exiting after {} spins", label, count);
                count
            })
            .with_context(|| format!("spawning thread for source '{label}'"))?
    };

    Ok(SourceHandle {
        label,
        stop,
        spinning,
        spins,
        thread: Some(thread),
    })
}

/// Sleep out the remainder of `period` since `started`.
fn pace(period: Duration, started: Instant) {
    if let Some(rest) = period.checked_sub(started.elapsed()) {
        if !rest.is_zero() {
            thread::sleep(rest);
        }
    }
}

/// Drain `receiver`, handing each observation to `handle`.
///
/// Blocks until every sender is gone and the channel is empty, then returns
/// the number of observations handled. Sources blocked on a full bounded
/// channel are always released, since the loop keeps receiving until then.
pub fn run_consumer_loop<F>(receiver: &Receiver<ObservationPtr>, mut handle: F) -> usize
where
    F: FnMut(ObservationPtr),
{
    let mut handled = 0;
    for obs in receiver.iter() {
        handle(obs);
        handled += 1;
    }

    debug!("Front-end queue disconnected after {} observations", handled);
    handled
}
