use crate::store::ShardData;

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace, warn};

/// The one-shot stop flag shared between a janitor and its thread.
#[derive(Default)]
struct StopSignal {
  stopped: Mutex<bool>,
  wake: Condvar,
}

/// The background task that periodically sweeps expired entries out of a
/// single shard.
///
/// The thread parks on a condition variable between ticks, so a stop request
/// wakes it immediately instead of waiting out the interval.
pub(crate) struct Janitor {
  signal: Arc<StopSignal>,
  handle: Mutex<Option<JoinHandle<()>>>,
}

impl Janitor {
  /// Spawns a new janitor thread for `shard`.
  pub(crate) fn spawn(shard: Arc<ShardData>, tick_interval: Duration) -> io::Result<Self> {
    let signal = Arc::new(StopSignal::default());
    let thread_signal = Arc::clone(&signal);

    let handle = thread::Builder::new()
      .name(format!("ttlmap-janitor-{}", shard.index))
      .spawn(move || Self::run(&shard, tick_interval, &thread_signal))?;

    Ok(Self {
      signal,
      handle: Mutex::new(Some(handle)),
    })
  }

  fn run(shard: &ShardData, tick_interval: Duration, signal: &StopSignal) {
    debug!(shard = shard.index, ?tick_interval, "janitor started");

    let mut stopped = signal.stopped.lock();
    while !*stopped {
      let timed_out = match Instant::now().checked_add(tick_interval) {
        Some(next_tick) => signal.wake.wait_until(&mut stopped, next_tick).timed_out(),
        // An interval too large to represent never ticks.
        None => {
          signal.wake.wait(&mut stopped);
          false
        }
      };

      if timed_out && !*stopped {
        // Sweep without holding the stop flag so `stop()` never waits on it.
        let removed = MutexGuard::unlocked(&mut stopped, || shard.sweep());
        trace!(shard = shard.index, removed, "janitor sweep finished");
      }
    }

    debug!(shard = shard.index, "janitor stopped");
  }

  /// Signals the janitor thread to stop and waits for it to exit.
  ///
  /// Returns `false` if the janitor had already been stopped. Safe to call
  /// from any thread, including the janitor's own (it then skips the join).
  pub(crate) fn stop(&self) -> bool {
    {
      let mut stopped = self.signal.stopped.lock();
      if *stopped {
        return false;
      }
      *stopped = true;
    }
    self.signal.wake.notify_all();

    let handle = self.handle.lock().take();
    if let Some(handle) = handle {
      if handle.thread().id() != thread::current().id() && handle.join().is_err() {
        warn!("janitor thread panicked before shutdown");
      }
    }
    true
  }

  pub(crate) fn is_stopped(&self) -> bool {
    *self.signal.stopped.lock()
  }
}

impl Drop for Janitor {
  fn drop(&mut self) {
    self.stop();
  }
}
