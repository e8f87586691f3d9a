use crate::client::ApiError;
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// One periodic view over the backend. `fetch` does the I/O; `commit`
/// folds the result into local state and is skipped once a stop was
/// requested while the fetch was in flight.
pub trait PollTarget {
    type Output;

    fn name(&self) -> &str;
    fn fetch(&mut self) -> Result<Self::Output, ApiError>;
    fn commit(&mut self, output: Self::Output);
}

/// Requests a poll loop to stop; wakes it if it is sleeping.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: mpsc::Sender<()>,
    stopped: Arc<AtomicBool>,
}

#[derive(Debug)]
pub struct StopSignal {
    rx: mpsc::Receiver<()>,
    stopped: Arc<AtomicBool>,
}

pub fn stop_pair() -> (StopHandle, StopSignal) {
    let (tx, rx) = mpsc::channel();
    let stopped = Arc::new(AtomicBool::new(false));
    (
        StopHandle {
            tx,
            stopped: stopped.clone(),
        },
        StopSignal { rx, stopped },
    )
}

impl StopHandle {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        // receiver gone means the loop already returned
        let _ = self.tx.send(());
    }
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Sleeps up to `timeout`; returns true as soon as a stop is requested.
    fn wait(&self, timeout: Duration) -> bool {
        if self.is_stopped() {
            return true;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) => self.is_stopped(),
            Err(RecvTimeoutError::Disconnected) => {
                // every handle dropped: nobody can stop us any more
                thread::sleep(timeout);
                self.is_stopped()
            }
        }
    }
}

/// Ticks `target` immediately and then every `interval` until stopped.
/// Failed ticks are logged and the loop carries on at the same cadence.
/// Returns the number of committed ticks.
pub fn run_loop<T: PollTarget>(target: &mut T, interval: Duration, stop: &StopSignal) -> u64 {
    let mut committed = 0;
    loop {
        if stop.is_stopped() {
            break;
        }
        let tick_start = Instant::now();

        match target.fetch() {
            Ok(output) => {
                if stop.is_stopped() {
                    debug!("[{}] stop requested during fetch; discarding result", target.name());
                    break;
                }
                target.commit(output);
                committed += 1;
            }
            Err(e) => warn!("[{}] poll failed: {}", target.name(), e),
        }

        // Maintain steady cadence
        let elapsed = tick_start.elapsed();
        if stop.wait(interval.saturating_sub(elapsed)) {
            break;
        }
    }
    committed
}
