use crate::buffer::BatchBuffer;
use crate::record::Record;
use crate::sender::{Delivery, Sender};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

/// Lifecycle of a [`FlushScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Created, timer not started.
    Idle,
    /// Timer running, waiting for the next tick.
    Armed,
    /// A tick is draining the buffer.
    Draining,
    /// Timer cancelled; no further ticks.
    Stopped,
}

impl SchedulerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SchedulerState::Idle,
            1 => SchedulerState::Armed,
            2 => SchedulerState::Draining,
            _ => SchedulerState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SchedulerState::Idle => 0,
            SchedulerState::Armed => 1,
            SchedulerState::Draining => 2,
            SchedulerState::Stopped => 3,
        }
    }
}

/// Drains the buffer, applies global tags and hands the batch to the
/// [`Sender`].
pub struct Flusher {
    buffer: Arc<BatchBuffer>,
    sender: Sender,
    tags: Vec<String>,
}

impl Flusher {
    pub fn new(buffer: Arc<BatchBuffer>, sender: Sender, tags: Vec<String>) -> Self {
        Self {
            buffer,
            sender,
            tags,
        }
    }

    /// Take everything pending, with global tags prepended to each record.
    pub fn take_batch(&self) -> Vec<Record> {
        let mut batch = self.buffer.drain_all();
        for record in &mut batch {
            record.prepend_tags(&self.tags);
        }
        batch
    }

    /// Drain and send. Returns once the send attempt has finished.
    pub async fn flush(&self) -> Delivery {
        let batch = self.take_batch();
        self.sender.send(&batch).await
    }

    /// Drain and send from the fatal-panic path.
    pub async fn flush_fatal(&self) -> Delivery {
        let batch = self.take_batch();
        self.sender.send_fatal(&batch).await
    }
}

/// Recurring flush timer plus on-demand forced flushes.
///
/// Timer-driven sends are detached so a slow endpoint never delays the
/// next tick; forced flushes are awaited by their caller. Two sends can be
/// in flight at once, each with its own disjoint batch.
pub struct FlushScheduler {
    flusher: Arc<Flusher>,
    period: Duration,
    state: Arc<AtomicU8>,
    cancel: CancellationToken,
    in_flight: TaskTracker,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl FlushScheduler {
    pub fn new(flusher: Arc<Flusher>, period: Duration) -> Self {
        Self {
            flusher,
            period,
            state: Arc::new(AtomicU8::new(SchedulerState::Idle.as_u8())),
            cancel: CancellationToken::new(),
            in_flight: TaskTracker::new(),
            timer: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Start the timer. Only the first call from `Idle` has an effect.
    /// Must be called inside a tokio runtime.
    pub fn arm(&self) {
        if self
            .state
            .compare_exchange(
                SchedulerState::Idle.as_u8(),
                SchedulerState::Armed.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return;
        }

        let flusher = Arc::clone(&self.flusher);
        let state = Arc::clone(&self.state);
        let cancel = self.cancel.clone();
        let in_flight = self.in_flight.clone();
        let period = self.period;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if state
                            .compare_exchange(
                                SchedulerState::Armed.as_u8(),
                                SchedulerState::Draining.as_u8(),
                                Ordering::AcqRel,
                                Ordering::Acquire,
                            )
                            .is_err()
                        {
                            break;
                        }

                        let batch = flusher.take_batch();
                        if !batch.is_empty() {
                            let flusher = Arc::clone(&flusher);
                            in_flight.spawn(async move {
                                flusher.sender.send(&batch).await;
                            });
                        }

                        let _ = state.compare_exchange(
                            SchedulerState::Draining.as_u8(),
                            SchedulerState::Armed.as_u8(),
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        );
                    }
                }
            }
            debug!("flush timer exited");
        });

        *self.timer.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Drain and send now, outside the timer, and wait for the attempt.
    pub async fn force_flush(&self) -> Delivery {
        self.flusher.flush().await
    }

    /// Cancel the timer and wait for it and any detached sends to finish.
    /// After this returns no tick fires and no timer-driven send is
    /// pending.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.state
            .store(SchedulerState::Stopped.as_u8(), Ordering::Release);

        self.in_flight.close();
        self.in_flight.wait().await;
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
