use crate::buffer::BatchBuffer;
use crate::builder::{build, env_snapshot, envelope, BANANAS_TAG};
use crate::config::Config;
use crate::error::Error;
use crate::hooks::{lock, PanicHook, SignalListeners, TermSignal};
use crate::host::{Host, LogPayload, RequestContext};
use crate::record::{EventKind, Failure, Fault, Record};
use crate::scheduler::{FlushScheduler, Flusher, SchedulerState};
use crate::sender::{Delivery, Sender};
use crate::sink::BulkSink;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use tokio::runtime::{Builder, Handle};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The shipper: one buffer, one flush timer and the optional process hooks,
/// wired to the host's events.
///
/// Cheap to clone; all clones drive the same engine. Several engines can
/// run side by side, except that only one should own the panic hook.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

/// Non-owning handle held by process hooks so they never keep an engine
/// alive on their own.
#[derive(Clone)]
pub struct WeakEngine {
    inner: Weak<Inner>,
}

impl WeakEngine {
    pub fn upgrade(&self) -> Option<Engine> {
        self.inner.upgrade().map(|inner| Engine { inner })
    }

    #[cfg(test)]
    pub(crate) fn dangling() -> Self {
        Self { inner: Weak::new() }
    }
}

struct Inner {
    config: Config,
    buffer: Arc<BatchBuffer>,
    flusher: Arc<Flusher>,
    scheduler: FlushScheduler,
    host: Arc<dyn Host>,
    panic_hook: Mutex<Option<PanicHook>>,
    signals: Mutex<Option<SignalListeners>>,
    shutdown: OnceCell<()>,
    closed: AtomicBool,
}

impl Engine {
    /// Validate `config`, enqueue the `initialized` record, start the
    /// timer, install the configured hooks and flush once.
    ///
    /// Returns only after the startup flush's send attempt has finished.
    /// Must run inside a tokio runtime.
    pub async fn start(
        config: Config,
        sink: Arc<dyn BulkSink>,
        host: Arc<dyn Host>,
    ) -> Result<Engine, Error> {
        config.validate()?;
        Handle::try_current().map_err(|_| Error::Runtime)?;

        let buffer = Arc::new(BatchBuffer::new());
        let sender = Sender::new(sink, &config);
        let flusher = Arc::new(Flusher::new(
            Arc::clone(&buffer),
            sender,
            config.global_tags().to_vec(),
        ));
        let scheduler = FlushScheduler::new(Arc::clone(&flusher), config.interval);

        let engine = Engine {
            inner: Arc::new(Inner {
                config,
                buffer,
                flusher,
                scheduler,
                host,
                panic_hook: Mutex::new(None),
                signals: Mutex::new(None),
                shutdown: OnceCell::new(),
                closed: AtomicBool::new(false),
            }),
        };

        let mut init = envelope(EventKind::Server).with_tags([BANANAS_TAG, "initialized"]);
        init.env = Some(env_snapshot());
        engine.push(init);

        if engine.inner.config.signals {
            let listeners = SignalListeners::install(engine.downgrade())?;
            *lock(&engine.inner.signals) = Some(listeners);
        }
        if engine.inner.config.uncaught_exception {
            let hook = PanicHook::install(engine.downgrade());
            *lock(&engine.inner.panic_hook) = Some(hook);
        }

        engine.inner.scheduler.arm();
        engine.flush().await;

        info!(
            interval_ms = engine.inner.config.interval.as_millis() as u64,
            signals = engine.inner.config.signals,
            uncaught_exception = engine.inner.config.uncaught_exception,
            "bananas engine started"
        );
        Ok(engine)
    }

    pub fn downgrade(&self) -> WeakEngine {
        WeakEngine {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn state(&self) -> SchedulerState {
        self.inner.scheduler.state()
    }

    /// Records waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.inner.buffer.len()
    }

    /// Signal listeners currently registered.
    pub fn signal_listeners(&self) -> usize {
        lock(&self.inner.signals)
            .as_ref()
            .map_or(0, SignalListeners::len)
    }

    /// True once shutdown has begun; from then on new records are discarded.
    pub fn is_shut_down(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Generic log event. Tags are the event's own; a fault payload becomes
    /// the record's `error`, anything else its `data`.
    pub fn log<I, T>(&self, tags: I, payload: LogPayload)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut record = envelope(EventKind::Server).with_tags(tags);
        match payload {
            LogPayload::Empty => {}
            LogPayload::Data(data) => record.data = Some(data),
            LogPayload::Error(error) => record.error = Some(error),
        }
        self.push(record);
    }

    /// An error raised while handling a request.
    pub fn request_error(
        &self,
        ctx: &RequestContext,
        error: impl Into<Failure>,
    ) -> Result<(), Error> {
        let record = build(EventKind::Error, Some(ctx), &self.inner.config)?.with_error(error);
        self.push(record);
        Ok(())
    }

    /// A completed response. Excluded paths and routes produce nothing; a
    /// status of 400 or more attaches the response body as `error`.
    pub fn response(&self, ctx: &RequestContext) -> Result<(), Error> {
        if ctx.route_excluded || self.inner.config.is_excluded(&ctx.path) {
            return Ok(());
        }

        let mut record = build(EventKind::Response, Some(ctx), &self.inner.config)?;
        record.code = Some(ctx.status_code);
        if ctx.status_code >= 400 {
            record.error = ctx.response_body.clone().map(Failure::Value);
        }
        self.push(record);
        Ok(())
    }

    /// Report a fatal error: enqueue it, flush, then exit the process with
    /// code 1 through the host. The exit happens whatever the flush outcome.
    pub async fn uncaught_exception(&self, fault: Fault) -> Delivery {
        self.push(uncaught_record(fault));
        let delivery = self.flush().await;
        self.inner.host.exit(1);
        delivery
    }

    /// Report a failure nobody awaited. The record waits for the next tick
    /// or for shutdown; there is no flush and no exit.
    pub fn unhandled_rejection(&self, error: impl Into<Failure>) {
        let record = envelope(EventKind::Error)
            .with_tags([BANANAS_TAG, "uncaught", "promise", "error"])
            .with_error(error);
        self.push(record);
    }

    /// Spawn a fallible task. With `uncaught_exception` enabled an `Err`
    /// outcome is reported as an unhandled rejection.
    pub fn spawn_watched<F, E>(&self, future: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: StdError + Send + Sync + 'static,
    {
        let engine = self.downgrade();
        tokio::spawn(async move {
            if let Err(err) = future.await {
                if let Some(engine) = engine.upgrade() {
                    if engine.inner.config.uncaught_exception {
                        engine.unhandled_rejection(Fault::from_error(&err));
                    }
                }
            }
        })
    }

    /// Forced flush: drain and send now, returning once the attempt is done.
    pub async fn flush(&self) -> Delivery {
        self.inner.scheduler.force_flush().await
    }

    /// Termination-signal path: enqueue the signal record, ask the host to
    /// stop, make sure the engine is shut down, then exit with code 0.
    pub async fn handle_signal(&self, signal: TermSignal) {
        info!(signal = signal.name(), "termination signal received");
        let record =
            envelope(EventKind::Server).with_tags([BANANAS_TAG, "signal", signal.name()]);
        self.push(record);

        self.inner.host.stop(self.inner.config.stop_timeout).await;
        self.shutdown().await;
        self.inner.host.exit(0);
    }

    /// Stop the timer, remove hooks, enqueue the `stopped` record and flush
    /// it. Later calls wait for the first one and do nothing else. Records
    /// reported after this returns are discarded.
    pub async fn shutdown(&self) {
        self.inner
            .shutdown
            .get_or_init(|| self.run_shutdown())
            .await;
    }

    async fn run_shutdown(&self) {
        debug!("stopping bananas engine");
        self.inner.scheduler.stop().await;

        let hook = lock(&self.inner.panic_hook).take();
        if let Some(mut hook) = hook {
            hook.remove();
        }
        let listeners = lock(&self.inner.signals).take();
        if let Some(listeners) = listeners {
            listeners.remove_all();
        }

        // Close before enqueuing `stopped` so it is the last record in.
        self.inner.closed.store(true, Ordering::Release);
        self.inner
            .buffer
            .push(envelope(EventKind::Server).with_tags([BANANAS_TAG, "stopped"]));
        self.flush().await;
        info!("bananas engine stopped");
    }

    /// Panic-hook path. Runs on the panicking thread, which may be a
    /// runtime worker, so the flush gets its own thread and runtime; the
    /// wait is bounded by the stop timeout before exiting with code 1.
    pub(crate) fn on_panic(&self, fault: Fault) {
        self.push(uncaught_record(fault));

        let flusher = Arc::clone(&self.inner.flusher);
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("bananas-fatal-flush".to_string())
            .spawn(move || {
                if let Ok(runtime) = Builder::new_current_thread().enable_all().build() {
                    let delivery = runtime.block_on(flusher.flush_fatal());
                    let _ = tx.send(delivery);
                }
            });

        let timeout = self.inner.config.stop_timeout;
        match spawned {
            Ok(_) => {
                if rx.recv_timeout(timeout).is_err() {
                    warn!(timeout_ms = timeout.as_millis() as u64, "fatal flush did not complete");
                }
            }
            Err(e) => warn!("failed to spawn fatal flush thread: {}", e),
        }

        self.inner.host.exit(1);
    }

    fn push(&self, record: Record) {
        if self.inner.closed.load(Ordering::Acquire) {
            return;
        }
        self.inner.buffer.push(record);
    }
}

fn uncaught_record(fault: Fault) -> Record {
    envelope(EventKind::Error)
        .with_tags([BANANAS_TAG, "uncaught", "error"])
        .with_error(fault)
}
