//! Process-level hooks: the panic hook and termination-signal listeners.

use crate::engine::WeakEngine;
use crate::record::Fault;
use std::backtrace::Backtrace;
use std::future::Future;
use std::io;
use std::panic::{self, PanicHookInfo};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use tokio::task::JoinHandle;
use tracing::debug;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type PanicHandler = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

/// Installed panic hook. Runs the previous hook, then reports the panic
/// through the engine. Removing it (or dropping it) restores the previous
/// hook.
pub(crate) struct PanicHook {
    previous: Option<Arc<PanicHandler>>,
}

impl PanicHook {
    pub(crate) fn install(engine: WeakEngine) -> Self {
        let previous: Arc<PanicHandler> = Arc::new(panic::take_hook());
        let chained = Arc::clone(&previous);

        panic::set_hook(Box::new(move |info| {
            chained(info);
            if let Some(engine) = engine.upgrade() {
                engine.on_panic(panic_fault(info));
            }
        }));

        debug!("panic hook installed");
        Self {
            previous: Some(previous),
        }
    }

    /// Restore the hook that was current at install time. Any hook set
    /// on top of ours since then is discarded.
    pub(crate) fn remove(&mut self) {
        let Some(previous) = self.previous.take() else {
            return;
        };
        // set_hook panics on a panicking thread.
        if thread::panicking() {
            return;
        }

        drop(panic::take_hook());
        match Arc::try_unwrap(previous) {
            Ok(handler) => panic::set_hook(handler),
            Err(shared) => panic::set_hook(Box::new(move |info| shared(info))),
        }
        debug!("panic hook removed");
    }
}

impl Drop for PanicHook {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Normalize a panic into a fault: payload as message, location and a
/// captured backtrace as stack.
pub(crate) fn panic_fault(info: &PanicHookInfo<'_>) -> Fault {
    let payload = info.payload();
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    };

    let location = info
        .location()
        .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
        .unwrap_or_else(|| "unknown".to_string());

    Fault::new(message).with_stack(format!(
        "panicked at {location}\n{}",
        Backtrace::force_capture()
    ))
}

/// Termination signals the engine can listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermSignal {
    Terminate,
    Interrupt,
}

impl TermSignal {
    /// Signals available on this platform.
    #[cfg(unix)]
    pub const SUPPORTED: &'static [TermSignal] = &[TermSignal::Terminate, TermSignal::Interrupt];
    #[cfg(not(unix))]
    pub const SUPPORTED: &'static [TermSignal] = &[TermSignal::Interrupt];

    pub fn name(self) -> &'static str {
        match self {
            TermSignal::Terminate => "SIGTERM",
            TermSignal::Interrupt => "SIGINT",
        }
    }
}

type Received = Pin<Box<dyn Future<Output = ()> + Send>>;

// The OS-level handler is registered here, before the listener task is
// spawned, so a signal sent right after `install` returns is not missed.
#[cfg(unix)]
fn listen(signal: TermSignal) -> io::Result<Received> {
    use tokio::signal::unix::{signal as os_signal, SignalKind};

    let kind = match signal {
        TermSignal::Terminate => SignalKind::terminate(),
        TermSignal::Interrupt => SignalKind::interrupt(),
    };
    let mut stream = os_signal(kind)?;
    Ok(Box::pin(async move {
        stream.recv().await;
    }))
}

#[cfg(not(unix))]
fn listen(_signal: TermSignal) -> io::Result<Received> {
    Ok(Box::pin(async {
        let _ = tokio::signal::ctrl_c().await;
    }))
}

struct Listener {
    signal: TermSignal,
    handle: JoinHandle<()>,
}

/// One single-shot listener task per supported signal.
///
/// A listener that fires removes itself from the registry before running
/// the engine's signal handler, so the shutdown it triggers cannot abort
/// it. Everything still registered is aborted by
/// [`remove_all`](Self::remove_all) or on drop.
///
/// Removal stops the engine from reacting, but tokio keeps its OS-level
/// handler for the rest of the process, so SIGTERM and SIGINT no longer
/// terminate the process by default afterwards. The handler is left in
/// place so a later `install` in the same process still receives signals.
pub(crate) struct SignalListeners {
    listeners: Arc<Mutex<Vec<Listener>>>,
}

impl SignalListeners {
    pub(crate) fn install(engine: WeakEngine) -> io::Result<Self> {
        let listeners = Arc::new(Mutex::new(Vec::new()));
        let this = Self {
            listeners: Arc::clone(&listeners),
        };

        // Held across the spawns so a listener that fires immediately
        // cannot deregister before it is registered.
        let mut registry = lock(&listeners);
        for &signal in TermSignal::SUPPORTED {
            let received = listen(signal)?;
            let own_registry = Arc::clone(&listeners);
            let engine = engine.clone();

            let handle = tokio::spawn(async move {
                received.await;
                lock(&own_registry).retain(|l| l.signal != signal);
                if let Some(engine) = engine.upgrade() {
                    engine.handle_signal(signal).await;
                }
            });
            registry.push(Listener { signal, handle });
            debug!(signal = signal.name(), "signal listener registered");
        }
        drop(registry);

        Ok(this)
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.listeners).len()
    }

    pub(crate) fn remove_all(&self) {
        let removed: Vec<Listener> = lock(&self.listeners).drain(..).collect();
        for listener in removed {
            listener.handle.abort();
            debug!(signal = listener.signal.name(), "signal listener removed");
        }
    }
}

impl Drop for SignalListeners {
    fn drop(&mut self) {
        self.remove_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_names_are_conventional() {
        assert_eq!(TermSignal::Terminate.name(), "SIGTERM");
        assert_eq!(TermSignal::Interrupt.name(), "SIGINT");
        assert!(TermSignal::SUPPORTED.contains(&TermSignal::Interrupt));
    }

    #[tokio::test]
    async fn listeners_are_counted_and_removed() {
        let listeners = SignalListeners::install(WeakEngine::dangling()).unwrap();
        assert_eq!(listeners.len(), TermSignal::SUPPORTED.len());

        listeners.remove_all();
        assert_eq!(listeners.len(), 0);

        // Idempotent.
        listeners.remove_all();
        assert_eq!(listeners.len(), 0);
    }

    #[tokio::test]
    async fn listeners_can_be_installed_again_after_removal() {
        let first = SignalListeners::install(WeakEngine::dangling()).unwrap();
        first.remove_all();
        drop(first);

        let second = SignalListeners::install(WeakEngine::dangling()).unwrap();
        assert_eq!(second.len(), TermSignal::SUPPORTED.len());
        second.remove_all();
    }
}
