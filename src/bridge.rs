//! The synchronous-asynchronous bridge.
//!
//! Every store-touching operation in this crate is `async`.
//! Synchronous callers use the `_blocking` variants of array and group
//! methods, which submit the underlying future to a process-wide event loop
//! and block the calling thread until it completes.
//!
//! The event loop is a lazily initialised [`tokio`] runtime that survives
//! across calls.
//! [`initialise`] and [`shutdown`] exist so tests (and embedders with strict
//! thread lifecycles) can control it explicitly; normal usage never needs
//! either.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Runtime;

static RUNTIME: Mutex<Option<Arc<Runtime>>> = Mutex::new(None);

fn runtime() -> Arc<Runtime> {
    let mut runtime = RUNTIME.lock();
    if let Some(runtime) = runtime.as_ref() {
        runtime.clone()
    } else {
        let new_runtime = Arc::new(
            tokio::runtime::Builder::new_multi_thread()
                .thread_name("gridstore-bridge")
                .build()
                .expect("failed to build the bridge runtime"),
        );
        *runtime = Some(new_runtime.clone());
        new_runtime
    }
}

/// Eagerly initialise the process-wide event loop.
///
/// Calling this is optional; the event loop starts on first use otherwise.
///
/// # Panics
/// Panics if the runtime cannot be built.
pub fn initialise() {
    let _ = runtime();
}

/// Shut down the process-wide event loop.
///
/// In-flight `_blocking` calls on other threads complete against the old
/// event loop; the next `_blocking` call starts a fresh one.
pub fn shutdown() {
    let runtime = RUNTIME.lock().take();
    drop(runtime);
}

/// Run `future` to completion on the process-wide event loop, blocking the
/// calling thread until it resolves.
///
/// # Panics
/// Panics if called from within an asynchronous context.
pub fn block_on<F: std::future::Future>(future: F) -> F::Output {
    runtime().block_on(future)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_block_on() {
        initialise();
        let out = block_on(async { 1u64 + 2 });
        assert_eq!(out, 3);
        shutdown();
        // The event loop restarts transparently after a shutdown.
        assert_eq!(block_on(async { 7u64 }), 7);
    }
}
