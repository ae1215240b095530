use std::future::Future;

use async_shutdown::{ShutdownManager, ShutdownSignal};

/// Cancellation handle threaded through a drain.
///
/// Eviction workers and the disappearance waiter select this signal against
/// every API call and every sleep, so a triggered shutdown unwinds an
/// in-flight drain promptly instead of running out its retry budgets.
#[derive(Clone)]
pub struct Shutdown {
    manager: ShutdownManager<()>,
}

impl Shutdown {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Shutdown {
        Shutdown {
            manager: ShutdownManager::new(),
        }
    }

    /// Triggers the shutdown when the given future completes.
    pub fn new_with_signal<F>(signal: F) -> Shutdown
    where
        F: Future + Send + 'static,
    {
        let shutdown = Self::new();

        tokio::spawn({
            let manager = shutdown.manager.clone();

            async move {
                signal.await;
                _ = manager.trigger_shutdown(());
            }
        });

        shutdown
    }

    pub fn trigger(&self) {
        _ = self.manager.trigger_shutdown(());
    }

    pub fn is_triggered(&self) -> bool {
        self.manager.is_shutdown_triggered()
    }

    pub fn wait_triggered(&self) -> ShutdownSignal<()> {
        self.manager.wait_shutdown_triggered()
    }
}
