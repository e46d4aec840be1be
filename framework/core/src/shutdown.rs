use std::sync::Arc;

use tokio::sync::watch;

/// Owner side of the shutdown signal.
///
/// The signal is level-triggered: once [ShutdownHandle::shutdown] has been called, every existing
/// and every future listener observes it.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: Arc::new(watch::channel(false).0),
        }
    }

    pub fn shutdown(&self) {
        let was_shutdown = self.sender.send_replace(true);
        if was_shutdown {
            log::debug!("Shutdown was already requested");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener::new(self.sender.subscribe())
    }
}

#[derive(Clone, Debug)]
pub struct DelegatedShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl DelegatedShutdownListener {
    pub(crate) fn new(receiver: watch::Receiver<bool>) -> Self {
        Self { receiver }
    }

    /// Point in time check if the shutdown signal has been received.
    pub fn should_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait for the shutdown signal. Safe to race against other futures with `tokio::select!`.
    ///
    /// If every [ShutdownHandle] is dropped without requesting a shutdown then this never resolves.
    pub async fn wait_for_shutdown(&mut self) {
        let handle_dropped = self.receiver.wait_for(|stop| *stop).await.is_err();
        if handle_dropped {
            std::future::pending::<()>().await;
        }
    }
}
