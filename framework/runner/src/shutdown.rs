use hangar_core::prelude::ShutdownHandle;
use tokio::signal;

/// Request a shutdown when the process receives Ctrl-C.
///
/// Waits in progress give up with a cancellation error. Units that have already been launched keep
/// running, use one of the `clean-*` commands to stop them.
pub(crate) fn start_shutdown_listener(runtime: &tokio::runtime::Runtime) -> ShutdownHandle {
    let handle = ShutdownHandle::default();

    let listener_handle = handle.clone();
    runtime.spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                listener_handle.shutdown();
                println!("Received shutdown signal, shutting down...");
            }
            Err(e) => log::warn!("Failed to listen for Ctrl-C, waits can only time out: {}", e),
        }
    });

    handle
}
