use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use super::control::DeviceControl;

/// Spawn the periodic offline monitor.
///
/// Each tick runs one [`DeviceControl::check_offline`] pass; offline
/// edges are published by the control itself. Stops when the shutdown
/// channel flips.
pub fn spawn_monitor(
    control: Arc<DeviceControl>,
    interval: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.tick().await; // Skip first immediate tick

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    control.check_offline().await;
                }
                _ = shutdown.changed() => {
                    info!("Device monitor shutting down");
                    return;
                }
            }
        }
    })
}
