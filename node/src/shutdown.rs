//! Stop signal for the daemon's background tasks.
//!
//! The producer loop `select!`s on a receiver from [`ShutdownController`];
//! the daemon fires it on SIGINT/SIGTERM.

use tokio::signal;
use tokio::sync::broadcast;

pub struct ShutdownController {
    tx: broadcast::Sender<()>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }

    /// Wait for SIGINT or SIGTERM, then notify every subscriber.
    pub async fn wait_for_signal(&self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            tokio::select! {
                res = signal::ctrl_c() => {
                    res?;
                    tracing::info!("received SIGINT, stopping");
                }
                _ = terminate.recv() => tracing::info!("received SIGTERM, stopping"),
            }
        }
        #[cfg(not(unix))]
        {
            signal::ctrl_c().await?;
            tracing::info!("received SIGINT, stopping");
        }

        self.shutdown();
        Ok(())
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_is_notified() {
        let controller = ShutdownController::new();
        let mut a = controller.subscribe();
        let mut b = controller.subscribe();
        controller.shutdown();
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[test]
    fn shutdown_without_subscribers_is_harmless() {
        ShutdownController::default().shutdown();
    }
}
