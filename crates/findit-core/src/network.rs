//! Connectivity gate for external provider calls
//!
//! Tracks connectivity as a broadcast status. Callers gate each external
//! call on `wait_for_connection`; every suspended waiter is released
//! together when connectivity returns.

use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use crate::cancel::CancelToken;
use crate::error::{FindItError, Result};

/// Observed connectivity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Connected,
    Disconnected,
    /// No observation yet; treated as passable so offline-capable setups
    /// never block on a monitor nobody feeds
    Unknown,
}

/// Process-wide connectivity monitor
pub struct NetworkMonitor {
    tx: watch::Sender<NetworkStatus>,
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkMonitor {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(NetworkStatus::Unknown);
        Self { tx }
    }

    pub fn status(&self) -> NetworkStatus {
        *self.tx.borrow()
    }

    /// Feed an observation; transitions wake every waiter at once
    pub fn set_status(&self, status: NetworkStatus) {
        let previous = *self.tx.borrow();
        if previous != status {
            info!("network status {:?} -> {:?}", previous, status);
        }
        let _ = self.tx.send(status);
    }

    /// Return once the network is usable
    ///
    /// Immediate when connected-or-unknown. Otherwise suspends until a
    /// transition to `Connected`, the timeout (`NetworkTimeout`), or
    /// cancellation (`Cancelled`).
    pub async fn wait_for_connection(
        &self,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<()> {
        let mut rx = self.tx.subscribe();
        if matches!(
            *rx.borrow(),
            NetworkStatus::Connected | NetworkStatus::Unknown
        ) {
            return Ok(());
        }

        let wait = async {
            loop {
                if rx.changed().await.is_err() {
                    // Monitor dropped; behave like an unknown network
                    return;
                }
                if *rx.borrow() == NetworkStatus::Connected {
                    return;
                }
            }
        };

        tokio::select! {
            () = cancel.cancelled() => Err(FindItError::Cancelled),
            outcome = tokio::time::timeout(timeout, wait) => match outcome {
                Ok(()) => Ok(()),
                Err(_) => Err(FindItError::NetworkTimeout),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unknown_passes_immediately() {
        let monitor = NetworkMonitor::new();
        monitor
            .wait_for_connection(Duration::from_secs(1), &CancelToken::never())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnected_times_out() {
        let monitor = NetworkMonitor::new();
        monitor.set_status(NetworkStatus::Disconnected);
        let err = monitor
            .wait_for_connection(Duration::from_secs(5), &CancelToken::never())
            .await
            .unwrap_err();
        assert!(matches!(err, FindItError::NetworkTimeout));
    }

    #[tokio::test]
    async fn test_all_waiters_release_together() {
        let monitor = Arc::new(NetworkMonitor::new());
        monitor.set_status(NetworkStatus::Disconnected);

        let mut waiters = Vec::new();
        for _ in 0..4 {
            let monitor = Arc::clone(&monitor);
            waiters.push(tokio::spawn(async move {
                monitor
                    .wait_for_connection(Duration::from_secs(30), &CancelToken::never())
                    .await
            }));
        }
        // Let waiters suspend before flipping the status
        tokio::task::yield_now().await;
        monitor.set_status(NetworkStatus::Connected);

        for waiter in waiters {
            waiter.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_cancellation_fails_waiter_with_cancelled() {
        let monitor = Arc::new(NetworkMonitor::new());
        monitor.set_status(NetworkStatus::Disconnected);
        let (source, token) = crate::cancel::CancelSource::new();

        let waiter = {
            let monitor = Arc::clone(&monitor);
            tokio::spawn(async move {
                monitor
                    .wait_for_connection(Duration::from_secs(30), &token)
                    .await
            })
        };
        tokio::task::yield_now().await;
        source.cancel();

        let err = waiter.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
    }
}
