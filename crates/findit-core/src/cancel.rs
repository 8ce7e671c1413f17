//! Cooperative cancellation
//!
//! A broadcast flag over a `watch` channel. The scheduler owns the source;
//! every indexer task and suspension point holds a token and checks or
//! awaits it at its cancellation points.

use tokio::sync::watch;

/// The cancelling side
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

/// A cheap, cloneable cancellation flag
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelSource {
    pub fn new() -> (CancelSource, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (CancelSource { tx }, CancelToken { rx })
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelToken {
    /// A token that can never fire, for callers outside any scheduler
    pub fn never() -> CancelToken {
        let (tx, rx) = watch::channel(false);
        // Leak the sender so the channel stays open
        std::mem::forget(tx);
        CancelToken { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation fires; a dropped source counts as cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_wakes_waiters() {
        let (source, token) = CancelSource::new();
        assert!(!token.is_cancelled());

        let waiter = {
            let token = token.clone();
            tokio::spawn(async move {
                token.cancelled().await;
                true
            })
        };
        source.cancel();
        assert!(waiter.await.unwrap());
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_never_token_stays_pending() {
        let token = CancelToken::never();
        assert!(!token.is_cancelled());
        let raced = tokio::time::timeout(std::time::Duration::from_millis(10), token.cancelled())
            .await
            .is_ok();
        assert!(!raced);
    }
}
