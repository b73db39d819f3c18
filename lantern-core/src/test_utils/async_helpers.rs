//! Async test helpers
//!
//! Timeouts for futures and channels, plus helpers for driving spawned tasks
//! under paused time.

use std::future::Future;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvTimeoutError {
    Timeout,
    Closed,
}

impl std::fmt::Display for RecvTimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecvTimeoutError::Timeout => write!(f, "receive operation timed out"),
            RecvTimeoutError::Closed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for RecvTimeoutError {}

/// Receive from a channel, giving up after `duration`
pub async fn recv_timeout<T>(rx: &mut mpsc::Receiver<T>, duration: Duration) -> Result<T, RecvTimeoutError> {
    timeout(duration, rx.recv())
        .await
        .map_err(|_| RecvTimeoutError::Timeout)?
        .ok_or(RecvTimeoutError::Closed)
}

/// Await `future`, panicking if it takes longer than `duration`
pub async fn assert_completes_within<F, T>(duration: Duration, future: F) -> T
where
    F: Future<Output = T>,
{
    match timeout(duration, future).await {
        Ok(value) => value,
        Err(_) => panic!("future did not complete within {:?}", duration),
    }
}

/// Give spawned tasks a chance to run to their next await point
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Move paused time forward, then let woken tasks run
#[cfg(any(test, feature = "test-util"))]
pub async fn advance_and_settle(duration: Duration) {
    tokio::time::advance(duration).await;
    settle().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recv_timeout() {
        let (tx, mut rx) = mpsc::channel(1);
        tx.send(7).await.unwrap();
        assert_eq!(recv_timeout(&mut rx, DEFAULT_TEST_TIMEOUT).await, Ok(7));

        assert_eq!(
            recv_timeout(&mut rx, Duration::from_millis(10)).await,
            Err(RecvTimeoutError::Timeout)
        );

        drop(tx);
        assert_eq!(recv_timeout(&mut rx, DEFAULT_TEST_TIMEOUT).await, Err(RecvTimeoutError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_advance_wakes_sleepers() {
        let (tx, mut rx) = mpsc::channel(1);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            let _ = tx.send(()).await;
        });
        settle().await;

        advance_and_settle(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());

        advance_and_settle(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_assert_completes_within() {
        let value = assert_completes_within(DEFAULT_TEST_TIMEOUT, async { 42 }).await;
        assert_eq!(value, 42);
    }
}
