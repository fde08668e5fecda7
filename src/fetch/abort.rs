//! Caller-driven request cancellation.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use super::FetchError;

/// Trigger side of a cancellation pair.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    sender: Arc<watch::Sender<bool>>,
}

/// Observer side of a cancellation pair. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    receiver: watch::Receiver<bool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// A signal that fires when this handle aborts.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn abort(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.sender.borrow()
    }
}

impl Default for AbortHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once aborted. Never resolves if every handle was dropped first.
    pub async fn aborted(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|aborted| *aborted).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Run `future` unless `signal` aborts first.
pub async fn abortable<T, F>(signal: Option<&AbortSignal>, future: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    match signal {
        None => future.await,
        Some(signal) => {
            tokio::select! {
                biased;
                _ = signal.aborted() => Err(FetchError::Aborted),
                result = future => result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_abort_is_visible_to_all_signals() {
        let handle = AbortHandle::new();
        let first = handle.signal();
        let second = first.clone();

        assert!(!first.is_aborted());
        handle.abort();

        assert!(handle.is_aborted());
        assert!(first.is_aborted());
        assert!(second.is_aborted());
    }

    #[tokio::test]
    async fn test_abortable_without_signal_runs_to_completion() {
        let result = abortable(None, async { Ok::<_, FetchError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abortable_stops_on_abort() {
        let handle = AbortHandle::new();
        let signal = handle.signal();

        let task = tokio::spawn(async move {
            abortable(Some(&signal), async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok::<_, FetchError>(())
            })
            .await
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.abort();

        assert!(matches!(task.await.unwrap(), Err(FetchError::Aborted)));
    }

    #[tokio::test]
    async fn test_already_aborted_signal_fails_immediately() {
        let handle = AbortHandle::new();
        handle.abort();

        let result = abortable(Some(&handle.signal()), async { Ok::<_, FetchError>(1) }).await;
        assert!(matches!(result, Err(FetchError::Aborted)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_never_aborts() {
        let signal = AbortHandle::new().signal();

        let result = abortable(Some(&signal), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, FetchError>("done")
        })
        .await;

        assert_eq!(result.unwrap(), "done");
    }
}
