//! Timeout and cancellation around every device cloud call.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{RemoteError, RemoteResult, RemoteTree};
use crate::models::RootPointer;

/// Wraps a tree so no call outlives its deadline or the job's cancellation
pub struct GuardedTree {
    inner: Arc<dyn RemoteTree>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl GuardedTree {
    pub fn new(inner: Arc<dyn RemoteTree>, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            inner,
            timeout,
            cancel,
        }
    }

    async fn guard<T>(
        &self,
        call: impl Future<Output = RemoteResult<T>> + Send,
    ) -> RemoteResult<T> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(RemoteError::Cancelled),
            result = tokio::time::timeout(self.timeout, call) => {
                result.unwrap_or(Err(RemoteError::Timeout(self.timeout)))
            }
        }
    }
}

#[async_trait]
impl RemoteTree for GuardedTree {
    async fn get_root_hash(&self) -> RemoteResult<RootPointer> {
        self.guard(self.inner.get_root_hash()).await
    }

    async fn put_root_hash(&self, hash: &str, expected_generation: u64) -> RemoteResult<u64> {
        self.guard(self.inner.put_root_hash(hash, expected_generation))
            .await
    }

    async fn get_blob(&self, hash: &str) -> RemoteResult<Vec<u8>> {
        self.guard(self.inner.get_blob(hash)).await
    }

    async fn put_blob(&self, hash: &str, filename: &str, bytes: Vec<u8>) -> RemoteResult<()> {
        self.guard(self.inner.put_blob(hash, filename, bytes)).await
    }

    async fn sync_complete(&self, generation: u64) -> RemoteResult<()> {
        self.guard(self.inner.sync_complete(generation)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryTree;

    #[tokio::test(flavor = "multi_thread")]
    async fn slow_calls_time_out() {
        let slow = Arc::new(MemoryTree::new().with_latency(Duration::from_millis(200)));
        let tree = GuardedTree::new(slow, Duration::from_millis(10), CancellationToken::new());

        assert!(matches!(
            tree.get_root_hash().await,
            Err(RemoteError::Timeout(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancelled_token_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let tree = GuardedTree::new(Arc::new(MemoryTree::new()), Duration::from_secs(5), cancel);

        assert!(matches!(tree.get_root_hash().await, Err(RemoteError::Cancelled)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fast_calls_pass_through() {
        let tree = GuardedTree::new(
            Arc::new(MemoryTree::new()),
            Duration::from_secs(5),
            CancellationToken::new(),
        );
        let entry = tree.put_text("a.content", "{}").await.unwrap();
        assert_eq!(tree.get_blob(&entry.hash).await.unwrap(), b"{}");
    }
}
