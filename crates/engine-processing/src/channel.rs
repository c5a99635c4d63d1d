use model::records::batch::Batch;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Creates the bounded channel between the document reader and the write workers.
///
/// Its capacity is the backpressure control: once full, the reader stops pulling pages.
pub fn transit(capacity: usize) -> (mpsc::Sender<Batch>, SharedReceiver<Batch>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, SharedReceiver::bounded(rx))
}

/// Creates the unbounded channel feeding the retry workers.
pub fn retry<T>() -> (mpsc::UnboundedSender<T>, SharedReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, SharedReceiver::unbounded(rx))
}

enum Receiver<T> {
    Bounded(mpsc::Receiver<T>),
    Unbounded(mpsc::UnboundedReceiver<T>),
}

/// Receiving half shared by a pool of workers.
///
/// Every item is delivered to exactly one worker, whichever asks first. Once all senders
/// are dropped and the buffer is drained, `recv` returns `None` to every worker.
pub struct SharedReceiver<T> {
    inner: Arc<Mutex<Receiver<T>>>,
}

impl<T> Clone for SharedReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedReceiver<T> {
    pub fn bounded(rx: mpsc::Receiver<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Receiver::Bounded(rx))),
        }
    }

    pub fn unbounded(rx: mpsc::UnboundedReceiver<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Receiver::Unbounded(rx))),
        }
    }

    /// Waits for the next item. Cancel safe.
    pub async fn recv(&self) -> Option<T> {
        let mut rx = self.inner.lock().await;
        match &mut *rx {
            Receiver::Bounded(rx) => rx.recv().await,
            Receiver::Unbounded(rx) => rx.recv().await,
        }
    }

    /// Items buffered and not yet taken by any worker.
    pub async fn pending(&self) -> usize {
        let rx = self.inner.lock().await;
        match &*rx {
            Receiver::Bounded(rx) => rx.len(),
            Receiver::Unbounded(rx) => rx.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn each_item_is_delivered_once() {
        let (tx, rx) = retry::<u32>();
        for i in 0..100 {
            tx.send(i).unwrap();
        }
        drop(tx);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let rx = rx.clone();
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(item) = rx.recv().await {
                    seen.push(item);
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn closed_and_drained_channel_returns_none() {
        let (tx, rx) = retry::<u32>();
        tx.send(1).unwrap();
        drop(tx);

        assert_eq!(rx.pending().await, 1);
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, None);
        assert_eq!(rx.clone().recv().await, None);
    }
}
