use crate::{RelayError, Result};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Bounded FIFO shared by any number of producers and consumers
///
/// Senders wait while the mailbox is full. Receivers queue on a fair lock, so
/// waiting consumers are served in the order they started waiting.
pub struct Mailbox<T> {
    tx: mpsc::Sender<T>,
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Mailbox<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl<T> Mailbox<T> {
    /// Creates an empty mailbox holding at most `capacity` items
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Appends `item`, waiting for a free slot if the mailbox is full
    pub async fn send(&self, item: T) -> Result<()> {
        self.tx.send(item).await.map_err(|_| RelayError::MailboxClosed)
    }

    /// Appends `item` only if a slot is free right now
    pub fn try_send(&self, item: T) -> std::result::Result<(), T> {
        self.tx.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(item) | mpsc::error::TrySendError::Closed(item) => item,
        })
    }

    /// Takes the oldest item, waiting until one is available
    ///
    /// Cancel safe: dropping the future never loses an item.
    pub async fn recv(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    /// Number of items currently buffered
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}
