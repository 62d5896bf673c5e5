//! Command queue between producers and the transport session
//!
//! Unbounded FIFO: producers never block and never fail, exactly one
//! consumer drains it. A [`QueueItem::Close`] sentinel tells the consumer
//! to stop instead of being sent.

use gesture_bridge_shared::Command;
use tokio::sync::mpsc;
use tracing::debug;

/// One entry in the command queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueItem {
    Command(Command),
    /// Terminal sentinel
    Close,
}

/// Producer side; cheap to clone, one per producer
#[derive(Debug, Clone)]
pub struct CommandQueue {
    tx: mpsc::UnboundedSender<QueueItem>,
}

/// The single consumer side
#[derive(Debug)]
pub struct QueueConsumer {
    rx: mpsc::UnboundedReceiver<QueueItem>,
}

/// Create a connected producer/consumer pair
pub fn command_queue() -> (CommandQueue, QueueConsumer) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CommandQueue { tx }, QueueConsumer { rx })
}

impl CommandQueue {
    /// Append a command
    pub fn enqueue(&self, command: Command) {
        self.push(QueueItem::Command(command));
    }

    /// Append the close sentinel
    pub fn close(&self) {
        self.push(QueueItem::Close);
    }

    fn push(&self, item: QueueItem) {
        // The only failure is a consumer that already stopped; nothing is
        // listening any more so the item is simply dropped.
        if self.tx.send(item).is_err() {
            debug!("Command queue consumer gone, dropping {:?}", item);
        }
    }
}

impl QueueConsumer {
    /// Wait for the next item
    ///
    /// Once every producer is dropped the queue behaves as if closed.
    pub async fn dequeue(&mut self) -> QueueItem {
        self.rx.recv().await.unwrap_or(QueueItem::Close)
    }

    /// Drop everything currently queued, returning how many commands were lost
    pub fn discard_pending(&mut self) -> usize {
        let mut discarded = 0;
        while let Ok(item) = self.rx.try_recv() {
            if matches!(item, QueueItem::Command(_)) {
                discarded += 1;
            }
        }
        discarded
    }
}
