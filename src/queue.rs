//! Asynchronous producer/consumer handoff queue.
//!
//! [`AsyncQueue::add`] never blocks: it either hands the item straight to the
//! oldest waiting [`AsyncQueue::take`] or buffers it. Takers that find the
//! buffer empty park on a oneshot until a future `add` fulfils them.
//!
//! ```text
//! send_message ─► add ─┬─► waiter (oldest take) ─► writer task
//!                      └─► buffer ─────────────────► next take
//! ```
//!
//! Items are delivered in FIFO order and each item reaches exactly one taker.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::oneshot;

struct State<T> {
    items: VecDeque<T>,
    waiters: VecDeque<oneshot::Sender<T>>,
}

/// FIFO queue with async `take`.
pub struct AsyncQueue<T> {
    state: Mutex<State<T>>,
}

impl<T> AsyncQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Add an item, waking the oldest waiter if there is one.
    pub fn add(&self, item: T) {
        let mut state = self.state.lock();
        let mut item = item;

        // Waiters whose take() was dropped hand the item back.
        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.send(item) {
                Ok(()) => return,
                Err(returned) => item = returned,
            }
        }

        state.items.push_back(item);
    }

    /// Take the next item, waiting for one if the queue is empty.
    ///
    /// Dropping the future before it is woken leaves the queue untouched.
    /// Dropping it after `add` has handed it an item discards that item.
    pub async fn take(&self) -> T {
        let rx = {
            let mut state = self.state.lock();
            if let Some(item) = state.items.pop_front() {
                return item;
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            rx
        };

        match rx.await {
            Ok(item) => item,
            // The sender lives in `waiters` until `add` consumes it, and the
            // queue outlives this borrow, so the channel cannot close unsent.
            Err(_) => unreachable!("queue waiter dropped without an item"),
        }
    }

    /// Take the next item if one is buffered.
    pub fn try_take(&self) -> Option<T> {
        self.state.lock().items.pop_front()
    }

    /// Number of buffered items.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Check if no items are buffered.
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Number of parked takers.
    pub fn waiters(&self) -> usize {
        let state = self.state.lock();
        state.waiters.iter().filter(|w| !w.is_closed()).count()
    }
}

impl<T> Default for AsyncQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_take_buffered_in_order() {
        let queue = AsyncQueue::new();
        queue.add(1);
        queue.add(2);
        queue.add(3);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.take().await, 1);
        assert_eq!(queue.take().await, 2);
        assert_eq!(queue.try_take(), Some(3));
        assert_eq!(queue.try_take(), None);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_add_fulfils_waiter_directly() {
        let queue = Arc::new(AsyncQueue::new());

        let taker = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.take().await })
        };

        while queue.waiters() == 0 {
            tokio::task::yield_now().await;
        }
        queue.add("packet");

        assert_eq!(taker.await.unwrap(), "packet");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_waiters_served_fifo() {
        let queue = Arc::new(AsyncQueue::new());
        let mut takers = Vec::new();

        for expected in 0..3 {
            let queue_clone = queue.clone();
            takers.push(tokio::spawn(async move { queue_clone.take().await }));
            while queue.waiters() <= expected {
                tokio::task::yield_now().await;
            }
        }

        for i in 0..3 {
            queue.add(i);
        }

        for (i, taker) in takers.into_iter().enumerate() {
            assert_eq!(taker.await.unwrap(), i);
        }
    }

    #[tokio::test]
    async fn test_dropped_waiter_does_not_lose_item() {
        let queue = AsyncQueue::new();

        let abandoned = tokio::time::timeout(Duration::from_millis(10), queue.take()).await;
        assert!(abandoned.is_err());

        queue.add(7);

        assert_eq!(queue.try_take(), Some(7));
    }

    #[tokio::test]
    async fn test_each_item_delivered_once() {
        let queue = Arc::new(AsyncQueue::new());
        let mut consumers = Vec::new();

        for _ in 0..4 {
            let queue = queue.clone();
            consumers.push(tokio::spawn(async move {
                let mut got = Vec::new();
                for _ in 0..25 {
                    got.push(queue.take().await);
                }
                got
            }));
        }

        for i in 0..100 {
            queue.add(i);
            if i % 10 == 0 {
                tokio::task::yield_now().await;
            }
        }

        let mut all = Vec::new();
        for consumer in consumers {
            let got = consumer.await.unwrap();
            assert!(got.windows(2).all(|w| w[0] < w[1]));
            all.extend(got);
        }
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }
}
