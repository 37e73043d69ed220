//! Deduplicating FIFO queue with in-flight tracking.

use std::collections::{HashSet, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// Bound for anything that can be stored in a [`WorkQueue`].
pub trait QueueItem: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> QueueItem for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

#[derive(Debug)]
struct State<T> {
    /// Items ready to be handed out, in order.
    queue: VecDeque<T>,
    /// Items that need processing. Every queued item is dirty; a dirty item
    /// that is also processing gets re-queued on `done`.
    dirty: HashSet<T>,
    /// Items currently handed out to a worker.
    processing: HashSet<T>,
    shutting_down: bool,
}

impl<T> Default for State<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            dirty: HashSet::new(),
            processing: HashSet::new(),
            shutting_down: false,
        }
    }
}

#[derive(Debug)]
struct Shared<T> {
    state: Mutex<State<T>>,
    notify: Notify,
    /// Cancelled by `shut_down`; pending delayed adds stop waiting on it.
    shutdown: CancellationToken,
    delayed: TaskTracker,
}

/// A deduplicating work queue safe for many producers and consumers.
///
/// Cloning is cheap and every clone refers to the same queue.
#[derive(Debug)]
pub struct WorkQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: QueueItem> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: QueueItem> WorkQueue<T> {
    /// Create a new empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                notify: Notify::new(),
                shutdown: CancellationToken::new(),
                delayed: TaskTracker::new(),
            }),
        }
    }

    // A poisoned lock only means a panic happened elsewhere while holding it;
    // the sets themselves are still consistent after every statement.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark an item as needing processing.
    ///
    /// No-op after [`shut_down`](Self::shut_down), or if the item is already
    /// waiting. An item that is currently processing is re-queued when its
    /// worker calls [`done`](Self::done).
    pub fn add(&self, item: T) {
        let mut state = self.lock();
        if state.shutting_down {
            debug!(item = ?item, "Queue is shutting down, dropping add");
            return;
        }
        if !state.dirty.insert(item.clone()) {
            return;
        }
        if state.processing.contains(&item) {
            return;
        }
        state.queue.push_back(item);
        drop(state);
        self.shared.notify.notify_one();
    }

    /// Add an item once `delay` has elapsed.
    ///
    /// The wait runs on the current tokio runtime. Without one, the item is
    /// added immediately. A pending wait ends early, dropping the item, when
    /// the queue shuts down.
    pub fn add_after(&self, item: T, delay: Duration) {
        if self.is_shutting_down() {
            return;
        }
        if delay.is_zero() {
            self.add(item);
            return;
        }
        match Handle::try_current() {
            Ok(handle) => {
                let queue = self.clone();
                let shutdown = self.shared.shutdown.clone();
                self.shared.delayed.spawn_on(
                    async move {
                        tokio::select! {
                            () = tokio::time::sleep(delay) => queue.add(item),
                            () = shutdown.cancelled() => {
                                debug!(item = ?item, "Queue shut down, dropping delayed add");
                            }
                        }
                    },
                    &handle,
                );
            }
            Err(_) => {
                warn!(item = ?item, "No async runtime for delayed add, adding immediately");
                self.add(item);
            }
        }
    }

    /// Wait for the next item.
    ///
    /// Returns `None` once the queue has been shut down and drained. The
    /// caller owns the returned item until it calls [`done`](Self::done).
    pub async fn get(&self) -> Option<T> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(item) = state.queue.pop_front() {
                    state.processing.insert(item.clone());
                    state.dirty.remove(&item);
                    return Some(item);
                }
                if state.shutting_down {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Wait for the next item and wrap it in a guard that calls
    /// [`done`](Self::done) when dropped.
    pub async fn acquire(&self) -> Option<InFlight<T>> {
        self.get().await.map(|item| InFlight {
            queue: self.clone(),
            item,
        })
    }

    /// Mark an item as finished processing.
    ///
    /// If the item was added again while it was processing, it goes back on
    /// the queue now.
    pub fn done(&self, item: &T) {
        let mut state = self.lock();
        state.processing.remove(item);
        if state.dirty.contains(item) {
            state.queue.push_back(item.clone());
            drop(state);
            self.shared.notify.notify_one();
        }
    }

    /// Stop accepting new items and wake every waiting consumer.
    ///
    /// Items already queued are still handed out by [`get`](Self::get).
    pub fn shut_down(&self) {
        self.lock().shutting_down = true;
        self.shared.shutdown.cancel();
        self.shared.delayed.close();
        self.shared.notify.notify_waiters();
    }

    /// Number of delayed adds still waiting for their delay.
    pub fn pending_delayed(&self) -> usize {
        self.shared.delayed.len()
    }

    /// Wait until every delayed add task has finished.
    ///
    /// Only returns after [`shut_down`](Self::shut_down), which also cuts
    /// short every pending delay.
    pub async fn wait_for_delayed(&self) {
        self.shared.delayed.wait().await;
    }

    /// Whether [`shut_down`](Self::shut_down) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }

    /// Number of items waiting to be handed out.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Check if no items are waiting.
    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }
}

/// An item taken off a [`WorkQueue`].
///
/// Dropping the guard marks the item done, on every exit path including
/// unwinding.
#[derive(Debug)]
pub struct InFlight<T: QueueItem> {
    queue: WorkQueue<T>,
    item: T,
}

impl<T: QueueItem> InFlight<T> {
    /// The item being processed.
    pub const fn item(&self) -> &T {
        &self.item
    }
}

impl<T: QueueItem> Drop for InFlight<T> {
    fn drop(&mut self) {
        self.queue.done(&self.item);
    }
}
