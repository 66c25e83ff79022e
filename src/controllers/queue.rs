// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Rate-limited work queue of reconcile requests.

use crate::constants::rate_limit::{BASE_DELAY, MAX_DELAY};
use crate::store::{Kind, ObjectKey};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

/// Namespaced name of the object to reconcile; nothing else is carried
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Request {
    pub namespace: String,
    pub name: String,
}

impl Request {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Request {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn key(&self, kind: Kind) -> ObjectKey {
        ObjectKey::new(kind, self.namespace.clone(), self.name.clone())
    }
}

impl From<&ObjectKey> for Request {
    fn from(key: &ObjectKey) -> Self {
        Request::new(key.namespace.clone(), key.name.clone())
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Default)]
struct QueueState {
    items: VecDeque<Request>,
    failures: HashMap<Request, u32>,
    shutting_down: bool,
}

struct Inner {
    state: Mutex<QueueState>,
    available: Notify,
    base_delay: Duration,
    max_delay: Duration,
}

/// FIFO of requests with per-request exponential backoff.
/// Requests are not deduplicated; a single consumer is assumed.
#[derive(Clone)]
pub struct WorkQueue {
    inner: Arc<Inner>,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::with_backoff(BASE_DELAY, MAX_DELAY)
    }

    pub fn with_backoff(base_delay: Duration, max_delay: Duration) -> Self {
        WorkQueue {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                available: Notify::new(),
                base_delay,
                max_delay,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, request: Request) {
        {
            let mut state = self.state();
            if state.shutting_down {
                debug!("Queue is shutting down, dropping {}", request);
                return;
            }
            state.items.push_back(request);
        }
        self.inner.available.notify_one();
    }

    /// Wait for the next request; `None` once the queue is shut down
    pub async fn get(&self) -> Option<Request> {
        loop {
            let available = self.inner.available.notified();
            {
                let mut state = self.state();
                if state.shutting_down {
                    return None;
                }
                if let Some(request) = state.items.pop_front() {
                    return Some(request);
                }
            }
            available.await;
        }
    }

    /// Stop tracking failures for a request
    pub fn forget(&self, request: &Request) {
        self.state().failures.remove(request);
    }

    /// Re-enqueue after a delay that doubles with every consecutive failure
    pub fn add_rate_limited(&self, request: Request) {
        let delay = {
            let mut state = self.state();
            let failures = state.failures.entry(request.clone()).or_insert(0);
            let delay = backoff(self.inner.base_delay, self.inner.max_delay, *failures);
            *failures = failures.saturating_add(1);
            delay
        };
        debug!("Requeueing {} in {:?}", request, delay);
        self.add_after(request, delay);
    }

    pub fn add_after(&self, request: Request, delay: Duration) {
        if delay.is_zero() {
            self.add(request);
            return;
        }
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(request);
        });
    }

    pub fn num_requeues(&self, request: &Request) -> u32 {
        self.state().failures.get(request).copied().unwrap_or(0)
    }

    /// Wake every waiter and refuse new work
    pub fn shut_down(&self) {
        self.state().shutting_down = true;
        self.inner.available.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state().shutting_down
    }

    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn backoff(base: Duration, max: Duration, failures: u32) -> Duration {
    let factor = 1u32.checked_shl(failures).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    fn request(name: &str) -> Request {
        Request::new("demo", name)
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let base = Duration::from_millis(5);
        let max = Duration::from_secs(1000);
        assert_eq!(backoff(base, max, 0), Duration::from_millis(5));
        assert_eq!(backoff(base, max, 1), Duration::from_millis(10));
        assert_eq!(backoff(base, max, 4), Duration::from_millis(80));
        assert_eq!(backoff(base, max, 40), max);
    }

    #[test]
    fn test_request_from_key() {
        let key = ObjectKey::new(Kind::Configuration, "demo", "web");
        let request = Request::from(&key);
        assert_eq!(request.to_string(), "demo/web");
        assert_eq!(request.key(Kind::Configuration), key);
    }

    #[tokio::test]
    async fn test_fifo_order_without_dedup() {
        let queue = WorkQueue::new();
        queue.add(request("a"));
        queue.add(request("b"));
        queue.add(request("a"));
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.get().await, Some(request("a")));
        assert_eq!(queue.get().await, Some(request("b")));
        assert_eq!(queue.get().await, Some(request("a")));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_get_waits_for_add() {
        let queue = WorkQueue::new();
        let producer = queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            producer.add(request("late"));
        });
        let got = timeout(Duration::from_secs(1), queue.get()).await.unwrap();
        assert_eq!(got, Some(request("late")));
    }

    #[tokio::test]
    async fn test_rate_limited_counts_failures_per_request() {
        let queue = WorkQueue::with_backoff(Duration::from_millis(1), Duration::from_millis(10));
        queue.add_rate_limited(request("a"));
        queue.add_rate_limited(request("a"));
        queue.add_rate_limited(request("b"));
        assert_eq!(queue.num_requeues(&request("a")), 2);
        assert_eq!(queue.num_requeues(&request("b")), 1);

        queue.forget(&request("a"));
        assert_eq!(queue.num_requeues(&request("a")), 0);
        assert_eq!(queue.num_requeues(&request("b")), 1);

        for _ in 0..3 {
            assert!(timeout(Duration::from_secs(1), queue.get()).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_add_after_delays_delivery() {
        let queue = WorkQueue::new();
        queue.add_after(request("later"), Duration::from_millis(30));
        assert!(queue.is_empty());
        let got = timeout(Duration::from_secs(1), queue.get()).await.unwrap();
        assert_eq!(got, Some(request("later")));
    }

    #[tokio::test]
    async fn test_shutdown_wakes_waiters_and_drops_new_items() {
        let queue = WorkQueue::new();
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.shut_down();

        let got = timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert_eq!(got, None);

        queue.add(request("dropped"));
        assert!(queue.is_empty());
        assert!(queue.is_shutting_down());
    }
}
