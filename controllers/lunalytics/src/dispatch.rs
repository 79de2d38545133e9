//! Event delivery.
//!
//! Events for the same resource are handled one at a time in arrival order;
//! events for different resources run concurrently.

use crate::resource::{MonitorEvent, ResourceIdentity};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// Consumer of monitor events.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: MonitorEvent);
}

type Queues = Arc<Mutex<HashMap<ResourceIdentity, VecDeque<MonitorEvent>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Per-resource FIFO dispatcher.
///
/// An identity present in `queues` has exactly one worker draining it.
pub struct Dispatcher {
    handler: Arc<dyn EventHandler>,
    queues: Queues,
    tracker: TaskTracker,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("active", &lock(&self.queues).len())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(handler: Arc<dyn EventHandler>) -> Self {
        Self {
            handler,
            queues: Arc::default(),
            tracker: TaskTracker::new(),
        }
    }

    /// Queues `event` behind any in-flight event for the same resource.
    pub fn dispatch(&self, event: MonitorEvent) {
        let identity = match event.resource.identity() {
            Ok(identity) => identity,
            Err(e) => {
                warn!("Dropping {} event: {}", event.kind.as_str(), e);
                return;
            }
        };

        {
            let mut queues = lock(&self.queues);
            if let Some(pending) = queues.get_mut(&identity) {
                debug!("Queueing {} event for busy {}", event.kind.as_str(), identity);
                pending.push_back(event);
                return;
            }
            queues.insert(identity.clone(), VecDeque::new());
        }

        let handler = Arc::clone(&self.handler);
        let queues = Arc::clone(&self.queues);
        self.tracker.spawn(async move {
            let mut next = Some(event);
            while let Some(event) = next {
                handler.handle(event).await;

                let mut queues = lock(&queues);
                next = queues.get_mut(&identity).and_then(VecDeque::pop_front);
                if next.is_none() {
                    queues.remove(&identity);
                }
            }
        });
    }

    /// Stops accepting work and waits for in-flight events to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}
