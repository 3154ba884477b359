//! Live result fan-out.
//!
//! ```text
//!                          ┌──────────────────────┐
//!  TrackController ──────▶ │  ResultBroadcaster   │ ──▶ LogObserver
//!   notify(&HeatResult)    │  id → Box<Observer>  │ ──▶ Subscription (channel, depth 8)
//!                          └──────────────────────┘ ──▶ ...
//! ```
//!
//! Delivery never blocks: an observer that is closed or whose queue is
//! full is dropped from the set and the rest still receive the event.
//! The set lives behind a critical-section mutex, so observers can come
//! and go while a notification is in flight on another thread.

use core::cell::RefCell;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, warn};

use super::events::LiveEvent;
use super::ports::{DeliveryError, ResultObserver};
use crate::model::HeatResult;

/// Queue depth of each [`Subscription`].
pub const SUBSCRIPTION_DEPTH: usize = 8;

/// Handle returned by [`ResultBroadcaster::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u32);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type BoxedObserver = Box<dyn ResultObserver + Send>;

#[derive(Default)]
struct Registry {
    next_id: u32,
    observers: Vec<(ObserverId, BoxedObserver)>,
}

pub struct ResultBroadcaster {
    registry: Mutex<CriticalSectionRawMutex, RefCell<Registry>>,
}

impl ResultBroadcaster {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(RefCell::new(Registry::default())),
        }
    }

    pub fn register(&self, observer: BoxedObserver) -> ObserverId {
        let id = self.registry.lock(|r| {
            let mut r = r.borrow_mut();
            let id = ObserverId(r.next_id);
            r.next_id = r.next_id.wrapping_add(1);
            r.observers.push((id, observer));
            id
        });
        debug!("BCAST | observer {} registered", id);
        id
    }

    /// Remove an observer.  Returns `false` if it was already gone.
    pub fn deregister(&self, id: ObserverId) -> bool {
        self.registry.lock(|r| {
            let mut r = r.borrow_mut();
            let before = r.observers.len();
            r.observers.retain(|(oid, _)| *oid != id);
            r.observers.len() != before
        })
    }

    pub fn observer_count(&self) -> usize {
        self.registry.lock(|r| r.borrow().observers.len())
    }

    /// Push a finished heat to every observer.  Returns how many accepted it.
    pub fn notify(&self, result: &HeatResult) -> usize {
        let event = LiveEvent::RaceResult {
            data: result.clone(),
        };
        self.registry.lock(|r| {
            let mut r = r.borrow_mut();
            let mut delivered = 0;
            r.observers.retain_mut(|(id, observer)| match observer.deliver(&event) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(e) => {
                    warn!("BCAST | dropping observer {}: {}", id, e);
                    false
                }
            });
            delivered
        })
    }

    /// Register a channel-backed observer and hand back its receiving end.
    pub fn subscribe(&self) -> Subscription {
        let shared = Arc::new(SubscriptionShared {
            channel: Channel::new(),
            closed: AtomicBool::new(false),
        });
        let id = self.register(Box::new(ChannelObserver {
            shared: Arc::clone(&shared),
        }));
        Subscription { id, shared }
    }
}

impl Default for ResultBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Channel observer
// ---------------------------------------------------------------------------

struct SubscriptionShared {
    channel: Channel<CriticalSectionRawMutex, LiveEvent, SUBSCRIPTION_DEPTH>,
    closed: AtomicBool,
}

struct ChannelObserver {
    shared: Arc<SubscriptionShared>,
}

impl ResultObserver for ChannelObserver {
    fn deliver(&mut self, event: &LiveEvent) -> Result<(), DeliveryError> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(DeliveryError::Closed);
        }
        self.shared
            .channel
            .try_send(event.clone())
            .map_err(|_| DeliveryError::Full)
    }
}

/// Receiving end of a live subscription.  Dropping it closes the channel
/// and the broadcaster forgets it on the next notification.
pub struct Subscription {
    id: ObserverId,
    shared: Arc<SubscriptionShared>,
}

impl Subscription {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    pub async fn recv(&self) -> LiveEvent {
        self.shared.channel.receive().await
    }

    pub fn try_recv(&self) -> Option<LiveEvent> {
        self.shared.channel.try_receive().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
    }
}
