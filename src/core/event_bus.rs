//! Pub/Sub event bus for decoupled component communication.
//!
//! - `subscribe()` registers a callback and hands back a [`Subscription`] guard.
//!   Dropping the guard detaches the callback, so a torn-down widget can never
//!   leave a dangling listener behind.
//! - `emit()` invokes callbacks immediately AND queues the event.
//! - `poll()` drains the queue for batch processing in the UI loop.
//!
//! Callback order: FIFO within an event type. Cross-type order is undefined.

use log::warn;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

/// Maximum events in queue before oldest are evicted
const MAX_QUEUE_SIZE: usize = 1000;

/// Marker trait for events. Events must be Send + Sync + 'static.
pub trait Event: Any + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync + 'static> Event for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

type Callback = Arc<dyn Fn(&dyn Any) + Send + Sync>;
type Registry = RwLock<HashMap<TypeId, Vec<(u64, Callback)>>>;

/// Boxed event for queue storage
pub type BoxedEvent = Box<dyn Event>;

#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Registry>,
    queue: Arc<Mutex<Vec<BoxedEvent>>>,
    next_id: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_types", &self.subscribers.read().map(|s| s.len()).unwrap_or(0))
            .field("queue_len", &self.queue.lock().map(|q| q.len()).unwrap_or(0))
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            queue: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Subscribe to events of type E.
    ///
    /// The callback stays registered for as long as the returned guard lives.
    ///
    /// ```ignore
    /// let _sub = bus.subscribe::<FrameTick, _>(|tick| trace!("frame {}", tick.frame));
    /// ```
    pub fn subscribe<E, F>(&self, callback: F) -> Subscription
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let type_id = TypeId::of::<E>();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let wrapped: Callback = Arc::new(move |any: &dyn Any| {
            if let Some(event) = any.downcast_ref::<E>() {
                callback(event);
            }
        });
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(type_id)
            .or_default()
            .push((id, wrapped));

        Subscription {
            type_id,
            id,
            registry: Arc::downgrade(&self.subscribers),
        }
    }

    /// Emit event: invoke callbacks immediately AND queue for deferred processing.
    pub fn emit<E: Event>(&self, event: E) {
        // Snapshot the callbacks so a callback may subscribe or drop guards
        // without deadlocking on the registry lock.
        let callbacks: Vec<Callback> = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&TypeId::of::<E>())
            .map(|cbs| cbs.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();
        for cb in callbacks {
            cb(&event);
        }

        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() >= MAX_QUEUE_SIZE {
            let evict_count = queue.len() / 2;
            warn!("EventBus queue full ({} events), evicting oldest {}", queue.len(), evict_count);
            queue.drain(0..evict_count);
        }
        queue.push(Box::new(event));
    }

    /// Drain all queued events.
    pub fn poll(&self) -> Vec<BoxedEvent> {
        std::mem::take(&mut *self.queue.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Number of live subscriptions for event type E
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&TypeId::of::<E>())
            .map(|v| v.len())
            .unwrap_or(0)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Clear the deferred queue (subscriptions stay attached)
    pub fn clear_queue(&self) {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// Guard for a registered callback. Dropping it unsubscribes.
#[must_use = "dropping a Subscription detaches its callback immediately"]
pub struct Subscription {
    type_id: TypeId,
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Explicitly cancel the subscription.
    pub fn cancel(self) {}
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut map = registry.write().unwrap_or_else(|e| e.into_inner());
        if let Some(list) = map.get_mut(&self.type_id) {
            list.retain(|(id, _)| *id != self.id);
            if list.is_empty() {
                map.remove(&self.type_id);
            }
        }
    }
}

/// Downcast a polled event to a concrete type.
///
/// Goes through the `dyn Event` vtable; calling `as_any()` on the Box itself
/// would hit the blanket impl for `Box<dyn Event>` and never match.
pub fn downcast_event<E: Event>(event: &BoxedEvent) -> Option<&E> {
    (**event).as_any().downcast_ref::<E>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Clone, PartialEq)]
    struct Ping(u32);

    #[derive(Debug, Clone)]
    struct Pong;

    #[test]
    fn test_emit_invokes_and_queues() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _sub = bus.subscribe::<Ping, _>(move |p| {
            h.fetch_add(p.0 as usize, Ordering::SeqCst);
        });

        bus.emit(Ping(3));
        bus.emit(Pong);
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        let events = bus.poll();
        assert_eq!(events.len(), 2);
        assert_eq!(downcast_event::<Ping>(&events[0]), Some(&Ping(3)));
        assert!(downcast_event::<Ping>(&events[1]).is_none());
        assert_eq!(bus.queue_len(), 0);
    }

    #[test]
    fn test_dropping_subscription_detaches() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let sub = bus.subscribe::<Ping, _>(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(bus.subscriber_count::<Ping>(), 1);

        bus.emit(Ping(1));
        drop(sub);
        bus.emit(Ping(1));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count::<Ping>(), 0);
    }

    #[test]
    fn test_subscription_outlives_bus() {
        let bus = EventBus::new();
        let sub = bus.subscribe::<Ping, _>(|_| {});
        drop(bus);
        // Registry is gone; drop must be a no-op.
        sub.cancel();
    }

    #[test]
    fn test_queue_eviction() {
        let bus = EventBus::new();
        for i in 0..(MAX_QUEUE_SIZE as u32 + 10) {
            bus.emit(Ping(i));
        }
        assert!(bus.queue_len() <= MAX_QUEUE_SIZE);
        let events = bus.poll();
        let last = downcast_event::<Ping>(events.last().unwrap()).unwrap();
        assert_eq!(last.0, MAX_QUEUE_SIZE as u32 + 9);
    }
}
