//! Effect queue and observer registry.
//!
//! Committed transactions push their effects onto the [`EffectQueue`]; the
//! world moves them to an outbox once per command and the [`Notifier`] pumps
//! the outbox, handing every event to each observer in subscription order.
//! At most one thread pumps at a time, so events reach observers in commit
//! order even when an observer issues commands of its own.

use std::{
    collections::{BTreeMap, VecDeque},
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError},
};

use blockwork_core::Event;

/// Callback invoked for every published event.
pub type Observer = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handle identifying a registered observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subscription(u64);

impl Subscription {
    /// Numeric identifier of the registration.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

#[derive(Default)]
struct Registry {
    next: u64,
    observers: BTreeMap<Subscription, Observer>,
}

/// Explicit observer registry; there is no process-wide event bus.
#[derive(Default)]
pub struct Notifier {
    registry: Mutex<Registry>,
    delivering: Mutex<()>,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("observers", &self.observer_count())
            .finish()
    }
}

impl Notifier {
    /// Creates a registry without observers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `observer` and returns the handle that removes it.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        let subscription = Subscription(registry.next);
        registry.next = registry.next.saturating_add(1);
        let _ = registry.observers.insert(subscription, Arc::new(observer));
        subscription
    }

    /// Removes a registration. Returns `false` when it was already gone.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.lock().observers.remove(&subscription).is_some()
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.lock().observers.len()
    }

    /// Delivers `event` to every observer.
    ///
    /// Observers run after the registry lock is released, so a callback may
    /// subscribe or unsubscribe without deadlocking.
    pub fn publish(&self, event: &Event) {
        let observers: Vec<Observer> = self.lock().observers.values().cloned().collect();
        for observer in observers {
            observer(event);
        }
    }

    /// Publishes everything pending in `outbox`, oldest first.
    ///
    /// Returns immediately when another call is already pumping; that call
    /// picks up whatever this caller left in the outbox. A command issued
    /// from inside an observer therefore queues its events behind the ones
    /// being delivered instead of waiting on them.
    pub fn deliver(&self, outbox: &EffectQueue) {
        loop {
            let pumping = match self.delivering.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };
            while let Some(event) = outbox.pop() {
                self.publish(&event);
            }
            drop(pumping);
            if outbox.is_empty() {
                return;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// FIFO of committed effects awaiting publication.
#[derive(Debug, Default)]
pub struct EffectQueue {
    pending: Mutex<VecDeque<Event>>,
}

impl EffectQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a single effect.
    pub fn push(&self, event: Event) {
        self.lock().push_back(event);
    }

    /// Appends effects preserving their order.
    pub fn extend<I>(&self, events: I)
    where
        I: IntoIterator<Item = Event>,
    {
        self.lock().extend(events);
    }

    /// Removes and returns the oldest pending effect.
    pub fn pop(&self) -> Option<Event> {
        self.lock().pop_front()
    }

    /// Removes and returns every pending effect in queue order.
    pub fn drain(&self) -> Vec<Event> {
        self.lock().drain(..).collect()
    }

    /// Number of pending effects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Reports whether no effects are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Event>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockwork_core::{BlockId, GridCoord};

    fn started(id: u64) -> Event {
        Event::DragStarted {
            block: BlockId::new(id),
            origin: GridCoord::new(0, 0),
        }
    }

    #[test]
    fn observers_receive_events_until_unsubscribed() {
        let notifier = Notifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = notifier.subscribe(move |event| {
            sink.lock().expect("sink").push(event.clone());
        });

        notifier.publish(&started(1));
        assert!(notifier.unsubscribe(subscription));
        notifier.publish(&started(2));

        assert_eq!(*seen.lock().expect("seen"), vec![started(1)]);
        assert!(!notifier.unsubscribe(subscription));
        assert_eq!(notifier.observer_count(), 0);
    }

    #[test]
    fn each_observer_sees_each_event_once() {
        let notifier = Notifier::new();
        let counts = Arc::new(Mutex::new([0_usize; 2]));
        for slot in 0..2 {
            let counts = Arc::clone(&counts);
            let _ = notifier.subscribe(move |_| counts.lock().expect("counts")[slot] += 1);
        }

        notifier.publish(&started(1));
        notifier.publish(&started(2));

        assert_eq!(*counts.lock().expect("counts"), [2, 2]);
    }

    #[test]
    fn observer_may_unsubscribe_itself_during_publish() {
        let notifier = Arc::new(Notifier::new());
        let handle = Arc::new(Mutex::new(None));
        let inner_notifier = Arc::clone(&notifier);
        let inner_handle = Arc::clone(&handle);
        let subscription = notifier.subscribe(move |_| {
            if let Some(subscription) = inner_handle.lock().expect("handle").take() {
                let _ = inner_notifier.unsubscribe(subscription);
            }
        });
        *handle.lock().expect("handle") = Some(subscription);

        notifier.publish(&started(1));

        assert_eq!(notifier.observer_count(), 0);
    }

    #[test]
    fn nested_delivery_is_deferred_to_the_active_pump() {
        let notifier = Arc::new(Notifier::new());
        let outbox = Arc::new(EffectQueue::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (inner_notifier, inner_outbox, sink) =
            (Arc::clone(&notifier), Arc::clone(&outbox), Arc::clone(&seen));
        let _ = notifier.subscribe(move |event| {
            sink.lock().expect("sink").push(event.clone());
            if *event == started(1) {
                inner_outbox.push(started(2));
                inner_notifier.deliver(&inner_outbox);
                // Still pending: the outer pump owns delivery.
                assert_eq!(inner_outbox.len(), 1);
            }
        });

        outbox.push(started(1));
        notifier.deliver(&outbox);

        assert_eq!(*seen.lock().expect("seen"), vec![started(1), started(2)]);
        assert!(outbox.is_empty());
    }

    #[test]
    fn queue_drains_in_fifo_order() {
        let queue = EffectQueue::new();
        queue.push(started(1));
        queue.extend([started(2), started(3)]);
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.pop(), Some(started(1)));
        assert_eq!(queue.drain(), vec![started(2), started(3)]);
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
    }
}
