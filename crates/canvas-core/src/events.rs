//! Typed observer bus.
//!
//! Handlers are plain `Fn(&E)` closures; whatever context they need is
//! captured explicitly when they are registered. `subscribe` hands back a
//! [`Subscription`] that detaches the handler when dropped, and a
//! [`Disposer`] collects subscriptions so teardown is a single call.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Handler<E> = Rc<dyn Fn(&E)>;

struct BusInner<E> {
    next_id: Cell<u64>,
    handlers: RefCell<Vec<(u64, Handler<E>)>>,
}

impl<E> BusInner<E> {
    fn remove(&self, id: u64) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|(hid, _)| *hid != id);
        handlers.len() != before
    }
}

/// A single-threaded broadcast bus for events of type `E`.
pub struct EventBus<E> {
    inner: Rc<BusInner<E>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Clones are handles to the same bus: a handler attached through one is
/// reached by `emit` on any other.
impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field(
                "handlers",
                &format!("<{} handlers>", self.inner.handlers.borrow().len()),
            )
            .finish()
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(BusInner {
                next_id: Cell::new(0),
                handlers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Number of attached handlers.
    pub fn listener_count(&self) -> usize {
        self.inner.handlers.borrow().len()
    }

    /// Detach every handler at once.
    pub fn clear(&self) {
        self.inner.handlers.borrow_mut().clear();
    }

    /// Deliver `event` to every handler attached at the time of the call.
    ///
    /// The handler list is copied first, so handlers may subscribe or
    /// unsubscribe (or emit again) without tripping the `RefCell`.
    pub fn emit(&self, event: &E) {
        let handlers: Vec<Handler<E>> = self
            .inner
            .handlers
            .borrow()
            .iter()
            .map(|(_, h)| Rc::clone(h))
            .collect();
        for handler in handlers {
            handler(event);
        }
    }
}

impl<E: 'static> EventBus<E> {
    /// Attach a handler. It stays attached until the returned
    /// subscription is dropped or explicitly unsubscribed.
    pub fn subscribe(&self, handler: impl Fn(&E) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .handlers
            .borrow_mut()
            .push((id, Rc::new(handler)));

        let weak: Weak<BusInner<E>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.remove(id);
            }
        })
    }
}

/// Handle to one attached handler. Dropping it detaches the handler.
#[must_use = "dropping a Subscription immediately detaches its handler"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    fn new(detach: impl FnOnce() + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.detach_now();
    }

    fn detach_now(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

/// Collects subscriptions across buses for single-call teardown.
#[derive(Debug, Default)]
pub struct Disposer {
    subscriptions: Vec<Subscription>,
}

impl Disposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Detach everything collected so far. Returns how many were detached.
    pub fn unsubscribe_all(&mut self) -> usize {
        let count = self.subscriptions.len();
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        count
    }
}
