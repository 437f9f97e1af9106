// src/application/signal.rs
//! Signal primitives for the signal-based notes client.
//!
//! A [`Signal`] holds a value and notifies subscribers whenever it is set.
//! A [`Computed`] derives its value from other signals and stays in sync with
//! them. An [`Effect`] is the guard returned by a subscription: dropping it
//! unsubscribes.
//!
//! Unlike a UI-thread signal graph, these are `Send + Sync` so an effect may
//! spawn tokio tasks that write back into other signals.
//!
//! ```
//! use noteflow::application::signal::{Computed, Signal};
//!
//! let count = Signal::new(2);
//! let factor = Signal::new(10);
//! let product = Computed::from2(&count, &factor, |c, f| c * f);
//!
//! count.set(3);
//! assert_eq!(product.get(), 30);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Inner<T> {
    value: RwLock<T>,
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
    next_listener: AtomicU64,
}

/// Shared reactive value. Clones share the same state.
pub struct Signal<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                value: RwLock::new(value),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(0),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Borrow the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self
            .inner
            .value
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn set(&self, value: T) {
        *self
            .inner
            .value
            .write()
            .unwrap_or_else(PoisonError::into_inner) = value;
        self.notify();
    }

    /// Set only when the value differs; returns whether subscribers ran.
    pub fn set_if_changed(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        {
            let mut guard = self
                .inner
                .value
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if *guard == value {
                return false;
            }
            *guard = value;
        }
        self.notify();
        true
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut *self
            .inner
            .value
            .write()
            .unwrap_or_else(PoisonError::into_inner));
        self.notify();
    }

    /// Run `f` after every change. The subscription lives as long as the
    /// returned [`Effect`].
    pub fn subscribe(&self, f: impl Fn(&T) + Send + Sync + 'static) -> Effect {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(f)));

        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        Effect::from_dispose(move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .retain(|(listener, _)| *listener != id);
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // Listeners run outside every lock so they may read or write signals,
    // including this one.
    fn notify(&self) {
        let listeners: Vec<Listener<T>> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        if listeners.is_empty() {
            return;
        }

        let value = self.get();
        for listener in listeners {
            listener(&value);
        }
    }
}

impl<T> fmt::Debug for Signal<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with(|value| f.debug_struct("Signal").field("value", value).finish())
    }
}

/// Subscription guard. Dropping it (or calling [`Effect::dispose`]) removes
/// the subscription.
pub struct Effect {
    dispose: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Effect {
    fn from_dispose(dispose: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            dispose: Some(Box::new(dispose)),
        }
    }

    /// Run `f` with the current value now and again after every change.
    pub fn new<T>(signal: &Signal<T>, f: impl Fn(&T) + Send + Sync + 'static) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        f(&signal.get());
        signal.subscribe(f)
    }

    pub fn dispose(mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("active", &self.dispose.is_some())
            .finish()
    }
}

/// A read-only value derived from other signals.
pub struct Computed<T> {
    value: Signal<T>,
    _sources: Vec<Effect>,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn from1<A>(a: &Signal<A>, f: impl Fn(&A) -> T + Send + Sync + 'static) -> Self
    where
        A: Clone + Send + Sync + 'static,
    {
        let value = Signal::new(a.with(&f));
        let target = value.clone();
        let source = a.subscribe(move |a| target.set(f(a)));
        Self {
            value,
            _sources: vec![source],
        }
    }

    pub fn from2<A, B>(
        a: &Signal<A>,
        b: &Signal<B>,
        f: impl Fn(&A, &B) -> T + Send + Sync + 'static,
    ) -> Self
    where
        A: Clone + Send + Sync + 'static,
        B: Clone + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let value = Signal::new(a.with(|a| b.with(|b| f(a, b))));

        let on_a = {
            let (target, b, f) = (value.clone(), b.clone(), Arc::clone(&f));
            a.subscribe(move |a| target.set(b.with(|b| f(a, b))))
        };
        let on_b = {
            let (target, a, f) = (value.clone(), a.clone(), Arc::clone(&f));
            b.subscribe(move |b| target.set(a.with(|a| f(a, b))))
        };

        Self {
            value,
            _sources: vec![on_a, on_b],
        }
    }

    pub fn get(&self) -> T {
        self.value.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.value.with(f)
    }

    pub fn subscribe(&self, f: impl Fn(&T) + Send + Sync + 'static) -> Effect {
        self.value.subscribe(f)
    }
}
