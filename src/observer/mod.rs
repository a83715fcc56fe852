//! One-to-many event fan-out with weakly held observers.
//!
//! Producers of lifecycle events (scene changes, input device hot-plug) own
//! an [`ObserverMultiplexer`] and call [`ObserverMultiplexer::for_each_observer`];
//! consumers register a `Weak` to themselves and never have their lifetime
//! extended by the registration. Every observer runs on its own
//! [`Executor`], which may be inline or a background queue.
//!
//! Locking is two-level: the registry is a reader-writer lock (fan-out reads,
//! registration writes) and every entry has its own re-entrant lock held for
//! the duration of each callback. Unregistering takes the entry lock after the
//! registry lock has been released, so waiting on a slow observer never
//! stalls unrelated registrations.

pub mod executor;

pub use executor::{Executor, InlineExecutor, Work, WorkQueueExecutor};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock};
use std::cell::Cell;
use std::ops::Deref;
use std::sync::{Arc, Weak};

/// Registration side of a multiplexer, handed to consumers that only need
/// to subscribe.
pub trait ObserverRegistrar<T: ?Sized> {
    /// Register using the registrar's default executor
    fn register_interest(&self, observer: Weak<T>);

    fn register_interest_with(&self, observer: Weak<T>, executor: Arc<dyn Executor>);

    /// Remove `observer`. Blocks until any invocation currently running
    /// against it has returned. Unregistering an unknown observer is a no-op.
    fn unregister_interest(&self, observer: &T);
}

struct WeakObserver<T: ?Sized> {
    observer: Weak<T>,
    // Cleared by unregister; re-entrant so an observer may unregister itself
    // from inside its own callback.
    live: ReentrantMutex<Cell<bool>>,
}

/// A strong reference that keeps the entry lock held while in use
struct LockedObserver<'a, T: ?Sized> {
    _guard: ReentrantMutexGuard<'a, Cell<bool>>,
    observer: Arc<T>,
}

impl<T: ?Sized> Deref for LockedObserver<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.observer
    }
}

impl<T: ?Sized> WeakObserver<T> {
    fn new(observer: Weak<T>) -> Self {
        Self {
            observer,
            live: ReentrantMutex::new(Cell::new(true)),
        }
    }

    fn lock(&self) -> Option<LockedObserver<'_, T>> {
        let guard = self.live.lock();
        if !guard.get() {
            return None;
        }
        let observer = self.observer.upgrade()?;
        Some(LockedObserver {
            _guard: guard,
            observer,
        })
    }

    /// Waits for any other thread currently inside a callback on this entry
    fn reset(&self) {
        self.live.lock().set(false);
    }

    fn is(&self, other: *const T) -> bool {
        std::ptr::addr_eq(self.observer.as_ptr(), other)
    }

    fn expired(&self) -> bool {
        self.observer.strong_count() == 0
    }
}

struct Registration<T: ?Sized> {
    executor: Arc<dyn Executor>,
    observer: Arc<WeakObserver<T>>,
}

impl<T: ?Sized> Clone for Registration<T> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            observer: self.observer.clone(),
        }
    }
}

pub struct ObserverMultiplexer<T: ?Sized> {
    default_executor: Arc<dyn Executor>,
    observers: RwLock<Vec<Registration<T>>>,
}

impl<T: ?Sized + Send + Sync + 'static> ObserverMultiplexer<T> {
    /// `default_executor` is used for every observer registered without an
    /// explicit one.
    pub fn new(default_executor: Arc<dyn Executor>) -> Self {
        Self {
            default_executor,
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Invoke `f` on every registered observer, each on its own executor.
    ///
    /// Liveness is checked when the job runs, not when it is queued: an
    /// observer that is dropped or unregistered in between is skipped.
    pub fn for_each_observer<F>(&self, f: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let f: Arc<dyn Fn(&T) + Send + Sync> = Arc::new(f);

        // Inline executors may re-enter the registry, so jobs are spawned
        // from a snapshot rather than under the read lock.
        let snapshot: Vec<Registration<T>> = self.observers.read().clone();

        for registration in snapshot {
            let f = f.clone();
            let weak_observer = registration.observer;
            registration.executor.spawn(Box::new(move || {
                if let Some(observer) = weak_observer.lock() {
                    f(&observer);
                }
            }));
        }
    }

    /// Number of registered observers that are still alive
    pub fn len(&self) -> usize {
        self.observers
            .read()
            .iter()
            .filter(|r| !r.observer.expired())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: ?Sized + Send + Sync + 'static> ObserverRegistrar<T> for ObserverMultiplexer<T> {
    fn register_interest(&self, observer: Weak<T>) {
        self.register_interest_with(observer, self.default_executor.clone());
    }

    fn register_interest_with(&self, observer: Weak<T>, executor: Arc<dyn Executor>) {
        self.observers.write().push(Registration {
            executor,
            observer: Arc::new(WeakObserver::new(observer)),
        });
    }

    fn unregister_interest(&self, observer: &T) {
        let target = observer as *const T;
        let mut removed = Vec::new();

        {
            let mut observers = self.observers.write();
            observers.retain(|candidate| {
                if candidate.observer.is(target) {
                    removed.push(candidate.observer.clone());
                    return false;
                }
                // Prune anything that died without unregistering
                !candidate.observer.expired()
            });
        }

        for entry in removed {
            entry.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    trait Counter: Send + Sync {
        fn bump(&self, by: usize);
    }

    #[derive(Default)]
    struct CountingObserver {
        count: AtomicUsize,
    }

    impl Counter for CountingObserver {
        fn bump(&self, by: usize) {
            self.count.fetch_add(by, Ordering::SeqCst);
        }
    }

    /// Queues work until explicitly drained, like a main loop
    #[derive(Default)]
    struct DeferredExecutor {
        queue: Mutex<VecDeque<Work>>,
    }

    impl DeferredExecutor {
        fn run_pending(&self) -> usize {
            let mut ran = 0;
            loop {
                let next = self.queue.lock().pop_front();
                match next {
                    Some(work) => {
                        work();
                        ran += 1;
                    }
                    None => return ran,
                }
            }
        }
    }

    impl Executor for DeferredExecutor {
        fn spawn(&self, work: Work) {
            self.queue.lock().push_back(work);
        }
    }

    fn multiplexer() -> ObserverMultiplexer<dyn Counter> {
        ObserverMultiplexer::new(Arc::new(InlineExecutor))
    }

    fn weak(observer: &Arc<CountingObserver>) -> Weak<dyn Counter> {
        let observer: Arc<dyn Counter> = observer.clone();
        Arc::downgrade(&observer)
    }

    #[test]
    fn test_fans_out_to_every_observer() {
        let mux = multiplexer();
        let a = Arc::new(CountingObserver::default());
        let b = Arc::new(CountingObserver::default());
        mux.register_interest(weak(&a));
        mux.register_interest(weak(&b));

        mux.for_each_observer(|o| o.bump(2));

        assert_eq!(a.count.load(Ordering::SeqCst), 2);
        assert_eq!(b.count.load(Ordering::SeqCst), 2);
        assert_eq!(mux.len(), 2);
    }

    #[test]
    fn test_registration_does_not_extend_lifetime() {
        let mux = multiplexer();
        let a = Arc::new(CountingObserver::default());
        mux.register_interest(weak(&a));
        drop(a);

        // Nothing to call, nothing to crash
        mux.for_each_observer(|o| o.bump(1));
        assert!(mux.is_empty());
    }

    #[test]
    fn test_unregistered_observer_is_not_called() {
        let mux = multiplexer();
        let a = Arc::new(CountingObserver::default());
        let b = Arc::new(CountingObserver::default());
        mux.register_interest(weak(&a));
        mux.register_interest(weak(&b));

        mux.unregister_interest(&*a);
        mux.for_each_observer(|o| o.bump(1));

        assert_eq!(a.count.load(Ordering::SeqCst), 0);
        assert_eq!(b.count.load(Ordering::SeqCst), 1);

        // Idempotent
        mux.unregister_interest(&*a);
        assert_eq!(mux.len(), 1);
    }

    #[test]
    fn test_unregister_prunes_expired_entries() {
        let mux = multiplexer();
        let a = Arc::new(CountingObserver::default());
        let b = Arc::new(CountingObserver::default());
        mux.register_interest(weak(&a));
        mux.register_interest(weak(&b));
        drop(a);

        mux.unregister_interest(&*b);
        assert!(mux.observers.read().is_empty());
    }

    #[test]
    fn test_liveness_is_checked_at_invocation_time() {
        let deferred = Arc::new(DeferredExecutor::default());
        let mux: ObserverMultiplexer<dyn Counter> = ObserverMultiplexer::new(deferred.clone());

        let dies = Arc::new(CountingObserver::default());
        let leaves = Arc::new(CountingObserver::default());
        let stays = Arc::new(CountingObserver::default());
        mux.register_interest(weak(&dies));
        mux.register_interest(weak(&leaves));
        mux.register_interest(weak(&stays));

        mux.for_each_observer(|o| o.bump(1));

        // Both happen after the jobs were queued
        let dies_probe = Arc::downgrade(&dies);
        drop(dies);
        mux.unregister_interest(&*leaves);

        assert_eq!(deferred.run_pending(), 3);
        assert!(dies_probe.upgrade().is_none());
        assert_eq!(leaves.count.load(Ordering::SeqCst), 0);
        assert_eq!(stays.count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_per_observer_executor() {
        let deferred = Arc::new(DeferredExecutor::default());
        let mux = multiplexer();
        let inline = Arc::new(CountingObserver::default());
        let queued = Arc::new(CountingObserver::default());
        mux.register_interest(weak(&inline));
        mux.register_interest_with(weak(&queued), deferred.clone());

        mux.for_each_observer(|o| o.bump(1));
        assert_eq!(inline.count.load(Ordering::SeqCst), 1);
        assert_eq!(queued.count.load(Ordering::SeqCst), 0);

        deferred.run_pending();
        assert_eq!(queued.count.load(Ordering::SeqCst), 1);
    }

    struct SelfRemoving {
        mux: Weak<ObserverMultiplexer<dyn Counter>>,
        me: Mutex<Weak<SelfRemoving>>,
        calls: AtomicUsize,
    }

    impl Counter for SelfRemoving {
        fn bump(&self, _by: usize) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let (Some(mux), Some(me)) = (self.mux.upgrade(), self.me.lock().upgrade()) {
                mux.unregister_interest(&*me as &dyn Counter);
            }
        }
    }

    #[test]
    fn test_observer_can_unregister_itself_from_callback() {
        let mux = Arc::new(multiplexer());
        let observer = Arc::new(SelfRemoving {
            mux: Arc::downgrade(&mux),
            me: Mutex::new(Weak::new()),
            calls: AtomicUsize::new(0),
        });
        *observer.me.lock() = Arc::downgrade(&observer);
        let as_dyn: Arc<dyn Counter> = observer.clone();
        mux.register_interest(Arc::downgrade(&as_dyn));

        mux.for_each_observer(|o| o.bump(1));
        mux.for_each_observer(|o| o.bump(1));

        assert_eq!(observer.calls.load(Ordering::SeqCst), 1);
        assert!(mux.is_empty());
    }

    struct SlowObserver {
        entered: Mutex<Option<mpsc::Sender<()>>>,
        finished: AtomicBool,
    }

    impl Counter for SlowObserver {
        fn bump(&self, _by: usize) {
            if let Some(tx) = self.entered.lock().take() {
                let _ = tx.send(());
            }
            thread::sleep(Duration::from_millis(100));
            self.finished.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_unregister_waits_for_in_flight_call() {
        let mux = Arc::new(multiplexer());
        let (tx, rx) = mpsc::channel();
        let slow = Arc::new(SlowObserver {
            entered: Mutex::new(Some(tx)),
            finished: AtomicBool::new(false),
        });
        let as_dyn: Arc<dyn Counter> = slow.clone();
        mux.register_interest(Arc::downgrade(&as_dyn));

        let fan_out = {
            let mux = mux.clone();
            thread::spawn(move || mux.for_each_observer(|o| o.bump(1)))
        };

        rx.recv_timeout(Duration::from_secs(5))
            .expect("observer never entered");
        mux.unregister_interest(&*as_dyn);
        assert!(slow.finished.load(Ordering::SeqCst));

        fan_out.join().unwrap();
    }

    #[test]
    fn test_unregister_does_not_wait_for_other_observers() {
        let mux = Arc::new(multiplexer());
        let (tx, rx) = mpsc::channel();
        let slow = Arc::new(SlowObserver {
            entered: Mutex::new(Some(tx)),
            finished: AtomicBool::new(false),
        });
        let quick = Arc::new(CountingObserver::default());
        let slow_dyn: Arc<dyn Counter> = slow.clone();
        mux.register_interest(Arc::downgrade(&slow_dyn));
        mux.register_interest(weak(&quick));

        let fan_out = {
            let mux = mux.clone();
            thread::spawn(move || mux.for_each_observer(|o| o.bump(1)))
        };

        rx.recv_timeout(Duration::from_secs(5))
            .expect("observer never entered");
        let quick_dyn: Arc<dyn Counter> = quick.clone();
        mux.unregister_interest(&*quick_dyn);
        // The slow callback is still sleeping
        assert!(!slow.finished.load(Ordering::SeqCst));

        fan_out.join().unwrap();
        assert!(slow.finished.load(Ordering::SeqCst));
    }
}
