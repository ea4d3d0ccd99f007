//! Notification Dispatcher
//!
//! Publishes the four change kinds to subscribers registered in-process.
//!
//! # Delivery
//!
//! - Synchronous, on the emitting thread, in registration order.
//! - Listeners added during an emit are not called for that emit.
//! - Listeners removed during an emit are skipped if their turn has not come.
//! - `once` listeners are removed right before their first call.
//!
//! The registry lock is never held while a callback runs, so callbacks may
//! freely subscribe or unsubscribe.
//!
//! # Global instance
//!
//! [`global()`] is the single process-wide dispatcher, for code that cannot
//! be handed one explicitly. Everything else takes a [`Dispatcher`] by value
//! (it is a cheap handle onto a shared registry).

use std::sync::{Arc, LazyLock, Weak};

use parking_lot::Mutex;

use super::notification::{ChangeKind, ChangeNotification};
use super::page::PageMeta;

type Callback = Arc<dyn Fn(&ChangeNotification) + Send + Sync>;

/// The process-wide dispatcher.
static GLOBAL: LazyLock<Dispatcher> = LazyLock::new(Dispatcher::new);

/// Access the process-wide dispatcher.
pub fn global() -> &'static Dispatcher {
    &GLOBAL
}

/// Delivery options for a subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenOptions {
    /// Remove the subscription after its first delivery.
    pub once: bool,
}

struct Listener {
    id: u64,
    callback: Callback,
    once: bool,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: [Vec<Listener>; 4],
}

impl Registry {
    /// Remove a listener by id, returning whether it was present.
    fn remove(&mut self, kind: ChangeKind, id: u64) -> bool {
        let list = &mut self.listeners[kind.index()];
        match list.iter().position(|l| l.id == id) {
            Some(pos) => {
                list.remove(pos);
                true
            }
            None => false,
        }
    }
}

/// Hub publishing change notifications to subscribers.
#[derive(Clone, Default)]
pub struct Dispatcher {
    registry: Arc<Mutex<Registry>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.lock();
        let counts: Vec<_> = ChangeKind::ALL
            .iter()
            .map(|k| (k.event_name(), registry.listeners[k.index()].len()))
            .collect();
        f.debug_struct("Dispatcher").field("listeners", &counts).finish()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Subscribe
    // =========================================================================

    /// Register `callback` for one kind of notification.
    pub fn on<F>(&self, kind: ChangeKind, callback: F, options: ListenOptions) -> Subscription
    where
        F: Fn(&ChangeNotification) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners[kind.index()].push(Listener {
            id,
            callback: Arc::new(callback),
            once: options.once,
        });

        Subscription {
            kind,
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    pub fn on_change<F>(&self, callback: F, options: ListenOptions) -> Subscription
    where
        F: Fn(&ChangeNotification) + Send + Sync + 'static,
    {
        self.on(ChangeKind::Changed, callback, options)
    }

    pub fn on_create<F>(&self, callback: F, options: ListenOptions) -> Subscription
    where
        F: Fn(&ChangeNotification) + Send + Sync + 'static,
    {
        self.on(ChangeKind::Created, callback, options)
    }

    pub fn on_delete<F>(&self, callback: F, options: ListenOptions) -> Subscription
    where
        F: Fn(&ChangeNotification) + Send + Sync + 'static,
    {
        self.on(ChangeKind::Deleted, callback, options)
    }

    pub fn on_rename<F>(&self, callback: F, options: ListenOptions) -> Subscription
    where
        F: Fn(&ChangeNotification) + Send + Sync + 'static,
    {
        self.on(ChangeKind::Renamed, callback, options)
    }

    /// Register `callback` for changes to the file backing the current page.
    ///
    /// The marker is read once, now. Without a marker the subscription is
    /// still created but never fires. `options` apply to the underlying
    /// change subscription, so a `once` subscription is consumed by the first
    /// change of any file.
    pub fn on_current_page_change<F>(
        &self,
        marker: Option<&PageMeta>,
        callback: F,
        options: ListenOptions,
    ) -> Subscription
    where
        F: Fn(&ChangeNotification) + Send + Sync + 'static,
    {
        let current = marker.map(|m| m.fname.clone());
        self.on_change(
            move |n| {
                if current.as_deref() == Some(n.path.as_str()) {
                    callback(n);
                }
            },
            options,
        )
    }

    // =========================================================================
    // Emit
    // =========================================================================

    /// Deliver a notification to every subscriber of its kind.
    ///
    /// Returns the number of callbacks invoked.
    pub fn emit(&self, notification: &ChangeNotification) -> usize {
        let kind = notification.kind;
        let snapshot: Vec<(u64, Callback, bool)> = self.registry.lock().listeners[kind.index()]
            .iter()
            .map(|l| (l.id, Arc::clone(&l.callback), l.once))
            .collect();

        let mut delivered = 0;
        for (id, callback, once) in snapshot {
            {
                let mut registry = self.registry.lock();
                let still_registered = if once {
                    registry.remove(kind, id)
                } else {
                    registry.listeners[kind.index()].iter().any(|l| l.id == id)
                };
                if !still_registered {
                    continue;
                }
            }
            callback(notification);
            delivered += 1;
        }
        delivered
    }

    pub fn emit_changed(&self, path: impl Into<String>) -> usize {
        self.emit(&ChangeNotification::changed(path))
    }

    pub fn emit_created(&self, path: impl Into<String>) -> usize {
        self.emit(&ChangeNotification::created(path))
    }

    pub fn emit_deleted(&self, path: impl Into<String>) -> usize {
        self.emit(&ChangeNotification::deleted(path))
    }

    pub fn emit_renamed(&self, path: impl Into<String>, old_path: Option<String>) -> usize {
        self.emit(&ChangeNotification::renamed(path, old_path))
    }
}

/// Handle returned by every subscribe call.
///
/// Dropping the handle keeps the subscription alive; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug, Clone)]
pub struct Subscription {
    kind: ChangeKind,
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Remove exactly this callback. Calling it again is a no-op.
    ///
    /// Returns whether the subscription was still registered.
    pub fn unsubscribe(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.lock().remove(self.kind, self.id),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Shared log of `(tag, path)` pairs recorded by test callbacks.
    #[derive(Clone, Default)]
    struct Log(Arc<Mutex<Vec<(&'static str, String)>>>);

    impl Log {
        fn recorder(&self, tag: &'static str) -> impl Fn(&ChangeNotification) + Send + Sync + 'static {
            let log = self.clone();
            move |n: &ChangeNotification| log.0.lock().push((tag, n.path.clone()))
        }

        fn take(&self) -> Vec<(&'static str, String)> {
            std::mem::take(&mut *self.0.lock())
        }
    }

    fn count(hub: &Dispatcher, kind: ChangeKind) -> usize {
        hub.registry.lock().listeners[kind.index()].len()
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let hub = Dispatcher::new();
        let log = Log::default();
        hub.on_change(log.recorder("a"), ListenOptions::default());
        hub.on_change(log.recorder("b"), ListenOptions::default());
        hub.on_change(log.recorder("c"), ListenOptions::default());

        assert_eq!(hub.emit(&ChangeNotification::changed("index.html")), 3);
        assert_eq!(
            log.take(),
            vec![
                ("a", "index.html".to_string()),
                ("b", "index.html".to_string()),
                ("c", "index.html".to_string()),
            ]
        );
    }

    #[test]
    fn test_kinds_are_isolated() {
        let hub = Dispatcher::new();
        let log = Log::default();
        hub.on_change(log.recorder("change"), ListenOptions::default());
        hub.on_create(log.recorder("create"), ListenOptions::default());
        hub.on_delete(log.recorder("delete"), ListenOptions::default());
        hub.on_rename(log.recorder("rename"), ListenOptions::default());

        assert_eq!(hub.emit_created("new.html"), 1);
        assert_eq!(hub.emit_deleted("gone.html"), 1);
        assert_eq!(
            log.take(),
            vec![
                ("create", "new.html".to_string()),
                ("delete", "gone.html".to_string()),
            ]
        );
    }

    #[test]
    fn test_renamed_carries_old_path() {
        let hub = Dispatcher::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        hub.on_rename(
            move |n| *sink.lock() = Some(n.clone()),
            ListenOptions::default(),
        );

        hub.emit_renamed("new.js", Some("old.js".into()));
        let n = seen.lock().clone().unwrap();
        assert_eq!(n.path, "new.js");
        assert_eq!(n.old_path.as_deref(), Some("old.js"));
    }

    #[test]
    fn test_unsubscribe_only_removes_one() {
        let hub = Dispatcher::new();
        let log = Log::default();
        let a = hub.on_change(log.recorder("a"), ListenOptions::default());
        hub.on_change(log.recorder("b"), ListenOptions::default());

        assert!(a.unsubscribe());
        assert!(!a.unsubscribe());

        hub.emit(&ChangeNotification::changed("x.html"));
        assert_eq!(log.take(), vec![("b", "x.html".to_string())]);
        assert_eq!(count(&hub, ChangeKind::Changed), 1);
    }

    #[test]
    fn test_once_fires_once() {
        let hub = Dispatcher::new();
        let log = Log::default();
        hub.on_create(log.recorder("once"), ListenOptions { once: true });

        assert_eq!(hub.emit(&ChangeNotification::created("a.html")), 1);
        assert_eq!(hub.emit(&ChangeNotification::created("b.html")), 0);
        assert_eq!(log.take(), vec![("once", "a.html".to_string())]);
        assert_eq!(count(&hub, ChangeKind::Created), 0);
    }

    #[test]
    fn test_self_unsubscribe_during_delivery() {
        let hub = Dispatcher::new();
        let log = Log::default();

        let slot: Arc<Mutex<Option<Subscription>>> = Arc::default();
        let slot_in = Arc::clone(&slot);
        let first = log.recorder("first");
        let sub = hub.on_change(
            move |n| {
                first(n);
                if let Some(sub) = slot_in.lock().as_ref() {
                    sub.unsubscribe();
                }
            },
            ListenOptions::default(),
        );
        *slot.lock() = Some(sub);
        hub.on_change(log.recorder("second"), ListenOptions::default());

        hub.emit(&ChangeNotification::changed("a.html"));
        hub.emit(&ChangeNotification::changed("b.html"));
        assert_eq!(
            log.take(),
            vec![
                ("first", "a.html".to_string()),
                ("second", "a.html".to_string()),
                ("second", "b.html".to_string()),
            ]
        );
    }

    #[test]
    fn test_removed_during_delivery_is_skipped() {
        let hub = Dispatcher::new();
        let log = Log::default();

        let victim: Arc<Mutex<Option<Subscription>>> = Arc::default();
        let victim_in = Arc::clone(&victim);
        hub.on_change(
            move |_| {
                if let Some(sub) = victim_in.lock().as_ref() {
                    sub.unsubscribe();
                }
            },
            ListenOptions::default(),
        );
        *victim.lock() = Some(hub.on_change(log.recorder("victim"), ListenOptions::default()));

        assert_eq!(hub.emit(&ChangeNotification::changed("a.html")), 1);
        assert!(log.take().is_empty());
    }

    #[test]
    fn test_subscribe_during_delivery_waits_for_next_emit() {
        let hub = Dispatcher::new();
        let log = Log::default();

        let inner_hub = hub.clone();
        let inner_log = log.clone();
        hub.on_delete(
            move |_| {
                inner_hub.on_delete(inner_log.recorder("late"), ListenOptions { once: true });
            },
            ListenOptions { once: true },
        );

        assert_eq!(hub.emit(&ChangeNotification::deleted("a.html")), 1);
        assert!(log.take().is_empty());
        assert_eq!(hub.emit(&ChangeNotification::deleted("b.html")), 1);
        assert_eq!(log.take(), vec![("late", "b.html".to_string())]);
    }

    #[test]
    fn test_current_page_filter() {
        let hub = Dispatcher::new();
        let log = Log::default();
        let marker = PageMeta {
            fname: "index.html".into(),
            ..Default::default()
        };
        hub.on_current_page_change(Some(&marker), log.recorder("page"), ListenOptions::default());

        hub.emit(&ChangeNotification::changed("other.html"));
        hub.emit(&ChangeNotification::changed("index.html"));
        hub.emit(&ChangeNotification::created("index.html"));
        assert_eq!(log.take(), vec![("page", "index.html".to_string())]);
    }

    #[test]
    fn test_current_page_without_marker_never_fires() {
        let hub = Dispatcher::new();
        let log = Log::default();
        let _sub = hub.on_current_page_change(None, log.recorder("page"), ListenOptions::default());

        assert_eq!(count(&hub, ChangeKind::Changed), 1);
        hub.emit(&ChangeNotification::changed("index.html"));
        hub.emit(&ChangeNotification::changed(""));
        assert!(log.take().is_empty());
    }

    #[test]
    fn test_unsubscribe_after_dispatcher_dropped() {
        let hub = Dispatcher::new();
        let sub = hub.on_change(|_| {}, ListenOptions::default());
        drop(hub);
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn test_global_is_shared() {
        let log = Log::default();
        let sub = global().on_rename(log.recorder("global"), ListenOptions::default());
        global().emit(&ChangeNotification::renamed("__global_test_new", None));
        sub.unsubscribe();
        global().emit(&ChangeNotification::renamed("__global_test_after", None));

        let seen = log.take();
        assert_eq!(seen, vec![("global", "__global_test_new".to_string())]);
    }
}
