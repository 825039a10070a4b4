//! Change notification
//!
//! A [`Notifier`] holds subscriber callbacks and hands each of them the
//! batch of [`Op`]s produced by one call, or by one committed transaction.
//! [`Notifier::observe`] wraps a scope so its writes produce those Ops.

mod observed;

pub use observed::Observed;

use serde::{Serialize, Deserialize};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use log::debug;

use crate::config::StoreConfig;
use crate::effect::Scope;
use crate::error::{StoreError, Result};
use crate::models::{affected_tables, Op};

static NEXT_NOTIFIER: AtomicU64 = AtomicU64::new(1);

/// When Ops produced inside a transaction reach subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationMode {
    /// Buffer until commit; dropped on rollback
    #[default]
    PerTransaction,

    /// Deliver after each call, even inside a transaction
    Immediate,
}

/// Subscription handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Subscriber callback
pub type Callback = Arc<dyn Fn(&[Op]) + Send + Sync>;

struct NotifierInner {
    id: u64,
    subscribers: RwLock<Vec<(SubscriptionId, Callback)>>,
    next_id: AtomicU64,
    mode: NotificationMode,
}

/// Fan-out of Ops to subscribers
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<NotifierInner>,
}

impl Debug for Notifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Notifier")
            .field("mode", &self.inner.mode)
            .field("subscribers", &self.subscriber_count().unwrap_or(0))
            .finish()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(NotificationMode::default())
    }
}

impl Notifier {
    /// Create a notifier with no subscribers
    pub fn new(mode: NotificationMode) -> Self {
        Notifier {
            inner: Arc::new(NotifierInner {
                id: NEXT_NOTIFIER.fetch_add(1, Ordering::SeqCst),
                subscribers: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
                mode,
            }),
        }
    }

    /// Create a notifier using the configured delivery mode
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.notification)
    }

    /// Key of this notifier's buffer in a transaction
    pub(crate) fn id(&self) -> u64 {
        self.inner.id
    }

    /// Delivery mode
    pub fn mode(&self) -> NotificationMode {
        self.inner.mode
    }

    /// Register a callback
    pub fn subscribe<F>(&self, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&[Op]) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));

        let mut subscribers = self.inner.subscribers.write()
            .map_err(|e| StoreError::State(format!("Failed to write subscribers: {}", e)))?;
        subscribers.push((id, Arc::new(callback)));

        debug!("Added subscriber {:?}", id);
        Ok(id)
    }

    /// Remove a callback; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool> {
        let mut subscribers = self.inner.subscribers.write()
            .map_err(|e| StoreError::State(format!("Failed to write subscribers: {}", e)))?;

        let before = subscribers.len();
        subscribers.retain(|(sub, _)| *sub != id);

        Ok(subscribers.len() != before)
    }

    /// Number of registered callbacks
    pub fn subscriber_count(&self) -> Result<usize> {
        let subscribers = self.inner.subscribers.read()
            .map_err(|e| StoreError::State(format!("Failed to read subscribers: {}", e)))?;

        Ok(subscribers.len())
    }

    /// Hand a batch to every current subscriber
    ///
    /// The list is copied first, so callbacks may subscribe or unsubscribe.
    /// Empty batches are not delivered.
    pub fn dispatch(&self, ops: &[Op]) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }

        let snapshot: Vec<Callback> = {
            let subscribers = self.inner.subscribers.read()
                .map_err(|e| StoreError::State(format!("Failed to read subscribers: {}", e)))?;
            subscribers.iter().map(|(_, callback)| callback.clone()).collect()
        };

        debug!(
            "Dispatching {} ops on {:?} to {} subscribers",
            ops.len(),
            affected_tables(ops),
            snapshot.len()
        );

        for callback in snapshot {
            callback(ops);
        }

        Ok(())
    }

    /// Wrap a scope so its writes are reported to subscribers
    pub fn observe<S: Scope + Clone + 'static>(&self, scope: S) -> Observed<S> {
        Observed::new(scope, self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use std::sync::Mutex;

    fn insert(id: &str) -> Op {
        Op::Insert { table: "notes".to_string(), new_value: Record::new(id) }
    }

    #[test]
    fn test_subscribe_and_dispatch() {
        let notifier = Notifier::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let id = notifier
            .subscribe(move |ops| sink.lock().unwrap().push(ops.len()))
            .unwrap();

        notifier.dispatch(&[insert("a"), insert("b")]).unwrap();

        // Empty batches never reach subscribers
        notifier.dispatch(&[]).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![2]);

        assert!(notifier.unsubscribe(id).unwrap());
        assert!(!notifier.unsubscribe(id).unwrap());

        notifier.dispatch(&[insert("c")]).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_unsubscribe_during_dispatch() {
        let notifier = Notifier::default();
        let calls = Arc::new(Mutex::new(0));

        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let (inner, own_id, counter) = (notifier.clone(), slot.clone(), calls.clone());

        let id = notifier
            .subscribe(move |_| {
                *counter.lock().unwrap() += 1;
                if let Some(id) = *own_id.lock().unwrap() {
                    inner.unsubscribe(id).unwrap();
                }
            })
            .unwrap();
        *slot.lock().unwrap() = Some(id);

        notifier.dispatch(&[insert("a")]).unwrap();
        notifier.dispatch(&[insert("b")]).unwrap();

        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(notifier.subscriber_count().unwrap(), 0);
    }

    #[test]
    fn test_from_config() {
        assert_eq!(Notifier::from_config(&StoreConfig::default()).mode(), NotificationMode::PerTransaction);
        assert_eq!(Notifier::from_config(&StoreConfig::testing()).mode(), NotificationMode::Immediate);

        // Each notifier buffers separately inside a transaction
        assert_ne!(Notifier::default().id(), Notifier::default().id());
    }

    #[test]
    fn test_mode_serialization() {
        assert_eq!(serde_json::to_string(&NotificationMode::PerTransaction).unwrap(), "\"per_transaction\"");
        assert_eq!(NotificationMode::default(), NotificationMode::PerTransaction);
    }
}
