use std::{
  any::Any,
  fmt::{Debug, Formatter},
  panic::{catch_unwind, AssertUnwindSafe},
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
  },
};

use smallvec::SmallVec;
use tracing::{debug, error};

use crate::{
  error::{TeardownError, TeardownFault},
  observability::{components, events},
};

/// Identifies a teardown registered with [`Subscription::add`], so it can be
/// detached again with [`Subscription::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TeardownId(u64);

enum Teardown {
  Action(Box<dyn FnOnce() + Send>),
  Nested(Subscription),
}

impl Teardown {
  fn is_closed(&self) -> bool { matches!(self, Teardown::Nested(s) if !s.is_subscribed()) }

  fn run(self) -> Result<(), Vec<String>> {
    match self {
      Teardown::Action(f) => catch_unwind(AssertUnwindSafe(f)).map_err(|p| vec![panic_message(p)]),
      Teardown::Nested(s) => s
        .try_unsubscribe()
        .map_err(|e| e.faults.into_iter().map(|f| f.message).collect()),
    }
  }
}

struct Teardowns {
  next_id: u64,
  items: SmallVec<[(TeardownId, Teardown); 2]>,
}

struct Inner {
  active: AtomicBool,
  teardowns: Mutex<Teardowns>,
}

/// A cancellable, idempotent resource handle that doubles as a composite of
/// child subscriptions and teardown actions.
///
/// Clones share the same state. Once unsubscribed it stays closed, and every
/// teardown registered with it runs exactly once, in addition order.
#[derive(Clone)]
pub struct Subscription(Arc<Inner>);

impl Default for Subscription {
  fn default() -> Self { Self::new() }
}

impl Subscription {
  pub fn new() -> Self {
    Subscription(Arc::new(Inner {
      active: AtomicBool::new(true),
      teardowns: Mutex::new(Teardowns { next_id: 0, items: SmallVec::new() }),
    }))
  }

  /// A subscription that is already torn down.
  pub fn closed() -> Self {
    let s = Self::new();
    s.0.active.store(false, Ordering::Release);
    s
  }

  #[inline]
  pub fn is_subscribed(&self) -> bool { self.0.active.load(Ordering::Acquire) }

  /// Registers `child` to be unsubscribed with this one.
  ///
  /// If this subscription is already closed, `child` is unsubscribed
  /// immediately and `None` is returned. Adding a subscription to itself is
  /// ignored.
  pub fn add(&self, child: Subscription) -> Option<TeardownId> {
    if Arc::ptr_eq(&self.0, &child.0) {
      return None;
    }
    self.push(Teardown::Nested(child))
  }

  /// Registers an action to run on unsubscribe. Runs it right away when this
  /// subscription is already closed.
  pub fn add_teardown<F>(&self, f: F) -> Option<TeardownId>
  where
    F: FnOnce() + Send + 'static,
  {
    self.push(Teardown::Action(Box::new(f)))
  }

  /// Detaches a teardown without running it. Returns `false` when it already
  /// ran or was never registered here.
  pub fn remove(&self, id: TeardownId) -> bool {
    let mut inner = self.teardowns();
    let before = inner.items.len();
    inner.items.retain(|(tid, _)| *tid != id);
    inner.items.len() != before
  }

  /// Number of teardowns currently held.
  pub fn teardown_size(&self) -> usize { self.teardowns().items.len() }

  pub fn unsubscribe(&self) {
    if let Err(err) = self.try_unsubscribe() {
      error!(
        event = events::TEARDOWN_PANICKED,
        component = components::SUBSCRIPTION,
        faults = err.faults.len(),
        err = %err,
        "teardown actions panicked during unsubscribe"
      );
    }
  }

  /// Closes the subscription and runs its teardowns, reporting every
  /// teardown that panicked. A panicking teardown never stops the ones after
  /// it. Calls after the first are no-ops returning `Ok`.
  pub fn try_unsubscribe(&self) -> Result<(), TeardownError> {
    let items = {
      let mut inner = self.teardowns();
      if !self.0.active.swap(false, Ordering::AcqRel) {
        return Ok(());
      }
      std::mem::take(&mut inner.items)
    };

    debug!(
      event = events::SUBSCRIPTION_DRAINED,
      component = components::SUBSCRIPTION,
      teardowns = items.len(),
    );

    let mut faults = Vec::new();
    for (index, (_, teardown)) in items.into_iter().enumerate() {
      if let Err(messages) = teardown.run() {
        faults.extend(messages.into_iter().map(|message| TeardownFault { index, message }));
      }
    }

    if faults.is_empty() {
      Ok(())
    } else {
      Err(TeardownError { faults })
    }
  }

  /// Activates "RAII" behavior for this subscription: `unsubscribe()` is
  /// called as soon as the returned guard goes out of scope.
  ///
  /// **Attention:** If you don't assign the return value to a variable,
  /// `unsubscribe()` is called immediately.
  pub fn unsubscribe_when_dropped(self) -> SubscriptionGuard { SubscriptionGuard(self) }

  fn push(&self, teardown: Teardown) -> Option<TeardownId> {
    let mut inner = self.teardowns();
    if !self.is_subscribed() {
      drop(inner);
      if let Err(messages) = teardown.run() {
        let err = TeardownError {
          faults: messages.into_iter().map(|message| TeardownFault { index: 0, message }).collect(),
        };
        error!(
          event = events::TEARDOWN_PANICKED,
          component = components::SUBSCRIPTION,
          err = %err,
          "teardown added to a closed subscription panicked"
        );
      }
      return None;
    }
    inner.items.retain(|(_, t)| !t.is_closed());
    let id = TeardownId(inner.next_id);
    inner.next_id += 1;
    inner.items.push((id, teardown));
    Some(id)
  }

  fn teardowns(&self) -> MutexGuard<'_, Teardowns> {
    self.0.teardowns.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl Debug for Subscription {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("is_subscribed", &self.is_subscribed())
      .field("teardown_count", &self.teardown_size())
      .finish()
  }
}

/// An RAII implementation of a "scoped subscribed" of a subscription.
/// When this structure is dropped (falls out of scope), the subscription will
/// be unsubscribed.
///
/// If you want to drop it immediately, wrap it in its own scope.
#[derive(Debug)]
#[must_use]
pub struct SubscriptionGuard(Subscription);

impl SubscriptionGuard {
  pub fn new(subscription: Subscription) -> SubscriptionGuard { SubscriptionGuard(subscription) }

  pub fn subscription(&self) -> &Subscription { &self.0 }
}

impl Drop for SubscriptionGuard {
  #[inline]
  fn drop(&mut self) { self.0.unsubscribe() }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "non-string panic payload".to_string()
  }
}
