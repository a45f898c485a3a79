use crate::{
  error::RxError,
  observer::Observer,
  subscription::{Subscription, TeardownId},
};

/// An observer bound to the subscription that silences it.
///
/// The subscription is shared with whoever subscribed, so unsubscribing the
/// consumer drops every later notification. A terminal notification is
/// delivered at most once and then unsubscribes.
pub struct Subscriber<T> {
  observer: Box<dyn Observer<T>>,
  subscription: Subscription,
  stopped: bool,
}

impl<T> Subscriber<T> {
  pub fn new<O>(subscription: Subscription, observer: O) -> Self
  where
    O: Observer<T> + 'static,
  {
    Subscriber { observer: Box::new(observer), subscription, stopped: false }
  }

  pub fn subscription(&self) -> &Subscription { &self.subscription }

  /// `false` once a terminal notification went through or the subscription
  /// was cancelled.
  #[inline]
  pub fn is_subscribed(&self) -> bool { !self.stopped && self.subscription.is_subscribed() }

  pub fn add(&self, child: Subscription) -> Option<TeardownId> { self.subscription.add(child) }

  pub fn add_teardown<F>(&self, f: F) -> Option<TeardownId>
  where
    F: FnOnce() + Send + 'static,
  {
    self.subscription.add_teardown(f)
  }

  pub fn unsubscribe(&self) { self.subscription.unsubscribe() }
}

impl<T> Observer<T> for Subscriber<T> {
  fn on_next(&mut self, value: T) {
    if self.is_subscribed() {
      self.observer.on_next(value)
    }
  }

  fn on_error(&mut self, err: RxError) {
    if self.is_subscribed() {
      self.stopped = true;
      self.observer.on_error(err);
      self.subscription.unsubscribe();
    }
  }

  fn on_completed(&mut self) {
    if self.is_subscribed() {
      self.stopped = true;
      self.observer.on_completed();
      self.subscription.unsubscribe();
    }
  }
}
