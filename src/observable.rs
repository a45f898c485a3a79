//! Producers of notification sequences.

use std::sync::Arc;

use crate::{
  error::RxError,
  observer::{observer_all, observer_fn, Observer},
  scheduler::trampoline,
  subscriber::Subscriber,
  subscription::Subscription,
};

mod create;
mod from_iter;
mod interval;
mod timer;
mod trivial;

pub use create::create;
pub use from_iter::{from_iter, of};
pub use interval::{interval, interval_at};
pub use timer::timer;
pub use trivial::{empty, never, throw};

/// A representation of any set of values over any amount of time.
///
/// An observable is a cloneable subscribe function: each subscription calls
/// it with a fresh [`Subscriber`], and the function pushes notifications into
/// that subscriber for as long as it stays subscribed.
pub struct Observable<T> {
  on_subscribe: Arc<dyn Fn(Subscriber<T>) + Send + Sync>,
}

impl<T> Clone for Observable<T> {
  fn clone(&self) -> Self { Observable { on_subscribe: self.on_subscribe.clone() } }
}

/// A transformation from one observable to another, implemented by wrapping
/// the downstream subscriber.
pub trait Operator<In, Out>: Send + Sync + 'static {
  /// Builds the subscriber the upstream source will push into, forwarding to
  /// `dest`.
  fn apply(&self, dest: Subscriber<Out>) -> Subscriber<In>;
}

impl<T: Send + 'static> Observable<T> {
  pub(crate) fn from_fn<F>(on_subscribe: F) -> Self
  where
    F: Fn(Subscriber<T>) + Send + Sync + 'static,
  {
    Observable { on_subscribe: Arc::new(on_subscribe) }
  }

  /// Subscribes `subscriber` and returns its subscription.
  ///
  /// The subscribe call runs inside the current thread's trampoline, so work
  /// scheduled on the current thread while subscribing is queued rather than
  /// run re-entrantly.
  pub fn subscribe_with(&self, subscriber: Subscriber<T>) -> Subscription {
    let subscription = subscriber.subscription().clone();
    trampoline(|| (self.on_subscribe)(subscriber));
    subscription
  }

  pub fn subscribe_observer<O>(&self, observer: O) -> Subscription
  where
    O: Observer<T> + 'static,
  {
    self.subscribe_with(Subscriber::new(Subscription::new(), observer))
  }

  /// Subscribes a value handler. Errors are logged.
  pub fn subscribe<N>(&self, next: N) -> Subscription
  where
    N: FnMut(T) + Send + 'static,
  {
    self.subscribe_observer(observer_fn(next))
  }

  pub fn subscribe_all<N, E, C>(&self, next: N, error: E, complete: C) -> Subscription
  where
    N: FnMut(T) + Send + 'static,
    E: FnMut(RxError) + Send + 'static,
    C: FnMut() + Send + 'static,
  {
    self.subscribe_observer(observer_all(next, error, complete))
  }

  /// Applies `op` to every subscription of this observable.
  pub fn lift<U, O>(&self, op: O) -> Observable<U>
  where
    U: Send + 'static,
    O: Operator<T, U>,
  {
    let source = self.clone();
    Observable::from_fn(move |dest| {
      let upstream = op.apply(dest);
      source.subscribe_with(upstream);
    })
  }

  /// Feeds this observable to `f`, for building pipelines out of functions.
  pub fn pipe<U>(self, f: impl FnOnce(Self) -> Observable<U>) -> Observable<U> { f(self) }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;
  use crate::observer::Notification;

  struct Doubler;

  impl Operator<i32, i32> for Doubler {
    fn apply(&self, dest: Subscriber<i32>) -> Subscriber<i32> {
      let upstream = Subscription::new();
      dest.add(upstream.clone());
      Subscriber::new(upstream, Forward(dest))
    }
  }

  struct Forward(Subscriber<i32>);

  impl Observer<i32> for Forward {
    fn on_next(&mut self, value: i32) { self.0.on_next(value * 2) }
    fn on_error(&mut self, err: RxError) { self.0.on_error(err) }
    fn on_completed(&mut self) { self.0.on_completed() }
  }

  fn collect<T: Send + 'static>(source: &Observable<T>) -> Arc<Mutex<Vec<Notification<T>>>> {
    let log = Arc::new(Mutex::new(vec![]));
    let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
    source.subscribe_all(
      move |v| l1.lock().unwrap().push(Notification::Next(v)),
      move |e| l2.lock().unwrap().push(Notification::Error(e)),
      move || l3.lock().unwrap().push(Notification::Completed),
    );
    log
  }

  #[rxrt_macro::test]
  fn lift_wraps_downstream() {
    let log = collect(&from_iter(vec![1, 2, 3]).lift(Doubler));
    assert_eq!(
      *log.lock().unwrap(),
      vec![Notification::Next(2), Notification::Next(4), Notification::Next(6), Notification::Completed]
    );
  }

  #[rxrt_macro::test]
  fn each_subscription_runs_the_source_again() {
    let source = of(7);
    let first = collect(&source);
    let second = collect(&source.clone());
    assert_eq!(*first.lock().unwrap(), *second.lock().unwrap());
  }

  #[rxrt_macro::test]
  fn pipe_composes() {
    let log = collect(&from_iter(0..2).pipe(|o| o.lift(Doubler)).pipe(|o| o.lift(Doubler)));
    assert_eq!(
      *log.lock().unwrap(),
      vec![Notification::Next(0), Notification::Next(4), Notification::Completed]
    );
  }

  #[rxrt_macro::test]
  fn unsubscribing_downstream_stops_source() {
    let seen = Arc::new(Mutex::new(vec![]));
    let c_seen = seen.clone();
    let subscription = Subscription::new();
    let c_subscription = subscription.clone();
    from_iter(0..100).subscribe_with(Subscriber::new(
      subscription.clone(),
      observer_fn(move |v: i32| {
        c_seen.lock().unwrap().push(v);
        if v == 2 {
          c_subscription.unsubscribe();
        }
      }),
    ));
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    assert!(!subscription.is_subscribed());
  }
}
