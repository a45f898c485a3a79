//! Virtual-time test driver.
//!
//! Script input timelines with hot and cold observables, run an operator
//! chain with [`TestScheduler::start`], and compare what the observer
//! recorded against exact virtual timestamps:
//!
//! ```
//! use rxrt::{prelude::*, testing::*};
//!
//! let scheduler = make_test_scheduler();
//! let xs = scheduler.create_hot_observable(vec![
//!   on_next(210, 2),
//!   on_next(240, 3),
//!   on_completed(300),
//! ]);
//!
//! let c_scheduler = scheduler.clone();
//! let observer = scheduler.start(move || {
//!   xs.observable().debounce(Duration::from_millis(30), Coordination::identity(c_scheduler))
//! });
//!
//! assert_eq!(observer.messages(), vec![on_next(270, 3), on_completed(300)]);
//! ```

use std::fmt::{Debug, Formatter};

use crate::{
  error::RxError,
  observable::Observable,
  observer::{Notification, Observer},
  rc::{MutArc, RcDeref, RcDerefMut},
  scheduler::{Scheduler, TestScheduler, TimePoint},
  subscriber::Subscriber,
  subscription::Subscription,
};

/// Default virtual time at which [`TestScheduler::start`] creates the
/// observable under test.
pub const CREATED: u64 = 100;
/// Default virtual time at which it subscribes.
pub const SUBSCRIBED: u64 = 200;
/// Default virtual time at which it unsubscribes.
pub const DISPOSED: u64 = 1000;

pub fn make_test_scheduler() -> TestScheduler { TestScheduler::new() }

/// A value stamped with the virtual time it was seen at.
#[derive(Clone, PartialEq)]
pub struct Recorded<T> {
  pub time: TimePoint,
  pub value: T,
}

impl<T: Debug> Debug for Recorded<T> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{:?}@{}", self.value, self.time.as_millis())
  }
}

pub fn on_next<T>(time_ms: u64, value: T) -> Recorded<Notification<T>> {
  Recorded { time: TimePoint::from_millis(time_ms), value: Notification::Next(value) }
}

pub fn on_error<T>(time_ms: u64, err: RxError) -> Recorded<Notification<T>> {
  Recorded { time: TimePoint::from_millis(time_ms), value: Notification::Error(err) }
}

pub fn on_completed<T>(time_ms: u64) -> Recorded<Notification<T>> {
  Recorded { time: TimePoint::from_millis(time_ms), value: Notification::Completed }
}

/// When a test observable was subscribed and, if it was, unsubscribed.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionLog {
  pub subscribed: TimePoint,
  pub unsubscribed: Option<TimePoint>,
}

impl Debug for SubscriptionLog {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self.unsubscribed {
      Some(end) => write!(f, "({}, {})", self.subscribed.as_millis(), end.as_millis()),
      None => write!(f, "({}, open)", self.subscribed.as_millis()),
    }
  }
}

pub fn subscribed(start_ms: u64, end_ms: u64) -> SubscriptionLog {
  SubscriptionLog {
    subscribed: TimePoint::from_millis(start_ms),
    unsubscribed: Some(TimePoint::from_millis(end_ms)),
  }
}

pub fn subscribed_open(start_ms: u64) -> SubscriptionLog {
  SubscriptionLog { subscribed: TimePoint::from_millis(start_ms), unsubscribed: None }
}

type Messages<T> = Vec<Recorded<Notification<T>>>;

#[derive(Clone)]
struct SubscriptionLogs(MutArc<Vec<SubscriptionLog>>);

impl SubscriptionLogs {
  /// Records a subscription now and its end when `subscription` closes.
  fn track(&self, scheduler: &TestScheduler, subscription: &Subscription) {
    let index = {
      let mut logs = self.0.rc_deref_mut();
      logs.push(SubscriptionLog { subscribed: scheduler.now(), unsubscribed: None });
      logs.len() - 1
    };
    let (logs, scheduler) = (self.0.clone(), scheduler.clone());
    subscription.add_teardown(move || {
      logs.rc_deref_mut()[index].unsubscribed = Some(scheduler.now());
    });
  }

  fn snapshot(&self) -> Vec<SubscriptionLog> { self.0.rc_deref().clone() }
}

// ==================== Hot observable ====================

/// Emits its messages at absolute virtual times, to whoever is subscribed at
/// that moment.
pub struct HotObservable<T> {
  observable: Observable<T>,
  logs: SubscriptionLogs,
}

impl<T> HotObservable<T> {
  pub fn observable(&self) -> Observable<T> { self.observable.clone() }

  pub fn subscriptions(&self) -> Vec<SubscriptionLog> { self.logs.snapshot() }
}

// ==================== Cold observable ====================

/// Emits its messages relative to each subscription's start.
pub struct ColdObservable<T> {
  observable: Observable<T>,
  logs: SubscriptionLogs,
}

impl<T> ColdObservable<T> {
  pub fn observable(&self) -> Observable<T> { self.observable.clone() }

  pub fn subscriptions(&self) -> Vec<SubscriptionLog> { self.logs.snapshot() }
}

// ==================== Observer ====================

/// Records every notification with the virtual time it arrived at.
pub struct TestableObserver<T> {
  scheduler: TestScheduler,
  messages: MutArc<Messages<T>>,
}

impl<T> Clone for TestableObserver<T> {
  fn clone(&self) -> Self {
    TestableObserver { scheduler: self.scheduler.clone(), messages: self.messages.clone() }
  }
}

impl<T: Clone> TestableObserver<T> {
  pub fn messages(&self) -> Messages<T> { self.messages.rc_deref().clone() }
}

impl<T: Send> TestableObserver<T> {
  fn record(&mut self, value: Notification<T>) {
    let time = self.scheduler.now();
    self.messages.rc_deref_mut().push(Recorded { time, value });
  }
}

impl<T: Send> Observer<T> for TestableObserver<T> {
  fn on_next(&mut self, value: T) { self.record(Notification::Next(value)) }

  fn on_error(&mut self, err: RxError) { self.record(Notification::Error(err)) }

  fn on_completed(&mut self) { self.record(Notification::Completed) }
}

// ==================== Driver ====================

impl TestScheduler {
  pub fn create_hot_observable<T>(&self, messages: Messages<T>) -> HotObservable<T>
  where
    T: Clone + Send + Sync + 'static,
  {
    let observers: MutArc<Vec<Subscriber<T>>> = MutArc::own(vec![]);
    let logs = SubscriptionLogs(MutArc::own(vec![]));

    for Recorded { time, value } in messages {
      let observers = observers.clone();
      self.schedule_absolute(time, move || {
        // Emit outside the lock: an observer may subscribe or unsubscribe.
        let mut current = std::mem::take(&mut *observers.rc_deref_mut());
        for observer in current.iter_mut() {
          value.clone().accept(observer);
        }
        current.retain(Subscriber::is_subscribed);
        let mut guard = observers.rc_deref_mut();
        current.append(&mut guard);
        *guard = current;
      });
    }

    let (scheduler, c_logs) = (self.clone(), logs.clone());
    let observable = crate::observable::create(move |subscriber: Subscriber<T>| {
      c_logs.track(&scheduler, subscriber.subscription());
      observers.rc_deref_mut().push(subscriber);
    });
    HotObservable { observable, logs }
  }

  pub fn create_cold_observable<T>(&self, messages: Messages<T>) -> ColdObservable<T>
  where
    T: Clone + Send + Sync + 'static,
  {
    let logs = SubscriptionLogs(MutArc::own(vec![]));
    let (scheduler, c_logs) = (self.clone(), logs.clone());
    let observable = crate::observable::create(move |subscriber: Subscriber<T>| {
      c_logs.track(&scheduler, subscriber.subscription());
      let worker = scheduler.create_worker(subscriber.subscription().clone());
      let start = scheduler.now();
      let dest = MutArc::own(subscriber);
      for Recorded { time, value } in messages.iter().cloned() {
        let dest = dest.clone();
        worker.schedule_at(start + time.offset(), move || value.accept(&mut *dest.rc_deref_mut()));
      }
    });
    ColdObservable { observable, logs }
  }

  pub fn create_observer<T: Send>(&self) -> TestableObserver<T> {
    TestableObserver { scheduler: self.clone(), messages: MutArc::own(vec![]) }
  }

  /// Creates the observable at 100, subscribes at 200 and unsubscribes at
  /// 1000, then drains the clock.
  pub fn start<T, F>(&self, create: F) -> TestableObserver<T>
  where
    T: Send + 'static,
    F: FnOnce() -> Observable<T> + Send + 'static,
  {
    self.start_at(CREATED, SUBSCRIBED, DISPOSED, create)
  }

  pub fn start_at<T, F>(
    &self, created: u64, subscribed: u64, disposed: u64, create: F,
  ) -> TestableObserver<T>
  where
    T: Send + 'static,
    F: FnOnce() -> Observable<T> + Send + 'static,
  {
    let observer = self.create_observer::<T>();
    let source: MutArc<Option<Observable<T>>> = MutArc::own(None);
    let subscription = Subscription::new();

    let c_source = source.clone();
    self.schedule_absolute(TimePoint::from_millis(created), move || {
      *c_source.rc_deref_mut() = Some(create());
    });

    let (c_observer, c_subscription) = (observer.clone(), subscription.clone());
    self.schedule_absolute(TimePoint::from_millis(subscribed), move || {
      let created = source.rc_deref_mut().take();
      if let Some(source) = created {
        source.subscribe_with(Subscriber::new(c_subscription, c_observer));
      }
    });

    self.schedule_absolute(TimePoint::from_millis(disposed), move || subscription.unsubscribe());

    self.flush();
    observer
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[rxrt_macro::test]
  fn hot_observable_ignores_subscription_time() {
    let scheduler = make_test_scheduler();
    let xs = scheduler.create_hot_observable(vec![
      on_next(150, 1),
      on_next(210, 2),
      on_next(250, 3),
      on_completed(300),
    ]);
    let observer = scheduler.start(move || xs.observable());
    assert_eq!(observer.messages(), vec![on_next(210, 2), on_next(250, 3), on_completed(300)]);
  }

  #[rxrt_macro::test]
  fn hot_observable_logs_subscriptions() {
    let scheduler = make_test_scheduler();
    let xs = scheduler.create_hot_observable(vec![on_next(210, 'a'), on_completed(400)]);
    let source = xs.observable();
    scheduler.start_at(100, 200, 300, move || source);
    assert_eq!(xs.subscriptions(), vec![subscribed(200, 300)]);
  }

  #[rxrt_macro::test]
  fn cold_observable_replays_per_subscription() {
    let scheduler = make_test_scheduler();
    let xs = scheduler.create_cold_observable(vec![on_next(10, 1), on_next(20, 2), on_completed(30)]);
    let source = xs.observable();
    let observer = scheduler.start(move || source);
    assert_eq!(observer.messages(), vec![on_next(210, 1), on_next(220, 2), on_completed(230)]);
    assert_eq!(xs.subscriptions(), vec![subscribed(200, 230)]);
  }

  #[rxrt_macro::test]
  fn open_subscription_is_logged_as_open() {
    let scheduler = make_test_scheduler();
    let xs = scheduler.create_hot_observable::<i32>(vec![]);
    let sink = scheduler.create_observer::<i32>();
    xs.observable().subscribe_observer(sink);
    assert_eq!(xs.subscriptions(), vec![subscribed_open(0)]);
  }

  #[rxrt_macro::test]
  fn dispose_cuts_off_late_messages() {
    let scheduler = make_test_scheduler();
    let xs = scheduler.create_cold_observable(vec![on_next(50, 1), on_next(150, 2)]);
    let source = xs.observable();
    let observer = scheduler.start_at(100, 200, 300, move || source);
    assert_eq!(observer.messages(), vec![on_next(250, 1)]);
  }
}
