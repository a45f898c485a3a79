use super::{bind, HasDest};
use crate::{
  coordination::{Coordination, Coordinator},
  error::RxError,
  observable::{Observable, Operator},
  observer::{Notification, Observer},
  rc::{MutArc, RcDerefMut},
  subscriber::Subscriber,
};

#[derive(Clone)]
pub struct ObserveOnOp {
  coordination: Coordination,
}

struct ObserveOnState<T> {
  dest: Subscriber<T>,
}

impl<T> HasDest<T> for ObserveOnState<T> {
  fn dest(&mut self) -> &mut Subscriber<T> { &mut self.dest }
}

pub struct ObserveOnObserver<T> {
  state: MutArc<ObserveOnState<T>>,
  coordinator: Coordinator,
}

impl<T: Send + 'static> Observable<T> {
  /// Delivers every notification on a worker of `coordination`, in the
  /// order they arrived.
  ///
  /// Upstream termination does not cancel notifications already queued.
  pub fn observe_on(&self, coordination: Coordination) -> Observable<T> {
    self.lift(ObserveOnOp { coordination })
  }
}

impl<T: Send + 'static> Operator<T, T> for ObserveOnOp {
  fn apply(&self, dest: Subscriber<T>) -> Subscriber<T> {
    let bound = bind(dest, &self.coordination, |dest| ObserveOnState { dest });
    Subscriber::new(
      bound.upstream,
      ObserveOnObserver { state: bound.state, coordinator: bound.coordinator },
    )
  }
}

impl<T: Send + 'static> ObserveOnObserver<T> {
  fn hop(&self, notification: Notification<T>) {
    let state = self.state.clone();
    self.coordinator.schedule(move || {
      notification.accept(state.rc_deref_mut().dest());
      Ok(())
    });
  }
}

impl<T: Send + 'static> Observer<T> for ObserveOnObserver<T> {
  fn on_next(&mut self, value: T) { self.hop(Notification::Next(value)) }

  fn on_error(&mut self, err: RxError) { self.hop(Notification::Error(err)) }

  fn on_completed(&mut self) { self.hop(Notification::Completed) }
}

#[cfg(test)]
mod tests {
  use crate::{prelude::*, testing::*};

  #[rxrt_macro::test]
  fn each_notification_hops_one_tick() {
    let scheduler = make_test_scheduler();
    let xs = scheduler.create_hot_observable(vec![
      on_next(210, 1),
      on_next(220, 2),
      on_completed(230),
    ]);
    let (source, c_scheduler) = (xs.observable(), scheduler.clone());
    let observer =
      scheduler.start(move || source.observe_on(Coordination::identity(c_scheduler)));

    assert_eq!(observer.messages(), vec![on_next(211, 1), on_next(221, 2), on_completed(231)]);
    assert_eq!(xs.subscriptions(), vec![subscribed(200, 230)]);
  }

  #[rxrt_macro::test]
  fn burst_keeps_arrival_order() {
    let scheduler = make_test_scheduler();
    let xs = scheduler.create_cold_observable(vec![
      on_next(10, 'a'),
      on_next(10, 'b'),
      on_next(10, 'c'),
      on_completed(10),
    ]);
    let (source, c_scheduler) = (xs.observable(), scheduler.clone());
    let observer =
      scheduler.start(move || source.observe_on(Coordination::identity(c_scheduler)));

    assert_eq!(
      observer.messages(),
      vec![on_next(211, 'a'), on_next(211, 'b'), on_next(211, 'c'), on_completed(211)]
    );
  }

  #[cfg(feature = "futures-scheduler")]
  #[rxrt_macro::test]
  fn delivers_on_pool_thread_in_order() {
    use std::{sync::mpsc, thread};

    let scheduler = ThreadPoolScheduler::builder().name_prefix("rxrt-observe-").build().unwrap();
    let (tx, rx) = mpsc::channel();
    let c_tx = tx.clone();
    observable::from_iter(0..100).observe_on(Coordination::identity(scheduler)).subscribe_all(
      move |v| {
        let on_pool = thread::current().name().is_some_and(|n| n.starts_with("rxrt-observe-"));
        c_tx.send(Some((v, on_pool))).unwrap()
      },
      |_| {},
      move || tx.send(None).unwrap(),
    );

    let got: Vec<_> = (0..101).map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap()).collect();
    assert_eq!(got.last(), Some(&None));
    let values: Vec<_> = got.iter().flatten().map(|(v, _)| *v).collect();
    assert_eq!(values, (0..100).collect::<Vec<_>>());
    assert!(got.iter().flatten().all(|(_, on_pool)| *on_pool));
  }
}
