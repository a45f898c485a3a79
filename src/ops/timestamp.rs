use super::{bind, HasDest};
use crate::{
  coordination::{Coordination, Coordinator},
  error::RxError,
  observable::{Observable, Operator},
  observer::Observer,
  rc::{MutArc, RcDerefMut},
  scheduler::TimePoint,
  subscriber::Subscriber,
};

#[derive(Clone)]
pub struct TimestampOp {
  coordination: Coordination,
}

struct TimestampState<T> {
  dest: Subscriber<(T, TimePoint)>,
}

impl<T> HasDest<(T, TimePoint)> for TimestampState<T> {
  fn dest(&mut self) -> &mut Subscriber<(T, TimePoint)> { &mut self.dest }
}

pub struct TimestampObserver<T> {
  state: MutArc<TimestampState<T>>,
  coordinator: Coordinator,
}

impl<T: Send + 'static> Observable<T> {
  /// Pairs each value with the coordinator's clock at the time it is seen.
  pub fn timestamp(&self, coordination: Coordination) -> Observable<(T, TimePoint)> {
    self.lift(TimestampOp { coordination })
  }
}

impl<T: Send + 'static> Operator<T, (T, TimePoint)> for TimestampOp {
  fn apply(&self, dest: Subscriber<(T, TimePoint)>) -> Subscriber<T> {
    let bound = bind(dest, &self.coordination, |dest| TimestampState { dest });
    Subscriber::new(
      bound.upstream,
      TimestampObserver { state: bound.state, coordinator: bound.coordinator },
    )
  }
}

impl<T: Send + 'static> Observer<T> for TimestampObserver<T> {
  fn on_next(&mut self, value: T) {
    let (state, coordinator) = (self.state.clone(), self.coordinator.clone());
    self.coordinator.run(move || {
      let now = coordinator.now();
      state.rc_deref_mut().dest.on_next((value, now));
      Ok(())
    });
  }

  fn on_error(&mut self, err: RxError) {
    let state = self.state.clone();
    self.coordinator.run(move || {
      state.rc_deref_mut().dest.on_error(err);
      Ok(())
    });
  }

  fn on_completed(&mut self) {
    let state = self.state.clone();
    self.coordinator.run(move || {
      state.rc_deref_mut().dest.on_completed();
      Ok(())
    });
  }
}

#[cfg(test)]
mod tests {
  use crate::{prelude::*, testing::*};

  #[rxrt_macro::test]
  fn stamps_with_virtual_clock() {
    let scheduler = make_test_scheduler();
    let xs = scheduler.create_hot_observable(vec![on_next(220, 'x'), on_completed(260)]);
    let (source, c_scheduler) = (xs.observable(), scheduler.clone());
    let observer = scheduler.start(move || source.timestamp(Coordination::identity(c_scheduler)));

    assert_eq!(
      observer.messages(),
      vec![on_next(220, ('x', TimePoint::from_millis(220))), on_completed(260)]
    );
  }

  #[rxrt_macro::test]
  fn observe_on_stamps_after_the_hop() {
    let scheduler = make_test_scheduler();
    let xs = scheduler.create_hot_observable(vec![on_next(220, 'x')]);
    let (source, c_scheduler) = (xs.observable(), scheduler.clone());
    let observer = scheduler.start(move || source.timestamp(Coordination::observe_on(c_scheduler)));

    assert_eq!(observer.messages(), vec![on_next(221, ('x', TimePoint::from_millis(221)))]);
  }
}
