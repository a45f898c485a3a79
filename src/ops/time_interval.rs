use std::time::Duration;

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
pub struct TimeIntervalOp {
  coordination: Coordination,
}

struct TimeIntervalState {
  dest: Subscriber<Duration>,
  last: TimePoint,
}

impl HasDest<Duration> for TimeIntervalState {
  fn dest(&mut self) -> &mut Subscriber<Duration> { &mut self.dest }
}

pub struct TimeIntervalObserver {
  state: MutArc<TimeIntervalState>,
  coordinator: Coordinator,
}

impl<T: Send + 'static> Observable<T> {
  /// Replaces each value with the time elapsed since the previous one, or
  /// since subscribing for the first.
  pub fn time_interval(&self, coordination: Coordination) -> Observable<Duration> {
    self.lift(TimeIntervalOp { coordination })
  }
}

impl<T: Send + 'static> Operator<T, Duration> for TimeIntervalOp {
  fn apply(&self, dest: Subscriber<Duration>) -> Subscriber<T> {
    let last = self.coordination.now();
    let bound = bind(dest, &self.coordination, |dest| TimeIntervalState { dest, last });
    Subscriber::new(
      bound.upstream,
      TimeIntervalObserver { state: bound.state, coordinator: bound.coordinator },
    )
  }
}

impl<T: Send + 'static> Observer<T> for TimeIntervalObserver {
  fn on_next(&mut self, _: T) {
    let (state, coordinator) = (self.state.clone(), self.coordinator.clone());
    self.coordinator.run(move || {
      let now = coordinator.now();
      let mut s = state.rc_deref_mut();
      let elapsed = now - s.last;
      s.last = now;
      s.dest.on_next(elapsed);
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
