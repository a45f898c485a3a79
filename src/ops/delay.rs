use std::time::Duration;

use super::{bind, HasDest};
use crate::{
  coordination::{Coordination, Coordinator},
  error::RxError,
  observable::{Observable, Operator},
  observer::{Notification, Observer},
  rc::{MutArc, RcDerefMut},
  subscriber::Subscriber,
};

const NAME: &str = "delay";

#[derive(Clone)]
pub struct DelayOp {
  period: Duration,
  coordination: Coordination,
}

struct DelayState<T> {
  dest: Subscriber<T>,
}

impl<T> HasDest<T> for DelayState<T> {
  fn dest(&mut self) -> &mut Subscriber<T> { &mut self.dest }
}

pub struct DelayObserver<T> {
  state: MutArc<DelayState<T>>,
  coordinator: Coordinator,
  period: Duration,
}

impl<T: Send + 'static> Observable<T> {
  /// Shifts every notification, errors and completion included, `period`
  /// later on the coordinator's worker. Relative order is kept.
  pub fn delay(&self, period: Duration, coordination: Coordination) -> Observable<T> {
    self.lift(DelayOp { period, coordination })
  }
}

impl<T: Send + 'static> Operator<T, T> for DelayOp {
  fn apply(&self, dest: Subscriber<T>) -> Subscriber<T> {
    let bound = bind(dest, &self.coordination, |dest| DelayState { dest });
    Subscriber::new(
      bound.upstream,
      DelayObserver { state: bound.state, coordinator: bound.coordinator, period: self.period },
    )
  }
}

impl<T: Send + 'static> DelayObserver<T> {
  fn forward_later(&self, notification: Notification<T>) {
    let (state, coordinator, period) = (self.state.clone(), self.coordinator.clone(), self.period);
    self.coordinator.run(move || {
      // The delayed unit keeps the state alive: it must still emit after
      // the source is gone.
      let c_state = state.clone();
      coordinator.schedule_after(NAME, period, move || {
        notification.accept(c_state.rc_deref_mut().dest());
        Ok(())
      })?;
      Ok(())
    });
  }
}

impl<T: Send + 'static> Observer<T> for DelayObserver<T> {
  fn on_next(&mut self, value: T) { self.forward_later(Notification::Next(value)) }

  fn on_error(&mut self, err: RxError) { self.forward_later(Notification::Error(err)) }

  fn on_completed(&mut self) { self.forward_later(Notification::Completed) }
}
