use std::time::Duration;

use tracing::debug;

use super::{bind, HasDest};
use crate::{
  coordination::{Coordination, Coordinator},
  error::{RxError, TimeoutError},
  observability::{components, events},
  observable::{Observable, Operator},
  observer::Observer,
  rc::{MutArc, RcDerefMut, WeakArc},
  subscriber::Subscriber,
};

const NAME: &str = "timeout";

#[derive(Clone)]
pub struct TimeoutOp {
  period: Duration,
  coordination: Coordination,
}

struct TimeoutState<T> {
  dest: Subscriber<T>,
  /// Bumped per value. A check only fires when it still sees the index it
  /// was armed with.
  index: u64,
}

impl<T> HasDest<T> for TimeoutState<T> {
  fn dest(&mut self) -> &mut Subscriber<T> { &mut self.dest }
}

pub struct TimeoutObserver<T> {
  state: MutArc<TimeoutState<T>>,
  coordinator: Coordinator,
  period: Duration,
}

impl<T: Send + 'static> Observable<T> {
  /// Errors with [`TimeoutError`] when `period` passes after subscribing, or
  /// after the latest value, without a new value.
  pub fn timeout(&self, period: Duration, coordination: Coordination) -> Observable<T> {
    self.lift(TimeoutOp { period, coordination })
  }
}

impl<T: Send + 'static> Operator<T, T> for TimeoutOp {
  fn apply(&self, dest: Subscriber<T>) -> Subscriber<T> {
    let bound = bind(dest, &self.coordination, |dest| TimeoutState { dest, index: 0 });
    if let Err(err) = arm(&bound.state, &bound.coordinator, self.period, 0) {
      bound.state.rc_deref_mut().dest.on_error(err);
    }
    Subscriber::new(
      bound.upstream,
      TimeoutObserver { state: bound.state, coordinator: bound.coordinator, period: self.period },
    )
  }
}

impl<T: Send + 'static> Observer<T> for TimeoutObserver<T> {
  fn on_next(&mut self, value: T) {
    let (state, coordinator, period) = (self.state.clone(), self.coordinator.clone(), self.period);
    self.coordinator.run(move || {
      let index = {
        let mut s = state.rc_deref_mut();
        s.index += 1;
        s.dest.on_next(value);
        s.index
      };
      arm(&state, &coordinator, period, index)
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

/// Schedules the check for `index`. Stale checks are not cancelled; they see
/// a newer index and do nothing.
fn arm<T: Send + 'static>(
  state: &MutArc<TimeoutState<T>>, coordinator: &Coordinator, period: Duration, index: u64,
) -> Result<(), RxError> {
  let weak: WeakArc<TimeoutState<T>> = state.downgrade();
  coordinator.schedule_after(NAME, period, move || {
    let Some(state) = weak.upgrade() else {
      return Ok(());
    };
    let mut s = state.rc_deref_mut();
    if s.index == index {
      debug!(
        event = events::TIMEOUT_FIRED,
        component = components::OPERATOR,
        period_ms = period.as_millis() as u64,
        index,
      );
      s.dest.on_error(TimeoutError { period }.into());
    }
    Ok(())
  })?;
  Ok(())
}
