use std::time::Duration;

use super::{bind, HasDest};
use crate::{
  coordination::{Coordination, Coordinator},
  error::RxError,
  observable::{Observable, Operator},
  observer::Observer,
  rc::{MutArc, RcDerefMut},
  subscriber::Subscriber,
  subscription::Subscription,
};

const NAME: &str = "debounce";

#[derive(Clone)]
pub struct DebounceOp {
  period: Duration,
  coordination: Coordination,
}

struct DebounceState<T> {
  dest: Subscriber<T>,
  value: Option<T>,
  /// Bumped per value; a timer only emits if nothing newer arrived.
  index: u64,
  timer: Option<Subscription>,
}

impl<T> HasDest<T> for DebounceState<T> {
  fn dest(&mut self) -> &mut Subscriber<T> { &mut self.dest }
}

pub struct DebounceObserver<T> {
  state: MutArc<DebounceState<T>>,
  coordinator: Coordinator,
  period: Duration,
}

impl<T: Send + 'static> Observable<T> {
  /// Emits a value only after `period` has passed without another value.
  ///
  /// Each value restarts the timer. On completion a value still waiting is
  /// emitted right away, followed by the completion; an error drops it.
  pub fn debounce(&self, period: Duration, coordination: Coordination) -> Observable<T> {
    self.lift(DebounceOp { period, coordination })
  }
}

impl<T: Send + 'static> Operator<T, T> for DebounceOp {
  fn apply(&self, dest: Subscriber<T>) -> Subscriber<T> {
    let bound = bind(dest, &self.coordination, |dest| DebounceState {
      dest,
      value: None,
      index: 0,
      timer: None,
    });
    Subscriber::new(
      bound.upstream,
      DebounceObserver { state: bound.state, coordinator: bound.coordinator, period: self.period },
    )
  }
}

impl<T: Send + 'static> Observer<T> for DebounceObserver<T> {
  fn on_next(&mut self, value: T) {
    let (state, coordinator, period) = (self.state.clone(), self.coordinator.clone(), self.period);
    self.coordinator.run(move || {
      let (index, stale) = {
        let mut s = state.rc_deref_mut();
        s.index += 1;
        s.value = Some(value);
        (s.index, s.timer.take())
      };
      if let Some(stale) = stale {
        stale.unsubscribe();
      }

      let weak = state.downgrade();
      let timer = coordinator.schedule_after(NAME, period, move || {
        if let Some(state) = weak.upgrade() {
          emit(&state, index);
        }
        Ok(())
      })?;

      let mut s = state.rc_deref_mut();
      if s.index == index {
        s.timer = Some(timer);
      }
      Ok(())
    });
  }

  fn on_error(&mut self, err: RxError) {
    let state = self.state.clone();
    self.coordinator.run(move || {
      let mut s = state.rc_deref_mut();
      s.value = None;
      cancel(&mut s.timer);
      s.dest.on_error(err);
      Ok(())
    });
  }

  fn on_completed(&mut self) {
    let state = self.state.clone();
    self.coordinator.run(move || {
      let mut s = state.rc_deref_mut();
      cancel(&mut s.timer);
      if let Some(v) = s.value.take() {
        s.dest.on_next(v);
      }
      s.dest.on_completed();
      Ok(())
    });
  }
}

fn emit<T>(state: &MutArc<DebounceState<T>>, index: u64) {
  let mut s = state.rc_deref_mut();
  if s.index != index {
    return;
  }
  s.timer = None;
  if let Some(v) = s.value.take() {
    s.dest.on_next(v);
  }
}

fn cancel(timer: &mut Option<Subscription>) {
  if let Some(timer) = timer.take() {
    timer.unsubscribe();
  }
}
