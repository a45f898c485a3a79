use std::time::Duration;

use super::{bind, HasDest};
use crate::{
  coordination::{Coordination, Coordinator},
  error::RxError,
  observable::{Observable, Operator},
  observer::Observer,
  rc::{MutArc, RcDerefMut},
  subscriber::Subscriber,
};

const NAME: &str = "sample_with_time";

#[derive(Clone)]
pub struct SampleWithTimeOp {
  period: Duration,
  coordination: Coordination,
}

struct SampleState<T> {
  dest: Subscriber<T>,
  value: Option<T>,
}

impl<T> HasDest<T> for SampleState<T> {
  fn dest(&mut self) -> &mut Subscriber<T> { &mut self.dest }
}

pub struct SampleObserver<T> {
  state: MutArc<SampleState<T>>,
  coordinator: Coordinator,
}

impl<T: Send + 'static> Observable<T> {
  /// Emits the most recent value, if any arrived since the previous sample,
  /// every `period` starting one period after subscribing.
  ///
  /// Terminal notifications pass straight through; a value not yet sampled
  /// is dropped.
  pub fn sample_with_time(&self, period: Duration, coordination: Coordination) -> Observable<T> {
    self.lift(SampleWithTimeOp { period, coordination })
  }
}

impl<T: Send + 'static> Operator<T, T> for SampleWithTimeOp {
  fn apply(&self, dest: Subscriber<T>) -> Subscriber<T> {
    let bound = bind(dest, &self.coordination, |dest| SampleState { dest, value: None });
    let (state, coordinator) = (bound.state, bound.coordinator);

    match coordinator.deadline(NAME, self.period) {
      Ok(first) => {
        let (c_state, c_coordinator) = (state.clone(), coordinator.clone());
        coordinator.schedule_periodically(first, self.period, move || {
          // The sample itself is its own unit on the worker, so a slow
          // consumer never holds up the series.
          let state = c_state.clone();
          c_coordinator.schedule(move || {
            let mut s = state.rc_deref_mut();
            if let Some(v) = s.value.take() {
              s.dest.on_next(v);
            }
            Ok(())
          });
          Ok(())
        });
      }
      Err(err) => state.rc_deref_mut().dest.on_error(err),
    }

    Subscriber::new(bound.upstream, SampleObserver { state, coordinator })
  }
}

impl<T: Send + 'static> Observer<T> for SampleObserver<T> {
  fn on_next(&mut self, value: T) {
    let state = self.state.clone();
    self.coordinator.run(move || {
      state.rc_deref_mut().value = Some(value);
      Ok(())
    });
  }

  fn on_error(&mut self, err: RxError) {
    let state = self.state.clone();
    self.coordinator.run(move || {
      let mut s = state.rc_deref_mut();
      s.value = None;
      s.dest.on_error(err);
      Ok(())
    });
  }

  fn on_completed(&mut self) {
    let state = self.state.clone();
    self.coordinator.run(move || {
      let mut s = state.rc_deref_mut();
      s.value = None;
      s.dest.on_completed();
      Ok(())
    });
  }
}
