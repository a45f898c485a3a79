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

const NAME: &str = "throttle";

#[derive(Clone)]
pub struct ThrottleOp {
  period: Duration,
  coordination: Coordination,
}

struct ThrottleState<T> {
  dest: Subscriber<T>,
  /// A window is open: values are held instead of emitted.
  throttled: bool,
  trailing: Option<T>,
  timer: Option<Subscription>,
}

impl<T> HasDest<T> for ThrottleState<T> {
  fn dest(&mut self) -> &mut Subscriber<T> { &mut self.dest }
}

pub struct ThrottleObserver<T> {
  state: MutArc<ThrottleState<T>>,
  coordinator: Coordinator,
  period: Duration,
}

impl<T: Send + 'static> Observable<T> {
  /// Emits a value, then holds later values for `period`.
  ///
  /// When the window closes the latest held value is emitted and a new
  /// window opens; if nothing was held the next value passes straight
  /// through. Completion emits a held value first.
  pub fn throttle(&self, period: Duration, coordination: Coordination) -> Observable<T> {
    self.lift(ThrottleOp { period, coordination })
  }
}

impl<T: Send + 'static> Operator<T, T> for ThrottleOp {
  fn apply(&self, dest: Subscriber<T>) -> Subscriber<T> {
    let bound = bind(dest, &self.coordination, |dest| ThrottleState {
      dest,
      throttled: false,
      trailing: None,
      timer: None,
    });
    Subscriber::new(
      bound.upstream,
      ThrottleObserver { state: bound.state, coordinator: bound.coordinator, period: self.period },
    )
  }
}

impl<T: Send + 'static> Observer<T> for ThrottleObserver<T> {
  fn on_next(&mut self, value: T) {
    let (state, coordinator, period) = (self.state.clone(), self.coordinator.clone(), self.period);
    self.coordinator.run(move || {
      let leading = {
        let mut s = state.rc_deref_mut();
        if s.throttled {
          s.trailing = Some(value);
          false
        } else {
          s.throttled = true;
          s.dest.on_next(value);
          true
        }
      };
      if leading {
        open_window(&state, &coordinator, period)?;
      }
      Ok(())
    });
  }

  fn on_error(&mut self, err: RxError) {
    let state = self.state.clone();
    self.coordinator.run(move || {
      let mut s = state.rc_deref_mut();
      s.trailing = None;
      if let Some(timer) = s.timer.take() {
        timer.unsubscribe();
      }
      s.dest.on_error(err);
      Ok(())
    });
  }

  fn on_completed(&mut self) {
    let state = self.state.clone();
    self.coordinator.run(move || {
      let mut s = state.rc_deref_mut();
      if let Some(timer) = s.timer.take() {
        timer.unsubscribe();
      }
      if let Some(v) = s.trailing.take() {
        s.dest.on_next(v);
      }
      s.dest.on_completed();
      Ok(())
    });
  }
}

fn open_window<T: Send + 'static>(
  state: &MutArc<ThrottleState<T>>, coordinator: &Coordinator, period: Duration,
) -> Result<(), RxError> {
  let (c_state, c_coordinator) = (state.clone(), coordinator.clone());
  let timer = coordinator
    .schedule_after(NAME, period, move || close_window(&c_state, &c_coordinator, period))?;
  state.rc_deref_mut().timer = Some(timer);
  Ok(())
}

fn close_window<T: Send + 'static>(
  state: &MutArc<ThrottleState<T>>, coordinator: &Coordinator, period: Duration,
) -> Result<(), RxError> {
  let reopen = {
    let mut s = state.rc_deref_mut();
    s.timer = None;
    match s.trailing.take() {
      Some(v) => {
        s.dest.on_next(v);
        true
      }
      None => {
        s.throttled = false;
        false
      }
    }
  };
  if reopen {
    open_window(state, coordinator, period)?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use crate::{prelude::*, testing::*};

  #[rxrt_macro::test]
  fn leading_then_latest_per_window() {
    let scheduler = make_test_scheduler();
    let xs = scheduler.create_hot_observable(vec![
      on_next(210, 1),
      on_next(220, 2),
      on_next(240, 3),
      on_next(300, 4),
      on_next(330, 5),
      on_completed(400),
    ]);
    let (source, c_scheduler) = (xs.observable(), scheduler.clone());
    let observer = scheduler.start(move || {
      source.throttle(Duration::from_millis(50), Coordination::identity(c_scheduler))
    });

    assert_eq!(
      observer.messages(),
      vec![
        on_next(210, 1),
        on_next(260, 3),
        on_next(310, 4),
        on_next(360, 5),
        on_completed(400),
      ]
    );
  }

  #[rxrt_macro::test]
  fn quiet_window_lets_next_value_through() {
    let scheduler = make_test_scheduler();
    let xs = scheduler.create_hot_observable(vec![
      on_next(210, 1),
      on_next(300, 2),
      on_completed(320),
    ]);
    let (source, c_scheduler) = (xs.observable(), scheduler.clone());
    let observer = scheduler.start(move || {
      source.throttle(Duration::from_millis(50), Coordination::identity(c_scheduler))
    });

    assert_eq!(observer.messages(), vec![on_next(210, 1), on_next(300, 2), on_completed(320)]);
  }

  #[rxrt_macro::test]
  fn completion_flushes_held_value() {
    let scheduler = make_test_scheduler();
    let xs = scheduler.create_hot_observable(vec![
      on_next(210, 1),
      on_next(220, 2),
      on_completed(230),
    ]);
    let (source, c_scheduler) = (xs.observable(), scheduler.clone());
    let observer = scheduler.start(move || {
      source.throttle(Duration::from_millis(50), Coordination::identity(c_scheduler))
    });

    assert_eq!(observer.messages(), vec![on_next(210, 1), on_next(230, 2), on_completed(230)]);
    assert_eq!(scheduler.pending(), 0);
  }

  #[rxrt_macro::test]
  fn error_discards_held_value() {
    let scheduler = make_test_scheduler();
    let xs = scheduler.create_hot_observable(vec![
      on_next(210, 1),
      on_next(220, 2),
      on_error(230, RxError::message("boom")),
    ]);
    let (source, c_scheduler) = (xs.observable(), scheduler.clone());
    let observer = scheduler.start(move || {
      source.throttle(Duration::from_millis(50), Coordination::identity(c_scheduler))
    });

    assert_eq!(observer.messages(), vec![on_next(210, 1), on_error(230, RxError::message("boom"))]);
  }
}
