use std::time::Duration;

use super::Observable;
use crate::{
  coordination::Coordination,
  observer::Observer,
  rc::{MutArc, RcDerefMut},
  scheduler::TimePoint,
};

/// Creates an observable which will fire at `period` time into the future,
/// and will repeat every `period` interval after.
///
/// Emits `0, 1, 2, ...` and never completes.
pub fn interval(period: Duration, coordination: Coordination) -> Observable<u64> {
  interval_from(None, period, coordination)
}

/// Creates an observable which will fire at the time specified by `at`,
/// and then will repeat every `period` interval after.
pub fn interval_at(at: TimePoint, period: Duration, coordination: Coordination) -> Observable<u64> {
  interval_from(Some(at), period, coordination)
}

fn interval_from(
  at: Option<TimePoint>, period: Duration, coordination: Coordination,
) -> Observable<u64> {
  Observable::from_fn(move |subscriber| {
    let lifetime = subscriber.subscription().clone();
    let dest = MutArc::own(subscriber);
    let weak = dest.downgrade();
    let coordinator = coordination.create_coordinator(&lifetime).on_fault(move |err| {
      if let Some(dest) = weak.upgrade() {
        dest.rc_deref_mut().on_error(err);
      }
    });

    let initial = match at {
      Some(at) => at,
      None => match coordinator.deadline("interval", period) {
        Ok(due) => due,
        Err(err) => return dest.rc_deref_mut().on_error(err),
      },
    };

    let mut seq = 0;
    coordinator.schedule_periodically(initial, period, move || {
      dest.rc_deref_mut().on_next(seq);
      seq += 1;
      Ok(())
    });
  })
}

#[cfg(test)]
mod tests {
  use crate::{prelude::*, testing::*};

  #[rxrt_macro::test]
  fn ticks_on_period() {
    let scheduler = make_test_scheduler();
    let c_scheduler = scheduler.clone();
    let observer = scheduler.start(move || {
      observable::interval(Duration::from_millis(100), Coordination::identity(c_scheduler))
    });
    assert_eq!(
      observer.messages(),
      vec![
        on_next(300, 0),
        on_next(400, 1),
        on_next(500, 2),
        on_next(600, 3),
        on_next(700, 4),
        on_next(800, 5),
        on_next(900, 6),
      ]
    );
  }

  #[rxrt_macro::test]
  fn interval_at_starts_at_the_given_time() {
    let scheduler = make_test_scheduler();
    let c_scheduler = scheduler.clone();
    let observer = scheduler.start(move || {
      observable::interval_at(
        TimePoint::from_millis(250),
        Duration::from_millis(300),
        Coordination::identity(c_scheduler),
      )
    });
    assert_eq!(observer.messages(), vec![on_next(250, 0), on_next(550, 1), on_next(850, 2)]);
  }
}
