use std::time::Duration;

use super::Observable;
use crate::{
  coordination::Coordination,
  observer::Observer,
  rc::{MutArc, RcDerefMut},
};

/// Creates an observable that emits `0` once `delay` has elapsed, then
/// completes.
pub fn timer(delay: Duration, coordination: Coordination) -> Observable<u64> {
  Observable::from_fn(move |subscriber| {
    let coordinator = coordination.create_coordinator(subscriber.subscription());
    let dest = MutArc::own(subscriber);
    let c_dest = dest.clone();
    let scheduled = coordinator.schedule_after("timer", delay, move || {
      let mut dest = c_dest.rc_deref_mut();
      dest.on_next(0);
      dest.on_completed();
      Ok(())
    });
    if let Err(err) = scheduled {
      dest.rc_deref_mut().on_error(err);
    }
  })
}
