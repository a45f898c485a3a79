//! Coordination-driven operators.
//!
//! Every operator here follows one shape: its private state lives in a
//! [`MutArc`] reachable only from the operator's observer and from work
//! scheduled through its [`Coordinator`]. The upstream subscription and the
//! coordinator's worker are both children of the downstream subscription,
//! so tearing down the consumer cancels the source and every pending timer,
//! while upstream termination alone leaves already scheduled work in place.

use crate::{
  coordination::{Coordination, Coordinator},
  observer::Observer,
  rc::{MutArc, RcDerefMut},
  subscriber::Subscriber,
  subscription::Subscription,
};

pub mod debounce;
pub mod delay;
pub mod observe_on;
pub mod sample;
pub mod subscribe_on;
pub mod throttle;
pub mod time_interval;
pub mod timeout;
pub mod timestamp;

/// Operator state that owns the downstream subscriber.
pub(crate) trait HasDest<Out> {
  fn dest(&mut self) -> &mut Subscriber<Out>;
}

/// Everything one subscription to an operator needs.
pub(crate) struct Bound<S> {
  pub(crate) upstream: Subscription,
  pub(crate) state: MutArc<S>,
  pub(crate) coordinator: Coordinator,
}

/// Moves `dest` into fresh operator state and wires the upstream lifetime and
/// the coordinator under it. Faults raised by coordinated work end up as
/// `on_error` on `dest`.
///
/// The downstream subscription keeps the state alive until it closes, even
/// when the source drops its subscriber right away.
pub(crate) fn bind<Out, S>(
  dest: Subscriber<Out>, coordination: &Coordination, init: impl FnOnce(Subscriber<Out>) -> S,
) -> Bound<S>
where
  S: HasDest<Out> + Send + 'static,
{
  let upstream = Subscription::new();
  dest.add(upstream.clone());
  let lifetime = dest.subscription().clone();
  let coordinator = coordination.create_coordinator(&lifetime);

  let state = MutArc::own(init(dest));
  let owned = state.clone();
  lifetime.add_teardown(move || drop(owned));
  let weak = state.downgrade();
  let coordinator = coordinator.on_fault(move |err| {
    if let Some(state) = weak.upgrade() {
      state.rc_deref_mut().dest().on_error(err);
    }
  });

  Bound { upstream, state, coordinator }
}
