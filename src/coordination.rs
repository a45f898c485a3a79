//! Binding between an operator's private state and the worker its work runs
//! on.
//!
//! A [`Coordination`] is chosen when an operator is built; each subscription
//! to that operator turns it into a [`Coordinator`] owning one worker for the
//! life of the subscription. Every mutation of operator state goes through
//! the coordinator, which checks liveness first and turns a failed step into
//! an `on_error` for the subscriber downstream.

use std::{
  fmt,
  panic::{catch_unwind, AssertUnwindSafe},
  sync::Arc,
  time::Duration,
};

use tracing::warn;

use crate::{
  error::RxError,
  observability::{components, events},
  scheduler::{Action, CurrentThreadScheduler, Scheduler, TimePoint, Worker},
  subscription::{panic_message, Subscription},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
  /// Work runs on the calling context; timers use the worker.
  Identity,
  /// Every unit is marshalled onto the worker.
  ObserveOn,
}

/// Chooses where an operator runs its work.
#[derive(Clone)]
pub struct Coordination {
  scheduler: Arc<dyn Scheduler>,
  placement: Placement,
}

type FaultSink = Arc<dyn Fn(RxError) + Send + Sync>;

/// Per-subscription handle created from a [`Coordination`].
#[derive(Clone)]
pub struct Coordinator {
  worker: Worker,
  placement: Placement,
  fault: FaultSink,
}

impl Coordination {
  /// Runs upstream notifications where they arrive and timers on a worker
  /// of `scheduler`.
  pub fn identity<S: Scheduler>(scheduler: S) -> Self {
    Coordination { scheduler: Arc::new(scheduler), placement: Placement::Identity }
  }

  /// Marshals every unit of work onto a worker of `scheduler`.
  pub fn observe_on<S: Scheduler>(scheduler: S) -> Self {
    Coordination { scheduler: Arc::new(scheduler), placement: Placement::ObserveOn }
  }

  pub fn current_thread() -> Self { Self::identity(CurrentThreadScheduler) }

  pub fn now(&self) -> TimePoint { self.scheduler.now() }

  pub fn scheduler(&self) -> &Arc<dyn Scheduler> { &self.scheduler }

  /// Creates the coordinator for one subscription. Its worker is a child of
  /// `lifetime`, so closing `lifetime` cancels everything still scheduled.
  ///
  /// Faults are only logged until a sink is installed with
  /// [`Coordinator::on_fault`].
  pub fn create_coordinator(&self, lifetime: &Subscription) -> Coordinator {
    let worker_lifetime = Subscription::new();
    lifetime.add(worker_lifetime.clone());
    Coordinator {
      worker: self.scheduler.create_worker(worker_lifetime),
      placement: self.placement,
      fault: Arc::new(|_: RxError| {}),
    }
  }
}

impl fmt::Debug for Coordination {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Coordination").field("placement", &self.placement).finish()
  }
}

impl Coordinator {
  /// Routes faults raised by coordinated work to `sink`.
  pub fn on_fault<F>(mut self, sink: F) -> Self
  where
    F: Fn(RxError) + Send + Sync + 'static,
  {
    self.fault = Arc::new(sink);
    self
  }

  pub fn worker(&self) -> &Worker { &self.worker }

  #[inline]
  pub fn now(&self) -> TimePoint { self.worker.now() }

  #[inline]
  pub fn is_subscribed(&self) -> bool { self.worker.is_subscribed() }

  /// Wraps `work` so that invoking the result checks liveness, runs `work`
  /// in this coordinator's placement, and sends an `Err` or a panic to the
  /// fault sink.
  ///
  /// Returns `None` once the subscription is torn down; callers treat that
  /// as nothing to do.
  pub fn act<F>(&self, work: F) -> Option<Action>
  where
    F: FnOnce() -> Result<(), RxError> + Send + 'static,
  {
    if !self.is_subscribed() {
      return None;
    }
    let guarded = self.guard(work);
    match self.placement {
      Placement::Identity => Some(Box::new(guarded)),
      Placement::ObserveOn => {
        let worker = self.worker.clone();
        Some(Box::new(move || {
          worker.schedule(guarded);
        }))
      }
    }
  }

  /// `act` and invoke in one step.
  pub fn run<F>(&self, work: F)
  where
    F: FnOnce() -> Result<(), RxError> + Send + 'static,
  {
    if let Some(action) = self.act(work) {
      action()
    }
  }

  /// Schedules guarded `work` on the worker as soon as possible.
  pub fn schedule<F>(&self, work: F) -> Subscription
  where
    F: FnOnce() -> Result<(), RxError> + Send + 'static,
  {
    self.worker.schedule(self.guard(work))
  }

  /// Schedules guarded `work` on the worker at `due`.
  pub fn schedule_at<F>(&self, due: TimePoint, work: F) -> Subscription
  where
    F: FnOnce() -> Result<(), RxError> + Send + 'static,
  {
    self.worker.schedule_at(due, self.guard(work))
  }

  /// Schedules guarded `work` one `delay` from now. Fails when the deadline
  /// overflows the clock.
  pub fn schedule_after<F>(
    &self, operator: &'static str, delay: Duration, work: F,
  ) -> Result<Subscription, RxError>
  where
    F: FnOnce() -> Result<(), RxError> + Send + 'static,
  {
    let due = self.deadline(operator, delay)?;
    Ok(self.schedule_at(due, work))
  }

  /// Schedules guarded `work` at `initial` and every `period` after. A
  /// failing or panicking run ends the series.
  pub fn schedule_periodically<F>(
    &self, initial: TimePoint, period: Duration, mut work: F,
  ) -> Subscription
  where
    F: FnMut() -> Result<(), RxError> + Send + 'static,
  {
    let lifetime = self.worker.lifetime().clone();
    let fault = self.fault.clone();
    let series = Subscription::new();
    let c_series = series.clone();
    let handle = self.worker.schedule_periodically(initial, period, move || {
      if !lifetime.is_subscribed() {
        return;
      }
      if let Err(err) = contain(&mut work) {
        c_series.unsubscribe();
        report(&fault, err);
      }
    });
    series.add(handle);
    series
  }

  /// `now() + delay`, or an operator fault when it overflows.
  pub fn deadline(&self, operator: &'static str, delay: Duration) -> Result<TimePoint, RxError> {
    self
      .now()
      .checked_add(delay)
      .ok_or_else(|| RxError::operator(operator, format!("deadline {delay:?} from now overflows")))
  }

  fn guard<F>(&self, work: F) -> impl FnOnce() + Send + 'static
  where
    F: FnOnce() -> Result<(), RxError> + Send + 'static,
  {
    let lifetime = self.worker.lifetime().clone();
    let fault = self.fault.clone();
    move || {
      if !lifetime.is_subscribed() {
        return;
      }
      if let Err(err) = contain(work) {
        report(&fault, err);
      }
    }
  }
}

/// Runs `work`, turning a panic into an operator fault so it never unwinds
/// into the worker.
fn contain<F>(work: F) -> Result<(), RxError>
where
  F: FnOnce() -> Result<(), RxError>,
{
  catch_unwind(AssertUnwindSafe(work))
    .unwrap_or_else(|payload| Err(RxError::operator("coordinator", panic_message(payload))))
}

fn report(fault: &FaultSink, err: RxError) {
  warn!(
    event = events::OPERATOR_FAULT,
    component = components::COORDINATION,
    kind = err.as_label(),
    err = %err,
    "coordinated work failed; forwarding as on_error"
  );
  fault(err)
}
