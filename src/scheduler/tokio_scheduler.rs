use std::{sync::Arc, time::Duration};

use futures::{future::BoxFuture, FutureExt};
use tokio::runtime::Handle;

use super::{
  lane::{AsyncLane, SleepProvider},
  Scheduler, TimePoint, Worker,
};
use crate::{error::SchedulerError, subscription::Subscription};

/// Schedules work as tasks of a tokio runtime, one task per worker.
#[derive(Clone, Debug)]
pub struct TokioScheduler {
  handle: Handle,
}

impl TokioScheduler {
  /// Binds to the runtime the caller is running in.
  pub fn current() -> Result<Self, SchedulerError> {
    Ok(TokioScheduler { handle: Handle::try_current()? })
  }

  pub fn from_handle(handle: Handle) -> Self { TokioScheduler { handle } }
}

struct TokioSleep;

impl SleepProvider for TokioSleep {
  fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
    tokio::time::sleep(duration).boxed()
  }
}

impl Scheduler for TokioScheduler {
  fn now(&self) -> TimePoint { TimePoint::wall_now() }

  fn create_worker(&self, lifetime: Subscription) -> Worker {
    let (lane, drive) = AsyncLane::open(TokioSleep, &lifetime);
    self.handle.spawn(drive);
    Worker::new(Arc::new(lane), lifetime)
  }
}

#[cfg(test)]
mod tests {
  use futures::channel::oneshot;

  use super::*;

  #[rxrt_macro::test(shared)]
  async fn delayed_work_runs_on_the_runtime() {
    let worker = TokioScheduler::current().unwrap().create_worker(Subscription::new());
    let (tx, rx) = oneshot::channel();
    let scheduled_at = worker.now();
    worker.schedule_after(Duration::from_millis(10), move || {
      let _ = tx.send(TimePoint::wall_now());
    });
    let ran_at = rx.await.unwrap();
    assert!(ran_at - scheduled_at >= Duration::from_millis(10));
  }

  #[rxrt_macro::test]
  fn no_runtime_is_an_error() {
    assert!(TokioScheduler::current().is_err());
  }
}
