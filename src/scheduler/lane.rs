//! Async lanes shared by the thread-pool and tokio schedulers.
//!
//! A lane is one spawned task that owns a time-ordered queue. Work arrives
//! over an unbounded channel, so scheduling never blocks the caller; the
//! task sleeps until the earliest item is due. Closing the worker's lifetime
//! closes the channel, which ends the task and drops whatever is left.

use std::time::Duration;

use futures::{
  channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender},
  future::{select, BoxFuture, Either},
  pin_mut, StreamExt,
};
use tracing::{debug, error, trace};

use super::{Lane, ScheduledItem, TimePoint, TimedQueue};
use crate::{
  observability::{components, events},
  subscription::Subscription,
};

/// The timer source of an async lane.
pub trait SleepProvider: Send + Sync + 'static {
  fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

pub(crate) struct AsyncLane {
  tx: UnboundedSender<ScheduledItem>,
}

impl AsyncLane {
  /// Creates the sending half and the future that drives the lane. The
  /// caller spawns the future on its runtime.
  pub(crate) fn open<P: SleepProvider>(
    sleeper: P, lifetime: &Subscription,
  ) -> (AsyncLane, impl std::future::Future<Output = ()> + Send + 'static) {
    let (tx, rx) = unbounded();
    let c_tx = tx.clone();
    lifetime.add_teardown(move || c_tx.close_channel());
    (AsyncLane { tx }, drive(sleeper, rx))
  }
}

impl Lane for AsyncLane {
  fn now(&self) -> TimePoint { TimePoint::wall_now() }

  fn enqueue(&self, item: ScheduledItem) {
    if let Err(err) = self.tx.unbounded_send(item) {
      // The lane is gone; make the unit observably cancelled.
      err.into_inner().handle.unsubscribe();
    }
  }
}

async fn drive<P: SleepProvider>(sleeper: P, mut rx: UnboundedReceiver<ScheduledItem>) {
  debug!(event = events::LANE_START, component = components::ASYNC_LANE);
  let mut queue = TimedQueue::default();
  loop {
    while let Some(item) = queue.pop_due(TimePoint::wall_now()) {
      if let Err(message) = item.run_caught() {
        error!(
          event = events::WORKER_UNIT_PANICKED,
          component = components::ASYNC_LANE,
          panic = %message,
          "scheduled unit panicked; lane keeps running"
        );
      }
    }

    let Some(next_due) = queue.peek_due() else {
      match rx.next().await {
        Some(item) => {
          queue.push(item);
          continue;
        }
        None => break,
      }
    };

    let wait = next_due.saturating_duration_since(TimePoint::wall_now());
    trace!(
      event = events::WORKER_SCHEDULE,
      component = components::ASYNC_LANE,
      wait_ms = wait.as_millis() as u64,
    );
    let sleep = sleeper.sleep(wait);
    pin_mut!(sleep);
    match select(rx.next(), sleep).await {
      Either::Left((Some(item), _)) => queue.push(item),
      Either::Left((None, _)) => break,
      Either::Right(((), _)) => {}
    }
  }
  debug!(
    event = events::LANE_CLOSED,
    component = components::ASYNC_LANE,
    dropped = queue.live_len(),
    "worker lifetime closed; lane stopped"
  );
}
