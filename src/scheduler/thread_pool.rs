use std::{sync::Arc, time::Duration};

use futures::{executor::ThreadPool, future::BoxFuture, FutureExt};

use super::{
  lane::{AsyncLane, SleepProvider},
  Scheduler, TimePoint, Worker,
};
use crate::{error::SchedulerError, subscription::Subscription};

const DEFAULT_NAME_PREFIX: &str = "rxrt-worker-";

/// Schedules work on a `futures` thread pool.
///
/// Every worker is its own lane: its units run one at a time in due order,
/// while different workers run in parallel on the pool.
#[derive(Clone)]
pub struct ThreadPoolScheduler {
  pool: ThreadPool,
}

/// Configures the pool behind a [`ThreadPoolScheduler`].
#[derive(Debug, Clone, Default)]
pub struct ThreadPoolSchedulerBuilder {
  pool_size: Option<usize>,
  name_prefix: Option<String>,
}

impl ThreadPoolSchedulerBuilder {
  /// Number of pool threads. Defaults to the number of CPUs.
  pub fn pool_size(mut self, size: usize) -> Self {
    self.pool_size = Some(size);
    self
  }

  pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
    self.name_prefix = Some(prefix.into());
    self
  }

  pub fn build(self) -> Result<ThreadPoolScheduler, SchedulerError> {
    let mut builder = ThreadPool::builder();
    if let Some(size) = self.pool_size {
      builder.pool_size(size);
    }
    builder.name_prefix(self.name_prefix.unwrap_or_else(|| DEFAULT_NAME_PREFIX.to_string()));
    Ok(ThreadPoolScheduler { pool: builder.create()? })
  }
}

impl ThreadPoolScheduler {
  pub fn new() -> Result<Self, SchedulerError> { Self::builder().build() }

  pub fn builder() -> ThreadPoolSchedulerBuilder { ThreadPoolSchedulerBuilder::default() }

  /// Wraps a pool built elsewhere.
  pub fn from_pool(pool: ThreadPool) -> Self { ThreadPoolScheduler { pool } }
}

struct FuturesTimeSleep;

impl SleepProvider for FuturesTimeSleep {
  fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
    futures_time::task::sleep(futures_time::time::Duration::from(duration)).map(|_| ()).boxed()
  }
}

impl Scheduler for ThreadPoolScheduler {
  fn now(&self) -> TimePoint { TimePoint::wall_now() }

  fn create_worker(&self, lifetime: Subscription) -> Worker {
    let (lane, drive) = AsyncLane::open(FuturesTimeSleep, &lifetime);
    self.pool.spawn_ok(drive);
    Worker::new(Arc::new(lane), lifetime)
  }
}
