//! Virtual-time scheduler for deterministic tests of time-based operators.
//!
//! The clock only moves when the test driver says so. Every worker created
//! by one `TestScheduler` shares its clock and its queue, so the whole
//! operator chain under test sees one timeline.
//!
//! # Usage
//!
//! ```rust
//! use std::{sync::{Arc, Mutex}, time::Duration};
//! use rxrt::scheduler::{TestScheduler, TimePoint};
//!
//! let scheduler = TestScheduler::new();
//! let log = Arc::new(Mutex::new(vec![]));
//! let c_log = log.clone();
//! scheduler.schedule_absolute(TimePoint::from_millis(100), move || c_log.lock().unwrap().push(1));
//!
//! scheduler.advance_by(Duration::from_millis(100));
//! assert_eq!(*log.lock().unwrap(), vec![1]);
//! ```

use std::{sync::Arc, time::Duration};

use tracing::{trace, warn};

use super::{Lane, ScheduledItem, Scheduler, TimePoint, TimedQueue, Worker};
use crate::{
  observability::{components, events},
  rc::{MutArc, RcDeref, RcDerefMut},
  subscription::Subscription,
};

/// Start time and resolution of a virtual clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualTimeConfig {
  pub start: TimePoint,
  /// Work scheduled at or before the current instant runs this much later.
  pub tick: Duration,
}

impl Default for VirtualTimeConfig {
  fn default() -> Self { VirtualTimeConfig { start: TimePoint::ZERO, tick: Duration::from_millis(1) } }
}

// ==================== Internal State ====================

struct VirtualClock {
  now: TimePoint,
  tick: Duration,
  queue: TimedQueue,
  running: bool,
}

// ==================== TestScheduler ====================

/// A scheduler whose clock is advanced programmatically.
///
/// Clones share the same clock and queue.
#[derive(Clone)]
pub struct TestScheduler(MutArc<VirtualClock>);

impl Default for TestScheduler {
  fn default() -> Self { Self::new() }
}

impl TestScheduler {
  pub fn new() -> Self { Self::with_config(VirtualTimeConfig::default()) }

  pub fn with_config(config: VirtualTimeConfig) -> Self {
    TestScheduler(MutArc::own(VirtualClock {
      now: config.start,
      tick: config.tick,
      queue: TimedQueue::default(),
      running: false,
    }))
  }

  /// Current virtual time.
  pub fn clock(&self) -> TimePoint { self.0.rc_deref().now }

  #[inline]
  pub fn now(&self) -> TimePoint { self.clock() }

  /// Number of queued units that have not been cancelled.
  pub fn pending(&self) -> usize { self.0.rc_deref().queue.live_len() }

  /// Schedules `action` at an absolute virtual time.
  pub fn schedule_absolute<F>(&self, due: TimePoint, action: F) -> Subscription
  where
    F: FnOnce() + Send + 'static,
  {
    let handle = Subscription::new();
    self.enqueue(ScheduledItem { due, handle: handle.clone(), action: Box::new(action) });
    handle
  }

  /// Schedules `action` `delay` after the current virtual time.
  pub fn schedule_relative<F>(&self, delay: Duration, action: F) -> Subscription
  where
    F: FnOnce() + Send + 'static,
  {
    self.schedule_absolute(self.clock() + delay, action)
  }

  /// Runs every unit due at or before `target`, in `(due, insertion)` order,
  /// then leaves the clock at `target`.
  ///
  /// Units scheduled while draining are picked up by the same call when they
  /// fall due at or before `target`. A target in the past leaves the clock
  /// where it is.
  pub fn advance_to(&self, target: TimePoint) {
    let Some(_running) = self.enter() else {
      return;
    };

    let now = self.clock();
    if target < now {
      warn!(
        event = events::VIRTUAL_CLOCK_REWIND,
        component = components::TEST_SCHEDULER,
        now_ms = now.as_millis() as u64,
        target_ms = target.as_millis() as u64,
        "virtual clock cannot move backwards"
      );
      return;
    }

    trace!(
      event = events::VIRTUAL_ADVANCE,
      component = components::TEST_SCHEDULER,
      from_ms = now.as_millis() as u64,
      to_ms = target.as_millis() as u64,
    );
    while let Some(item) = self.pop_due(target) {
      item.run();
    }
    let mut clock = self.0.rc_deref_mut();
    clock.now = clock.now.max(target);
  }

  /// Advances by `delta`, stopping at the end of the clock when the sum
  /// overflows.
  pub fn advance_by(&self, delta: Duration) { self.advance_to(self.clock() + delta) }

  /// Runs queued units until none is left, moving the clock to each due
  /// time. Never returns while a periodic series stays live.
  pub fn flush(&self) {
    let Some(_running) = self.enter() else {
      return;
    };
    while let Some(item) = self.pop_due(TimePoint::from_offset(Duration::MAX)) {
      item.run();
    }
  }

  fn pop_due(&self, limit: TimePoint) -> Option<ScheduledItem> {
    let mut clock = self.0.rc_deref_mut();
    let item = clock.queue.pop_due(limit)?;
    clock.now = clock.now.max(item.due);
    Some(item)
  }

  fn enter(&self) -> Option<Running> {
    let mut clock = self.0.rc_deref_mut();
    if clock.running {
      warn!(
        event = events::VIRTUAL_REENTRANT_ADVANCE,
        component = components::TEST_SCHEDULER,
        "virtual clock advanced from inside a scheduled action; ignored"
      );
      return None;
    }
    clock.running = true;
    Some(Running(self.clone()))
  }
}

struct Running(TestScheduler);

impl Drop for Running {
  fn drop(&mut self) { self.0 .0.rc_deref_mut().running = false; }
}

impl Lane for TestScheduler {
  fn now(&self) -> TimePoint { self.clock() }

  fn enqueue(&self, mut item: ScheduledItem) {
    let mut clock = self.0.rc_deref_mut();
    if item.due <= clock.now {
      item.due = clock.now + clock.tick;
    }
    clock.queue.push(item);
  }
}

impl Scheduler for TestScheduler {
  fn now(&self) -> TimePoint { self.clock() }

  fn create_worker(&self, lifetime: Subscription) -> Worker {
    Worker::new(Arc::new(self.clone()), lifetime)
  }
}
