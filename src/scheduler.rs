//! Execution contexts.
//!
//! A [`Scheduler`] is a factory of [`Worker`]s. A worker is one logical
//! execution lane with a clock: everything scheduled on the same worker runs
//! one unit at a time, ordered by due time and then by insertion.
//!
//! Implementations:
//!
//! - [`CurrentThreadScheduler`]: a per-thread trampoline, runs work on the
//!   thread that schedules it.
//! - [`ThreadPoolScheduler`]: async lanes on a `futures` thread pool
//!   (feature `futures-scheduler`).
//! - [`TokioScheduler`]: async lanes on a tokio runtime (feature
//!   `tokio-scheduler`).
//! - [`TestScheduler`]: virtual time advanced by a test driver.

use std::{
  cmp::Ordering,
  collections::BinaryHeap,
  fmt::{Debug, Formatter},
  ops::{Add, Sub},
  sync::Arc,
  time::{Duration, Instant},
};

use once_cell::sync::Lazy;
use tracing::{debug, trace, warn};

use crate::{
  observability::{components, events},
  rc::{MutArc, RcDerefMut},
  subscription::Subscription,
};

mod current_thread;
#[cfg(any(feature = "futures-scheduler", feature = "tokio-scheduler"))]
mod lane;
mod test_scheduler;
#[cfg(feature = "futures-scheduler")]
mod thread_pool;
#[cfg(feature = "tokio-scheduler")]
mod tokio_scheduler;

pub use current_thread::CurrentThreadScheduler;
pub(crate) use current_thread::trampoline;
#[cfg(any(feature = "futures-scheduler", feature = "tokio-scheduler"))]
pub use lane::SleepProvider;
pub use test_scheduler::{TestScheduler, VirtualTimeConfig};
#[cfg(feature = "futures-scheduler")]
pub use thread_pool::{ThreadPoolScheduler, ThreadPoolSchedulerBuilder};
#[cfg(feature = "tokio-scheduler")]
pub use tokio_scheduler::TokioScheduler;

/// A unit of work handed to a worker.
pub type Action = Box<dyn FnOnce() + Send + 'static>;

// ==================== TimePoint ====================

static CLOCK_ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);

/// A point on a scheduler clock, stored as the offset from that clock's
/// origin.
///
/// Real clocks share a process-wide origin; the virtual clock starts at zero.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimePoint(Duration);

impl TimePoint {
  pub const ZERO: TimePoint = TimePoint(Duration::ZERO);

  pub const fn from_offset(offset: Duration) -> Self { TimePoint(offset) }

  pub const fn from_millis(millis: u64) -> Self { TimePoint(Duration::from_millis(millis)) }

  /// The current wall-clock instant.
  pub fn wall_now() -> Self { Self::from_instant(Instant::now()) }

  pub fn from_instant(instant: Instant) -> Self {
    TimePoint(instant.saturating_duration_since(*CLOCK_ORIGIN))
  }

  pub fn offset(self) -> Duration { self.0 }

  pub fn as_millis(self) -> u128 { self.0.as_millis() }

  pub fn checked_add(self, d: Duration) -> Option<Self> { self.0.checked_add(d).map(TimePoint) }

  pub fn saturating_duration_since(self, earlier: TimePoint) -> Duration {
    self.0.saturating_sub(earlier.0)
  }
}

/// Saturates at the end of the clock instead of overflowing; use
/// [`TimePoint::checked_add`] to detect that case.
impl Add<Duration> for TimePoint {
  type Output = TimePoint;

  fn add(self, rhs: Duration) -> TimePoint { TimePoint(self.0.saturating_add(rhs)) }
}

impl Sub for TimePoint {
  type Output = Duration;

  fn sub(self, rhs: TimePoint) -> Duration { self.saturating_duration_since(rhs) }
}

impl Debug for TimePoint {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "TimePoint({:?})", self.0)
  }
}

// ==================== Scheduler ====================

/// A factory of workers.
pub trait Scheduler: Send + Sync + 'static {
  /// The scheduler's clock.
  fn now(&self) -> TimePoint;

  /// Creates a worker that lives until `lifetime` is unsubscribed. Closing
  /// the lifetime cancels everything still pending on the worker.
  fn create_worker(&self, lifetime: Subscription) -> Worker;
}

/// The queue behind a worker.
pub(crate) trait Lane: Send + Sync + 'static {
  fn now(&self) -> TimePoint;

  /// Queues `item` to run no earlier than its due time.
  fn enqueue(&self, item: ScheduledItem);
}

pub(crate) struct ScheduledItem {
  pub(crate) due: TimePoint,
  pub(crate) handle: Subscription,
  pub(crate) action: Action,
}

impl ScheduledItem {
  pub(crate) fn is_cancelled(&self) -> bool { !self.handle.is_subscribed() }

  /// Runs the action unless its handle was cancelled, then closes the handle.
  pub(crate) fn run(self) {
    if self.handle.is_subscribed() {
      (self.action)();
      self.handle.unsubscribe();
    }
  }

  /// Like [`ScheduledItem::run`], but a panicking action is caught and its
  /// message returned. The handle is closed either way.
  #[cfg(any(feature = "futures-scheduler", feature = "tokio-scheduler"))]
  pub(crate) fn run_caught(self) -> Result<(), String> {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    if !self.handle.is_subscribed() {
      return Ok(());
    }
    let ScheduledItem { handle, action, .. } = self;
    let result =
      catch_unwind(AssertUnwindSafe(action)).map_err(crate::subscription::panic_message);
    handle.unsubscribe();
    result
  }
}

// ==================== Worker ====================

/// A schedulable execution lane with a clock.
///
/// Every unit of work scheduled on a worker returns its own revocable
/// [`Subscription`]: cancelling it before the work runs guarantees the work
/// never runs; cancelling it later is a no-op.
#[derive(Clone)]
pub struct Worker {
  lane: Arc<dyn Lane>,
  lifetime: Subscription,
}

impl Worker {
  pub(crate) fn new(lane: Arc<dyn Lane>, lifetime: Subscription) -> Self {
    debug!(event = events::WORKER_CREATE, component = components::SCHEDULER);
    Worker { lane, lifetime }
  }

  #[inline]
  pub fn now(&self) -> TimePoint { self.lane.now() }

  pub fn lifetime(&self) -> &Subscription { &self.lifetime }

  #[inline]
  pub fn is_subscribed(&self) -> bool { self.lifetime.is_subscribed() }

  /// Tears the worker down, cancelling everything still pending on it.
  pub fn unsubscribe(&self) { self.lifetime.unsubscribe() }

  /// Runs `action` as soon as the worker gets to it.
  pub fn schedule<F>(&self, action: F) -> Subscription
  where
    F: FnOnce() + Send + 'static,
  {
    self.schedule_at(self.now(), action)
  }

  /// Runs `action` once `delay` has elapsed on the worker's clock.
  pub fn schedule_after<F>(&self, delay: Duration, action: F) -> Subscription
  where
    F: FnOnce() + Send + 'static,
  {
    match self.now().checked_add(delay) {
      Some(due) => self.schedule_at(due, action),
      None => {
        warn!(
          event = events::WORKER_SCHEDULE_REJECTED,
          component = components::SCHEDULER,
          delay = ?delay,
          "delay overflows the clock; dropping action"
        );
        Subscription::closed()
      }
    }
  }

  /// Runs `action` no earlier than `due`.
  pub fn schedule_at<F>(&self, due: TimePoint, action: F) -> Subscription
  where
    F: FnOnce() + Send + 'static,
  {
    if !self.lifetime.is_subscribed() {
      return Subscription::closed();
    }
    let handle = Subscription::new();
    self.lifetime.add(handle.clone());
    trace!(
      event = events::WORKER_SCHEDULE,
      component = components::SCHEDULER,
      due_ms = due.as_millis() as u64,
    );
    self.lane.enqueue(ScheduledItem { due, handle: handle.clone(), action: Box::new(action) });
    handle
  }

  /// Runs `action` at `initial`, `initial + period`, `initial + 2 * period`,
  /// and so on until the returned subscription is cancelled.
  ///
  /// The next run is queued only after the current one returns, so runs of
  /// one series never overlap. Due times stay on the nominal grid even when
  /// a run finishes late.
  pub fn schedule_periodically<F>(
    &self, initial: TimePoint, period: Duration, action: F,
  ) -> Subscription
  where
    F: FnMut() + Send + 'static,
  {
    let series = Subscription::new();
    if self.lifetime.add(series.clone()).is_none() {
      return series;
    }
    let action: Box<dyn FnMut() + Send> = Box::new(action);
    let periodic = Arc::new(Periodic {
      worker: self.clone(),
      period,
      series: series.clone(),
      action: MutArc::own(action),
    });
    periodic.arm(initial);
    series
  }
}

struct Periodic {
  worker: Worker,
  period: Duration,
  series: Subscription,
  action: MutArc<Box<dyn FnMut() + Send>>,
}

impl Periodic {
  fn arm(self: Arc<Self>, due: TimePoint) {
    let this = self.clone();
    let tick = self.worker.schedule_at(due, move || {
      if !this.series.is_subscribed() {
        return;
      }
      {
        let mut action = this.action.rc_deref_mut();
        (*action)();
      }
      match due.checked_add(this.period) {
        Some(next) => this.arm(next),
        None => {
          warn!(
            event = events::PERIODIC_OVERFLOW,
            component = components::SCHEDULER,
            "periodic due time overflows the clock; stopping series"
          );
          this.series.unsubscribe();
        }
      }
    });
    self.series.add(tick);
  }
}

// ==================== TimedQueue ====================

struct Entry {
  seq: u64,
  item: ScheduledItem,
}

impl PartialEq for Entry {
  fn eq(&self, other: &Self) -> bool { self.item.due == other.item.due && self.seq == other.seq }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for Entry {
  fn cmp(&self, other: &Self) -> Ordering {
    // Min-heap: earlier times first, then FIFO by sequence
    other.item.due.cmp(&self.item.due).then_with(|| other.seq.cmp(&self.seq))
  }
}

/// Scheduled items ordered by `(due, insertion sequence)`.
#[derive(Default)]
pub(crate) struct TimedQueue {
  heap: BinaryHeap<Entry>,
  next_seq: u64,
}

impl TimedQueue {
  pub(crate) fn push(&mut self, item: ScheduledItem) {
    let seq = self.next_seq;
    self.next_seq += 1;
    self.heap.push(Entry { seq, item });
  }

  pub(crate) fn peek_due(&self) -> Option<TimePoint> { self.heap.peek().map(|e| e.item.due) }

  pub(crate) fn pop(&mut self) -> Option<ScheduledItem> { self.heap.pop().map(|e| e.item) }

  /// Pops the earliest item if it is due at or before `limit`.
  pub(crate) fn pop_due(&mut self, limit: TimePoint) -> Option<ScheduledItem> {
    match self.peek_due() {
      Some(due) if due <= limit => self.pop(),
      _ => None,
    }
  }

  /// Items whose handle is still live.
  pub(crate) fn live_len(&self) -> usize {
    self.heap.iter().filter(|e| !e.item.is_cancelled()).count()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;

  #[rxrt_macro::test]
  fn time_point_arithmetic() {
    let t = TimePoint::from_millis(200);
    assert_eq!(t + Duration::from_millis(40), TimePoint::from_millis(240));
    assert_eq!(TimePoint::from_millis(281) - t, Duration::from_millis(81));
    assert_eq!(t - TimePoint::from_millis(281), Duration::ZERO);
    assert_eq!(TimePoint::from_offset(Duration::MAX).checked_add(Duration::from_secs(1)), None);
    assert_eq!(
      TimePoint::from_millis(1000) + Duration::MAX,
      TimePoint::from_offset(Duration::MAX)
    );
  }

  #[derive(Clone, Default)]
  struct Captured(Arc<Mutex<Vec<u8>>>);

  impl std::io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
      self.0.lock().unwrap().extend_from_slice(buf);
      Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
  }

  impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Captured {
    type Writer = Captured;

    fn make_writer(&'a self) -> Captured { self.clone() }
  }

  #[rxrt_macro::test]
  fn lifecycle_events_log_at_debug() {
    let captured = Captured::default();
    let subscriber = tracing_subscriber::fmt()
      .with_max_level(tracing::Level::DEBUG)
      .with_ansi(false)
      .with_writer(captured.clone())
      .finish();
    tracing::subscriber::with_default(subscriber, || {
      let lifetime = Subscription::new();
      TestScheduler::new().create_worker(lifetime.clone());
      lifetime.unsubscribe();
    });

    let out = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
    let at_debug = |event: &str| out.lines().any(|l| l.contains("DEBUG") && l.contains(event));
    assert!(at_debug(events::WORKER_CREATE));
    assert!(at_debug(events::SUBSCRIPTION_DRAINED));
  }

  #[rxrt_macro::test]
  fn timed_queue_orders_by_due_then_insertion() {
    let order = Arc::new(Mutex::new(vec![]));
    let mut queue = TimedQueue::default();
    for (due, tag) in [(300, "c"), (100, "a1"), (200, "b"), (100, "a2")] {
      let order = order.clone();
      queue.push(ScheduledItem {
        due: TimePoint::from_millis(due),
        handle: Subscription::new(),
        action: Box::new(move || order.lock().unwrap().push(tag)),
      });
    }

    assert!(queue.pop_due(TimePoint::from_millis(50)).is_none());
    while let Some(item) = queue.pop() {
      item.run();
    }
    assert_eq!(*order.lock().unwrap(), vec!["a1", "a2", "b", "c"]);
  }

  #[rxrt_macro::test]
  fn cancelled_item_never_runs() {
    let ran = Arc::new(Mutex::new(false));
    let c_ran = ran.clone();
    let item = ScheduledItem {
      due: TimePoint::ZERO,
      handle: Subscription::new(),
      action: Box::new(move || *c_ran.lock().unwrap() = true),
    };
    item.handle.unsubscribe();
    item.run();
    assert!(!*ran.lock().unwrap());
  }
}
