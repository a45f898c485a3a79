//! Runs work on the thread that schedules it.
//!
//! Each thread owns a trampoline queue. The first schedule on an idle thread
//! becomes the drain loop: it runs every queued item in time order, sleeping
//! until each one is due. Anything scheduled while the loop runs is queued
//! instead of recursing.

use std::{cell::RefCell, sync::Arc, thread};

use tracing::trace;

use super::{Lane, ScheduledItem, Scheduler, TimePoint, TimedQueue, Worker};
use crate::{
  observability::{components, events},
  subscription::Subscription,
};

#[derive(Default)]
struct Trampoline {
  queue: TimedQueue,
  active: bool,
}

thread_local! {
  static TRAMPOLINE: RefCell<Trampoline> = RefCell::new(Trampoline::default());
}

/// Direct-execution scheduler backed by the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct CurrentThreadScheduler;

struct CurrentThreadLane;

impl Scheduler for CurrentThreadScheduler {
  fn now(&self) -> TimePoint { TimePoint::wall_now() }

  fn create_worker(&self, lifetime: Subscription) -> Worker {
    Worker::new(Arc::new(CurrentThreadLane), lifetime)
  }
}

impl Lane for CurrentThreadLane {
  fn now(&self) -> TimePoint { TimePoint::wall_now() }

  fn enqueue(&self, item: ScheduledItem) {
    trampoline(|| TRAMPOLINE.with(|t| t.borrow_mut().queue.push(item)));
  }
}

/// Runs `f` with the current thread's trampoline active.
///
/// When no trampoline was active, the call owns it: after `f` returns it
/// drains everything queued, then releases the trampoline.
pub(crate) fn trampoline<R>(f: impl FnOnce() -> R) -> R {
  let owner = TRAMPOLINE.with(|t| !std::mem::replace(&mut t.borrow_mut().active, true));
  if !owner {
    return f();
  }

  let _release = Release;
  let result = f();
  drain();
  result
}

// Releases the trampoline even if an action unwinds.
struct Release;

impl Drop for Release {
  fn drop(&mut self) {
    let stale = TRAMPOLINE.with(|t| {
      let mut t = t.borrow_mut();
      t.active = false;
      std::mem::take(&mut t.queue)
    });
    // Dropped outside the borrow: an action's captures may schedule again.
    drop(stale);
  }
}

fn drain() {
  trace!(event = events::TRAMPOLINE_DRAIN, component = components::CURRENT_THREAD);
  while let Some(item) = TRAMPOLINE.with(|t| t.borrow_mut().queue.pop()) {
    if item.is_cancelled() {
      continue;
    }
    let wait = item.due.saturating_duration_since(TimePoint::wall_now());
    if !wait.is_zero() {
      thread::sleep(wait);
    }
    item.run();
  }
}
