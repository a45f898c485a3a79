//! Commonly used types, for glob import.

pub use std::time::Duration;

// Schedulers
#[cfg(any(feature = "futures-scheduler", feature = "tokio-scheduler"))]
pub use crate::scheduler::SleepProvider;
#[cfg(feature = "futures-scheduler")]
pub use crate::scheduler::ThreadPoolScheduler;
#[cfg(feature = "tokio-scheduler")]
pub use crate::scheduler::TokioScheduler;
pub use crate::{
  coordination::{Coordination, Coordinator},
  error::{ErrorKind, RxError, TimeoutError},
  observable::{self, Observable, Operator},
  observer::{Notification, Observer},
  scheduler::{
    CurrentThreadScheduler, Scheduler, TestScheduler, TimePoint, VirtualTimeConfig, Worker,
  },
  subscriber::Subscriber,
  subscription::{Subscription, SubscriptionGuard},
};
