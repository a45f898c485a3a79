//! # rxrt: a reactive-stream runtime core
//!
//! Cancellation trees, the observer contract, schedulers with real and
//! virtual clocks, and the coordination layer time-driven operators are
//! built on.
//!
//! ## Quick Start
//!
//! ```rust
//! use rxrt::prelude::*;
//!
//! let scheduler = TestScheduler::new();
//! let seen = std::sync::Arc::new(std::sync::Mutex::new(vec![]));
//! let c_seen = seen.clone();
//!
//! observable::interval(Duration::from_millis(100), Coordination::identity(scheduler.clone()))
//!   .debounce(Duration::from_millis(10), Coordination::identity(scheduler.clone()))
//!   .subscribe(move |v| c_seen.lock().unwrap().push(v));
//!
//! scheduler.advance_to(TimePoint::from_millis(350));
//! assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Subscription`] | Idempotent, cancellation-propagating handle |
//! | [`Observer`] / [`Subscriber`] | Notification sink, and one with a lifetime and grammar checks |
//! | [`Scheduler`] / [`Worker`] | Execution lanes with a clock |
//! | [`Coordination`] | Where an operator's state is touched and its timers run |
//!
//! ## Feature Flags
//!
//! - **`futures-scheduler`** (default): [`ThreadPoolScheduler`] on a `futures` pool
//! - **`tokio-scheduler`**: [`TokioScheduler`] on a tokio runtime
//!
//! [`Subscription`]: subscription::Subscription
//! [`Observer`]: observer::Observer
//! [`Subscriber`]: subscriber::Subscriber
//! [`Scheduler`]: scheduler::Scheduler
//! [`Worker`]: scheduler::Worker
//! [`Coordination`]: coordination::Coordination
//! [`ThreadPoolScheduler`]: scheduler::ThreadPoolScheduler
//! [`TokioScheduler`]: scheduler::TokioScheduler

pub mod coordination;
pub mod error;
pub mod observability;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod prelude;
pub mod rc;
pub mod scheduler;
pub mod subscriber;
pub mod subscription;
pub mod testing;

pub use prelude::*;
