//! Canonical structured event names and field values used in `rxrt` logs.
//!
//! Every `tracing` call in the crate carries `event = events::X` and
//! `component = components::Y` so logs can be filtered without matching on
//! message text.

pub mod events {
  // Subscription graph.
  pub const SUBSCRIPTION_DRAINED: &str = "subscription_drained";
  pub const TEARDOWN_PANICKED: &str = "teardown_panicked";

  // Workers and lanes.
  pub const WORKER_CREATE: &str = "worker_create";
  pub const WORKER_SCHEDULE: &str = "worker_schedule";
  pub const WORKER_SCHEDULE_REJECTED: &str = "worker_schedule_rejected";
  pub const PERIODIC_OVERFLOW: &str = "periodic_overflow";
  pub const WORKER_UNIT_PANICKED: &str = "worker_unit_panicked";
  pub const LANE_START: &str = "lane_start";
  pub const LANE_CLOSED: &str = "lane_closed";
  pub const TRAMPOLINE_DRAIN: &str = "trampoline_drain";

  // Virtual time.
  pub const VIRTUAL_ADVANCE: &str = "virtual_advance";
  pub const VIRTUAL_REENTRANT_ADVANCE: &str = "virtual_reentrant_advance";
  pub const VIRTUAL_CLOCK_REWIND: &str = "virtual_clock_rewind";

  // Coordination and operators.
  pub const OPERATOR_FAULT: &str = "operator_fault";
  pub const UNHANDLED_ERROR: &str = "unhandled_error";
  pub const TIMEOUT_FIRED: &str = "timeout_fired";
}

pub mod components {
  pub const SUBSCRIPTION: &str = "subscription";
  pub const SCHEDULER: &str = "scheduler";
  pub const CURRENT_THREAD: &str = "current_thread";
  pub const ASYNC_LANE: &str = "async_lane";
  pub const TEST_SCHEDULER: &str = "test_scheduler";
  pub const COORDINATION: &str = "coordination";
  pub const OBSERVER: &str = "observer";
  pub const OPERATOR: &str = "operator";
}
