use std::{error::Error as StdError, fmt, sync::Arc, time::Duration};

use thiserror::Error;

/// The error delivered through `on_error`.
///
/// Cloneable so a single failure can be recorded, compared and re-delivered.
#[derive(Debug, Clone, Error)]
pub enum RxError {
  /// Raised by an upstream producer.
  #[error("{0}")]
  Source(Arc<dyn StdError + Send + Sync>),

  /// No notification arrived within the configured period.
  #[error(transparent)]
  Timeout(#[from] TimeoutError),

  /// An operator's own logic failed and was converted at its coordinator.
  #[error("operator `{operator}` failed: {reason}")]
  Operator { operator: &'static str, reason: String },
}

/// Coarse classification of an [`RxError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  Source,
  Timeout,
  Operator,
}

impl RxError {
  /// Wraps any error raised by a producer.
  pub fn source<E>(err: E) -> Self
  where
    E: StdError + Send + Sync + 'static,
  {
    RxError::Source(Arc::new(err))
  }

  /// A source error carrying only a message.
  pub fn message(msg: impl Into<String>) -> Self { RxError::source(Message(msg.into())) }

  pub fn operator(operator: &'static str, reason: impl Into<String>) -> Self {
    RxError::Operator { operator, reason: reason.into() }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      RxError::Source(_) => ErrorKind::Source,
      RxError::Timeout(_) => ErrorKind::Timeout,
      RxError::Operator { .. } => ErrorKind::Operator,
    }
  }

  pub fn is_timeout(&self) -> bool { matches!(self, RxError::Timeout(_)) }

  /// Stable label for logs.
  pub fn as_label(&self) -> &'static str {
    match self {
      RxError::Source(_) => "rx_source_error",
      RxError::Timeout(_) => "rx_timeout",
      RxError::Operator { .. } => "rx_operator_fault",
    }
  }
}

// Two errors are equal when they are the same kind and render the same way.
impl PartialEq for RxError {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (RxError::Timeout(a), RxError::Timeout(b)) => a == b,
      (
        RxError::Operator { operator: a, reason: ra },
        RxError::Operator { operator: b, reason: rb },
      ) => a == b && ra == rb,
      (RxError::Source(a), RxError::Source(b)) => {
        Arc::ptr_eq(a, b) || a.to_string() == b.to_string()
      }
      _ => false,
    }
  }
}

#[derive(Debug, Clone)]
struct Message(String);

impl fmt::Display for Message {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl StdError for Message {}

/// Raised by `timeout` when the source stays silent for `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no notification within {period:?}")]
pub struct TimeoutError {
  pub period: Duration,
}

/// One teardown action that panicked while a subscription was drained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("teardown #{index} panicked: {message}")]
pub struct TeardownFault {
  /// Position of the teardown in addition order.
  pub index: usize,
  pub message: String,
}

/// Every fault collected while draining a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} teardown action(s) panicked", .faults.len())]
pub struct TeardownError {
  pub faults: Vec<TeardownFault>,
}

/// Failure to construct a scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
  #[error("failed to build thread pool: {0}")]
  ThreadPool(#[from] std::io::Error),

  #[cfg(feature = "tokio-scheduler")]
  #[error("no tokio runtime in scope: {0}")]
  NoRuntime(#[from] tokio::runtime::TryCurrentError),
}
