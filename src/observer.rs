use tracing::error;

use crate::{
  error::RxError,
  observability::{components, events},
};

/// An Observer is a consumer of values delivered by an Observable. One method
/// for each type of notification that the Observable will deliver.
///
/// `on_error` and `on_completed` are terminal: a well-behaved producer calls
/// at most one of them, once, and nothing afterwards. [`Subscriber`] enforces
/// that grammar on behalf of any observer it wraps.
///
/// [`Subscriber`]: crate::subscriber::Subscriber
pub trait Observer<T>: Send {
  fn on_next(&mut self, value: T);

  fn on_error(&mut self, err: RxError);

  fn on_completed(&mut self);
}

impl<T, O> Observer<T> for Box<O>
where
  O: Observer<T> + ?Sized,
{
  #[inline]
  fn on_next(&mut self, value: T) { (**self).on_next(value) }

  #[inline]
  fn on_error(&mut self, err: RxError) { (**self).on_error(err) }

  #[inline]
  fn on_completed(&mut self) { (**self).on_completed() }
}

/// A notification reified as a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification<T> {
  Next(T),
  Error(RxError),
  Completed,
}

impl<T> Notification<T> {
  /// Delivers this notification to `observer`.
  pub fn accept<O: Observer<T> + ?Sized>(self, observer: &mut O) {
    match self {
      Notification::Next(v) => observer.on_next(v),
      Notification::Error(err) => observer.on_error(err),
      Notification::Completed => observer.on_completed(),
    }
  }

  pub fn is_terminal(&self) -> bool { !matches!(self, Notification::Next(_)) }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Notification<U> {
    match self {
      Notification::Next(v) => Notification::Next(f(v)),
      Notification::Error(err) => Notification::Error(err),
      Notification::Completed => Notification::Completed,
    }
  }
}

/// Observer assembled from closures.
pub struct ObserverFn<N, E, C> {
  next: N,
  error: E,
  complete: C,
}

/// An observer that only handles values. Errors are logged.
pub fn observer_fn<T, N>(next: N) -> ObserverFn<N, fn(RxError), fn()>
where
  N: FnMut(T) + Send,
{
  ObserverFn { next, error: log_unhandled, complete: || {} }
}

pub fn observer_all<T, N, E, C>(next: N, error: E, complete: C) -> ObserverFn<N, E, C>
where
  N: FnMut(T) + Send,
  E: FnMut(RxError) + Send,
  C: FnMut() + Send,
{
  ObserverFn { next, error, complete }
}

fn log_unhandled(err: RxError) {
  error!(
    event = events::UNHANDLED_ERROR,
    component = components::OBSERVER,
    kind = err.as_label(),
    err = %err,
    "observer has no error handler"
  );
}

impl<T, N, E, C> Observer<T> for ObserverFn<N, E, C>
where
  N: FnMut(T) + Send,
  E: FnMut(RxError) + Send,
  C: FnMut() + Send,
{
  #[inline]
  fn on_next(&mut self, value: T) { (self.next)(value) }

  #[inline]
  fn on_error(&mut self, err: RxError) { (self.error)(err) }

  #[inline]
  fn on_completed(&mut self) { (self.complete)() }
}
