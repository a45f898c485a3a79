use super::Observable;
use crate::observer::Observer;

/// Creates an observable that produces values from an iterator.
///
/// Completes when all elements have been emitted. Never emits an error. The
/// iterable is cloned for every subscription.
///
/// # Examples
///
/// ```
/// use rxrt::prelude::*;
///
/// observable::from_iter(vec![0, 1, 2, 3]).subscribe(|v| println!("{v},"));
/// ```
pub fn from_iter<I>(iter: I) -> Observable<I::Item>
where
  I: IntoIterator + Clone + Send + Sync + 'static,
  I::Item: Send + 'static,
{
  Observable::from_fn(move |mut subscriber| {
    for v in iter.clone() {
      if !subscriber.is_subscribed() {
        return;
      }
      subscriber.on_next(v);
    }
    subscriber.on_completed();
  })
}

/// Creates an observable producing a single value, then completing.
pub fn of<T>(value: T) -> Observable<T>
where
  T: Clone + Send + Sync + 'static,
{
  from_iter(std::iter::once(value))
}
