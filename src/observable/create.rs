use super::Observable;
use crate::subscriber::Subscriber;

/// Creates an observable from a subscribe function.
///
/// `subscribe` is called once per subscription with the subscriber to push
/// into. It should stop producing once `is_subscribed()` turns `false`, and
/// may register cleanup with `add_teardown`.
///
/// # Examples
///
/// ```
/// use rxrt::prelude::*;
///
/// observable::create(|mut subscriber: Subscriber<i32>| {
///   subscriber.on_next(1);
///   subscriber.on_next(2);
///   subscriber.on_completed();
/// })
/// .subscribe(|v| println!("{v}"));
/// ```
pub fn create<T, F>(subscribe: F) -> Observable<T>
where
  T: Send + 'static,
  F: Fn(Subscriber<T>) + Send + Sync + 'static,
{
  Observable::from_fn(subscribe)
}
