use super::Observable;
use crate::{error::RxError, observer::Observer};

/// Creates an observable that emits no items, just terminates with an error.
pub fn throw<T: Send + 'static>(err: RxError) -> Observable<T> {
  Observable::from_fn(move |mut subscriber| subscriber.on_error(err.clone()))
}

/// Creates an observable that produces no values and completes immediately.
pub fn empty<T: Send + 'static>() -> Observable<T> {
  Observable::from_fn(|mut subscriber| subscriber.on_completed())
}

/// Creates an observable that never emits anything, not even a terminal
/// notification.
pub fn never<T: Send + 'static>() -> Observable<T> { Observable::from_fn(|_subscriber| {}) }

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use crate::prelude::*;

  fn terminal<T: Send + 'static>(source: Observable<T>) -> (Subscription, Vec<String>) {
    let log = Arc::new(Mutex::new(vec![]));
    let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
    let subscription = source.subscribe_all(
      move |_| l1.lock().unwrap().push("next".to_string()),
      move |e: RxError| l2.lock().unwrap().push(format!("error: {e}")),
      move || l3.lock().unwrap().push("completed".to_string()),
    );
    let log = log.lock().unwrap().clone();
    (subscription, log)
  }

  #[rxrt_macro::test]
  fn throw_errors() {
    let (subscription, log) = terminal(observable::throw::<i32>(RxError::message("boom")));
    assert_eq!(log, vec!["error: boom"]);
    assert!(!subscription.is_subscribed());
  }

  #[rxrt_macro::test]
  fn empty_completes() {
    let (subscription, log) = terminal(observable::empty::<i32>());
    assert_eq!(log, vec!["completed"]);
    assert!(!subscription.is_subscribed());
  }

  #[rxrt_macro::test]
  fn never_stays_open() {
    let (subscription, log) = terminal(observable::never::<i32>());
    assert!(log.is_empty());
    assert!(subscription.is_subscribed());
  }
}
