use crate::{coordination::Coordination, observable::Observable};

impl<T: Send + 'static> Observable<T> {
  /// Subscribes to this observable from a worker of `coordination` instead
  /// of the caller.
  ///
  /// Unsubscribing before the worker gets to it means the source is never
  /// subscribed at all.
  pub fn subscribe_on(&self, coordination: Coordination) -> Observable<T> {
    let source = self.clone();
    Observable::from_fn(move |subscriber| {
      let coordinator = coordination.create_coordinator(subscriber.subscription());
      let source = source.clone();
      coordinator.schedule(move || {
        source.subscribe_with(subscriber);
        Ok(())
      });
    })
  }
}
