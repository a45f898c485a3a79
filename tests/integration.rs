//! End-to-end behavior of the runtime: cancellation, the notification
//! grammar, virtual-time ordering and time-driven operator chains.

use std::{
  sync::{
    atomic::{AtomicUsize, Ordering},
    mpsc, Arc, Mutex,
  },
  thread,
};

use rxrt::{prelude::*, testing::*};

#[rxrt_macro::test]
fn repeated_unsubscribe_runs_each_teardown_once() {
  let runs = Arc::new(AtomicUsize::new(0));
  let root = Subscription::new();
  let child = Subscription::new();
  root.add(child.clone());
  for s in [&root, &child] {
    let runs = runs.clone();
    s.add_teardown(move || {
      runs.fetch_add(1, Ordering::SeqCst);
    });
  }

  let handles: Vec<_> = (0..8)
    .map(|_| {
      let root = root.clone();
      thread::spawn(move || {
        for _ in 0..10 {
          root.unsubscribe();
        }
      })
    })
    .collect();
  for h in handles {
    h.join().unwrap();
  }
  child.unsubscribe();

  assert_eq!(runs.load(Ordering::SeqCst), 2);
  assert!(!child.is_subscribed());
}

#[rxrt_macro::test]
fn only_the_first_terminal_is_delivered() {
  let log = Arc::new(Mutex::new(vec![]));
  let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
  observable::create(|mut subscriber: Subscriber<i32>| {
    subscriber.on_next(1);
    subscriber.on_completed();
    subscriber.on_next(2);
    subscriber.on_error(RxError::message("late"));
    subscriber.on_completed();
  })
  .subscribe_all(
    move |v| l1.lock().unwrap().push(Notification::Next(v)),
    move |e| l2.lock().unwrap().push(Notification::Error(e)),
    move || l3.lock().unwrap().push(Notification::Completed),
  );

  assert_eq!(*log.lock().unwrap(), vec![Notification::Next(1), Notification::Completed]);
}

#[rxrt_macro::test]
fn debounce_coalesces_a_burst() {
  let scheduler = make_test_scheduler();
  let xs = scheduler.create_hot_observable(vec![on_next(210, 2), on_next(240, 3), on_completed(300)]);
  let (source, c_scheduler) = (xs.observable(), scheduler.clone());
  let observer = scheduler
    .start(move || source.debounce(Duration::from_millis(30), Coordination::identity(c_scheduler)));

  assert_eq!(observer.messages(), vec![on_next(270, 3), on_completed(300)]);
}

#[rxrt_macro::test]
fn sample_fires_on_the_period_grid() {
  let scheduler = make_test_scheduler();
  let xs = scheduler.create_hot_observable(vec![
    on_next(210, 1),
    on_next(290, 2),
    on_next(330, 3),
    on_next(470, 4),
    on_completed(550),
  ]);
  let (source, c_scheduler) = (xs.observable(), scheduler.clone());
  let observer = scheduler.start(move || {
    source.sample_with_time(Duration::from_millis(100), Coordination::identity(c_scheduler))
  });

  assert_eq!(
    observer.messages(),
    vec![on_next(301, 2), on_next(401, 3), on_next(501, 4), on_completed(550)]
  );
}

#[rxrt_macro::test]
fn timeout_fires_one_period_after_the_last_value() {
  let scheduler = make_test_scheduler();
  let xs = scheduler.create_hot_observable(vec![on_next(211, 'a'), on_next(241, 'b')]);
  let (source, c_scheduler) = (xs.observable(), scheduler.clone());
  let observer = scheduler
    .start(move || source.timeout(Duration::from_millis(40), Coordination::identity(c_scheduler)));

  let messages = observer.messages();
  assert_eq!(messages.len(), 3);
  let last = &messages[2];
  assert_eq!(last.time, TimePoint::from_millis(281));
  assert!(matches!(&last.value, Notification::Error(e) if e.kind() == ErrorKind::Timeout));
}

#[rxrt_macro::test]
fn observer_panic_in_a_timer_becomes_on_error() {
  let scheduler = make_test_scheduler();
  let xs = scheduler.create_hot_observable(vec![on_next(10, 1), on_next(100, 2)]);
  let errors = Arc::new(Mutex::new(vec![]));
  let c_errors = errors.clone();

  let subscription = xs
    .observable()
    .delay(Duration::from_millis(20), Coordination::identity(scheduler.clone()))
    .subscribe_all(
      |v: i32| panic!("observer rejected {v}"),
      move |e| c_errors.lock().unwrap().push(e),
      || {},
    );
  scheduler.advance_to(TimePoint::from_millis(200));

  let expected = RxError::operator("coordinator", "observer rejected 1");
  assert_eq!(*errors.lock().unwrap(), vec![expected]);
  assert!(!subscription.is_subscribed());
  assert_eq!(scheduler.clock(), TimePoint::from_millis(200));
}

#[rxrt_macro::test]
fn virtual_clock_runs_by_due_time_not_call_order() {
  let scheduler = make_test_scheduler();
  let order = Arc::new(Mutex::new(vec![]));
  for ms in [300, 100, 200] {
    let order = order.clone();
    scheduler.schedule_absolute(TimePoint::from_millis(ms), move || order.lock().unwrap().push(ms));
  }

  scheduler.advance_to(TimePoint::from_millis(1000));
  assert_eq!(*order.lock().unwrap(), vec![100, 200, 300]);
  assert_eq!(scheduler.clock(), TimePoint::from_millis(1000));
}

#[rxrt_macro::test]
fn chained_operators_share_one_timeline() {
  let scheduler = make_test_scheduler();
  let xs = scheduler.create_hot_observable(vec![
    on_next(210, 1),
    on_next(215, 2),
    on_next(300, 3),
    on_completed(400),
  ]);
  let (source, c_scheduler) = (xs.observable(), scheduler.clone());
  let observer = scheduler.start(move || {
    source
      .throttle(Duration::from_millis(20), Coordination::identity(c_scheduler.clone()))
      .delay(Duration::from_millis(50), Coordination::identity(c_scheduler.clone()))
      .time_interval(Coordination::identity(c_scheduler))
  });

  let ms = Duration::from_millis;
  assert_eq!(
    observer.messages(),
    vec![on_next(260, ms(60)), on_next(280, ms(20)), on_next(350, ms(70)), on_completed(450)]
  );
}

#[rxrt_macro::test]
fn disposing_mid_flight_leaves_nothing_scheduled() {
  let scheduler = make_test_scheduler();
  let c_scheduler = scheduler.clone();
  let observer = scheduler.start_at(100, 200, 520, move || {
    observable::interval(Duration::from_millis(100), Coordination::identity(c_scheduler.clone()))
      .debounce(Duration::from_millis(50), Coordination::identity(c_scheduler.clone()))
      .delay(Duration::from_millis(10), Coordination::identity(c_scheduler))
  });

  assert_eq!(observer.messages(), vec![on_next(360, 0), on_next(460, 1)]);
  assert_eq!(scheduler.pending(), 0);
}

#[cfg(feature = "futures-scheduler")]
#[rxrt_macro::test]
fn thread_pool_chain_delivers_in_order() {
  let scheduler = ThreadPoolScheduler::new().unwrap();
  let (tx, rx) = mpsc::channel();
  let c_tx = tx.clone();

  observable::from_iter(0..20)
    .observe_on(Coordination::identity(scheduler.clone()))
    .delay(Duration::from_millis(5), Coordination::identity(scheduler.clone()))
    .timestamp(Coordination::identity(scheduler))
    .subscribe_all(
      move |(v, _)| c_tx.send(Some(v)).unwrap(),
      |_| {},
      move || tx.send(None).unwrap(),
    );

  let got: Vec<_> = (0..21).map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap()).collect();
  let values: Vec<_> = got.iter().flatten().copied().collect();
  assert_eq!(values, (0..20).collect::<Vec<_>>());
  assert_eq!(got.last(), Some(&None));
}

#[cfg(feature = "futures-scheduler")]
#[rxrt_macro::test]
fn thread_pool_timeout_reports_silence() {
  let scheduler = ThreadPoolScheduler::new().unwrap();
  let (tx, rx) = mpsc::channel();

  observable::never::<i32>()
    .timeout(Duration::from_millis(20), Coordination::identity(scheduler))
    .subscribe_all(|_| {}, move |e| tx.send(e).unwrap(), || {});

  let err = rx.recv_timeout(Duration::from_secs(5)).unwrap();
  assert!(err.is_timeout());
  assert_eq!(err.as_label(), "rx_timeout");
}

#[cfg(feature = "tokio-scheduler")]
#[rxrt_macro::test(shared)]
async fn tokio_runtime_drives_debounce() {
  let scheduler = TokioScheduler::current().unwrap();
  let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

  let subscription = observable::from_iter(vec![1, 2, 3])
    .debounce(Duration::from_millis(10), Coordination::identity(scheduler))
    .subscribe(move |v| {
      let _ = tx.send(v);
    });

  let v = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
  assert_eq!(v, Some(3));
  subscription.unsubscribe();
}
