//! Consumers on background threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use messenger_rust::{
    HandlersLocator, InMemoryTransport, MessageBus, SendersLocator, TransportLocator, Worker,
    WorkerOptions, WorkerThread,
};

use crate::support::{hello, Hello, PlaceOrder};

fn wait_until(deadline: Duration, done: impl Fn() -> bool) {
    let until = Instant::now() + deadline;
    while !done() && Instant::now() < until {
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn producer_and_consumer_threads_share_one_bus() {
    let transport = InMemoryTransport::recording();
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = handled.clone();

    let bus = Arc::new(
        MessageBus::builder()
            .senders(SendersLocator::new().route::<Hello, _, _>(["async"]))
            .transports(TransportLocator::new().with("async", Arc::new(transport.clone())))
            .handlers(HandlersLocator::new().handler(move |_: &Hello| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .build()
            .unwrap(),
    );

    let consumer = WorkerThread::spawn(
        Worker::new(bus.clone(), "async", Arc::new(transport.clone()))
            .with_options(WorkerOptions::default().with_idle_sleep(Duration::from_millis(5))),
    );

    let producers: Vec<_> = (0..4)
        .map(|i| {
            let bus = bus.clone();
            thread::spawn(move || {
                for j in 0..5 {
                    bus.dispatch(hello(&format!("{}-{}", i, j))).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    wait_until(Duration::from_secs(5), || handled.load(Ordering::SeqCst) >= 20);
    let stats = consumer.stop();

    assert_eq!(stats.messages_handled, 20);
    assert_eq!(transport.acknowledged().len(), 20);
    assert_eq!(transport.pending(), 0);
}

#[test]
fn stop_lets_the_current_message_finish() {
    let transport = InMemoryTransport::recording();
    let started = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));
    let (s, f) = (started.clone(), finished.clone());

    let bus = Arc::new(
        MessageBus::builder()
            .senders(SendersLocator::new().route::<PlaceOrder, _, _>(["orders"]))
            .transports(TransportLocator::new().with("orders", Arc::new(transport.clone())))
            .handlers(HandlersLocator::new().handler(move |_: &PlaceOrder| {
                s.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(100));
                f.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .build()
            .unwrap(),
    );

    for i in 0..3 {
        bus.dispatch(PlaceOrder {
            order_id: format!("o-{}", i),
            total_cents: 100,
        })
        .unwrap();
    }

    let consumer = WorkerThread::spawn(
        Worker::new(bus, "orders", Arc::new(transport.clone()))
            .with_options(WorkerOptions::default().with_idle_sleep(Duration::from_millis(5))),
    );

    wait_until(Duration::from_secs(5), || started.load(Ordering::SeqCst) >= 1);
    let stats = consumer.stop();

    // Whatever was started got finished and acknowledged.
    assert_eq!(started.load(Ordering::SeqCst), finished.load(Ordering::SeqCst));
    assert_eq!(stats.messages_handled, finished.load(Ordering::SeqCst));
    assert_eq!(transport.acknowledged().len(), stats.messages_handled);
    assert_eq!(transport.in_flight(), 0);
    assert_eq!(transport.pending() + stats.messages_handled, 3);
}
