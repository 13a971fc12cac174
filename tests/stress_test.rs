//! Stress tests for taskloop

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use taskloop::prelude::*;

#[test]
fn stress_test_pool_under_producers() {
    let workers: Arc<[Worker]> = (0..4).map(|i| Worker::new(format!("Worker #{}", i))).collect();
    for worker in workers.iter() {
        worker.start().unwrap();
    }

    let executed = Arc::new(AtomicUsize::new(0));
    let producers: Vec<_> = (0..4)
        .map(|_| {
            let workers = workers.clone();
            let executed = executed.clone();
            thread::spawn(move || {
                let pool = WorkerPool::new(&workers);
                for _ in 0..1_000 {
                    let executed = executed.clone();
                    pool.add_task(move || {
                        executed.fetch_add(1, Ordering::Relaxed);
                    });
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    let pool = WorkerPool::new(&workers);
    while pool.total_queued() > 0 {
        thread::yield_now();
    }
    for worker in workers.iter() {
        worker.stop();
    }

    assert_eq!(executed.load(Ordering::Relaxed), 4_000);
    let total: u64 = workers.iter().map(|w| w.status().executed).sum();
    assert_eq!(total, 4_000);
}

#[test]
#[ignore] // Run with --ignored flag
fn stress_test_many_producers_one_worker() {
    let worker = Arc::new(Worker::new("hot"));
    worker.start().unwrap();
    let executed = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    let producers: Vec<_> = (0..16)
        .map(|_| {
            let worker = worker.clone();
            let executed = executed.clone();
            thread::spawn(move || {
                for _ in 0..50_000 {
                    let executed = executed.clone();
                    worker.add_task(move || {
                        executed.fetch_add(1, Ordering::Relaxed);
                    });
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    while worker.tasks_count() > 0 {
        thread::yield_now();
    }
    worker.stop();

    assert_eq!(executed.load(Ordering::Relaxed), 16 * 50_000);
    println!("800K tasks through one worker: {:?}", start.elapsed());
}

#[test]
#[ignore]
fn stress_test_repeated_runtime_lifecycles() {
    for round in 0..50 {
        let runtime = Runtime::new(Config::builder().num_workers(4).build().unwrap()).unwrap();
        runtime.start().unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..10 {
            let order = order.clone();
            runtime.add_on_quit(move || order.lock().push(i));
        }
        for _ in 0..200 {
            runtime.submit(|| thread::sleep(Duration::from_micros(50)));
        }

        runtime.quit(round);
        assert_eq!(runtime.wait(), round);
        assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());
        assert!(runtime.workers().iter().all(Worker::is_finished));
    }
}
