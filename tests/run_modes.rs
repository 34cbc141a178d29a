// tests/run_modes.rs

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use parking_lot::Mutex;
use rundag::Graph;

use common::{counter, executor, load, with_timeout};

#[test]
fn run_n_executes_exactly_n_iterations() {
    let executor = executor(4);
    let graph = Graph::new();
    let (count, bump) = counter();
    graph.emplace(bump);

    executor.run_n(&graph, 7).wait().expect("run_n succeeds");
    assert_eq!(load(&count), 7);
}

#[test]
fn run_n_iterations_observe_their_index_in_order() {
    let executor = executor(4);
    let graph = Graph::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    {
        let log = Arc::clone(&log);
        let mut iteration = 0usize;
        graph.emplace(move || {
            log.lock().push(iteration);
            iteration += 1;
        });
    }

    executor.run_n(&graph, 4).wait().expect("run_n succeeds");
    assert_eq!(*log.lock(), vec![0, 1, 2, 3]);
}

#[test]
fn run_n_zero_completes_without_running() {
    let executor = executor(2);
    let graph = Graph::new();
    let (count, bump) = counter();
    graph.emplace(bump);

    let fired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fired);
    executor
        .run_n_with(&graph, 0, move || flag.store(true, Ordering::SeqCst))
        .wait()
        .expect("zero iterations succeed");

    assert_eq!(load(&count), 0);
    assert!(fired.load(Ordering::SeqCst));
}

#[test]
fn queued_requests_on_one_graph_run_in_order() {
    let executor = executor(4);
    let graph = Graph::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let value = Arc::new(AtomicUsize::new(0));
    {
        let value = Arc::clone(&value);
        let log = Arc::clone(&log);
        graph.emplace(move || {
            log.lock().push(value.load(Ordering::SeqCst));
        });
    }

    let futures: Vec<_> = (0..4)
        .map(|i| {
            let value = Arc::clone(&value);
            // Callback of request i arms the value request i + 1 observes.
            executor.run_with(&graph, move || value.store(i + 1, Ordering::SeqCst))
        })
        .collect();

    for future in futures {
        future.wait().expect("run succeeds");
    }
    assert_eq!(*log.lock(), vec![0, 1, 2, 3]);
}

#[test]
fn runs_of_the_same_graph_never_overlap() {
    let executor = executor(4);
    let graph = Graph::new();
    let in_flight = Arc::new(AtomicUsize::new(0));
    let overlap = Arc::new(AtomicBool::new(false));
    let (count, _) = counter();

    {
        let in_flight = Arc::clone(&in_flight);
        let overlap = Arc::clone(&overlap);
        let count = Arc::clone(&count);
        graph.emplace(move || {
            if in_flight.fetch_add(1, Ordering::SeqCst) != 0 {
                overlap.store(true, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_millis(2));
            count.fetch_add(1, Ordering::SeqCst);
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }

    let a = executor.run_n(&graph, 5);
    let b = executor.run_n(&graph, 5);
    let c = executor.run(&graph);
    a.wait().expect("first request succeeds");
    b.wait().expect("second request succeeds");
    c.wait().expect("third request succeeds");

    assert!(!overlap.load(Ordering::SeqCst));
    assert_eq!(load(&count), 11);
}

#[test]
fn run_until_stops_at_first_true() {
    let executor = executor(2);
    let graph = Graph::new();
    let (count, bump) = counter();
    graph.emplace(bump);

    let current = Arc::clone(&count);
    executor
        .run_until(&graph, move || current.load(Ordering::SeqCst) == 5)
        .wait()
        .expect("run_until succeeds");

    assert_eq!(load(&count), 5);
}

#[test]
fn run_until_runs_at_least_once() {
    let executor = executor(2);
    let graph = Graph::new();
    let (count, bump) = counter();
    graph.emplace(bump);

    let checks = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&checks);
    executor
        .run_until(&graph, move || {
            seen.fetch_add(1, Ordering::SeqCst);
            true
        })
        .wait()
        .expect("run_until succeeds");

    assert_eq!(load(&count), 1);
    assert_eq!(checks.load(Ordering::SeqCst), 1);
}

#[test]
fn callback_fires_once_before_future_resolves() {
    let executor = executor(2);
    let graph = Graph::new();
    let (count, bump) = counter();
    graph.emplace(bump);

    let calls = Arc::new(AtomicUsize::new(0));
    let observed = Arc::new(AtomicUsize::new(usize::MAX));
    let future = {
        let calls = Arc::clone(&calls);
        let observed = Arc::clone(&observed);
        let count = Arc::clone(&count);
        executor.run_n_with(&graph, 3, move || {
            calls.fetch_add(1, Ordering::SeqCst);
            observed.store(count.load(Ordering::SeqCst), Ordering::SeqCst);
        })
    };

    future.wait().expect("run succeeds");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(observed.load(Ordering::SeqCst), 3);
}

#[test]
fn run_until_with_fires_callback() {
    let executor = executor(2);
    let graph = Graph::new();
    let (count, bump) = counter();
    graph.emplace(bump);

    let (tx, rx) = mpsc::channel();
    let current = Arc::clone(&count);
    executor
        .run_until_with(
            &graph,
            move || current.load(Ordering::SeqCst) >= 2,
            move || tx.send("done").expect("receiver alive"),
        )
        .wait()
        .expect("run succeeds");

    assert_eq!(rx.try_recv(), Ok("done"));
    assert_eq!(load(&count), 2);
}

#[test]
fn wait_for_all_covers_every_graph() {
    let executor = executor(4);
    let graphs: Vec<Graph> = (0..4).map(|_| Graph::new()).collect();
    let (count, _) = counter();

    for graph in &graphs {
        let count = Arc::clone(&count);
        graph.emplace(move || {
            std::thread::sleep(Duration::from_millis(1));
            count.fetch_add(1, Ordering::SeqCst);
        });
    }

    let futures: Vec<_> = graphs.iter().map(|g| executor.run_n(g, 10)).collect();
    executor.wait_for_all();

    assert_eq!(load(&count), 40);
    assert_eq!(executor.num_topologies(), 0);
    for mut future in futures {
        assert!(matches!(future.try_wait(), Some(Ok(()))));
    }
}

#[test]
fn num_topologies_reports_in_flight_runs() {
    let executor = executor(2);
    let graph = Graph::new();
    let (started_tx, started_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);

    graph.emplace(move || {
        started_tx.send(()).expect("test alive");
        release_rx.lock().recv().expect("test alive");
    });

    let mut future = executor.run(&graph);
    started_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("task started");

    assert_eq!(executor.num_topologies(), 1);
    assert!(future.try_wait().is_none());

    release_tx.send(()).expect("task alive");
    future.wait().expect("run succeeds");
    executor.wait_for_all();
    assert_eq!(executor.num_topologies(), 0);
}

#[test]
fn different_graphs_share_the_workers() {
    let executor = executor(2);
    let (left_tx, left_rx) = mpsc::channel::<()>();
    let (right_tx, right_rx) = mpsc::channel::<()>();
    let left_rx = Mutex::new(left_rx);
    let right_rx = Mutex::new(right_rx);

    // Each graph waits for the other, so they only finish if both run
    // at the same time.
    let left = Graph::with_name("left");
    left.emplace(move || {
        right_tx.send(()).expect("peer alive");
        left_rx
            .lock()
            .recv_timeout(Duration::from_secs(5))
            .expect("peer ran concurrently");
    });
    let right = Graph::with_name("right");
    right.emplace(move || {
        left_tx.send(()).expect("peer alive");
        right_rx
            .lock()
            .recv_timeout(Duration::from_secs(5))
            .expect("peer ran concurrently");
    });

    let a = executor.run(&left);
    let b = executor.run(&right);
    a.wait().expect("left succeeds");
    b.wait().expect("right succeeds");
}

#[test]
fn graph_can_be_edited_between_runs() {
    let executor = executor(2);
    let graph = Graph::new();
    let (count, bump) = counter();
    graph.emplace(bump);

    executor.run(&graph).wait().expect("first run");
    assert_eq!(load(&count), 1);

    let more = Arc::clone(&count);
    graph.emplace(move || {
        more.fetch_add(10, Ordering::SeqCst);
    });
    executor.run(&graph).wait().expect("second run");
    assert_eq!(load(&count), 12);

    graph.clear();
    executor.run(&graph).wait().expect("run of cleared graph");
    assert_eq!(load(&count), 12);
}

#[test]
fn drop_waits_for_outstanding_requests() {
    let graph = Graph::new();
    let (count, _) = counter();
    {
        let count = Arc::clone(&count);
        graph.emplace(move || {
            std::thread::sleep(Duration::from_millis(1));
            count.fetch_add(1, Ordering::SeqCst);
        });
    }

    {
        let executor = executor(2);
        let _future = executor.run_n(&graph, 20);
    }

    assert_eq!(load(&count), 20);
}

#[tokio::test]
async fn run_future_can_be_awaited() {
    let executor = executor(2);
    let graph = Graph::new();
    let (count, bump) = counter();
    graph.emplace(bump);

    with_timeout(executor.run_n(&graph, 3))
        .await
        .expect("run succeeds");
    assert_eq!(load(&count), 3);
}
