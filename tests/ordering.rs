// tests/ordering.rs

mod common;

use std::collections::HashSet;

use proptest::prelude::*;
use rundag::Graph;

use common::{ExecutionRecorder, builders, executor};

#[test]
fn diamond_respects_dependencies() {
    let executor = executor(4);
    let graph = Graph::with_name("diamond");
    let recorder = ExecutionRecorder::new();
    builders::diamond(&graph, &recorder);

    executor.run(&graph).wait().expect("run succeeds");

    assert!(recorder.finished_before("A", "B"));
    assert!(recorder.finished_before("A", "C"));
    assert!(recorder.finished_before("B", "D"));
    assert!(recorder.finished_before("C", "D"));
    assert_eq!(recorder.started().len(), 4);
}

#[test]
fn chain_runs_in_order_on_many_workers() {
    let executor = executor(8);
    let graph = Graph::new();
    let recorder = ExecutionRecorder::new();
    builders::chain(&graph, &recorder, 16);

    executor.run(&graph).wait().expect("run succeeds");

    let expected: Vec<String> = (0..16).map(|i| format!("t{i}")).collect();
    assert_eq!(recorder.started(), expected);
}

#[test]
fn placeholder_orders_its_neighbours() {
    let executor = executor(4);
    let graph = Graph::new();
    let recorder = ExecutionRecorder::new();

    let a = graph.emplace(recorder.task("A")).named("A");
    let b = graph.emplace(recorder.task("B")).named("B");
    let sync = graph.placeholder().named("sync");
    let c = graph.emplace(recorder.task("C")).named("C");

    sync.succeed([&a, &b]);
    sync.precede([&c]);

    executor.run(&graph).wait().expect("run succeeds");

    assert!(recorder.finished_before("A", "C"));
    assert!(recorder.finished_before("B", "C"));
    // Placeholders run no callable.
    assert_eq!(recorder.started().len(), 3);
}

#[test]
fn placeholder_can_be_given_work_later() {
    let executor = executor(2);
    let graph = Graph::new();
    let recorder = ExecutionRecorder::new();

    let a = graph.placeholder();
    assert!(!a.has_work());
    a.work(recorder.task("late"));
    assert!(a.has_work());

    executor.run(&graph).wait().expect("run succeeds");
    assert_eq!(recorder.count("late"), 1);
}

#[test]
fn empty_graph_completes_immediately() {
    let executor = executor(2);
    let graph = Graph::new();

    executor.run(&graph).wait().expect("empty run succeeds");
    executor.run_n(&graph, 5).wait().expect("empty run_n succeeds");
}

#[test]
fn independent_tasks_all_run_once() {
    let executor = executor(4);
    let graph = Graph::new();
    let recorder = ExecutionRecorder::new();
    for i in 0..64 {
        graph.emplace(recorder.task(&format!("t{i}")));
    }

    executor.run(&graph).wait().expect("run succeeds");

    let started: HashSet<String> = recorder.started().into_iter().collect();
    assert_eq!(started.len(), 64);
    assert_eq!(recorder.len(), 128);
}

// Task N may only depend on tasks 0..N, so every generated graph is acyclic.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..4),
            num_tasks,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, deps)| {
                    if i == 0 {
                        Vec::new()
                    } else {
                        let unique: HashSet<usize> = deps.into_iter().map(|d| d % i).collect();
                        unique.into_iter().collect()
                    }
                })
                .collect()
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn random_dag_runs_every_task_after_its_predecessors(
        deps in dag_strategy(12),
        workers in 1..5usize,
    ) {
        let executor = executor(workers);
        let graph = Graph::new();
        let recorder = ExecutionRecorder::new();
        builders::layered_dag(&graph, &recorder, &deps);
        prop_assert!(graph.check_acyclic().is_ok());

        executor.run(&graph).wait().expect("run succeeds");

        for (i, preds) in deps.iter().enumerate() {
            prop_assert_eq!(recorder.count(&format!("t{i}")), 1);
            for p in preds {
                prop_assert!(
                    recorder.finished_before(&format!("t{p}"), &format!("t{i}")),
                    "t{} must finish before t{} starts", p, i
                );
            }
        }
    }
}
