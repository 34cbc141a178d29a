use rundag::{Graph, Task};

use crate::recorder::ExecutionRecorder;

/// A -> {B, C}, B -> D, C -> D; every task records into `recorder`.
pub fn diamond(graph: &Graph, recorder: &ExecutionRecorder) -> [Task; 4] {
    let a = graph.emplace(recorder.task("A")).named("A");
    let b = graph.emplace(recorder.task("B")).named("B");
    let c = graph.emplace(recorder.task("C")).named("C");
    let d = graph.emplace(recorder.task("D")).named("D");

    a.precede([&b, &c]);
    d.succeed([&b, &c]);

    [a, b, c, d]
}

/// `n` recording tasks named `t0..t{n-1}`, chained in order.
pub fn chain(graph: &Graph, recorder: &ExecutionRecorder, n: usize) -> Vec<Task> {
    let tasks: Vec<Task> = (0..n)
        .map(|i| {
            let name = format!("t{i}");
            graph.emplace(recorder.task(&name)).named(name)
        })
        .collect();
    graph.linearize(&tasks);
    tasks
}

/// Recording tasks `t0..` where `deps[i]` lists predecessors of task `i`.
///
/// Entries that are not strictly smaller than `i` are dropped, so the
/// result is always acyclic.
pub fn layered_dag(graph: &Graph, recorder: &ExecutionRecorder, deps: &[Vec<usize>]) -> Vec<Task> {
    let tasks: Vec<Task> = (0..deps.len())
        .map(|i| {
            let name = format!("t{i}");
            graph.emplace(recorder.task(&name)).named(name)
        })
        .collect();

    for (i, preds) in deps.iter().enumerate() {
        for &p in preds.iter().filter(|&&p| p < i) {
            tasks[p].precede([&tasks[i]]);
        }
    }
    tasks
}
