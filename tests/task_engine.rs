// tests/task_engine.rs

//! Contract tests for the generic task engine, driven with scripted work.

use devcoord::errors::{TaskError, TaskStatus};
use devcoord::task::{FailureAction, StepOutcome, TaskEngine, TaskId, Work};
use devcoord_test_utils::init_tracing;
use devcoord_test_utils::work::FnWork;

/// Context shared by engine tests: ordered logs of observed events.
#[derive(Default)]
struct TestCx {
    log: Vec<String>,
    statuses: Vec<TaskStatus>,
}

fn in_flight(name: &'static str) -> FnWork<impl FnMut(TaskId, &mut TaskEngine<TestCx>, &mut TestCx) -> StepOutcome>
{
    FnWork(move |_, _: &mut TaskEngine<TestCx>, cx: &mut TestCx| {
        cx.log.push(format!("{name}:run"));
        StepOutcome::InFlight
    })
}

fn record_status() -> devcoord::task::Completion<TestCx> {
    Box::new(|cx: &mut TestCx, status: &TaskStatus| cx.statuses.push(status.clone()))
}

#[test]
fn zero_dependency_task_runs_once_on_next_drain_not_at_spawn() {
    init_tracing();
    let mut engine = TaskEngine::new();
    let mut cx = TestCx::default();

    engine.spawn(
        FnWork(|_, _: &mut TaskEngine<TestCx>, cx: &mut TestCx| {
            cx.log.push("ran".to_string());
            StepOutcome::Done(Ok(()))
        }),
        Some(record_status()),
    );

    // Never synchronously inside spawn.
    assert!(cx.log.is_empty());
    assert!(cx.statuses.is_empty());

    engine.run_until_stalled(&mut cx);
    assert_eq!(cx.log, vec!["ran".to_string()]);
    assert_eq!(cx.statuses, vec![Ok(())]);

    // Exactly once.
    engine.run_until_stalled(&mut cx);
    assert_eq!(cx.log, vec!["ran".to_string()]);
    assert_eq!(cx.statuses.len(), 1);
    assert!(engine.is_idle());
}

#[test]
fn rerun_happens_only_after_all_dependencies_finish() {
    init_tracing();
    let mut engine = TaskEngine::new();
    let mut cx = TestCx::default();

    let d1 = engine.spawn(in_flight("d1"), None);
    let d2 = engine.spawn(in_flight("d2"), None);

    let mut wave = 0;
    engine.spawn(
        FnWork(move |_, _: &mut TaskEngine<TestCx>, cx: &mut TestCx| {
            wave += 1;
            if wave == 1 {
                cx.log.push("t:wait".to_string());
                StepOutcome::Wait(vec![d1, d2])
            } else {
                cx.log.push("t:done".to_string());
                StepOutcome::Done(Ok(()))
            }
        }),
        None,
    );

    engine.run_until_stalled(&mut cx);
    assert!(cx.log.contains(&"t:wait".to_string()));
    assert!(!cx.log.contains(&"t:done".to_string()));

    engine.complete(&mut cx, d1, Ok(()));
    engine.run_until_stalled(&mut cx);
    assert!(
        !cx.log.contains(&"t:done".to_string()),
        "task ran again before all dependencies finished"
    );

    engine.complete(&mut cx, d2, Ok(()));
    engine.run_until_stalled(&mut cx);
    assert!(cx.log.contains(&"t:done".to_string()));
    assert!(engine.is_idle());
}

#[test]
fn dependents_are_notified_in_registration_order() {
    init_tracing();
    let mut engine = TaskEngine::new();
    let mut cx = TestCx::default();

    let dep = engine.spawn(in_flight("dep"), None);

    for name in ["a", "b", "c"] {
        let mut first = true;
        engine.spawn(
            FnWork(move |_, _: &mut TaskEngine<TestCx>, cx: &mut TestCx| {
                if first {
                    first = false;
                    StepOutcome::Wait(vec![dep])
                } else {
                    cx.log.push(name.to_string());
                    StepOutcome::Done(Ok(()))
                }
            }),
            None,
        );
    }

    engine.run_until_stalled(&mut cx);
    cx.log.clear();

    engine.complete(&mut cx, dep, Ok(()));
    engine.run_until_stalled(&mut cx);
    assert_eq!(cx.log, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
}

#[test]
#[should_panic(expected = "completed twice")]
fn completing_a_task_twice_is_fatal() {
    let mut engine = TaskEngine::new();
    let mut cx = TestCx::default();

    let t = engine.spawn(in_flight("t"), None);
    engine.retain(t);
    engine.complete(&mut cx, t, Ok(()));
    engine.complete(&mut cx, t, Ok(()));
}

#[test]
fn first_failed_dependency_completes_the_dependent_immediately() {
    init_tracing();
    let mut engine = TaskEngine::new();
    let mut cx = TestCx::default();

    let d1 = engine.spawn(in_flight("d1"), None);
    let d2 = engine.spawn(in_flight("d2"), None);

    let mut wave = 0;
    let t = engine.spawn(
        FnWork(move |_, _: &mut TaskEngine<TestCx>, _: &mut TestCx| {
            wave += 1;
            assert_eq!(wave, 1, "task must not run again after fail-fast");
            StepOutcome::Wait(vec![d1, d2])
        }),
        Some(record_status()),
    );

    engine.run_until_stalled(&mut cx);
    assert!(cx.statuses.is_empty());

    // D2 fails while D1 is still pending: T completes with D2's error,
    // without waiting for D1 and without touching it.
    engine.complete(&mut cx, d2, Err(TaskError::Driver(5)));
    assert_eq!(cx.statuses, vec![Err(TaskError::Driver(5))]);
    assert!(engine.contains(d1));
    assert!(!engine.is_completed(d1));
    // T stays observable while D1's dependents list still references it.
    assert!(engine.is_completed(t));

    // D1 finishes on its own later; the late notification is absorbed and
    // T's entry is finally reclaimed.
    engine.complete(&mut cx, d1, Ok(()));
    assert!(!engine.contains(t));
    assert_eq!(cx.statuses.len(), 1);
    assert!(engine.is_idle());
}

#[test]
fn dependency_already_finished_at_registration_proceeds_in_same_drain() {
    init_tracing();
    let mut engine = TaskEngine::new();
    let mut cx = TestCx::default();

    let dep = engine.spawn(
        FnWork(|_, _: &mut TaskEngine<TestCx>, _: &mut TestCx| StepOutcome::Done(Ok(()))),
        None,
    );
    engine.retain(dep);
    engine.run_until_stalled(&mut cx);
    assert!(engine.is_completed(dep));

    let mut wave = 0;
    engine.spawn(
        FnWork(move |_, _: &mut TaskEngine<TestCx>, cx: &mut TestCx| {
            wave += 1;
            if wave == 1 {
                StepOutcome::Wait(vec![dep])
            } else {
                cx.log.push("t:done".to_string());
                StepOutcome::Done(Ok(()))
            }
        }),
        Some(record_status()),
    );

    // A single drain is enough: the already-finished dependency is counted
    // without an extra scheduling round-trip.
    engine.run_until_stalled(&mut cx);
    assert_eq!(cx.log, vec!["t:done".to_string()]);
    assert_eq!(cx.statuses, vec![Ok(())]);

    engine.release(dep);
    assert!(!engine.contains(dep));
}

#[test]
#[should_panic(expected = "still pending")]
fn destroying_a_pending_task_is_fatal() {
    let mut engine: TaskEngine<TestCx> = TaskEngine::new();
    let mut cx = TestCx::default();

    let t = engine.spawn(in_flight("t"), None);
    engine.run_until_stalled(&mut cx);

    // Drop the creator handle and the self reference while the task is
    // still awaiting its external completion.
    engine.release(t);
    engine.release(t);
}

struct TolerantWork {
    deps: Vec<TaskId>,
    wave: usize,
}

impl Work<TestCx> for TolerantWork {
    fn run(&mut self, _id: TaskId, _engine: &mut TaskEngine<TestCx>, cx: &mut TestCx) -> StepOutcome {
        self.wave += 1;
        if self.wave == 1 {
            StepOutcome::Wait(self.deps.clone())
        } else {
            cx.log.push("tolerant:done".to_string());
            StepOutcome::Done(Ok(()))
        }
    }

    fn dependency_failed(&mut self, _error: &TaskError) -> FailureAction {
        FailureAction::Tolerate
    }
}

#[test]
fn tolerant_task_keeps_waiting_past_a_failed_dependency() {
    init_tracing();
    let mut engine = TaskEngine::new();
    let mut cx = TestCx::default();

    let d1 = engine.spawn(in_flight("d1"), None);
    let d2 = engine.spawn(in_flight("d2"), None);
    engine.spawn(
        TolerantWork {
            deps: vec![d1, d2],
            wave: 0,
        },
        Some(record_status()),
    );

    engine.run_until_stalled(&mut cx);

    engine.complete(&mut cx, d1, Err(TaskError::Driver(7)));
    engine.run_until_stalled(&mut cx);
    assert!(cx.statuses.is_empty(), "tolerant task completed early");

    engine.complete(&mut cx, d2, Ok(()));
    engine.run_until_stalled(&mut cx);
    assert_eq!(cx.log, vec!["tolerant:done".to_string()]);
    assert_eq!(cx.statuses, vec![Ok(())]);
}
