// src/task/engine.rs

//! Generic dependency-scheduling engine.
//!
//! A task is a unit of asynchronous work that waits for N dependencies,
//! runs, and notifies M dependents when it completes. The engine owns every
//! task in a slab, keyed by [`TaskId`], and drives them from an explicit run
//! queue: nothing here recurses down the dependency graph, so stack depth
//! stays bounded no matter how deep the device tree is.
//!
//! The engine is single-threaded cooperative. All state transitions happen
//! on one logical executor; it is not safe for concurrent access from
//! multiple threads, and it does not try to be.
//!
//! Ownership is tracked with an explicit per-entry reference count:
//!
//! - the creator's handle, dropped by the engine once the completion
//!   callback has been delivered;
//! - a self reference held while the task is pending, dropped exactly when
//!   it completes;
//! - one reference per membership in a dependency's dependents list, dropped
//!   when that dependency completes and notifies;
//! - one reference per membership in the run queue, dropped at dequeue;
//! - external [`TaskEngine::retain`] / [`TaskEngine::release`] pairs.
//!
//! An entry is removed when its count reaches zero. Removing a still-pending
//! entry is a contract violation and fatal in debug builds.

use std::collections::VecDeque;
use std::fmt;

use slab::Slab;
use tracing::{debug, trace};

use crate::errors::{TaskError, TaskStatus};

/// Stable handle to a task owned by a [`TaskEngine`].
///
/// Ids are slab keys; a released id must not be used again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(usize);

impl TaskId {
    /// Raw slab index, for logging.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Once-only callback delivered when a task completes, after its dependents
/// have been notified.
pub type Completion<C> = Box<dyn FnOnce(&mut C, &TaskStatus)>;

/// Result of one [`Work::run`] invocation.
#[derive(Debug)]
pub enum StepOutcome {
    /// New dependencies were discovered; run again once they all finish.
    /// Must not be empty — a task waiting on nothing would never run again.
    Wait(Vec<TaskId>),
    /// An external action was issued; [`TaskEngine::complete`] will be
    /// called when it finishes.
    InFlight,
    /// The task is done.
    Done(TaskStatus),
}

/// What to do when a dependency finishes unsuccessfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Complete immediately with the dependency's error, without waiting for
    /// the remaining dependencies. This is the default.
    Abort,
    /// Count the failed dependency as finished and keep waiting.
    Tolerate,
}

/// Behavior of a task kind.
///
/// `C` is the collaborator context threaded through every run and completion
/// callback; the coordinator instantiates it with its device tree and
/// outbound command buffer.
pub trait Work<C> {
    /// Advance the task. Called when every previously registered dependency
    /// has finished, including the initial zero-dependency case. A task may
    /// run several times, returning [`StepOutcome::Wait`] for each wave of
    /// newly discovered dependencies.
    fn run(&mut self, id: TaskId, engine: &mut TaskEngine<C>, cx: &mut C) -> StepOutcome;

    /// Policy hook invoked when a dependency finishes unsuccessfully.
    fn dependency_failed(&mut self, error: &TaskError) -> FailureAction {
        let _ = error;
        FailureAction::Abort
    }
}

struct Entry<C> {
    work: Option<Box<dyn Work<C>>>,
    /// `None` while pending. Set exactly once.
    status: Option<TaskStatus>,
    /// Dependents in registration order; notified FIFO on completion.
    dependents: Vec<TaskId>,
    total_deps: usize,
    finished_deps: usize,
    queued: bool,
    refs: usize,
    on_complete: Option<Completion<C>>,
}

/// Deferred notification, processed iteratively by the drain loop.
enum Notice {
    /// A dependency of `dependent` finished with `status`.
    DependencyFinished { dependent: TaskId, status: TaskStatus },
    /// Deliver `task`'s completion callback and drop the creator handle.
    DeliverCallback { task: TaskId },
}

enum Advance {
    Ready,
    Fail(TaskError),
}

/// The task store and scheduler.
// TODO: tag TaskId with a generation counter so a stale id from a
// misbehaving host can never alias a reused slab slot.
pub struct TaskEngine<C> {
    tasks: Slab<Entry<C>>,
    run_queue: VecDeque<TaskId>,
    notices: VecDeque<Notice>,
}

impl<C> TaskEngine<C> {
    pub fn new() -> Self {
        Self {
            tasks: Slab::new(),
            run_queue: VecDeque::new(),
            notices: VecDeque::new(),
        }
    }

    /// Create a task and schedule its first run.
    ///
    /// The first run never happens inside `spawn` itself, even for tasks
    /// with no dependencies: it is deferred to the next drain so a partially
    /// wired-up caller is never re-entered.
    pub fn spawn(
        &mut self,
        work: impl Work<C> + 'static,
        on_complete: Option<Completion<C>>,
    ) -> TaskId {
        let key = self.tasks.insert(Entry {
            work: Some(Box::new(work)),
            status: None,
            dependents: Vec::new(),
            total_deps: 0,
            finished_deps: 0,
            queued: false,
            // creator handle + self reference while pending
            refs: 2,
            on_complete,
        });
        let id = TaskId(key);
        debug!(task = key, "task spawned");
        self.schedule(id);
        id
    }

    /// Take an extra reference on a task, keeping its entry observable after
    /// completion until a matching [`release`](Self::release).
    pub fn retain(&mut self, id: TaskId) {
        self.tasks
            .get_mut(id.0)
            .expect("retain of unknown task")
            .refs += 1;
    }

    /// Drop one reference. When the last reference goes, the entry is
    /// removed; removing a still-pending task is a contract violation.
    pub fn release(&mut self, id: TaskId) {
        let entry = self.tasks.get_mut(id.0).expect("release of unknown task");
        debug_assert!(entry.refs > 0, "task {} over-released", id.0);
        entry.refs -= 1;
        if entry.refs == 0 {
            debug_assert!(
                entry.status.is_some(),
                "task {} destroyed while still pending",
                id.0
            );
            trace!(task = id.0, "task entry removed");
            self.tasks.remove(id.0);
        }
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.contains(id.0)
    }

    pub fn is_completed(&self, id: TaskId) -> bool {
        self.status_of(id).is_some()
    }

    /// Completion status of a live task; `None` if pending or unknown.
    pub fn status_of(&self, id: TaskId) -> Option<&TaskStatus> {
        self.tasks.get(id.0).and_then(|e| e.status.as_ref())
    }

    /// Number of live tasks that have not completed yet.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.iter().filter(|(_, e)| e.status.is_none()).count()
    }

    /// True when no task is pending and no work is queued.
    pub fn is_idle(&self) -> bool {
        self.run_queue.is_empty()
            && self.notices.is_empty()
            && self.tasks.iter().all(|(_, e)| e.status.is_some())
    }

    /// Complete a task from outside, typically when the external action it
    /// issued reports back. Completing a task twice is fatal.
    pub fn complete(&mut self, cx: &mut C, id: TaskId, status: TaskStatus) {
        self.finish(id, status);
        self.pump_notices(cx);
    }

    /// Run queued tasks and process notifications until nothing is left.
    ///
    /// A dependency that is already finished when registered is fed back
    /// through the notice queue, so its dependent proceeds within this same
    /// drain — no extra scheduling round-trip.
    pub fn run_until_stalled(&mut self, cx: &mut C) {
        loop {
            self.pump_notices(cx);
            let Some(id) = self.run_queue.pop_front() else {
                break;
            };
            self.run_one(cx, id);
        }
    }

    fn schedule(&mut self, id: TaskId) {
        let entry = &mut self.tasks[id.0];
        if entry.queued || entry.status.is_some() {
            return;
        }
        entry.queued = true;
        entry.refs += 1;
        self.run_queue.push_back(id);
        trace!(task = id.0, "task scheduled");
    }

    fn run_one(&mut self, cx: &mut C, id: TaskId) {
        let completed = {
            let entry = self.tasks.get_mut(id.0).expect("queued task is gone");
            entry.queued = false;
            entry.status.is_some()
        };
        // Drop the queue's reference. A pending task stays alive through its
        // self reference.
        self.release(id);
        if completed {
            // Completed while waiting in the queue (fail-fast); nothing to run.
            return;
        }

        let entry = &mut self.tasks[id.0];
        debug_assert_eq!(
            entry.finished_deps, entry.total_deps,
            "task {} ran with unfinished dependencies",
            id.0
        );
        let mut work = entry.work.take().expect("pending task has no work");
        trace!(task = id.0, "running task");
        let outcome = work.run(id, self, cx);
        match outcome {
            StepOutcome::Wait(deps) => {
                debug_assert!(
                    !deps.is_empty(),
                    "task {} waits on nothing and would stall forever",
                    id.0
                );
                self.tasks[id.0].work = Some(work);
                for dep in deps {
                    self.register_dependency(id, dep);
                }
            }
            StepOutcome::InFlight => {
                self.tasks[id.0].work = Some(work);
                trace!(task = id.0, "task awaiting external completion");
            }
            StepOutcome::Done(status) => {
                drop(work);
                self.finish(id, status);
            }
        }
    }

    /// Register `dependent` as waiting on `dependency`.
    ///
    /// If the dependency has already finished, the dependent's accounting is
    /// fed through the notice queue instead of appending to a dependents
    /// list that will never be drained.
    fn register_dependency(&mut self, dependent: TaskId, dependency: TaskId) {
        debug_assert_ne!(dependent, dependency, "task cannot depend on itself");
        {
            let entry = self.tasks.get_mut(dependent.0).expect("dependent task is gone");
            debug_assert!(
                entry.status.is_none(),
                "dependency added to completed task {}",
                dependent.0
            );
            entry.total_deps += 1;
        }
        let finished = {
            let dep = self
                .tasks
                .get_mut(dependency.0)
                .expect("dependency task is gone");
            match &dep.status {
                Some(status) => Some(status.clone()),
                None => {
                    dep.dependents.push(dependent);
                    None
                }
            }
        };
        // The dependents list (or, for an already-finished dependency, the
        // queued notice) holds a reference to the dependent until it is
        // notified.
        self.tasks[dependent.0].refs += 1;
        match finished {
            Some(status) => {
                trace!(
                    task = dependent.0,
                    dependency = dependency.0,
                    "dependency already finished at registration"
                );
                self.notices
                    .push_back(Notice::DependencyFinished { dependent, status });
            }
            None => {
                trace!(task = dependent.0, dependency = dependency.0, "dependency registered");
            }
        }
    }

    /// Record a task's completion and queue its notifications.
    ///
    /// Observable order matches the contract: dependents are notified in
    /// registration order, then the completion callback fires.
    fn finish(&mut self, id: TaskId, status: TaskStatus) {
        let entry = self.tasks.get_mut(id.0).expect("completion for unknown task");
        assert!(entry.status.is_none(), "task {} completed twice", id.0);
        entry.status = Some(status.clone());
        entry.work = None;
        let dependents = std::mem::take(&mut entry.dependents);
        debug!(
            task = id.0,
            ok = status.is_ok(),
            dependents = dependents.len(),
            "task completed"
        );
        for dependent in dependents {
            self.notices.push_back(Notice::DependencyFinished {
                dependent,
                status: status.clone(),
            });
        }
        self.notices.push_back(Notice::DeliverCallback { task: id });
        // The self reference lasts exactly as long as the task is pending.
        self.release(id);
    }

    fn pump_notices(&mut self, cx: &mut C) {
        while let Some(notice) = self.notices.pop_front() {
            match notice {
                Notice::DependencyFinished { dependent, status } => {
                    self.dependency_finished(dependent, status);
                    self.release(dependent);
                }
                Notice::DeliverCallback { task } => {
                    let entry = self.tasks.get_mut(task.0).expect("completed task is gone");
                    let callback = entry.on_complete.take();
                    let status = entry.status.clone().expect("callback for pending task");
                    if let Some(callback) = callback {
                        callback(cx, &status);
                    }
                    // Completion has been delivered; drop the creator handle.
                    self.release(task);
                }
            }
        }
    }

    /// One of `id`'s dependencies finished. On success, count it and
    /// schedule the task once every known dependency is in. On failure,
    /// consult the task's failure policy; the default aborts immediately
    /// without touching the remaining (still pending, still running)
    /// dependencies.
    fn dependency_finished(&mut self, id: TaskId, status: TaskStatus) {
        let advance = {
            let entry = self.tasks.get_mut(id.0).expect("dependent task is gone");
            if entry.status.is_some() {
                // Already completed via fail-fast; nothing left to count.
                return;
            }
            match status {
                Ok(()) => {
                    entry.finished_deps += 1;
                    debug_assert!(entry.finished_deps <= entry.total_deps);
                    (entry.finished_deps == entry.total_deps).then_some(Advance::Ready)
                }
                Err(error) => {
                    let work = entry.work.as_mut().expect("pending task has no work");
                    match work.dependency_failed(&error) {
                        FailureAction::Abort => Some(Advance::Fail(error)),
                        FailureAction::Tolerate => {
                            entry.finished_deps += 1;
                            debug_assert!(entry.finished_deps <= entry.total_deps);
                            (entry.finished_deps == entry.total_deps).then_some(Advance::Ready)
                        }
                    }
                }
            }
        };
        match advance {
            Some(Advance::Ready) => self.schedule(id),
            Some(Advance::Fail(error)) => self.finish(id, Err(error)),
            None => {}
        }
    }
}

impl<C> Default for TaskEngine<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for TaskEngine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskEngine")
            .field("tasks", &self.tasks.len())
            .field("pending", &self.pending_tasks())
            .field("queued", &self.run_queue.len())
            .finish_non_exhaustive()
    }
}
