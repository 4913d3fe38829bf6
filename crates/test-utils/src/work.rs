use devcoord::task::{StepOutcome, TaskEngine, TaskId, Work};

/// Adapter turning a closure into a [`Work`] implementation, for driving the
/// task engine with scripted behavior in tests.
pub struct FnWork<F>(pub F);

impl<C, F> Work<C> for FnWork<F>
where
    F: FnMut(TaskId, &mut TaskEngine<C>, &mut C) -> StepOutcome,
{
    fn run(&mut self, id: TaskId, engine: &mut TaskEngine<C>, cx: &mut C) -> StepOutcome {
        (self.0)(id, engine, cx)
    }
}
