//! Cooperative round-robin task scheduling.
//!
//! Tasks live in a fixed table of [`MAX_TASKS`] slots. Each [`Scheduler::tick`] picks the next
//! ready slot after the one that ran last, wrapping around the table, and calls its entry function
//! to completion. There is no preemption: a task that never returns stops all scheduling.

use crate::{
    config::MAX_TASKS,
    error::{ErrorKind, Result},
};

/// The opaque argument handed to a task's entry function on every run.
pub type TaskArg = usize;

/// A task's entry function.
///
/// `C` is the context the scheduler's owner passes into each tick, which is how tasks reach other
/// kernel services (the [`Kernel`](crate::Kernel) passes its allocator).
pub type TaskEntry<C> = fn(&mut C, TaskArg);

/// A task's identifier.
///
/// Identifiers count up from 1 and are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Get the raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for TaskId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// The state of a task slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// The slot holds no task.
    Unused,
    /// The task is waiting for its next turn.
    Ready,
    /// The task's entry function is executing.
    Running,
}

/// A saved execution context.
///
/// Tasks currently run to completion on the scheduler's own stack, so this is never filled in.
/// It is kept so that switching into and out of a task's own stack can be added later.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SavedContext {
    /// The task's stack pointer at its last suspension.
    pub stack_pointer: usize,
}

struct Task<C> {
    id: TaskId,
    state: TaskState,
    entry: TaskEntry<C>,
    arg: TaskArg,
    context: SavedContext,
}

impl<C> Task<C> {
    fn unused() -> Self {
        Self {
            id: TaskId(0),
            state: TaskState::Unused,
            entry: |_, _| {},
            arg: 0,
            context: SavedContext { stack_pointer: 0 },
        }
    }
}

/// A table of cooperative tasks and the round-robin driver that runs them.
pub struct Scheduler<C> {
    tasks: [Task<C>; MAX_TASKS],
    /// The slot that ran most recently.
    last_slot: Option<usize>,
    /// The identifier the next created task gets.
    next_id: u64,
}

impl<C> Scheduler<C> {
    /// Construct a scheduler with every slot unused.
    #[doc(alias = "scheduler_init")]
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: core::array::from_fn(|_| Task::unused()),
            last_slot: None,
            next_id: 1,
        }
    }

    /// Add a task to the first unused slot.
    ///
    /// Fails with [`ErrorKind::TaskTableFull`] if no slot is unused, leaving the table unchanged.
    pub fn create_task(&mut self, entry: TaskEntry<C>, arg: TaskArg) -> Result<TaskId> {
        let Some((slot, task)) = self
            .tasks
            .iter_mut()
            .enumerate()
            .find(|(_, task)| task.state == TaskState::Unused)
        else {
            log::warn!("No unused slot for a new task");
            return Err(ErrorKind::TaskTableFull.into());
        };
        let id = TaskId(self.next_id);
        self.next_id += 1;
        *task = Task {
            id,
            state: TaskState::Ready,
            entry,
            arg,
            context: SavedContext::default(),
        };
        log::debug!("Created {id} in slot {slot}");
        Ok(id)
    }

    /// Run the next ready task once.
    ///
    /// The search starts at the slot after the one that ran last and wraps around the whole table,
    /// so with a stable set of `N` ready tasks any `N` consecutive ticks run each exactly once, in
    /// slot order.
    ///
    /// Returns the task that ran, or `None` if no task was ready.
    pub fn tick(&mut self, ctx: &mut C) -> Option<TaskId> {
        let start = self.last_slot.map_or(0, |slot| slot + 1);
        let slot = (start..start + MAX_TASKS)
            .map(|slot| slot % MAX_TASKS)
            .find(|&slot| self.tasks[slot].state == TaskState::Ready)?;

        self.last_slot = Some(slot);
        let task = &mut self.tasks[slot];
        let (id, entry, arg) = (task.id, task.entry, task.arg);
        task.state = TaskState::Running;
        log::trace!("Running {id} from slot {slot}");

        entry(ctx, arg);

        self.tasks[slot].state = TaskState::Ready;
        Some(id)
    }

    /// Run ticks forever.
    ///
    /// When nothing is ready this spins. Only a running task can make more work ready, so an idle
    /// table spins until the machine halts.
    pub fn run(&mut self, ctx: &mut C) -> ! {
        loop {
            if self.tick(ctx).is_none() {
                core::hint::spin_loop();
            }
        }
    }

    /// Get the state of the given task, if it is in the table.
    #[must_use]
    pub fn state(&self, id: TaskId) -> Option<TaskState> {
        self.find(id).map(|task| task.state)
    }

    /// Get the saved execution context of the given task, if it is in the table.
    #[must_use]
    pub fn saved_context(&self, id: TaskId) -> Option<SavedContext> {
        self.find(id).map(|task| task.context)
    }

    /// The number of slots holding a task.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|task| task.state != TaskState::Unused)
            .count()
    }

    /// The slot that ran most recently, if any task has run.
    #[must_use]
    pub const fn last_slot(&self) -> Option<usize> {
        self.last_slot
    }

    fn find(&self, id: TaskId) -> Option<&Task<C>> {
        self.tasks
            .iter()
            .find(|task| task.state != TaskState::Unused && task.id == id)
    }
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> core::fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scheduler")
            .field("task_count", &self.task_count())
            .field("last_slot", &self.last_slot)
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}
