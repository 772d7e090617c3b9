//! Cooperative timer table for the single-threaded render loop.
//!
//! Tasks are never run from here. The driver asks for [`Schedule::due`] tasks and runs each one in
//! order, checking [`Schedule::is_live`] first: a task cancelled or restarted by an earlier task in
//! the same batch must not run.

use std::time::{Duration, Instant};

use derive_more::Display;
use indexmap::IndexMap;
use tracing::trace;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
pub enum TaskKind {
    /// Live quote tick.
    Tick,
    /// Historical playback advance.
    Playback,
    /// Detail graph refresh.
    Chart,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Task {
    period: Duration,
    deadline: Instant,
    generation: u64,
}

/// A task whose deadline has passed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DueTask {
    pub kind: TaskKind,
    pub generation: u64,
    pub deadline: Instant,
}

#[derive(Clone, Debug, Default)]
pub struct Schedule {
    tasks: IndexMap<TaskKind, Task>,
    generation: u64,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `kind`, or restart it with a new period. Returns the new generation.
    pub fn start(&mut self, kind: TaskKind, period: Duration, now: Instant) -> u64 {
        self.generation += 1;
        let period = period.max(Duration::from_millis(1));
        self.tasks.insert(
            kind,
            Task {
                period,
                deadline: now + period,
                generation: self.generation,
            },
        );
        trace!(%kind, ?period, generation = self.generation, "task started");
        self.generation
    }

    /// Returns `true` if the task was running.
    pub fn cancel(&mut self, kind: TaskKind) -> bool {
        let cancelled = self.tasks.shift_remove(&kind).is_some();
        if cancelled {
            trace!(%kind, "task cancelled");
        }
        cancelled
    }

    pub fn cancel_all(&mut self) {
        self.tasks.clear();
    }

    pub fn is_running(&self, kind: TaskKind) -> bool {
        self.tasks.contains_key(&kind)
    }

    pub fn period(&self, kind: TaskKind) -> Option<Duration> {
        self.tasks.get(&kind).map(|task| task.period)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.tasks.values().map(|task| task.deadline).min()
    }

    /// Collect every task due at `now`, earliest first, and book its next deadline.
    ///
    /// A task that fell more than one period behind fires once and resumes from `now`.
    pub fn due(&mut self, now: Instant) -> Vec<DueTask> {
        let mut due = self
            .tasks
            .iter_mut()
            .filter(|(_, task)| task.deadline <= now)
            .map(|(&kind, task)| {
                let fired = DueTask {
                    kind,
                    generation: task.generation,
                    deadline: task.deadline,
                };
                task.deadline += task.period;
                if task.deadline <= now {
                    task.deadline = now + task.period;
                }
                fired
            })
            .collect::<Vec<_>>();
        due.sort_by_key(|task| task.deadline);
        due
    }

    /// Whether `task` is still scheduled under the generation it fired with.
    pub fn is_live(&self, task: &DueTask) -> bool {
        self.tasks
            .get(&task.kind)
            .is_some_and(|current| current.generation == task.generation)
    }
}
