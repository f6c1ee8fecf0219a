use std::fmt;

use super::Page;

pub(crate) type TimerCallback = Box<dyn FnOnce(&mut Page)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTimer {
    pub id: TimerId,
    pub due_at: i64,
    pub order: u64,
}

pub(crate) struct ScheduledTask {
    pub(crate) id: TimerId,
    pub(crate) due_at: i64,
    pub(crate) order: u64,
    pub(crate) callback: TimerCallback,
}

#[derive(Default)]
pub(crate) struct TimerQueue {
    tasks: Vec<ScheduledTask>,
    next_id: u64,
    next_order: u64,
}

impl TimerQueue {
    pub(crate) fn schedule(&mut self, due_at: i64, callback: TimerCallback) -> TimerId {
        self.next_id += 1;
        self.next_order += 1;
        let id = TimerId(self.next_id);
        self.tasks.push(ScheduledTask {
            id,
            due_at,
            order: self.next_order,
            callback,
        });
        id
    }

    pub(crate) fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        self.tasks.len() != before
    }

    /// Earliest task due at or before `limit`; ties run in scheduling order.
    pub(crate) fn pop_due(&mut self, limit: i64) -> Option<ScheduledTask> {
        let position = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.due_at <= limit)
            .min_by_key(|(_, task)| (task.due_at, task.order))
            .map(|(position, _)| position)?;
        Some(self.tasks.remove(position))
    }

    pub(crate) fn pending(&self) -> Vec<PendingTimer> {
        let mut out: Vec<_> = self
            .tasks
            .iter()
            .map(|task| PendingTimer {
                id: task.id,
                due_at: task.due_at,
                order: task.order,
            })
            .collect();
        out.sort_by_key(|timer| (timer.due_at, timer.order));
        out
    }
}

impl fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_tasks_pop_in_time_then_schedule_order() {
        let mut queue = TimerQueue::default();
        let late = queue.schedule(50, Box::new(|_| {}));
        let first = queue.schedule(10, Box::new(|_| {}));
        let second = queue.schedule(10, Box::new(|_| {}));

        assert_eq!(queue.pop_due(20).map(|task| task.id), Some(first));
        assert_eq!(queue.pop_due(20).map(|task| task.id), Some(second));
        assert!(queue.pop_due(20).is_none());
        assert!(queue.cancel(late));
        assert!(queue.pending().is_empty());
    }
}
