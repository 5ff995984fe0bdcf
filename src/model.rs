#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub workers: usize,
    pub active_tasks: usize,
    pub idle_workers: usize,
    pub queued_tasks: usize,
    pub total_spawned: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub rejected_tasks: usize,
    pub respawned_workers: usize,
}

impl PoolMetrics {
    pub fn utilization(&self) -> f64 {
        if self.active_tasks + self.idle_workers == 0 {
            return 0.0;
        }
        self.active_tasks as f64 / (self.active_tasks + self.idle_workers) as f64
    }

    pub fn queue_pressure(&self) -> f64 {
        if self.workers == 0 {
            return self.queued_tasks as f64;
        }
        self.queued_tasks as f64 / self.workers as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.completed_tasks + self.failed_tasks;
        if total == 0 {
            return 1.0;
        }
        self.completed_tasks as f64 / total as f64
    }
}


/// Состояние пула: `Running` -> `Draining` -> `Terminated`, только вперед
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PoolState {
    Running,
    /// Новые задачи не принимаются, очередь дорабатывается
    Draining,
    Terminated,
}

impl PoolState {
    #[inline]
    pub fn is_running(self) -> bool {
        self == PoolState::Running
    }
}


/// Паника задачи, перехваченная воркером
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub worker: String,
    pub message: String,
}
