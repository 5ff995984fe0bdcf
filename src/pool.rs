use super::{
    config::{Config, OverflowPolicy},
    errors::{panic_message, SpawnError},
    result::SpawnResult,
    handle::{
        make_task,
        Task,
        JoinHandle,
    },
    model::{
        PoolMetrics,
        PoolState,
        TaskFailure,
    },
};
use std::{
    cell::Cell,
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
    },
    thread,
    time::Duration,
};
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use log::{debug, error, warn};
use tokio::sync::oneshot;


thread_local! {
    // Адрес PoolInner, которому принадлежит текущий поток-воркер (0 - не воркер)
    static CURRENT_POOL: Cell<usize> = const { Cell::new(0) };
}

struct Queue {
    tasks: VecDeque<Task>,
    state: PoolState,
    // Поток, который уже взялся за join воркеров
    joining: bool,
}

struct PoolInner {
    queue: Mutex<Queue>,
    available: Condvar,
    not_full: Condvar,
    terminated: Condvar,
    handles: Mutex<Vec<thread::JoinHandle<()>>>,
    failures_tx: Sender<TaskFailure>,
    failures_rx: Receiver<TaskFailure>,
    next_worker_id: AtomicUsize,
    live_workers: AtomicUsize,
    active_tasks: AtomicUsize,
    idle_workers: AtomicUsize,
    total_spawned: AtomicUsize,
    completed_tasks: AtomicUsize,
    failed_tasks: AtomicUsize,
    rejected_tasks: AtomicUsize,
    respawned_workers: AtomicUsize,
    config: Config,
}

/// Пул потоков фиксированного размера с общей FIFO-очередью.
///
/// Задачи выполняются вне блокировки, поэтому воркеры работают параллельно.
/// Порядок извлечения из очереди совпадает с порядком `submit`, порядок
/// завершения - нет. `shutdown` дорабатывает всю очередь перед выходом воркеров.
pub struct TaskPool {
    inner: Arc<PoolInner>,
}

impl TaskPool {
    /// `None` - по числу ядер. Ноль поднимается до одного воркера.
    pub fn new(worker_count: Option<usize>) -> SpawnResult<Self> {
        let config = Config {
            num_threads: worker_count.unwrap_or_else(num_cpus::get),
            ..Default::default()
        };
        Self::with_config(config)
    }

    pub fn with_config(mut config: Config) -> SpawnResult<Self> {
        config.validate()?;
        let num_threads = config.worker_threads();
        config.num_threads = num_threads;
        let (failures_tx, failures_rx) = channel::bounded(config.failure_capacity.max(1));

        let inner = Arc::new(PoolInner {
            queue: Mutex::new(Queue {
                tasks: VecDeque::new(),
                state: PoolState::Running,
                joining: false,
            }),
            available: Condvar::new(),
            not_full: Condvar::new(),
            terminated: Condvar::new(),
            handles: Mutex::new(Vec::with_capacity(num_threads)),
            failures_tx,
            failures_rx,
            next_worker_id: AtomicUsize::new(0),
            live_workers: AtomicUsize::new(0),
            active_tasks: AtomicUsize::new(0),
            idle_workers: AtomicUsize::new(0),
            total_spawned: AtomicUsize::new(0),
            completed_tasks: AtomicUsize::new(0),
            failed_tasks: AtomicUsize::new(0),
            rejected_tasks: AtomicUsize::new(0),
            respawned_workers: AtomicUsize::new(0),
            config,
        });

        // Запускаем воркеры
        for _ in 0..num_threads {
            match spawn_worker(&inner) {
                Ok(handle) => inner.lock_handles().push(handle),
                Err(e) => {
                    error!("failed to spawn worker: {}", e);
                    inner.shutdown();
                    return Err(SpawnError::Spawn(e.to_string()));
                }
            }
        }
        debug!(
            "task pool started: {} workers, queue capacity {:?}",
            num_threads, inner.config.max_pending
        );

        Ok(Self { inner })
    }

    /// Ставит `func(arg)` в конец очереди и будит один воркер.
    /// Результат `func` отбрасывается.
    ///
    /// При ограниченной очереди и `OverflowPolicy::Block` вызов ждет
    /// свободного места: из задачи этого же пула так делать не стоит.
    pub fn submit<F, A, R>(&self, func: F, arg: A) -> SpawnResult<()>
    where
        F: FnOnce(A) -> R + Send + 'static,
        A: Send + 'static,
    {
        self.inner.push_task(make_task(func, arg))
    }

    #[inline]
    pub fn execute<F>(&self, job: F) -> SpawnResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.push_task(Box::new(job))
    }

    /// Как `submit`, но результат (или паника) приходит через `JoinHandle`
    pub fn submit_with_handle<F, A, R>(&self, func: F, arg: A) -> SpawnResult<JoinHandle<R>>
    where
        F: FnOnce(A) -> R + Send + 'static,
        A: Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel::<SpawnResult<R>>();

        let task: Task = Box::new(move || {
            match panic::catch_unwind(AssertUnwindSafe(move || func(arg))) {
                Ok(value) => {
                    let _ = tx.send(Ok(value));
                }
                Err(payload) => {
                    let _ = tx.send(Err(SpawnError::Panic(panic_message(payload.as_ref()))));
                    // воркер сам учтет и залогирует панику
                    panic::resume_unwind(payload);
                }
            }
        });

        self.inner.push_task(task)?;
        Ok(JoinHandle::new(rx))
    }

    /// Закрывает пул, дожидается выполнения всей очереди и выхода воркеров.
    ///
    /// Повторный вызов (в том числе из другого потока) ждет того же
    /// завершения и не делает повторный join. Вызов из задачи этого пула
    /// только закрывает его, не дожидаясь воркеров.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    /// `shutdown` с ограничением времени ожидания.
    /// `false` - воркеры не успели завершиться, пул при этом уже закрыт.
    pub fn shutdown_timeout(&self, timeout: Duration) -> bool {
        if self.state() == PoolState::Terminated {
            return true;
        }
        let inner = self.inner.clone();
        let joiner = thread::Builder::new()
            .name(format!("{}-shutdown", self.inner.config.thread_name_prefix))
            .spawn(move || inner.shutdown());
        if let Err(e) = joiner {
            warn!("failed to spawn shutdown thread: {}", e);
            self.inner.request_shutdown();
        }

        let queue = self.inner.lock_queue();
        let (_queue, res) = self
            .inner
            .terminated
            .wait_timeout_while(queue, timeout, |q| q.state != PoolState::Terminated)
            .unwrap_or_else(PoisonError::into_inner);
        !res.timed_out()
    }

    pub fn state(&self) -> PoolState {
        self.inner.lock_queue().state
    }

    pub fn num_workers(&self) -> usize {
        self.inner.live_workers.load(Ordering::Acquire)
    }

    pub fn queued_tasks(&self) -> usize {
        self.inner.lock_queue().tasks.len()
    }

    /// Канал с перехваченными паниками задач.
    /// Ограничен `Config::failure_capacity`, лишние отчеты отбрасываются.
    pub fn failures(&self) -> Receiver<TaskFailure> {
        self.inner.failures_rx.clone()
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    #[inline]
    pub fn metrics(&self) -> PoolMetrics {
        let queued_tasks = self.queued_tasks();
        let inner = &self.inner;
        PoolMetrics {
            workers: inner.live_workers.load(Ordering::Relaxed),
            active_tasks: inner.active_tasks.load(Ordering::Relaxed),
            idle_workers: inner.idle_workers.load(Ordering::Relaxed),
            queued_tasks,
            total_spawned: inner.total_spawned.load(Ordering::Relaxed),
            completed_tasks: inner.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: inner.failed_tasks.load(Ordering::Relaxed),
            rejected_tasks: inner.rejected_tasks.load(Ordering::Relaxed),
            respawned_workers: inner.respawned_workers.load(Ordering::Relaxed),
        }
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}


impl PoolInner {
    // Задачи выполняются вне блокировки под catch_unwind, так что
    // отравленный мьютекс не означает испорченную очередь.
    #[inline]
    fn lock_queue(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn lock_handles(&self) -> MutexGuard<'_, Vec<thread::JoinHandle<()>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_own_worker(&self) -> bool {
        let me = self as *const PoolInner as usize;
        CURRENT_POOL.with(|c| c.get() == me)
    }

    fn push_task(&self, task: Task) -> SpawnResult<()> {
        {
            let mut queue = self.lock_queue();

            if let Some(cap) = self.config.max_pending {
                while queue.state.is_running() && queue.tasks.len() >= cap {
                    match self.config.overflow_policy {
                        OverflowPolicy::Reject => {
                            self.rejected_tasks.fetch_add(1, Ordering::Relaxed);
                            debug!("task rejected: queue is full ({} pending)", cap);
                            return Err(SpawnError::QueueFull);
                        }
                        OverflowPolicy::Block => {
                            queue = self
                                .not_full
                                .wait(queue)
                                .unwrap_or_else(PoisonError::into_inner);
                        }
                    }
                }
            }

            if !queue.state.is_running() {
                return Err(SpawnError::PoolClosed);
            }
            queue.tasks.push_back(task);
            self.total_spawned.fetch_add(1, Ordering::Relaxed);
        }

        self.available.notify_one();
        Ok(())
    }

    fn worker_loop(&self, name: &str) {
        debug!("worker {} started", name);

        loop {
            let task = {
                let mut queue = self.lock_queue();
                self.idle_workers.fetch_add(1, Ordering::Relaxed);
                while queue.tasks.is_empty() && queue.state.is_running() {
                    queue = self
                        .available
                        .wait(queue)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                self.idle_workers.fetch_sub(1, Ordering::Relaxed);

                match queue.tasks.pop_front() {
                    Some(task) => task,
                    // очередь пуста, а пул закрывается
                    None => break,
                }
            };

            if self.config.max_pending.is_some() {
                self.not_full.notify_one();
            }

            self.active_tasks.fetch_add(1, Ordering::Relaxed);
            self.run_task(task, name);
            self.active_tasks.fetch_sub(1, Ordering::Relaxed);

            self.available.notify_one();
        }

        debug!("worker {} exits", name);
    }

    fn run_task(&self, task: Task, worker: &str) {
        match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(()) => {
                self.completed_tasks.fetch_add(1, Ordering::Relaxed);
            }
            Err(payload) => {
                self.failed_tasks.fetch_add(1, Ordering::Relaxed);
                let message = panic_message(payload.as_ref());
                error!("task panicked on worker {}: {}", worker, message);
                self.report_failure(TaskFailure {
                    worker: worker.to_string(),
                    message,
                });
            }
        }
    }

    fn report_failure(&self, failure: TaskFailure) {
        if self.config.failure_capacity == 0 {
            return;
        }
        match self.failures_tx.try_send(failure) {
            Ok(()) => {}
            Err(TrySendError::Full(f)) => {
                warn!("failure channel is full, dropping report from worker {}", f.worker);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Переводит пул в `Draining`. `true`, если перевел именно этот вызов.
    fn request_shutdown(&self) -> bool {
        let mut queue = self.lock_queue();
        if !queue.state.is_running() {
            return false;
        }
        queue.state = PoolState::Draining;
        debug!("task pool draining, {} tasks left in queue", queue.tasks.len());
        drop(queue);

        self.available.notify_all();
        self.not_full.notify_all();
        true
    }

    fn shutdown(&self) {
        self.request_shutdown();

        if self.is_own_worker() {
            debug!("shutdown requested from a worker thread, not waiting for workers");
            return;
        }

        {
            let mut queue = self.lock_queue();
            if queue.joining {
                while queue.state != PoolState::Terminated {
                    queue = self
                        .terminated
                        .wait(queue)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                return;
            }
            queue.joining = true;
        }

        self.join_workers();

        let mut queue = self.lock_queue();
        queue.state = PoolState::Terminated;
        drop(queue);
        self.terminated.notify_all();
        debug!("task pool terminated");
    }

    // Замены упавших воркеров добавляются в handles до выхода упавшего,
    // поэтому повторяем, пока список не опустеет.
    fn join_workers(&self) {
        loop {
            let handles = std::mem::take(&mut *self.lock_handles());
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                let name = handle.thread().name().unwrap_or("<unnamed>").to_string();
                if handle.join().is_err() {
                    warn!("worker {} terminated by panic", name);
                }
            }
        }
    }
}


fn spawn_worker(inner: &Arc<PoolInner>) -> std::io::Result<thread::JoinHandle<()>> {
    let id = inner.next_worker_id.fetch_add(1, Ordering::Relaxed);
    let name = format!("{}-{}", inner.config.thread_name_prefix, id);

    let mut builder = thread::Builder::new().name(name.clone());
    if let Some(stack_size) = inner.config.stack_size {
        builder = builder.stack_size(stack_size);
    }

    inner.live_workers.fetch_add(1, Ordering::AcqRel);
    let pool = inner.clone();
    let spawned = builder.spawn(move || {
        CURRENT_POOL.with(|c| c.set(Arc::as_ptr(&pool) as usize));
        let _sentinel = Sentinel { pool: &pool, name: &name };
        pool.worker_loop(&name);
    });

    if spawned.is_err() {
        inner.live_workers.fetch_sub(1, Ordering::AcqRel);
    }
    spawned
}


/// Следит за аварийным выходом воркера и запускает замену.
///
/// Паники задач ловит `run_task`, но раскрутка все равно может пройти мимо:
/// например, если `Drop` payload'а перехваченной паники сам паникует.
struct Sentinel<'a> {
    pool: &'a Arc<PoolInner>,
    name: &'a str,
}

impl Drop for Sentinel<'_> {
    fn drop(&mut self) {
        self.pool.live_workers.fetch_sub(1, Ordering::AcqRel);
        if !thread::panicking() {
            return;
        }

        error!("worker {} died unexpectedly", self.name);
        let needed = {
            let queue = self.pool.lock_queue();
            queue.state.is_running() || !queue.tasks.is_empty()
        };
        if !needed {
            return;
        }

        match spawn_worker(self.pool) {
            Ok(handle) => {
                self.pool.respawned_workers.fetch_add(1, Ordering::Relaxed);
                self.pool.lock_handles().push(handle);
                warn!("worker {} replaced", self.name);
            }
            Err(e) => {
                error!(
                    "failed to replace worker {}: {}, pool continues with {} workers",
                    self.name,
                    e,
                    self.pool.live_workers.load(Ordering::Acquire)
                );
            }
        }
    }
}
