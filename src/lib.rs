//! Пул потоков фиксированного размера с общей FIFO-очередью задач
//! 
//! # Features
//! - Задача - пара (функция, аргумент), пул владеет ею до выполнения
//! - Воркеры выполняют задачи параллельно, вне блокировки очереди
//! - Graceful shutdown: очередь дорабатывается до выхода воркеров
//! - Паники задач перехватываются, логируются и публикуются в канал
//! - Опциональная ограниченная очередь с политикой Block/Reject
//! - `JoinHandle` для задач, результат которых нужен вызывающему
//! - Метрики пула

pub mod config;
pub mod errors;
pub mod handle;
pub mod model;
pub mod pool;
pub mod result;

pub use config::{Config, ConfigBuilder, OverflowPolicy};
pub use errors::SpawnError;
pub use handle::JoinHandle;
pub use model::{PoolMetrics, PoolState, TaskFailure};
pub use pool::TaskPool;
pub use result::SpawnResult;
