#[derive(Debug, PartialEq, PartialOrd, Eq, Ord, Clone, thiserror::Error)]
pub enum SpawnError {
    #[error("pool is closed")]
    PoolClosed,
    #[error("task queue is full")]
    QueueFull,
    #[error("task panicked: {0}")]
    Panic(String),
    #[error("result channel closed before the task completed")]
    ChannelClosed,
    #[error("timed out waiting for the task")]
    Timeout,
    #[error("failed to spawn worker: {0}")]
    Spawn(String),
    #[error("config error: {0}")]
    Config(String),
}

impl SpawnError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        SpawnError::Config(msg.into())
    }

    /// Builds a `Panic` error from the payload returned by `catch_unwind`.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        SpawnError::Panic(panic_message(payload.as_ref()))
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
