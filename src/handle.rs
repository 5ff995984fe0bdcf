use super::{
    errors::SpawnError,
    result::SpawnResult,
};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll}
};
use futures::FutureExt;
use tokio::{
    sync::oneshot,
    time::Duration,
};


/// Задача в очереди: вызываемый объект вместе со своим аргументом
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Упаковывает пару (функция, аргумент) в задачу, владеющую обоими
#[inline]
pub(crate) fn make_task<F, A, R>(func: F, arg: A) -> Task
where
    F: FnOnce(A) -> R + Send + 'static,
    A: Send + 'static,
{
    Box::new(move || {
        let _ = func(arg);
    })
}


/// Handle на результат задачи.
/// Сама задача не отменяется, если handle дропнут.
pub struct JoinHandle<T> {
    receiver: oneshot::Receiver<SpawnResult<T>>,
}

impl<T> JoinHandle<T> {

    pub(crate) fn new(receiver: oneshot::Receiver<SpawnResult<T>>) -> Self {
        Self { receiver }
    }

    /// Блокирует текущий поток до завершения задачи.
    /// Нельзя вызывать внутри async-контекста, там нужен `.await`.
    pub fn join(self) -> SpawnResult<T> {
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(SpawnError::ChannelClosed))
    }

    /// Неблокирующая проверка: `None`, если задача еще не завершилась
    pub fn try_join(&mut self) -> Option<SpawnResult<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(SpawnError::ChannelClosed)),
        }
    }

    pub async fn await_timeout(self, timeout: Duration) -> SpawnResult<T> {
        match tokio::time::timeout(timeout, self.receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SpawnError::ChannelClosed),
            Err(_) => Err(SpawnError::Timeout),
        }
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = SpawnResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match this.receiver.poll_unpin(cx) {
            Poll::Ready(res) => Poll::Ready(res.unwrap_or(Err(SpawnError::ChannelClosed))),
            Poll::Pending => Poll::Pending,
        }
    }
}
