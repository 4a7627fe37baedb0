use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A unit of asynchronous work executed by the [`JobLane`](crate::lane::JobLane).
pub struct Job {
    pub label: &'static str,
    run: BoxFuture<'static, ()>,
}

impl Job {
    pub fn new<F>(label: &'static str, run: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            label,
            run: Box::pin(run),
        }
    }

    pub fn into_future(self) -> BoxFuture<'static, ()> {
        self.run
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job").field("label", &self.label).finish()
    }
}

/// The job was dropped before it produced a result (lane cleared or shut down).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct JobCanceled {
    pub label: &'static str,
}

impl std::fmt::Display for JobCanceled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job '{}' was canceled before completing", self.label)
    }
}

impl std::error::Error for JobCanceled {}

/// Completion handle for a submitted job.
///
/// Awaiting is optional; dropping the ticket does not cancel the job.
#[derive(Debug)]
pub struct JobTicket<T> {
    label: &'static str,
    rx: oneshot::Receiver<T>,
}

impl<T> JobTicket<T> {
    pub(crate) fn new(label: &'static str, rx: oneshot::Receiver<T>) -> Self {
        Self { label, rx }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl<T> Future for JobTicket<T> {
    type Output = Result<T, JobCanceled>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let label = this.label;
        Pin::new(&mut this.rx)
            .poll(cx)
            .map(|res| res.map_err(|_| JobCanceled { label }))
    }
}
