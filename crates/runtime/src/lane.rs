use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::job::{Job, JobTicket};
use crate::work_queue::{WorkId, WorkQueue};

#[derive(Debug, Default)]
struct LaneState {
    queue: WorkQueue<Job>,
    running: Option<WorkId>,
}

#[derive(Debug, Default)]
struct LaneShared {
    state: Mutex<LaneState>,
    wake: Notify,
}

/// Single-lane FIFO job executor.
///
/// At most one job runs at a time; the next one starts only after the
/// previous job's future has fully resolved. The worker sleeps until a
/// submission wakes it, there is no polling.
///
/// Must be created inside a tokio runtime. Dropping the lane stops the worker;
/// a job that is already running is left to finish on its own task.
#[derive(Debug)]
pub struct JobLane {
    name: &'static str,
    shared: Arc<LaneShared>,
    worker: JoinHandle<()>,
}

impl JobLane {
    pub fn spawn(name: &'static str) -> Self {
        let shared = Arc::new(LaneShared::default());
        let worker = tokio::spawn(run_lane(name, Arc::clone(&shared)));
        Self {
            name,
            shared,
            worker,
        }
    }

    /// Appends a job and returns a ticket resolving to its output.
    pub fn submit<F, T>(&self, label: &'static str, work: F) -> JobTicket<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job = Job::new(label, async move {
            let out = work.await;
            // The caller may have dropped its ticket; the job still counts as done.
            let _ = tx.send(out);
        });

        let (id, queued) = {
            let mut state = self.shared.state.lock();
            let id = state.queue.push(job);
            (id, state.queue.len())
        };
        debug!(lane = self.name, job = label, id = id.0, queued, "job queued");
        self.shared.wake.notify_one();

        JobTicket::new(label, rx)
    }

    /// Queued plus running jobs.
    pub fn pending(&self) -> usize {
        let state = self.shared.state.lock();
        state.queue.len() + usize::from(state.running.is_some())
    }

    /// Drops every job that has not started yet. Their tickets resolve to
    /// [`JobCanceled`](crate::job::JobCanceled).
    pub fn clear(&self) -> usize {
        let dropped = self.shared.state.lock().queue.clear();
        if dropped > 0 {
            debug!(lane = self.name, dropped, "queued jobs cleared");
        }
        dropped
    }
}

impl Drop for JobLane {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn run_lane(name: &'static str, shared: Arc<LaneShared>) {
    loop {
        let next = {
            let mut state = shared.state.lock();
            let next = state.queue.pop_next();
            state.running = next.as_ref().map(|(id, _)| *id);
            next
        };

        let Some((id, job)) = next else {
            shared.wake.notified().await;
            continue;
        };

        let label = job.label;
        debug!(lane = name, job = label, id = id.0, "job started");
        // Each job runs on its own task so a panicking job cannot take the lane down.
        if let Err(err) = tokio::spawn(job.into_future()).await {
            warn!(lane = name, job = label, id = id.0, "job aborted: {err}");
        }

        shared.state.lock().running = None;
        debug!(lane = name, job = label, id = id.0, "job finished");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::JobLane;

    #[tokio::test(start_paused = true)]
    async fn runs_jobs_one_at_a_time_in_order() {
        let lane = JobLane::spawn("test");
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut tickets = Vec::new();
        for i in 0..5u64 {
            let active = Arc::clone(&active);
            let max_active = Arc::clone(&max_active);
            let order = Arc::clone(&order);
            tickets.push(lane.submit("step", async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                // Later jobs are shorter; FIFO must still hold.
                tokio::time::sleep(Duration::from_millis(50 - i * 10)).await;
                order.lock().push(i);
                active.fetch_sub(1, Ordering::SeqCst);
                i
            }));
        }
        assert_eq!(lane.pending(), 5);

        for (i, t) in tickets.into_iter().enumerate() {
            assert_eq!(t.await.unwrap(), i as u64);
        }
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(max_active.load(Ordering::SeqCst), 1);

        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        assert_eq!(lane.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_queued_but_not_running_job() {
        let lane = JobLane::spawn("test");
        let first = lane.submit("slow", async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            "done"
        });
        let second = lane.submit("queued", async { "never" });

        // Let the worker pick up the first job.
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        assert_eq!(lane.pending(), 2);
        assert_eq!(lane.clear(), 1);
        assert_eq!(lane.pending(), 1);

        let err = second.await.unwrap_err();
        assert_eq!(err.label, "queued");
        assert_eq!(first.await.unwrap(), "done");
    }

    #[tokio::test]
    async fn panicking_job_does_not_stop_the_lane() {
        let lane = JobLane::spawn("test");
        let bad = lane.submit("boom", async {
            let missing: Option<u32> = None;
            missing.expect("job failure")
        });
        let good = lane.submit("fine", async { 42 });

        assert!(bad.await.is_err());
        assert_eq!(good.await.unwrap(), 42);
    }
}
