//! Bounded worker pool with a fan-in completion channel.
//!
//! Jobs are queued on a crossbeam channel and pulled by scoped worker
//! threads. The calling thread drains completions in whatever order they
//! finish and is the only place `on_complete` runs, so it may hold `&mut`
//! state such as the content store.

use std::thread;

use crossbeam_channel::unbounded;

use crate::{OffTopicError, Result};

/// Runs `work` over `jobs` on at most `workers` threads.
///
/// When `on_complete` fails the completion receiver is dropped; workers stop
/// after their next send fails and the error is returned once they have
/// joined.
pub(crate) fn run_pool<J, R, F, H>(
    label: &str,
    jobs: Vec<J>,
    workers: usize,
    work: F,
    mut on_complete: H,
) -> Result<usize>
where
    J: Send,
    R: Send,
    F: Fn(J) -> R + Sync,
    H: FnMut(R) -> Result<()>,
{
    if jobs.is_empty() {
        return Ok(0);
    }
    let workers = workers.clamp(1, jobs.len());
    let total = jobs.len();

    let (job_tx, job_rx) = unbounded::<J>();
    for job in jobs {
        job_tx.send(job).map_err(|_| OffTopicError::WorkerPool {
            reason: format!("{label} job queue closed before dispatch"),
        })?;
    }
    drop(job_tx);

    tracing::debug!(pool = %label, jobs = total, workers, "worker pool starting");

    thread::scope(|scope| {
        let (done_tx, done_rx) = unbounded::<R>();
        for index in 0..workers {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            let work = &work;
            thread::Builder::new()
                .name(format!("{label}-{index}"))
                .spawn_scoped(scope, move || {
                    for job in &job_rx {
                        if done_tx.send(work(job)).is_err() {
                            break;
                        }
                    }
                })
                .map_err(|err| OffTopicError::WorkerPool {
                    reason: format!("failed to spawn {label} worker: {err}"),
                })?;
        }
        drop(done_tx);

        let mut completed = 0usize;
        for outcome in &done_rx {
            on_complete(outcome)?;
            completed += 1;
        }
        tracing::debug!(pool = %label, completed, "worker pool drained");
        Ok(completed)
    })
}
