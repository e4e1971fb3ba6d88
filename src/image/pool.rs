// Copyright (c) 2022-2026 vtscreen contributors. Licensed under Apache License, Version 2.0.

//! Fixed-size worker pool dispatching image-run encode jobs (§2 "Worker
//! pool", §4.7, §5).
//!
//! Grounded in `crossbeam-channel`'s MPMC queues, the way
//! `freddiehaddad-oxidized` wires its background worker threads: a job
//! channel fanned out to N workers, and a oneshot reply channel per job so
//! the caller can block on exactly the replies it submitted, in submission
//! order (§5 "Ordering guarantees").

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::EncodeError;

pub type Job = Box<dyn FnOnce() -> Result<String, EncodeError> + Send + 'static>;

enum Task {
    Encode { job: Job, reply: Sender<Result<String, EncodeError>> },
    Shutdown,
}

/// A bounded, non-reentrant pool of image-encode workers (§5 "The image
/// pool is bounded and non-reentrant").
pub struct ImagePool {
    job_tx: Sender<Task>,
    workers: Vec<JoinHandle<()>>,
}

impl ImagePool {
    /// Spawns `worker_count` worker threads (default 2, §6
    /// `imageThreadCount`).
    #[must_use]
    pub fn new(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (job_tx, job_rx) = bounded::<Task>(worker_count * 4);

        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let job_rx: Receiver<Task> = job_rx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("vtscreen-image-worker-{id}"))
                .spawn(move || worker_loop(job_rx))
                .expect("failed to spawn image worker thread");
            workers.push(handle);
        }

        Self { job_tx, workers }
    }

    /// Submits `jobs` (one per image run, in row order) and blocks until
    /// every result is back, returning them in the same order they were
    /// submitted regardless of completion order (§5 "image task results
    /// are concatenated in the order of submission").
    pub fn run_all(&self, jobs: Vec<Job>) -> Vec<Result<String, EncodeError>> {
        let mut replies = Vec::with_capacity(jobs.len());
        for job in jobs {
            let (reply_tx, reply_rx) = bounded(1);
            self.job_tx
                .send(Task::Encode { job, reply: reply_tx })
                .expect("image worker pool is shut down");
            replies.push(reply_rx);
        }
        replies
            .into_iter()
            .map(|rx| rx.recv().unwrap_or(Err(EncodeError::WorkerPanic)))
            .collect()
    }
}

impl Drop for ImagePool {
    fn drop(&mut self) {
        for _ in &self.workers {
            let _ = self.job_tx.send(Task::Shutdown);
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(job_rx: Receiver<Task>) {
    while let Ok(task) = job_rx.recv() {
        match task {
            Task::Shutdown => break,
            Task::Encode { job, reply } => {
                // A panicking encoder must never take down the reader or
                // application thread (§4.7).
                let result = catch_unwind(AssertUnwindSafe(job)).unwrap_or(Err(EncodeError::WorkerPanic));
                let _ = reply.send(result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_come_back_in_submission_order() {
        let pool = ImagePool::new(2);
        let jobs: Vec<Job> = (0..8)
            .map(|i| -> Job {
                Box::new(move || {
                    std::thread::sleep(std::time::Duration::from_millis(if i % 2 == 0 { 5 } else { 0 }));
                    Ok(format!("run-{i}"))
                })
            })
            .collect();
        let results = pool.run_all(jobs);
        let expected: Vec<_> = (0..8).map(|i| Ok(format!("run-{i}"))).collect();
        assert_eq!(results, expected);
    }

    #[test]
    fn a_panicking_job_becomes_an_error_not_a_crash() {
        let pool = ImagePool::new(2);
        let jobs: Vec<Job> = vec![
            Box::new(|| -> Result<String, EncodeError> { panic!("boom") }),
            Box::new(|| Ok("fine".to_string())),
        ];
        let results = pool.run_all(jobs);
        assert!(matches!(results[0], Err(EncodeError::WorkerPanic)));
        assert_eq!(results[1], Ok("fine".to_string()));
    }
}
