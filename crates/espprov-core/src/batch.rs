//! Batch provisioning worker pool
//!
//! Runs one independent job per serial port on a fixed-size pool of OS
//! threads. Workers share nothing but the work queue index and the result
//! channel; each job owns its own tool/client instances.

use crate::error::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

/// Default worker pool size
pub const DEFAULT_JOBS: usize = 4;

/// Outcome of one port's job
#[derive(Debug)]
pub struct PortResult<R> {
    /// The serial port the job ran against
    pub port: String,
    /// The job result
    pub result: Result<R>,
}

/// Aggregated batch results, in input port order
#[derive(Debug)]
pub struct BatchReport<R> {
    /// One entry per input port
    pub results: Vec<PortResult<R>>,
}

impl<R> BatchReport<R> {
    /// True when every port's job succeeded
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.result.is_ok())
    }

    /// Number of ports that succeeded
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.result.is_ok()).count()
    }

    /// The failing entries
    pub fn failures(&self) -> impl Iterator<Item = &PortResult<R>> {
        self.results.iter().filter(|r| r.result.is_err())
    }
}

/// Run `job` once per port on up to `jobs` worker threads.
///
/// Results are collected in input order. Workers pull ports from a shared
/// counter, so a slow device does not hold up the rest of the queue.
pub fn run_batch<R, F>(ports: &[String], jobs: usize, job: F) -> BatchReport<R>
where
    R: Send,
    F: Fn(&str) -> Result<R> + Sync,
{
    let workers = jobs.max(1).min(ports.len().max(1));
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();

    thread::scope(|s| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next = &next;
            let job = &job;
            s.spawn(move || loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                if index >= ports.len() {
                    break;
                }
                let port = &ports[index];
                log::debug!("worker starting port {}", port);
                let result = job(port);
                if tx.send((index, result)).is_err() {
                    break;
                }
            });
        }
        drop(tx);
    });

    let mut collected: Vec<(usize, Result<R>)> = rx.into_iter().collect();
    collected.sort_by_key(|(index, _)| *index);

    BatchReport {
        results: collected
            .into_iter()
            .map(|(index, result)| PortResult {
                port: ports[index].clone(),
                result,
            })
            .collect(),
    }
}
