//! Job registry and execution contexts.
//!
//! Two contexts: the master thread, a single serializer task where at most
//! one job body runs at a time in registration order, and the default pool,
//! where each job loops independently. A failing run is recorded and never
//! cancels future scheduling of that job or any other.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{JobOutcome, JobSchedule, MaintenanceJob};
use crate::{
    executor::{BucketExecutor, Executor},
    observability::{log_info, log_warn},
    subdb::MaintenanceSubDb,
};

struct Scheduled {
    job: Box<dyn MaintenanceJob>,
    schedule: JobSchedule,
}

impl Scheduled {
    fn new(job: Box<dyn MaintenanceJob>, now: Instant) -> Self {
        let schedule = JobSchedule::new(job.interval(), now);
        Self { job, schedule }
    }
}

/// Owns the registered maintenance jobs and ticks them on their contexts.
pub struct MaintenanceController {
    ready: MaintenanceSubDb,
    not_ready: MaintenanceSubDb,
    removed: MaintenanceSubDb,
    bucket_executor: BucketExecutor,
    master_jobs: Vec<Box<dyn MaintenanceJob>>,
    pool_jobs: Vec<Box<dyn MaintenanceJob>>,
    master_job_names: Vec<String>,
    pool_job_names: Vec<String>,
    run_failures: Arc<AtomicU64>,
    shutdown: CancellationToken,
    started: bool,
}

impl MaintenanceController {
    /// Create a controller over the three sub-databases and the shared
    /// bucket executor.
    pub fn new(
        ready: MaintenanceSubDb,
        not_ready: MaintenanceSubDb,
        removed: MaintenanceSubDb,
        bucket_executor: BucketExecutor,
    ) -> Self {
        Self {
            ready,
            not_ready,
            removed,
            bucket_executor,
            master_jobs: Vec::new(),
            pool_jobs: Vec::new(),
            master_job_names: Vec::new(),
            pool_job_names: Vec::new(),
            run_failures: Arc::new(AtomicU64::new(0)),
            shutdown: CancellationToken::new(),
            started: false,
        }
    }

    /// The ready sub-database.
    pub fn ready_sub_db(&self) -> &MaintenanceSubDb {
        &self.ready
    }

    /// The not-ready sub-database.
    pub fn not_ready_sub_db(&self) -> &MaintenanceSubDb {
        &self.not_ready
    }

    /// The removed sub-database.
    pub fn removed_sub_db(&self) -> &MaintenanceSubDb {
        &self.removed
    }

    /// The shared per-bucket executor handed to parallel job strategies.
    pub fn bucket_executor(&self) -> &BucketExecutor {
        &self.bucket_executor
    }

    /// Register a job on the master serializer. Must happen before `start`.
    pub fn register_job_in_master_thread(&mut self, job: Box<dyn MaintenanceJob>) {
        if self.started {
            log_warn!(
                component = "maintenance",
                event = "register_after_start",
                job = job.name(),
            );
            return;
        }
        self.master_job_names.push(job.name().to_owned());
        self.master_jobs.push(job);
    }

    /// Register a job on the default pool. Must happen before `start`.
    pub fn register_job_in_default_pool(&mut self, job: Box<dyn MaintenanceJob>) {
        if self.started {
            log_warn!(
                component = "maintenance",
                event = "register_after_start",
                job = job.name(),
            );
            return;
        }
        self.pool_job_names.push(job.name().to_owned());
        self.pool_jobs.push(job);
    }

    /// Names of jobs registered on the master thread, in order.
    pub fn master_job_names(&self) -> &[String] {
        &self.master_job_names
    }

    /// Names of jobs registered on the default pool, in order.
    pub fn pool_job_names(&self) -> &[String] {
        &self.pool_job_names
    }

    /// Failed runs across all jobs since start.
    pub fn run_failures(&self) -> u64 {
        self.run_failures.load(Ordering::Relaxed)
    }

    /// Spawn the scheduling loops. Registration is closed afterwards.
    pub fn start(&mut self, executor: &dyn Executor) {
        self.started = true;
        let now = Instant::now();

        let master: Vec<Scheduled> = self
            .master_jobs
            .drain(..)
            .map(|job| Scheduled::new(job, now))
            .collect();
        if !master.is_empty() {
            let shutdown = self.shutdown.clone();
            let failures = Arc::clone(&self.run_failures);
            executor.spawn(Box::pin(run_loop(master, shutdown, failures)));
        }

        for job in self.pool_jobs.drain(..) {
            let shutdown = self.shutdown.clone();
            let failures = Arc::clone(&self.run_failures);
            executor.spawn(Box::pin(run_loop(
                vec![Scheduled::new(job, now)],
                shutdown,
                failures,
            )));
        }
        log_info!(
            component = "maintenance",
            event = "controller_started",
            master_jobs = self.master_job_names.len(),
            pool_jobs = self.pool_job_names.len(),
        );
    }

    /// Stop ticking; loops exit at their next tick boundary.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for MaintenanceController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Tick a set of jobs sequentially until shutdown or all jobs finish.
///
/// With one element this is a pool loop; with many it is the master
/// serializer, preserving relative registration order among due jobs.
async fn run_loop(mut jobs: Vec<Scheduled>, shutdown: CancellationToken, failures: Arc<AtomicU64>) {
    while !jobs.is_empty() {
        let next_due = jobs
            .iter()
            .map(|entry| entry.schedule.next_due())
            .min()
            .expect("non-empty job set has a next due instant");
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep_until(next_due) => {}
        }

        let now = Instant::now();
        let mut index = 0;
        while index < jobs.len() {
            if !jobs[index].schedule.is_due(now) {
                index += 1;
                continue;
            }
            let outcome = jobs[index].job.run();
            jobs[index].schedule.mark_run(Instant::now());
            match outcome {
                Ok(JobOutcome::Finished) => {
                    log_info!(
                        component = "maintenance",
                        event = "job_finished",
                        job = jobs[index].job.name(),
                    );
                    jobs.remove(index);
                    continue;
                }
                Ok(_) => {}
                Err(err) => {
                    failures.fetch_add(1, Ordering::Relaxed);
                    log_warn!(
                        component = "maintenance",
                        event = "job_run_failed",
                        job = jobs[index].job.name(),
                        error = %err,
                    );
                }
            }
            index += 1;
        }
    }
}
