//! Cron-expression job loop.
//!
//! Jobs are registered with a 6-field cron expression evaluated in Taipei
//! time. A fixed poll tick walks the window since the previous tick and
//! fires every job with an occurrence inside it, so a slow tick makes jobs
//! late, never lost. Each run is spawned on its own task; a panicking job
//! is logged and the loop keeps going.

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use chrono_tz::Tz;
use cron::Schedule;

use crate::clock::Clock;
use crate::error::ScheduleError;

const POLL_INTERVAL: Duration = Duration::from_secs(60);
/// Self-ping period; just under the free-tier idle cutoff.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(25 * 60);

type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type JobFn = Box<dyn Fn() -> JobFuture + Send + Sync>;

struct Job {
    name: &'static str,
    schedule: Schedule,
    task: JobFn,
}

impl Job {
    fn due_between(&self, after: DateTime<Tz>, until: DateTime<Tz>) -> bool {
        // `after` is exclusive, `until` inclusive.
        self.schedule.after(&after).take_while(|t| *t <= until).next().is_some()
    }
}

pub struct Scheduler {
    jobs: Vec<Job>,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { jobs: Vec::new(), clock }
    }

    /// Register a job under a 6-field cron expression (seconds first).
    pub fn add<F, Fut>(&mut self, name: &'static str, expr: &str, task: F) -> Result<(), ScheduleError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let schedule = Schedule::from_str(expr).map_err(|source| ScheduleError::InvalidCron {
            expr: expr.to_string(),
            source,
        })?;
        self.jobs.push(Job { name, schedule, task: Box::new(move || Box::pin(task())) });
        Ok(())
    }

    /// Run every job due in `(after, until]`. Returns how many fired.
    async fn fire_due(&self, after: DateTime<Tz>, until: DateTime<Tz>) -> usize {
        let mut fired = 0;
        for job in self.jobs.iter().filter(|j| j.due_between(after, until)) {
            tracing::info!(job = job.name, "running scheduled job");
            // A panic inside the job takes down its task, not the loop.
            if let Err(err) = tokio::spawn((job.task)()).await {
                tracing::error!(job = job.name, error = %err, "scheduled job panicked");
            }
            fired += 1;
        }
        fired
    }

    /// Poll forever. Never returns.
    pub async fn run(self) {
        tracing::info!(jobs = self.jobs.len(), "scheduler started");
        let mut last_tick = self.clock.now();
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;
            let now = self.clock.now();
            self.fire_due(last_tick, now).await;
            last_tick = now;
        }
    }
}

/// Periodically GET the deployment's own public URL so a free-tier host
/// does not idle the process out.
pub async fn keep_alive(public_url: String) {
    let client = reqwest::Client::new();
    loop {
        tokio::time::sleep(KEEP_ALIVE_INTERVAL).await;
        match client.get(&public_url).send().await {
            Ok(response) => {
                tracing::debug!(status = %response.status(), "keep-alive ping");
            }
            Err(err) => {
                tracing::warn!(error = %err, "keep-alive ping failed");
            }
        }
    }
}
