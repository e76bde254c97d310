use crate::job::JobSpec;
use serde::Deserialize;
use serde_json::Value;
use std::{thread, time::Duration};
use thiserror::Error;
use tracing::{debug, info};

// how long to sit idle between event polls when the feed is empty
const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Request to scheduler failed")]
    Http(#[from] reqwest::Error),
    #[error("Scheduler rejected the job ({status}): {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// a submitted job, identified by the id the scheduler handed back
#[derive(Debug, Clone, Deserialize)]
pub struct JobHandle {
    pub id: String,
}

/// lifecycle events the scheduler reports for a job
///
/// Everything past submission happens inside the platform; this client
/// only observes and prints.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum JobEvent {
    ReadyStateChange { state: String },
    Accepted,
    Result { slice: u64, value: Value },
    Error { detail: Value },
    NoFunds { detail: Value },
    Complete,
}

#[derive(Debug, Deserialize)]
struct EventBatch {
    events: Vec<JobEvent>,
    // opaque resume position for the next poll
    cursor: u64,
}

/// thin blocking client for the platform scheduler
///
/// Deliberately carries no retry or backoff: job recovery is the
/// platform's responsibility, a failed submission should surface
/// immediately.
pub struct PlatformClient {
    http: reqwest::blocking::Client,
    scheduler_url: String,
}

impl PlatformClient {
    pub fn new(scheduler_url: &str) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            scheduler_url: scheduler_url.trim_end_matches('/').to_owned(),
        }
    }

    /// hand the job description to the scheduler
    pub fn submit(&self, spec: &JobSpec) -> Result<JobHandle, PlatformError> {
        info!(scheduler = %self.scheduler_url, "Submitting job");

        let response = self
            .http
            .post(format!("{}/jobs", self.scheduler_url))
            .json(spec)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlatformError::Rejected {
                status,
                body: response.text().unwrap_or_default(),
            });
        }

        let handle: JobHandle = response.json()?;
        debug!(job_id = %handle.id, "Scheduler assigned job id");

        Ok(handle)
    }

    fn poll_events(&self, job: &JobHandle, after: u64) -> Result<EventBatch, PlatformError> {
        let batch = self
            .http
            .get(format!("{}/jobs/{}/events", self.scheduler_url, job.id))
            .query(&[("after", after)])
            .send()?
            .error_for_status()?
            .json()?;

        Ok(batch)
    }

    /// drive the event feed until the job completes, handing every event
    /// to `on_event` in order
    pub fn wait(
        &self,
        job: &JobHandle,
        mut on_event: impl FnMut(&JobEvent),
    ) -> Result<(), PlatformError> {
        let mut cursor = 0;

        loop {
            let batch = self.poll_events(job, cursor)?;
            cursor = batch.cursor;

            for event in &batch.events {
                on_event(event);

                if matches!(event, JobEvent::Complete) {
                    return Ok(());
                }
            }

            if batch.events.is_empty() {
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}
