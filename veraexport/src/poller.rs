//! Drive one window's report through create, poll and fetch
//!
//! The report is requested, then its status is polled at a fixed interval up to
//! `max_polls` times. Each poll is preceded by a sleep of `poll_interval`, so a
//! window that never completes costs `max_polls * poll_interval` of waiting and
//! exactly `max_polls` status calls.
use crate::aggregate::{FailureKind, WindowError, WindowResult};
use crate::job::{JobStatus, ReportJob, ReportJobClient};
use crate::window::Window;
use log::{debug, info, warn};
use std::fmt;
use std::time::Duration;

/// Default delay before each status poll
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of status polls per window
pub const DEFAULT_MAX_POLLS: u32 = 40;

/// What to do when the API reports a job as FAILED
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailedStatusPolicy {
    /// Fail the window immediately
    #[default]
    Terminal,
    /// Keep polling; the window times out if the status never recovers
    KeepPolling,
}

/// Polling parameters for one window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub failed_status: FailedStatusPolicy,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
            failed_status: FailedStatusPolicy::default(),
        }
    }
}

/// Lifecycle of one window's report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Submitting,
    Polling {
        job_id: String,
        attempt: u32,
        status: JobStatus,
    },
    Fetching {
        job_id: String,
    },
    Completed {
        job_id: String,
        entries: usize,
    },
    Failed {
        reason: String,
    },
    TimedOut {
        job_id: String,
        polls: u32,
    },
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitting => write!(f, "SUBMITTING"),
            Self::Polling {
                job_id,
                attempt,
                status,
            } => write!(f, "POLLING (report {job_id}, poll {attempt}, status {status})"),
            Self::Fetching { job_id } => write!(f, "FETCHING (report {job_id})"),
            Self::Completed { job_id, entries } => {
                write!(f, "COMPLETED (report {job_id}, {entries} entries)")
            }
            Self::Failed { reason } => write!(f, "FAILED ({reason})"),
            Self::TimedOut { job_id, polls } => {
                write!(f, "TIMED_OUT (report {job_id} after {polls} polls)")
            }
        }
    }
}

/// Runs the create, poll, fetch lifecycle for single windows
#[derive(Debug, Clone)]
pub struct ReportPoller {
    settings: PollSettings,
}

impl ReportPoller {
    #[must_use]
    pub fn new(settings: PollSettings) -> Self {
        Self { settings }
    }

    /// Export one window
    ///
    /// # Errors
    ///
    /// Returns a `FAILED` marker when a request fails or the report fails, and a
    /// `TIMED_OUT` marker when the report is not completed after `max_polls` polls.
    pub async fn run<C>(
        &self,
        window: &Window,
        client: &C,
    ) -> std::result::Result<WindowResult, WindowError>
    where
        C: ReportJobClient + ?Sized,
    {
        let mut run = WindowRun::new(*window);
        run.transition(PollState::Submitting);

        let mut job = match client.create(window).await {
            Ok(job) => job,
            Err(e) => return Err(run.fail(None, format!("report request failed: {e}"))),
        };

        let mut polls: u32 = 0;
        while polls < self.settings.max_polls {
            tokio::time::sleep(self.settings.poll_interval).await;
            polls = polls.saturating_add(1);
            run.polls = polls;

            let status = match client.poll_status(&job).await {
                Ok(status) => status,
                Err(e) => {
                    return Err(run.fail(
                        Some(&job),
                        format!("status request failed on poll {polls}: {e}"),
                    ));
                }
            };
            job.status = status;
            run.transition(PollState::Polling {
                job_id: job.job_id.clone(),
                attempt: polls,
                status,
            });

            match status {
                JobStatus::Completed => return self.fetch(run, &job, client).await,
                JobStatus::Failed => match self.settings.failed_status {
                    FailedStatusPolicy::Terminal => {
                        return Err(run.fail(
                            Some(&job),
                            format!("report {} reported status FAILED", job.job_id),
                        ));
                    }
                    FailedStatusPolicy::KeepPolling => {
                        warn!(
                            "Report {} reported FAILED on poll {}, continuing to poll",
                            job.job_id, polls
                        );
                    }
                },
                JobStatus::Pending | JobStatus::Processing => {}
            }
        }

        run.transition(PollState::TimedOut {
            job_id: job.job_id.clone(),
            polls,
        });
        Err(WindowError {
            window: *window,
            failure: FailureKind::TimedOut,
            message: format!(
                "report {} did not reach COMPLETED after {} polls ({}s apart)",
                job.job_id,
                polls,
                self.settings.poll_interval.as_secs_f64()
            ),
            job_id: Some(job.job_id),
            polls,
        })
    }

    async fn fetch<C>(
        &self,
        mut run: WindowRun,
        job: &ReportJob,
        client: &C,
    ) -> std::result::Result<WindowResult, WindowError>
    where
        C: ReportJobClient + ?Sized,
    {
        run.transition(PollState::Fetching {
            job_id: job.job_id.clone(),
        });

        match client.fetch(job).await {
            Ok(payload) => {
                run.transition(PollState::Completed {
                    job_id: job.job_id.clone(),
                    entries: payload.audit_logs.len(),
                });
                Ok(WindowResult {
                    window: job.window,
                    metadata: payload.metadata,
                    audit_logs: payload.audit_logs,
                })
            }
            Err(e) => Err(run.fail(Some(job), format!("report fetch failed: {e}"))),
        }
    }
}

/// Bookkeeping for one `run` call
struct WindowRun {
    window: Window,
    state: Option<PollState>,
    polls: u32,
}

impl WindowRun {
    fn new(window: Window) -> Self {
        Self {
            window,
            state: None,
            polls: 0,
        }
    }

    fn transition(&mut self, next: PollState) {
        // Repeated polls with an unchanged status only show at debug level
        match (&self.state, &next) {
            (
                Some(PollState::Polling {
                    status: previous, ..
                }),
                PollState::Polling { status, .. },
            ) if previous == status => debug!("Window {}: {}", self.window, next),
            _ => info!("Window {}: {}", self.window, next),
        }
        self.state = Some(next);
    }

    fn fail(&mut self, job: Option<&ReportJob>, message: String) -> WindowError {
        self.transition(PollState::Failed {
            reason: message.clone(),
        });
        WindowError {
            window: self.window,
            failure: FailureKind::Failed,
            message,
            job_id: job.map(|j| j.job_id.clone()),
            polls: self.polls,
        }
    }
}
