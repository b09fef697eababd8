//! Remote task poller
//!
//! Repeatedly queries an asynchronous remote resource until it reaches a
//! terminal state or the attempt budget runs out. The budget is supplied
//! per call through [`PollOptions`].

use crate::clients::CnapiClient;
use crate::error::{ClientError, UpgradeError};
use crate::types::{Server, Task, TaskHandle, TaskStatus};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Poll interval and attempt budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollOptions {
    /// Time between attempts, `interval_ms` in config files
    #[serde(rename = "interval_ms", with = "duration_ms")]
    pub interval: Duration,
    /// Attempts before giving up
    pub max_attempts: u32,
}

impl PollOptions {
    /// Create poll options
    #[inline]
    #[must_use]
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Interval between attempts
    #[inline]
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Total wait budget
    #[inline]
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 60,
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Classification of one polled record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// Not terminal yet
    Pending,
    /// Terminal success
    Succeeded,
    /// Terminal failure with optional remote detail
    Failed(Option<String>),
}

/// Poll `query` until `classify` reports a terminal state.
///
/// Query errors are wrapped as collaborator errors for `client`. Running
/// out of attempts yields an update error naming the budget and the
/// elapsed time.
pub async fn poll_until<I, R, Q, Fut, C>(
    client: &str,
    what: &str,
    id: &I,
    opts: &PollOptions,
    mut query: Q,
    mut classify: C,
) -> Result<R, UpgradeError>
where
    I: Display + ?Sized,
    Q: FnMut() -> Fut,
    Fut: Future<Output = Result<R, ClientError>>,
    C: FnMut(&R) -> PollState,
{
    let start = Instant::now();

    for attempt in 1..=opts.max_attempts {
        let record = query()
            .await
            .map_err(|e| UpgradeError::sdc_client(client, e))?;

        match classify(&record) {
            PollState::Succeeded => {
                tracing::debug!(%id, attempt, "{what} reached terminal success");
                return Ok(record);
            }
            PollState::Failed(detail) => {
                let message = match detail {
                    Some(detail) => format!("{what} {id} failed: {detail}"),
                    None => format!("{what} {id} failed (no error details reported)"),
                };
                return Err(UpgradeError::update(message));
            }
            PollState::Pending => {
                tracing::trace!(%id, attempt, "{what} still pending");
            }
        }

        tokio::time::sleep(opts.interval()).await;
    }

    Err(UpgradeError::update(format!(
        "timed out after {} waiting for {what} {id} (elapsed: {}s, {} attempts)",
        human_duration(opts.budget()),
        start.elapsed().as_secs(),
        opts.max_attempts
    )))
}

/// Wait for a CNAPI task to complete or fail
pub async fn wait_for_task(
    cnapi: &dyn CnapiClient,
    task: &TaskHandle,
    opts: &PollOptions,
) -> Result<Task, UpgradeError> {
    poll_until(
        "cnapi",
        "task",
        task,
        opts,
        move || cnapi.get_task(task),
        |record: &Task| match &record.status {
            TaskStatus::Complete => PollState::Succeeded,
            TaskStatus::Failure => PollState::Failed(record.error_message()),
            TaskStatus::Pending => PollState::Pending,
            TaskStatus::Unknown(status) => {
                tracing::warn!(task = %record.id, %status, "unrecognised task status, retrying");
                PollState::Pending
            }
        },
    )
    .await
}

/// Wait until a server reports `agent` installed from `image_uuid`
pub async fn wait_for_agent_image(
    cnapi: &dyn CnapiClient,
    server: &str,
    agent: &str,
    image_uuid: &str,
    opts: &PollOptions,
) -> Result<Server, UpgradeError> {
    let what = format!("{agent} image {image_uuid} on server");
    poll_until(
        "cnapi",
        &what,
        server,
        opts,
        move || cnapi.get_server(server),
        |record: &Server| {
            let installed = record.agent(agent).and_then(|a| a.image_uuid.as_deref());
            if installed == Some(image_uuid) {
                PollState::Succeeded
            } else {
                PollState::Pending
            }
        },
    )
    .await
}

fn human_duration(d: Duration) -> String {
    if d.subsec_millis() != 0 || d.as_secs() == 0 {
        return format!("{}ms", d.as_millis());
    }
    match d.as_secs() {
        60 => "1 minute".to_string(),
        s if s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "1 second".to_string(),
        s => format!("{s} seconds"),
    }
}
