use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JobConfig;

/// Reason recorded when the validator rejects a payload.
pub const VALIDATION_FAILED_REASON: &str = "validation failed";
/// Reason recorded when a worker misses its deadline.
pub const TIMEOUT_REASON: &str = "timeout";
/// Reason recorded when an execution is dropped before reporting an outcome.
pub const ABORTED_REASON: &str = "aborted";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for JobId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// `Completed` and `Failed` never transition on their own.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stage of the pipeline produced a failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Validation,
    Timeout,
    Worker,
    Aborted,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Validation => "validation",
            FailureKind::Timeout => "timeout",
            FailureKind::Worker => "worker",
            FailureKind::Aborted => "aborted",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub reason: String,
}

impl Failure {
    pub fn validation() -> Self {
        Self {
            kind: FailureKind::Validation,
            reason: VALIDATION_FAILED_REASON.to_string(),
        }
    }

    pub fn timeout() -> Self {
        Self {
            kind: FailureKind::Timeout,
            reason: TIMEOUT_REASON.to_string(),
        }
    }

    pub fn worker(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Worker,
            reason: reason.into(),
        }
    }

    pub fn aborted() -> Self {
        Self {
            kind: FailureKind::Aborted,
            reason: ABORTED_REASON.to_string(),
        }
    }
}

/// Status together with the data that is only valid in that status.
///
/// Holding the result and the failure inside the variants keeps them
/// mutually exclusive and absent while the job is pending or running.
#[derive(Clone, Debug, PartialEq)]
pub enum JobState<R> {
    Pending,
    Processing,
    Completed(R),
    Failed(Failure),
}

impl<R> JobState<R> {
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Pending => JobStatus::Pending,
            JobState::Processing => JobStatus::Processing,
            JobState::Completed(_) => JobStatus::Completed,
            JobState::Failed(_) => JobStatus::Failed,
        }
    }
}

/// Point-in-time copy of a job record.
///
/// The registry keeps the canonical record; everything handed out is a
/// snapshot that cannot feed changes back.
#[derive(Clone, Debug)]
pub struct JobSnapshot<R> {
    pub id: JobId,
    pub config: JobConfig,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Number of times the job has been claimed for execution.
    pub attempts: u32,
    pub state: JobState<R>,
}

impl<R> JobSnapshot<R> {
    pub(crate) fn new(id: JobId, config: JobConfig, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            config,
            created_at,
            started_at: None,
            finished_at: None,
            attempts: 0,
            state: JobState::Pending,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn result(&self) -> Option<&R> {
        match &self.state {
            JobState::Completed(result) => Some(result),
            _ => None,
        }
    }

    pub fn into_result(self) -> Option<R> {
        match self.state {
            JobState::Completed(result) => Some(result),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match &self.state {
            JobState::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure().map(|failure| failure.reason.as_str())
    }

    /// Time between the executor claiming the job and recording its outcome.
    pub fn latency(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.finished_at) {
            (Some(started), Some(finished)) => Some(finished - started),
            _ => None,
        }
    }
}

impl<R: Serialize> Serialize for JobSnapshot<R> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("JobSnapshot", 10)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("status", &self.status())?;
        state.serialize_field("config", &self.config)?;
        state.serialize_field("created_at", &self.created_at)?;
        state.serialize_field("started_at", &self.started_at)?;
        state.serialize_field("finished_at", &self.finished_at)?;
        state.serialize_field("attempts", &self.attempts)?;
        // Absent rather than null, so a `null` result still reads back as completed.
        match self.result() {
            Some(result) => state.serialize_field("result", result)?,
            None => state.skip_field("result")?,
        }
        state.serialize_field("failure_kind", &self.failure().map(|f| f.kind))?;
        state.serialize_field("failure_reason", &self.failure_reason())?;
        state.end()
    }
}

impl<'de, R: Deserialize<'de>> Deserialize<'de> for JobSnapshot<R> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        #[derive(Deserialize)]
        #[serde(bound(deserialize = "R: Deserialize<'de>"))]
        struct JobSnapshotFields<R> {
            id: JobId,
            status: JobStatus,
            config: JobConfig,
            created_at: DateTime<Utc>,
            started_at: Option<DateTime<Utc>>,
            finished_at: Option<DateTime<Utc>>,
            #[serde(default)]
            attempts: u32,
            #[serde(default, deserialize_with = "deserialize_present")]
            result: Option<R>,
            failure_kind: Option<FailureKind>,
            failure_reason: Option<String>,
        }

        let helper = JobSnapshotFields::<R>::deserialize(deserializer)?;
        let state = match (helper.status, helper.result, helper.failure_reason) {
            (JobStatus::Pending, None, None) => JobState::Pending,
            (JobStatus::Processing, None, None) => JobState::Processing,
            (JobStatus::Completed, Some(result), None) => JobState::Completed(result),
            (JobStatus::Failed, None, Some(reason)) => JobState::Failed(Failure {
                kind: helper.failure_kind.unwrap_or(FailureKind::Worker),
                reason,
            }),
            (status, _, _) => {
                return Err(D::Error::custom(format!(
                    "result/failure_reason do not match status `{status}`"
                )))
            }
        };

        Ok(JobSnapshot {
            id: helper.id,
            config: helper.config,
            created_at: helper.created_at,
            started_at: helper.started_at,
            finished_at: helper.finished_at,
            attempts: helper.attempts,
            state,
        })
    }
}

/// A present `result` field is always `Some`, even when `R` deserializes from `null`.
fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
