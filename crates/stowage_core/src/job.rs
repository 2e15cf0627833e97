//! Per-upload job state machine and its persisted record form.
//!
//! Each in-flight upload is tracked as a [`SessionJob`] keyed by the composite
//! `(session_id, job_id, action, project_code, operator, source)`. The `job_id` is the
//! multipart upload id issued by the object store at pre-upload time, so the job key
//! directly indexes the store's in-progress upload state.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Action tag of every upload job key and record.
pub const UPLOAD_ACTION: &str = "data_upload";

/// Upload job state.
///
/// Legal transitions move forward one step at a time along
/// `INIT -> PRE_UPLOADED -> CHUNK_UPLOADED -> FINALIZED -> SUCCEED`, with `TERMINATED`
/// reachable from every non-terminal state. `SUCCEED` and `TERMINATED` are frozen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Init,
    PreUploaded,
    ChunkUploaded,
    Finalized,
    Succeed,
    Terminated,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeed | JobState::Terminated)
    }

    fn successor(self) -> Option<JobState> {
        match self {
            JobState::Init => Some(JobState::PreUploaded),
            JobState::PreUploaded => Some(JobState::ChunkUploaded),
            JobState::ChunkUploaded => Some(JobState::Finalized),
            JobState::Finalized => Some(JobState::Succeed),
            JobState::Succeed | JobState::Terminated => None,
        }
    }

    /// Whether `self -> to` is a legal transition. Re-asserting the current state is
    /// allowed so that a repeated combine request stays idempotent.
    pub fn can_transition(self, to: JobState) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == self || to == JobState::Terminated || Some(to) == self.successor()
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            JobState::Init => "INIT",
            JobState::PreUploaded => "PRE_UPLOADED",
            JobState::ChunkUploaded => "CHUNK_UPLOADED",
            JobState::Finalized => "FINALIZED",
            JobState::Succeed => "SUCCEED",
            JobState::Terminated => "TERMINATED",
        };
        write!(f, "{}", name)
    }
}

/// Compose the KV key for a fully-identified job.
pub fn job_key(
    session_id: &str,
    job_id: &str,
    action: &str,
    project_code: &str,
    operator: &str,
    source: &str,
) -> String {
    format!("dataaction:{session_id}:Container:{job_id}:{action}:{project_code}:{operator}:{source}")
}

/// Compose a job key prefix for scans. `project_code` and `operator` accept the `*`
/// wildcard understood by the KV's pattern matching; leaving `operator` out widens the
/// scan by one more segment.
pub fn job_key_prefix(
    session_id: &str,
    job_id: &str,
    action: &str,
    project_code: &str,
    operator: Option<&str>,
) -> String {
    let prefix = format!("dataaction:{session_id}:Container:{job_id}:{action}:{project_code}");
    match operator {
        Some(operator) => format!("{prefix}:{operator}"),
        None => prefix,
    }
}

/// The persisted (and client-visible) form of a job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub session_id: String,
    pub job_id: String,
    pub source: String,
    pub action: String,
    pub status: JobState,
    pub project_code: String,
    pub operator: String,
    pub progress: i64,
    pub payload: HashMap<String, String>,
    pub update_timestamp: String,
}

impl JobRecord {
    pub fn key(&self) -> String {
        job_key(
            &self.session_id,
            &self.job_id,
            &self.action,
            &self.project_code,
            &self.operator,
            &self.source,
        )
    }
}

/// In-memory upload job. Construct with [`SessionJob::new`], assign the upload id and
/// source exactly once, then persist through the backend job store on every status
/// change.
#[derive(Clone, Debug)]
pub struct SessionJob {
    session_id: String,
    project_code: String,
    operator: String,
    action: String,
    job_id: Option<String>,
    source: Option<String>,
    status: JobState,
    progress: i64,
    payload: HashMap<String, String>,
}

impl SessionJob {
    pub fn new(session_id: &str, project_code: &str, operator: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            project_code: project_code.to_string(),
            operator: operator.to_string(),
            action: UPLOAD_ACTION.to_string(),
            job_id: None,
            source: None,
            status: JobState::Init,
            progress: 0,
            payload: HashMap::new(),
        }
    }

    pub fn from_record(record: JobRecord) -> Self {
        Self {
            session_id: record.session_id,
            project_code: record.project_code,
            operator: record.operator,
            action: record.action,
            job_id: Some(record.job_id),
            source: Some(record.source),
            status: record.status,
            progress: record.progress,
            payload: record.payload,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn project_code(&self) -> &str {
        &self.project_code
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn status(&self) -> JobState {
        self.status
    }

    pub fn set_job_id(&mut self, job_id: impl Into<String>) {
        self.job_id = Some(job_id.into());
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = Some(source.into());
    }

    pub fn set_progress(&mut self, progress: i64) {
        self.progress = progress;
    }

    /// Merge a key into the payload map, replacing any previous value.
    pub fn add_payload(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.payload.insert(key.into(), value.into());
    }

    pub fn payload(&self) -> &HashMap<String, String> {
        &self.payload
    }

    /// Apply a status transition, enforcing the state machine's legality rules.
    pub fn transition(&mut self, to: JobState) -> Result<()> {
        if !self.status.can_transition(to) {
            return Err(Error::IllegalTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Snapshot the job into its persisted record form, stamping the update time.
    ///
    /// Fails with [`Error::PreconditionMissing`] when `job_id` or `source` have not
    /// been assigned yet.
    pub fn record(&self) -> Result<JobRecord> {
        let job_id = self
            .job_id
            .clone()
            .ok_or(Error::PreconditionMissing("job_id"))?;
        let source = self
            .source
            .clone()
            .ok_or(Error::PreconditionMissing("source"))?;
        Ok(JobRecord {
            session_id: self.session_id.clone(),
            job_id,
            source,
            action: self.action.clone(),
            status: self.status,
            project_code: self.project_code.clone(),
            operator: self.operator.clone(),
            progress: self.progress,
            payload: self.payload.clone(),
            update_timestamp: chrono::Utc::now().timestamp().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn forward_chain_is_legal() {
        let mut job = SessionJob::new("1234", "demo", "alice");
        for state in [
            JobState::PreUploaded,
            JobState::ChunkUploaded,
            JobState::Finalized,
            JobState::Succeed,
        ] {
            job.transition(state).unwrap();
            assert_eq!(job.status(), state);
        }
    }

    #[rstest]
    #[case(JobState::Init)]
    #[case(JobState::PreUploaded)]
    #[case(JobState::ChunkUploaded)]
    #[case(JobState::Finalized)]
    fn terminated_is_reachable_from_any_live_state(#[case] from: JobState) {
        assert!(from.can_transition(JobState::Terminated));
    }

    #[rstest]
    #[case(JobState::Succeed)]
    #[case(JobState::Terminated)]
    fn terminal_states_are_frozen(#[case] from: JobState) {
        for to in [
            JobState::Init,
            JobState::PreUploaded,
            JobState::ChunkUploaded,
            JobState::Finalized,
            JobState::Succeed,
            JobState::Terminated,
        ] {
            assert!(!from.can_transition(to), "{from} -> {to} must be rejected");
        }
    }

    #[test]
    fn skipping_states_is_rejected() {
        let mut job = SessionJob::new("1234", "demo", "alice");
        job.set_job_id("upload-1");
        job.set_source("/a.txt");
        let err = job.transition(JobState::Finalized).unwrap_err();
        assert!(matches!(err, Error::IllegalTransition { .. }));
    }

    #[test]
    fn reasserting_the_current_state_is_idempotent() {
        let mut job = SessionJob::new("1234", "demo", "alice");
        job.transition(JobState::PreUploaded).unwrap();
        job.transition(JobState::ChunkUploaded).unwrap();
        job.transition(JobState::ChunkUploaded).unwrap();
        assert_eq!(job.status(), JobState::ChunkUploaded);
    }

    #[test]
    fn record_requires_job_id_and_source() {
        let mut job = SessionJob::new("1234", "demo", "alice");
        assert!(matches!(
            job.record(),
            Err(Error::PreconditionMissing("job_id"))
        ));
        job.set_job_id("upload-1");
        assert!(matches!(
            job.record(),
            Err(Error::PreconditionMissing("source"))
        ));
        job.set_source("/a.txt");
        assert!(job.record().is_ok());
    }

    #[test]
    fn record_key_matches_the_composite_layout() {
        let mut job = SessionJob::new("1234", "demo", "alice");
        job.set_job_id("upload-1");
        job.set_source("/a.txt");
        let record = job.record().unwrap();
        assert_eq!(
            record.key(),
            "dataaction:1234:Container:upload-1:data_upload:demo:alice:/a.txt"
        );
    }

    #[test]
    fn status_serializes_as_screaming_snake_case() {
        let mut job = SessionJob::new("1234", "demo", "alice");
        job.set_job_id("upload-1");
        job.set_source("/a.txt");
        job.transition(JobState::PreUploaded).unwrap();
        let json = serde_json::to_value(job.record().unwrap()).unwrap();
        assert_eq!(json["status"], "PRE_UPLOADED");
        assert_eq!(json["action"], "data_upload");
    }

    #[test]
    fn wildcard_prefix_widens_the_scan() {
        assert_eq!(
            job_key_prefix("1234", "upload-1", UPLOAD_ACTION, "*", Some("*")),
            "dataaction:1234:Container:upload-1:data_upload:*:*"
        );
        assert_eq!(
            job_key_prefix("1234", "upload-1", UPLOAD_ACTION, "demo", None),
            "dataaction:1234:Container:upload-1:data_upload:demo"
        );
    }
}
