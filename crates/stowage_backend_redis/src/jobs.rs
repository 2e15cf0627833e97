//! Write-through persistence for [`SessionJob`] records.
use stowage_core::job::{job_key_prefix, JobRecord, JobState, SessionJob, UPLOAD_ACTION};
use stowage_core::Error as CoreError;

use super::errors::Result;
use super::kv::RedisKv;

#[derive(Clone)]
pub struct JobStore {
    kv: RedisKv,
}

impl JobStore {
    pub fn new(kv: RedisKv) -> Self {
        Self { kv }
    }

    /// Transition the job and persist the full record under its composite key.
    pub async fn set_status(&self, job: &mut SessionJob, status: JobState) -> Result<JobRecord> {
        job.transition(status)?;
        let record = job.record()?;
        self.kv
            .set(&record.key(), &serde_json::to_string(&record)?)
            .await?;
        Ok(record)
    }

    /// Transition a pre-upload batch and persist all records in one pipelined round
    /// trip.
    pub async fn set_status_all(
        &self,
        jobs: &mut [SessionJob],
        status: JobState,
    ) -> Result<Vec<JobRecord>> {
        let mut records = Vec::with_capacity(jobs.len());
        let mut entries = Vec::with_capacity(jobs.len());
        for job in jobs.iter_mut() {
            job.transition(status)?;
            let record = job.record()?;
            entries.push((record.key(), serde_json::to_string(&record)?));
            records.push(record);
        }
        self.kv.set_many(&entries).await?;
        Ok(records)
    }

    /// Prefix-scan job records. `project_code` and `operator` accept `*`.
    pub async fn fetch(
        &self,
        session_id: &str,
        job_id: &str,
        project_code: &str,
        operator: Option<&str>,
    ) -> Result<Vec<JobRecord>> {
        let prefix = job_key_prefix(session_id, job_id, UPLOAD_ACTION, project_code, operator);
        let raw = self.kv.mget_by_prefix(&prefix).await?;
        raw.iter()
            .map(|value| Ok(serde_json::from_str(value)?))
            .collect()
    }

    /// Load the job for a fully-identified upload, failing with `JobNotFound` when the
    /// prefix resolves to zero entries.
    pub async fn load(
        &self,
        session_id: &str,
        project_code: &str,
        operator: &str,
        job_id: &str,
    ) -> Result<SessionJob> {
        let records = self
            .fetch(session_id, job_id, project_code, Some(operator))
            .await?;
        let record = records
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::JobNotFound(job_id.to_string()))?;
        Ok(SessionJob::from_record(record))
    }
}
