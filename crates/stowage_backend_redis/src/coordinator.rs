//! The upload coordinator: the [`UploadService`] implementation wiring together the
//! job store, part ledger, object store, lock service and metadata clients.
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use uuid::Uuid;

use stowage_core::job::{JobRecord, JobState, SessionJob};
use stowage_core::{
    job_source, nfc, object_path, ChunkUpload, CombineRequest, ConflictKind, ConflictRecord,
    Error as CoreError, JobType, PreUploadRequest, UploadService, Zone,
};
use stowage_objectstore::ObjectStore;

use super::activity::ActivityLogPublisher;
use super::catalog::{CatalogClient, ItemQuery};
use super::config::RedisBackendConfig;
use super::dataops::DataopsClient;
use super::errors::{Error, Result};
use super::finalizer;
use super::folders::FolderMaterializer;
use super::jobs::JobStore;
use super::kv::RedisKv;
use super::locks::{LockClient, WRITE_OPERATION};
use super::parts::PartLedger;
use super::projects::ProjectClient;

#[derive(Clone)]
pub struct RedisUploadService {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) zone: Zone,
    pub(crate) root_path: PathBuf,
    pub(crate) jobs: JobStore,
    pub(crate) parts: PartLedger,
    pub(crate) locks: LockClient,
    pub(crate) catalog: CatalogClient,
    pub(crate) dataops: DataopsClient,
    pub(crate) projects: ProjectClient,
    pub(crate) objects: Arc<dyn ObjectStore>,
    pub(crate) activity: ActivityLogPublisher,
    pub(crate) folders: FolderMaterializer,
    finalizer_slots: Arc<Semaphore>,
}

impl RedisUploadService {
    pub(crate) fn new(
        config: &RedisBackendConfig,
        kv: RedisKv,
        objects: Arc<dyn ObjectStore>,
        activity: ActivityLogPublisher,
    ) -> Self {
        let catalog = CatalogClient::new(&config.services.metadata);
        let locks = LockClient::new(&config.services.dataops);
        let folders = FolderMaterializer::new(catalog.clone(), locks.clone(), config.zone);
        Self {
            inner: Arc::new(Inner {
                zone: config.zone,
                root_path: config.root_path.clone(),
                jobs: JobStore::new(kv.clone()),
                parts: PartLedger::new(kv),
                locks,
                catalog,
                dataops: DataopsClient::new(&config.services.dataops),
                projects: ProjectClient::new(&config.services.project),
                objects,
                activity,
                folders,
                finalizer_slots: Arc::new(Semaphore::new(config.finalizer_slots)),
            }),
        }
    }

    async fn conflict_file_paths(
        &self,
        request: &PreUploadRequest,
    ) -> Result<Vec<ConflictRecord>> {
        let mut conflicts = Vec::new();
        for entry in &request.data {
            let hits = self
                .inner
                .catalog
                .search_items(&ItemQuery {
                    name: &entry.resumable_filename,
                    container_code: &request.project_code,
                    zone: self.inner.zone,
                    recursive: false,
                    parent_path: Some(&entry.resumable_relative_path),
                })
                .await?;
            if !hits.is_empty() {
                conflicts.push(ConflictRecord {
                    name: entry.resumable_filename.clone(),
                    relative_path: entry.resumable_relative_path.clone(),
                    kind: ConflictKind::File,
                });
            }
        }
        Ok(conflicts)
    }

    async fn conflict_folder_paths(
        &self,
        request: &PreUploadRequest,
    ) -> Result<Vec<ConflictRecord>> {
        let (parent_path, name) = match request.current_folder_node.rsplit_once('/') {
            Some((parent_path, name)) => (parent_path, name),
            None => ("", request.current_folder_node.as_str()),
        };
        let hits = self
            .inner
            .catalog
            .search_items(&ItemQuery {
                name,
                container_code: &request.project_code,
                zone: self.inner.zone,
                recursive: false,
                parent_path: Some(parent_path),
            })
            .await?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![ConflictRecord {
            name: name.to_string(),
            relative_path: parent_path.to_string(),
            kind: ConflictKind::Folder,
        }])
    }

    async fn proxy_chunk(&self, chunk: &ChunkUpload) -> Result<()> {
        let bucket = self.inner.zone.bucket(&chunk.project_code);
        let key = object_path(&chunk.resumable_relative_path, &chunk.resumable_filename);
        tracing::info!(
            "uploading chunk {} of {} ({} bytes)",
            chunk.resumable_chunk_number,
            chunk.resumable_filename,
            chunk.chunk_data.len()
        );
        let part = self
            .inner
            .objects
            .part_upload(
                &bucket,
                &key,
                &chunk.resumable_identifier,
                chunk.resumable_chunk_number,
                chunk.chunk_data.clone(),
            )
            .await?;
        self.inner
            .parts
            .record(&chunk.resumable_identifier, &part)
            .await
    }

    async fn terminate_job(
        &self,
        session_id: &str,
        project_code: &str,
        operator: &str,
        job_id: &str,
        error_msg: &str,
    ) -> Result<()> {
        let mut job = self
            .inner
            .jobs
            .load(session_id, project_code, operator, job_id)
            .await?;
        job.add_payload("error_msg", error_msg);
        self.inner
            .jobs
            .set_status(&mut job, JobState::Terminated)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UploadService for RedisUploadService {
    type Error = Error;

    async fn pre_upload(
        &self,
        session_id: &str,
        request: PreUploadRequest,
    ) -> Result<Vec<JobRecord>> {
        let job_type: JobType = request.job_type.parse().map_err(Error::Core)?;
        self.inner.projects.ensure_exists(&request.project_code).await?;

        // a folder upload may reuse a name with different files inside, so the two
        // job types check different roots
        let conflicts = match job_type {
            JobType::AsFile => self.conflict_file_paths(&request).await?,
            JobType::AsFolder => self.conflict_folder_paths(&request).await?,
        };
        if !conflicts.is_empty() {
            let kind = if conflicts.iter().any(|c| c.kind == ConflictKind::File) {
                ConflictKind::File
            } else {
                ConflictKind::Folder
            };
            return Err(Error::Core(CoreError::Conflict {
                kind,
                failed: conflicts,
            }));
        }

        let data: Vec<_> = request
            .data
            .iter()
            .map(|entry| stowage_core::UploadData {
                resumable_filename: nfc(&entry.resumable_filename),
                resumable_relative_path: entry.resumable_relative_path.clone(),
            })
            .collect();

        let bucket = self.inner.zone.bucket(&request.project_code);
        let object_paths: Vec<String> = data
            .iter()
            .map(|entry| object_path(&entry.resumable_relative_path, &entry.resumable_filename))
            .collect();
        let upload_ids = self
            .inner
            .objects
            .prepare_multipart_upload(&bucket, &object_paths)
            .await?;

        let task_id = Uuid::new_v4().to_string();
        let mut jobs = Vec::with_capacity(data.len());
        let mut lock_keys = Vec::with_capacity(data.len());
        for ((entry, key), upload_id) in data.iter().zip(&object_paths).zip(&upload_ids) {
            let mut job = SessionJob::new(session_id, &request.project_code, &request.operator);
            job.set_job_id(upload_id.clone());
            job.set_source(job_source(
                &entry.resumable_relative_path,
                &entry.resumable_filename,
            ));
            job.add_payload("task_id", task_id.clone());
            job.add_payload("resumable_identifier", upload_id.clone());
            jobs.push(job);
            lock_keys.push(format!("{bucket}/{key}"));
        }

        // locks are taken for the whole batch before any job becomes visible; they
        // stay held until the finalizer releases them
        self.inner.locks.bulk_lock(&lock_keys, WRITE_OPERATION).await?;
        match self
            .inner
            .jobs
            .set_status_all(&mut jobs, JobState::PreUploaded)
            .await
        {
            Ok(records) => Ok(records),
            Err(e) => {
                if let Err(unlock_err) = self
                    .inner
                    .locks
                    .bulk_unlock(&lock_keys, WRITE_OPERATION)
                    .await
                {
                    tracing::warn!("failed to release locks after persist error: {unlock_err}");
                }
                Err(e)
            }
        }
    }

    async fn upload_chunk(&self, session_id: &str, chunk: ChunkUpload) -> Result<()> {
        let mut chunk = chunk;
        chunk.resumable_filename = nfc(&chunk.resumable_filename);

        match self.proxy_chunk(&chunk).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(
                    "failed to upload chunk {} of {}: {e}",
                    chunk.resumable_chunk_number,
                    chunk.resumable_identifier
                );
                if let Err(fsm_err) = self
                    .terminate_job(
                        session_id,
                        &chunk.project_code,
                        &chunk.operator,
                        &chunk.resumable_identifier,
                        &e.to_string(),
                    )
                    .await
                {
                    tracing::warn!("failed to terminate job after chunk error: {fsm_err}");
                }
                Err(e)
            }
        }
    }

    async fn combine(&self, session_id: &str, request: CombineRequest) -> Result<JobRecord> {
        let mut request = request;
        request.resumable_filename = nfc(&request.resumable_filename);

        let mut job = self
            .inner
            .jobs
            .load(
                session_id,
                &request.project_code,
                &request.operator,
                &request.resumable_identifier,
            )
            .await?;
        if !matches!(
            job.status(),
            JobState::PreUploaded | JobState::ChunkUploaded
        ) {
            return Err(Error::Core(CoreError::CombineNotAllowed {
                job_id: request.resumable_identifier.clone(),
                status: job.status(),
            }));
        }

        let record = self
            .inner
            .jobs
            .set_status(&mut job, JobState::ChunkUploaded)
            .await?;

        let permit = self
            .inner
            .finalizer_slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::FinalizerPoolClosed)?;
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let _permit = permit;
            finalizer::finalize_worker(inner, request, job).await;
        });

        Ok(record)
    }

    async fn job_status(&self, session_id: &str, job_id: &str) -> Result<JobRecord> {
        let records = self.inner.jobs.fetch(session_id, job_id, "*", Some("*")).await?;
        records
            .into_iter()
            .next()
            .ok_or_else(|| Error::Core(CoreError::JobNotFound(job_id.to_string())))
    }
}
