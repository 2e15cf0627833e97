//! Background finalization of an acknowledged upload.
//!
//! Runs detached from the combine request: materialize the folder tree, assemble the
//! recorded parts, combine them server-side, register the file in the catalog, attach
//! a zip preview where applicable, emit the activity log, and walk the job to
//! `SUCCEED`. Whatever happens, the per-file write lock is released and the temp
//! directory removed.
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use stowage_core::job::{JobState, SessionJob};
use stowage_core::{object_path, CombineRequest};

use super::archive::generate_archive_preview;
use super::coordinator::Inner;
use super::dataops::FileDataForm;
use super::errors::{Error, Result};
use super::locks::WRITE_OPERATION;

pub(crate) async fn finalize_worker(
    inner: Arc<Inner>,
    request: CombineRequest,
    mut job: SessionJob,
) {
    let bucket = inner.zone.bucket(&request.project_code);
    let obj_path = object_path(
        &request.resumable_relative_path,
        &request.resumable_filename,
    );
    let lock_key = format!("{bucket}/{obj_path}");
    let temp_dir = inner
        .root_path
        .join("tmp")
        .join("upload")
        .join(&request.resumable_identifier);

    if let Err(e) = finalize(&inner, &request, &mut job, &bucket, &obj_path, &temp_dir).await {
        let error_msg = match &e {
            Error::IoError(io) if io.kind() == ErrorKind::NotFound => {
                format!("folder {} is already empty: {}", temp_dir.display(), io)
            }
            _ => e.to_string(),
        };
        tracing::error!("finalization of {} failed: {error_msg}", request.resumable_identifier);
        job.add_payload("error_msg", error_msg);
        if let Err(fsm_err) = inner.jobs.set_status(&mut job, JobState::Terminated).await {
            tracing::error!("failed to mark job terminated: {fsm_err}");
        }
    }

    if let Err(e) = inner.locks.unlock(&lock_key, WRITE_OPERATION).await {
        tracing::warn!("failed to release lock {lock_key}: {e}");
    }
    if temp_dir.is_dir() {
        if let Err(e) = tokio::fs::remove_dir_all(&temp_dir).await {
            tracing::warn!("failed to remove temp dir {}: {e}", temp_dir.display());
        }
    }
}

async fn finalize(
    inner: &Arc<Inner>,
    request: &CombineRequest,
    job: &mut SessionJob,
    bucket: &str,
    obj_path: &str,
    temp_dir: &Path,
) -> Result<()> {
    tracing::info!(
        "materializing folder tree for '{}'",
        request.resumable_relative_path
    );
    let leaf = inner
        .folders
        .materialize(
            &request.project_code,
            &request.resumable_relative_path,
            &request.operator,
        )
        .await?;
    let parent_folder_geid = leaf.map(|node| node.geid).unwrap_or_default();

    tracing::info!("combining chunks of {}", request.resumable_identifier);
    let parts = inner.parts.sorted_parts(&request.resumable_identifier).await?;
    let version_id = inner
        .objects
        .combine_chunks(bucket, obj_path, &request.resumable_identifier, parts)
        .await?
        .unwrap_or_default();

    let target_path: PathBuf = inner
        .root_path
        .join(&request.project_code)
        .join(&request.resumable_relative_path);
    let created = inner
        .dataops
        .create_file(&FileDataForm {
            uploader: request.operator.clone(),
            file_name: request.resumable_filename.clone(),
            path: target_path.display().to_string(),
            file_size: request.resumable_total_size,
            description: format!("Raw file in {}", inner.zone),
            namespace: inner.zone.to_string(),
            project_code: request.project_code.clone(),
            labels: request.tags.clone(),
            parent_folder_geid,
            bucket: bucket.to_string(),
            minio_object_path: obj_path.to_string(),
            version_id,
            operator: Some(request.operator.clone()),
            process_pipeline: request.process_pipeline.clone(),
            parent_query: request.from_parents.clone(),
        })
        .await?;

    // zip archives additionally get a browsable directory preview; the object comes
    // back down because the combined version only exists server-side
    if Path::new(&request.resumable_filename)
        .extension()
        .map(|extension| extension == "zip")
        .unwrap_or(false)
    {
        let local_path = temp_dir.join(obj_path);
        inner
            .objects
            .download_object(bucket, obj_path, &local_path)
            .await?;
        let preview = tokio::task::spawn_blocking(move || -> Result<serde_json::Value> {
            let file = std::fs::File::open(&local_path)?;
            generate_archive_preview(file)
        })
        .await??;
        inner.dataops.save_archive_preview(&created.id, &preview).await?;
    }

    inner.activity.publish_upload(&created, &request.operator).await?;

    inner.jobs.set_status(job, JobState::Finalized).await?;
    job.add_payload("source_geid", created.id.clone());
    inner.jobs.set_status(job, JobState::Succeed).await?;
    tracing::info!("upload job {} done", request.resumable_identifier);
    Ok(())
}
