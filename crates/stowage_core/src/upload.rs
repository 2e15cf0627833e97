//! Upload request/response types and the [`UploadService`] trait implemented by
//! backends.
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::errors::Error;
use crate::job::JobRecord;

/// Fold a filename into canonical composed form (NFC). Browsers disagree on the
/// unicode form they submit, so every filename is normalized before it is used to
/// derive keys or paths.
pub fn nfc(name: &str) -> String {
    name.nfc().collect()
}

/// The `source` field of a job: the literal `relative_path + "/" + filename`
/// concatenation, with a leading `/` when the relative path is empty.
pub fn job_source(relative_path: &str, filename: &str) -> String {
    format!("{relative_path}/{filename}")
}

/// The object-store key (and lock-key tail) for a file: segments joined without a
/// leading separator.
pub fn object_path(relative_path: &str, filename: &str) -> String {
    if relative_path.is_empty() {
        filename.to_string()
    } else {
        format!("{relative_path}/{filename}")
    }
}

/// Logical location of the service: greenroom is staging, core is production. The
/// zone is chosen once per process from configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Greenroom,
    Core,
}

impl Zone {
    /// The integer encoding used by the metadata catalog.
    pub fn catalog_code(self) -> i32 {
        match self {
            Zone::Greenroom => 0,
            Zone::Core => 1,
        }
    }

    /// Bucket backing a project in this zone.
    pub fn bucket(self, project_code: &str) -> String {
        match self {
            Zone::Greenroom => format!("gr-{project_code}"),
            Zone::Core => format!("core-{project_code}"),
        }
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Zone::Greenroom => write!(f, "greenroom"),
            Zone::Core => write!(f, "core"),
        }
    }
}

/// Whether a pre-upload batch describes loose files or a folder tree rooted at
/// `current_folder_node`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobType {
    AsFile,
    AsFolder,
}

impl std::str::FromStr for JobType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AS_FILE" => Ok(JobType::AsFile),
            "AS_FOLDER" => Ok(JobType::AsFolder),
            other => Err(Error::InvalidJobType(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct UploadData {
    pub resumable_filename: String,
    #[serde(default)]
    pub resumable_relative_path: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PreUploadRequest {
    pub project_code: String,
    pub operator: String,
    pub job_type: String,
    pub data: Vec<UploadData>,
    #[serde(default)]
    pub current_folder_node: String,
    #[serde(default)]
    pub upload_message: String,
}

/// One chunk of a resumable upload, assembled from the multipart form by the HTTP
/// layer. `resumable_chunk_number` is 1-based; chunks may arrive in any order and any
/// multiplicity.
#[derive(Clone, Debug, Default)]
pub struct ChunkUpload {
    pub project_code: String,
    pub operator: String,
    pub resumable_identifier: String,
    pub resumable_filename: String,
    pub resumable_relative_path: String,
    pub resumable_chunk_number: i32,
    pub resumable_total_chunks: i32,
    pub resumable_total_size: f64,
    pub chunk_data: Bytes,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CombineRequest {
    pub project_code: String,
    pub operator: String,
    pub resumable_identifier: String,
    pub resumable_filename: String,
    #[serde(default)]
    pub resumable_relative_path: String,
    pub resumable_total_chunks: i64,
    pub resumable_total_size: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub process_pipeline: Option<String>,
    #[serde(default)]
    pub from_parents: Option<serde_json::Value>,
    #[serde(default)]
    pub upload_message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    File,
    Folder,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ConflictKind::File => write!(f, "File"),
            ConflictKind::Folder => write!(f, "Folder"),
        }
    }
}

/// A name collision detected at pre-upload time, reported back to the client in
/// `result.failed`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub name: String,
    pub relative_path: String,
    #[serde(rename = "type")]
    pub kind: ConflictKind,
}

/// The upload orchestration operations exposed over HTTP.
///
/// Implementations coordinate the object store, the job store, the lock service and
/// the metadata catalog; the HTTP layer is generic over this trait and only maps
/// errors onto the response envelope.
#[async_trait]
pub trait UploadService: Clone + Send + Sync + 'static {
    type Error: std::error::Error + Into<Error> + Send + Sync;

    /// Reserve upload jobs for a batch of files: conflict detection, upload-id
    /// reservation, job persistence and write-locking.
    async fn pre_upload(
        &self,
        session_id: &str,
        request: PreUploadRequest,
    ) -> std::result::Result<Vec<JobRecord>, Self::Error>;

    /// Forward one chunk to the object store and record its part identifier.
    async fn upload_chunk(
        &self,
        session_id: &str,
        chunk: ChunkUpload,
    ) -> std::result::Result<(), Self::Error>;

    /// Acknowledge that all chunks were uploaded; schedules background finalization
    /// and returns the job record immediately.
    async fn combine(
        &self,
        session_id: &str,
        request: CombineRequest,
    ) -> std::result::Result<JobRecord, Self::Error>;

    /// Look up a job by id across projects and operators.
    async fn job_status(
        &self,
        session_id: &str,
        job_id: &str,
    ) -> std::result::Result<JobRecord, Self::Error>;
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn decomposed_and_composed_filenames_yield_the_same_source() {
        let composed = "caf\u{e9}";
        let decomposed = "cafe\u{301}";
        assert_ne!(composed, decomposed);
        assert_eq!(
            job_source("", &nfc(composed)),
            job_source("", &nfc(decomposed))
        );
    }

    #[test]
    fn source_keeps_the_leading_separator_for_root_files() {
        assert_eq!(job_source("", "a.txt"), "/a.txt");
        assert_eq!(job_source("admin/data", "a.txt"), "admin/data/a.txt");
    }

    #[test]
    fn object_path_joins_cleanly() {
        assert_eq!(object_path("", "a.txt"), "a.txt");
        assert_eq!(object_path("admin/data", "a.txt"), "admin/data/a.txt");
    }

    #[rstest]
    #[case("AS_FILE", JobType::AsFile)]
    #[case("AS_FOLDER", JobType::AsFolder)]
    fn job_type_parses_the_known_names(#[case] raw: &str, #[case] expected: JobType) {
        assert_eq!(raw.parse::<JobType>().unwrap(), expected);
    }

    #[test]
    fn unknown_job_type_reports_the_offending_value() {
        let err = "foo".parse::<JobType>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid job type: foo");
    }

    #[rstest]
    #[case(Zone::Greenroom, "gr-demo", 0)]
    #[case(Zone::Core, "core-demo", 1)]
    fn zone_derives_bucket_and_catalog_code(
        #[case] zone: Zone,
        #[case] bucket: &str,
        #[case] code: i32,
    ) {
        assert_eq!(zone.bucket("demo"), bucket);
        assert_eq!(zone.catalog_code(), code);
    }

    #[test]
    fn conflict_records_serialize_with_a_type_tag() {
        let record = ConflictRecord {
            name: "any".to_string(),
            relative_path: "".to_string(),
            kind: ConflictKind::File,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "any", "relative_path": "", "type": "File"})
        );
    }
}
