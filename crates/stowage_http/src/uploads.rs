//! The four upload endpoints.
//!
//! Every handler resolves the `Session-Id` header first, delegates to the backing
//! [`UploadService`], and wraps the outcome in the response envelope; backend errors
//! are converted through [`stowage_core::Error`] into envelope responses by
//! [`super::errors::Error`].
use axum::extract::{Multipart, Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::json;

use stowage_core::{ChunkUpload, CombineRequest, PreUploadRequest, UploadService};

use super::errors::{Error, Result};
use super::response::ApiResponse;
use super::AppState;

const SESSION_ID_HEADER: &str = "Session-Id";

fn session_id(headers: &HeaderMap) -> Result<String> {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or(Error::MissingHeader("session_id"))
}

// POST /v1/files/jobs
//
// The first call of the upload sequence: name checks, upload-id reservation and
// job creation for the whole batch.
pub(crate) async fn upload_pre<S: UploadService>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Json(request): Json<PreUploadRequest>,
) -> Result<ApiResponse> {
    let session_id = session_id(&headers)?;
    let jobs = state
        .service
        .pre_upload(&session_id, request)
        .await
        .map_err(|e| Error::Core(e.into()))?;
    Ok(ApiResponse::success(serde_json::to_value(jobs)?))
}

// POST /v1/files/chunks
//
// Proxies one chunk straight through to the object store. Chunks arrive as
// multipart form data and may come in any order.
pub(crate) async fn upload_chunks<S: UploadService>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<ApiResponse> {
    let session_id = session_id(&headers)?;

    let mut chunk = ChunkUpload::default();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "project_code" => chunk.project_code = field.text().await?,
            "operator" => chunk.operator = field.text().await?,
            "resumable_identifier" => chunk.resumable_identifier = field.text().await?,
            "resumable_filename" => chunk.resumable_filename = field.text().await?,
            "resumable_relative_path" => chunk.resumable_relative_path = field.text().await?,
            "resumable_chunk_number" => {
                chunk.resumable_chunk_number =
                    parse_field(field.text().await?, "resumable_chunk_number")?
            }
            "resumable_total_chunks" => {
                chunk.resumable_total_chunks =
                    parse_field(field.text().await?, "resumable_total_chunks")?
            }
            "resumable_total_size" => {
                chunk.resumable_total_size =
                    parse_field(field.text().await?, "resumable_total_size")?
            }
            "chunk_data" => chunk.chunk_data = field.bytes().await?,
            _ => {}
        }
    }

    if chunk.project_code.is_empty() {
        return Err(Error::MissingFormField("project_code"));
    }
    if chunk.operator.is_empty() {
        return Err(Error::MissingFormField("operator"));
    }
    if chunk.resumable_identifier.is_empty() {
        return Err(Error::MissingFormField("resumable_identifier"));
    }
    if chunk.resumable_filename.is_empty() {
        return Err(Error::MissingFormField("resumable_filename"));
    }
    if chunk.resumable_chunk_number < 1 {
        return Err(Error::MissingFormField("resumable_chunk_number"));
    }
    if chunk.chunk_data.is_empty() {
        return Err(Error::MissingFormField("chunk_data"));
    }

    state
        .service
        .upload_chunk(&session_id, chunk)
        .await
        .map_err(|e| Error::Core(e.into()))?;
    Ok(ApiResponse::success(json!({"msg": "Succeed"})))
}

// POST /v1/files
//
// The client's acknowledgement that all chunks were uploaded; finalization runs in
// the background and the job record is returned immediately.
pub(crate) async fn on_success<S: UploadService>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Json(request): Json<CombineRequest>,
) -> Result<ApiResponse> {
    let session_id = session_id(&headers)?;
    let record = state
        .service
        .combine(&session_id, request)
        .await
        .map_err(|e| Error::Core(e.into()))?;
    Ok(ApiResponse::success(serde_json::to_value(record)?))
}

// GET /v1/upload/status/{job_id}
pub(crate) async fn get_status<S: UploadService>(
    State(state): State<AppState<S>>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
) -> Result<ApiResponse> {
    let session_id = session_id(&headers)?;
    let record = state
        .service
        .job_status(&session_id, &job_id)
        .await
        .map_err(|e| Error::Core(e.into()))?;
    Ok(ApiResponse::success(serde_json::to_value(record)?))
}

fn parse_field<T: std::str::FromStr>(raw: String, name: &'static str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::InvalidFormField(name))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use stowage_core::job::{JobRecord, JobState};
    use stowage_core::{ConflictKind, ConflictRecord, Error as CoreError, UPLOAD_ACTION};

    use crate::Stowage;

    use super::*;

    fn record(status: JobState) -> JobRecord {
        let mut payload = HashMap::new();
        payload.insert("task_id".to_string(), "task-1".to_string());
        payload.insert(
            "resumable_identifier".to_string(),
            "upload-1".to_string(),
        );
        if status == JobState::Succeed {
            payload.insert("source_geid".to_string(), "geid-1".to_string());
        }
        JobRecord {
            session_id: "1234".to_string(),
            job_id: "upload-1".to_string(),
            source: "/a.txt".to_string(),
            action: UPLOAD_ACTION.to_string(),
            status,
            project_code: "demo".to_string(),
            operator: "alice".to_string(),
            progress: 0,
            payload,
            update_timestamp: "1616439731".to_string(),
        }
    }

    #[derive(Clone)]
    enum MockService {
        Happy,
        Failing(fn() -> CoreError),
    }

    #[async_trait]
    impl UploadService for MockService {
        type Error = CoreError;

        async fn pre_upload(
            &self,
            _session_id: &str,
            _request: PreUploadRequest,
        ) -> std::result::Result<Vec<JobRecord>, CoreError> {
            match self {
                MockService::Happy => Ok(vec![record(JobState::PreUploaded)]),
                MockService::Failing(make) => Err(make()),
            }
        }

        async fn upload_chunk(
            &self,
            _session_id: &str,
            _chunk: ChunkUpload,
        ) -> std::result::Result<(), CoreError> {
            match self {
                MockService::Happy => Ok(()),
                MockService::Failing(make) => Err(make()),
            }
        }

        async fn combine(
            &self,
            _session_id: &str,
            _request: CombineRequest,
        ) -> std::result::Result<JobRecord, CoreError> {
            match self {
                MockService::Happy => Ok(record(JobState::ChunkUploaded)),
                MockService::Failing(make) => Err(make()),
            }
        }

        async fn job_status(
            &self,
            _session_id: &str,
            _job_id: &str,
        ) -> std::result::Result<JobRecord, CoreError> {
            match self {
                MockService::Happy => Ok(record(JobState::Succeed)),
                MockService::Failing(make) => Err(make()),
            }
        }
    }

    fn router(service: MockService) -> axum::Router {
        Stowage::new(service, "stowage", "0.2.3").router()
    }

    async fn send(router: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        (status, value)
    }

    fn pre_upload_request(session_header: Option<&str>) -> Request<Body> {
        let payload = serde_json::json!({
            "project_code": "demo",
            "operator": "alice",
            "job_type": "AS_FILE",
            "data": [{"resumable_filename": "a.txt", "resumable_relative_path": ""}],
        });
        let mut builder = Request::builder()
            .method("POST")
            .uri("/v1/files/jobs")
            .header("content-type", "application/json");
        if let Some(session_id) = session_header {
            builder = builder.header("Session-Id", session_id);
        }
        builder.body(Body::from(payload.to_string())).unwrap()
    }

    #[tokio::test]
    async fn pre_upload_returns_the_job_batch() {
        let (status, body) = send(router(MockService::Happy), pre_upload_request(Some("1234"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 200);
        assert_eq!(body["result"][0]["status"], "PRE_UPLOADED");
        assert_eq!(body["result"][0]["source"], "/a.txt");
    }

    #[tokio::test]
    async fn missing_session_header_is_a_bad_request() {
        let (status, body) = send(router(MockService::Happy), pre_upload_request(None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_msg"], "session_id is required");
    }

    #[tokio::test]
    async fn invalid_job_type_reports_the_value() {
        let service =
            MockService::Failing(|| CoreError::InvalidJobType("foo".to_string()));
        let (status, body) = send(router(service), pre_upload_request(Some("1234"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_msg"], "Invalid job type: foo");
    }

    #[tokio::test]
    async fn unknown_project_maps_to_not_found() {
        let service =
            MockService::Failing(|| CoreError::ProjectNotFound("demo".to_string()));
        let (status, body) = send(router(service), pre_upload_request(Some("1234"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], 404);
    }

    #[tokio::test]
    async fn file_conflicts_surface_in_result_failed() {
        let service = MockService::Failing(|| CoreError::Conflict {
            kind: ConflictKind::File,
            failed: vec![ConflictRecord {
                name: "any".to_string(),
                relative_path: "".to_string(),
                kind: ConflictKind::File,
            }],
        });
        let (status, body) = send(router(service), pre_upload_request(Some("1234"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(
            body["error_msg"],
            "[Invalid File] File Name has already taken by other resources(file/folder)"
        );
        assert_eq!(
            body["result"]["failed"],
            serde_json::json!([{"name": "any", "relative_path": "", "type": "File"}])
        );
    }

    #[tokio::test]
    async fn folder_conflicts_use_the_folder_template() {
        let service = MockService::Failing(|| CoreError::Conflict {
            kind: ConflictKind::Folder,
            failed: vec![ConflictRecord {
                name: "test".to_string(),
                relative_path: "admin".to_string(),
                kind: ConflictKind::Folder,
            }],
        });
        let (status, body) = send(router(service), pre_upload_request(Some("1234"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let error_msg = body["error_msg"].as_str().unwrap();
        assert!(error_msg.starts_with("[Invalid Folder]"));
    }

    #[tokio::test]
    async fn lock_contention_maps_to_conflict() {
        let service =
            MockService::Failing(|| CoreError::ResourceLocked("gr-demo/a.txt".to_string()));
        let (status, body) = send(router(service), pre_upload_request(Some("1234"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error_msg"], "resource gr-demo/a.txt already in used");
    }

    fn chunk_request(body: String, boundary: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/files/chunks")
            .header("Session-Id", "1234")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn chunk_form(fields: &[(&str, &str)], boundary: &str) -> String {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"chunk_data\"; \
             filename=\"blob\"\r\nContent-Type: application/octet-stream\r\n\r\nhello\r\n"
        ));
        body.push_str(&format!("--{boundary}--\r\n"));
        body
    }

    #[tokio::test]
    async fn chunk_upload_succeeds_with_a_full_form() {
        let boundary = "stowage-test-boundary";
        let body = chunk_form(
            &[
                ("project_code", "demo"),
                ("operator", "alice"),
                ("resumable_identifier", "upload-1"),
                ("resumable_filename", "a.txt"),
                ("resumable_relative_path", ""),
                ("resumable_chunk_number", "1"),
                ("resumable_total_chunks", "1"),
                ("resumable_total_size", "5"),
            ],
            boundary,
        );
        let (status, value) =
            send(router(MockService::Happy), chunk_request(body, boundary)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["result"]["msg"], "Succeed");
    }

    #[tokio::test]
    async fn chunk_upload_without_identifier_is_rejected() {
        let boundary = "stowage-test-boundary";
        let body = chunk_form(
            &[
                ("project_code", "demo"),
                ("operator", "alice"),
                ("resumable_filename", "a.txt"),
                ("resumable_chunk_number", "1"),
            ],
            boundary,
        );
        let (status, value) =
            send(router(MockService::Happy), chunk_request(body, boundary)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            value["error_msg"],
            "missing multipart field: resumable_identifier"
        );
    }

    #[tokio::test]
    async fn combine_returns_the_updated_record() {
        let payload = serde_json::json!({
            "project_code": "demo",
            "operator": "alice",
            "resumable_identifier": "upload-1",
            "resumable_filename": "a.txt",
            "resumable_relative_path": "",
            "resumable_total_chunks": 1,
            "resumable_total_size": 5,
        });
        let request = Request::builder()
            .method("POST")
            .uri("/v1/files")
            .header("Session-Id", "1234")
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();
        let (status, body) = send(router(MockService::Happy), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["status"], "CHUNK_UPLOADED");
    }

    #[tokio::test]
    async fn status_reports_the_finished_job() {
        let request = Request::builder()
            .method("GET")
            .uri("/v1/upload/status/upload-1")
            .header("Session-Id", "1234")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(router(MockService::Happy), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["status"], "SUCCEED");
        assert_eq!(body["result"]["payload"]["source_geid"], "geid-1");
    }

    #[tokio::test]
    async fn unknown_job_is_a_bad_request() {
        let service =
            MockService::Failing(|| CoreError::JobNotFound("upload-404".to_string()));
        let request = Request::builder()
            .method("GET")
            .uri("/v1/upload/status/upload-404")
            .header("Session-Id", "1234")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(router(service), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_msg"], "Job ID upload-404 not found");
    }

    #[tokio::test]
    async fn backend_failures_carry_the_api_namespace() {
        let service =
            MockService::Failing(|| CoreError::Backend("redis timed out".to_string()));
        let (status, body) = send(router(service), pre_upload_request(Some("1234"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body["error_msg"],
            "[Internal] api_upload backend error: redis timed out"
        );
    }

    #[tokio::test]
    async fn liveness_reports_name_and_version() {
        let request = Request::builder()
            .method("GET")
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(router(MockService::Happy), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
        assert_eq!(body["name"], "stowage");
        assert_eq!(body["version"], "0.2.3");
    }
}
