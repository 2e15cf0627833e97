//! Client for the project registry; uploads are rejected when the target project does
//! not exist.
use reqwest::StatusCode;
use stowage_core::Error as CoreError;

use super::errors::{Error, Result};

#[derive(Clone)]
pub struct ProjectClient {
    http: reqwest::Client,
    base: String,
}

impl ProjectClient {
    pub fn new(project_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: project_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn ensure_exists(&self, project_code: &str) -> Result<()> {
        let url = format!("{}/v1/projects/{}", self.base, project_code);
        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::Core(CoreError::ProjectNotFound(
                project_code.to_string(),
            )));
        }
        response.error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn existing_project_passes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/projects/demo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": "demo"
            })))
            .mount(&server)
            .await;

        let client = ProjectClient::new(&server.uri());
        client.ensure_exists("demo").await.unwrap();
    }

    #[tokio::test]
    async fn missing_project_maps_to_project_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/projects/nope"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = ProjectClient::new(&server.uri());
        let err = client.ensure_exists("nope").await.unwrap_err();
        let core: CoreError = err.into();
        assert!(matches!(core, CoreError::ProjectNotFound(code) if code == "nope"));
    }
}
