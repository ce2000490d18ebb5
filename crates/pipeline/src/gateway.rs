//! HTTP client for the generation gateway.
//!
//! One JSON gateway fronts every text, speech, image and transcript
//! provider, so the pipeline never sees provider-specific formats. Every
//! request carries the caller's credential as a bearer token.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shortreel_core::stage_data::VideoMetadata;

use crate::collaborators::{
    GeneratedScript, ImageGenerator, ImageRequest, ScriptGenerator, ScriptRequest,
    SpeechRequest, SpeechSynthesizer, Transcript,
};
use crate::error::CollaboratorError;
use crate::transcript::{ExtractionApi, JobState};

/// Client for a single gateway deployment.
#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct MetadataRequest<'a> {
    narration: &'a str,
}

#[derive(Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    images: Vec<ImageRef>,
}

#[derive(Deserialize)]
struct ImageRef {
    url: String,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    source: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    job_id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    state: String,
    #[serde(default)]
    error: Option<String>,
}

impl HttpGateway {
    /// * `base_url` - e.g. `http://gateway:8080`, without a trailing slash.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B, token: &str) -> Result<T, CollaboratorError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T, CollaboratorError> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, capturing the body of
    /// failures for the error message.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, CollaboratorError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(CollaboratorError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, CollaboratorError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn read_bytes(response: reqwest::Response) -> Result<Vec<u8>, CollaboratorError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ScriptGenerator for HttpGateway {
    async fn generate_script(
        &self,
        request: &ScriptRequest,
        api_key: &str,
    ) -> Result<GeneratedScript, CollaboratorError> {
        self.post_json("/script", request, api_key).await
    }

    async fn generate_metadata(
        &self,
        narration: &str,
        api_key: &str,
    ) -> Result<VideoMetadata, CollaboratorError> {
        self.post_json("/metadata", &MetadataRequest { narration }, api_key)
            .await
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpGateway {
    async fn synthesize(
        &self,
        request: &SpeechRequest,
        api_key: &str,
    ) -> Result<Vec<u8>, CollaboratorError> {
        let response = self
            .client
            .post(self.url("/speech"))
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await?;
        Self::read_bytes(response).await
    }
}

#[async_trait]
impl ImageGenerator for HttpGateway {
    async fn generate(
        &self,
        request: &ImageRequest,
        api_key: &str,
    ) -> Result<Vec<Vec<u8>>, CollaboratorError> {
        let listing: ImagesResponse = self.post_json("/images", request, api_key).await?;
        let mut images = Vec::with_capacity(listing.images.len());
        for image in listing.images {
            let response = self.client.get(&image.url).send().await?;
            images.push(Self::read_bytes(response).await?);
        }
        Ok(images)
    }
}

#[async_trait]
impl ExtractionApi for HttpGateway {
    async fn submit(&self, source: &str, token: &str) -> Result<String, CollaboratorError> {
        let submitted: SubmitResponse = self
            .post_json("/transcripts", &SubmitRequest { source }, token)
            .await?;
        if submitted.job_id.trim().is_empty() {
            return Err(CollaboratorError::InvalidResponse(
                "transcript job id is empty".to_string(),
            ));
        }
        Ok(submitted.job_id)
    }

    async fn status(&self, job_id: &str, token: &str) -> Result<JobState, CollaboratorError> {
        let status: StatusResponse = self
            .get_json(&format!("/transcripts/{job_id}"), token)
            .await?;
        Ok(JobState::from_wire(&status.state, status.error))
    }

    async fn fetch(&self, job_id: &str, token: &str) -> Result<Transcript, CollaboratorError> {
        self.get_json(&format!("/transcripts/{job_id}/result"), token)
            .await
    }
}
