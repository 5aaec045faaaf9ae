//! Thin asynchronous client for the Google Cloud Vision `images:annotate` API.
//!
//! - Only `TEXT_DETECTION` on a remote image URI is used.
//! - An image with no detectable text yields an empty transcription rather
//!   than an error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::{CollaboratorError, MenuOcr};

const ANNOTATE_PATH: &str = "v1/images:annotate";
const COLLABORATOR: &str = "google-vision";

#[derive(Debug, Error)]
pub enum VisionClientError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("http request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error: {0}")]
    Api(String),
}

impl From<VisionClientError> for CollaboratorError {
    fn from(err: VisionClientError) -> Self {
        match err {
            VisionClientError::Api(reason) => CollaboratorError::MalformedRecord {
                collaborator: COLLABORATOR,
                reason,
            },
            other => CollaboratorError::Unavailable {
                collaborator: COLLABORATOR,
                reason: other.to_string(),
            },
        }
    }
}

#[derive(Clone)]
pub struct VisionClient {
    http: Client,
    endpoint: Url,
    api_key: String,
}

impl VisionClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, VisionClientError> {
        let endpoint = Url::parse(base_url)?.join(ANNOTATE_PATH)?;
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint,
            api_key: api_key.into(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub async fn detect_text(&self, image_url: &str) -> Result<String, VisionClientError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("key", &self.api_key);

        debug!(endpoint = %self.endpoint, image_url, "requesting text detection");

        let response: AnnotateResponse = self
            .http
            .post(url)
            .json(&AnnotateRequest::text_detection(image_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        first_transcription(response)
    }
}

#[async_trait]
impl MenuOcr for VisionClient {
    async fn extract_text(&self, image_url: &str) -> Result<String, CollaboratorError> {
        Ok(self.detect_text(image_url).await?)
    }
}

fn first_transcription(response: AnnotateResponse) -> Result<String, VisionClientError> {
    let Some(first) = response.responses.into_iter().next() else {
        return Err(VisionClientError::Api("response missing annotations".into()));
    };

    if let Some(error) = first.error {
        return Err(VisionClientError::Api(
            error.message.unwrap_or_else(|| "annotation failed".to_string()),
        ));
    }

    Ok(first
        .full_text_annotation
        .map(|annotation| annotation.text)
        .unwrap_or_default())
}

#[derive(Debug, Serialize)]
struct AnnotateRequest<'a> {
    requests: [ImageRequest<'a>; 1],
}

impl<'a> AnnotateRequest<'a> {
    fn text_detection(image_uri: &'a str) -> Self {
        Self {
            requests: [ImageRequest {
                image: Image {
                    source: ImageSource { image_uri },
                },
                features: [Feature {
                    kind: "TEXT_DETECTION",
                }],
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    image: Image<'a>,
    features: [Feature; 1],
}

#[derive(Debug, Serialize)]
struct Image<'a> {
    source: ImageSource<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageSource<'a> {
    image_uri: &'a str,
}

#[derive(Debug, Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    full_text_annotation: Option<TextAnnotation>,
    #[serde(default)]
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: serde_json::Value) -> Result<String, VisionClientError> {
        first_transcription(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn request_matches_annotate_schema() {
        let body = serde_json::to_value(AnnotateRequest::text_detection("https://r2/menu.jpg"))
            .unwrap();
        assert_eq!(
            body,
            json!({
                "requests": [{
                    "image": {"source": {"imageUri": "https://r2/menu.jpg"}},
                    "features": [{"type": "TEXT_DETECTION"}]
                }]
            })
        );
    }

    #[test]
    fn endpoint_joins_base_url() {
        let client = VisionClient::new(
            "https://vision.googleapis.com/",
            "k",
            "pour-cost-gateway/test",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            client.endpoint().as_str(),
            "https://vision.googleapis.com/v1/images:annotate"
        );
    }

    #[test]
    fn transcription_is_extracted() {
        let text = parse(json!({
            "responses": [{"fullTextAnnotation": {"text": "COCKTAILS\nNegroni 14"}}]
        }))
        .unwrap();
        assert_eq!(text, "COCKTAILS\nNegroni 14");
    }

    #[test]
    fn blank_images_yield_empty_text() {
        assert_eq!(parse(json!({"responses": [{}]})).unwrap(), "");
    }

    #[test]
    fn api_errors_surface() {
        let err = parse(json!({
            "responses": [{"error": {"code": 7, "message": "image fetch denied"}}]
        }))
        .unwrap_err();
        assert!(matches!(err, VisionClientError::Api(ref m) if m == "image fetch denied"));

        assert!(matches!(
            parse(json!({"responses": []})),
            Err(VisionClientError::Api(_))
        ));
    }
}
