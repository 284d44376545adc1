use derive_more::{Display, Error, From};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

/// Fast model used for all text generation; latency matters more than
/// prose quality at this chapter length.
pub const TEXT_MODEL: &str = "gpt-4o-mini";
pub const IMAGE_MODEL: &str = "dall-e-3";

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const IMAGE_GENERATIONS_URL: &str = "https://api.openai.com/v1/images/generations";

#[derive(Debug, Display, From, Error)]
pub enum Error {
    Http(reqwest::Error),
    #[from(ignore)]
    #[display(fmt = "Unexpected status from OpenAI: {}", "_0")]
    UnexpectedStatus(#[error(not(source))] String),
    #[display(fmt = "Completion contained no content.")]
    EmptyCompletion,
    #[display(fmt = "Image response carried neither a url nor base64 data.")]
    MissingImagePayload,
    Base64(base64::DecodeError),
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub json_response: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImagePayload>,
}

/// One generated image, delivered either by URL or inline as base64.
#[derive(Debug, Clone, Deserialize)]
pub struct ImagePayload {
    pub url: Option<String>,
    pub b64_json: Option<String>,
}

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str) -> OpenAiClient {
        OpenAiClient {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    #[tracing::instrument(
        name = "Requesting a chat completion.",
        err,
        level = "info",
        skip(self, request),
        fields(request_id = %Uuid::new_v4())
    )]
    pub async fn chat_completion(&self, request: ChatRequest) -> Result<String, Error> {
        let mut body = json!({
            "model": TEXT_MODEL,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
            "temperature": request.temperature,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if request.json_response {
            body["response_format"] = json!({ "type": "json_object" });
        }
        let response = self
            .http
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::UnexpectedStatus(response.status().to_string()));
        }
        let completion: ChatResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(Error::EmptyCompletion)
    }

    #[tracing::instrument(
        name = "Requesting a generated image.",
        err,
        level = "info",
        skip(self, prompt),
        fields(request_id = %Uuid::new_v4())
    )]
    pub async fn generate_image(&self, prompt: &str) -> Result<ImagePayload, Error> {
        let body = json!({
            "model": IMAGE_MODEL,
            "prompt": prompt,
            "size": "1024x1024",
            "quality": "standard",
            "n": 1,
        });
        let response = self
            .http
            .post(IMAGE_GENERATIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::UnexpectedStatus(response.status().to_string()));
        }
        let images: ImagesResponse = response.json().await?;
        images
            .data
            .into_iter()
            .next()
            .ok_or(Error::MissingImagePayload)
    }

    /// Resolves an [`ImagePayload`] to raw bytes, fetching the result URL
    /// when one is present and falling back to the inline base64 body.
    pub async fn fetch_image_bytes(&self, payload: &ImagePayload) -> Result<Vec<u8>, Error> {
        if let Some(url) = &payload.url {
            let response = self.http.get(url).send().await?;
            if !response.status().is_success() {
                return Err(Error::UnexpectedStatus(response.status().to_string()));
            }
            return Ok(response.bytes().await?.to_vec());
        }
        let encoded = payload.b64_json.as_deref().ok_or(Error::MissingImagePayload)?;
        Ok(base64::decode(encoded)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_base64_payload_decodes() {
        let payload = ImagePayload {
            url: None,
            b64_json: Some(base64::encode(b"png-bytes")),
        };
        let client = OpenAiClient::new("test-key");
        let bytes = tokio_test::block_on(client.fetch_image_bytes(&payload)).unwrap();
        assert_eq!(bytes, b"png-bytes");
    }

    #[test]
    fn payload_without_url_or_base64_is_an_error() {
        let payload = ImagePayload {
            url: None,
            b64_json: None,
        };
        let client = OpenAiClient::new("test-key");
        let result = tokio_test::block_on(client.fetch_image_bytes(&payload));
        assert!(matches!(result, Err(Error::MissingImagePayload)));
    }
}
