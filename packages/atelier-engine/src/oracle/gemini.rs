use crate::error::OracleError;
use crate::oracle::{GenerativeTransport, OracleRequest};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Transport for the Gemini `generateContent` endpoint with JSON output.
#[derive(Clone)]
pub struct GeminiTransport {
    api_key: String,
    model: String,
    endpoint: String,
    client: Client,
}

impl GeminiTransport {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: "gemini-2.5-flash".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client: Client::new(),
        }
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(request: &OracleRequest) -> Value {
        json!({
            "systemInstruction": {
                "parts": [{ "text": request.system_instruction }]
            },
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.user_instruction }]
            }],
            "generationConfig": {
                "temperature": request.temperature,
                "responseMimeType": "application/json",
                "responseJsonSchema": request.response_schema
            }
        })
    }
}

/// Concatenates the text parts of the first candidate.
fn extract_text(body: &Value) -> Result<String, OracleError> {
    let parts = body
        .pointer("/candidates/0/content/parts")
        .and_then(|parts| parts.as_array())
        .ok_or_else(|| {
            OracleError::MalformedResponse("no candidates/0/content/parts in response".to_string())
        })?;

    Ok(parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join(""))
}

fn classify_status(status: StatusCode, message: String) -> OracleError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => OracleError::RateLimited(message),
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::INTERNAL_SERVER_ERROR => {
            OracleError::Overloaded(message)
        }
        StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => OracleError::Unavailable(message),
        other => OracleError::Rejected {
            status: Some(other.as_u16()),
            message,
        },
    }
}

#[async_trait]
impl GenerativeTransport for GeminiTransport {
    async fn generate(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Unavailable(format!("timed out: {}", e))
                } else {
                    OracleError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(
                status,
                body.chars().take(500).collect::<String>(),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| OracleError::Unavailable(format!("response body interrupted: {}", e)))?;
        let body: Value = serde_json::from_str(&body).map_err(|e| {
            OracleError::MalformedResponse(format!(
                "response body is not JSON ({}): {}",
                e,
                body.chars().take(200).collect::<String>()
            ))
        })?;

        extract_text(&body)
    }
}
