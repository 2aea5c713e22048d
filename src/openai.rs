use crate::constants::{API_BASE_ENV, COMPLETION_TEMPERATURE, DEFAULT_API_BASE};
use crate::errors::AppError;
use serde_json::json;
use std::time::Duration;
use url::Url;

/// One completion call. `image_base64` switches the user message to the
/// multi-part text + inline image form.
pub struct CompletionRequest<'a> {
    pub api_key: &'a str,
    pub model: &'a str,
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    pub image_base64: Option<&'a str>,
}

pub trait CompletionApi {
    /// Returns the raw completion text of the first choice, or `""` when the
    /// response carries no content. Non-2xx responses surface the server's
    /// error body verbatim.
    fn chat_completion(&self, request: &CompletionRequest) -> Result<String, AppError>;

    /// Returns the available model ids, deduplicated and sorted.
    fn list_models(&self, api_key: &str) -> Result<Vec<String>, AppError>;
}

pub struct OpenAiClient {
    base_url: String,
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, AppError> {
        let parsed = Url::parse(base_url)
            .map_err(|error| AppError::Api(format!("Invalid API base URL '{}': {}", base_url, error)))?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(AppError::Api(format!(
                    "Unsupported API base URL scheme '{}'",
                    other
                )))
            }
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Honors the base-URL override from the environment, falling back to
    /// the public endpoint.
    pub fn from_env() -> Result<Self, AppError> {
        match std::env::var(API_BASE_ENV) {
            Ok(base) if !base.trim().is_empty() => Self::with_base_url(base.trim()),
            _ => Ok(Self::new()),
        }
    }

    fn agent() -> ureq::Agent {
        ureq::builder()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(120))
            .build()
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

fn user_content(user_prompt: &str, image_base64: Option<&str>) -> serde_json::Value {
    match image_base64 {
        Some(image) => json!([
            { "type": "text", "text": user_prompt },
            { "type": "image_url", "image_url": { "url": format!("data:image/png;base64,{}", image) } },
        ]),
        None => json!(user_prompt),
    }
}

impl CompletionApi for OpenAiClient {
    fn chat_completion(&self, request: &CompletionRequest) -> Result<String, AppError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": request.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": user_content(request.user_prompt, request.image_base64) },
            ],
            "temperature": COMPLETION_TEMPERATURE,
        });

        let response = Self::agent()
            .post(&url)
            .set("Content-Type", "application/json")
            .set("Authorization", &format!("Bearer {}", request.api_key))
            .send_json(body)
            .map_err(|error| match error {
                ureq::Error::Status(_, response) => {
                    AppError::Api(response.into_string().unwrap_or_default())
                }
                ureq::Error::Transport(transport) => AppError::Api(transport.to_string()),
            })?;

        let payload: serde_json::Value = response.into_json().map_err(|error| {
            AppError::Api(format!("Failed to parse completion response: {}", error))
        })?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default();
        Ok(content.to_string())
    }

    fn list_models(&self, api_key: &str) -> Result<Vec<String>, AppError> {
        let url = format!("{}/v1/models", self.base_url);
        let response = Self::agent()
            .get(&url)
            .set("Authorization", &format!("Bearer {}", api_key))
            .call()
            .map_err(|error| match error {
                ureq::Error::Status(_, response) => {
                    AppError::Api(response.into_string().unwrap_or_default())
                }
                ureq::Error::Transport(transport) => AppError::Api(transport.to_string()),
            })?;

        let payload: serde_json::Value = response.into_json().map_err(|error| {
            AppError::Api(format!("Failed to parse model list response: {}", error))
        })?;
        let mut models: Vec<String> = payload["data"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item["id"].as_str().map(|id| id.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        models.sort();
        models.dedup();
        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_base_url_rejects_garbage() {
        assert!(OpenAiClient::with_base_url("not a url").is_err());
        assert!(OpenAiClient::with_base_url("ftp://example.com").is_err());
    }

    #[test]
    fn with_base_url_strips_trailing_slash() {
        let client = OpenAiClient::with_base_url("http://localhost:8080/").unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn user_content_is_plain_text_without_image() {
        let content = user_content("hello", None);
        assert_eq!(content, json!("hello"));
    }

    #[test]
    fn user_content_with_image_is_multi_part() {
        let content = user_content("hello", Some("QUJD"));
        let parts = content.as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(
            parts[1]["image_url"]["url"],
            "data:image/png;base64,QUJD"
        );
    }

    // --- unreachable endpoint surfaces a transport error (no panic) ---
    #[test]
    fn chat_completion_fails_on_unreachable_endpoint() {
        let client = OpenAiClient::with_base_url("http://127.0.0.1:19999").unwrap();
        let request = CompletionRequest {
            api_key: "sk-test",
            model: "gpt-4o-mini",
            system_prompt: "s",
            user_prompt: "u",
            image_base64: None,
        };
        assert!(matches!(client.chat_completion(&request), Err(AppError::Api(_))));
    }

    #[test]
    fn list_models_fails_on_unreachable_endpoint() {
        let client = OpenAiClient::with_base_url("http://127.0.0.1:19999").unwrap();
        assert!(matches!(client.list_models("sk-test"), Err(AppError::Api(_))));
    }
}
