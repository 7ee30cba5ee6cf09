//! Ollama gateway (`/api/generate`)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{finish_completion, truncate_body, GatewayError, GenerationRequest, ModelGateway};

/// Ollama gateway
#[derive(Clone)]
pub struct OllamaGateway {
    http_client: Client,
    base_url: String,
    model: String,
}

impl OllamaGateway {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

/// Request to Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: u32,
    temperature: f32,
}

/// Response from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl ModelGateway for OllamaGateway {
    async fn invoke(&self, request: &GenerationRequest) -> Result<String, GatewayError> {
        let body = OllamaRequest {
            model: &self.model,
            prompt: &request.prompt,
            stream: false,
            options: OllamaOptions {
                num_predict: request.max_output_tokens,
                temperature: 0.1,
            },
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::from_reqwest(e, request.timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::from_reqwest(e, request.timeout))?;

        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: truncate_body(text),
            });
        }

        let parsed: OllamaResponse = serde_json::from_str(&text)
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;
        debug!(model = %self.model, "Ollama response: {}", parsed.response);

        finish_completion(&parsed.response)
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockModelServer, MockReply};
    use std::time::Duration;

    #[tokio::test]
    async fn test_invoke_sends_num_predict() {
        let server = MockModelServer::start(MockReply::text("Food\n")).await;
        let gateway = OllamaGateway::new(&server.url(), "llama3.2");

        let request = GenerationRequest::new("Classify: bagels", 10, Duration::from_secs(5));
        assert_eq!(gateway.invoke(&request).await.unwrap(), "Food");

        let sent = server.last_request().unwrap();
        assert_eq!(sent["model"], "llama3.2");
        assert_eq!(sent["options"]["num_predict"], 10);
        assert_eq!(sent["stream"], false);
    }

    #[tokio::test]
    async fn test_invoke_error_status() {
        let reply = MockReply::Status(500, "model not loaded".into());
        let server = MockModelServer::start(reply).await;
        let gateway = OllamaGateway::new(&server.url(), "llama3.2");

        let request = GenerationRequest::new("hi", 10, Duration::from_secs(5));
        assert!(matches!(
            gateway.invoke(&request).await,
            Err(GatewayError::Status { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_invoke_missing_response_field() {
        let server = MockModelServer::start(MockReply::Raw("{\"done\": true}".into())).await;
        let gateway = OllamaGateway::new(&server.url(), "llama3.2");

        let request = GenerationRequest::new("hi", 10, Duration::from_secs(5));
        assert!(matches!(
            gateway.invoke(&request).await,
            Err(GatewayError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockModelServer::start(MockReply::text("ok")).await;
        assert!(OllamaGateway::new(&server.url(), "llama3.2").health_check().await);
        assert!(!OllamaGateway::new("http://127.0.0.1:1", "llama3.2").health_check().await);
    }
}
