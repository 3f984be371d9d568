//! Ollama generation backend (`POST /api/generate`, non-streaming).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use localrag_core::error::{Error, Result};
use localrag_core::traits::Generator;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    id: String,
    temperature: Option<f32>,
}

impl OllamaGenerator {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| Error::config(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            url: format!("{}/api/generate", base_url.trim_end_matches('/')),
            model: model.to_string(),
            id: format!("ollama:{}", model),
            temperature: None,
        })
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: self.temperature.map(|temperature| GenerateOptions { temperature }),
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn id(&self) -> &str { &self.id }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.url)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| Error::generation(format!("{}: {}", self.url, e), true))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::generation(
                format!("{} returned {}: {}", self.url, status, body.trim()),
                Error::is_transient_status(status.as_u16()),
            ));
        }
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::generation(format!("malformed response: {}", e), false))?;
        debug!(model = %self.model, chars = body.response.len(), "generated");
        Ok(body.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_non_streaming() {
        let g = OllamaGenerator::new("http://localhost:11434", "llama3").unwrap();
        let body = serde_json::to_value(g.request_body("hi")).unwrap();
        assert_eq!(body, serde_json::json!({"model": "llama3", "prompt": "hi", "stream": false}));
        assert_eq!(g.url, "http://localhost:11434/api/generate");
    }

    #[test]
    fn temperature_goes_into_options() {
        let g = OllamaGenerator::new("http://h:1/", "llama3").unwrap().with_temperature(Some(0.5));
        let body = serde_json::to_value(g.request_body("hi")).unwrap();
        assert_eq!(body["options"]["temperature"], serde_json::json!(0.5));
    }

    #[test]
    fn parses_response_field() {
        let r: GenerateResponse =
            serde_json::from_str(r#"{"model":"llama3","response":"Boil it.","done":true}"#).unwrap();
        assert_eq!(r.response, "Boil it.");
    }
}
