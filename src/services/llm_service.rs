// src/services/llm_service.rs
use crate::errors::RestorationError;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use log::{debug, warn};
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;

/// Image bytes with their MIME type, as sent to or received from the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: Bytes,
    pub mime_type: String,
}

impl ImageData {
    pub fn new(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub images: Vec<ImageData>,
    pub instruction: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// Whatever the model sent back. Any combination of text and images,
/// including neither, is possible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateResponse {
    pub text: Option<String>,
    pub attachments: Vec<ImageData>,
}

impl GenerateResponse {
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }

    pub fn into_first_image(self) -> Option<ImageData> {
        self.attachments.into_iter().next()
    }
}

#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn generate(&self, request: GenerateRequest)
    -> Result<GenerateResponse, RestorationError>;

    fn model_name(&self) -> &str;
}

pub struct GeminiService {
    api_key: String,
    model: String,
    api_base: String,
    client: Client,
}

impl GeminiService {
    pub fn new(
        api_key: String,
        model: String,
        api_base: String,
        timeout: Duration,
    ) -> Result<Self, RestorationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RestorationError::Config(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            api_key,
            model,
            api_base: api_base.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

#[async_trait]
impl ModelGateway for GeminiService {
    async fn generate(
        &self,
        request: GenerateRequest,
    ) -> Result<GenerateResponse, RestorationError> {
        debug!(
            "Calling {} with {} image(s), {} instruction chars",
            self.model,
            request.images.len(),
            request.instruction.len()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(&request))
            .send()
            .await
            .map_err(|e| RestorationError::Gateway(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RestorationError::Gateway(format!(
                "Gemini error ({}): {}",
                status, error_text
            )));
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| RestorationError::Gateway(format!("Failed to parse Gemini response: {}", e)))?;

        Ok(decode_response(&result))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// `generateContent` body: image parts first, then the instruction.
pub fn request_body(request: &GenerateRequest) -> Value {
    let mut parts: Vec<Value> = request
        .images
        .iter()
        .map(|image| {
            json!({
                "inline_data": {
                    "mime_type": image.mime_type,
                    "data": general_purpose::STANDARD.encode(&image.bytes)
                }
            })
        })
        .collect();
    parts.push(json!({ "text": request.instruction }));

    json!({
        "contents": [{
            "role": "user",
            "parts": parts
        }],
        "generationConfig": {
            "temperature": request.temperature,
            "maxOutputTokens": request.max_output_tokens
        }
    })
}

pub fn decode_response(body: &Value) -> GenerateResponse {
    if let Some(reason) = body["promptFeedback"]["blockReason"].as_str() {
        warn!("Gemini blocked the prompt: {}", reason);
    }

    let Some(parts) = body["candidates"][0]["content"]["parts"].as_array() else {
        warn!("Gemini response carried no content parts");
        return GenerateResponse::default();
    };

    let mut texts = Vec::new();
    let mut attachments = Vec::new();

    for part in parts {
        if let Some(text) = part["text"].as_str() {
            texts.push(text);
        }

        let inline = part.get("inlineData").or_else(|| part.get("inline_data"));
        let Some(inline) = inline else { continue };
        let Some(data) = inline["data"].as_str() else {
            warn!("Skipping inline part without data");
            continue;
        };
        let mime_type = inline["mimeType"]
            .as_str()
            .or_else(|| inline["mime_type"].as_str())
            .unwrap_or("image/png");

        match general_purpose::STANDARD.decode(data) {
            Ok(bytes) => attachments.push(ImageData::new(bytes, mime_type)),
            Err(e) => warn!("Skipping undecodable inline image: {}", e),
        }
    }

    GenerateResponse {
        text: (!texts.is_empty()).then(|| texts.join("\n")),
        attachments,
    }
}
