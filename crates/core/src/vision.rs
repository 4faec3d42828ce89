use crate::error::VisionError;
use crate::traits::VisionAnalyzer;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DefaultOnError, NoneAsEmptyString, OneOrMany};
use std::time::Duration;
use url::Url;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_VISION_MODEL: &str = "qwen3-vl:30b-a3b-instruct-q4_K_M";
pub const DEFAULT_VISION_TIMEOUT: Duration = Duration::from_secs(60);

static JSON_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("json object pattern is valid"));

#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_VISION_MODEL.to_string(),
            timeout: DEFAULT_VISION_TIMEOUT,
        }
    }
}

impl VisionConfig {
    // Defaults overridden by `OLLAMA_URL`, `OLLAMA_MODEL` and `OLLAMA_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = non_empty_env("OLLAMA_URL") {
            config.base_url = url;
        }
        if let Some(model) = non_empty_env("OLLAMA_MODEL") {
            config.model = model;
        }
        if let Some(secs) = non_empty_env("OLLAMA_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.timeout = Duration::from_secs(secs);
        }
        config
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let value = value.trim().to_string();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

#[serde_as]
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct VisionPayload {
    #[serde_as(as = "DefaultOnError<NoneAsEmptyString>")]
    #[serde(default)]
    pub subject: Option<String>,
    #[serde_as(as = "DefaultOnError<NoneAsEmptyString>")]
    #[serde(default)]
    pub summary: Option<String>,
    #[serde_as(as = "DefaultOnError<NoneAsEmptyString>")]
    #[serde(default)]
    pub date: Option<String>,
    #[serde_as(as = "DefaultOnError<NoneAsEmptyString>")]
    #[serde(default)]
    pub sender: Option<String>,
    #[serde_as(as = "DefaultOnError<NoneAsEmptyString>")]
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde_as(as = "DefaultOnError<NoneAsEmptyString>")]
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde_as(as = "DefaultOnError<OneOrMany<_>>")]
    #[serde(default)]
    pub tags: Vec<String>,
}

impl VisionPayload {
    pub fn normalized(self) -> Self {
        let mut tags: Vec<String> = Vec::new();
        for tag in self.tags.iter().flat_map(|tag| tag.split(',')) {
            let tag = tag.trim();
            if !tag.is_empty() && !tags.iter().any(|seen| seen.eq_ignore_ascii_case(tag)) {
                tags.push(tag.to_string());
            }
        }

        Self {
            subject: clean(self.subject),
            summary: clean(self.summary),
            date: clean(self.date),
            sender: clean(self.sender),
            recipient: clean(self.recipient),
            document_type: clean(self.document_type),
            tags,
        }
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value.and_then(|text| {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

pub fn parse_vision_response(text: &str) -> Result<VisionPayload, VisionError> {
    let object = locate_json_object(text).ok_or_else(|| {
        VisionError::MalformedResponse("no JSON object found in vision response".to_string())
    })?;

    let payload: VisionPayload = serde_json::from_value(object)
        .map_err(|error| VisionError::MalformedResponse(error.to_string()))?;
    Ok(payload.normalized())
}

fn locate_json_object(text: &str) -> Option<Value> {
    if let Some(found) = JSON_OBJECT.find(text) {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(found.as_str()) {
            return Some(value);
        }
    }

    // The greedy span can swallow prose between two objects; take the first
    // object that parses from any opening brace instead.
    text.match_indices('{').find_map(|(start, _)| {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value @ Value::Object(_))) => Some(value),
            _ => None,
        }
    })
}

pub fn analysis_prompt(file_name: &str) -> String {
    format!(
        r#"Analyze this PDF document and extract metadata in JSON format.

Document: {file_name}

Return only a JSON object with these fields:
- subject: document title or main topic
- summary: brief 2-3 sentence summary of the content
- date: document date in YYYY-MM-DD format if visible, otherwise empty string
- sender: sender/from information (person, company, or organization)
- recipient: recipient/to information (person, company, or organization)
- document_type: type of document (invoice, contract, letter, report, deed, legal document, etc.)
- tags: ["relevant", "categorization", "keywords"]

Look for dates, names, addresses, official seals and document types.
Suggest tags that make the document easy to find later.

Respond with only valid JSON, no additional text."#
    )
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisionServiceState {
    Running,
    Offline,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VisionStatus {
    pub status: VisionServiceState,
    pub url: String,
    pub model: String,
    pub model_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct OllamaVisionClient {
    client: Client,
    config: VisionConfig,
}

impl OllamaVisionClient {
    pub fn new(config: VisionConfig) -> Result<Self, VisionError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    fn endpoint(&self, route: &str) -> Result<Url, VisionError> {
        let base = format!("{}/", self.config.base_url.trim_end_matches('/'));
        Ok(Url::parse(&base)?.join(route)?)
    }

    fn classify(&self, endpoint: &Url, error: reqwest::Error) -> VisionError {
        if error.is_timeout() {
            VisionError::Timeout(self.config.timeout.as_secs())
        } else if error.is_connect() {
            VisionError::Connection {
                endpoint: endpoint.to_string(),
                details: error.to_string(),
            }
        } else {
            VisionError::Http(error)
        }
    }

    pub async fn check_status(&self) -> VisionStatus {
        let mut status = VisionStatus {
            status: VisionServiceState::Error,
            url: self.config.base_url.clone(),
            model: self.config.model.clone(),
            model_available: false,
            error: None,
        };

        let endpoint = match self.endpoint("api/tags") {
            Ok(endpoint) => endpoint,
            Err(error) => {
                status.error = Some(error.to_string());
                return status;
            }
        };

        let response = match self
            .client
            .get(endpoint.clone())
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                if error.is_connect() {
                    status.status = VisionServiceState::Offline;
                    status.error = Some("connection refused".to_string());
                } else {
                    status.error = Some(self.classify(&endpoint, error).to_string());
                }
                return status;
            }
        };

        if !response.status().is_success() {
            status.error = Some(format!("HTTP {}", response.status().as_u16()));
            return status;
        }

        match response.json::<TagsResponse>().await {
            Ok(tags) => {
                status.status = VisionServiceState::Running;
                status.model_available = tags
                    .models
                    .iter()
                    .any(|model| model.name == self.config.model);
            }
            Err(error) => status.error = Some(error.to_string()),
        }

        status
    }
}

#[async_trait]
impl VisionAnalyzer for OllamaVisionClient {
    async fn analyze(&self, prompt: &str, images: &[Vec<u8>]) -> Result<String, VisionError> {
        let endpoint = self.endpoint("api/generate")?;
        let payload = GenerateRequest {
            model: &self.config.model,
            prompt,
            images: images.iter().map(|image| STANDARD.encode(image)).collect(),
            stream: false,
            options: GenerateOptions {
                temperature: 0.1,
                top_p: 0.9,
                num_predict: 1000,
            },
        };

        let response = self
            .client
            .post(endpoint.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|error| self.classify(&endpoint, error))?;

        if !response.status().is_success() {
            return Err(VisionError::Status {
                endpoint: endpoint.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|error| VisionError::MalformedResponse(error.to_string()))?;

        body.response
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                VisionError::MalformedResponse("vision response has no text".to_string())
            })
    }
}
