use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::Settings;

/// Instruction sent alongside an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExtractionPrompt {
    AnswerKey,
    StudentResponse,
    GradingContext,
}

impl ExtractionPrompt {
    pub(crate) fn instruction(self) -> &'static str {
        match self {
            Self::AnswerKey => "Summarize and extract key solutions from this exam key PDF.",
            Self::StudentResponse => {
                "Extract and summarize the student's responses from this exam PDF."
            }
            Self::GradingContext => {
                "This file provides additional context to guide grading decisions. Summarize it."
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct GradeRequest {
    pub(crate) response_text: String,
    pub(crate) key_text: String,
    pub(crate) context_texts: Vec<String>,
    pub(crate) notes: Option<String>,
    pub(crate) job_id: Option<i64>,
}

impl GradeRequest {
    pub(crate) fn prompt(&self) -> String {
        let mut prompt = format!(
            "You are an expert grader.\n\nTeacher Key:\n{}\n\nStudent Submission:\n{}\n",
            self.key_text, self.response_text
        );

        for (index, context) in self.context_texts.iter().enumerate() {
            prompt.push_str(&format!("\nGrading Context {}:\n{}\n", index + 1, context));
        }

        if let Some(notes) = &self.notes {
            prompt.push_str(&format!("\n\nAdditional Instructions:\n{notes}"));
        }

        prompt
    }
}

/// Slow external model calls. Failures are returned as-is; callers do not retry.
#[async_trait]
pub(crate) trait ContentService: Send + Sync {
    async fn extract(&self, file_name: &str, bytes: Vec<u8>, prompt: ExtractionPrompt)
        -> Result<String>;

    async fn grade(&self, request: GradeRequest) -> Result<String>;
}

#[derive(Debug, Clone)]
pub(crate) struct AiGradingService {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AiGradingService {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.ai().ai_request_timeout);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: settings.ai().openai_api_key.clone(),
            base_url: settings.ai().openai_base_url.trim_end_matches('/').to_string(),
            model: settings.ai().ai_model.clone(),
        })
    }

    async fn upload_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .context("Invalid upload mime type")?;
        let form = Form::new().text("purpose", "user_data").part("file", part);

        let response = self
            .client
            .post(format!("{}/files", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Failed to upload file to OpenAI")?;

        let body = read_json(response).await?;
        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .context("Missing file id in OpenAI upload response")
    }

    async fn respond(&self, content: Vec<Value>) -> Result<String> {
        let payload = json!({
            "model": self.model,
            "input": [{"role": "user", "content": content}],
        });

        let response = self
            .client
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("Failed to call OpenAI API")?;

        let body = read_json(response).await?;
        extract_output_text(&body).context("Missing OpenAI response text")
    }
}

#[async_trait]
impl ContentService for AiGradingService {
    async fn extract(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        prompt: ExtractionPrompt,
    ) -> Result<String> {
        let timer = Instant::now();
        let file_id = self.upload_file(file_name, bytes).await?;
        tracing::info!(file_name, file_id = %file_id, ?prompt, "Uploaded file for extraction");

        let text = self
            .respond(vec![
                json!({"type": "input_text", "text": prompt.instruction()}),
                json!({"type": "input_file", "file_id": file_id}),
            ])
            .await?;

        tracing::info!(
            file_name,
            duration_seconds = timer.elapsed().as_secs_f64(),
            chars = text.len(),
            "Extraction completed"
        );
        Ok(text)
    }

    async fn grade(&self, request: GradeRequest) -> Result<String> {
        let timer = Instant::now();
        let job_id = request.job_id.unwrap_or_default();
        tracing::info!(job_id, model = %self.model, "Sending AI grading request");

        let report =
            self.respond(vec![json!({"type": "input_text", "text": request.prompt()})]).await?;

        tracing::info!(
            job_id,
            duration_seconds = timer.elapsed().as_secs_f64(),
            "AI grading completed"
        );
        Ok(report)
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
        anyhow::bail!("OpenAI API error ({status}): {body}");
    }
    Ok(body)
}

/// Pulls the text out of a `/responses` body, preferring the `output_text` shortcut.
fn extract_output_text(body: &Value) -> Option<String> {
    if let Some(text) = body.get("output_text").and_then(Value::as_str) {
        return Some(text.to_string());
    }

    let parts = body
        .get("output")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(""))
    }
}
