// Copyright 2025 CloudWeGo Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! STRIDE threat modeling of an uploaded architecture diagram.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use tracing::info;

use crate::config::Language;
use crate::llm::prompts::{self, ThreatContext};
use crate::llm::{ChatBackend, ChatMessage, ChatRequest, ContentPart, ImageUrl};
use crate::utils::errors::Error;

pub const THREAT_TEMPERATURE: f32 = 0.8;
pub const THREAT_MAX_TOKENS: u32 = 1300;
pub const THREAT_TOP_P: f32 = 0.95;

const DEFAULT_IMAGE_TYPE: &str = "image/png";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadedImage {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    /// `data:<mime>;base64,<payload>`; non-image uploads are labelled PNG.
    pub fn data_url(&self) -> String {
        let mime = self
            .content_type
            .as_deref()
            .filter(|m| m.starts_with("image/"))
            .unwrap_or(DEFAULT_IMAGE_TYPE);
        format!("data:{};base64,{}", mime, STANDARD.encode(&self.bytes))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreatForm {
    pub application_type: String,
    pub authentication: String,
    pub internet_facing: String,
    pub sensitive_data: String,
    pub description: String,
    pub image: UploadedImage,
}

impl ThreatForm {
    fn context(&self) -> ThreatContext<'_> {
        ThreatContext {
            application_type: &self.application_type,
            authentication: &self.authentication,
            internet_facing: &self.internet_facing,
            sensitive_data: &self.sensitive_data,
            description: &self.description,
        }
    }
}

pub fn build_request(form: &ThreatForm, lang: Language) -> ChatRequest {
    let prompt = prompts::make_threat_prompt(lang, &form.context());
    ChatRequest::new(vec![
        ChatMessage::system(prompts::threat_system_prompt(lang)),
        ChatMessage::user_parts(vec![
            ContentPart::Text { text: prompt },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: form.image.data_url(),
                },
            },
            ContentPart::Text {
                text: prompts::threat_closing_prompt(lang).to_string(),
            },
        ]),
    ])
    .temperature(THREAT_TEMPERATURE)
    .max_tokens(THREAT_MAX_TOKENS)
    .top_p(THREAT_TOP_P)
    .penalties(0.0, 0.0)
}

/// Asks the vision model for a threat model and returns its raw response.
pub async fn analyze(
    backend: &dyn ChatBackend,
    form: &ThreatForm,
    lang: Language,
) -> Result<Value, Error> {
    info!(
        application_type = %form.application_type,
        image = ?form.image.filename,
        image_bytes = form.image.bytes.len(),
        "analyzing threats"
    );
    backend.complete(&build_request(form, lang)).await
}

// Canned answer in the chat-completions shape, for exercising a front end without a model.
pub fn simulate(form: &ThreatForm) -> Value {
    let content = format!(
        "Application: {}\nAuthentication: {}\nInternet facing: {}\nSensitive data: {}\nDescription: {}\n\nSimulated analysis completed successfully.",
        form.application_type,
        form.authentication,
        form.internet_facing,
        form.sensitive_data,
        form.description,
    );
    json!({ "choices": [ { "message": { "content": content } } ] })
}
